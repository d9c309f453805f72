//! Decryption of stored confidential submissions for review.
//!
//! The review path turns an encrypted envelope back into the same
//! [`FieldResponse`] list the submission path produced, with attachment
//! responses pointing at where their files can be downloaded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto::{DecryptInput, Decryptor, Plaintext, ENCRYPT_VERSION};
use crate::error::{Error, Result};
use crate::field::FieldKind;
use crate::input::scalar_to_string;
use crate::package::EncryptedAttachment;
use crate::response::{Answer, FieldResponse};

/// A stored confidential submission as fetched for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSubmissionEnvelope {
    pub encrypted_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_content: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Download location of each uploaded file, keyed by field id.
    #[serde(default)]
    pub attachment_metadata: BTreeMap<String, String>,
    /// Everything else the data layer attached (submission id, timestamps).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

fn default_version() -> u32 {
    ENCRYPT_VERSION
}

/// Decrypted submission before and after augmentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecryptedContent {
    pub responses: Vec<FieldResponse>,
    /// Identity attributes verified by the login provider, if any.
    pub verified: Option<BTreeMap<String, String>>,
}

/// Where to fetch one attachment and what to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentDownload {
    pub url: String,
    pub filename: String,
}

/// A decrypted submission ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedSubmission {
    pub responses: Vec<FieldResponse>,
    /// Question number of each response by field id. Section headers are not numbered.
    pub question_numbers: BTreeMap<String, u32>,
    /// Attachments keyed by question number.
    pub attachment_downloads: BTreeMap<u32, AttachmentDownload>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentDocument {
    List(Vec<FieldResponse>),
    Wrapped { responses: Vec<FieldResponse> },
}

/// Decrypt `envelope` with `secret_key` and rebuild its responses.
///
/// Returns `Ok(None)` while either input is still missing. Any decryption
/// failure, including a malformed key or undecodable plaintext, is reported
/// as [`Error::Decryption`] with no partial data.
pub async fn review<D: Decryptor>(
    decryptor: &D,
    envelope: Option<&EncryptedSubmissionEnvelope>,
    secret_key: Option<&str>,
) -> Result<Option<ReviewedSubmission>> {
    let (Some(envelope), Some(secret_key)) = (envelope, secret_key) else {
        return Ok(None);
    };

    let input = DecryptInput {
        encrypted_content: &envelope.encrypted_content,
        verified_content: envelope.verified_content.as_deref(),
        version: envelope.version,
    };
    let plaintext = decryptor.decrypt(secret_key, &input).await.ok_or(Error::Decryption)?;
    let content = parse_plaintext(&plaintext).ok_or(Error::Decryption)?;
    let content = augment(content, &envelope.attachment_metadata);

    let numbers = question_numbers(&content.responses);
    Ok(Some(ReviewedSubmission {
        question_numbers: content
            .responses
            .iter()
            .zip(&numbers)
            .filter_map(|(response, number)| number.map(|n| (response.id.clone(), n)))
            .collect(),
        attachment_downloads: attachment_downloads(&content.responses, &numbers),
        responses: content.responses,
        metadata: envelope.metadata.clone(),
    }))
}

/// Decrypt one attachment of a reviewed submission.
///
/// Failure is the same [`Error::Decryption`] the response content reports.
pub async fn decrypt_attachment<D: Decryptor>(
    decryptor: &D,
    secret_key: &str,
    attachment: &EncryptedAttachment,
) -> Result<Vec<u8>> {
    decryptor
        .decrypt_file(secret_key, &attachment.encrypted_file.binary)
        .await
        .ok_or(Error::Decryption)
}

fn parse_plaintext(plaintext: &Plaintext) -> Option<DecryptedContent> {
    let responses = match serde_json::from_slice(&plaintext.content).ok()? {
        ContentDocument::List(responses) => responses,
        ContentDocument::Wrapped { responses } => responses,
    };
    let verified = match &plaintext.verified {
        Some(bytes) => {
            let attributes: Map<String, Value> = serde_json::from_slice(bytes).ok()?;
            Some(
                attributes
                    .iter()
                    .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
                    .collect(),
            )
        }
        None => None,
    };
    Some(DecryptedContent { responses, verified })
}

/// Normalize decrypted responses, fold verified attributes in as responses
/// and point attachment responses at their download location.
///
/// Pure and idempotent: `augment(augment(c, m), m) == augment(c, m)`.
pub fn augment(content: DecryptedContent, attachment_metadata: &BTreeMap<String, String>) -> DecryptedContent {
    let mut responses: Vec<FieldResponse> = content.responses.into_iter().map(FieldResponse::normalize).collect();

    if let Some(verified) = content.verified {
        responses.extend(verified.into_iter().map(|(key, value)| verified_response(key, value)));
    }

    for response in &mut responses {
        response.download_url = match response.field_type {
            FieldKind::Attachment => attachment_metadata.get(&response.id).cloned(),
            _ => None,
        };
    }

    DecryptedContent {
        responses,
        verified: None,
    }
}

fn verified_response(key: String, value: String) -> FieldResponse {
    let (field_type, question) = match key.as_str() {
        "uinFin" => (FieldKind::Nric, "SingPass Validated NRIC".to_string()),
        "cpUen" => (FieldKind::Uen, "CorpPass Validated UEN".to_string()),
        "cpUid" => (FieldKind::ShortText, "CorpPass Validated UID".to_string()),
        _ => (FieldKind::ShortText, key.clone()),
    };
    FieldResponse {
        id: key,
        field_type,
        question,
        answer: Answer::Single(value),
        signature: None,
        is_header: None,
        download_url: None,
    }
}

/// Running question number per response; sections get `None`.
fn question_numbers(responses: &[FieldResponse]) -> Vec<Option<u32>> {
    let mut question_number = 0;
    responses
        .iter()
        .map(|response| match response.field_type {
            FieldKind::Section => None,
            _ => {
                question_number += 1;
                Some(question_number)
            }
        })
        .collect()
}

fn attachment_downloads(responses: &[FieldResponse], numbers: &[Option<u32>]) -> BTreeMap<u32, AttachmentDownload> {
    let mut downloads = BTreeMap::new();
    for (response, number) in responses.iter().zip(numbers) {
        if let (Some(url), Some(question_number)) = (&response.download_url, number) {
            downloads.insert(
                *question_number,
                AttachmentDownload {
                    url: url.clone(),
                    filename: response.answer_text().unwrap_or_default().to_string(),
                },
            );
        }
    }
    downloads
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Hands back fixed plaintext for one key only.
    struct FixedDecryptor {
        key: &'static str,
        plaintext: Plaintext,
    }

    impl Decryptor for FixedDecryptor {
        async fn decrypt(&self, secret_key: &str, _input: &DecryptInput<'_>) -> Option<Plaintext> {
            (secret_key == self.key).then(|| self.plaintext.clone())
        }

        async fn decrypt_file(&self, secret_key: &str, binary: &str) -> Option<Vec<u8>> {
            (secret_key == self.key).then(|| binary.as_bytes().to_vec())
        }
    }

    fn decryptor(content: Value, verified: Option<Value>) -> FixedDecryptor {
        FixedDecryptor {
            key: "right-key",
            plaintext: Plaintext {
                content: content.to_string().into_bytes(),
                verified: verified.map(|v| v.to_string().into_bytes()),
            },
        }
    }

    fn envelope() -> EncryptedSubmissionEnvelope {
        serde_json::from_value(json!({
            "encryptedContent": "ciphertext",
            "attachmentMetadata": {"cv": "https://files.example/cv"},
            "submissionId": "sub-1",
            "created": "2024-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn stored_responses() -> Value {
        json!([
            {"_id": "s1", "fieldType": "section", "question": "About you", "answer": ""},
            {"_id": "name", "fieldType": "textfield", "question": "Name", "answer": "Ada"},
            {"_id": "cv", "fieldType": "attachment", "question": "CV", "answer": "report.pdf"},
        ])
    }

    #[tokio::test]
    async fn pending_until_envelope_and_key_are_present() {
        let d = decryptor(stored_responses(), None);
        let env = envelope();
        assert!(review(&d, None, Some("right-key")).await.unwrap().is_none());
        assert!(review(&d, Some(&env), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_key_is_the_decryption_error() {
        let d = decryptor(stored_responses(), None);
        let err = review(&d, Some(&envelope()), Some("wrong-key")).await.unwrap_err();
        assert!(matches!(err, Error::Decryption));
        assert_eq!(err.to_string(), "Could not decrypt the response");
    }

    #[tokio::test]
    async fn undecodable_plaintext_is_the_decryption_error() {
        let d = FixedDecryptor {
            key: "right-key",
            plaintext: Plaintext {
                content: b"not json".to_vec(),
                verified: None,
            },
        };
        let err = review(&d, Some(&envelope()), Some("right-key")).await.unwrap_err();
        assert!(matches!(err, Error::Decryption));
    }

    #[tokio::test]
    async fn attachments_get_download_locations() {
        let d = decryptor(stored_responses(), None);
        let reviewed = review(&d, Some(&envelope()), Some("right-key")).await.unwrap().unwrap();

        let cv = reviewed.responses.iter().find(|r| r.id == "cv").unwrap();
        assert_eq!(cv.download_url.as_deref(), Some("https://files.example/cv"));
        assert_eq!(cv.answer_text(), Some("report.pdf"));

        // Section is not numbered: name is question 1, cv question 2.
        assert_eq!(
            reviewed.attachment_downloads.get(&2),
            Some(&AttachmentDownload {
                url: "https://files.example/cv".into(),
                filename: "report.pdf".into(),
            })
        );
        assert_eq!(reviewed.metadata.get("submissionId"), Some(&json!("sub-1")));
    }

    #[tokio::test]
    async fn every_question_but_sections_is_numbered() {
        let d = decryptor(stored_responses(), None);
        let reviewed = review(&d, Some(&envelope()), Some("right-key")).await.unwrap().unwrap();

        assert_eq!(reviewed.question_numbers.get("s1"), None);
        assert_eq!(reviewed.question_numbers.get("name"), Some(&1));
        assert_eq!(reviewed.question_numbers.get("cv"), Some(&2));
    }

    #[tokio::test]
    async fn attachments_open_only_with_the_right_key() {
        let d = decryptor(stored_responses(), None);
        let attachment = EncryptedAttachment {
            encrypted_file: crate::package::EncryptedFile { binary: "%PDF".into() },
        };

        assert_eq!(
            decrypt_attachment(&d, "right-key", &attachment).await.unwrap(),
            b"%PDF".to_vec()
        );
        let err = decrypt_attachment(&d, "wrong-key", &attachment).await.unwrap_err();
        assert!(matches!(err, Error::Decryption));
    }

    #[tokio::test]
    async fn wrapped_documents_and_verified_attributes_are_accepted() {
        let d = decryptor(
            json!({"responses": [{"_id": "name", "fieldType": "textfield", "question": "Name", "answer": "Ada"}]}),
            Some(json!({"uinFin": "S1234567D"})),
        );
        let reviewed = review(&d, Some(&envelope()), Some("right-key")).await.unwrap().unwrap();
        let nric = reviewed.responses.last().unwrap();
        assert_eq!(nric.field_type, FieldKind::Nric);
        assert_eq!(nric.question, "SingPass Validated NRIC");
        assert_eq!(nric.answer_text(), Some("S1234567D"));
    }

    #[test]
    fn augment_is_idempotent() {
        let responses: Vec<FieldResponse> = serde_json::from_value(json!([
            {"_id": "cv", "fieldType": "attachment", "question": "CV", "answer": "report.pdf"},
            {"_id": "pets", "fieldType": "checkbox", "question": "Pets", "answer": "Cat"},
            {"_id": "t", "fieldType": "table", "question": "T (A)", "answerArray": []},
        ]))
        .unwrap();
        let mut verified = BTreeMap::new();
        verified.insert("cpUen".to_string(), "53312345A".to_string());
        let content = DecryptedContent {
            responses,
            verified: Some(verified),
        };
        let mut metadata = BTreeMap::new();
        metadata.insert("cv".to_string(), "https://files.example/cv".to_string());

        let once = augment(content, &metadata);
        let twice = augment(once.clone(), &metadata);
        assert_eq!(once, twice);
        assert_eq!(once.responses.len(), 4);
    }

    #[test]
    fn envelope_version_defaults_to_current() {
        let env: EncryptedSubmissionEnvelope =
            serde_json::from_value(json!({"encryptedContent": "x"})).unwrap();
        assert_eq!(env.version, ENCRYPT_VERSION);
        assert!(env.attachment_metadata.is_empty());
    }
}
