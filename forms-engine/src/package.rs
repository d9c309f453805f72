//! Assembly of the two submission encodings.
//!
//! Open (email-mode) forms travel as `multipart/form-data`: a `body` part with
//! the JSON responses plus one part per uploaded file. Confidential
//! (storage-mode) forms travel as a JSON envelope whose content and files are
//! encrypted to the form's public key.

use std::collections::{BTreeMap, HashMap};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachments::AttachmentMap;
use crate::crypto::{Encryptor, ENCRYPT_VERSION};
use crate::error::{Error, Result};
use crate::field::{FieldDefinition, FieldKind};
use crate::response::FieldResponse;

/// Name of the JSON part in an open submission.
pub const BODY_PART: &str = "body";

const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    /// For file parts this is the id of the field the file answers.
    pub filename: Option<String>,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// An open submission ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPayload {
    boundary: String,
    parts: Vec<MultipartPart>,
}

impl MultipartPayload {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// The `body` JSON part.
    pub fn body(&self) -> Option<&MultipartPart> {
        self.parts.iter().find(|p| p.name == BODY_PART && p.filename.is_none())
    }

    /// File parts, in field id order.
    pub fn file_parts(&self) -> impl Iterator<Item = &MultipartPart> {
        self.parts.iter().filter(|p| p.filename.is_some())
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Render the body as `multipart/form-data` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(&part.name));
            if let Some(filename) = &part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(format!("\r\nContent-Type: {}\r\n\r\n", part.content_type).as_bytes());
            out.extend_from_slice(&part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

/// Build the multipart body for an open form.
///
/// Every attachment becomes exactly one file part, named after the file and
/// carrying the field id as its filename.
pub fn package_open(responses: &[FieldResponse], attachments: &AttachmentMap) -> MultipartPayload {
    let body = serde_json::json!({ "responses": responses });

    let mut parts = Vec::with_capacity(attachments.len() + 1);
    parts.push(MultipartPart {
        name: BODY_PART.to_string(),
        filename: None,
        content_type: "application/json".to_string(),
        body: body.to_string().into_bytes(),
    });
    parts.extend(attachments.iter().map(|(field_id, file)| MultipartPart {
        name: file.name.clone(),
        filename: Some(field_id.clone()),
        content_type: file
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string()),
        body: file.bytes.clone(),
    }));

    MultipartPayload {
        boundary: format!("----FormsEngineBoundary{}", Uuid::new_v4().simple()),
        parts,
    }
}

/// Encrypted bytes of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    pub binary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedAttachment {
    pub encrypted_file: EncryptedFile,
}

/// The keys of a response a confidential submission sends in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaintextResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub field_type: FieldKind,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl From<&FieldResponse> for PlaintextResponse {
    fn from(response: &FieldResponse) -> Self {
        Self {
            id: response.id.clone(),
            field_type: response.field_type,
            answer: response.answer_text().unwrap_or_default().to_string(),
            signature: response.signature.clone(),
        }
    }
}

/// A confidential submission ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSubmission {
    /// Responses the server must read in plaintext, see [`sendable_responses`].
    pub responses: Vec<PlaintextResponse>,
    /// Every response, encrypted.
    pub encrypted_content: String,
    pub attachments: BTreeMap<String, EncryptedAttachment>,
    pub version: u32,
}

/// Build the encrypted envelope for a confidential form.
///
/// The full response list is encrypted as JSON; each attachment is encrypted
/// separately, keyed by field id. Fails if any single encryption fails.
pub async fn package_confidential<E: Encryptor>(
    encryptor: &E,
    schema: &[FieldDefinition],
    responses: &[FieldResponse],
    attachments: &AttachmentMap,
    public_key: &str,
) -> Result<EncryptedSubmission> {
    let plaintext = serde_json::to_vec(responses)?;
    let encrypted_content = encryptor.encrypt(public_key, &plaintext).await?;

    let encrypted_files = try_join_all(attachments.iter().map(|(field_id, file)| async move {
        let binary = encryptor.encrypt(public_key, &file.bytes).await?;
        Ok::<_, Error>((
            field_id.clone(),
            EncryptedAttachment {
                encrypted_file: EncryptedFile { binary },
            },
        ))
    }))
    .await?;

    Ok(EncryptedSubmission {
        responses: sendable_responses(schema, responses),
        encrypted_content,
        attachments: encrypted_files.into_iter().collect(),
        version: ENCRYPT_VERSION,
    })
}

/// Responses a confidential submission still sends in plaintext: emails
/// that trigger an auto-reply or need signature checks, and verifiable
/// mobile numbers. A response whose id or kind does not match the schema is
/// never sent, and the question text stays encrypted.
pub fn sendable_responses(schema: &[FieldDefinition], responses: &[FieldResponse]) -> Vec<PlaintextResponse> {
    let fields: HashMap<&str, &FieldDefinition> = schema.iter().map(|def| (def.id.as_str(), def)).collect();
    responses
        .iter()
        .filter(|response| {
            let Some(field) = fields.get(response.id.as_str()) else {
                return false;
            };
            if field.field_type != response.field_type {
                return false;
            }
            match response.field_type {
                FieldKind::Email => field.has_auto_reply || field.is_verifiable,
                FieldKind::Mobile => field.is_verifiable,
                _ => false,
            }
        })
        .map(PlaintextResponse::from)
        .collect()
}
