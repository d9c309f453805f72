//! Type definitions for the forms-ark host

use forms_engine::{EncryptedSubmission, EncryptedSubmissionEnvelope, FormSchema, MultipartPayload, ReviewedSubmission};
use serde::{Deserialize, Serialize};

/// Host input - determines which action to perform
#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
pub enum Input {
    /// SubmitForm: Canonicalize answers and package them for transport
    SubmitForm(SubmitFormInput),
    /// ReviewSubmission: Decrypt a stored confidential submission
    ReviewSubmission(ReviewSubmissionInput),
    /// GetFormPublicKey: Derive the public key respondents encrypt to
    GetFormPublicKey(GetFormPublicKeyInput),
}

/// How the form's submissions travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Email mode: multipart body, no end-to-end encryption
    Open,
    /// Storage mode: encrypted to the form's public key
    Confidential,
}

/// Input for SubmitForm action
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormInput {
    pub schema: FormSchema,
    /// Raw answers keyed by field id, as the rendering layer produced them
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub mode: SubmissionMode,
    /// Overrides FORMS_PUBLIC_KEY for confidential submissions
    #[serde(default)]
    pub public_key: Option<String>,
    /// Used to derive the public key from the master key
    #[serde(default)]
    pub form_id: Option<String>,
}

/// Input for ReviewSubmission action
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmissionInput {
    #[serde(default)]
    pub envelope: Option<EncryptedSubmissionEnvelope>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
}

/// Input for GetFormPublicKey action
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFormPublicKeyInput {
    pub form_id: String,
}

/// Host output - union of possible response types
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    OpenSubmission(OpenSubmissionOutput),
    ConfidentialSubmission(EncryptedSubmission),
    Reviewed(ReviewedSubmission),
    Pending(PendingOutput),
    FormPublicKey(FormPublicKeyOutput),
}

/// One part of an open submission, without its bytes
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
}

/// Output for SubmitForm action in open mode
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSubmissionOutput {
    /// Value for the Content-Type header
    pub content_type: String,
    /// Rendered multipart body, hex-encoded
    pub body_hex: String,
    pub parts: Vec<PartSummary>,
}

impl From<&MultipartPayload> for OpenSubmissionOutput {
    fn from(payload: &MultipartPayload) -> Self {
        Self {
            content_type: payload.content_type(),
            body_hex: hex::encode(payload.to_bytes()),
            parts: payload
                .parts()
                .iter()
                .map(|part| PartSummary {
                    name: part.name.clone(),
                    filename: part.filename.clone(),
                    content_type: part.content_type.clone(),
                    size: part.body.len(),
                })
                .collect(),
        }
    }
}

/// Output for ReviewSubmission while the envelope or key is still missing
#[derive(Debug, Serialize)]
pub struct PendingOutput {
    pub pending: bool,
}

/// Output for GetFormPublicKey action
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPublicKeyOutput {
    pub form_id: String,
    pub public_key: String,
}

/// Error response from the host
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
