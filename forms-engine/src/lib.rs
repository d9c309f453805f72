//! Field response canonicalization and submission packaging for dynamic forms.
//!
//! Submission path:
//! `FormSchema + RawInputs -> transform -> [FieldResponse] -> extract_attachments -> package_open | package_confidential`
//!
//! Review path:
//! `EncryptedSubmissionEnvelope + secret key -> review -> ReviewedSubmission`
//!
//! Both paths produce the same [`FieldResponse`] shape for a given field kind.

pub mod attachments;
pub mod crypto;
pub mod error;
pub mod field;
pub mod input;
pub mod package;
pub mod response;
pub mod review;
pub mod transform;

pub use attachments::{extract_attachments, AttachmentMap};
pub use crypto::{DecryptInput, Decryptor, Ec01Cipher, Encryptor, Plaintext, ENCRYPT_VERSION};
pub use error::{Error, Result};
pub use field::{AnswerShape, Column, FieldDefinition, FieldKind, FormSchema};
pub use input::{FileHandle, RawInputValue, RawInputs};
pub use package::{
    package_confidential, package_open, sendable_responses, EncryptedAttachment, EncryptedFile,
    EncryptedSubmission, MultipartPart, MultipartPayload, PlaintextResponse,
};
pub use response::{build_base, Answer, FieldResponse};
pub use review::{
    augment, decrypt_attachment, review, AttachmentDownload, DecryptedContent, EncryptedSubmissionEnvelope,
    ReviewedSubmission,
};
pub use transform::{create_responses, transform, OTHERS_PREFIX, OTHERS_SENTINEL};
