//! Error types for the forms engine.

use thiserror::Error;

/// Errors surfaced by the packaging and review operations.
///
/// Field transformation never fails; a malformed raw value degrades to the
/// empty answer for its kind instead of producing an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The decryptor returned nothing usable for the envelope and key.
    ///
    /// Carries no partial response data.
    #[error("Could not decrypt the response")]
    Decryption,

    /// The encryption collaborator rejected the public key or plaintext.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Responses could not be serialized before encryption.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
