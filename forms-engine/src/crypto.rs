//! Encryption collaborators for confidential forms.
//!
//! The engine only depends on the [`Encryptor`] and [`Decryptor`] traits.
//! [`Ec01Cipher`] is the bundled implementation, using pure Rust crates:
//! - libsecp256k1 for ECDH (not secp256k1 which has C bindings)
//! - HKDF-SHA256 + ChaCha20-Poly1305 for the payload (EC01 format)

use std::future::Future;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use libsecp256k1::{PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// Envelope format version written by this engine and accepted on review.
pub const ENCRYPT_VERSION: u32 = 1;

/// Magic bytes for ECDH + ChaCha20 format
const ECDH_MAGIC: &[u8; 4] = b"EC01";

/// Domain separation prefix for key derivation
const DERIVATION_PREFIX: &[u8] = b"forms-engine:v1:";

const HKDF_INFO: &[u8] = b"forms-engine:v1:ecdh";

const HEADER_SIZE: usize = 4; // EC01
const PUBKEY_SIZE: usize = 33; // compressed pubkey
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16; // Poly1305 tag
const MIN_SIZE: usize = HEADER_SIZE + PUBKEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// Encrypts plaintext for the holder of a form's secret key.
pub trait Encryptor {
    /// Encrypt `plaintext` to `public_key`, returning opaque ciphertext.
    fn encrypt(&self, public_key: &str, plaintext: &[u8]) -> impl Future<Output = Result<String>> + Send;
}

/// What the decryptor is handed for one submission.
#[derive(Debug, Clone, Copy)]
pub struct DecryptInput<'a> {
    pub encrypted_content: &'a str,
    pub verified_content: Option<&'a str>,
    pub version: u32,
}

/// Decrypted bytes of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plaintext {
    pub content: Vec<u8>,
    pub verified: Option<Vec<u8>>,
}

/// Decrypts a submission envelope. Fails closed: any problem, including a
/// malformed key, yields `None`.
pub trait Decryptor {
    fn decrypt(&self, secret_key: &str, input: &DecryptInput<'_>) -> impl Future<Output = Option<Plaintext>> + Send;

    /// Open one encrypted attachment body.
    fn decrypt_file(&self, secret_key: &str, binary: &str) -> impl Future<Output = Option<Vec<u8>>> + Send;
}

/// ECDH + ChaCha20-Poly1305 cipher working on hex strings.
///
/// Ciphertext layout: `EC01 (4) || ephemeral_pubkey (33) || nonce (12) || ciphertext+tag`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ec01Cipher;

impl Encryptor for Ec01Cipher {
    async fn encrypt(&self, public_key: &str, plaintext: &[u8]) -> Result<String> {
        let recipient = parse_public_key(public_key).map_err(|e| Error::Encryption(e.to_string()))?;
        let sealed = encrypt_blob(&recipient, plaintext).map_err(|e| Error::Encryption(e.to_string()))?;
        Ok(hex::encode(sealed))
    }
}

impl Decryptor for Ec01Cipher {
    async fn decrypt(&self, secret_key: &str, input: &DecryptInput<'_>) -> Option<Plaintext> {
        if input.version != ENCRYPT_VERSION {
            debug!("Unsupported envelope version {}", input.version);
            return None;
        }
        let key = match parse_secret_key(secret_key) {
            Ok(key) => key,
            Err(e) => {
                debug!("Rejecting secret key: {}", e);
                return None;
            }
        };

        let content = open_hex(&key, input.encrypted_content)?;
        let verified = match input.verified_content {
            Some(blob) if !blob.is_empty() => Some(open_hex(&key, blob)?),
            _ => None,
        };
        Some(Plaintext { content, verified })
    }

    async fn decrypt_file(&self, secret_key: &str, binary: &str) -> Option<Vec<u8>> {
        let key = match parse_secret_key(secret_key) {
            Ok(key) => key,
            Err(e) => {
                debug!("Rejecting secret key: {}", e);
                return None;
            }
        };
        open_hex(&key, binary)
    }
}

fn open_hex(key: &SecretKey, blob_hex: &str) -> Option<Vec<u8>> {
    let result: std::result::Result<Vec<u8>, Box<dyn std::error::Error>> = hex::decode(blob_hex)
        .map_err(|e| format!("Invalid hex ciphertext: {}", e).into())
        .and_then(|bytes| decrypt_blob(key, &bytes));
    match result {
        Ok(plaintext) => Some(plaintext),
        Err(e) => {
            debug!("Decryption failed: {}", e);
            None
        }
    }
}

/// Parse a hex-encoded secret key
pub fn parse_secret_key(hex_str: &str) -> std::result::Result<SecretKey, Box<dyn std::error::Error>> {
    let bytes = hex::decode(hex_str.trim())?;
    let key = SecretKey::parse_slice(&bytes).map_err(|e| format!("Invalid secret key: {:?}", e))?;
    Ok(key)
}

/// Parse a hex-encoded compressed public key
pub fn parse_public_key(hex_str: &str) -> std::result::Result<PublicKey, Box<dyn std::error::Error>> {
    let bytes = hex::decode(hex_str.trim())?;
    let key = PublicKey::parse_slice(&bytes, None).map_err(|e| format!("Invalid public key: {:?}", e))?;
    Ok(key)
}

/// Fresh key pair as `(secret_hex, public_hex)`.
pub fn generate_keypair() -> (String, String) {
    let secret = random_secret_key();
    let public = PublicKey::from_secret_key(&secret);
    (hex::encode(secret.serialize()), hex::encode(public.serialize_compressed()))
}

/// Compressed public key (hex) belonging to a hex secret key.
pub fn public_key_hex(secret_hex: &str) -> std::result::Result<String, Box<dyn std::error::Error>> {
    let secret = parse_secret_key(secret_hex)?;
    Ok(hex::encode(PublicKey::from_secret_key(&secret).serialize_compressed()))
}

fn random_secret_key() -> SecretKey {
    loop {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        // Out-of-range scalars are astronomically rare; draw again.
        if let Ok(key) = SecretKey::parse(&bytes) {
            return key;
        }
    }
}

fn form_tweak(form_id: &str) -> std::result::Result<SecretKey, Box<dyn std::error::Error>> {
    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_PREFIX);
    hasher.update(form_id.as_bytes());
    let tweak_bytes: [u8; 32] = hasher.finalize().into();

    let tweak = SecretKey::parse_slice(&tweak_bytes).map_err(|e| format!("Failed to create tweak: {:?}", e))?;
    Ok(tweak)
}

/// Derive a form-specific secret key from the master secret key
///
/// Uses additive key derivation:
///   form_secret = master_secret + SHA256(prefix + form_id)
///
/// Must agree with [`derive_form_public_key`].
pub fn derive_form_secret_key(
    master: &SecretKey,
    form_id: &str,
) -> std::result::Result<SecretKey, Box<dyn std::error::Error>> {
    let tweak = form_tweak(form_id)?;
    let mut form_key = master.clone();
    form_key
        .tweak_add_assign(&tweak)
        .map_err(|e| format!("Failed to derive secret key: {:?}", e))?;
    Ok(form_key)
}

/// Derive a form-specific public key from the master public key
///
///   form_public = master_public + SHA256(prefix + form_id) * G
pub fn derive_form_public_key(
    master: &PublicKey,
    form_id: &str,
) -> std::result::Result<PublicKey, Box<dyn std::error::Error>> {
    let tweak = form_tweak(form_id)?;
    let mut form_key = master.clone();
    form_key
        .tweak_add_assign(&tweak)
        .map_err(|e| format!("Failed to derive public key: {:?}", e))?;
    Ok(form_key)
}

/// Hex form secret key derived from a hex master secret key.
pub fn form_secret_key_hex(
    master_hex: &str,
    form_id: &str,
) -> std::result::Result<String, Box<dyn std::error::Error>> {
    let master = parse_secret_key(master_hex)?;
    Ok(hex::encode(derive_form_secret_key(&master, form_id)?.serialize()))
}

/// Hex form public key derived from a hex master public key.
pub fn form_public_key_hex(
    master_public_hex: &str,
    form_id: &str,
) -> std::result::Result<String, Box<dyn std::error::Error>> {
    let master = parse_public_key(master_public_hex)?;
    Ok(hex::encode(derive_form_public_key(&master, form_id)?.serialize_compressed()))
}

fn shared_cipher(point: &PublicKey, scalar: &SecretKey) -> std::result::Result<ChaCha20Poly1305, Box<dyn std::error::Error>> {
    // ECDH: shared_point = point * scalar
    let mut shared_point = point.clone();
    shared_point
        .tweak_mul_assign(scalar)
        .map_err(|e| format!("ECDH failed: {:?}", e))?;

    // Extract x-coordinate (skip prefix byte from compressed pubkey)
    let shared_compressed = shared_point.serialize_compressed();
    let shared_x = &shared_compressed[1..];

    let hk = Hkdf::<Sha256>::new(None, shared_x);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key).map_err(|_| "HKDF expand failed")?;

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|e| format!("Failed to create cipher: {:?}", e))?;
    Ok(cipher)
}

/// Encrypt data for `recipient` in EC01 format
pub fn encrypt_blob(
    recipient: &PublicKey,
    plaintext: &[u8],
) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    let ephemeral = random_secret_key();
    let cipher = shared_cipher(recipient, &ephemeral)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| format!("ChaCha20-Poly1305 encryption failed: {:?}", e))?;

    let mut sealed = Vec::with_capacity(MIN_SIZE + plaintext.len());
    sealed.extend_from_slice(ECDH_MAGIC);
    sealed.extend_from_slice(&PublicKey::from_secret_key(&ephemeral).serialize_compressed());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt data in EC01 format
pub fn decrypt_blob(
    secret: &SecretKey,
    encrypted: &[u8],
) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    if encrypted.len() <= HEADER_SIZE || &encrypted[0..HEADER_SIZE] != ECDH_MAGIC {
        return Err("Invalid encryption format: expected EC01 magic bytes".into());
    }
    if encrypted.len() < MIN_SIZE {
        return Err(format!(
            "EC01 data too short: {} bytes, need at least {}",
            encrypted.len(),
            MIN_SIZE
        )
        .into());
    }

    let ephemeral_pubkey_bytes = &encrypted[HEADER_SIZE..HEADER_SIZE + PUBKEY_SIZE];
    let ephemeral = PublicKey::parse_slice(ephemeral_pubkey_bytes, None)
        .map_err(|e| format!("Invalid ephemeral pubkey: {:?}", e))?;
    let cipher = shared_cipher(&ephemeral, secret)?;

    let nonce_start = HEADER_SIZE + PUBKEY_SIZE;
    let nonce_bytes = &encrypted[nonce_start..nonce_start + NONCE_SIZE];
    let ciphertext = &encrypted[nonce_start + NONCE_SIZE..];

    let decrypted = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| format!("ChaCha20-Poly1305 decryption failed: {:?}", e))?;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(content: &str) -> DecryptInput<'_> {
        DecryptInput {
            encrypted_content: content,
            verified_content: None,
            version: ENCRYPT_VERSION,
        }
    }

    #[tokio::test]
    async fn sealed_content_opens_with_the_matching_key() {
        let (secret, public) = generate_keypair();
        let sealed = Ec01Cipher.encrypt(&public, b"{\"responses\":[]}").await.unwrap();
        assert!(sealed.starts_with(&hex::encode(ECDH_MAGIC)));

        let opened = Ec01Cipher.decrypt(&secret, &input(&sealed)).await.unwrap();
        assert_eq!(opened.content, b"{\"responses\":[]}".to_vec());
        assert_eq!(opened.verified, None);
    }

    #[tokio::test]
    async fn wrong_or_malformed_key_fails_closed() {
        let (_, public) = generate_keypair();
        let (other_secret, _) = generate_keypair();
        let sealed = Ec01Cipher.encrypt(&public, b"secret").await.unwrap();

        assert!(Ec01Cipher.decrypt(&other_secret, &input(&sealed)).await.is_none());
        assert!(Ec01Cipher.decrypt("not-hex", &input(&sealed)).await.is_none());
        assert!(Ec01Cipher.decrypt("abcd", &input(&sealed)).await.is_none());
    }

    #[tokio::test]
    async fn sealed_file_opens_with_the_matching_key() {
        let (secret, public) = generate_keypair();
        let (other_secret, _) = generate_keypair();
        let sealed = Ec01Cipher.encrypt(&public, b"%PDF").await.unwrap();

        assert_eq!(Ec01Cipher.decrypt_file(&secret, &sealed).await, Some(b"%PDF".to_vec()));
        assert!(Ec01Cipher.decrypt_file(&other_secret, &sealed).await.is_none());
        assert!(Ec01Cipher.decrypt_file(&secret, "zz").await.is_none());
    }

    #[tokio::test]
    async fn unsupported_version_fails_closed() {
        let (secret, public) = generate_keypair();
        let sealed = Ec01Cipher.encrypt(&public, b"secret").await.unwrap();
        let future = DecryptInput {
            version: ENCRYPT_VERSION + 1,
            ..input(&sealed)
        };
        assert!(Ec01Cipher.decrypt(&secret, &future).await.is_none());
    }

    #[tokio::test]
    async fn bad_public_key_is_an_encryption_error() {
        let err = Ec01Cipher.encrypt("00", b"x").await.unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
    }

    #[test]
    fn tampered_blob_is_rejected() {
        let (secret_hex, public_hex) = generate_keypair();
        let secret = parse_secret_key(&secret_hex).unwrap();
        let public = parse_public_key(&public_hex).unwrap();
        let mut sealed = encrypt_blob(&public, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(decrypt_blob(&secret, &sealed).is_err());
        assert!(decrypt_blob(&secret, b"EC01short").is_err());
    }

    #[test]
    fn derived_form_keys_agree() {
        let (master_secret, master_public) = generate_keypair();
        let form_secret = form_secret_key_hex(&master_secret, "form-1").unwrap();
        let form_public = form_public_key_hex(&master_public, "form-1").unwrap();
        assert_eq!(public_key_hex(&form_secret).unwrap(), form_public);
        assert_ne!(form_public, form_public_key_hex(&master_public, "form-2").unwrap());

        let secret = parse_secret_key(&form_secret).unwrap();
        let public = parse_public_key(&form_public).unwrap();
        let sealed = encrypt_blob(&public, b"answers").unwrap();
        assert_eq!(decrypt_blob(&secret, &sealed).unwrap(), b"answers".to_vec());
    }
}
