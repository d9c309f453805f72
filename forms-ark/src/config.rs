//! Environment configuration for forms-ark
//!
//! Values are read once at startup, after `.env` has been loaded.

use forms_engine::crypto;
use tracing::debug;

/// Key material available to the host
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// FORMS_SECRET_KEY: hex secret key for reviews that carry none
    pub secret_key: Option<String>,
    /// FORMS_PUBLIC_KEY: hex public key for submissions that carry none
    pub public_key: Option<String>,
    /// PROTECTED_MASTER_KEY: hex master secret key for per-form derivation
    pub master_key: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            secret_key: non_empty_var("FORMS_SECRET_KEY"),
            public_key: non_empty_var("FORMS_PUBLIC_KEY"),
            master_key: non_empty_var("PROTECTED_MASTER_KEY"),
        }
    }

    /// Master secret key, or an error naming the missing variable
    pub fn master_key(&self) -> Result<&str, Box<dyn std::error::Error>> {
        self.master_key
            .as_deref()
            .ok_or_else(|| "Master key (PROTECTED_MASTER_KEY) not found in env".into())
    }

    /// Secret key for a review: explicit, then FORMS_SECRET_KEY, then derived
    /// from the master key. `None` means the review stays pending.
    pub fn review_key(
        &self,
        explicit: Option<String>,
        form_id: Option<&str>,
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            return Ok(Some(key));
        }
        if let Some(key) = &self.secret_key {
            return Ok(Some(key.clone()));
        }
        match (&self.master_key, form_id) {
            (Some(master), Some(form_id)) => {
                debug!("Deriving review key for form {}", form_id);
                Ok(Some(crypto::form_secret_key_hex(master, form_id)?))
            }
            _ => Ok(None),
        }
    }

    /// Public key for a confidential submission: explicit, then
    /// FORMS_PUBLIC_KEY, then derived from the master key.
    pub fn submit_key(
        &self,
        explicit: Option<String>,
        form_id: Option<&str>,
    ) -> Result<String, Box<dyn std::error::Error>> {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            return Ok(key);
        }
        if let Some(key) = &self.public_key {
            return Ok(key.clone());
        }
        let form_id = form_id.ok_or("publicKey or formId is required for confidential submissions")?;
        self.form_public_key(form_id)
    }

    /// Public key respondents of `form_id` encrypt to
    pub fn form_public_key(&self, form_id: &str) -> Result<String, Box<dyn std::error::Error>> {
        let form_secret = crypto::form_secret_key_hex(self.master_key()?, form_id)?;
        crypto::public_key_hex(&form_secret)
    }
}
