//! Command-line host for forms-engine
//!
//! Reads one JSON action from stdin and writes one JSON result to stdout:
//! 1. SubmitForm: Canonicalize answers and package an open or confidential submission
//! 2. ReviewSubmission: Decrypt a stored confidential submission for review
//! 3. GetFormPublicKey: Derive the key respondents of a form encrypt to

mod config;
mod types;

use std::io::Write;

use config::Config;
use forms_engine::{
    create_responses, extract_attachments, package_confidential, package_open, review, Ec01Cipher,
    FieldDefinition, RawInputValue, RawInputs,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use types::*;

#[tokio::main]
async fn main() {
    // Load environment variables first so .env RUST_LOG is available to tracing
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only the JSON result
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();

    match process(&config).await {
        Ok(output) => write_json(&output),
        Err(e) => {
            error!("{}", e);
            let error_response = ErrorResponse {
                success: false,
                error: format!("{}", e),
            };
            write_json(&error_response);
        }
    }
}

fn write_json<T: Serialize>(value: &T) {
    let mut stdout = std::io::stdout().lock();
    let written = serde_json::to_writer(&mut stdout, value)
        .map_err(|e| e.to_string())
        .and_then(|_| writeln!(stdout).map_err(|e| e.to_string()));
    if let Err(e) = written {
        error!("Failed to write output: {}", e);
    }
}

async fn process(config: &Config) -> Result<Output, Box<dyn std::error::Error>> {
    let mut body = Vec::new();
    tokio::io::stdin().read_to_end(&mut body).await?;
    let input: Input = serde_json::from_slice(&body).map_err(|e| format!("Invalid input JSON: {}", e))?;

    match input {
        Input::SubmitForm(submit_input) => handle_submit_form(config, submit_input).await,
        Input::ReviewSubmission(review_input) => handle_review_submission(config, review_input).await,
        Input::GetFormPublicKey(key_input) => handle_get_form_public_key(config, key_input),
    }
}

/// Parse each field's raw JSON answer according to its kind.
/// Answers for ids not in the schema are ignored.
fn raw_inputs(schema: &[FieldDefinition], inputs: &serde_json::Map<String, serde_json::Value>) -> RawInputs {
    schema
        .iter()
        .filter_map(|def| {
            let value = inputs.get(&def.id)?;
            RawInputValue::from_json(def.field_type, value).map(|raw| (def.id.clone(), raw))
        })
        .collect()
}

/// Handle SubmitForm action
async fn handle_submit_form(
    config: &Config,
    input: SubmitFormInput,
) -> Result<Output, Box<dyn std::error::Error>> {
    let inputs = raw_inputs(&input.schema, &input.inputs);
    let responses = create_responses(&input.schema, &inputs);
    let attachments = extract_attachments(&input.schema, &inputs);

    match input.mode {
        SubmissionMode::Open => {
            let payload = package_open(&responses, &attachments);
            info!(
                "Packaged open submission: {} responses, {} attachments",
                responses.len(),
                attachments.len()
            );
            Ok(Output::OpenSubmission(OpenSubmissionOutput::from(&payload)))
        }
        SubmissionMode::Confidential => {
            let public_key = config.submit_key(input.public_key, input.form_id.as_deref())?;
            let envelope =
                package_confidential(&Ec01Cipher, &input.schema, &responses, &attachments, &public_key).await?;
            info!(
                "Packaged confidential submission: {} responses, {} attachments",
                responses.len(),
                envelope.attachments.len()
            );
            Ok(Output::ConfidentialSubmission(envelope))
        }
    }
}

/// Handle ReviewSubmission action
/// Stays pending until both the envelope and a secret key are available
async fn handle_review_submission(
    config: &Config,
    input: ReviewSubmissionInput,
) -> Result<Output, Box<dyn std::error::Error>> {
    let secret_key = config.review_key(input.secret_key, input.form_id.as_deref())?;

    match review(&Ec01Cipher, input.envelope.as_ref(), secret_key.as_deref()).await? {
        Some(reviewed) => Ok(Output::Reviewed(reviewed)),
        None => {
            info!("Review pending: envelope or secret key not supplied");
            Ok(Output::Pending(PendingOutput { pending: true }))
        }
    }
}

/// Handle GetFormPublicKey action (returns compressed secp256k1 public key)
/// The public key is not sensitive.
fn handle_get_form_public_key(
    config: &Config,
    input: GetFormPublicKeyInput,
) -> Result<Output, Box<dyn std::error::Error>> {
    let public_key = config.form_public_key(&input.form_id)?;
    Ok(Output::FormPublicKey(FormPublicKeyOutput {
        form_id: input.form_id,
        public_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forms_engine::FieldKind;
    use serde_json::json;

    fn schema() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("name", FieldKind::ShortText, "Name"),
            FieldDefinition::new("cv", FieldKind::Attachment, "CV"),
        ]
    }

    fn submit(mode: SubmissionMode) -> SubmitFormInput {
        let inputs = json!({
            "name": " Ada ",
            "cv": {"name": "report.pdf", "content": "25504446"},
            "stray": "ignored",
        });
        SubmitFormInput {
            schema: schema(),
            inputs: inputs.as_object().cloned().unwrap_or_default(),
            mode,
            public_key: None,
            form_id: Some("form-1".into()),
        }
    }

    fn master_config() -> Config {
        Config {
            master_key: Some(forms_engine::crypto::generate_keypair().0),
            ..Config::default()
        }
    }

    #[test]
    fn raw_inputs_follow_the_schema() {
        let input = submit(SubmissionMode::Open);
        let raw = raw_inputs(&input.schema, &input.inputs);
        assert_eq!(raw.len(), 2);
        assert!(matches!(raw.get("cv"), Some(RawInputValue::File(f)) if f.bytes == b"%PDF".to_vec()));
        assert!(!raw.contains_key("stray"));
    }

    #[tokio::test]
    async fn open_submission_summarizes_parts() {
        let output = handle_submit_form(&Config::default(), submit(SubmissionMode::Open)).await.unwrap();
        let Output::OpenSubmission(open) = output else {
            panic!("expected an open submission");
        };
        assert!(open.content_type.starts_with("multipart/form-data; boundary="));
        assert_eq!(open.parts.len(), 2);
        assert_eq!(open.parts[1].name, "report.pdf");
        assert_eq!(open.parts[1].size, 4);
    }

    #[tokio::test]
    async fn confidential_submission_reviews_with_the_derived_key() {
        let config = master_config();
        let output = handle_submit_form(&config, submit(SubmissionMode::Confidential)).await.unwrap();
        let Output::ConfidentialSubmission(envelope) = output else {
            panic!("expected a confidential submission");
        };

        let stored = serde_json::from_value(json!({
            "encryptedContent": envelope.encrypted_content,
            "version": envelope.version,
        }))
        .unwrap();
        let output = handle_review_submission(
            &config,
            ReviewSubmissionInput {
                envelope: Some(stored),
                secret_key: None,
                form_id: Some("form-1".into()),
            },
        )
        .await
        .unwrap();
        let Output::Reviewed(reviewed) = output else {
            panic!("expected a reviewed submission");
        };
        assert_eq!(reviewed.responses[0].answer_text(), Some("Ada"));
        assert_eq!(reviewed.responses[1].answer_text(), Some("report.pdf"));
    }

    #[tokio::test]
    async fn review_without_key_is_pending() {
        let output = handle_review_submission(
            &Config::default(),
            ReviewSubmissionInput {
                envelope: None,
                secret_key: None,
                form_id: None,
            },
        )
        .await
        .unwrap();
        assert!(matches!(output, Output::Pending(PendingOutput { pending: true })));
    }

    #[test]
    fn public_key_requires_master_key() {
        let err = handle_get_form_public_key(
            &Config::default(),
            GetFormPublicKeyInput {
                form_id: "form-1".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("PROTECTED_MASTER_KEY"));
    }
}
