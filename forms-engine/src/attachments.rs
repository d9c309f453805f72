//! Separation of uploaded files from the textual payload.

use std::collections::BTreeMap;

use tracing::debug;

use crate::field::{FieldDefinition, FieldKind};
use crate::input::{FileHandle, RawInputValue, RawInputs};

/// Uploaded files keyed by field id.
pub type AttachmentMap = BTreeMap<String, FileHandle>;

/// Collect the file handles of every attachment field that actually holds a
/// file. Missing or non-file values are skipped; requiredness is checked
/// before submission, not here.
pub fn extract_attachments(defs: &[FieldDefinition], inputs: &RawInputs) -> AttachmentMap {
    defs.iter()
        .filter(|def| def.field_type == FieldKind::Attachment)
        .filter_map(|def| match inputs.get(&def.id) {
            Some(RawInputValue::File(file)) => Some((def.id.clone(), file.clone())),
            Some(_) => {
                debug!("Attachment field {} holds a non-file value, skipping", def.id);
                None
            }
            None => None,
        })
        .collect()
}
