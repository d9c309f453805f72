//! Raw values entered by respondents, before canonicalization.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::field::FieldKind;

/// An uploaded file as handed over by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Declared file name, e.g. `report.pdf`.
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A value a respondent entered for one field.
///
/// Absence is modelled outside this type as `Option<RawInputValue>::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputValue {
    Text(String),
    File(FileHandle),
    /// Radio selection. `value: None` with `others_input` set is the legacy
    /// shape and means "Others" was picked.
    Choice {
        value: Option<String>,
        others_input: Option<String>,
    },
    /// Checkbox selections in the order they were ticked.
    Selections {
        value: Vec<String>,
        others_input: Option<String>,
    },
    Verifiable {
        value: Option<String>,
        signature: Option<String>,
    },
    /// Table rows keyed by column id.
    Rows(Vec<BTreeMap<String, String>>),
    /// Compound field rows, one per child.
    Children(Vec<Vec<String>>),
}

/// Raw values for a whole form, keyed by field id.
pub type RawInputs = BTreeMap<String, RawInputValue>;

impl RawInputValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawInputValue::Text(value.into())
    }

    /// Parse the JSON a rendering layer produces for a field of `kind`.
    ///
    /// Returns `None` for `null` and for any shape the kind does not accept,
    /// which the transformer then treats as an absent answer. File values are
    /// objects `{"name", "contentType"?, "content": <hex>}`.
    pub fn from_json(kind: FieldKind, value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        match kind {
            FieldKind::Checkbox => {
                let obj = value.as_object()?;
                let value = match obj.get("value") {
                    Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![scalar_to_string(other)?],
                };
                Some(RawInputValue::Selections {
                    value,
                    others_input: obj.get("othersInput").and_then(scalar_to_string),
                })
            }
            FieldKind::Radio => match value {
                Value::Object(obj) => Some(RawInputValue::Choice {
                    value: obj.get("value").and_then(scalar_to_string),
                    others_input: obj.get("othersInput").and_then(scalar_to_string),
                }),
                other => scalar_to_string(other).map(RawInputValue::Text),
            },
            FieldKind::Email | FieldKind::Mobile => {
                let obj = value.as_object()?;
                Some(RawInputValue::Verifiable {
                    value: obj.get("value").and_then(scalar_to_string),
                    signature: obj.get("signature").and_then(scalar_to_string),
                })
            }
            FieldKind::Table => {
                let rows = value
                    .as_array()?
                    .iter()
                    .map(|row| {
                        row.as_object()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .filter_map(|(col, cell)| {
                                        scalar_to_string(cell).map(|c| (col.clone(), c))
                                    })
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                Some(RawInputValue::Rows(rows))
            }
            FieldKind::Children => {
                let rows = value
                    .as_array()?
                    .iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(|c| scalar_to_string(c).unwrap_or_default()).collect())
                            .unwrap_or_default()
                    })
                    .collect();
                Some(RawInputValue::Children(rows))
            }
            FieldKind::Attachment => {
                let obj = value.as_object()?;
                let name = obj.get("name")?.as_str()?.to_string();
                let bytes = hex::decode(obj.get("content")?.as_str()?).ok()?;
                Some(RawInputValue::File(FileHandle {
                    name,
                    content_type: obj.get("contentType").and_then(|v| v.as_str()).map(str::to_string),
                    bytes,
                }))
            }
            FieldKind::Section | FieldKind::Statement | FieldKind::Image => None,
            FieldKind::Number
            | FieldKind::Decimal
            | FieldKind::ShortText
            | FieldKind::LongText
            | FieldKind::HomeNumber
            | FieldKind::Dropdown
            | FieldKind::CountryRegion
            | FieldKind::Rating
            | FieldKind::Nric
            | FieldKind::Uen
            | FieldKind::Date
            | FieldKind::YesNo => scalar_to_string(value).map(RawInputValue::Text),
        }
    }
}

/// Strings pass through; numbers and booleans are rendered. Everything else
/// is not a scalar answer.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_numbers_become_text() {
        let raw = RawInputValue::from_json(FieldKind::Rating, &json!(4));
        assert_eq!(raw, Some(RawInputValue::text("4")));
    }

    #[test]
    fn radio_accepts_plain_and_legacy_shapes() {
        assert_eq!(
            RawInputValue::from_json(FieldKind::Radio, &json!("Blue")),
            Some(RawInputValue::text("Blue"))
        );
        assert_eq!(
            RawInputValue::from_json(FieldKind::Radio, &json!({"othersInput": "Teal"})),
            Some(RawInputValue::Choice {
                value: None,
                others_input: Some("Teal".into()),
            })
        );
    }

    #[test]
    fn attachment_requires_hex_content() {
        let file = RawInputValue::from_json(
            FieldKind::Attachment,
            &json!({"name": "report.pdf", "content": "cafe", "contentType": "application/pdf"}),
        );
        assert_eq!(
            file,
            Some(RawInputValue::File(
                FileHandle::new("report.pdf", vec![0xca, 0xfe]).with_content_type("application/pdf")
            ))
        );
        assert_eq!(
            RawInputValue::from_json(FieldKind::Attachment, &json!({"name": "x", "content": "zz"})),
            None
        );
        assert_eq!(RawInputValue::from_json(FieldKind::Attachment, &json!("report.pdf")), None);
    }

    #[test]
    fn wrong_shapes_parse_to_none() {
        assert_eq!(RawInputValue::from_json(FieldKind::Email, &json!("a@b.c")), None);
        assert_eq!(RawInputValue::from_json(FieldKind::Table, &json!({"c1": "x"})), None);
        assert_eq!(RawInputValue::from_json(FieldKind::ShortText, &json!(null)), None);
        assert_eq!(RawInputValue::from_json(FieldKind::Section, &json!("ignored")), None);
    }
}
