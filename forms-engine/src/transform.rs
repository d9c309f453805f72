//! Per-kind conversion of raw input values into canonical responses.

use chrono::NaiveDate;
use tracing::debug;

use crate::field::{FieldDefinition, FieldKind};
use crate::input::{RawInputValue, RawInputs};
use crate::response::{build_base, Answer, FieldResponse};

/// Option value the rendering layer sends when the respondent picked
/// "Others" and typed their own answer.
pub const OTHERS_SENTINEL: &str = "!!FORMS_INTERNAL_OTHERS_VALUE!!";

/// Prefix of a rendered "Others" answer.
pub const OTHERS_PREFIX: &str = "Others: ";

/// Format date inputs arrive in.
pub const DATE_INPUT_FORMAT: &str = "%d/%m/%Y";

/// Format dates are rendered in (`dd MMM yyyy`).
pub const DATE_DISPLAY_FORMAT: &str = "%d %b %Y";

/// Convert one field's raw value into its canonical response.
///
/// Returns `None` only for kinds that never produce output (statements and
/// images). A missing or mis-shaped `raw` yields the kind's empty answer.
pub fn transform(def: &FieldDefinition, raw: Option<&RawInputValue>) -> Option<FieldResponse> {
    let response = match def.field_type {
        FieldKind::Section => {
            let mut header = build_base(def, Answer::empty());
            header.is_header = Some(true);
            header
        }
        FieldKind::Number
        | FieldKind::Decimal
        | FieldKind::ShortText
        | FieldKind::LongText
        | FieldKind::HomeNumber
        | FieldKind::Dropdown
        | FieldKind::CountryRegion
        | FieldKind::Rating
        | FieldKind::Nric
        | FieldKind::Uen => {
            let answer = match raw {
                Some(RawInputValue::Text(s)) => s.trim().to_string(),
                _ => String::new(),
            };
            build_base(def, Answer::Single(answer))
        }
        FieldKind::Date => {
            let answer = match raw {
                Some(RawInputValue::Text(s)) => render_date(s),
                _ => String::new(),
            };
            build_base(def, Answer::Single(answer))
        }
        FieldKind::YesNo => {
            let answer = match raw {
                Some(RawInputValue::Text(s)) => s.clone(),
                _ => String::new(),
            };
            build_base(def, Answer::Single(answer))
        }
        FieldKind::Email | FieldKind::Mobile => match raw {
            Some(RawInputValue::Verifiable { value, signature }) => {
                let mut response =
                    build_base(def, Answer::Single(value.clone().unwrap_or_default()));
                response.signature = signature.clone();
                response
            }
            _ => build_base(def, Answer::empty()),
        },
        FieldKind::Checkbox => {
            let answer = match raw {
                Some(RawInputValue::Selections {
                    value,
                    others_input,
                }) => checkbox_answer(value, others_input.as_deref()),
                _ => Vec::new(),
            };
            build_base(def, Answer::List(answer))
        }
        FieldKind::Radio => build_base(def, Answer::Single(radio_answer(raw))),
        FieldKind::Table => table_response(def, raw),
        FieldKind::Attachment => {
            let answer = match raw {
                Some(RawInputValue::File(file)) => file.name.clone(),
                _ => String::new(),
            };
            build_base(def, Answer::Single(answer))
        }
        FieldKind::Statement | FieldKind::Image => return None,
        FieldKind::Children => {
            let rows = match raw {
                Some(RawInputValue::Children(rows)) => rows.clone(),
                _ => vec![vec![String::new(); def.sub_fields.len()]],
            };
            build_base(def, Answer::Grid(rows))
        }
    };
    Some(response)
}

/// Canonical responses for a whole form, in schema order, with no-output
/// kinds dropped.
pub fn create_responses(schema: &[FieldDefinition], inputs: &RawInputs) -> Vec<FieldResponse> {
    schema
        .iter()
        .filter_map(|def| transform(def, inputs.get(&def.id)))
        .collect()
}

fn others_answer(others_input: Option<&str>) -> String {
    format!("{}{}", OTHERS_PREFIX, others_input.unwrap_or_default())
}

fn checkbox_answer(selected: &[String], others_input: Option<&str>) -> Vec<String> {
    let mut answer: Vec<String> = selected
        .iter()
        .filter(|label| label.as_str() != OTHERS_SENTINEL)
        .cloned()
        .collect();
    if answer.len() != selected.len() {
        answer.push(others_answer(others_input));
    }
    answer
}

fn radio_answer(raw: Option<&RawInputValue>) -> String {
    match raw {
        Some(RawInputValue::Choice {
            value: Some(value),
            others_input,
        }) => {
            if value == OTHERS_SENTINEL {
                others_answer(others_input.as_deref())
            } else {
                value.clone()
            }
        }
        Some(RawInputValue::Choice {
            value: None,
            others_input: Some(others),
        }) => others_answer(Some(others.as_str())),
        Some(RawInputValue::Text(value)) if value == OTHERS_SENTINEL => others_answer(None),
        Some(RawInputValue::Text(value)) => value.clone(),
        _ => String::new(),
    }
}

/// Malformed dates are passed through trimmed rather than dropped.
fn render_date(input: &str) -> String {
    let trimmed = input.trim();
    match NaiveDate::parse_from_str(trimmed, DATE_INPUT_FORMAT) {
        Ok(date) => date.format(DATE_DISPLAY_FORMAT).to_string(),
        Err(e) => {
            debug!("Date {:?} does not match {}: {}", trimmed, DATE_INPUT_FORMAT, e);
            trimmed.to_string()
        }
    }
}

fn table_response(def: &FieldDefinition, raw: Option<&RawInputValue>) -> FieldResponse {
    let rows = match raw {
        Some(RawInputValue::Rows(rows)) => rows
            .iter()
            .map(|row| {
                def.columns
                    .iter()
                    .map(|col| row.get(&col.id).map(|cell| cell.trim().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect(),
        _ => vec![vec![String::new(); def.columns.len()]; def.minimum_rows],
    };

    let titles: Vec<&str> = def.columns.iter().map(|col| col.title.as_str()).collect();
    let mut response = build_base(def, Answer::Grid(rows));
    response.question = format!("{} ({})", def.question, titles.join(", "));
    response
}
