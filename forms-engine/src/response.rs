//! Canonical field responses shared by the submission and review paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::{AnswerShape, FieldDefinition, FieldKind};
use crate::input::{scalar_to_string, RawInputValue};
use crate::transform;

/// The answer payload of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Serialized as `answer`.
    Single(String),
    /// Serialized as `answerArray`.
    List(Vec<String>),
    /// Serialized as `answerArray` of rows.
    Grid(Vec<Vec<String>>),
}

impl Answer {
    pub fn empty() -> Self {
        Answer::Single(String::new())
    }

    pub fn shape(&self) -> AnswerShape {
        match self {
            Answer::Single(_) => AnswerShape::Single,
            Answer::List(_) => AnswerShape::List,
            Answer::Grid(_) => AnswerShape::Grid,
        }
    }

    /// Coerce into `shape`. Identity when the shape already matches, so
    /// applying it twice is the same as applying it once.
    pub fn into_shape(self, shape: AnswerShape) -> Self {
        match (shape, self) {
            (AnswerShape::None, answer) => answer,
            (AnswerShape::Single, Answer::Single(s)) => Answer::Single(s),
            (AnswerShape::Single, Answer::List(cells)) => Answer::Single(cells.join(", ")),
            (AnswerShape::Single, Answer::Grid(rows)) => Answer::Single(
                rows.into_iter().flatten().collect::<Vec<_>>().join(", "),
            ),
            (AnswerShape::List, Answer::Single(s)) if s.is_empty() => Answer::List(Vec::new()),
            (AnswerShape::List, Answer::Single(s)) => Answer::List(vec![s]),
            (AnswerShape::List, Answer::List(cells)) => Answer::List(cells),
            (AnswerShape::List, Answer::Grid(rows)) => {
                Answer::List(rows.into_iter().flatten().collect())
            }
            (AnswerShape::Grid, Answer::Single(s)) if s.is_empty() => Answer::Grid(Vec::new()),
            (AnswerShape::Grid, Answer::Single(s)) => Answer::Grid(vec![vec![s]]),
            (AnswerShape::Grid, Answer::List(cells)) => {
                Answer::Grid(cells.into_iter().map(|c| vec![c]).collect())
            }
            (AnswerShape::Grid, Answer::Grid(rows)) => Answer::Grid(rows),
        }
    }

    fn from_array(items: &[Value]) -> Self {
        if !items.is_empty() && items.iter().all(Value::is_array) {
            let rows = items
                .iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|c| scalar_to_string(c).unwrap_or_default())
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect();
            Answer::Grid(rows)
        } else {
            Answer::List(items.iter().filter_map(scalar_to_string).collect())
        }
    }
}

/// One field's answer in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireFieldResponse", into = "WireFieldResponse")]
pub struct FieldResponse {
    pub id: String,
    pub field_type: FieldKind,
    pub question: String,
    pub answer: Answer,
    /// Verification signature, email and mobile only.
    pub signature: Option<String>,
    /// Set on section headers only.
    pub is_header: Option<bool>,
    /// Where to fetch the attachment from. Review path only.
    pub download_url: Option<String>,
}

/// Identity fields shared by every response kind.
pub fn build_base(def: &FieldDefinition, answer: Answer) -> FieldResponse {
    FieldResponse {
        id: def.id.clone(),
        field_type: def.field_type,
        question: def.question.clone(),
        answer,
        signature: None,
        is_header: None,
        download_url: None,
    }
}

impl FieldResponse {
    /// The single-string answer, if this response carries one.
    pub fn answer_text(&self) -> Option<&str> {
        match &self.answer {
            Answer::Single(s) => Some(s),
            _ => None,
        }
    }

    /// Bring a response into the canonical shape for its kind. Idempotent.
    pub fn normalize(mut self) -> Self {
        self.answer = self.answer.into_shape(self.field_type.answer_shape());
        if self.field_type == FieldKind::Section {
            self.is_header = Some(true);
        } else {
            self.is_header = None;
        }
        if !self.field_type.is_verifiable_kind() {
            self.signature = None;
        }
        self
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFieldResponse {
    #[serde(rename = "_id")]
    id: String,
    field_type: FieldKind,
    #[serde(default)]
    question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer_array: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
}

impl From<WireFieldResponse> for FieldResponse {
    fn from(wire: WireFieldResponse) -> Self {
        let mut signature = wire.signature;
        let answer = match (wire.answer_array, wire.answer) {
            (Some(Value::Array(items)), _) => Answer::from_array(&items),
            (_, Some(Value::Array(items))) => Answer::from_array(&items),
            (_, Some(structured @ Value::Object(_))) => {
                // Older clients stored the raw `{value, othersInput}` or
                // `{value, signature}` object instead of the rendered answer.
                let def = FieldDefinition::new(wire.id.clone(), wire.field_type, wire.question.clone());
                let raw = RawInputValue::from_json(wire.field_type, &structured);
                match transform::transform(&def, raw.as_ref()) {
                    Some(rendered) => {
                        signature = signature.or(rendered.signature);
                        rendered.answer
                    }
                    None => Answer::empty(),
                }
            }
            (_, Some(scalar)) => Answer::Single(scalar_to_string(&scalar).unwrap_or_default()),
            (_, None) => Answer::empty(),
        };

        FieldResponse {
            id: wire.id,
            field_type: wire.field_type,
            question: wire.question,
            answer,
            signature,
            is_header: wire.is_header,
            download_url: wire.download_url,
        }
        .normalize()
    }
}

impl From<FieldResponse> for WireFieldResponse {
    fn from(response: FieldResponse) -> Self {
        let (answer, answer_array) = match response.answer {
            Answer::Single(s) => (Some(Value::String(s)), None),
            Answer::List(cells) => (
                None,
                Some(Value::Array(cells.into_iter().map(Value::String).collect())),
            ),
            Answer::Grid(rows) => (
                None,
                Some(Value::Array(
                    rows.into_iter()
                        .map(|row| Value::Array(row.into_iter().map(Value::String).collect()))
                        .collect(),
                )),
            ),
        };
        WireFieldResponse {
            id: response.id,
            field_type: response.field_type,
            question: response.question,
            answer,
            answer_array,
            signature: response.signature,
            is_header: response.is_header,
            download_url: response.download_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_answers_serialize_under_answer() {
        let def = FieldDefinition::new("f1", FieldKind::ShortText, "Name");
        let value = serde_json::to_value(build_base(&def, Answer::Single("Ada".into()))).unwrap();
        assert_eq!(
            value,
            json!({"_id": "f1", "fieldType": "textfield", "question": "Name", "answer": "Ada"})
        );
    }

    #[test]
    fn grid_answers_serialize_under_answer_array() {
        let def = FieldDefinition::new("t1", FieldKind::Table, "Family (Name)");
        let response = build_base(&def, Answer::Grid(vec![vec!["Ada".into()]]));
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["answerArray"], json!([["Ada"]]));
        assert!(value.get("answer").is_none());
    }

    #[test]
    fn empty_answer_array_on_a_table_stays_a_grid() {
        let response: FieldResponse = serde_json::from_value(json!({
            "_id": "t1", "fieldType": "table", "question": "Q", "answerArray": []
        }))
        .unwrap();
        assert_eq!(response.answer, Answer::Grid(Vec::new()));
    }

    #[test]
    fn legacy_radio_object_is_rendered() {
        let response: FieldResponse = serde_json::from_value(json!({
            "_id": "r1", "fieldType": "radiobutton", "question": "Colour",
            "answer": {"othersInput": "Teal"}
        }))
        .unwrap();
        assert_eq!(response.answer_text(), Some("Others: Teal"));
    }

    #[test]
    fn legacy_checkbox_string_becomes_a_single_element_list() {
        let response: FieldResponse = serde_json::from_value(json!({
            "_id": "c1", "fieldType": "checkbox", "question": "Pets", "answer": "Cat, Dog"
        }))
        .unwrap();
        assert_eq!(response.answer, Answer::List(vec!["Cat, Dog".into()]));
    }

    #[test]
    fn section_header_flag_is_restored() {
        let response: FieldResponse = serde_json::from_value(json!({
            "_id": "s1", "fieldType": "section", "question": "Part A", "answer": ""
        }))
        .unwrap();
        assert_eq!(response.is_header, Some(true));
    }

    #[test]
    fn normalize_is_idempotent() {
        let def = FieldDefinition::new("c1", FieldKind::Children, "Kids");
        let once = build_base(&def, Answer::List(vec!["Ann".into(), "Ben".into()])).normalize();
        assert_eq!(once.answer, Answer::Grid(vec![vec!["Ann".into()], vec!["Ben".into()]]));
        assert_eq!(once.clone().normalize(), once);
    }
}
