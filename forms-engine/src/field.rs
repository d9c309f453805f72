//! Form field definitions as authored by the schema backend.

use serde::{Deserialize, Serialize};

/// Every field type a form can contain.
///
/// Serialized with the platform's wire names so schemas and decrypted
/// responses round-trip without a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "section")]
    Section,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "textfield")]
    ShortText,
    #[serde(rename = "textarea")]
    LongText,
    #[serde(rename = "homeno")]
    HomeNumber,
    #[serde(rename = "dropdown")]
    Dropdown,
    #[serde(rename = "country_region")]
    CountryRegion,
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "nric")]
    Nric,
    #[serde(rename = "uen")]
    Uen,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "yes_no")]
    YesNo,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "mobile")]
    Mobile,
    #[serde(rename = "checkbox")]
    Checkbox,
    #[serde(rename = "radiobutton")]
    Radio,
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "attachment")]
    Attachment,
    #[serde(rename = "statement")]
    Statement,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "children")]
    Children,
}

/// Payload variant a field kind's canonical response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    /// `answer: string`
    Single,
    /// `answerArray: string[]`
    List,
    /// `answerArray: string[][]`
    Grid,
    /// Kind never produces a response.
    None,
}

impl FieldKind {
    /// All kinds, in declaration order.
    pub const ALL: [FieldKind; 22] = [
        FieldKind::Section,
        FieldKind::Number,
        FieldKind::Decimal,
        FieldKind::ShortText,
        FieldKind::LongText,
        FieldKind::HomeNumber,
        FieldKind::Dropdown,
        FieldKind::CountryRegion,
        FieldKind::Rating,
        FieldKind::Nric,
        FieldKind::Uen,
        FieldKind::Date,
        FieldKind::YesNo,
        FieldKind::Email,
        FieldKind::Mobile,
        FieldKind::Checkbox,
        FieldKind::Radio,
        FieldKind::Table,
        FieldKind::Attachment,
        FieldKind::Statement,
        FieldKind::Image,
        FieldKind::Children,
    ];

    /// The canonical payload shape for this kind. Both the submission and
    /// review paths build responses against this.
    pub const fn answer_shape(self) -> AnswerShape {
        match self {
            FieldKind::Section
            | FieldKind::Number
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
            | FieldKind::YesNo
            | FieldKind::Email
            | FieldKind::Mobile
            | FieldKind::Radio
            | FieldKind::Attachment => AnswerShape::Single,
            FieldKind::Checkbox => AnswerShape::List,
            FieldKind::Table | FieldKind::Children => AnswerShape::Grid,
            FieldKind::Statement | FieldKind::Image => AnswerShape::None,
        }
    }

    /// Whether responses of this kind may carry a verification signature.
    pub const fn is_verifiable_kind(self) -> bool {
        matches!(self, FieldKind::Email | FieldKind::Mobile)
    }
}

/// One column of a table field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

/// Server-authored description of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(rename = "_id")]
    pub id: String,
    pub field_type: FieldKind,
    #[serde(rename = "title")]
    pub question: String,
    /// Table columns in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
    /// Rows a table starts with when the respondent has not added any.
    #[serde(default)]
    pub minimum_rows: usize,
    /// Sub-field labels of a compound (children) field.
    #[serde(default, rename = "childrenSubFields", skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<String>,
    #[serde(default)]
    pub is_verifiable: bool,
    #[serde(default)]
    pub has_auto_reply: bool,
}

impl FieldDefinition {
    /// Definition with no kind-specific metadata.
    pub fn new(id: impl Into<String>, field_type: FieldKind, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            question: question.into(),
            columns: Vec::new(),
            minimum_rows: 0,
            sub_fields: Vec::new(),
            is_verifiable: false,
            has_auto_reply: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>, minimum_rows: usize) -> Self {
        self.columns = columns;
        self.minimum_rows = minimum_rows;
        self
    }

    pub fn with_sub_fields(mut self, sub_fields: Vec<String>) -> Self {
        self.sub_fields = sub_fields;
        self
    }

    pub fn verifiable(mut self) -> Self {
        self.is_verifiable = true;
        self
    }

    pub fn auto_reply(mut self) -> Self {
        self.has_auto_reply = true;
        self
    }
}

impl Column {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Ordered field definitions of one form.
pub type FormSchema = Vec<FieldDefinition>;
