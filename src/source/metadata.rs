//! Project metadata as exported by the data-capture system.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coded value → label, in option order.
pub type Choices = IndexMap<String, String>;

/// Field name → its choices, for every multiple-choice field.
pub type ChoiceMap = IndexMap<String, Choices>;

/// Suffix of the per-form completion status field.
pub const FORM_COMPLETE_SUFFIX: &str = "_complete";
/// Suffix of the per-form survey timestamp field.
pub const SURVEY_TIMESTAMP_SUFFIX: &str = "_timestamp";
/// Separates a checkbox field name from an option code in export names.
pub const CHECKBOX_SEPARATOR: &str = "___";

/// One field definition from the project metadata export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataField {
    pub field_name: String,
    pub form_name: String,
    pub field_type: String,
    pub field_label: String,
    /// `1, Yes | 0, No` for choice fields, the formula for calc fields.
    pub select_choices_or_calculations: String,
    pub text_validation_type_or_show_slider_number: String,
    /// `y` when the field is flagged as identifying.
    pub identifier: String,
}

impl MetadataField {
    pub fn source_type(&self) -> SourceFieldType {
        SourceFieldType::from(self.field_type.as_str())
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier.trim().eq_ignore_ascii_case("y")
    }

    /// Parsed choices for checkbox, dropdown and radio fields.
    pub fn choices(&self) -> Option<Choices> {
        if self.source_type().has_choices() {
            Some(parse_choices(&self.select_choices_or_calculations))
        } else {
            None
        }
    }
}

/// An instrument (form) of the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub instrument_name: String,
    pub instrument_label: String,
    /// Enabled as a survey; its responses export a `<form>_timestamp`.
    pub survey_enabled: bool,
}

/// Project level information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub project_id: u64,
    pub project_title: String,
    pub is_longitudinal: bool,
    pub has_repeating_instruments_or_events: bool,
    pub surveys_enabled: bool,
}

/// Source-side field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceFieldType {
    Text,
    Notes,
    Calc,
    Dropdown,
    Radio,
    Checkbox,
    YesNo,
    TrueFalse,
    File,
    Slider,
    Descriptive,
    Sql,
    /// Synthetic `<form>_complete` status field.
    FormComplete,
    /// Synthetic `<form>_timestamp` survey completion field.
    SurveyTimestamp,
    Other(String),
}

impl From<&str> for SourceFieldType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => SourceFieldType::Text,
            "notes" => SourceFieldType::Notes,
            "calc" => SourceFieldType::Calc,
            "dropdown" => SourceFieldType::Dropdown,
            "radio" => SourceFieldType::Radio,
            "checkbox" => SourceFieldType::Checkbox,
            "yesno" => SourceFieldType::YesNo,
            "truefalse" => SourceFieldType::TrueFalse,
            "file" => SourceFieldType::File,
            "slider" => SourceFieldType::Slider,
            "descriptive" => SourceFieldType::Descriptive,
            "sql" => SourceFieldType::Sql,
            "form_complete" => SourceFieldType::FormComplete,
            "survey_timestamp" => SourceFieldType::SurveyTimestamp,
            other => SourceFieldType::Other(other.to_string()),
        }
    }
}

impl SourceFieldType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceFieldType::Text => "text",
            SourceFieldType::Notes => "notes",
            SourceFieldType::Calc => "calc",
            SourceFieldType::Dropdown => "dropdown",
            SourceFieldType::Radio => "radio",
            SourceFieldType::Checkbox => "checkbox",
            SourceFieldType::YesNo => "yesno",
            SourceFieldType::TrueFalse => "truefalse",
            SourceFieldType::File => "file",
            SourceFieldType::Slider => "slider",
            SourceFieldType::Descriptive => "descriptive",
            SourceFieldType::Sql => "sql",
            SourceFieldType::FormComplete => "form_complete",
            SourceFieldType::SurveyTimestamp => "survey_timestamp",
            SourceFieldType::Other(s) => s,
        }
    }

    /// Types whose `select_choices_or_calculations` holds an option list.
    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            SourceFieldType::Dropdown | SourceFieldType::Radio | SourceFieldType::Checkbox
        )
    }

    /// Types that never carry record data.
    pub fn is_display_only(&self) -> bool {
        matches!(self, SourceFieldType::Descriptive)
    }
}

impl fmt::Display for SourceFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a choice list such as `1, Male | 2, Female`.
///
/// Codes are trimmed; labels keep inner commas (`3, Yes, often`).
/// Entries without a comma use the entry as both code and label.
pub fn parse_choices(text: &str) -> Choices {
    text.split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(',') {
            Some((code, label)) => (code.trim().to_string(), label.trim().to_string()),
            None => (entry.to_string(), entry.to_string()),
        })
        .collect()
}

/// Export field names for a metadata listing.
///
/// Checkbox fields expand to one `<name>___<code>` per option, and each
/// form contributes a `<form>_complete` field after its last field. Survey
/// forms (given in `survey_forms`) also get `<form>_timestamp` before their
/// first field.
pub fn export_field_names(metadata: &[MetadataField], survey_forms: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    let mut current_form: Option<&str> = None;

    for field in metadata {
        if current_form != Some(field.form_name.as_str()) {
            if let Some(form) = current_form {
                names.push(format!("{}{}", form, FORM_COMPLETE_SUFFIX));
            }
            if survey_forms.iter().any(|f| f == &field.form_name) {
                names.push(format!("{}{}", field.form_name, SURVEY_TIMESTAMP_SUFFIX));
            }
            current_form = Some(field.form_name.as_str());
        }

        match field.source_type() {
            SourceFieldType::Checkbox => {
                for code in parse_choices(&field.select_choices_or_calculations).keys() {
                    names.push(checkbox_field_name(&field.field_name, code));
                }
            }
            t if t.is_display_only() => {}
            _ => names.push(field.field_name.clone()),
        }
    }

    if let Some(form) = current_form {
        names.push(format!("{}{}", form, FORM_COMPLETE_SUFFIX));
    }

    names
}

/// Export name of one checkbox option, e.g. `race___2`.
///
/// Option codes may be negative (`-1`); the minus sign becomes an
/// underscore as it does in the export.
pub fn checkbox_field_name(field: &str, code: &str) -> String {
    format!(
        "{}{}{}",
        field,
        CHECKBOX_SEPARATOR,
        code.to_lowercase().replace('-', "_")
    )
}
