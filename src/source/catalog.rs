//! Source field catalog.
//!
//! The catalog is the generator's view of the source project: every export
//! field name with its form and type, the record id field, whether the
//! project is longitudinal, and the choice lists of multiple-choice fields.

use indexmap::IndexMap;

use super::metadata::{
    checkbox_field_name, export_field_names, ChoiceMap, Choices, MetadataField, SourceFieldType,
    CHECKBOX_SEPARATOR, FORM_COMPLETE_SUFFIX, SURVEY_TIMESTAMP_SUFFIX,
};
use super::{DataSource, SourceResult};

/// One export field of the source project.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceField {
    /// Export name (`race___1` for a checkbox option).
    pub name: String,
    /// Metadata name (`race` for a checkbox option).
    pub base_name: String,
    pub form: String,
    pub field_type: SourceFieldType,
    pub label: String,
    pub identifier: bool,
    /// Option code for checkbox option fields.
    pub choice_code: Option<String>,
}

/// All export fields of a project, keyed by export name.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    record_id: String,
    longitudinal: bool,
    fields: IndexMap<String, SourceField>,
    choices: ChoiceMap,
}

impl SourceCatalog {
    /// Build a catalog from metadata alone, deriving export names and
    /// choices from it.
    pub fn from_metadata(metadata: &[MetadataField], longitudinal: bool) -> Self {
        Self::from_survey_metadata(metadata, &[], longitudinal)
    }

    /// Like [`SourceCatalog::from_metadata`], with a `<form>_timestamp`
    /// field for each of `survey_forms`.
    pub fn from_survey_metadata(
        metadata: &[MetadataField],
        survey_forms: &[String],
        longitudinal: bool,
    ) -> Self {
        let names = export_field_names(metadata, survey_forms);
        let choices = metadata
            .iter()
            .filter_map(|field| field.choices().map(|c| (field.field_name.clone(), c)))
            .collect();
        Self::from_parts(metadata, &names, choices, longitudinal)
    }

    /// Build a catalog from metadata, export field names and choice lists.
    ///
    /// The record id field is the first metadata field.
    pub fn from_parts(
        metadata: &[MetadataField],
        field_names: &[String],
        choices: ChoiceMap,
        longitudinal: bool,
    ) -> Self {
        let by_name: IndexMap<&str, &MetadataField> = metadata
            .iter()
            .map(|field| (field.field_name.as_str(), field))
            .collect();
        let forms: Vec<&str> = metadata.iter().map(|f| f.form_name.as_str()).collect();

        let fields = field_names
            .iter()
            .map(|name| {
                let field = resolve_export_name(name, &by_name, &forms, &choices);
                (name.clone(), field)
            })
            .collect();

        Self {
            record_id: metadata
                .first()
                .map(|f| f.field_name.clone())
                .unwrap_or_default(),
            longitudinal,
            fields,
            choices,
        }
    }

    /// Fetch everything the catalog needs from a data source.
    pub fn fetch(source: &dyn DataSource) -> SourceResult<Self> {
        let metadata = source.export_metadata()?;
        let field_names = source.field_names()?;
        let choices = source.lookup_choices()?;
        let longitudinal = source.is_longitudinal()?;
        Ok(Self::from_parts(&metadata, &field_names, choices, longitudinal))
    }

    /// Name of the record id field.
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn is_longitudinal(&self) -> bool {
        self.longitudinal
    }

    /// Look up an export field by name.
    pub fn field(&self, name: &str) -> Option<&SourceField> {
        self.fields.get(name)
    }

    /// Look up a field by metadata name, falling back to the first checkbox
    /// option exported under that name.
    pub fn base_field(&self, name: &str) -> Option<&SourceField> {
        self.fields
            .get(name)
            .or_else(|| self.fields.values().find(|field| field.base_name == name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All export fields, in export order.
    pub fn fields(&self) -> impl Iterator<Item = &SourceField> {
        self.fields.values()
    }

    /// Choices of a multiple-choice field, by metadata name.
    pub fn choices(&self, name: &str) -> Option<&Choices> {
        self.choices.get(name)
    }

    pub fn choice_map(&self) -> &ChoiceMap {
        &self.choices
    }

    /// Export names that a transformation is expected to map: everything
    /// except the record id and the synthetic status/timestamp fields.
    pub fn mappable_field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter(|field| {
                field.name != self.record_id
                    && !matches!(
                        field.field_type,
                        SourceFieldType::FormComplete | SourceFieldType::SurveyTimestamp
                    )
            })
            .map(|field| field.name.as_str())
    }
}

fn resolve_export_name(
    name: &str,
    by_name: &IndexMap<&str, &MetadataField>,
    forms: &[&str],
    choices: &ChoiceMap,
) -> SourceField {
    if let Some(meta) = by_name.get(name) {
        return SourceField {
            name: name.to_string(),
            base_name: name.to_string(),
            form: meta.form_name.clone(),
            field_type: meta.source_type(),
            label: meta.field_label.clone(),
            identifier: meta.is_identifier(),
            choice_code: None,
        };
    }

    if let Some((base, _)) = name.split_once(CHECKBOX_SEPARATOR) {
        if let Some(meta) = by_name.get(base) {
            let code = choices.get(base).and_then(|options| {
                options
                    .keys()
                    .find(|code| checkbox_field_name(base, code) == name)
                    .cloned()
            });
            return SourceField {
                name: name.to_string(),
                base_name: base.to_string(),
                form: meta.form_name.clone(),
                field_type: meta.source_type(),
                label: meta.field_label.clone(),
                identifier: meta.is_identifier(),
                choice_code: code,
            };
        }
    }

    let synthetic = [
        (FORM_COMPLETE_SUFFIX, SourceFieldType::FormComplete),
        (SURVEY_TIMESTAMP_SUFFIX, SourceFieldType::SurveyTimestamp),
    ];
    for (suffix, field_type) in synthetic {
        if let Some(form) = name.strip_suffix(suffix) {
            if forms.contains(&form) {
                return SourceField {
                    name: name.to_string(),
                    base_name: name.to_string(),
                    form: form.to_string(),
                    field_type,
                    label: String::new(),
                    identifier: false,
                    choice_code: None,
                };
            }
        }
    }

    SourceField {
        name: name.to_string(),
        base_name: name.to_string(),
        form: String::new(),
        field_type: SourceFieldType::Other(String::new()),
        label: String::new(),
        identifier: false,
        choice_code: None,
    }
}
