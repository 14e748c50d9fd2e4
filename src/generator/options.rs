use crate::model::{ColumnType, FieldType, SystemTypes};

pub const DEFAULT_LABEL_FIELD_SUFFIX: &str = "_label";
pub const DEFAULT_LABEL_VIEW_SUFFIX: &str = "_label_view";
pub const DEFAULT_LOOKUP_TABLE_NAME: &str = "Lookup";

/// Settings that shape the generated schema.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// Type of primary and foreign keys.
    pub key_type: ColumnType,
    /// Type of event and repeating instrument name columns.
    pub name_type: ColumnType,
    pub instance_type: ColumnType,
    pub suffix_type: ColumnType,
    pub record_id_type: ColumnType,
    pub label_type: ColumnType,
    /// Prepended to every data table name.
    pub table_prefix: String,
    /// Add a `<field>_label` column next to each choice field.
    pub label_fields: bool,
    pub label_field_suffix: String,
    pub label_view_suffix: String,
    pub lookup_table_name: String,
    /// Task identifier written to the data source column.
    pub data_source: String,
    pub include_survey_fields: bool,
    pub include_dag_fields: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        let name = ColumnType::sized(FieldType::Varchar, 255);
        Self {
            key_type: ColumnType::new(FieldType::Int, None),
            name_type: name,
            instance_type: ColumnType::new(FieldType::Int, None),
            suffix_type: name,
            record_id_type: name,
            label_type: name,
            table_prefix: String::new(),
            label_fields: false,
            label_field_suffix: DEFAULT_LABEL_FIELD_SUFFIX.to_string(),
            label_view_suffix: DEFAULT_LABEL_VIEW_SUFFIX.to_string(),
            lookup_table_name: DEFAULT_LOOKUP_TABLE_NAME.to_string(),
            data_source: String::new(),
            include_survey_fields: false,
            include_dag_fields: false,
        }
    }
}

impl GeneratorOptions {
    pub fn system_types(&self) -> SystemTypes {
        SystemTypes {
            key: self.key_type,
            name: self.name_type,
            label: self.label_type,
        }
    }
}
