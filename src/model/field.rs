//! Destination fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::lexer::split_sized_type;
use crate::source::SourceFieldType;

use super::FieldType;

// ============================================================================
// System column names
// ============================================================================

pub const DATA_SOURCE_COLUMN: &str = "redcap_data_source";
pub const EVENT_NAME_COLUMN: &str = "redcap_event_name";
pub const REPEAT_INSTRUMENT_COLUMN: &str = "redcap_repeat_instrument";
pub const REPEAT_INSTANCE_COLUMN: &str = "redcap_repeat_instance";
pub const SUFFIX_COLUMN: &str = "redcap_suffix";
pub const SURVEY_IDENTIFIER_COLUMN: &str = "redcap_survey_identifier";
pub const DATA_ACCESS_GROUP_COLUMN: &str = "redcap_data_access_group";

/// Value the source exports for a survey that was never completed.
pub const NOT_COMPLETED_TIMESTAMP: &str = "[not completed]";

/// Columns the engine fills from record context rather than field data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemColumn {
    /// Task identifier of the run that produced the row.
    DataSource,
    EventName,
    RepeatInstrument,
    RepeatInstance,
    /// The accumulated suffix the row was created under.
    Suffix,
    SurveyIdentifier,
    DataAccessGroup,
}

impl SystemColumn {
    pub fn column_name(self) -> &'static str {
        match self {
            SystemColumn::DataSource => DATA_SOURCE_COLUMN,
            SystemColumn::EventName => EVENT_NAME_COLUMN,
            SystemColumn::RepeatInstrument => REPEAT_INSTRUMENT_COLUMN,
            SystemColumn::RepeatInstance => REPEAT_INSTANCE_COLUMN,
            SystemColumn::Suffix => SUFFIX_COLUMN,
            SystemColumn::SurveyIdentifier => SURVEY_IDENTIFIER_COLUMN,
            SystemColumn::DataAccessGroup => DATA_ACCESS_GROUP_COLUMN,
        }
    }
}

/// How the transform fills a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Synthetic key issued by the table's counter.
    PrimaryKey,
    /// The parent row's primary key.
    ForeignKey,
    /// The source record id, copied verbatim.
    RecordId,
    System(SystemColumn),
    /// A plain source value.
    Value,
    /// One option of a checkbox field (`1` checked, `0` unchecked).
    CheckboxOption { code: String },
    /// Checked option codes of a checkbox field, comma-joined.
    CheckboxList { codes: Vec<String> },
    /// Label of the choice field with destination name `target`.
    Label { target: String },
}

impl FieldKind {
    /// Fields that carry record data and take part in the data-found
    /// decision.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            FieldKind::Value | FieldKind::CheckboxOption { .. } | FieldKind::CheckboxList { .. }
        )
    }
}

/// A destination column type, e.g. `varchar(255)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnType {
    pub field_type: FieldType,
    pub size: Option<u32>,
}

impl ColumnType {
    pub const fn new(field_type: FieldType, size: Option<u32>) -> Self {
        Self { field_type, size }
    }

    pub const fn sized(field_type: FieldType, size: u32) -> Self {
        Self::new(field_type, Some(size))
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, size) =
            split_sized_type(s).ok_or_else(|| format!("Invalid column type '{}'", s))?;
        let field_type: FieldType = base
            .parse()
            .map_err(|_| format!("Unknown column type '{}'", base))?;
        Ok(Self { field_type, size })
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "{}({})", self.field_type, size),
            None => write!(f, "{}", self.field_type),
        }
    }
}

/// A destination field of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Source name, without any suffix.
    pub name: String,
    pub field_type: FieldType,
    pub size: Option<u32>,
    /// Destination column name.
    pub db_name: String,
    /// Type of the source field, when it maps to one.
    pub source_type: Option<SourceFieldType>,
    /// Source field name used as the lookup key for choice labels.
    pub uses_lookup: Option<String>,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, column_type: ColumnType, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            field_type: column_type.field_type,
            size: column_type.size,
            source_type: None,
            uses_lookup: None,
            kind,
        }
    }

    /// A plain value field.
    pub fn value(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, FieldKind::Value)
    }

    /// A system column.
    pub fn system(column: SystemColumn, column_type: ColumnType) -> Self {
        Self::new(column.column_name(), column_type, FieldKind::System(column))
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_source_type(mut self, source_type: Option<SourceFieldType>) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_lookup(mut self, lookup: impl Into<String>) -> Self {
        self.uses_lookup = Some(lookup.into());
        self
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::new(self.field_type, self.size)
    }

    pub fn is_primary_key(&self) -> bool {
        self.kind == FieldKind::PrimaryKey
    }
}
