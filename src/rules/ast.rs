//! AST node types for the transformation rules language.
//!
//! A rules document is line oriented. Every non-blank, non-comment line
//! becomes one [`Rule`]:
//! - `TABLE,<name>,<parent-or-key>,<rows-type>` → [`TableRule`]
//! - `FIELD,<source>,<type>[,<destination>]` → [`FieldRule`]
//! - anything else → [`InvalidRule`]
//!
//! Problems are attached to the rule they concern instead of aborting the
//! parse, so one pass reports everything wrong with a document.

use std::fmt;
use std::str::FromStr;

// ============================================================================
// Rule set (root)
// ============================================================================

/// All rules parsed from one rules document, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Iterate over the table rules.
    pub fn table_rules(&self) -> impl Iterator<Item = &TableRule> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Iterate over the field rules.
    pub fn field_rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Field(field) => Some(field),
            _ => None,
        })
    }

    /// Returns true if any rule carries an error.
    pub fn has_errors(&self) -> bool {
        self.rules.iter().any(|rule| !rule.errors().is_empty())
    }

    /// Total number of errors across all rules.
    pub fn error_count(&self) -> usize {
        self.rules.iter().map(|rule| rule.errors().len()).sum()
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A single parsed line of the rules document.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// `TABLE,...`
    Table(TableRule),
    /// `FIELD,...`
    Field(FieldRule),
    /// A line whose first token is not a known rule kind.
    Invalid(InvalidRule),
}

impl Rule {
    /// 1-based line number in the rules document.
    pub fn line(&self) -> usize {
        match self {
            Rule::Table(rule) => rule.line,
            Rule::Field(rule) => rule.line,
            Rule::Invalid(rule) => rule.line,
        }
    }

    /// The original text of the line.
    pub fn text(&self) -> &str {
        match self {
            Rule::Table(rule) => &rule.text,
            Rule::Field(rule) => &rule.text,
            Rule::Invalid(rule) => &rule.text,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Rule::Table(rule) => &rule.errors,
            Rule::Field(rule) => &rule.errors,
            Rule::Invalid(rule) => &rule.errors,
        }
    }

    /// Attach an error to this rule.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let errors = match self {
            Rule::Table(rule) => &mut rule.errors,
            Rule::Field(rule) => &mut rule.errors,
            Rule::Invalid(rule) => &mut rule.errors,
        };
        errors.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }
}

/// `TABLE,<name>,<parent-or-key>,<rows-type>`
#[derive(Debug, Clone, PartialEq)]
pub struct TableRule {
    pub line: usize,
    pub text: String,
    pub errors: Vec<String>,
    /// Table name (without prefix).
    pub name: String,
    /// Parent table name, or the primary key name for root tables.
    pub parent: String,
    /// The sanitized rows type definition as written.
    pub rows_def: String,
    /// Decoded rows types, in definition order.
    pub rows_types: Vec<RowsType>,
    /// Suffixes shared by all rows types of this table.
    pub suffixes: Vec<String>,
}

impl TableRule {
    /// Root tables name a primary key instead of a parent table.
    pub fn is_root(&self) -> bool {
        self.rows_types.contains(&RowsType::Root)
    }

    pub fn has_suffixes(&self) -> bool {
        !self.suffixes.is_empty()
    }
}

/// `FIELD,<source>,<type>[,<destination>]`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub line: usize,
    pub text: String,
    pub errors: Vec<String>,
    /// Source field name (without suffix).
    pub name: String,
    /// Destination type, `None` if the type token was not recognized.
    pub field_type: Option<FieldType>,
    /// Optional size, e.g. `255` for `varchar(255)`.
    pub size: Option<u32>,
    /// Destination column name.
    pub db_name: String,
    /// Name of the table rule this field belongs to.
    pub table: Option<String>,
}

/// A line whose kind was not recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRule {
    pub line: usize,
    pub text: String,
    pub errors: Vec<String>,
}

// ============================================================================
// Rows types
// ============================================================================

/// How many rows a table may receive per record group, and which source
/// records feed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowsType {
    /// At most one row per record group.
    Root,
    /// One row per event.
    ByEvents,
    /// One row per suffix.
    BySuffixes,
    /// One row per (event, suffix) pair.
    ByEventsSuffixes,
    /// One row per repeating instrument instance.
    ByRepeatingInstruments,
    /// One row per repeating event instance.
    ByRepeatingEvents,
    /// One row per (repeating instrument instance, suffix) pair.
    ByRepeatingInstrumentsSuffixes,
    /// One row per (repeating event instance, suffix) pair.
    ByRepeatingEventsSuffixes,
}

impl RowsType {
    /// Decode a rows type keyword. `has_suffixes` selects the suffixed
    /// variant for keywords that have one.
    ///
    /// Returns `None` for unknown keywords and for keyword/suffix
    /// combinations that do not exist (`ROOT` with suffixes, `SUFFIXES`
    /// without).
    pub fn from_keyword(keyword: &str, has_suffixes: bool) -> Option<Self> {
        match (keyword.to_uppercase().as_str(), has_suffixes) {
            ("ROOT", false) => Some(RowsType::Root),
            ("EVENTS", false) => Some(RowsType::ByEvents),
            ("EVENTS", true) => Some(RowsType::ByEventsSuffixes),
            ("SUFFIXES", true) => Some(RowsType::BySuffixes),
            ("REPEATING_INSTRUMENTS", false) => Some(RowsType::ByRepeatingInstruments),
            ("REPEATING_INSTRUMENTS", true) => Some(RowsType::ByRepeatingInstrumentsSuffixes),
            ("REPEATING_EVENTS", false) => Some(RowsType::ByRepeatingEvents),
            ("REPEATING_EVENTS", true) => Some(RowsType::ByRepeatingEventsSuffixes),
            _ => None,
        }
    }

    /// The keyword this rows type is written with.
    pub fn keyword(&self) -> &'static str {
        match self {
            RowsType::Root => "ROOT",
            RowsType::ByEvents | RowsType::ByEventsSuffixes => "EVENTS",
            RowsType::BySuffixes => "SUFFIXES",
            RowsType::ByRepeatingInstruments | RowsType::ByRepeatingInstrumentsSuffixes => {
                "REPEATING_INSTRUMENTS"
            }
            RowsType::ByRepeatingEvents | RowsType::ByRepeatingEventsSuffixes => {
                "REPEATING_EVENTS"
            }
        }
    }

    pub fn has_suffixes(&self) -> bool {
        matches!(
            self,
            RowsType::BySuffixes
                | RowsType::ByEventsSuffixes
                | RowsType::ByRepeatingInstrumentsSuffixes
                | RowsType::ByRepeatingEventsSuffixes
        )
    }

    /// Rows keyed by event (plain or repeating).
    pub fn has_events(&self) -> bool {
        matches!(
            self,
            RowsType::ByEvents
                | RowsType::ByEventsSuffixes
                | RowsType::ByRepeatingEvents
                | RowsType::ByRepeatingEventsSuffixes
        )
    }

    pub fn is_repeating_instruments(&self) -> bool {
        matches!(
            self,
            RowsType::ByRepeatingInstruments | RowsType::ByRepeatingInstrumentsSuffixes
        )
    }

    pub fn is_repeating_events(&self) -> bool {
        matches!(
            self,
            RowsType::ByRepeatingEvents | RowsType::ByRepeatingEventsSuffixes
        )
    }

    pub fn is_repeating(&self) -> bool {
        self.is_repeating_instruments() || self.is_repeating_events()
    }
}

impl fmt::Display for RowsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_suffixes() && *self != RowsType::BySuffixes {
            write!(f, "{}:SUFFIXES", self.keyword())
        } else {
            write!(f, "{}", self.keyword())
        }
    }
}

// ============================================================================
// Field types
// ============================================================================

/// Destination field types accepted in `FIELD` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Float,
    String,
    Char,
    Varchar,
    Date,
    Datetime,
    /// One destination column per checkbox option.
    Checkbox,
    /// A single column holding the checked option codes.
    CheckboxList,
    Dropdown,
    Radio,
    AutoIncrement,
}

/// Parses a field type name (case-insensitive).
impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int" => Ok(FieldType::Int),
            "float" => Ok(FieldType::Float),
            "string" => Ok(FieldType::String),
            "char" => Ok(FieldType::Char),
            "varchar" => Ok(FieldType::Varchar),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "checkbox" => Ok(FieldType::Checkbox),
            "checkboxlist" => Ok(FieldType::CheckboxList),
            "dropdown" => Ok(FieldType::Dropdown),
            "radio" => Ok(FieldType::Radio),
            "auto_increment" | "auto-increment" => Ok(FieldType::AutoIncrement),
            other => Err(format!("Unknown field type '{}'", other)),
        }
    }
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Char => "char",
            FieldType::Varchar => "varchar",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Checkbox => "checkbox",
            FieldType::CheckboxList => "checkboxlist",
            FieldType::Dropdown => "dropdown",
            FieldType::Radio => "radio",
            FieldType::AutoIncrement => "auto_increment",
        }
    }

    /// Types whose values are coded choices backed by the lookup table.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Checkbox | FieldType::CheckboxList | FieldType::Dropdown | FieldType::Radio
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
