//! The transformation rules language.
//!
//! Rules describe how source records fold into destination tables:
//!
//! ```text
//! # one row per record
//! TABLE,demographics,demographics_id,ROOT
//! FIELD,age,int
//! FIELD,sex,varchar(1)
//!
//! # one row per visit suffix, children of demographics
//! TABLE,visits,demographics,SUFFIXES:_v1;_v2
//! FIELD,weight,float
//! ```
//!
//! Parsing ([`parse_rules`]) and semantic validation
//! ([`validation::validate`]) both attach their findings to the rule
//! nodes; [`RuleSet::diagnostics`] flattens them for reporting.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod validation;

pub use ast::*;
pub use parser::parse_rules;

use crate::source::SourceCatalog;

/// Parse and validate a rules document in one step.
pub fn parse_and_validate(source: &str, catalog: Option<&SourceCatalog>) -> RuleSet {
    let mut rules = parse_rules(source);
    validation::validate(&mut rules, catalog);
    rules
}

/// Read a rules document from disk and parse it.
///
/// # Errors
///
/// Returns an `io::Error` if the file cannot be read.
pub fn parse_file(path: &std::path::Path) -> std::io::Result<RuleSet> {
    let source = std::fs::read_to_string(path)?;
    Ok(parse_rules(&source))
}

impl RuleSet {
    /// All rule errors as line-tagged diagnostics, in file order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.rules
            .iter()
            .flat_map(|rule| {
                rule.errors()
                    .iter()
                    .map(move |message| Diagnostic::error(rule.line(), message.clone()))
            })
            .collect()
    }
}

/// A diagnostic message tied to a rules line.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// 1-based line number in the rules document.
    pub line: usize,
    /// The severity level.
    pub severity: Severity,
    /// The diagnostic message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A fatal error that prevents schema generation.
    Error,
    /// A warning that doesn't prevent schema generation.
    Warning,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} (line {})", level, self.message, self.line)
    }
}

impl std::error::Error for Diagnostic {}
