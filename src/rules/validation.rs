//! Semantic validation for parsed rules.
//!
//! This module checks, in order:
//! - No table is defined twice (the first definition wins)
//! - Every non-root table names a parent table that exists
//! - Choice destination types agree with the source field type
//!
//! Errors are attached to the offending rules.

use std::collections::HashMap;

use super::ast::*;
use crate::source::{SourceCatalog, SourceFieldType};

/// Validate a parsed rule set in place.
///
/// `catalog` is optional so rules can be checked on their own; the choice
/// type check only runs when source metadata is available.
///
/// # Example
///
/// ```ignore
/// use strata::rules::{parse_rules, validation};
///
/// let mut rules = parse_rules(source);
/// validation::validate(&mut rules, Some(&catalog));
/// for diag in rules.diagnostics() {
///     eprintln!("{}", diag);
/// }
/// ```
pub fn validate(rules: &mut RuleSet, catalog: Option<&SourceCatalog>) {
    let tables = check_duplicate_tables(rules);
    check_parent_tables(rules, &tables);
    if let Some(catalog) = catalog {
        check_choice_types(rules, catalog);
    }
}

/// Register table names; later duplicates get an error.
///
/// Returns table name → line of its first definition.
fn check_duplicate_tables(rules: &mut RuleSet) -> HashMap<String, usize> {
    let mut tables: HashMap<String, usize> = HashMap::new();

    for rule in &mut rules.rules {
        let Rule::Table(table) = rule else { continue };
        if table.name.is_empty() {
            continue;
        }
        match tables.get(&table.name) {
            Some(first_line) => {
                let message = format!(
                    "Table '{}' has already been defined (first defined at line {})",
                    table.name, first_line
                );
                table.errors.push(message);
            }
            None => {
                tables.insert(table.name.clone(), table.line);
            }
        }
    }

    tables
}

fn check_parent_tables(rules: &mut RuleSet, tables: &HashMap<String, usize>) {
    for rule in &mut rules.rules {
        let Rule::Table(table) = rule else { continue };
        if table.is_root() || table.parent.is_empty() || table.rows_types.is_empty() {
            continue;
        }
        if table.parent == table.name {
            let message = format!("Table '{}' cannot be its own parent", table.name);
            table.errors.push(message);
        } else if !tables.contains_key(&table.parent) {
            let message = format!(
                "Parent table '{}' of table '{}' is not defined",
                table.parent, table.name
            );
            table.errors.push(message);
        }
    }
}

fn check_choice_types(rules: &mut RuleSet, catalog: &SourceCatalog) {
    for rule in &mut rules.rules {
        let Rule::Field(field) = rule else { continue };
        let Some(field_type) = field.field_type else { continue };
        if !field_type.is_choice() {
            continue;
        }
        let Some(source) = catalog.base_field(&field.name) else { continue };

        let expected = match field_type {
            FieldType::Checkbox | FieldType::CheckboxList => SourceFieldType::Checkbox,
            FieldType::Dropdown => SourceFieldType::Dropdown,
            FieldType::Radio => SourceFieldType::Radio,
            _ => continue,
        };

        if source.field_type != expected {
            let message = format!(
                "Field '{}' is declared as {} but its source type is '{}'",
                field.name, field_type, source.field_type
            );
            field.errors.push(message);
        }
    }
}
