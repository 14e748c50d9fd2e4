//! Parser for the rules language.
//!
//! Turns the lines produced by the lexer into [`Rule`] nodes. The parser
//! never fails: every problem becomes an error string on the rule it was
//! found in.

use super::ast::*;
use super::lexer::{self, RowsItem};

/// Parse a rules document into a [`RuleSet`].
pub fn parse_rules(source: &str) -> RuleSet {
    let mut parser = RuleParser::default();
    for (line_number, line) in lexer::rule_lines(source) {
        let rule = parser.parse_line(line_number, line);
        parser.rules.push(rule);
    }
    RuleSet {
        rules: parser.rules,
    }
}

/// Parser state: the table that field rules are currently attached to.
#[derive(Default)]
struct RuleParser {
    rules: Vec<Rule>,
    current_table: Option<(String, Vec<String>)>,
}

impl RuleParser {
    fn parse_line(&mut self, line: usize, text: &str) -> Rule {
        let fields = lexer::split_fields(text);
        let kind = fields.first().map(|k| k.to_uppercase()).unwrap_or_default();

        match kind.as_str() {
            "TABLE" => {
                let rule = parse_table_rule(line, text, &fields);
                self.current_table = Some((rule.name.clone(), rule.suffixes.clone()));
                Rule::Table(rule)
            }
            "FIELD" => Rule::Field(self.parse_field_rule(line, text, &fields)),
            _ => Rule::Invalid(InvalidRule {
                line,
                text: text.to_string(),
                errors: vec![format!("Unrecognized rule type '{}'", kind)],
            }),
        }
    }

    fn parse_field_rule(&self, line: usize, text: &str, fields: &[&str]) -> FieldRule {
        let mut errors = Vec::new();

        if fields.len() < 3 {
            errors.push(
                "Field rule requires a field name and a field type (FIELD,<name>,<type>)"
                    .to_string(),
            );
        }

        let name = fields.get(1).map(|s| lexer::sanitize_name(s)).unwrap_or_default();
        if name.is_empty() && fields.len() >= 3 {
            errors.push("Missing field name".to_string());
        }

        let type_token = fields
            .get(2)
            .map(|s| lexer::sanitize_type(s).to_lowercase())
            .unwrap_or_default();

        let (field_type, size) = match lexer::split_sized_type(&type_token) {
            Some((base, size)) => match base.parse::<FieldType>() {
                Ok(field_type) => (Some(field_type), size),
                Err(_) => {
                    if fields.len() >= 3 {
                        errors.push(format!("Invalid field type '{}'", type_token));
                    }
                    (None, None)
                }
            },
            None => {
                errors.push(format!("Invalid field type '{}'", type_token));
                (None, None)
            }
        };

        let explicit_db_name = fields
            .get(3)
            .map(|s| lexer::sanitize_name(s))
            .filter(|s| !s.is_empty());

        let (table, suffixes) = match &self.current_table {
            Some((table, suffixes)) => (Some(table.clone()), suffixes.as_slice()),
            None => {
                errors.push("Field rule appears before any table rule".to_string());
                (None, &[][..])
            }
        };

        let db_name = explicit_db_name.unwrap_or_else(|| strip_suffix(&name, suffixes));

        FieldRule {
            line,
            text: text.to_string(),
            errors,
            name,
            field_type,
            size,
            db_name,
            table,
        }
    }
}

fn parse_table_rule(line: usize, text: &str, fields: &[&str]) -> TableRule {
    let mut rule = TableRule {
        line,
        text: text.to_string(),
        errors: Vec::new(),
        name: fields.get(1).map(|s| lexer::sanitize_name(s)).unwrap_or_default(),
        parent: fields.get(2).map(|s| lexer::sanitize_name(s)).unwrap_or_default(),
        rows_def: fields.get(3).map(|s| lexer::sanitize_rows_def(s)).unwrap_or_default(),
        rows_types: Vec::new(),
        suffixes: Vec::new(),
    };

    if fields.len() < 4 {
        rule.errors.push(
            "Table rule requires a table name, a parent table or primary key name, and a rows type"
                .to_string(),
        );
        return rule;
    }

    if rule.name.is_empty() {
        rule.errors.push("Missing table name".to_string());
    }
    if rule.parent.is_empty() {
        rule.errors
            .push("Missing parent table or primary key name".to_string());
    }

    let rows_def = rule.rows_def.clone();
    match lexer::lex_rows_def(&rows_def) {
        Ok(items) => decode_rows_items(&mut rule, &items),
        Err(messages) => rule.errors.extend(messages),
    }

    rule
}

/// Decode lexed rows type items into rows types and a shared suffix list.
fn decode_rows_items(rule: &mut TableRule, items: &[RowsItem<'_>]) {
    let mut suffixes: Option<Vec<String>> = None;

    for item in items {
        let item_suffixes: Vec<String> = item.suffixes.iter().map(|s| s.to_string()).collect();

        match RowsType::from_keyword(item.keyword, !item_suffixes.is_empty()) {
            Some(rows_type) => {
                if !rule.rows_types.contains(&rows_type) {
                    rule.rows_types.push(rows_type);
                }
            }
            None => {
                let message = match item.keyword.to_uppercase().as_str() {
                    "ROOT" => "ROOT rows type does not take suffixes".to_string(),
                    "SUFFIXES" => "SUFFIXES rows type requires a suffix list".to_string(),
                    _ => format!("Unrecognized rows type '{}'", item.keyword),
                };
                rule.errors.push(message);
                continue;
            }
        }

        match &suffixes {
            None => suffixes = Some(item_suffixes),
            Some(existing) if *existing != item_suffixes => {
                rule.errors.push(format!(
                    "All rows types of table '{}' must use the same suffixes",
                    rule.name
                ));
            }
            Some(_) => {}
        }
    }

    if rule.rows_types.contains(&RowsType::Root) && rule.rows_types.len() > 1 {
        rule.errors
            .push("ROOT rows type cannot be combined with other rows types".to_string());
    }

    rule.suffixes = suffixes.unwrap_or_default();
}

/// Strip the first table suffix that ends `name`, keeping at least one
/// character of the name.
fn strip_suffix(name: &str, suffixes: &[String]) -> String {
    suffixes
        .iter()
        .find_map(|suffix| {
            name.strip_suffix(suffix.as_str())
                .filter(|stripped| !stripped.is_empty())
        })
        .unwrap_or(name)
        .to_string()
}
