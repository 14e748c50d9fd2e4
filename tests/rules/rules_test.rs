//! Integration tests for the rules language.
//!
//! These parse and validate complete rules documents and check that every
//! problem is attached to the rule it was found in.

use strata::rules::{parse_and_validate, parse_rules, FieldType, Rule, RowsType, Severity};
use strata::source::{MetadataField, SourceCatalog};

fn meta(name: &str, field_type: &str) -> MetadataField {
    MetadataField {
        field_name: name.to_string(),
        form_name: "enrollment".to_string(),
        field_type: field_type.to_string(),
        ..Default::default()
    }
}

const STUDY_RULES: &str = r#"
# Demographics, one row per record
TABLE,demographics,demographics_id,ROOT
FIELD,age,int
FIELD,sex,radio,gender

# Visits, one row per suffix
TABLE,visits,demographics,SUFFIXES:_v1;_v2
FIELD,weight,float
FIELD,symptoms,checkbox

# Labs, one row per repeating instrument instance
TABLE,labs,demographics,REPEATING_INSTRUMENTS
FIELD,hgb,float
FIELD,lab_date,date
"#;

#[test]
fn test_study_rules_are_valid() {
    let rules = parse_and_validate(STUDY_RULES, None);
    assert!(!rules.has_errors(), "{:?}", rules.diagnostics());
    assert_eq!(rules.table_rules().count(), 3);
    assert_eq!(rules.field_rules().count(), 6);

    let tables: Vec<_> = rules.table_rules().collect();
    assert_eq!(tables[0].rows_types, vec![RowsType::Root]);
    assert_eq!(tables[1].rows_types, vec![RowsType::BySuffixes]);
    assert_eq!(tables[1].suffixes, vec!["_v1", "_v2"]);
    assert_eq!(tables[2].rows_types, vec![RowsType::ByRepeatingInstruments]);

    let gender = rules.field_rules().find(|f| f.name == "sex").unwrap();
    assert_eq!(gender.db_name, "gender");
    assert_eq!(gender.field_type, Some(FieldType::Radio));
    assert_eq!(gender.table.as_deref(), Some("demographics"));

    let hgb = rules.field_rules().find(|f| f.name == "hgb").unwrap();
    assert_eq!(hgb.table.as_deref(), Some("labs"));
}

#[test]
fn test_all_errors_surface_in_one_pass() {
    let text = "\
FIELD,orphan,int
TABLE,a,a_id,ROOT
FIELD,x,blob
TABLE,a,a_id,ROOT
TABLE,b,missing,EVENTS
TABLE,c,c,EVENTS
COLUMN,y,int
";
    let rules = parse_and_validate(text, None);
    let diagnostics = rules.diagnostics();
    let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();

    assert_eq!(
        messages,
        vec![
            "Field rule appears before any table rule",
            "Invalid field type 'blob'",
            "Table 'a' has already been defined (first defined at line 2)",
            "Parent table 'missing' of table 'b' is not defined",
            "Table 'c' cannot be its own parent",
            "Unrecognized rule type 'COLUMN'",
        ]
    );
    let lines: Vec<usize> = diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![1, 3, 4, 5, 6, 7]);
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
    assert_eq!(rules.error_count(), 6);
}

#[test]
fn test_rows_type_errors() {
    let rules = parse_rules(
        "TABLE,a,a_id,ROOT:_x\nTABLE,b,a,SUFFIXES\nTABLE,c,a,EVENTS:_1;_2&REPEATING_EVENTS:_1\nTABLE,d,a,ROOT&EVENTS\n",
    );
    let errors: Vec<&[String]> = rules.rules.iter().map(Rule::errors).collect();
    assert_eq!(errors[0], ["ROOT rows type does not take suffixes"]);
    assert_eq!(errors[1], ["SUFFIXES rows type requires a suffix list"]);
    assert_eq!(
        errors[2],
        ["All rows types of table 'c' must use the same suffixes"]
    );
    assert_eq!(
        errors[3],
        ["ROOT rows type cannot be combined with other rows types"]
    );
}

#[test]
fn test_choice_type_checked_against_source() {
    let catalog = SourceCatalog::from_metadata(
        &[
            meta("record_id", "text"),
            meta("sex", "dropdown"),
            meta("race", "checkbox"),
        ],
        false,
    );
    let rules = parse_and_validate(
        "TABLE,t,t_id,ROOT\nFIELD,sex,radio\nFIELD,race,checkboxlist\n",
        Some(&catalog),
    );

    assert_eq!(
        rules.rules[1].errors(),
        ["Field 'sex' is declared as radio but its source type is 'dropdown'"]
    );
    assert!(rules.rules[2].is_valid());
}

#[test]
fn test_parent_may_be_defined_after_child() {
    // ordering is a generation concern; the rules themselves are valid
    let rules = parse_and_validate("TABLE,b,a,EVENTS\nTABLE,a,a_id,ROOT\n", None);
    assert!(!rules.has_errors());
}

#[test]
fn test_empty_document_has_no_rules() {
    let rules = parse_and_validate("# only a comment\n\n", None);
    assert!(rules.rules.is_empty());
    assert!(!rules.has_errors());
}
