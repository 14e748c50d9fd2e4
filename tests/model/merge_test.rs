//! Integration tests for schema merge.

use strata::generator::{GeneratorOptions, SchemaGenerator};
use strata::model::{merge, MergeError, Parent, Schema};
use strata::source::{MetadataField, SourceCatalog};

fn meta(name: &str, field_type: &str, choices: &str) -> MetadataField {
    MetadataField {
        field_name: name.to_string(),
        form_name: "main".to_string(),
        field_type: field_type.to_string(),
        select_choices_or_calculations: choices.to_string(),
        ..Default::default()
    }
}

fn catalog() -> SourceCatalog {
    SourceCatalog::from_metadata(
        &[
            meta("record_id", "text", ""),
            meta("a", "text", ""),
            meta("b", "text", ""),
            meta("c", "radio", "1, Yes | 0, No"),
            meta("d", "text", ""),
        ],
        false,
    )
}

fn build(rules: &str, options: &GeneratorOptions) -> Schema {
    let catalog = catalog();
    let result = SchemaGenerator::new(&catalog, options).generate(rules);
    assert!(!result.is_error(), "{}", result.message);
    result.schema.unwrap()
}

fn with_source(data_source: &str) -> GeneratorOptions {
    GeneratorOptions {
        data_source: data_source.to_string(),
        ..Default::default()
    }
}

const RULES_A: &str = "TABLE,x,x_id,ROOT\nFIELD,a,int\nTABLE,y,y_id,ROOT\nFIELD,b,int\n";
const RULES_B: &str = "TABLE,y,y_id,ROOT\nFIELD,c,radio\nTABLE,z,y,EVENTS\nFIELD,d,int\n";

#[test]
fn test_merge_unions_tables_and_fields() {
    let a = build(RULES_A, &with_source("task_a"));
    let b = build(RULES_B, &with_source("task_b"));
    let merged = merge(&a, &b).unwrap();

    let names: Vec<&str> = merged.tables().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "z"]);

    let y = merged.table_by_name("y").unwrap();
    assert_eq!(
        y.column_names(),
        vec!["y_id", "redcap_data_source", "record_id", "b", "c"]
    );

    // inputs are left as they were
    assert!(!a.table_by_name("y").unwrap().has_column("c"));
    assert!(b.table_by_name("x").is_none());
}

#[test]
fn test_merge_relinks_parents() {
    let a = build(RULES_A, &with_source("task_a"));
    let b = build(RULES_B, &with_source("task_b"));
    let merged = merge(&a, &b).unwrap();

    let y = merged.table_id("y").unwrap();
    let z = merged.table_id("z").unwrap();
    assert_eq!(merged.table(z).parent, Parent::Table(y));
    assert_eq!(merged.table(y).children, vec![z]);
    assert_eq!(merged.roots().len(), 2);
}

#[test]
fn test_merge_system_rows() {
    let a = build(RULES_A, &with_source("task_a"));
    let b = build(RULES_B, &with_source("task_b"));
    let merged = merge(&a, &b).unwrap();

    assert_eq!(merged.lookup.label("y", "c", "1"), Some("Yes"));

    let fields: Vec<(&str, &str)> = merged
        .metadata
        .rows()
        .iter()
        .map(|r| (r.get("table_name").unwrap(), r.get("table_field_name").unwrap()))
        .collect();
    assert_eq!(fields, vec![("x", "a"), ("y", "b"), ("y", "c"), ("z", "d")]);
    let keys: Vec<&str> = merged
        .metadata
        .rows()
        .iter()
        .map(|r| r.get("redcap_metadata_id").unwrap())
        .collect();
    assert_eq!(keys, vec!["1", "2", "3", "4"]);

    let sources: Vec<&str> = merged
        .project_info
        .rows()
        .iter()
        .map(|r| r.get("redcap_data_source").unwrap())
        .collect();
    assert_eq!(sources, vec!["task_a", "task_b"]);
}

#[test]
fn test_merge_with_itself_is_stable() {
    let a = build(RULES_A, &with_source("task_a"));
    let merged = merge(&a, &a).unwrap();
    assert_eq!(merged.tables().count(), 2);
    assert_eq!(merged.metadata.rows().len(), a.metadata.rows().len());
    assert_eq!(merged.project_info.rows().len(), 1);
}

#[test]
fn test_rows_type_conflict() {
    let a = build(RULES_A, &GeneratorOptions::default());
    let b = build("TABLE,x,x_id,ROOT\nTABLE,y,x,EVENTS\n", &GeneratorOptions::default());
    let err = merge(&a, &b).unwrap_err();
    assert_eq!(
        err,
        MergeError::RowsTypes {
            table: "y".to_string(),
            left: "ROOT".to_string(),
            right: "EVENTS".to_string(),
        }
    );
    assert_eq!(err.to_string(), "Table 'y' has different rows types: ROOT and EVENTS");
}

#[test]
fn test_parent_conflict() {
    let a = build("TABLE,x,x_id,ROOT\nTABLE,y,x,EVENTS\n", &GeneratorOptions::default());
    let b = build("TABLE,z,z_id,ROOT\nTABLE,y,z,EVENTS\n", &GeneratorOptions::default());
    let err = merge(&a, &b).unwrap_err();
    assert!(matches!(err, MergeError::Parent { ref table, .. } if table == "y"));
}

#[test]
fn test_label_view_suffix_conflict() {
    let a = build(RULES_A, &GeneratorOptions::default());
    let options = GeneratorOptions {
        label_view_suffix: "_labels".to_string(),
        ..Default::default()
    };
    let b = build(RULES_B, &options);
    assert_eq!(
        merge(&a, &b).unwrap_err(),
        MergeError::LabelViewSuffix {
            left: "_label_view".to_string(),
            right: "_labels".to_string(),
        }
    );
}

#[test]
fn test_parent_out_of_order_is_error() {
    let a = build(RULES_A, &GeneratorOptions::default());
    let mut broken = a.clone();
    let x = broken.table_id("x").unwrap();
    let y = broken.table_id("y").unwrap();
    broken.table_mut(x).parent = Parent::Table(y);

    let other = build("TABLE,z,z_id,ROOT\n", &GeneratorOptions::default());
    assert_eq!(
        merge(&broken, &other).unwrap_err(),
        MergeError::MissingParent {
            table: "x".to_string(),
            parent: "y".to_string(),
        }
    );
}
