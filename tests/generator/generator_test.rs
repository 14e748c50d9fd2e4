//! Integration tests for schema generation.

use strata::generator::{generate_from_source, GenerationStatus, GeneratorOptions, SchemaGenerator};
use strata::model::{FieldKind, Parent, Schema, Table};
use strata::source::{JsonSource, MetadataField, SourceCatalog};
use strata::sql::{schema_ddl, Dialect};

fn meta(name: &str, form: &str, field_type: &str, choices: &str) -> MetadataField {
    MetadataField {
        field_name: name.to_string(),
        form_name: form.to_string(),
        field_type: field_type.to_string(),
        select_choices_or_calculations: choices.to_string(),
        ..Default::default()
    }
}

fn study_catalog() -> SourceCatalog {
    SourceCatalog::from_metadata(
        &[
            meta("id", "enrollment", "text", ""),
            meta("age", "enrollment", "text", ""),
            meta("sex", "enrollment", "text", ""),
            meta("weight_v1", "visits", "text", ""),
            meta("weight_v2", "visits", "text", ""),
            meta("symptoms_v1", "visits", "checkbox", "1, Cough | 2, Fever | 3, Rash"),
            meta("symptoms_v2", "visits", "checkbox", "1, Cough | 2, Fever | 3, Rash"),
            meta("dose_v1_am", "dosing", "text", ""),
        ],
        false,
    )
}

const STUDY_RULES: &str = "\
TABLE,demographics,id,ROOT
FIELD,age,int
FIELD,sex,varchar(1)
TABLE,visits,demographics,SUFFIXES:_v1;_v2
FIELD,weight,float
FIELD,symptoms,checkbox
TABLE,dosing,visits,SUFFIXES:_am;_pm
FIELD,dose,float
";

fn generate(catalog: &SourceCatalog, rules: &str) -> Schema {
    let options = GeneratorOptions::default();
    let result = SchemaGenerator::new(catalog, &options).generate(rules);
    assert!(!result.is_error(), "{}", result.message);
    result.schema.unwrap()
}

fn table<'s>(schema: &'s Schema, name: &str) -> &'s Table {
    schema
        .table_by_name(name)
        .unwrap_or_else(|| panic!("missing table '{}'", name))
}

#[test]
fn test_root_table_omits_colliding_record_id_column() {
    let schema = generate(&study_catalog(), STUDY_RULES);
    let demographics = table(&schema, "demographics");
    assert_eq!(
        demographics.column_names(),
        vec!["id", "redcap_data_source", "age", "sex"]
    );
    assert!(demographics.is_root());
    assert_eq!(demographics.field("sex").unwrap().size, Some(1));
}

#[test]
fn test_table_tree() {
    let schema = generate(&study_catalog(), STUDY_RULES);
    let demographics = schema.table_id("demographics").unwrap();
    let visits = schema.table_id("visits").unwrap();
    let dosing = schema.table_id("dosing").unwrap();

    assert_eq!(schema.roots(), &[demographics]);
    assert_eq!(schema.table(visits).parent, Parent::Table(demographics));
    assert_eq!(schema.table(dosing).parent, Parent::Table(visits));
    assert_eq!(schema.table(demographics).children, vec![visits]);

    let dosing = schema.table(dosing);
    assert_eq!(dosing.primary.db_name, "dosing_id");
    assert_eq!(dosing.foreign.as_ref().unwrap().db_name, "visits_id");
}

#[test]
fn test_nested_suffix_combinations_resolve_fields() {
    let schema = generate(&study_catalog(), STUDY_RULES);
    // dose only exists as dose_v1_am, reachable through visits then dosing
    assert!(table(&schema, "dosing").has_column("dose"));
}

#[test]
fn test_checkbox_expands_to_one_column_per_option() {
    let schema = generate(&study_catalog(), STUDY_RULES);
    let visits = table(&schema, "visits");
    let options: Vec<(&str, &str)> = visits
        .fields
        .iter()
        .filter_map(|f| match &f.kind {
            FieldKind::CheckboxOption { code } => Some((f.db_name.as_str(), code.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        options,
        vec![("symptoms___1", "1"), ("symptoms___2", "2"), ("symptoms___3", "3")]
    );
    assert_eq!(schema.lookup.label("visits", "symptoms", "2"), Some("Fever"));
}

#[test]
fn test_generation_is_deterministic() {
    let catalog = study_catalog();
    let first = generate(&catalog, STUDY_RULES);
    let second = generate(&catalog, STUDY_RULES);

    for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql] {
        assert_eq!(
            schema_ddl(&first, dialect, true),
            schema_ddl(&second, dialect, true)
        );
    }
    let names = |s: &Schema| s.tables().map(|t| t.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&first), names(&second));
}

#[test]
fn test_all_fields_mapped_is_valid() {
    let options = GeneratorOptions::default();
    let catalog = study_catalog();
    let result = SchemaGenerator::new(&catalog, &options).generate(STUDY_RULES);
    assert_eq!(result.status, GenerationStatus::Valid);
    assert_eq!(result.message, "All source fields are mapped");
    assert!(result.unmapped.is_empty());
}

#[test]
fn test_unmapped_fields_are_listed() {
    let options = GeneratorOptions::default();
    let catalog = study_catalog();
    let result = SchemaGenerator::new(&catalog, &options)
        .generate("TABLE,demographics,id,ROOT\nFIELD,age,int\nFIELD,sex,varchar(1)\n");
    assert_eq!(result.status, GenerationStatus::Warning);
    assert_eq!(
        result.message,
        "9 source field(s) are not mapped: weight_v1, weight_v2, symptoms_v1___1, \
         symptoms_v1___2, symptoms_v1___3, symptoms_v2___1, symptoms_v2___2, \
         symptoms_v2___3, dose_v1_am"
    );
}

#[test]
fn test_rule_errors_are_reported_together() {
    let options = GeneratorOptions::default();
    let catalog = study_catalog();
    let result = SchemaGenerator::new(&catalog, &options)
        .generate("TABLE,a,a_id,ROOT\nFIELD,x,blob\nTABLE,b,nowhere,EVENTS\n");
    assert!(result.is_error());
    assert!(result.schema.is_none());
    let lines: Vec<&str> = result.message.lines().collect();
    assert_eq!(lines[0], "Found 2 error(s) in the transformation rules:");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_generate_from_json_source() {
    let source = JsonSource::from_json(
        r#"{
            "project": { "project_id": 42, "project_title": "Pilot" },
            "metadata": [
                { "field_name": "id", "form_name": "enrollment", "field_type": "text" },
                { "field_name": "sex", "form_name": "enrollment", "field_type": "radio",
                  "select_choices_or_calculations": "F, Female | M, Male" }
            ],
            "records": []
        }"#,
    )
    .unwrap();
    let options = GeneratorOptions {
        table_prefix: "p_".to_string(),
        label_fields: true,
        data_source: "pilot".to_string(),
        ..Default::default()
    };

    let result = generate_from_source(&source, "TABLE,people,id,ROOT\nFIELD,sex,radio\n", &options)
        .unwrap();
    let schema = result.schema.unwrap();

    let people = table(&schema, "p_people");
    assert_eq!(people.base_name(), "people");
    assert!(people.has_column("sex_label"));
    assert_eq!(schema.lookup.label("p_people", "sex", "M"), Some("Male"));

    let info = &schema.project_info.rows()[0];
    assert_eq!(info.get("project_id"), Some("42"));
    assert_eq!(info.get("project_title"), Some("Pilot"));
    assert_eq!(info.get("redcap_data_source"), Some("pilot"));
}

const SURVEY_EXPORT: &str = r#"{
    "project": { "project_id": 5, "project_title": "Diary", "surveys_enabled": true },
    "metadata": [
        { "field_name": "id", "form_name": "enrollment", "field_type": "text" },
        { "field_name": "mood", "form_name": "diary", "field_type": "text" }
    ],
    "instruments": [
        { "instrument_name": "enrollment" },
        { "instrument_name": "diary", "survey_enabled": true }
    ],
    "records": []
}"#;

const SURVEY_RULES: &str = "TABLE,diary,id,ROOT\nFIELD,diary_timestamp,datetime\nFIELD,mood,varchar(20)\n";

#[test]
fn test_survey_timestamp_is_mapped_with_survey_fields() {
    let source = JsonSource::from_json(SURVEY_EXPORT).unwrap();
    let options = GeneratorOptions {
        include_survey_fields: true,
        ..Default::default()
    };
    let result = generate_from_source(&source, SURVEY_RULES, &options).unwrap();
    assert_eq!(result.status, GenerationStatus::Valid, "{}", result.message);

    let schema = result.schema.unwrap();
    let diary = table(&schema, "diary");
    assert_eq!(
        diary.column_names(),
        vec!["id", "redcap_data_source", "redcap_survey_identifier", "diary_timestamp", "mood"]
    );
    let metadata = &schema.metadata.rows()[0];
    assert_eq!(metadata.get("redcap_field_name"), Some("diary_timestamp"));
    assert_eq!(metadata.get("field_type"), Some("survey_timestamp"));
}

#[test]
fn test_survey_timestamp_is_skipped_without_survey_fields() {
    let source = JsonSource::from_json(SURVEY_EXPORT).unwrap();
    let result = generate_from_source(&source, SURVEY_RULES, &GeneratorOptions::default()).unwrap();
    assert_eq!(result.status, GenerationStatus::Warning);
    assert!(result
        .message
        .contains("'diary_timestamp' (line 2) was not found in the source project"));
    assert!(!table(result.schema.as_ref().unwrap(), "diary").has_column("diary_timestamp"));
}
