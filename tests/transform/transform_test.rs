//! Integration tests for the transform: rules and metadata in, rows out.

use strata::generator::{GeneratorOptions, SchemaGenerator};
use strata::model::{RowPolicy, Schema};
use strata::source::{MetadataField, Record, RecordBatch, SourceCatalog};
use strata::transform::Transformer;

fn meta(name: &str, form: &str, field_type: &str, choices: &str) -> MetadataField {
    MetadataField {
        field_name: name.to_string(),
        form_name: form.to_string(),
        field_type: field_type.to_string(),
        select_choices_or_calculations: choices.to_string(),
        ..Default::default()
    }
}

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn catalog() -> SourceCatalog {
    SourceCatalog::from_metadata(
        &[
            meta("id", "enrollment", "text", ""),
            meta("age", "enrollment", "text", ""),
            meta("sex", "enrollment", "text", ""),
            meta("bmi", "enrollment", "calc", "[weight_v1] / 3"),
            meta("weight_v1", "visits", "text", ""),
            meta("weight_v2", "visits", "text", ""),
            meta("symptoms_v1", "visits", "checkbox", "1, Cough | 2, Fever"),
            meta("symptoms_v2", "visits", "checkbox", "1, Cough | 2, Fever"),
            meta("hgb", "labs", "text", ""),
        ],
        false,
    )
}

fn schema(rules: &str) -> Schema {
    let catalog = catalog();
    let options = GeneratorOptions {
        data_source: "task1".to_string(),
        ..Default::default()
    };
    let result = SchemaGenerator::new(&catalog, &options).generate(rules);
    assert!(!result.is_error(), "{}", result.message);
    result.schema.unwrap()
}

fn transformer() -> Transformer {
    let policy = RowPolicy::new("id", "task1").with_calc_ignore("^0$").unwrap();
    Transformer::new(policy)
}

const DEMOGRAPHICS: &str = "TABLE,demographics,id,ROOT\nFIELD,age,int\nFIELD,sex,varchar(1)\n";

const VISITS: &str = "\
TABLE,demographics,id,ROOT
FIELD,age,int
FIELD,sex,varchar(1)
TABLE,visits,demographics,SUFFIXES:_v1;_v2
FIELD,weight,float
FIELD,symptoms,checkbox
";

#[test]
fn test_demographics_row() {
    let mut schema = schema(DEMOGRAPHICS);
    let records = vec![record(&[("id", "1001"), ("age", "34"), ("sex", "M")])];
    transformer().process_group(&mut schema, &records).unwrap();

    let rows = schema.table_by_name("demographics").unwrap().rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    // the key column shares the record id's name, so it holds the key
    assert_eq!(row.get("id"), Some("1"));
    assert_eq!(row.get("redcap_data_source"), Some("task1"));
    assert_eq!(row.get("age"), Some("34"));
    assert_eq!(row.get("sex"), Some("M"));
    assert_eq!(row.values.len(), 4);
}

#[test]
fn test_record_id_column_beside_key() {
    let mut schema = schema("TABLE,demographics,demographics_id,ROOT\nFIELD,age,int\n");
    let records = vec![record(&[("id", "1001"), ("age", "34")])];
    transformer().process_group(&mut schema, &records).unwrap();

    let row = &schema.table_by_name("demographics").unwrap().rows()[0];
    assert_eq!(row.get("demographics_id"), Some("1"));
    assert_eq!(row.get("id"), Some("1001"));
}

#[test]
fn test_suffix_without_data_yields_no_row() {
    let mut schema = schema(VISITS);
    let records = vec![record(&[
        ("id", "1"),
        ("age", "34"),
        ("sex", "M"),
        ("weight_v1", "70"),
        ("weight_v2", ""),
        ("symptoms_v2___1", "0"),
        ("symptoms_v2___2", "0"),
    ])];
    transformer().process_group(&mut schema, &records).unwrap();

    let visits = schema.table_by_name("visits").unwrap().rows();
    assert_eq!(visits.len(), 1);
    let row = &visits[0];
    assert_eq!(row.get("redcap_suffix"), Some("_v1"));
    assert_eq!(row.get("weight"), Some("70"));
    assert_eq!(row.get("visits_id"), Some("1"));
    // foreign key to the demographics row
    assert_eq!(row.get("id"), Some("1"));
}

#[test]
fn test_checkbox_data_creates_suffix_row() {
    let mut schema = schema(VISITS);
    let records = vec![record(&[
        ("id", "7"),
        ("age", "50"),
        ("symptoms_v2___1", "0"),
        ("symptoms_v2___2", "1"),
    ])];
    transformer().process_group(&mut schema, &records).unwrap();

    let visits = schema.table_by_name("visits").unwrap().rows();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].get("redcap_suffix"), Some("_v2"));
    assert_eq!(visits[0].get("symptoms___1"), Some("0"));
    assert_eq!(visits[0].get("symptoms___2"), Some("1"));
    assert_eq!(visits[0].get("weight"), Some(""));
}

#[test]
fn test_empty_record_creates_no_rows() {
    let mut schema = schema(VISITS);
    let records = vec![record(&[("id", "3"), ("age", " "), ("sex", "")])];
    transformer().process_group(&mut schema, &records).unwrap();
    assert_eq!(schema.buffered_rows(), 0);
}

#[test]
fn test_repeating_instrument_prefilter() {
    let rules = "TABLE,demographics,id,ROOT\nFIELD,age,int\nTABLE,labs,demographics,REPEATING_INSTRUMENTS\nFIELD,hgb,float\n";
    let mut schema = schema(rules);
    let records = vec![
        record(&[("id", "1"), ("age", "40"), ("hgb", "13.1"), ("redcap_repeat_instrument", "")]),
        record(&[
            ("id", "1"),
            ("hgb", "12.8"),
            ("redcap_repeat_instrument", "labs"),
            ("redcap_repeat_instance", "1"),
        ]),
        record(&[
            ("id", "1"),
            ("hgb", "12.5"),
            ("redcap_repeat_instrument", "labs"),
            ("redcap_repeat_instance", "2"),
        ]),
    ];
    transformer().process_group(&mut schema, &records).unwrap();

    let labs = schema.table_by_name("labs").unwrap().rows();
    let values: Vec<_> = labs.iter().map(|r| r.get("hgb").unwrap()).collect();
    assert_eq!(values, vec!["12.8", "12.5"]);
    let instances: Vec<_> = labs
        .iter()
        .map(|r| r.get("redcap_repeat_instance").unwrap())
        .collect();
    assert_eq!(instances, vec!["1", "2"]);
}

#[test]
fn test_calc_zero_is_not_data() {
    let rules = "TABLE,demographics,id,ROOT\nFIELD,bmi,float\n";
    let mut schema = schema(rules);
    let mut transformer = transformer();

    transformer
        .process_group(&mut schema, &[record(&[("id", "1"), ("bmi", "0")])])
        .unwrap();
    assert_eq!(schema.buffered_rows(), 0);

    transformer
        .process_group(&mut schema, &[record(&[("id", "2"), ("bmi", "23.4")])])
        .unwrap();
    assert_eq!(schema.buffered_rows(), 1);
}

#[test]
fn test_keys_continue_across_batches() {
    let mut schema = schema(DEMOGRAPHICS);
    let mut transformer = transformer();

    let mut first = RecordBatch::new();
    first.insert("1".into(), vec![record(&[("id", "1"), ("age", "30")])]);
    first.insert("2".into(), vec![record(&[("id", "2"), ("age", "31")])]);
    assert_eq!(transformer.process_batch(&mut schema, &first).unwrap(), 2);
    schema.clear_rows();

    let mut second = RecordBatch::new();
    second.insert("3".into(), vec![record(&[("id", "3"), ("age", "32")])]);
    transformer.process_batch(&mut schema, &second).unwrap();

    let rows = schema.table_by_name("demographics").unwrap().rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some("3"));
}

// ============================================================================
// Longitudinal projects
// ============================================================================

fn longitudinal_schema(rules: &str) -> Schema {
    let catalog = SourceCatalog::from_metadata(
        &[
            meta("id", "enrollment", "text", ""),
            meta("age", "enrollment", "text", ""),
            meta("weight", "visit", "text", ""),
            meta("note", "visit", "text", ""),
            meta("bp_am", "visit", "text", ""),
            meta("bp_pm", "visit", "text", ""),
            meta("med", "meds", "text", ""),
            meta("hgb_a", "labs", "text", ""),
            meta("hgb_b", "labs", "text", ""),
        ],
        true,
    );
    let options = GeneratorOptions {
        data_source: "task1".to_string(),
        ..Default::default()
    };
    let result = SchemaGenerator::new(&catalog, &options).generate(rules);
    assert!(!result.is_error(), "{}", result.message);
    result.schema.unwrap()
}

fn event_record(event: &str, instrument: &str, instance: &str, pairs: &[(&str, &str)]) -> Record {
    let mut record = record(pairs);
    record.insert("id".into(), "1001".into());
    record.insert("redcap_event_name".into(), event.into());
    record.insert("redcap_repeat_instrument".into(), instrument.into());
    record.insert("redcap_repeat_instance".into(), instance.into());
    record
}

fn longitudinal_group() -> Vec<Record> {
    vec![
        event_record(
            "baseline_arm_1",
            "",
            "",
            &[("age", "40"), ("weight", "70"), ("note", "fasting"), ("bp_am", "120"), ("bp_pm", "")],
        ),
        event_record(
            "week1_arm_1",
            "",
            "",
            &[("weight", "71"), ("note", ""), ("bp_am", "118"), ("bp_pm", "125")],
        ),
        event_record("week1_arm_1", "", "1", &[("med", "aspirin")]),
        event_record("week1_arm_1", "", "2", &[("med", "statin")]),
        event_record("baseline_arm_1", "labs", "1", &[("hgb_a", "13.1"), ("hgb_b", "")]),
        event_record("baseline_arm_1", "labs", "2", &[("hgb_a", ""), ("hgb_b", "12.4")]),
    ]
}

const LONGITUDINAL: &str = "\
TABLE,enrollment,id,ROOT
FIELD,age,int
TABLE,visit,enrollment,EVENTS
FIELD,weight,float
TABLE,visit_note,visit,EVENTS
FIELD,note,varchar(100)
TABLE,pressure,enrollment,EVENTS:_am;_pm
FIELD,bp,int
TABLE,meds,enrollment,REPEATING_EVENTS
FIELD,med,varchar(50)
TABLE,labs,enrollment,REPEATING_INSTRUMENTS:_a;_b
FIELD,hgb,float
";

fn column<'s>(schema: &'s Schema, table: &str, column: &str) -> Vec<&'s str> {
    schema
        .table_by_name(table)
        .unwrap()
        .rows()
        .iter()
        .map(|row| row.get(column).unwrap())
        .collect()
}

#[test]
fn test_events_child_sees_only_its_event_record() {
    let mut schema = longitudinal_schema(LONGITUDINAL);
    transformer()
        .process_group(&mut schema, &longitudinal_group())
        .unwrap();

    assert_eq!(column(&schema, "enrollment", "age"), vec!["40"]);
    assert_eq!(column(&schema, "visit", "weight"), vec!["70", "71"]);
    assert_eq!(
        column(&schema, "visit", "redcap_event_name"),
        vec!["baseline_arm_1", "week1_arm_1"]
    );
    assert_eq!(column(&schema, "visit", "id"), vec!["1", "1"]);

    // the week 1 visit has no note, and the baseline note is not repeated under it
    assert_eq!(column(&schema, "visit_note", "note"), vec!["fasting"]);
    assert_eq!(column(&schema, "visit_note", "visit_id"), vec!["1"]);
}

#[test]
fn test_events_with_suffixes() {
    let mut schema = longitudinal_schema(LONGITUDINAL);
    transformer()
        .process_group(&mut schema, &longitudinal_group())
        .unwrap();

    assert_eq!(column(&schema, "pressure", "bp"), vec!["120", "118", "125"]);
    assert_eq!(column(&schema, "pressure", "redcap_suffix"), vec!["_am", "_am", "_pm"]);
    assert_eq!(
        column(&schema, "pressure", "redcap_event_name"),
        vec!["baseline_arm_1", "week1_arm_1", "week1_arm_1"]
    );
    assert_eq!(column(&schema, "pressure", "pressure_id"), vec!["1", "2", "3"]);
    assert_eq!(column(&schema, "pressure", "id"), vec!["1", "1", "1"]);
}

#[test]
fn test_repeating_events() {
    let mut schema = longitudinal_schema(LONGITUDINAL);
    transformer()
        .process_group(&mut schema, &longitudinal_group())
        .unwrap();

    assert_eq!(column(&schema, "meds", "med"), vec!["aspirin", "statin"]);
    assert_eq!(column(&schema, "meds", "redcap_repeat_instance"), vec!["1", "2"]);
    assert_eq!(
        column(&schema, "meds", "redcap_event_name"),
        vec!["week1_arm_1", "week1_arm_1"]
    );
    assert_eq!(column(&schema, "meds", "id"), vec!["1", "1"]);
}

#[test]
fn test_repeating_instruments_with_suffixes() {
    let mut schema = longitudinal_schema(LONGITUDINAL);
    transformer()
        .process_group(&mut schema, &longitudinal_group())
        .unwrap();

    assert_eq!(column(&schema, "labs", "hgb"), vec!["13.1", "12.4"]);
    assert_eq!(column(&schema, "labs", "redcap_suffix"), vec!["_a", "_b"]);
    assert_eq!(column(&schema, "labs", "redcap_repeat_instance"), vec!["1", "2"]);
    assert_eq!(column(&schema, "labs", "redcap_repeat_instrument"), vec!["labs", "labs"]);
    assert_eq!(column(&schema, "labs", "id"), vec!["1", "1"]);
}

#[test]
fn test_each_rows_type_tag_runs_independently() {
    let rules = "\
TABLE,enrollment,id,ROOT
FIELD,age,int
TABLE,vitals,enrollment,EVENTS&REPEATING_EVENTS
FIELD,weight,float
";
    let mut schema = longitudinal_schema(rules);
    let records = vec![
        event_record("baseline_arm_1", "", "", &[("age", "40"), ("weight", "70")]),
        event_record("week1_arm_1", "", "1", &[("weight", "72")]),
        event_record("week1_arm_1", "", "2", &[("weight", "73")]),
    ];
    transformer().process_group(&mut schema, &records).unwrap();

    assert_eq!(column(&schema, "vitals", "weight"), vec!["70", "72", "73"]);
    assert_eq!(column(&schema, "vitals", "redcap_repeat_instance"), vec!["", "1", "2"]);
    assert_eq!(column(&schema, "vitals", "vitals_id"), vec!["1", "2", "3"]);
}

// ============================================================================
// Survey fields
// ============================================================================

#[test]
fn test_survey_timestamp_not_completed_is_blank() {
    let catalog = SourceCatalog::from_survey_metadata(
        &[
            meta("id", "enrollment", "text", ""),
            meta("mood", "diary", "text", ""),
        ],
        &["diary".to_string()],
        false,
    );
    let options = GeneratorOptions {
        data_source: "task1".to_string(),
        include_survey_fields: true,
        ..Default::default()
    };
    let result = SchemaGenerator::new(&catalog, &options)
        .generate("TABLE,diary,diary_id,ROOT\nFIELD,diary_timestamp,datetime\nFIELD,mood,varchar(20)\n");
    let mut schema = result.schema.unwrap();

    let mut transformer = transformer();
    for (id, timestamp, mood) in [
        ("1001", "[not completed]", "calm"),
        ("1002", "[not completed]", ""),
        ("1003", "2024-03-01 09:30:00", ""),
    ] {
        let records = vec![record(&[
            ("id", id),
            ("redcap_survey_identifier", ""),
            ("diary_timestamp", timestamp),
            ("mood", mood),
        ])];
        transformer.process_group(&mut schema, &records).unwrap();
    }

    assert_eq!(column(&schema, "diary", "id"), vec!["1001", "1003"]);
    assert_eq!(
        column(&schema, "diary", "diary_timestamp"),
        vec!["", "2024-03-01 09:30:00"]
    );
    assert_eq!(column(&schema, "diary", "mood"), vec!["calm", ""]);
}
