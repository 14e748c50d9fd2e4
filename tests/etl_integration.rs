//! End-to-end tests: config file, rules and export in, tables out.

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use strata::config::{Driver, Settings, TaskSettings};
use strata::etl::{EtlError, Task, Workflow};
use strata::source::{
    DataSource, Instrument, JsonSource, MetadataField, ProjectInfo, RecordBatch, SourceResult,
};
use strata::storage::MemoryStorage;

const RULES: &str = "\
TABLE,demographics,id,ROOT
FIELD,age,int
FIELD,sex,radio
";

fn export(project_id: u64, records: &str) -> String {
    format!(
        r#"{{
            "project": {{ "project_id": {}, "project_title": "Study" }},
            "metadata": [
                {{ "field_name": "id", "form_name": "enrollment", "field_type": "text" }},
                {{ "field_name": "age", "form_name": "enrollment", "field_type": "text" }},
                {{ "field_name": "sex", "form_name": "enrollment", "field_type": "radio",
                   "select_choices_or_calculations": "F, Female | M, Male" }}
            ],
            "records": [{}]
        }}"#,
        project_id, records
    )
}

const TWO_RECORDS: &str = r#"
    { "id": "1", "age": "34", "sex": "M" },
    { "id": "2", "age": "41", "sex": "F" }
"#;

fn write_project(dir: &Path, database: &str) {
    fs::write(dir.join("rules.txt"), RULES).unwrap();
    fs::write(dir.join("export.json"), export(12, TWO_RECORDS)).unwrap();
    let config = format!(
        r#"
[workflow]
name = "study"

[tasks.site_a]
rules_file = "rules.txt"
source = "export.json"
label_views = true

[tasks.site_a.database]
{}
"#,
        database
    );
    fs::write(dir.join("strata.toml"), config).unwrap();
}

fn run_config(dir: &Path) -> Vec<strata::etl::TaskReport> {
    let settings = Settings::from_file(dir.join("strata.toml")).unwrap();
    Workflow::from_settings(&settings).unwrap().run().unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_sqlite_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), "driver = \"sqlite\"\nconnection_string = \"out/study.db\"");

    let reports = run_config(dir.path());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].task, "site_a");
    assert_eq!(reports[0].record_groups, 2);
    assert_eq!(reports[0].rows, 2);
    assert_eq!(reports[0].batches, 1);

    let conn = Connection::open(dir.path().join("out/study.db")).unwrap();
    let rows: Vec<(i64, String, i64, String)> = conn
        .prepare("SELECT id, redcap_data_source, age, sex FROM demographics ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "site_a".to_string(), 34, "M".to_string()),
            (2, "site_a".to_string(), 41, "F".to_string()),
        ]
    );

    let label: String = conn
        .query_row(
            "SELECT sex FROM demographics_label_view WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(label, "Male");

    assert_eq!(count(&conn, "Lookup"), 2);
    assert_eq!(count(&conn, "redcap_metadata"), 2);
    assert_eq!(count(&conn, "redcap_project_info"), 1);
    assert_eq!(count(&conn, "etl_log"), 1);
    assert_eq!(count(&conn, "etl_event_log"), 2);
}

#[test]
fn test_sqlite_rerun_replaces_data_and_keeps_log() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), "driver = \"sqlite\"\nconnection_string = \"study.db\"");

    run_config(dir.path());
    run_config(dir.path());

    let conn = Connection::open(dir.path().join("study.db")).unwrap();
    assert_eq!(count(&conn, "demographics"), 2);
    assert_eq!(count(&conn, "etl_log"), 2);
    assert_eq!(count(&conn, "etl_event_log"), 4);

    let log_ids: Vec<i64> = conn
        .prepare("SELECT etl_log_id FROM etl_log ORDER BY etl_log_id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(log_ids, vec![1, 2]);
}

#[test]
fn test_csv_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), "driver = \"csv\"\nconnection_string = \"csv_out\"");

    run_config(dir.path());

    let out = dir.path().join("csv_out");
    assert_eq!(
        fs::read_to_string(out.join("demographics.csv")).unwrap(),
        "id,redcap_data_source,age,sex\n1,site_a,34,M\n2,site_a,41,F\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("demographics_label_view.csv")).unwrap(),
        "id,redcap_data_source,age,sex\n1,site_a,34,Male\n2,site_a,41,Female\n"
    );
    assert!(out.join("etl_log.csv").exists());
}

#[test]
fn test_missing_rules_file() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), "driver = \"memory\"");
    fs::remove_file(dir.path().join("rules.txt")).unwrap();

    let settings = Settings::from_file(dir.path().join("strata.toml")).unwrap();
    let err = Workflow::from_settings(&settings).unwrap_err();
    assert!(matches!(err, EtlError::RulesFile { .. }));
}

// ============================================================================
// Workflows into one storage
// ============================================================================

fn task(name: &str, rules: &str, export_json: &str) -> Task {
    let source = JsonSource::from_json(export_json).unwrap();
    Task::new(name, TaskSettings::default(), Box::new(source), rules)
}

#[test]
fn test_workflow_shares_tables_between_tasks() {
    let mut workflow = Workflow::new("sites");
    workflow.add_task(
        task(
            "site_a",
            "TABLE,demographics,id,ROOT\nFIELD,age,int\n",
            &export(1, TWO_RECORDS),
        ),
        (Driver::Memory, String::new()),
    );
    workflow.add_task(
        task(
            "site_b",
            "TABLE,demographics,id,ROOT\nFIELD,sex,radio\n",
            &export(2, r#"{ "id": "1", "age": "", "sex": "F" }"#),
        ),
        (Driver::Memory, String::new()),
    );

    let mut storage = MemoryStorage::new();
    let reports = workflow.run_with_storage(&mut storage).unwrap();
    let rows: Vec<usize> = reports.iter().map(|r| r.rows).collect();
    assert_eq!(rows, vec![2, 1]);

    let stored = storage.table("demographics").unwrap();
    assert_eq!(stored.columns, vec!["id", "redcap_data_source", "age", "sex"]);

    let demographics = storage.rows("demographics");
    let keys: Vec<&str> = demographics.iter().map(|r| r.get("id").unwrap()).collect();
    assert_eq!(keys, vec!["1", "2", "3"]);
    let sources: Vec<&str> = demographics
        .iter()
        .map(|r| r.get("redcap_data_source").unwrap())
        .collect();
    assert_eq!(sources, vec!["site_a", "site_a", "site_b"]);
    assert_eq!(demographics[2].get("sex"), Some("F"));

    assert_eq!(storage.rows("redcap_project_info").len(), 2);
    assert_eq!(storage.rows("etl_log").len(), 2);
    assert_eq!(storage.rows("etl_event_log").len(), 4);
}

// ============================================================================
// Extracted record count check
// ============================================================================

/// Loses the last record group of every batch.
struct LossySource(JsonSource);

impl DataSource for LossySource {
    fn export_metadata(&self) -> SourceResult<Vec<MetadataField>> {
        self.0.export_metadata()
    }

    fn export_instruments(&self) -> SourceResult<Vec<Instrument>> {
        self.0.export_instruments()
    }

    fn project_info(&self) -> SourceResult<ProjectInfo> {
        self.0.project_info()
    }

    fn record_id_batches(&self, batch_size: usize) -> SourceResult<Vec<Vec<String>>> {
        self.0.record_id_batches(batch_size)
    }

    fn record_batch(&self, ids: &[String]) -> SourceResult<RecordBatch> {
        let mut batch = self.0.record_batch(ids)?;
        batch.pop();
        Ok(batch)
    }
}

fn lossy_task(check: bool) -> Task {
    let source = LossySource(JsonSource::from_json(&export(3, TWO_RECORDS)).unwrap());
    let settings = TaskSettings {
        extracted_record_count_check: check,
        ..TaskSettings::default()
    };
    Task::new("lossy", settings, Box::new(source), RULES)
}

#[test]
fn test_record_count_mismatch_aborts_task() {
    let mut storage = MemoryStorage::new();
    let err = lossy_task(true).execute(&mut storage).unwrap_err();
    assert!(matches!(
        err,
        EtlError::RecordCount {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    assert!(storage.rows("demographics").is_empty());
    let events = storage.rows("etl_event_log");
    let last = events.last().unwrap().get("message").unwrap();
    assert!(last.starts_with("Task 'lossy' failed:"), "{}", last);
}

#[test]
fn test_record_count_check_can_be_disabled() {
    let mut storage = MemoryStorage::new();
    let report = lossy_task(false).execute(&mut storage).unwrap();
    assert_eq!(report.record_groups, 1);
    assert_eq!(storage.rows("demographics").len(), 1);
    assert_eq!(storage.rows("demographics")[0].get("age"), Some("34"));
}
