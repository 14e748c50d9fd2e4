//! CSV destination: one `<table>.csv` file per table in a directory.
//!
//! Key constraints have no meaning for CSV files. A label view becomes a
//! second file, `<table><suffix>.csv`, written alongside the table with
//! choice labels in place of codes.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;

use super::{parse_key, Storage, StorageError, StorageResult};
use crate::model::{FieldKind, LookupTable, Row, Table};
use crate::source::Choices;

/// How a label file column is derived from a table row.
#[derive(Debug, Clone)]
enum LabelColumn {
    Value(String),
    Choice { column: String, choices: Choices },
    Checkbox { column: String, label: String },
}

impl LabelColumn {
    fn name(&self) -> &str {
        match self {
            LabelColumn::Value(column)
            | LabelColumn::Choice { column, .. }
            | LabelColumn::Checkbox { column, .. } => column,
        }
    }

    fn value<'r>(&'r self, row: &'r Row) -> &'r str {
        let value = row.get(self.name()).unwrap_or_default();
        match self {
            LabelColumn::Value(_) => value,
            LabelColumn::Choice { choices, .. } => {
                choices.get(value.trim()).map(String::as_str).unwrap_or_default()
            }
            LabelColumn::Checkbox { label, .. } if value.trim() == "1" => label.as_str(),
            LabelColumn::Checkbox { .. } => "",
        }
    }
}

struct CsvTable {
    columns: Vec<String>,
    primary_key: String,
    writer: csv::Writer<File>,
    labels: Option<(Vec<LabelColumn>, csv::Writer<File>)>,
}

/// Storage writing CSV files.
pub struct CsvStorage {
    dir: PathBuf,
    tables: IndexMap<String, CsvTable>,
}

impl CsvStorage {
    /// Write files into `dir`, creating it if needed.
    pub fn new(dir: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tables: IndexMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding a table (or label view).
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Open a file for appending, writing `header` first when the file is
    /// new or truncated.
    fn open_writer(
        path: &Path,
        header: &[&str],
        truncate: bool,
    ) -> StorageResult<csv::Writer<File>> {
        let fresh = truncate || !path.exists();
        let file = if fresh {
            File::create(path)?
        } else {
            OpenOptions::new().append(true).open(path)?
        };
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            writer.write_record(header)?;
            writer.flush()?;
        }
        Ok(writer)
    }

    fn write(&mut self, row: &Row) -> StorageResult<()> {
        let table = self
            .tables
            .get_mut(&row.table)
            .ok_or_else(|| StorageError::UnknownTable(row.table.clone()))?;

        if let Some(column) = row.values.keys().find(|c| !table.columns.contains(c)) {
            return Err(StorageError::UnknownColumn {
                table: row.table.clone(),
                column: column.clone(),
            });
        }

        let record: Vec<&str> = table
            .columns
            .iter()
            .map(|c| row.get(c).unwrap_or_default())
            .collect();
        table.writer.write_record(&record)?;

        if let Some((columns, writer)) = &mut table.labels {
            let record: Vec<&str> = columns.iter().map(|c| c.value(row)).collect();
            writer.write_record(&record)?;
        }
        Ok(())
    }

    fn flush(&mut self, name: &str) -> StorageResult<()> {
        if let Some(table) = self.tables.get_mut(name) {
            table.writer.flush()?;
            if let Some((_, writer)) = &mut table.labels {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

impl Storage for CsvStorage {
    fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> StorageResult<()> {
        let columns = table.column_names();
        let path = self.file_path(&table.name);
        let writer = Self::open_writer(&path, &columns, drop_if_exists)?;
        debug!("Writing table '{}' to {}", table.name, path.display());

        self.tables.insert(
            table.name.clone(),
            CsvTable {
                columns: columns.into_iter().map(String::from).collect(),
                primary_key: table.primary.db_name.clone(),
                writer,
                labels: None,
            },
        );
        Ok(())
    }

    fn store_row(&mut self, row: &Row) -> StorageResult<()> {
        self.write(row)?;
        self.flush(&row.table)
    }

    fn store_rows(&mut self, table: &Table) -> StorageResult<usize> {
        for row in table.rows() {
            self.write(row)?;
        }
        self.flush(&table.name)?;
        Ok(table.row_count())
    }

    fn add_primary_key_constraint(&mut self, _table: &Table) -> StorageResult<()> {
        Ok(())
    }

    fn add_foreign_key_constraint(&mut self, _table: &Table, _parent: &Table) -> StorageResult<()> {
        Ok(())
    }

    fn create_label_view(
        &mut self,
        table: &Table,
        lookup: &LookupTable,
        suffix: &str,
    ) -> StorageResult<()> {
        let mut columns = Vec::new();
        for field in table.columns() {
            let column = field.db_name.clone();
            let lookup_field = field.uses_lookup.as_deref();
            let label_column = match (&field.kind, lookup_field) {
                (FieldKind::Label { .. }, _) => continue,
                (FieldKind::CheckboxOption { code }, Some(name)) => LabelColumn::Checkbox {
                    label: lookup
                        .label(&table.name, name, code)
                        .unwrap_or(code.as_str())
                        .to_string(),
                    column,
                },
                (FieldKind::Value, Some(name)) => LabelColumn::Choice {
                    choices: lookup.choices(&table.name, name).cloned().unwrap_or_default(),
                    column,
                },
                _ => LabelColumn::Value(column),
            };
            columns.push(label_column);
        }

        let path = self.file_path(&format!("{}{}", table.name, suffix));
        let header: Vec<&str> = columns.iter().map(LabelColumn::name).collect();
        let writer = Self::open_writer(&path, &header, true)?;

        let stored = self
            .tables
            .get_mut(&table.name)
            .ok_or_else(|| StorageError::UnknownTable(table.name.clone()))?;
        stored.labels = Some((columns, writer));
        Ok(())
    }

    fn max_primary_key(&mut self, table: &Table) -> StorageResult<Option<u64>> {
        self.flush(&table.name)?;
        let path = self.file_path(&table.name);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let primary_key = self
            .tables
            .get(&table.name)
            .map_or(table.primary.db_name.as_str(), |t| t.primary_key.as_str());
        let Some(index) = reader.headers()?.iter().position(|h| h == primary_key) else {
            return Ok(None);
        };

        let mut max = None;
        for record in reader.records() {
            let key = record?.get(index).and_then(parse_key);
            max = max.max(key);
        }
        Ok(max)
    }
}
