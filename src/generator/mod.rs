//! Schema generation from transformation rules.
//!
//! The generator walks the rules in file order:
//!
//! 1. A `TABLE` rule creates a table with its key and system columns
//! 2. A `FIELD` rule adds one or more destination fields to the current
//!    table, after checking the source field exists under some suffix
//!    combination reachable through the parent chain
//! 3. Choice fields register their options with the lookup table
//! 4. Finally the metadata and project info tables are filled
//!
//! Unknown source fields are warnings; rule errors are fatal.

mod options;

pub use options::{
    GeneratorOptions, DEFAULT_LABEL_FIELD_SUFFIX, DEFAULT_LABEL_VIEW_SUFFIX,
    DEFAULT_LOOKUP_TABLE_NAME,
};

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;
use log::{debug, info, warn};

use crate::model::{
    ColumnType, Field, FieldKind, FieldType, Parent, Schema, SystemColumn, Table, TableId,
};
use crate::rules::{self, FieldRule, Rule, RuleSet, TableRule};
use crate::source::{
    checkbox_field_name, Choices, DataSource, ProjectInfo, SourceCatalog, SourceField,
    SourceFieldType, SourceResult,
};

/// Unmapped fields are listed by name up to this many.
pub const MAX_LISTED_UNMAPPED: usize = 10;

/// Overall outcome of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Every source field is mapped.
    Valid,
    /// A schema was built, but some source fields are unmapped or some
    /// field rules were skipped.
    Warning,
    /// The rules have errors; no schema.
    Error,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationStatus::Valid => "valid",
            GenerationStatus::Warning => "warning",
            GenerationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of [`SchemaGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub schema: Option<Schema>,
    pub status: GenerationStatus,
    pub message: String,
    /// The parsed rules, with all errors attached.
    pub rules: RuleSet,
    /// Source fields no rule maps, in source order.
    pub unmapped: Vec<String>,
}

impl GenerationResult {
    pub fn is_error(&self) -> bool {
        self.status == GenerationStatus::Error
    }

    fn error(rules: RuleSet, message: String) -> Self {
        Self {
            schema: None,
            status: GenerationStatus::Error,
            message,
            rules,
            unmapped: Vec::new(),
        }
    }
}

/// Builds a [`Schema`] from rules and source metadata.
pub struct SchemaGenerator<'a> {
    catalog: &'a SourceCatalog,
    options: &'a GeneratorOptions,
    project: Option<&'a ProjectInfo>,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(catalog: &'a SourceCatalog, options: &'a GeneratorOptions) -> Self {
        Self {
            catalog,
            options,
            project: None,
        }
    }

    /// Record project level information in the project info table.
    pub fn with_project(mut self, project: &'a ProjectInfo) -> Self {
        self.project = Some(project);
        self
    }

    /// Parse, validate and generate.
    pub fn generate(&self, rules_text: &str) -> GenerationResult {
        let rules = rules::parse_and_validate(rules_text, Some(self.catalog));
        self.generate_from_rules(rules)
    }

    /// Generate from already validated rules.
    pub fn generate_from_rules(&self, rules: RuleSet) -> GenerationResult {
        if rules.table_rules().next().is_none() {
            return GenerationResult::error(
                rules,
                "Found no table rules in the transformation rules".to_string(),
            );
        }

        if rules.has_errors() {
            let mut lines = vec![format!(
                "Found {} error(s) in the transformation rules:",
                rules.error_count()
            )];
            lines.extend(rules.diagnostics().iter().map(ToString::to_string));
            return GenerationResult::error(rules, lines.join("\n"));
        }

        let mut build = Build::new(self);
        for rule in &rules.rules {
            match rule {
                Rule::Table(table) => build.add_table(table),
                Rule::Field(field) => build.add_field(field),
                Rule::Invalid(_) => {}
            }
        }

        if !build.errors.is_empty() {
            return GenerationResult::error(rules, build.errors.join("\n"));
        }

        build.finish(rules)
    }
}

/// Fetch the catalog and project info from a source, then generate.
pub fn generate_from_source(
    source: &dyn DataSource,
    rules_text: &str,
    options: &GeneratorOptions,
) -> SourceResult<GenerationResult> {
    let catalog = SourceCatalog::fetch(source)?;
    let project = source.project_info()?;
    Ok(SchemaGenerator::new(&catalog, options)
        .with_project(&project)
        .generate(rules_text))
}

// ============================================================================
// Generation state
// ============================================================================

/// One pending metadata table row.
struct MetadataEntry {
    table: String,
    db_name: String,
    source: SourceField,
}

struct Build<'g, 'a> {
    generator: &'g SchemaGenerator<'a>,
    schema: Schema,
    /// Rule table name → table.
    names: HashMap<String, TableId>,
    /// Table receiving the following field rules. `None` after a table
    /// that could not be built.
    current: Option<TableId>,
    unmapped: IndexSet<String>,
    metadata: Vec<MetadataEntry>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<'g, 'a> Build<'g, 'a> {
    fn new(generator: &'g SchemaGenerator<'a>) -> Self {
        let options = generator.options;
        Self {
            generator,
            schema: Schema::new(
                &options.lookup_table_name,
                &options.label_view_suffix,
                options.system_types(),
            ),
            names: HashMap::new(),
            current: None,
            unmapped: generator
                .catalog
                .mappable_field_names()
                .map(str::to_string)
                .collect(),
            metadata: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn options(&self) -> &'a GeneratorOptions {
        self.generator.options
    }

    fn catalog(&self) -> &'a SourceCatalog {
        self.generator.catalog
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    fn add_table(&mut self, rule: &TableRule) {
        let options = self.options();
        self.current = None;

        let parent = if rule.is_root() {
            Parent::Root {
                key: rule.parent.clone(),
            }
        } else {
            match self.names.get(&rule.parent) {
                Some(id) => Parent::Table(*id),
                None => {
                    self.errors.push(format!(
                        "Parent table '{}' of table '{}' must be defined before it (line {})",
                        rule.parent, rule.name, rule.line
                    ));
                    return;
                }
            }
        };

        let primary_key = match parent {
            Parent::Root { .. } => rule.parent.clone(),
            Parent::Table(_) => format!("{}_id", rule.name),
        };

        let mut table = Table::new(
            &rule.name,
            &options.table_prefix,
            parent.clone(),
            &primary_key,
            options.key_type,
            rule.rows_types.clone(),
            rule.suffixes.clone(),
        );
        if let Parent::Table(parent_id) = parent {
            let parent_key = self.schema.table(parent_id).primary.db_name.clone();
            table.set_foreign_key(&parent_key, options.key_type);
        }

        self.add_system_columns(&mut table, rule);

        debug!(
            "Table '{}' ({}) with {} system columns",
            table.name,
            rule.rows_def,
            table.fields.len()
        );

        let id = self.schema.add_table(table);
        self.names.insert(rule.name.clone(), id);
        self.current = Some(id);
    }

    fn add_system_columns(&self, table: &mut Table, rule: &TableRule) {
        let options = self.options();
        let catalog = self.catalog();
        let types = &rule.rows_types;

        table.add_field(Field::system(SystemColumn::DataSource, options.name_type));

        let record_id = catalog.record_id();
        if !record_id.is_empty() && !table.has_column(record_id) {
            table.add_field(Field::new(
                record_id,
                options.record_id_type,
                FieldKind::RecordId,
            ));
        }

        if options.include_dag_fields {
            table.add_field(Field::system(SystemColumn::DataAccessGroup, options.name_type));
        }

        if catalog.is_longitudinal() && types.iter().any(|t| t.has_events() || t.is_repeating()) {
            table.add_field(Field::system(SystemColumn::EventName, options.name_type));
        }
        if types.iter().any(|t| t.is_repeating_instruments()) {
            table.add_field(Field::system(SystemColumn::RepeatInstrument, options.name_type));
        }
        if types.iter().any(|t| t.is_repeating()) {
            table.add_field(Field::system(SystemColumn::RepeatInstance, options.instance_type));
        }
        if types.iter().any(|t| t.has_suffixes()) {
            table.add_field(Field::system(SystemColumn::Suffix, options.suffix_type));
        }

        if table.is_root() && options.include_survey_fields {
            table.add_field(Field::system(SystemColumn::SurveyIdentifier, options.name_type));
        }
    }

    /// All suffix strings rows of a table can be created under: the
    /// parent's combinations extended by each of the table's own suffixes.
    fn suffix_combinations(&self, id: TableId) -> Vec<String> {
        let table = self.schema.table(id);
        let inherited = match table.parent {
            Parent::Root { .. } => vec![String::new()],
            Parent::Table(parent) => self.suffix_combinations(parent),
        };
        if table.suffixes.is_empty() {
            return inherited;
        }
        inherited
            .iter()
            .flat_map(|prefix| {
                table
                    .suffixes
                    .iter()
                    .map(move |suffix| format!("{}{}", prefix, suffix))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    fn add_field(&mut self, rule: &FieldRule) {
        let Some(id) = self.current else { return };
        let Some(field_type) = rule.field_type else { return };

        if self.is_duplicate(id, rule, &rule.db_name) {
            return;
        }

        let combinations = self.suffix_combinations(id);
        match field_type {
            FieldType::Checkbox | FieldType::CheckboxList => {
                self.add_checkbox_field(id, rule, field_type, &combinations)
            }
            _ => self.add_plain_field(id, rule, field_type, &combinations),
        }
    }

    fn add_plain_field(
        &mut self,
        id: TableId,
        rule: &FieldRule,
        field_type: FieldType,
        combinations: &[String],
    ) {
        let catalog = self.catalog();
        let options = self.options();

        // survey timestamps are exported only with the survey fields
        let matched: Vec<&SourceField> = combinations
            .iter()
            .filter_map(|suffix| catalog.field(&format!("{}{}", rule.name, suffix)))
            .filter(|field| {
                options.include_survey_fields
                    || field.field_type != SourceFieldType::SurveyTimestamp
            })
            .collect();
        let Some(source) = matched.first().copied() else {
            self.warn_not_found(rule);
            return;
        };
        for field in &matched {
            self.unmapped.shift_remove(&field.name);
        }

        let table_name = self.schema.table(id).name.clone();
        let mut field = Field::value(&rule.name, ColumnType::new(field_type, rule.size))
            .with_db_name(&rule.db_name)
            .with_source_type(Some(source.field_type.clone()));

        let mut label = None;
        if field_type.is_choice() {
            if let Some(choices) = self.resolve_choices(rule, combinations) {
                self.schema.lookup.add_field(&table_name, &rule.name, choices);
                field = field.with_lookup(&rule.name);
                if options.label_fields {
                    label = Some(self.label_field(rule, &rule.db_name));
                }
            }
        }

        self.metadata.push(MetadataEntry {
            table: table_name,
            db_name: rule.db_name.clone(),
            source: source.clone(),
        });

        let table = self.schema.table_mut(id);
        table.add_field(field);
        if let Some(label) = label {
            table.add_field(label);
        }
    }

    /// Checkbox fields expand to one column per option (checkbox) or to a
    /// single column of checked codes (checkboxlist).
    fn add_checkbox_field(
        &mut self,
        id: TableId,
        rule: &FieldRule,
        field_type: FieldType,
        combinations: &[String],
    ) {
        let catalog = self.catalog();
        let options = self.options();

        let Some(choices) = self.resolve_choices(rule, combinations) else {
            self.warn_not_found(rule);
            return;
        };
        if field_type == FieldType::Checkbox {
            for code in choices.keys() {
                if self.is_duplicate(id, rule, &checkbox_field_name(&rule.db_name, code)) {
                    return;
                }
            }
        }

        let mut source = None;
        for suffix in combinations {
            let base = format!("{}{}", rule.name, suffix);
            for code in choices.keys() {
                let name = checkbox_field_name(&base, code);
                if let Some(field) = catalog.field(&name) {
                    source.get_or_insert(field);
                    self.unmapped.shift_remove(&name);
                }
            }
        }
        let Some(source) = source else {
            self.warn_not_found(rule);
            return;
        };

        let table_name = self.schema.table(id).name.clone();
        self.schema.lookup.add_field(&table_name, &rule.name, choices);
        let column = ColumnType::new(field_type, rule.size);

        let mut fields = Vec::new();
        if field_type == FieldType::CheckboxList {
            let kind = FieldKind::CheckboxList {
                codes: choices.keys().cloned().collect(),
            };
            fields.push(self.checkbox_field(rule, column, kind, &rule.db_name));
            if options.label_fields {
                fields.push(self.label_field(rule, &rule.db_name));
            }
        } else {
            for code in choices.keys() {
                let db_name = checkbox_field_name(&rule.db_name, code);
                let kind = FieldKind::CheckboxOption { code: code.clone() };
                fields.push(self.checkbox_field(rule, column, kind, &db_name));
                if options.label_fields {
                    fields.push(self.label_field(rule, &db_name));
                }
            }
        }

        for field in &fields {
            if field.kind.is_data() {
                self.metadata.push(MetadataEntry {
                    table: table_name.clone(),
                    db_name: field.db_name.clone(),
                    source: source.clone(),
                });
            }
        }

        let table = self.schema.table_mut(id);
        for field in fields {
            table.add_field(field);
        }
    }

    fn checkbox_field(
        &self,
        rule: &FieldRule,
        column: ColumnType,
        kind: FieldKind,
        db_name: &str,
    ) -> Field {
        Field::new(&rule.name, column, kind)
            .with_db_name(db_name)
            .with_source_type(Some(SourceFieldType::Checkbox))
            .with_lookup(&rule.name)
    }

    fn label_field(&self, rule: &FieldRule, target: &str) -> Field {
        let options = self.options();
        Field::new(
            &rule.name,
            options.label_type,
            FieldKind::Label {
                target: target.to_string(),
            },
        )
        .with_db_name(format!("{}{}", target, options.label_field_suffix))
    }

    /// Choices of a field under the first suffix combination that has any.
    fn resolve_choices(&self, rule: &FieldRule, combinations: &[String]) -> Option<&'a Choices> {
        let catalog = self.catalog();
        combinations
            .iter()
            .find_map(|suffix| catalog.choices(&format!("{}{}", rule.name, suffix)))
    }

    /// Warn and report true when the table already has `column`.
    fn is_duplicate(&mut self, id: TableId, rule: &FieldRule, column: &str) -> bool {
        let table = self.schema.table(id);
        if !table.has_column(column) {
            return false;
        }
        let message = format!(
            "Field '{}' (line {}) duplicates column '{}' of table '{}' and was skipped",
            rule.name, rule.line, column, table.name
        );
        self.warn(message);
        true
    }

    fn warn_not_found(&mut self, rule: &FieldRule) {
        self.warn(format!(
            "Field '{}' (line {}) was not found in the source project and was skipped",
            rule.name, rule.line
        ));
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    // ------------------------------------------------------------------------
    // Finish
    // ------------------------------------------------------------------------

    fn finish(mut self, rules: RuleSet) -> GenerationResult {
        let options = self.options();
        let catalog = self.catalog();

        for entry in &self.metadata {
            let source = &entry.source;
            self.schema.metadata.append([
                ("table_name", entry.table.clone()),
                ("table_field_name", entry.db_name.clone()),
                ("redcap_field_name", source.name.clone()),
                ("form_name", source.form.clone()),
                ("field_type", source.field_type.to_string()),
                ("field_label", source.label.clone()),
                ("identifier", flag(source.identifier).to_string()),
            ]);
        }

        let (project_id, project_title) = self
            .generator
            .project
            .map(|p| (p.project_id.to_string(), p.project_title.clone()))
            .unwrap_or_default();
        self.schema.project_info.append([
            ("redcap_data_source", options.data_source.clone()),
            ("project_id", project_id),
            ("project_title", project_title),
            ("longitudinal", flag(catalog.is_longitudinal()).to_string()),
        ]);

        let unmapped: Vec<String> = self.unmapped.into_iter().collect();
        let mut lines = self.warnings;
        let status = if unmapped.is_empty() && lines.is_empty() {
            lines.push("All source fields are mapped".to_string());
            GenerationStatus::Valid
        } else {
            if !unmapped.is_empty() {
                let mut line = format!("{} source field(s) are not mapped", unmapped.len());
                if unmapped.len() <= MAX_LISTED_UNMAPPED {
                    line.push_str(": ");
                    line.push_str(&unmapped.join(", "));
                }
                lines.push(line);
            }
            GenerationStatus::Warning
        };

        info!(
            "Generated schema with {} table(s), status {}",
            self.schema.tables().count(),
            status
        );

        GenerationResult {
            schema: Some(self.schema),
            status,
            message: lines.join("\n"),
            rules,
            unmapped,
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
