//! strata CLI - Fold project exports into relational tables
//!
//! Usage:
//!   strata check <rules.txt> --project <export.json>
//!   strata schema <rules.txt> --project <export.json> [--dialect <dialect>]
//!   strata run <strata.toml>
//!
//! Examples:
//!   strata check rules.txt --project export.json
//!   strata schema rules.txt --project export.json --dialect postgres --label-views
//!   RUST_LOG=debug strata run study.toml

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strata::config::Settings;
use strata::etl::Workflow;
use strata::generator::{GeneratorOptions, GenerationResult, SchemaGenerator};
use strata::source::{DataSource, JsonSource, SourceCatalog};
use strata::sql::{schema_ddl, Dialect};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "strata - Rules-driven extraction of data-capture records into relational tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check transformation rules against a project export
    Check {
        /// Path to the rules file
        rules: PathBuf,

        /// Project export (JSON)
        #[arg(short, long)]
        project: PathBuf,
    },

    /// Print the DDL of the schema the rules generate
    Schema {
        /// Path to the rules file
        rules: PathBuf,

        /// Project export (JSON)
        #[arg(short, long)]
        project: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, value_enum, default_value_t = Dialect::Sqlite)]
        dialect: Dialect,

        /// Prefix for data table names
        #[arg(long, default_value = "")]
        table_prefix: String,

        /// Add a label column next to each choice field
        #[arg(long)]
        label_fields: bool,

        /// Also print label views
        #[arg(long)]
        label_views: bool,
    },

    /// Run the tasks of a workflow config file
    Run {
        /// Path to the config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { rules, project } => cmd_check(&rules, &project),
        Commands::Schema {
            rules,
            project,
            dialect,
            table_prefix,
            label_fields,
            label_views,
        } => {
            let options = GeneratorOptions {
                table_prefix,
                label_fields,
                ..GeneratorOptions::default()
            };
            cmd_schema(&rules, &project, &options, dialect, label_views)
        }
        Commands::Run { config } => cmd_run(&config),
    }
}

/// Read the rules and export, then generate. Errors are reported here.
fn generate(rules: &Path, project: &Path, options: &GeneratorOptions) -> Option<GenerationResult> {
    let text = match fs::read_to_string(rules) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", rules.display(), e);
            return None;
        }
    };

    let source = match JsonSource::from_file(project) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading project '{}': {}", project.display(), e);
            return None;
        }
    };

    let loaded = SourceCatalog::fetch(&source).and_then(|c| Ok((c, source.project_info()?)));
    let (catalog, info) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error reading project metadata: {}", e);
            return None;
        }
    };

    Some(
        SchemaGenerator::new(&catalog, options)
            .with_project(&info)
            .generate(&text),
    )
}

fn cmd_check(rules: &Path, project: &Path) -> ExitCode {
    let Some(result) = generate(rules, project, &GeneratorOptions::default()) else {
        return ExitCode::FAILURE;
    };

    if result.is_error() {
        eprintln!("{}", result.message);
        return ExitCode::FAILURE;
    }

    println!("OK: {} is valid ({})", rules.display(), result.status);
    println!("{}", result.message);
    ExitCode::SUCCESS
}

fn cmd_schema(
    rules: &Path,
    project: &Path,
    options: &GeneratorOptions,
    dialect: Dialect,
    label_views: bool,
) -> ExitCode {
    let Some(result) = generate(rules, project, options) else {
        return ExitCode::FAILURE;
    };

    let Some(schema) = result.schema.as_ref().filter(|_| !result.is_error()) else {
        eprintln!("{}", result.message);
        return ExitCode::FAILURE;
    };

    for statement in schema_ddl(schema, dialect, label_views) {
        println!("{};", statement);
    }
    ExitCode::SUCCESS
}

fn cmd_run(config: &Path) -> ExitCode {
    let settings = match Settings::from_file(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config '{}': {}", config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let reports = Workflow::from_settings(&settings).and_then(|workflow| workflow.run());
    match reports {
        Ok(reports) => {
            for report in reports {
                println!(
                    "{}: {} record(s), {} row(s) in {} batch(es)",
                    report.task, report.record_groups, report.rows, report.batches
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
