pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod frequency;
pub mod io_utils;
pub mod pipeline;
pub mod quality;
pub mod row;
pub mod stats;
pub mod table;
pub mod validate;
pub mod violation;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

pub use clean::{DataCleaner, clean};
pub use config::{FieldKind, FieldSpec, PipelineConfig, QualityThresholds, RuleSet};
pub use data::{CleanedTable, Record, Table, Value};
pub use error::{ConfigError, PipelineError, SchemaError};
pub use pipeline::{Pipeline, PipelineRun, RunMetadata};
pub use quality::{QualityAssessor, QualityReport, assess_quality};
pub use row::{RowOutcome, RowValidator};
pub use stats::{StatisticsReport, compute_statistics};
pub use validate::{Partition, RejectedRecord, SchemaValidator, validate_and_partition};
pub use violation::{Violation, ViolationCode};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_sieve", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Assess(args) => handle_assess(&args),
        Commands::Rules(args) => handle_rules(&args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)
                .with_context(|| format!("Loading configuration from {path:?}"))?;
            info!(
                "Loaded {} field rule(s) from {:?}",
                config.rules.fields.len(),
                path
            );
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    info!(
        "Validating '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );

    let table = io_utils::read_table(&args.input, delimiter, input_encoding, &config)?;
    let reference = args.now.unwrap_or_else(current_instant);
    let run = Pipeline::new(config, reference)
        .run(&table)
        .with_context(|| format!("Validating {:?}", args.input))?;

    if let Some(path) = &args.valid {
        let out_delimiter = io_utils::resolve_output_delimiter(Some(path), args.delimiter, delimiter);
        let mut writer = io_utils::open_csv_writer(Some(path), out_delimiter, output_encoding)?;
        io_utils::write_cleaned(&mut writer, &run.cleaned)
            .with_context(|| format!("Writing cleaned rows to {path:?}"))?;
        info!("Wrote {} cleaned row(s) to {:?}", run.cleaned.len(), path);
    }
    if let Some(path) = &args.invalid {
        let out_delimiter = io_utils::resolve_output_delimiter(Some(path), args.delimiter, delimiter);
        let mut writer = io_utils::open_csv_writer(Some(path), out_delimiter, output_encoding)?;
        io_utils::write_rejected(&mut writer, &run.partition.headers, &run.partition.invalid)
            .with_context(|| format!("Writing rejected rows to {path:?}"))?;
        info!(
            "Wrote {} rejected row(s) to {:?}",
            run.partition.invalid.len(),
            path
        );
    }
    if let Some(path) = &args.stats {
        io_utils::write_json(Some(path), &run.statistics_document())
            .with_context(|| format!("Writing statistics to {path:?}"))?;
    }

    print_summary(&run);
    Ok(())
}

fn print_summary(run: &PipelineRun) {
    let summary = &run.statistics.ingestion_summary;
    let mut rows = vec![
        vec!["total_rows".to_string(), summary.total_rows_read.to_string()],
        vec!["valid_rows".to_string(), summary.valid_rows.to_string()],
        vec!["invalid_rows".to_string(), summary.invalid_rows.to_string()],
        vec![
            "quality_percent".to_string(),
            table::format_number(summary.data_quality_score_percent),
        ],
    ];
    rows.extend(
        run.statistics
            .error_breakdown
            .iter()
            .map(|(code, count)| vec![code.to_string(), count.to_string()]),
    );
    table::print_table(&["metric".to_string(), "value".to_string()], &rows);
}

fn handle_assess(args: &cli::AssessArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!("Assessing quality of '{}'", args.input.display());

    let table = io_utils::read_table(&args.input, delimiter, encoding, &config)?;
    let report = QualityAssessor::new(config.quality.clone()).assess(&table);
    io_utils::write_json(args.output.as_deref(), &report)
        .with_context(|| "Writing quality report".to_string())?;
    if let Some(path) = &args.output {
        info!(
            "Quality report (score {:.2}) written to {:?}",
            report.quality_score, path
        );
    }
    Ok(())
}

fn handle_rules(args: &cli::RulesArgs) -> Result<()> {
    let config = PipelineConfig::default();
    match &args.output {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Writing configuration to {path:?}"))?;
            info!("Default configuration written to {:?}", path);
        }
        None => print!("{}", config.to_yaml_string()?),
    }
    Ok(())
}

fn current_instant() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
