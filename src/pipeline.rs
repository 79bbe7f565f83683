//! End-to-end run over one materialized table.
//!
//! Each stage runs to completion over the fully materialized table before the
//! next one starts. Wall-clock readings only feed [`RunMetadata`]; they never
//! influence classification or statistics.

use std::time::Instant;

use chrono::{NaiveDateTime, SecondsFormat, Utc};
use log::info;
use serde::Serialize;

use crate::{
    clean::DataCleaner,
    config::PipelineConfig,
    data::{CleanedTable, Table},
    error::PipelineError,
    stats::{StatisticsReport, compute_statistics_with_tally, round2, tally_violations},
    validate::{Partition, SchemaValidator},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub execution_timestamp: String,
    pub processing_duration_seconds: f64,
}

/// Statistics document as persisted next to the cleaned output.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsDocument<'a> {
    #[serde(flatten)]
    pub report: &'a StatisticsReport,
    pub execution_metadata: &'a RunMetadata,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub partition: Partition,
    pub cleaned: CleanedTable,
    pub statistics: StatisticsReport,
    pub metadata: RunMetadata,
}

impl PipelineRun {
    pub fn statistics_document(&self) -> StatisticsDocument<'_> {
        StatisticsDocument {
            report: &self.statistics,
            execution_metadata: &self.metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    reference: NaiveDateTime,
}

impl Pipeline {
    /// `reference` is the instant future-dated timestamps are judged against
    /// when a timestamp field has no explicit upper bound.
    pub fn new(config: PipelineConfig, reference: NaiveDateTime) -> Self {
        Self { config, reference }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, table: &Table) -> Result<PipelineRun, PipelineError> {
        let started = Instant::now();
        let execution_timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        info!(
            "Starting pipeline over {} row(s) and {} column(s)",
            table.row_count(),
            table.column_count()
        );

        let validator = SchemaValidator::new(&self.config.rules, self.reference)?;
        let partition = validator.validate(table)?;

        let cleaned = DataCleaner::new(&partition.headers, &self.config.rules).clean(&partition.valid);
        let tally = tally_violations(&partition.invalid);
        let statistics = compute_statistics_with_tally(&cleaned, &partition.invalid, tally);

        let metadata = RunMetadata {
            execution_timestamp,
            processing_duration_seconds: round2(started.elapsed().as_secs_f64()),
        };
        info!(
            "Pipeline finished in {:.2}s: {} valid, {} invalid",
            metadata.processing_duration_seconds,
            partition.valid.len(),
            partition.invalid.len()
        );

        Ok(PipelineRun {
            partition,
            cleaned,
            statistics,
            metadata,
        })
    }
}
