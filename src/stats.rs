//! Summary statistics over the cleaned partition.
//!
//! Column kind follows the canonical values produced by cleaning. Decimal
//! columns get numeric metrics and timestamp columns temporal metrics; any
//! other column, undeclared extras included, is summarized as text. The
//! report also carries global row counts and the violation tally of the
//! invalid rows.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use log::info;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::{
    data::{CANONICAL_TIMESTAMP_FORMAT, CleanedTable, Value},
    frequency::FrequencyCounter,
    validate::RejectedRecord,
    violation::ViolationCode,
};

const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub ingestion_summary: IngestionSummary,
    pub error_breakdown: BTreeMap<ViolationCode, usize>,
    pub column_statistics: Vec<ColumnStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionSummary {
    pub total_rows_read: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    /// valid / total × 100, rounded to 2 places; 0 for an empty input.
    pub data_quality_score_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub column: String,
    #[serde(flatten)]
    pub summary: ColumnSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Text(TextSummary),
    Temporal(TemporalSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub nulls: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation (n − 1); 0 when fewer than two values.
    pub std_dev: f64,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSummary {
    pub count: usize,
    pub nulls: usize,
    pub unique_count: usize,
    pub most_frequent: Option<ValueCount>,
    pub most_common: Vec<ValueCount>,
    pub avg_length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalSummary {
    pub count: usize,
    pub nulls: usize,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub date_range_days: Option<i64>,
    pub most_frequent_date: Option<ValueCount>,
}

/// Occurrences of each violation code across all invalid rows.
pub fn tally_violations(invalid: &[RejectedRecord]) -> BTreeMap<ViolationCode, usize> {
    let mut tally = BTreeMap::new();
    for rejected in invalid {
        for violation in &rejected.violations {
            *tally.entry(violation.code).or_insert(0) += 1;
        }
    }
    tally
}

pub fn compute_statistics(cleaned: &CleanedTable, invalid: &[RejectedRecord]) -> StatisticsReport {
    compute_statistics_with_tally(cleaned, invalid, tally_violations(invalid))
}

pub fn compute_statistics_with_tally(
    cleaned: &CleanedTable,
    invalid: &[RejectedRecord],
    error_breakdown: BTreeMap<ViolationCode, usize>,
) -> StatisticsReport {
    let valid_rows = cleaned.len();
    let invalid_rows = invalid.len();
    let total_rows_read = valid_rows + invalid_rows;
    let data_quality_score_percent = if total_rows_read == 0 {
        0.0
    } else {
        round2(valid_rows as f64 / total_rows_read as f64 * 100.0)
    };

    let column_statistics = if cleaned.is_empty() {
        Vec::new()
    } else {
        (0..cleaned.headers.len())
            .map(|idx| ColumnStatistics {
                column: cleaned.headers[idx].clone(),
                summary: summarize_column(cleaned, idx),
            })
            .collect()
    };

    info!(
        "Computed statistics for {} column(s) over {} row(s)",
        column_statistics.len(),
        total_rows_read
    );

    StatisticsReport {
        ingestion_summary: IngestionSummary {
            total_rows_read,
            valid_rows,
            invalid_rows,
            data_quality_score_percent,
        },
        error_breakdown,
        column_statistics,
    }
}

fn summarize_column(cleaned: &CleanedTable, idx: usize) -> ColumnSummary {
    let values = cleaned.rows.iter().map(|row| row.get(idx)).collect::<Vec<_>>();
    let present = values.iter().flatten().copied().collect::<Vec<_>>();
    let nulls = values.len() - present.len();

    if !present.is_empty() && present.iter().all(|v| matches!(v, Value::Decimal(_))) {
        let amounts = present
            .iter()
            .filter_map(|v| match v {
                Value::Decimal(d) => Some(*d),
                _ => None,
            })
            .collect::<Vec<_>>();
        return ColumnSummary::Numeric(NumericStats::from_decimals(&amounts).summary(nulls));
    }
    if !present.is_empty() && present.iter().all(|v| matches!(v, Value::Timestamp(_))) {
        let instants = present
            .iter()
            .filter_map(|v| match v {
                Value::Timestamp(ts) => Some(*ts),
                _ => None,
            })
            .collect::<Vec<_>>();
        return ColumnSummary::Temporal(summarize_temporal(&instants, nulls));
    }
    let texts = present.iter().map(|v| v.as_display()).collect::<Vec<_>>();
    ColumnSummary::Text(summarize_text(&texts, nulls))
}

/// Numeric accumulator shared with the quality assessor.
#[derive(Debug, Clone, Default)]
pub struct NumericStats {
    values: Vec<f64>,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl NumericStats {
    pub fn from_values(values: &[f64]) -> Self {
        let mut stats = NumericStats::default();
        for value in values {
            stats.add(*value);
        }
        stats
    }

    fn from_decimals(amounts: &[Decimal]) -> Self {
        let mut stats = NumericStats::default();
        for amount in amounts {
            if let Some(value) = amount.to_f64() {
                stats.add(value);
            }
        }
        // Exact sum, so currency totals do not drift.
        if let Some(exact) = amounts
            .iter()
            .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
            .and_then(|total| total.to_f64())
        {
            stats.sum = exact;
        }
        stats
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.count() as f64)
        }
    }

    pub fn std_dev(&self) -> f64 {
        let n = self.count();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean().unwrap_or_default();
        let squared = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        (squared / (n as f64 - 1.0)).sqrt()
    }

    pub fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Adjusted Fisher-Pearson sample skewness; `None` below three values.
    pub fn skewness(&self) -> Option<f64> {
        let n = self.count();
        if n < 3 {
            return None;
        }
        let mean = self.mean()?;
        let nf = n as f64;
        let m2 = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
        let m3 = self.values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;
        if m2 <= (f64::EPSILON * mean.abs().max(1.0)).powi(2) {
            return Some(0.0);
        }
        let g1 = m3 / m2.powf(1.5);
        Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
    }

    fn summary(&self, nulls: usize) -> NumericSummary {
        let sorted = self.sorted();
        NumericSummary {
            count: self.count(),
            nulls,
            min: self.min,
            max: self.max,
            mean: self.mean(),
            median: percentile(&sorted, 0.5),
            std_dev: self.std_dev(),
            p25: percentile(&sorted, 0.25),
            p75: percentile(&sorted, 0.75),
            sum: self.sum,
        }
    }
}

/// Linear-interpolation percentile over ascending `sorted`, `p` in [0, 1].
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn summarize_text(values: &[String], nulls: usize) -> TextSummary {
    let counter = values.iter().cloned().collect::<FrequencyCounter<_>>();
    let avg_length = if values.is_empty() {
        None
    } else {
        let total = values.iter().map(|v| v.chars().count()).sum::<usize>();
        Some(round2(total as f64 / values.len() as f64))
    };
    TextSummary {
        count: values.len(),
        nulls,
        unique_count: counter.distinct(),
        most_frequent: counter.most_frequent().map(value_count),
        most_common: counter.top(TOP_VALUES).into_iter().map(value_count).collect(),
        avg_length,
    }
}

fn summarize_temporal(instants: &[NaiveDateTime], nulls: usize) -> TemporalSummary {
    let earliest = instants.iter().min().copied();
    let latest = instants.iter().max().copied();
    let date_range_days = earliest
        .zip(latest)
        .map(|(first, last)| (last - first).num_days());
    let dates = instants
        .iter()
        .map(|ts| ts.date().format("%Y-%m-%d").to_string())
        .collect::<FrequencyCounter<_>>();
    let render = |ts: NaiveDateTime| ts.format(CANONICAL_TIMESTAMP_FORMAT).to_string();
    TemporalSummary {
        count: instants.len(),
        nulls,
        earliest: earliest.map(render),
        latest: latest.map(render),
        date_range_days,
        most_frequent_date: dates.most_frequent().map(value_count),
    }
}

fn value_count((value, count): (&String, usize)) -> ValueCount {
    ValueCount {
        value: value.clone(),
        count,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
