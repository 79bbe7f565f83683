//! Heuristic data-quality assessment over an untyped table.
//!
//! The assessor does not consult the rule set. It profiles whatever text it
//! is given, raw input or cleaned output, and classifies each column by what
//! its non-null cells look like.

use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::{
    config::QualityThresholds,
    data::{Table, parse_number, parse_timestamp},
    frequency::FrequencyCounter,
    stats::{NumericStats, percentile, round2},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    MissingValues,
    Duplicates,
    DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataProfile {
    pub rows: usize,
    pub columns: usize,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
    pub datetime_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub quality_score: f64,
    pub missing_pct: f64,
    pub duplicate_pct: f64,
    pub data_profile: DataProfile,
    pub issues_detected: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub insights: Vec<String>,
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Datetime,
    Categorical,
    Empty,
}

struct ColumnProfile<'a> {
    name: &'a str,
    kind: ColumnKind,
    present: Vec<&'a str>,
    numbers: Vec<f64>,
}

impl<'a> ColumnProfile<'a> {
    fn build(table: &'a Table, idx: usize) -> Self {
        let present = table.column(idx).flatten().collect::<Vec<_>>();
        let numbers = present
            .iter()
            .filter_map(|cell| parse_number(cell))
            .collect::<Vec<_>>();
        let kind = if present.is_empty() {
            ColumnKind::Empty
        } else if numbers.len() == present.len() {
            ColumnKind::Numeric
        } else if present.iter().all(|cell| parse_timestamp(cell).is_ok()) {
            ColumnKind::Datetime
        } else {
            ColumnKind::Categorical
        };
        Self {
            name: &table.headers[idx],
            kind,
            present,
            numbers,
        }
    }

    fn numeric_share(&self) -> f64 {
        if self.present.is_empty() {
            0.0
        } else {
            self.numbers.len() as f64 / self.present.len() as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    thresholds: QualityThresholds,
}

impl QualityAssessor {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn assess(&self, table: &Table) -> QualityReport {
        let rows = table.row_count();
        let columns = table.column_count();
        let profiles = (0..columns)
            .map(|idx| ColumnProfile::build(table, idx))
            .collect::<Vec<_>>();

        let total_cells = rows * columns;
        let missing_cells = profiles
            .iter()
            .map(|p| rows.saturating_sub(p.present.len()))
            .sum::<usize>();
        let missing_pct = percent(missing_cells, total_cells);
        let duplicate_pct = percent(duplicate_rows(table), rows);
        let completeness = 100.0 - missing_pct;
        let quality_score = if rows == 0 {
            0.0
        } else {
            round2((completeness - 0.5 * duplicate_pct).clamp(0.0, 100.0))
        };
        debug!("Completeness {completeness:.2}%, duplicates {duplicate_pct:.2}%");

        let count_kind = |kind| profiles.iter().filter(|p| p.kind == kind).count();
        let data_profile = DataProfile {
            rows,
            columns,
            numeric_columns: count_kind(ColumnKind::Numeric),
            categorical_columns: count_kind(ColumnKind::Categorical),
            datetime_columns: count_kind(ColumnKind::Datetime),
        };

        let (issues_detected, recommendations, insights) = if rows == 0 {
            (Vec::new(), Vec::new(), Vec::new())
        } else {
            (
                self.detect_issues(&profiles),
                self.recommend(table, &profiles, missing_pct, duplicate_pct),
                self.insights(&profiles, rows, columns),
            )
        };
        let suggested_actions = suggest_actions(missing_pct, duplicate_pct, &issues_detected);

        info!(
            "Quality score {:.2} with {} issue(s) and {} recommendation(s)",
            quality_score,
            issues_detected.len(),
            recommendations.len()
        );

        QualityReport {
            quality_score,
            missing_pct: round2(missing_pct),
            duplicate_pct: round2(duplicate_pct),
            data_profile,
            issues_detected,
            recommendations,
            insights,
            suggested_actions,
        }
    }

    fn detect_issues(&self, profiles: &[ColumnProfile<'_>]) -> Vec<String> {
        let mut issues = profiles
            .iter()
            .filter(|p| p.kind == ColumnKind::Empty)
            .map(|p| format!("Column '{}' is completely empty", p.name))
            .collect::<Vec<_>>();
        for profile in profiles.iter().filter(|p| p.kind == ColumnKind::Numeric) {
            let outliers = count_outliers(&profile.numbers, self.thresholds.iqr_multiplier);
            if outliers > 0 {
                issues.push(format!(
                    "Column '{}' contains {outliers} potential outliers",
                    profile.name
                ));
            }
        }
        issues
    }

    fn recommend(
        &self,
        table: &Table,
        profiles: &[ColumnProfile<'_>],
        missing_pct: f64,
        duplicate_pct: f64,
    ) -> Vec<Recommendation> {
        let t = &self.thresholds;
        let mut recommendations = Vec::new();

        if missing_pct > 0.0 {
            let affected = profiles
                .iter()
                .filter(|p| p.present.len() < table.row_count())
                .map(|p| p.name)
                .join(", ");
            let (severity, label) = if missing_pct > t.missing_high_pct {
                (Severity::High, "High missing data")
            } else if missing_pct > t.missing_medium_pct {
                (Severity::Medium, "Missing data")
            } else {
                (Severity::Low, "Some missing data")
            };
            recommendations.push(Recommendation {
                kind: RecommendationKind::MissingValues,
                severity,
                message: format!("{label} ({missing_pct:.1}%) in columns: {affected}"),
                action: "Consider imputation or removal of rows with missing values".to_string(),
            });
        }

        if duplicate_pct > t.duplicate_pct {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Duplicates,
                severity: Severity::Medium,
                message: format!("Found {duplicate_pct:.1}% duplicate rows"),
                action: "Remove duplicates before further analysis".to_string(),
            });
        }

        for profile in profiles.iter().filter(|p| p.kind == ColumnKind::Categorical) {
            if profile.numeric_share() >= t.numeric_majority {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::DataType,
                    severity: Severity::Low,
                    message: format!(
                        "Column '{}' appears to be numeric but stored as text",
                        profile.name
                    ),
                    action: "Convert to numeric for better analysis".to_string(),
                });
            }
        }

        recommendations
    }

    fn insights(&self, profiles: &[ColumnProfile<'_>], rows: usize, columns: usize) -> Vec<String> {
        let t = &self.thresholds;
        let mut insights = Vec::new();

        for profile in profiles.iter().filter(|p| p.kind == ColumnKind::Numeric) {
            let Some(skewness) = NumericStats::from_values(&profile.numbers).skewness() else {
                continue;
            };
            if skewness.abs() > t.skewness {
                insights.push(format!(
                    "Column '{}' has skewed distribution (skewness: {skewness:.2})",
                    profile.name
                ));
            }
        }

        for profile in profiles.iter().filter(|p| p.kind == ColumnKind::Categorical) {
            let distinct = profile.present.iter().copied().collect::<FrequencyCounter<_>>().distinct();
            let ratio = distinct as f64 / profile.present.len() as f64;
            if ratio > t.cardinality_ratio {
                insights.push(format!(
                    "Column '{}' has high cardinality ({distinct} unique values)",
                    profile.name
                ));
            }
        }

        insights.push(format!(
            "Dataset contains {} rows and {columns} columns",
            group_thousands(rows)
        ));
        let names_of = |kind| {
            profiles
                .iter()
                .filter(|p| p.kind == kind)
                .map(|p| p.name)
                .join(", ")
        };
        let numeric = names_of(ColumnKind::Numeric);
        if !numeric.is_empty() {
            insights.push(format!("Numeric columns: {numeric}"));
        }
        let categorical = names_of(ColumnKind::Categorical);
        if !categorical.is_empty() {
            insights.push(format!("Categorical columns: {categorical}"));
        }
        insights
    }
}

/// Assesses `table` with the default thresholds.
pub fn assess_quality(table: &Table) -> QualityReport {
    QualityAssessor::default().assess(table)
}

/// Rows identical, cell for cell, to an earlier row.
fn duplicate_rows(table: &Table) -> usize {
    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .filter(|row| !seen.insert(&row.values))
        .count()
}

/// Values outside the Tukey fence `[Q1 − k·IQR, Q3 + k·IQR]`.
pub fn count_outliers(values: &[f64], multiplier: f64) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (Some(q1), Some(q3)) = (percentile(&sorted, 0.25), percentile(&sorted, 0.75)) else {
        return 0;
    };
    let iqr = q3 - q1;
    let (low, high) = (q1 - multiplier * iqr, q3 + multiplier * iqr);
    sorted.iter().filter(|v| **v < low || **v > high).count()
}

fn suggest_actions(missing_pct: f64, duplicate_pct: f64, issues: &[String]) -> Vec<String> {
    let mut actions = Vec::new();
    if missing_pct > 0.0 {
        actions.push("Handle missing values (impute or remove)");
    }
    if duplicate_pct > 0.0 {
        actions.push("Remove duplicate records");
    }
    if !issues.is_empty() {
        actions.push("Investigate and handle detected issues");
    }
    actions.push("Validate data against business rules");
    actions.push("Export cleaned data for further analysis");
    actions.into_iter().map(String::from).collect()
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
