//! Table-level validation and valid/invalid partitioning.
//!
//! The structural check (every required column present) is the only thing
//! that aborts a run. Everything else is classification: each row lands in
//! exactly one side of the [`Partition`], in input order, and invalid rows
//! carry every violation found on them.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use log::{debug, info};
use serde::Serialize;

use crate::{
    config::RuleSet,
    data::{Record, Table},
    error::{ConfigError, PipelineError, SchemaError},
    row::RowValidator,
    violation::{Reason, Violation, ViolationCode, render_reasons},
};

/// An invalid row kept for audit, with its full violation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub record: Record,
    pub violations: Vec<Violation>,
}

impl RejectedRecord {
    /// e.g. `ID_FORMAT(transaction_id); AMOUNT_NOT_POSITIVE(amount)`.
    pub fn rejection_reason(&self) -> String {
        render_reasons(&self.violations)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub headers: Vec<String>,
    pub valid: Vec<Record>,
    pub invalid: Vec<RejectedRecord>,
}

impl Partition {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    rows: RowValidator,
}

impl SchemaValidator {
    pub fn new(rules: &RuleSet, reference: NaiveDateTime) -> Result<Self, ConfigError> {
        Ok(Self {
            rows: RowValidator::new(rules, reference)?,
        })
    }

    pub fn row_validator(&self) -> &RowValidator {
        &self.rows
    }

    /// Fails with every missing required column, sorted by name.
    pub fn check_columns(&self, headers: &[String]) -> Result<(), SchemaError> {
        let mut missing = self
            .rows
            .fields()
            .filter(|f| f.required && !headers.contains(&f.name))
            .map(|f| f.name.clone())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(SchemaError::MissingColumns(missing))
    }

    pub fn validate(&self, table: &Table) -> Result<Partition, SchemaError> {
        self.check_columns(&table.headers)?;

        let layout = self.rows.layout(&table.headers);
        let unique_fields = self
            .rows
            .fields()
            .zip(&layout)
            .filter(|(field, _)| field.unique)
            .filter_map(|(field, position)| position.map(|idx| (field, idx)))
            .collect::<Vec<_>>();
        // Seen values per unique field, scoped to this call.
        let mut seen: Vec<HashSet<&str>> = vec![HashSet::new(); unique_fields.len()];

        let mut partition = Partition {
            headers: table.headers.clone(),
            ..Partition::default()
        };

        for record in &table.rows {
            if record.len() != table.headers.len() {
                debug!(
                    "Row {} has {} field(s), expected {}",
                    record.line,
                    record.len(),
                    table.headers.len()
                );
                partition.invalid.push(RejectedRecord {
                    record: record.clone(),
                    violations: vec![Violation::row(ViolationCode::ROW_MALFORMED)],
                });
                continue;
            }

            let mut violations = self.rows.validate(record, &layout).into_violations();

            for ((field, idx), seen_values) in unique_fields.iter().zip(seen.iter_mut()) {
                let Some(value) = record.get(*idx).map(str::trim).filter(|v| !v.is_empty())
                else {
                    continue;
                };
                let malformed = violations.iter().any(|v| {
                    v.field.as_deref() == Some(field.name.as_str())
                        && matches!(v.code.reason, Reason::Empty | Reason::Format)
                });
                if malformed {
                    continue;
                }
                if !seen_values.insert(value) {
                    violations.push(Violation::field(
                        field.kind.category(),
                        Reason::Duplicate,
                        &field.name,
                    ));
                }
            }

            if violations.is_empty() {
                partition.valid.push(record.clone());
            } else {
                partition.invalid.push(RejectedRecord {
                    record: record.clone(),
                    violations,
                });
            }
        }

        info!(
            "Validation results: {} valid, {} invalid",
            partition.valid.len(),
            partition.invalid.len()
        );
        Ok(partition)
    }
}

/// Compiles `rules` and partitions `table` in one call.
pub fn validate_and_partition(
    table: &Table,
    rules: &RuleSet,
    reference: NaiveDateTime,
) -> Result<Partition, PipelineError> {
    let validator = SchemaValidator::new(rules, reference)?;
    Ok(validator.validate(table)?)
}
