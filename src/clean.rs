//! Canonicalization of rows that already passed validation.
//!
//! Cleaning is a pure, order-preserving 1:1 map and never fails: anything
//! that reaches it was accepted by the validator. Should a value still not
//! parse, it is carried through as trimmed text rather than dropped.

use log::info;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    config::{FieldKind, RuleSet},
    data::{CleanRecord, CleanedTable, Record, Value, parse_decimal, parse_timestamp},
};

#[derive(Debug, Clone)]
enum Transform {
    Trim,
    TrimUpper,
    Round(u32),
    Timestamp,
    Keep,
}

impl Transform {
    fn for_kind(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Identifier { .. } | FieldKind::Text => Transform::Trim,
            FieldKind::Code { uppercase: true, .. } => Transform::TrimUpper,
            FieldKind::Code { .. } => Transform::Trim,
            FieldKind::Decimal { scale, .. } => Transform::Round(*scale),
            FieldKind::Timestamp { .. } => Transform::Timestamp,
        }
    }

    fn apply(&self, raw: &str) -> Value {
        let trimmed = raw.trim();
        match self {
            Transform::Keep => Value::Text(raw.to_string()),
            Transform::Trim => Value::Text(trimmed.to_string()),
            Transform::TrimUpper => Value::Text(trimmed.to_uppercase()),
            Transform::Round(scale) => match parse_decimal(trimmed) {
                Ok(amount) => Value::Decimal(round_to_scale(amount, *scale)),
                Err(_) => Value::Text(trimmed.to_string()),
            },
            Transform::Timestamp => match parse_timestamp(trimmed) {
                Ok(instant) => Value::Timestamp(instant),
                Err(_) => Value::Text(trimmed.to_string()),
            },
        }
    }
}

/// Rounds half away from zero and pins the scale so rendering shows exactly
/// `scale` fractional digits.
pub fn round_to_scale(amount: Decimal, scale: u32) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}

#[derive(Debug, Clone)]
pub struct DataCleaner {
    headers: Vec<String>,
    transforms: Vec<Transform>,
}

impl DataCleaner {
    /// Plans one transform per column; undeclared columns pass through.
    pub fn new(headers: &[String], rules: &RuleSet) -> Self {
        let transforms = headers
            .iter()
            .map(|name| {
                rules
                    .field(name)
                    .map_or(Transform::Keep, |spec| Transform::for_kind(&spec.kind))
            })
            .collect();
        Self {
            headers: headers.to_vec(),
            transforms,
        }
    }

    pub fn clean_record(&self, record: &Record) -> CleanRecord {
        let values = record
            .values
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let transform = self.transforms.get(idx).unwrap_or(&Transform::Keep);
                cell.as_deref().map(|raw| transform.apply(raw))
            })
            .collect();
        CleanRecord {
            line: record.line,
            values,
        }
    }

    pub fn clean(&self, records: &[Record]) -> CleanedTable {
        let rows = records
            .iter()
            .map(|record| self.clean_record(record))
            .collect::<Vec<_>>();
        info!("Cleaned {} row(s)", rows.len());
        CleanedTable {
            headers: self.headers.clone(),
            rows,
        }
    }
}

/// Cleans the valid rows of a table with the given header.
pub fn clean(headers: &[String], valid: &[Record], rules: &RuleSet) -> CleanedTable {
    DataCleaner::new(headers, rules).clean(valid)
}
