//! Per-record rule evaluation.
//!
//! [`RowValidator`] compiles a [`RuleSet`] once and then checks records
//! field by field. Every declared field is always evaluated, so a record
//! that breaks three rules reports all three.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;

use crate::{
    config::{FieldKind, FieldSpec, RuleSet},
    data::{
        DecimalError, Record, TimestampError, fractional_digits, parse_decimal, parse_timestamp,
    },
    error::ConfigError,
    violation::{Reason, Violation},
};

/// Result of checking one record: either clean, or a non-empty list of
/// violations in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Valid,
    Invalid(Vec<Violation>),
}

impl RowOutcome {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            RowOutcome::Valid
        } else {
            RowOutcome::Invalid(violations)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, RowOutcome::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            RowOutcome::Valid => &[],
            RowOutcome::Invalid(v) => v,
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        match self {
            RowOutcome::Valid => Vec::new(),
            RowOutcome::Invalid(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Identifier(Regex),
    Decimal {
        min: Decimal,
        max: Decimal,
        scale: u32,
    },
    Timestamp {
        earliest: NaiveDateTime,
        latest: NaiveDateTime,
    },
    Code {
        allowed: BTreeSet<String>,
        pattern: Option<Regex>,
    },
    Text,
}

#[derive(Debug, Clone)]
struct CompiledField {
    spec: FieldSpec,
    rule: CompiledRule,
}

#[derive(Debug, Clone)]
pub struct RowValidator {
    fields: Vec<CompiledField>,
}

impl RowValidator {
    /// Compiles `rules`. `reference` is the instant used as the upper
    /// timestamp bound for fields without an explicit `latest`.
    pub fn new(rules: &RuleSet, reference: NaiveDateTime) -> Result<Self, ConfigError> {
        rules.ensure_valid()?;
        let fields = rules
            .fields
            .iter()
            .map(|spec| {
                let rule = compile_rule(spec, reference)?;
                Ok(CompiledField {
                    spec: spec.clone(),
                    rule,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        debug!(
            "Compiled {} field rule(s) with reference instant {}",
            fields.len(),
            reference
        );
        Ok(Self { fields })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().map(|f| &f.spec)
    }

    /// Maps each declared field to its column position in `headers`.
    pub fn layout(&self, headers: &[String]) -> Vec<Option<usize>> {
        self.fields
            .iter()
            .map(|f| headers.iter().position(|h| *h == f.spec.name))
            .collect()
    }

    /// Checks every declared field of `record`. `layout` comes from
    /// [`RowValidator::layout`] for the record's table.
    pub fn validate(&self, record: &Record, layout: &[Option<usize>]) -> RowOutcome {
        let mut violations = Vec::new();
        for (field, position) in self.fields.iter().zip(layout) {
            let raw = position.and_then(|idx| record.get(idx));
            check_field(field, raw, &mut violations);
        }
        RowOutcome::from_violations(violations)
    }
}

fn compile_rule(spec: &FieldSpec, reference: NaiveDateTime) -> Result<CompiledRule, ConfigError> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|source| ConfigError::Pattern {
            field: spec.name.clone(),
            source,
        })
    };
    Ok(match &spec.kind {
        FieldKind::Identifier { pattern } => CompiledRule::Identifier(compile(pattern)?),
        FieldKind::Decimal { min, max, scale } => CompiledRule::Decimal {
            min: *min,
            max: *max,
            scale: *scale,
        },
        FieldKind::Timestamp { earliest, latest } => CompiledRule::Timestamp {
            earliest: *earliest,
            latest: latest.unwrap_or(reference),
        },
        FieldKind::Code {
            allowed, pattern, ..
        } => CompiledRule::Code {
            allowed: allowed.clone(),
            pattern: pattern.as_deref().map(compile).transpose()?,
        },
        FieldKind::Text => CompiledRule::Text,
    })
}

fn check_field(field: &CompiledField, raw: Option<&str>, out: &mut Vec<Violation>) {
    let name = field.spec.name.as_str();
    let category = field.spec.kind.category();
    let mut push = |reason: Reason| out.push(Violation::field(category, reason, name));

    let value = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value,
        None => {
            if field.spec.required {
                push(Reason::Empty);
            }
            return;
        }
    };

    match &field.rule {
        CompiledRule::Identifier(pattern) => {
            if !pattern.is_match(value) {
                push(Reason::Format);
            }
        }
        CompiledRule::Decimal { min, max, scale } => {
            match parse_decimal(value) {
                Ok(amount) => {
                    if amount <= Decimal::ZERO {
                        push(Reason::NotPositive);
                    }
                    if amount < *min || amount > *max {
                        push(Reason::OutOfRange);
                    }
                }
                Err(DecimalError::Unrepresentable(approx)) => {
                    if approx <= 0.0 {
                        push(Reason::NotPositive);
                    }
                    push(Reason::OutOfRange);
                }
                Err(DecimalError::NotNumeric) => {
                    push(Reason::NotNumeric);
                    return;
                }
            }
            // Judged on the source text, before any rounding.
            if fractional_digits(value) > *scale as usize {
                push(Reason::Precision);
            }
        }
        CompiledRule::Timestamp { earliest, latest } => match parse_timestamp(value) {
            Ok(instant) => {
                if instant < *earliest {
                    push(Reason::BeforeEpoch);
                }
                if instant > *latest {
                    push(Reason::FutureCutoff);
                }
            }
            Err(TimestampError::Format) => push(Reason::Format),
            Err(TimestampError::ComponentRange) => push(Reason::ComponentRange),
        },
        CompiledRule::Code { allowed, pattern } => {
            if pattern.as_ref().is_some_and(|p| !p.is_match(value)) {
                push(Reason::Format);
            } else if !allowed.contains(value) {
                push(Reason::NotAllowed);
            }
        }
        CompiledRule::Text => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Category;

    fn reference() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn validator() -> RowValidator {
        RowValidator::new(&RuleSet::default(), reference()).unwrap()
    }

    fn headers() -> Vec<String> {
        ["transaction_id", "amount", "timestamp", "country"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn check(values: [&str; 4]) -> Vec<String> {
        let v = validator();
        let layout = v.layout(&headers());
        let record = Record::new(
            1,
            values
                .iter()
                .map(|s| (!s.is_empty()).then(|| s.to_string()))
                .collect(),
        );
        v.validate(&record, &layout)
            .into_violations()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn valid_record_has_no_violations() {
        assert!(check(["TXN_001_ABC", "100.50", "2025-01-13T14:30:00Z", "US"]).is_empty());
        assert!(check(["  TXN_001_ABC  ", "0.01", "2025-01-13", " GB "]).is_empty());
    }

    #[test]
    fn violations_accumulate_across_fields() {
        let found = check(["TXN_003", "-50.00", "2025-01-13", "XX"]);
        assert_eq!(
            found,
            [
                "ID_FORMAT(transaction_id)",
                "AMOUNT_NOT_POSITIVE(amount)",
                "AMOUNT_OUT_OF_RANGE(amount)",
                "CODE_NOT_ALLOWED(country)",
            ]
        );
    }

    #[test]
    fn empty_values_report_empty_per_field() {
        let found = check(["", "", "", ""]);
        assert_eq!(
            found,
            [
                "ID_EMPTY(transaction_id)",
                "AMOUNT_EMPTY(amount)",
                "TIMESTAMP_EMPTY(timestamp)",
                "CODE_EMPTY(country)",
            ]
        );
        assert_eq!(check(["   ", "1.00", "2025-01-13", "US"]), ["ID_EMPTY(transaction_id)"]);
    }

    #[test]
    fn identifier_pattern_is_case_sensitive_with_inclusive_length() {
        assert!(check(["ABCDEFGH", "1.00", "2025-01-13", "US"]).is_empty());
        assert!(check(["A".repeat(32).as_str(), "1.00", "2025-01-13", "US"]).is_empty());
        assert_eq!(
            check(["A".repeat(33).as_str(), "1.00", "2025-01-13", "US"]),
            ["ID_FORMAT(transaction_id)"]
        );
        assert_eq!(
            check(["txn_001_abc", "1.00", "2025-01-13", "US"]),
            ["ID_FORMAT(transaction_id)"]
        );
    }

    #[test]
    fn amount_rules() {
        assert_eq!(
            check(["TXN_001_ABC", "abc", "2025-01-13", "US"]),
            ["AMOUNT_NOT_NUMERIC(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "0", "2025-01-13", "US"]),
            ["AMOUNT_NOT_POSITIVE(amount)", "AMOUNT_OUT_OF_RANGE(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1000000000.00", "2025-01-13", "US"]),
            ["AMOUNT_OUT_OF_RANGE(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "100.555", "2025-01-13", "US"]),
            ["AMOUNT_PRECISION(amount)"]
        );
        assert!(check(["TXN_001_ABC", "999999999.99", "2025-01-13", "US"]).is_empty());
    }

    #[test]
    fn timestamp_rules() {
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "01/13/2025", "US"]),
            ["TIMESTAMP_FORMAT(timestamp)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2025-13-01", "US"]),
            ["TIMESTAMP_COMPONENT_RANGE(timestamp)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "1969-12-31T23:59:59", "US"]),
            ["TIMESTAMP_BEFORE_EPOCH(timestamp)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2050-01-01T00:00:00", "US"]),
            ["TIMESTAMP_FUTURE_CUTOFF(timestamp)"]
        );
    }

    #[test]
    fn future_cutoff_is_inclusive_at_one_second_resolution() {
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2030-12-31T00:00:01", "US"]),
            ["TIMESTAMP_FUTURE_CUTOFF(timestamp)"]
        );
        assert!(check(["TXN_001_ABC", "1.00", "2030-12-30T23:59:59", "US"]).is_empty());
        assert!(check(["TXN_001_ABC", "1.00", "2030-12-31T00:00:00", "US"]).is_empty());
    }

    #[test]
    fn reference_instant_applies_when_latest_is_unset() {
        let mut rules = RuleSet::default();
        for field in &mut rules.fields {
            if let FieldKind::Timestamp { latest, .. } = &mut field.kind {
                *latest = None;
            }
        }
        let v = RowValidator::new(&rules, reference()).unwrap();
        let layout = v.layout(&headers());
        let row = |ts: &str| {
            Record::new(
                1,
                ["TXN_001_ABC", "1.00", ts, "US"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            )
        };
        assert!(v.validate(&row("2025-12-31T23:59:59"), &layout).is_valid());
        let late = v.validate(&row("2026-01-01T00:00:01"), &layout);
        assert_eq!(
            late.violations()[0].code,
            crate::violation::ViolationCode::new(Category::Timestamp, Reason::FutureCutoff)
        );
    }

    #[test]
    fn amounts_beyond_decimal_capacity_are_out_of_range() {
        assert_eq!(
            check(["TXN_001_ABC", "99999999999999999999999999999999", "2025-01-13", "US"]),
            ["AMOUNT_OUT_OF_RANGE(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1e40", "2025-01-13", "US"]),
            ["AMOUNT_OUT_OF_RANGE(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "-1e40", "2025-01-13", "US"]),
            ["AMOUNT_NOT_POSITIVE(amount)", "AMOUNT_OUT_OF_RANGE(amount)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1e4x", "2025-01-13", "US"]),
            ["AMOUNT_NOT_NUMERIC(amount)"]
        );
    }

    #[test]
    fn scientific_notation_precision_counts_the_exponent() {
        assert_eq!(
            check(["TXN_001_ABC", "1234e-3", "2025-01-13", "US"]),
            ["AMOUNT_PRECISION(amount)"]
        );
        assert!(check(["TXN_001_ABC", "1.25e2", "2025-01-13", "US"]).is_empty());
        assert!(check(["TXN_001_ABC", "125e-2", "2025-01-13", "US"]).is_empty());
    }

    #[test]
    fn non_ascii_date_digits_are_a_format_failure() {
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2025-\u{661}\u{660}-01", "US"]),
            ["TIMESTAMP_FORMAT(timestamp)"]
        );
    }

    #[test]
    fn country_shape_is_checked_before_membership() {
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2025-01-13", "us"]),
            ["CODE_FORMAT(country)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2025-01-13", "USA"]),
            ["CODE_FORMAT(country)"]
        );
        assert_eq!(
            check(["TXN_001_ABC", "1.00", "2025-01-13", "XX"]),
            ["CODE_NOT_ALLOWED(country)"]
        );
    }

    #[test]
    fn code_pattern_failure_skips_membership() {
        let rules = RuleSet::new(vec![FieldSpec::new(
            "country",
            FieldKind::Code {
                allowed: ["US".to_string()].into_iter().collect(),
                pattern: Some("^[A-Z]{2}$".to_string()),
                uppercase: true,
            },
        )]);
        let v = RowValidator::new(&rules, reference()).unwrap();
        let layout = v.layout(&["country".to_string()]);
        let outcome = v.validate(&Record::new(1, vec![Some("USA".into())]), &layout);
        assert_eq!(outcome.violations()[0].to_string(), "CODE_FORMAT(country)");
        assert_eq!(outcome.violations().len(), 1);
    }

    #[test]
    fn optional_fields_skip_missing_values() {
        let rules = RuleSet::new(vec![FieldSpec::new("note", FieldKind::Text).optional()]);
        let v = RowValidator::new(&rules, reference()).unwrap();
        assert!(v.validate(&Record::new(1, vec![None]), &[Some(0)]).is_valid());
        assert!(v.validate(&Record::new(1, vec![]), &[None]).is_valid());
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let rules = RuleSet::new(vec![FieldSpec::new(
            "id",
            FieldKind::Identifier {
                pattern: "([".to_string(),
            },
        )]);
        assert!(matches!(
            RowValidator::new(&rules, reference()),
            Err(ConfigError::Pattern { field, .. }) if field == "id"
        ));
    }
}
