//! Field rules and pipeline configuration.
//!
//! A [`RuleSet`] is the injectable description of what a well-formed record
//! looks like: one [`FieldSpec`] per declared column, each carrying a
//! [`FieldKind`] with the constraints for that kind of value. The same
//! validator logic runs unchanged under any rule set, so a different
//! whitelist or bound is a configuration change.
//!
//! [`PipelineConfig`] groups the rule set with the ingestion null tokens and
//! the [`QualityThresholds`] used by the quality assessor. It round-trips
//! through YAML; omitted sections fall back to their defaults.

use std::{
    collections::{BTreeSet, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, violation::Category};

pub const DEFAULT_ID_PATTERN: &str = r"^[A-Z0-9_-]{8,32}$";
pub const DEFAULT_AMOUNT_SCALE: u32 = 2;
pub const COUNTRY_CODE_PATTERN: &str = r"^[A-Z]{2}$";

const DEFAULT_COUNTRIES: &[&str] = &[
    "US", "GB", "DE", "FR", "JP", "CN", "IN", "CA", "AU", "BR", "MX", "ES", "IT", "NL", "SE", "CH",
    "KR", "SG", "HK", "NZ",
];

const DEFAULT_NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NULL", "null", "NaN", "nan"];

/// Constraints attached to a single declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Record key; case-sensitive pattern over the trimmed value.
    Identifier { pattern: String },
    /// Positive decimal amount with an inclusive range and a maximum number
    /// of fractional digits in the source text.
    Decimal {
        min: Decimal,
        max: Decimal,
        scale: u32,
    },
    /// ISO-8601 subset instant. `latest` falls back to the validator's
    /// reference instant when absent.
    Timestamp {
        earliest: NaiveDateTime,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latest: Option<NaiveDateTime>,
    },
    /// Case-exact member of an enumerated set.
    Code {
        allowed: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default = "default_true")]
        uppercase: bool,
    },
    /// Free text; only requiredness is enforced.
    Text,
}

impl FieldKind {
    pub fn category(&self) -> Category {
        match self {
            FieldKind::Identifier { .. } => Category::Id,
            FieldKind::Decimal { .. } => Category::Amount,
            FieldKind::Timestamp { .. } => Category::Timestamp,
            FieldKind::Code { .. } => Category::Code,
            FieldKind::Text => Category::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Identifier { .. } => "identifier",
            FieldKind::Decimal { .. } => "decimal",
            FieldKind::Timestamp { .. } => "timestamp",
            FieldKind::Code { .. } => "code",
            FieldKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Values must not repeat within one table (first occurrence wins).
    #[serde(default)]
    pub unique: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            required: true,
            unique: false,
            kind,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub fields: Vec<FieldSpec>,
}

impl RuleSet {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    /// Checks internal consistency. Pattern syntax is checked when the
    /// validator compiles them.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
            match &field.kind {
                FieldKind::Decimal { min, max, .. } if min > max => {
                    return Err(ConfigError::InvertedBounds {
                        field: field.name.clone(),
                        lower: min.to_string(),
                        upper: max.to_string(),
                    });
                }
                FieldKind::Timestamp {
                    earliest,
                    latest: Some(latest),
                } if earliest > latest => {
                    return Err(ConfigError::InvertedBounds {
                        field: field.name.clone(),
                        lower: earliest.to_string(),
                        upper: latest.to_string(),
                    });
                }
                FieldKind::Code { allowed, .. } if allowed.is_empty() => {
                    return Err(ConfigError::EmptyAllowedSet(field.name.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    /// Transaction feed rules: id, amount, timestamp, country.
    fn default() -> Self {
        Self::new(vec![
            FieldSpec::new(
                "transaction_id",
                FieldKind::Identifier {
                    pattern: DEFAULT_ID_PATTERN.to_string(),
                },
            )
            .unique(),
            FieldSpec::new(
                "amount",
                FieldKind::Decimal {
                    min: Decimal::new(1, 2),
                    max: Decimal::new(99_999_999_999, 2),
                    scale: DEFAULT_AMOUNT_SCALE,
                },
            ),
            FieldSpec::new(
                "timestamp",
                FieldKind::Timestamp {
                    earliest: midnight(1970, 1, 1),
                    latest: Some(midnight(2030, 12, 31)),
                },
            ),
            FieldSpec::new(
                "country",
                FieldKind::Code {
                    allowed: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
                    pattern: Some(COUNTRY_CODE_PATTERN.to_string()),
                    uppercase: true,
                },
            ),
        ])
    }
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn default_true() -> bool {
    true
}

/// Fixed thresholds driving the heuristic quality assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Missing-cell percentage above which the recommendation is high severity.
    pub missing_high_pct: f64,
    /// Missing-cell percentage above which a non-high recommendation is medium.
    pub missing_medium_pct: f64,
    pub duplicate_pct: f64,
    pub cardinality_ratio: f64,
    pub skewness: f64,
    pub iqr_multiplier: f64,
    /// Share of non-null cells that must parse as numbers before a mixed
    /// column is reported as "mostly numeric".
    pub numeric_majority: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            missing_high_pct: 10.0,
            missing_medium_pct: 5.0,
            duplicate_pct: 5.0,
            cardinality_ratio: 0.9,
            skewness: 1.0,
            iqr_multiplier: 1.5,
            numeric_majority: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rules: RuleSet,
    /// Cell values (after trimming) read as missing at ingestion.
    pub null_tokens: Vec<String>,
    pub quality: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect(),
            quality: QualityThresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(text)?;
        config.rules.ensure_valid()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: PipelineConfig = serde_yaml::from_reader(reader)?;
        config.rules.ensure_valid()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn is_null_token(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.null_tokens.iter().any(|token| token == trimmed)
    }
}
