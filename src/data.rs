use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

pub const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static TIMESTAMP_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})(?:T([0-9]{2}):([0-9]{2}):([0-9]{2})Z?)?$")
        .expect("timestamp shape pattern is valid")
});

static NUMBER_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("number shape pattern is valid")
});

/// One input row. `None` marks a missing cell; present cells keep their raw
/// text, surrounding whitespace included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    /// 1-based position of the row among the data rows of its table.
    pub line: usize,
    pub values: Vec<Option<String>>,
}

impl Record {
    pub fn new(line: usize, values: Vec<Option<String>>) -> Self {
        Self { line, values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully materialized table: header plus rows in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from text cells; blank cells become missing.
    pub fn from_text_rows<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let mut table = Table::new(headers.into_iter().map(Into::into).collect());
        for row in rows {
            let cells = row
                .into_iter()
                .map(Into::into)
                .map(|cell: String| (!cell.trim().is_empty()).then_some(cell))
                .collect();
            table.push_row(cells);
        }
        table
    }

    pub fn push_row(&mut self, values: Vec<Option<String>>) {
        let line = self.rows.len() + 1;
        self.rows.push(Record::new(line, values));
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column in row order; short rows yield missing cells.
    pub fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |row| row.get(index))
    }
}

/// Canonical, type-coerced cell value produced by cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Text(String),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            // Decimal keeps its scale, so 100.5 rescaled to 2 renders "100.50".
            Value::Decimal(d) => d.to_string(),
            Value::Timestamp(ts) => ts.format(CANONICAL_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanRecord {
    pub line: usize,
    pub values: Vec<Option<Value>>,
}

impl CleanRecord {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanedTable {
    pub headers: Vec<String>,
    pub rows: Vec<CleanRecord>,
}

impl CleanedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders canonical values back to text, e.g. for a quality pass over
    /// the cleaned output.
    pub fn to_table(&self) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| {
                    Record::new(
                        row.line,
                        row.values
                            .iter()
                            .map(|v| v.as_ref().map(Value::as_display))
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampError {
    /// Not one of `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DDTHH:MM:SSZ`.
    Format,
    /// Right shape, impossible calendar or clock component.
    ComponentRange,
}

/// Parses the accepted ISO-8601 subset as a UTC instant. Date-only input is
/// midnight. Explicit non-UTC offsets are a format failure.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TimestampError> {
    let caps = TIMESTAMP_SHAPE
        .captures(value.trim())
        .ok_or(TimestampError::Format)?;
    let number = |idx: usize| -> u32 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let year = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or(TimestampError::Format)?;
    let date = NaiveDate::from_ymd_opt(year, number(2), number(3))
        .ok_or(TimestampError::ComponentRange)?;
    let time = NaiveTime::from_hms_opt(number(4), number(5), number(6))
        .ok_or(TimestampError::ComponentRange)?;
    Ok(date.and_time(time))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecimalError {
    /// Not a decimal literal at all.
    NotNumeric,
    /// A well-formed literal beyond what [`Decimal`] can hold. Carries the
    /// approximate value so sign checks still apply.
    Unrepresentable(f64),
}

/// Parses a decimal literal, accepting scientific notation.
pub fn parse_decimal(value: &str) -> Result<Decimal, DecimalError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DecimalError::NotNumeric);
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| {
            if NUMBER_SHAPE.is_match(trimmed) {
                DecimalError::Unrepresentable(trimmed.parse::<f64>().unwrap_or(f64::INFINITY))
            } else {
                DecimalError::NotNumeric
            }
        })
}

/// Number of digits after the decimal point once any exponent is applied,
/// counted on the source text so trailing zeros still count.
pub fn fractional_digits(value: &str) -> usize {
    let trimmed = value.trim();
    let (mantissa, exponent) = match trimmed.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            let exponent = exponent.parse::<i64>().unwrap_or(if exponent.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            });
            (mantissa, exponent)
        }
        None => (trimmed, 0),
    };
    let written = mantissa
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.chars().filter(char::is_ascii_digit).count());
    let effective = (written as i128 - exponent as i128).max(0);
    usize::try_from(effective).unwrap_or(usize::MAX)
}

/// Loose numeric check used by profiling over untyped tables.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
