//! Violation codes and their rendering.
//!
//! A [`Violation`] is one rule failure on one field (or on the whole row). A
//! record's violations are accumulated in evaluation order and rendered as a
//! semicolon-joined reason string such as
//! `ID_FORMAT(transaction_id); AMOUNT_NOT_POSITIVE(amount)`.

use std::fmt;

use itertools::Itertools;
use serde::{Serialize, Serializer};

/// Which family of rule produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Id,
    Amount,
    Timestamp,
    Code,
    Text,
    Row,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Id => "ID",
            Category::Amount => "AMOUNT",
            Category::Timestamp => "TIMESTAMP",
            Category::Code => "CODE",
            Category::Text => "TEXT",
            Category::Row => "ROW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reason {
    Empty,
    Format,
    Duplicate,
    NotNumeric,
    NotPositive,
    OutOfRange,
    Precision,
    ComponentRange,
    BeforeEpoch,
    FutureCutoff,
    NotAllowed,
    Malformed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Empty => "EMPTY",
            Reason::Format => "FORMAT",
            Reason::Duplicate => "DUPLICATE",
            Reason::NotNumeric => "NOT_NUMERIC",
            Reason::NotPositive => "NOT_POSITIVE",
            Reason::OutOfRange => "OUT_OF_RANGE",
            Reason::Precision => "PRECISION",
            Reason::ComponentRange => "COMPONENT_RANGE",
            Reason::BeforeEpoch => "BEFORE_EPOCH",
            Reason::FutureCutoff => "FUTURE_CUTOFF",
            Reason::NotAllowed => "NOT_ALLOWED",
            Reason::Malformed => "MALFORMED",
        }
    }
}

/// Category × reason. Immutable; carries no record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViolationCode {
    pub category: Category,
    pub reason: Reason,
}

impl ViolationCode {
    pub const ROW_MALFORMED: ViolationCode = ViolationCode::new(Category::Row, Reason::Malformed);

    pub const fn new(category: Category, reason: Reason) -> Self {
        Self { category, reason }
    }

    pub fn description(&self) -> &'static str {
        match (self.category, self.reason) {
            (Category::Id, Reason::Empty) => "Identifier null or empty",
            (Category::Id, Reason::Format) => "Invalid identifier format",
            (Category::Id, Reason::Duplicate) => "Duplicate identifier",
            (Category::Amount, Reason::Empty) => "Amount null or empty",
            (Category::Amount, Reason::NotNumeric) => "Invalid amount format",
            (Category::Amount, Reason::NotPositive) => "Amount is zero or negative",
            (Category::Amount, Reason::OutOfRange) => "Amount out of range",
            (Category::Amount, Reason::Precision) => "Excessive decimal precision",
            (Category::Timestamp, Reason::Empty) => "Timestamp null or empty",
            (Category::Timestamp, Reason::Format) => "Invalid timestamp format",
            (Category::Timestamp, Reason::ComponentRange) => "Invalid date/time components",
            (Category::Timestamp, Reason::BeforeEpoch) => "Timestamp before earliest allowed",
            (Category::Timestamp, Reason::FutureCutoff) => "Timestamp after latest allowed",
            (Category::Code, Reason::Empty) => "Code null or empty",
            (Category::Code, Reason::Format) => "Invalid code format",
            (Category::Code, Reason::NotAllowed) => "Code not recognized",
            (Category::Row, Reason::Malformed) => "Row field count does not match header",
            (_, Reason::Empty) => "Value null or empty",
            (_, Reason::Duplicate) => "Duplicate value",
            _ => "Rule violation",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category.as_str(), self.reason.as_str())
    }
}

impl Serialize for ViolationCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One rule failure, tied to the field it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    pub code: ViolationCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Violation {
    pub fn field(category: Category, reason: Reason, field: &str) -> Self {
        Self {
            code: ViolationCode::new(category, reason),
            field: Some(field.to_string()),
        }
    }

    pub fn row(code: ViolationCode) -> Self {
        Self { code, field: None }
    }

    pub fn message(&self) -> String {
        match &self.field {
            Some(field) => format!("{} ({field})", self.code.description()),
            None => self.code.description().to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}({field})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

pub fn render_reasons(violations: &[Violation]) -> String {
    violations.iter().join("; ")
}
