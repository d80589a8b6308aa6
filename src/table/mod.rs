use std::fmt;

use thiserror::Error;

pub mod column;
pub mod query;
pub mod sales_table;
pub mod summary;

use crate::calendar::CalendarError;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' is not {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error("Missing measure: {0}")]
    MissingMeasure(String),

    #[error("Mmap not loaded")]
    MmapNotLoaded,

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Load/derivation report: how many rows made it in, plus one
/// diagnostic per field or row that did not parse cleanly.
#[derive(Debug)]
pub struct ParseSummary {
    pub rows_loaded: usize,
    pub diagnostics: Vec<RowDiagnostic>,
}

/// A single per-row problem, surfaced instead of silently coerced.
#[derive(Debug, Clone)]
pub struct RowDiagnostic {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}, column '{}', value '{}': {}",
            self.row, self.column, self.value, self.reason
        )
    }
}

/// Measure specification for grouped and table-wide reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduce {
    /// Sum of the value column
    Sum,
    /// Partition cardinality
    Count,
    /// Sum divided by count
    Avg,
}

/// A single measure cell in a summary table.
///
/// `Missing` is the explicit sentinel for undefined ratios (zero
/// denominator). It renders as `n/a`; NaN and infinities never appear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureValue {
    Int(i64),
    Float(f64),
    Missing,
}

impl MeasureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasureValue::Int(v) => Some(*v as f64),
            MeasureValue::Float(v) => Some(*v),
            MeasureValue::Missing => None,
        }
    }

    /// Numeric view for rendering; `Missing` draws as zero.
    pub fn chart_value(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureValue::Int(v) => write!(f, "{}", v),
            MeasureValue::Float(v) => write!(f, "{:.2}", v),
            MeasureValue::Missing => write!(f, "n/a"),
        }
    }
}
