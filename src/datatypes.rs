use chrono::{NaiveDate, NaiveDateTime};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value in a record.
///
/// Freshly tokenized fields are always `Text`; converters may turn them into
/// any of the other variants. An absent value is represented by wrapping the
/// field in an `Option`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Field {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Field {
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns the text of a `Text` field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(x) => f.write_str(x),
            Self::Int(x) => write!(f, "{}", x),
            // `{:?}` keeps the fractional part, so `1.0` does not read back as
            // an integer.
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Date(x) => write!(f, "{}", x.format("%Y-%m-%d")),
            Self::DateTime(x) => write!(f, "{}", x.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<NaiveDate> for Field {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Field {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl PartialEq<str> for Field {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Field {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<i64> for Field {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

/// Numeric coercion for `Int` and `Float` fields. Other variants do not
/// represent numbers and yield `None`.
impl ToPrimitive for Field {
    fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => v.to_i64(),
            _ => None,
        }
    }

    fn to_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => v.to_u64(),
            Self::Float(v) => v.to_u64(),
            _ => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => v.to_f64(),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Where a field sits in the input, handed to converters created with
/// [`Converter::with_info`](crate::parse::Converter::with_info).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldInfo {
    index: usize,
    line: usize,
}

impl FieldInfo {
    #[must_use]
    pub fn new(index: usize, line: usize) -> Self {
        Self { index, line }
    }

    /// Zero-based position of the field within its record.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based number of the record the field belongs to.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}
