//! Session options shared by readers and writers.

use crate::csv::tokenizer::QUOTE;
use crate::error::Error;
use crate::parse::ConverterSpec;
use serde::{Deserialize, Deserializer};

/// How records are terminated.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(from = "Option<String>")]
pub enum RowSep {
    /// Detect the separator from the source when the session opens.
    #[default]
    Auto,
    Literal(String),
}

impl From<Option<String>> for RowSep {
    fn from(v: Option<String>) -> Self {
        v.map_or(Self::Auto, Self::Literal)
    }
}

impl From<&str> for RowSep {
    fn from(v: &str) -> Self {
        Self::Literal(v.to_string())
    }
}

/// Whether records are addressed by header name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(from = "HeadersRepr")]
pub enum Headers {
    /// Records are plain field sequences.
    #[default]
    Off,
    /// The first record names the fields of the rest.
    FirstRow,
    /// The names are given up front; every record is data.
    Given(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeadersRepr {
    Flag(bool),
    Names(Vec<String>),
}

impl From<HeadersRepr> for Headers {
    fn from(v: HeadersRepr) -> Self {
        match v {
            HeadersRepr::Flag(false) => Self::Off,
            HeadersRepr::Flag(true) => Self::FirstRow,
            HeadersRepr::Names(names) => Self::Given(names),
        }
    }
}

/// Options for a reading or writing session.
///
/// In JSON, `row_sep` is a string or `null` (auto-detect), `headers` is a
/// boolean or a list of names, and each converter option is a converter name
/// or a list of them. Unknown keys are rejected.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub col_sep: String,
    pub row_sep: RowSep,
    #[serde(deserialize_with = "one_or_many")]
    pub converters: Vec<ConverterSpec>,
    pub headers: Headers,
    pub return_headers: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub header_converters: Vec<ConverterSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            col_sep: ",".to_string(),
            row_sep: RowSep::Auto,
            converters: Vec::new(),
            headers: Headers::Off,
            return_headers: false,
            header_converters: Vec::new(),
        }
    }
}

impl Config {
    /// Parses options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of known options, or
    /// if an option value is invalid.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that the type alone cannot rule out.
    ///
    /// # Errors
    ///
    /// Returns an error if the column separator is empty or contains the
    /// quote character, CR, or LF, or if a literal row separator is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if self.col_sep.is_empty() {
            return Err(Error::config("`col_sep` must not be empty"));
        }
        if self.col_sep.contains([QUOTE, '\r', '\n']) {
            return Err(Error::config(
                "`col_sep` must not contain quotes or line breaks",
            ));
        }
        if let RowSep::Literal(sep) = &self.row_sep {
            if sep.is_empty() {
                return Err(Error::config("`row_sep` must not be empty"));
            }
        }
        Ok(())
    }

    pub(crate) fn uses_headers(&self) -> bool {
        self.headers != Headers::Off
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ConverterSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ConverterSpec),
        Many(Vec<ConverterSpec>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(spec)) => vec![spec],
        Some(OneOrMany::Many(specs)) => specs,
    })
}
