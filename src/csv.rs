//! An interface to CSV (comma-separated values).

pub(crate) mod reader;
pub(crate) mod separator;
pub(crate) mod tokenizer;
pub(crate) mod writer;

pub use reader::Reader;
pub use separator::{detect_row_sep, DEFAULT_ROW_SEP};
pub use tokenizer::QUOTE;
pub use writer::{encode_line, Writer};

use crate::config::Config;
use crate::datatypes::Field;
use crate::error::Error;
use crate::record::Row;
use std::io::Cursor;

/// One record read from a CSV source.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// The fields of a record read without headers.
    Fields(Vec<Option<Field>>),
    /// A record read with headers, or the header row itself.
    Row(Row),
}

impl Record {
    /// Returns the fields in order, without headers.
    #[must_use]
    pub fn fields(&self) -> Vec<Option<&Field>> {
        match self {
            Self::Fields(fields) => fields.iter().map(Option::as_ref).collect(),
            Self::Row(row) => row.fields(),
        }
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<Option<Field>> {
        match self {
            Self::Fields(fields) => fields,
            Self::Row(row) => row.into_iter().map(|(_, f)| f).collect(),
        }
    }

    #[must_use]
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Self::Row(row) => Some(row),
            Self::Fields(_) => None,
        }
    }

    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            Self::Row(row) => Some(row),
            Self::Fields(_) => None,
        }
    }
}

/// Parses the first record in `text`.
///
/// Returns `None` if `text` is empty.
///
/// # Errors
///
/// Returns an error if `config` is invalid or the record is malformed.
pub fn parse_line(text: &str, config: &Config) -> Result<Option<Record>, Error> {
    let mut reader = Reader::new(Cursor::new(text.as_bytes()), config)?;
    reader.read()
}

/// Renders `fields` as one CSV line, terminated by the configured row
/// separator (`"\n"` if it is to be detected).
///
/// # Errors
///
/// Returns an error if `config` is invalid.
pub fn generate_line(fields: &[Option<Field>], config: &Config) -> Result<String, Error> {
    let mut writer = Writer::new(Vec::<u8>::new(), config)?;
    writer.write_fields(fields)?;
    String::from_utf8(writer.into_inner()).map_err(|e| e.utf8_error().into())
}
