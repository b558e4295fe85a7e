use std::io;
use thiserror::Error;

/// The error type returned by readers, writers, and configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed CSV on line {line}: {reason}")]
    Malformed { line: usize, reason: Malformation },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("conversion failed on line {line}, field {index}: {source}")]
    Convert {
        line: usize,
        index: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("encoding error: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: Malformation) -> Self {
        Self::Malformed { line, reason }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// The reason a record could not be tokenized.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Malformation {
    #[error("unquoted fields do not allow \\r or \\n")]
    UnquotedNewline,
    #[error("unclosed quoted field")]
    UnclosedQuote,
    #[error("illegal quoting")]
    IllegalQuote,
}
