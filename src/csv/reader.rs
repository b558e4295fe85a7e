use super::separator::{resolve_row_sep, resolve_row_sep_unseekable};
use super::tokenizer::{split_record, Split};
use super::Record;
use crate::config::{Config, Headers};
use crate::datatypes::Field;
use crate::error::{Error, Malformation};
use crate::parse::{Pipeline, Registries};
use crate::record::Row;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek};
use std::path::Path;
use std::str;

/// CSV reader
///
/// Yields one [`Record`] per logical row. A record may span several physical
/// lines when a quoted field contains the row separator.
pub struct Reader<R: BufRead> {
    source: R,
    col_sep: String,
    row_sep: String,
    converters: Pipeline,
    header_converters: Pipeline,
    use_headers: bool,
    return_headers: bool,
    headers: Option<Vec<Option<Field>>>,
    pending_header_row: Option<Row>,
    line: usize,
}

impl Reader<BufReader<File>> {
    /// Opens the file at `path` and reads from it. The file is closed when
    /// the reader is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or if `config` is
    /// invalid.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), config)
    }
}

impl<R: BufRead + Seek> Reader<R> {
    /// Creates a reader with the built-in converter registries. An
    /// auto-detected row separator is sampled from `source`, whose position
    /// is restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or names an unknown converter.
    pub fn new(source: R, config: &Config) -> Result<Self, Error> {
        Self::with_registries(source, config, &Registries::default())
    }

    /// Creates a reader that resolves converter names against `registries`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or names a converter missing
    /// from `registries`.
    pub fn with_registries(
        mut source: R,
        config: &Config,
        registries: &Registries,
    ) -> Result<Self, Error> {
        config.validate()?;
        let row_sep = resolve_row_sep(&config.row_sep, &mut source);
        Self::build(source, row_sep, config, registries)
    }
}

impl<R: BufRead> Reader<R> {
    /// Creates a reader over a source that cannot be rewound. Auto-detection
    /// is not possible, so the row separator falls back to `"\n"` unless
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or names an unknown converter.
    pub fn from_stream(source: R, config: &Config) -> Result<Self, Error> {
        Self::from_stream_with_registries(source, config, &Registries::default())
    }

    /// # Errors
    ///
    /// Returns an error if `config` is invalid or names a converter missing
    /// from `registries`.
    pub fn from_stream_with_registries(
        source: R,
        config: &Config,
        registries: &Registries,
    ) -> Result<Self, Error> {
        config.validate()?;
        let row_sep = resolve_row_sep_unseekable(&config.row_sep);
        Self::build(source, row_sep, config, registries)
    }

    fn build(
        source: R,
        row_sep: String,
        config: &Config,
        registries: &Registries,
    ) -> Result<Self, Error> {
        let converters = Pipeline::resolve(&config.converters, &registries.fields)?;
        let header_converters = Pipeline::resolve(&config.header_converters, &registries.headers)?;
        let mut reader = Self {
            source,
            col_sep: config.col_sep.clone(),
            row_sep,
            converters,
            header_converters,
            use_headers: config.uses_headers(),
            return_headers: config.return_headers,
            headers: None,
            pending_header_row: None,
            line: 0,
        };
        if let Headers::Given(names) = &config.headers {
            let raw: Vec<Option<String>> = names.iter().cloned().map(Some).collect();
            let row = reader.capture_headers(raw)?;
            if reader.return_headers {
                reader.pending_header_row = Some(row);
            }
        }
        Ok(reader)
    }

    /// Reads the next record, or returns `None` at the end of the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or not UTF-8, if a custom
    /// converter fails, or if reading from the source fails.
    pub fn read(&mut self) -> Result<Option<Record>, Error> {
        if let Some(row) = self.pending_header_row.take() {
            return Ok(Some(Record::Row(row)));
        }
        loop {
            let raw = match self.read_raw()? {
                Some(raw) => raw,
                None => return Ok(None),
            };
            if !self.use_headers {
                let fields = self.converters.convert(raw, self.line)?;
                return Ok(Some(Record::Fields(fields)));
            }
            if raw.is_empty() {
                return Ok(Some(Record::Row(Row::default())));
            }
            let headers = match &self.headers {
                Some(headers) => headers.clone(),
                None => {
                    let row = self.capture_headers(raw)?;
                    if self.return_headers {
                        return Ok(Some(Record::Row(row)));
                    }
                    continue;
                }
            };
            let fields = self.converters.convert(raw, self.line)?;
            return Ok(Some(Record::Row(Row::new(headers, fields, false))));
        }
    }

    /// Reads every remaining record.
    ///
    /// # Errors
    ///
    /// Returns the first error [`read`](Self::read) returns.
    pub fn read_all(&mut self) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        while let Some(record) = self.read()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Returns the header names, once known.
    #[must_use]
    pub fn headers(&self) -> Option<&[Option<Field>]> {
        self.headers.as_deref()
    }

    /// Returns the number of records read so far, header row included.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line
    }

    #[must_use]
    pub fn row_sep(&self) -> &str {
        &self.row_sep
    }

    #[must_use]
    pub fn col_sep(&self) -> &str {
        &self.col_sep
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Stores the converted header names and returns the header row, whose
    /// fields keep the raw text.
    fn capture_headers(&mut self, raw: Vec<Option<String>>) -> Result<Row, Error> {
        let names = self.header_converters.convert(raw.clone(), self.line)?;
        log::trace!("captured {} headers on line {}", names.len(), self.line);
        let fields = raw.into_iter().map(|f| f.map(Field::Text)).collect();
        self.headers = Some(names.clone());
        Ok(Row::new(names, fields, true))
    }

    /// Reads one logical record and splits it into raw fields.
    fn read_raw(&mut self) -> Result<Option<Vec<Option<String>>>, Error> {
        let mut buf = Vec::new();
        if read_line(&mut self.source, self.row_sep.as_bytes(), &mut buf)? == 0 {
            return Ok(None);
        }
        loop {
            let text = str::from_utf8(&buf)?;
            let record = text.strip_suffix(self.row_sep.as_str()).unwrap_or(text);
            match split_record(record, &self.col_sep, self.line + 1)? {
                Split::Fields(fields) => {
                    self.line += 1;
                    log::trace!("read {} fields on line {}", fields.len(), self.line);
                    return Ok(Some(fields));
                }
                Split::Incomplete => {
                    if read_line(&mut self.source, self.row_sep.as_bytes(), &mut buf)? == 0 {
                        return Err(Error::malformed(self.line + 1, Malformation::UnclosedQuote));
                    }
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for Reader<R> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

/// Appends bytes up to and including the next `row_sep`, or up to the end of
/// `source`, to `buf`. Returns the number of bytes appended.
fn read_line<R: BufRead>(source: &mut R, row_sep: &[u8], buf: &mut Vec<u8>) -> io::Result<usize> {
    let start = buf.len();
    let last = match row_sep.last() {
        Some(&b) => b,
        None => return source.read_to_end(buf),
    };
    loop {
        if source.read_until(last, buf)? == 0 || buf[start..].ends_with(row_sep) {
            return Ok(buf.len() - start);
        }
        if buf.last() != Some(&last) {
            return Ok(buf.len() - start);
        }
    }
}
