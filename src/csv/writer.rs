use super::separator::DEFAULT_ROW_SEP;
use super::tokenizer::QUOTE;
use super::Record;
use crate::config::{Config, RowSep};
use crate::datatypes::Field;
use crate::error::Error;
use crate::record::Row;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// CSV writer
pub struct Writer<W: Write> {
    sink: W,
    col_sep: String,
    row_sep: String,
}

impl Writer<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and writes to it. The file is
    /// closed when the writer is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or `config` is invalid.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self, Error> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: Write> Writer<W> {
    /// Creates a writer over `sink`. Only the separators of `config` matter
    /// for writing; an auto-detected row separator becomes `"\n"`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(sink: W, config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let row_sep = match &config.row_sep {
            RowSep::Literal(sep) => sep.clone(),
            RowSep::Auto => DEFAULT_ROW_SEP.to_string(),
        };
        Ok(Self {
            sink,
            col_sep: config.col_sep.clone(),
            row_sep,
        })
    }

    /// Writes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn write_fields(&mut self, fields: &[Option<Field>]) -> Result<(), Error> {
        self.write_line(fields.iter().map(Option::as_ref))
    }

    /// Writes the fields of `row`; its headers are not written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn write_row(&mut self, row: &Row) -> Result<(), Error> {
        self.write_line(row.fields())
    }

    /// Writes a record as returned by a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn write_record(&mut self, record: &Record) -> Result<(), Error> {
        match record {
            Record::Fields(fields) => self.write_fields(fields),
            Record::Row(row) => self.write_row(row),
        }
    }

    /// # Errors
    ///
    /// Returns an error if flushing the sink fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.sink.flush().map_err(Into::into)
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_line<'a, I>(&mut self, fields: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Option<&'a Field>>,
    {
        let line = encode_line(fields, &self.col_sep, &self.row_sep);
        self.sink.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Renders fields as one terminated line.
pub fn encode_line<'a, I>(fields: I, col_sep: &str, row_sep: &str) -> String
where
    I: IntoIterator<Item = Option<&'a Field>>,
{
    let mut line = fields
        .into_iter()
        .map(|f| f.map_or_else(String::new, |f| encode_field(f, col_sep)))
        .join(col_sep);
    line.push_str(row_sep);
    line
}

fn encode_field(field: &Field, col_sep: &str) -> String {
    let text = field.to_string();
    let quotable = |c: char| c == QUOTE || c == '\r' || c == '\n' || col_sep.contains(c);
    if !text.is_empty() && !text.contains(quotable) {
        return text;
    }
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(QUOTE);
    for c in text.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(fields: &[Option<Field>], col_sep: &str) -> String {
        encode_line(fields.iter().map(Option::as_ref), col_sep, "\n")
    }

    fn text(v: &str) -> Option<Field> {
        Some(Field::from(v))
    }

    #[test]
    fn plain_and_absent() {
        assert_eq!(line(&[text("a"), None, text("b")], ","), "a,,b\n");
        assert_eq!(line(&[None, None], ","), ",\n");
        assert_eq!(line(&[], ","), "\n");
    }

    #[test]
    fn quoting_rules() {
        assert_eq!(line(&[text("a\"b")], ","), "\"a\"\"b\"\n");
        assert_eq!(line(&[text("")], ","), "\"\"\n");
        let fields = [text("a,b"), text("c\nd"), text("e\rf")];
        assert_eq!(line(&fields, ","), "\"a,b\",\"c\nd\",\"e\rf\"\n");
        assert_eq!(line(&[text("a,b")], ";"), "a,b\n");
        assert_eq!(line(&[text("x:y")], "::"), "\"x:y\"\n");
    }

    #[test]
    fn typed_fields() {
        let fields = [Some(Field::Int(42)), Some(Field::Float(1.0)), None];
        assert_eq!(line(&fields, ","), "42,1.0,\n");
    }

    #[test]
    fn writes_to_sink() {
        let config = Config {
            col_sep: "|".to_string(),
            row_sep: RowSep::from("\r\n"),
            ..Config::default()
        };
        let mut writer = Writer::new(Vec::<u8>::new(), &config).unwrap();
        writer.write_fields(&[text("a|b"), text("c")]).unwrap();
        let row = Row::new(vec![text("h1"), text("h2")], vec![text("1"), None], false);
        writer.write_row(&row).unwrap();
        writer
            .write_record(&Record::Fields(vec![Some(Field::Int(3))]))
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.into_inner(), b"\"a|b\"|c\r\n1|\r\n3\r\n".to_vec());
    }

    #[test]
    fn auto_row_sep_writes_newline() {
        let mut writer = Writer::new(Vec::<u8>::new(), &Config::default()).unwrap();
        writer.write_fields(&[text("x")]).unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"x\n");
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config {
            col_sep: String::new(),
            ..Config::default()
        };
        assert!(matches!(
            Writer::new(Vec::<u8>::new(), &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let mut writer = Writer::from_path(&path, &Config::default()).unwrap();
            writer.write_fields(&[text("a"), Some(Field::Int(1))]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,1\n");
    }
}
