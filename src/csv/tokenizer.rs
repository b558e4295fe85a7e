use crate::error::{Error, Malformation};

pub const QUOTE: char = '"';

/// Outcome of splitting one candidate record.
#[derive(Debug, PartialEq)]
pub enum Split {
    Fields(Vec<Option<String>>),
    /// A quoted field is still open at the end of the text; the record
    /// continues on the next physical line.
    Incomplete,
}

/// Splits a record, with its row separator already removed, into raw fields.
///
/// Empty unquoted fields become `None`; a completely empty record has no
/// fields at all. `line` is only used for error reporting.
///
/// # Errors
///
/// Returns an error if an unquoted field contains CR or LF, or if quotes
/// appear where a field cannot contain them.
pub fn split_record(record: &str, col_sep: &str, line: usize) -> Result<Split, Error> {
    let mut fields = Vec::new();
    if record.is_empty() {
        return Ok(Split::Fields(fields));
    }

    let mut rest = record;
    while let Some(stripped) = rest.strip_prefix(col_sep) {
        fields.push(None);
        rest = stripped;
    }

    loop {
        let (field, after) = if let Some(quoted) = rest.strip_prefix(QUOTE) {
            match take_quoted(quoted) {
                Some(parts) => parts,
                None => return Ok(Split::Incomplete),
            }
        } else {
            take_unquoted(rest, col_sep, line)?
        };
        fields.push(field);

        if after.is_empty() {
            return Ok(Split::Fields(fields));
        }
        match after.strip_prefix(col_sep) {
            Some(next) => rest = next,
            None => return Err(Error::malformed(line, Malformation::IllegalQuote)),
        }
    }
}

/// Reads a quoted field whose opening quote has been consumed. Returns `None`
/// if the closing quote is missing.
fn take_quoted(text: &str) -> Option<(Option<String>, &str)> {
    let mut from = 0;
    loop {
        let close = from + text[from..].find(QUOTE)?;
        let after = &text[close + QUOTE.len_utf8()..];
        match after.strip_prefix(QUOTE) {
            Some(_) => from = close + 2 * QUOTE.len_utf8(),
            None => {
                let content = text[..close].replace("\"\"", "\"");
                return Some((Some(content), after));
            }
        }
    }
}

fn take_unquoted<'a>(
    text: &'a str,
    col_sep: &str,
    line: usize,
) -> Result<(Option<String>, &'a str), Error> {
    let end = text.find(col_sep).unwrap_or(text.len());
    let field = &text[..end];
    if field.contains(['\r', '\n']) {
        return Err(Error::malformed(line, Malformation::UnquotedNewline));
    }
    if field.contains(QUOTE) {
        return Err(Error::malformed(line, Malformation::IllegalQuote));
    }
    let field = if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    };
    Ok((field, &text[end..]))
}
