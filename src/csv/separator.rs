use crate::config::RowSep;
use std::io::{self, Read, Seek, SeekFrom};

/// The row separator used when none is given and none can be detected.
pub const DEFAULT_ROW_SEP: &str = "\n";

const SAMPLE_SIZE: u64 = 1024;

/// Resolves the configured row separator for a seekable source, sampling it
/// if auto-detection is requested.
pub fn resolve_row_sep<R: Read + Seek>(row_sep: &RowSep, source: &mut R) -> String {
    match row_sep {
        RowSep::Literal(sep) => sep.clone(),
        RowSep::Auto => detect_row_sep(source),
    }
}

/// Resolves the configured row separator for a source that cannot be
/// rewound; auto-detection falls back to [`DEFAULT_ROW_SEP`].
#[must_use]
pub fn resolve_row_sep_unseekable(row_sep: &RowSep) -> String {
    match row_sep {
        RowSep::Literal(sep) => sep.clone(),
        RowSep::Auto => {
            log::debug!("source cannot seek; using default row separator");
            DEFAULT_ROW_SEP.to_string()
        }
    }
}

/// Detects the row separator (`"\r\n"`, `"\n"`, or `"\r"`) from the first
/// line ending in `source`, then restores the read position.
///
/// Line endings inside quoted fields count too: the document is assumed to
/// use one line-ending style throughout. Falls back to
/// [`DEFAULT_ROW_SEP`] if the source has no line ending or cannot seek.
pub fn detect_row_sep<R: Read + Seek>(source: &mut R) -> String {
    let start = match source.stream_position() {
        Ok(pos) => pos,
        Err(e) => {
            log::warn!("cannot detect row separator: {}", e);
            return DEFAULT_ROW_SEP.to_string();
        }
    };
    let detected = match sample_line_ending(source) {
        Ok(found) => found,
        Err(e) => {
            log::warn!("cannot detect row separator: {}", e);
            None
        }
    };
    if let Err(e) = source.seek(SeekFrom::Start(start)) {
        log::warn!("cannot restore position after sampling: {}", e);
        return DEFAULT_ROW_SEP.to_string();
    }
    match detected {
        Some(sep) => {
            log::debug!("detected row separator {:?}", sep);
            sep.to_string()
        }
        None => {
            log::debug!("no line ending found; using default row separator");
            DEFAULT_ROW_SEP.to_string()
        }
    }
}

fn sample_line_ending<R: Read>(source: &mut R) -> io::Result<Option<&'static str>> {
    let mut chunk = Vec::with_capacity(SAMPLE_SIZE as usize + 1);
    loop {
        chunk.clear();
        if source.by_ref().take(SAMPLE_SIZE).read_to_end(&mut chunk)? == 0 {
            return Ok(None);
        }
        // A trailing CR may be the first half of CRLF.
        if chunk.last() == Some(&b'\r') {
            source.by_ref().take(1).read_to_end(&mut chunk)?;
        }
        if let Some(sep) = find_line_ending(&chunk) {
            return Ok(Some(sep));
        }
    }
}

fn find_line_ending(sample: &[u8]) -> Option<&'static str> {
    let pos = sample.iter().position(|&b| b == b'\r' || b == b'\n')?;
    if sample[pos] == b'\n' {
        Some("\n")
    } else if sample.get(pos + 1) == Some(&b'\n') {
        Some("\r\n")
    } else {
        Some("\r")
    }
}
