use csv::{ReaderBuilder, StringRecord};
use std::io::BufRead;
use tracing::warn;

use crate::error::Result;

/// Iterates raw snapshot rows out of a line-oriented text source.
///
/// The first line is always a header and is never yielded. Each subsequent
/// line is parsed as a single CSV record; lines that fail to parse are logged
/// with their line number and skipped, so a bad row never aborts the run.
pub struct RecordReader<R: BufRead> {
    source: R,
    line_number: usize,
    malformed_rows: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            line_number: 0,
            malformed_rows: 0,
        }
    }

    /// Number of lines that failed to parse so far.
    pub fn malformed_rows(&self) -> usize {
        self.malformed_rows
    }

    /// Parse one line as a single CSV record.
    ///
    /// The csv crate recovers from irregular quoting instead of erroring:
    /// an unbalanced quote consumes the rest of the line into one oversized
    /// field rather than failing the parse. Such rows survive here and fall
    /// out downstream, either at the postcode check or at resolution. The
    /// malformed-row path below is reserved for lines the parser rejects
    /// outright, such as invalid UTF-8.
    fn parse_record(line: &[u8]) -> Result<Option<StringRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line);
        let mut record = StringRecord::new();
        if reader.read_record(&mut record)? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = StringRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        loop {
            line.clear();
            match self.source.read_until(b'\n', &mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Input stream failed at line {}: {}", self.line_number + 1, e);
                    return None;
                }
            }
            self.line_number += 1;
            if self.line_number == 1 {
                // Header line
                continue;
            }
            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            match Self::parse_record(&line) {
                Ok(Some(record)) => return Some(record),
                Ok(None) => continue,
                Err(e) => {
                    self.malformed_rows += 1;
                    warn!(
                        "Bad line found at line {} - {}: {}",
                        self.line_number,
                        String::from_utf8_lossy(&line),
                        e
                    );
                }
            }
        }
    }
}
