use std::io::Write;

use crate::error::Result;
use crate::types::OutputRecord;

/// Writes one self-contained JSON record per line to the output sink.
pub struct OutputEmitter<W: Write> {
    sink: W,
}

impl<W: Write> OutputEmitter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn emit(&mut self, record: &OutputRecord) -> Result<()> {
        serde_json::to_writer(&mut self.sink, record)?;
        self.sink.write_all(b"\n")?;
        Ok(())
    }
}
