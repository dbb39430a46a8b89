// Record-transformation pipeline: read raw rows, resolve addresses, emit
// provenance-annotated JSON records.

pub mod emitter;
pub mod provenance;
pub mod reader;
pub mod resolver;
pub mod valid_at;

use std::io::{BufRead, Write};

use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::ResolverConfig;
use crate::constants::COL_POSTCODE;
use crate::error::Result;
use crate::types::{OutputRecord, RunMetadata};

use emitter::OutputEmitter;
use provenance::build_provenance;
use reader::RecordReader;
use resolver::{AddressResolver, ResolutionService};
use valid_at::select_valid_at;

/// Summary of a complete pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct PipelineResult {
    /// Rows that parsed, header excluded.
    pub total_rows: usize,
    /// Rows resolved, validated and emitted.
    pub resolved: usize,
    /// Rows dropped for lack of a postcode, without a service call.
    pub skipped_no_postcode: usize,
    /// Rows the service rejected or that exhausted their retries.
    pub unresolved: usize,
    /// Lines that failed CSV parsing and were skipped.
    pub malformed_rows: usize,
}

/// Drives one input stream end to end. Rows are processed strictly one at a
/// time; an individual row failing at any stage never aborts the run.
pub struct Pipeline<S> {
    resolver: AddressResolver<S>,
    run_metadata: RunMetadata,
}

impl<S: ResolutionService> Pipeline<S> {
    pub fn new(service: S, config: &ResolverConfig, run_metadata: RunMetadata) -> Self {
        Self {
            resolver: AddressResolver::new(service, config),
            run_metadata,
        }
    }

    /// Read rows from `input`, resolve each eligible address, and write one
    /// JSON line per validated result to `output`.
    #[instrument(skip_all)]
    pub async fn run<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<PipelineResult> {
        let mut reader = RecordReader::new(input);
        let mut emitter = OutputEmitter::new(output);
        let mut result = PipelineResult::default();

        while let Some(record) = reader.next() {
            result.total_rows += 1;
            if !has_postcode(&record) {
                // Not an error: the row just carries nothing resolvable.
                result.skipped_no_postcode += 1;
                continue;
            }
            match self.process_row(&record).await {
                Some(output_record) => {
                    emitter.emit(&output_record)?;
                    result.resolved += 1;
                }
                None => {
                    debug!("Row yielded no resolvable address");
                    result.unresolved += 1;
                }
            }
        }

        result.malformed_rows = reader.malformed_rows();
        info!(
            "Run complete: {} rows, {} resolved, {} without postcode, {} unresolved, {} malformed",
            result.total_rows,
            result.resolved,
            result.skipped_no_postcode,
            result.unresolved,
            result.malformed_rows
        );
        Ok(result)
    }

    async fn process_row(&self, record: &StringRecord) -> Option<OutputRecord> {
        let resolved = self.resolver.resolve(record).await?;
        let valid_at = select_valid_at(record);
        let provenance = build_provenance(&resolved, &self.run_metadata);
        Some(OutputRecord::new(resolved, valid_at, provenance))
    }
}

fn has_postcode(record: &StringRecord) -> bool {
    record
        .get(COL_POSTCODE)
        .map_or(false, |postcode| !postcode.trim().is_empty())
}
