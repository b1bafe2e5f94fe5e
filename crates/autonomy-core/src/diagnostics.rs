//! Diagnostics Sinks
//!
//! Observers for per-candidate and per-pass records. Sinks never influence
//! scoring; a disabled sink lets the engine skip building reason strings.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use autonomy_events::{CandidateRecord, PassRecord};

/// Receiver of diagnostics records.
pub trait DiagnosticsSink {
    /// Whether records should be produced at all.
    fn enabled(&self) -> bool {
        true
    }

    fn record_candidate(&mut self, record: CandidateRecord);

    fn record_pass(&mut self, record: PassRecord);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn enabled(&self) -> bool {
        false
    }

    fn record_candidate(&mut self, _record: CandidateRecord) {}

    fn record_pass(&mut self, _record: PassRecord) {}
}

/// Sink that keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub candidates: Vec<CandidateRecord>,
    pub passes: Vec<PassRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.passes.clear();
    }

    /// Records for one action identity.
    pub fn for_action<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a CandidateRecord> {
        self.candidates.iter().filter(move |r| r.action.as_str() == action)
    }
}

impl DiagnosticsSink for MemorySink {
    fn record_candidate(&mut self, record: CandidateRecord) {
        self.candidates.push(record);
    }

    fn record_pass(&mut self, record: PassRecord) {
        self.passes.push(record);
    }
}

/// Errors that can occur while writing diagnostics.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes records as JSON Lines into a directory.
///
/// `candidates.jsonl` gets one line per candidate, `passes.jsonl` one line per
/// finished pass. Write failures are counted and logged rather than surfaced
/// mid-pass; `flush` reports I/O errors.
pub struct JsonlSink {
    output_dir: PathBuf,
    candidate_writer: BufWriter<File>,
    pass_writer: BufWriter<File>,
    lines_written: u64,
    failed_writes: u64,
}

impl JsonlSink {
    /// Creates the directory if needed and opens both files for writing.
    pub fn new(output_dir: &Path) -> Result<Self, DiagnosticsError> {
        fs::create_dir_all(output_dir)?;

        let candidate_file = File::create(output_dir.join("candidates.jsonl"))?;
        let pass_file = File::create(output_dir.join("passes.jsonl"))?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            candidate_writer: BufWriter::new(candidate_file),
            pass_writer: BufWriter::new(pass_file),
            lines_written: 0,
            failed_writes: 0,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }

    /// Flushes both buffered writers to disk.
    pub fn flush(&mut self) -> Result<(), DiagnosticsError> {
        self.candidate_writer.flush()?;
        self.pass_writer.flush()?;
        Ok(())
    }

    fn write_line(
        writer: &mut BufWriter<File>,
        line: Result<String, serde_json::Error>,
    ) -> Result<(), DiagnosticsError> {
        writeln!(writer, "{}", line?)?;
        Ok(())
    }

    fn track(&mut self, result: Result<(), DiagnosticsError>) {
        match result {
            Ok(()) => self.lines_written += 1,
            Err(e) => {
                self.failed_writes += 1;
                tracing::warn!("Failed to write diagnostics record: {}", e);
            }
        }
    }
}

impl DiagnosticsSink for JsonlSink {
    fn record_candidate(&mut self, record: CandidateRecord) {
        let result = Self::write_line(&mut self.candidate_writer, record.to_jsonl());
        self.track(result);
    }

    fn record_pass(&mut self, record: PassRecord) {
        let result = Self::write_line(&mut self.pass_writer, record.to_jsonl());
        self.track(result);
    }
}
