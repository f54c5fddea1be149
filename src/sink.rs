//! Result sinks for aggregated rows.
//!
//! The CSV layout is the contract with the plotting scripts: one header,
//! then one row per input size, durations in milliseconds.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::aggregate::AggregateRecord;
use crate::RotResult;

/// Column names, in order.
pub const CSV_HEADER: &[&str] = &[
    "size",
    "program_build_time",
    "memory_movement_time",
    "compute_time",
    "cpu_iterative_time",
    "cpu_vectorized_time",
];

/// Destination for aggregate records.
pub trait ResultSink {
    /// Persist one record. Called once per emitted size, ascending.
    fn record(&mut self, record: &AggregateRecord) -> RotResult<()>;

    /// Called once after the last record.
    fn finish(&mut self) -> RotResult<()> {
        Ok(())
    }
}

/// Writes records as CSV rows to any writer.
///
/// Every row is flushed as soon as it is written, so rows for completed
/// sizes are on disk even if a later size aborts the run.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: W,
    wrote_header: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        CsvSink {
            writer,
            wrote_header: false,
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> RotResult<()> {
        writeln!(self.writer, "{}", CSV_HEADER.join(","))?;
        self.wrote_header = true;
        Ok(())
    }
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) a CSV file at `path`.
    pub fn create(path: impl AsRef<Path>) -> RotResult<Self> {
        let file = File::create(path)?;
        Ok(CsvSink::new(BufWriter::new(file)))
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn record(&mut self, record: &AggregateRecord) -> RotResult<()> {
        if !self.wrote_header {
            self.write_header()?;
        }
        writeln!(
            self.writer,
            "{},{},{},{},{},{}",
            record.size,
            record.program_build_ms,
            record.memory_movement_ms,
            record.compute_ms,
            record.cpu_iterative_ms,
            record.cpu_vectorized_ms
        )?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the header even when no record was emitted.
    fn finish(&mut self) -> RotResult<()> {
        if !self.wrote_header {
            self.write_header()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub records: Vec<AggregateRecord>,
    pub finished: bool,
}

impl ResultSink for MemorySink {
    fn record(&mut self, record: &AggregateRecord) -> RotResult<()> {
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> RotResult<()> {
        self.finished = true;
        Ok(())
    }
}
