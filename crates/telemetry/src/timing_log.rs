// timing_log.rs - Append-only per-frame CSV log

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

pub const TIMING_HEADER: &str = "Timestamp(ms),Preprocess(ms),Infer(ms),Postprocess(ms),Total(ms)";

/// Stage durations for one processed frame, all in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTimings {
    pub timestamp_ms: u64,
    pub preprocess_ms: f64,
    pub infer_ms: f64,
    pub postprocess_ms: f64,
    pub total_ms: f64,
}

/// Append-only CSV writer for per-frame stage timings.
///
/// Owned by the processing loop and passed by reference into the per-frame
/// handler; the header line is written exactly once per logger, on the first
/// row, no matter how many frames follow.
pub struct TimingLogger {
    writer: BufWriter<std::fs::File>,
    header_written: bool,
}

impl TimingLogger {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open timing log '{}'", path))?;
        Ok(Self {
            writer: BufWriter::new(file),
            header_written: false,
        })
    }

    pub fn log_frame(&mut self, t: &FrameTimings) -> std::io::Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{}", TIMING_HEADER)?;
            self.header_written = true;
        }
        writeln!(
            self.writer,
            "{},{:.2},{:.2},{:.2},{:.2}",
            t.timestamp_ms, t.preprocess_ms, t.infer_ms, t.postprocess_ms, t.total_ms
        )?;
        self.writer.flush()
    }
}
