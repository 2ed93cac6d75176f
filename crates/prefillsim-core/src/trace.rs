//! Trace ingestion for prefillsim.
//!
//! Traces are JSONL: one request object per line with `timestamp` (ms),
//! `input_length` / `output_length` (tokens), and a non-empty `hash_ids`
//! array of block IDs. Lines that fail to parse are skipped silently; an
//! unreadable file is fatal.

use prefillsim_routing::Request;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace file: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw JSONL trace record, mirroring the on-disk field names.
#[derive(Debug, Clone, Deserialize)]
struct TraceRecord {
    timestamp: u64,
    input_length: u32,
    output_length: u32,
    hash_ids: Vec<u64>,
}

/// Load a JSONL trace file.
pub fn load_trace(path: &Path) -> Result<Vec<Request>, TraceError> {
    let file = std::fs::File::open(path)?;
    parse_trace(BufReader::new(file))
}

/// Parse JSONL trace data from any reader.
///
/// Blank lines and `#` comments are tolerated; malformed lines (bad JSON,
/// missing fields, or an empty `hash_ids` array) are skipped and counted.
pub fn parse_trace<R: Read>(reader: BufReader<R>) -> Result<Vec<Request>, TraceError> {
    let mut requests = Vec::new();
    let mut skipped = 0usize;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<TraceRecord>(trimmed) {
            Ok(record) if !record.hash_ids.is_empty() => {
                requests.push(Request {
                    timestamp: record.timestamp,
                    input_length: record.input_length,
                    output_length: record.output_length,
                    hash_ids: record.hash_ids,
                });
            }
            Ok(_) => {
                debug!(line = line_num + 1, "skipping trace line with empty hash_ids");
                skipped += 1;
            }
            Err(err) => {
                debug!(line = line_num + 1, %err, "skipping malformed trace line");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "trace contained unparseable lines");
    }
    Ok(requests)
}

/// Write requests back out as compact JSONL.
pub fn write_trace(requests: &[Request], path: &Path) -> Result<(), TraceError> {
    use std::io::Write;
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    for req in requests {
        let record = serde_json::json!({
            "timestamp": req.timestamp,
            "input_length": req.input_length,
            "output_length": req.output_length,
            "hash_ids": req.hash_ids,
        });
        serde_json::to_writer(&mut writer, &record).map_err(std::io::Error::from)?;
        writeln!(writer)?;
    }
    Ok(())
}
