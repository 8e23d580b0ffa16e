//! cz-logging: NDJSON search events.
//!
//! Append-only logs, one JSON object per line, for post-mortems of search runs.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bumped whenever an event layout changes.
pub const EVENT_SCHEMA_VERSION: u32 = 1;
pub const ACTION_SPACE_ID: &str = "chess_8x8x73";

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

/// Schema versioning fields carried by every event.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfoV1 {
    pub event_schema: u32,
    pub action_space_id: &'static str,
    pub crate_version: &'static str,
}

impl VersionInfoV1 {
    pub fn current() -> Self {
        Self {
            event_schema: EVENT_SCHEMA_VERSION,
            action_space_id: ACTION_SPACE_ID,
            crate_version: VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PiSummaryV1 {
    pub entropy: f32,
    pub max_p: f32,
    pub argmax: u32,
}

impl PiSummaryV1 {
    /// Entropy (nats), peak probability and its first index.
    pub fn from_probs(pi: &[f32]) -> Self {
        let mut entropy = 0.0f32;
        let mut max_p = 0.0f32;
        let mut argmax = 0u32;
        for (i, &p) in pi.iter().enumerate() {
            if p > 0.0 {
                entropy -= p * p.ln();
            }
            if p > max_p {
                max_p = p;
                argmax = i as u32;
            }
        }
        Self {
            entropy,
            max_p,
            argmax,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeStatsV1 {
    pub action: String,
    pub visits: u32,
    pub q: f32,
    pub prior: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRootEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub v: VersionInfoV1,

    pub run_id: String,
    pub root_key: String,
    pub root_player: String,

    pub trials: u32,
    pub elapsed_ms: u64,
    pub stop_reason: &'static str,

    pub root_visits: u32,
    pub root_value: f32,

    pub node_count: u64,
    pub expansions: u32,
    pub rollouts: u32,
    pub fallbacks: u32,
    pub max_depth: u32,
    pub reused_root: bool,

    pub top: Vec<EdgeStatsV1>,
    pub pi: PiSummaryV1,
}

#[derive(Debug)]
pub enum NdjsonError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for NdjsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "ndjson io: {e}"),
            Self::Json(e) => write!(f, "ndjson encode: {e}"),
        }
    }
}

impl std::error::Error for NdjsonError {}

impl From<io::Error> for NdjsonError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NdjsonError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Append-only NDJSON writer.
///
/// Each call writes exactly one JSON object followed by a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open a file for append. Creates it if it doesn't exist.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines=0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, NdjsonError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), NdjsonError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}
