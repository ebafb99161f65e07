//! Multiline reassembly (spec §4.4). Per-container state holds one
//! buffered entry; lines that don't look like the start of a new entry
//! are appended as continuations. A buffer older than 2 seconds is
//! flushed on the next poll even without a new start-of-entry line, so a
//! stuck partial message never holds the ring indefinitely.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};

const STALE_FLUSH: Duration = Duration::from_secs(2);

static BRACKET_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\[(DEBUG|INFO|WARNING|WARN|ERROR)\]").unwrap());
static KV_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blevel=(DEBUG|INFO|WARNING|WARN|ERROR)\b").unwrap());
static PREFIX_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(DEBUG|INFO|WARNING|WARN|ERROR):").unwrap());
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?").unwrap()
});

/// Returns the normalized level (`DEBUG`/`INFO`/`WARNING`/`ERROR`) if `line`
/// looks like the start of a new log entry, else `None`.
fn detect_start(line: &str) -> Option<&'static str> {
    if let Some(caps) = BRACKET_LEVEL_RE.captures(line) {
        return Some(normalize_level(&caps[1]));
    }
    if let Some(caps) = KV_LEVEL_RE.captures(line) {
        return Some(normalize_level(&caps[1]));
    }
    if let Some(caps) = PREFIX_LEVEL_RE.captures(line) {
        return Some(normalize_level(&caps[1]));
    }
    if TIMESTAMP_RE.is_match(line) {
        return Some("INFO");
    }
    None
}

fn normalize_level(raw: &str) -> &'static str {
    match raw.to_ascii_uppercase().as_str() {
        "DEBUG" => "DEBUG",
        "INFO" => "INFO",
        "WARNING" | "WARN" => "WARNING",
        "ERROR" => "ERROR",
        _ => "INFO",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedEntry {
    pub message: String,
    pub level: String,
}

struct Buffered {
    lines: Vec<String>,
    detected_level: Option<&'static str>,
    since: Instant,
    stream_is_err: bool,
}

/// Per-container reassembly state. One instance per watched container.
pub struct Reassembler {
    buffered: Option<Buffered>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self { buffered: None }
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw log line (already stripped of its Docker JSON
    /// envelope). `stream` is `"stdout"` or `"stderr"`, used only to pick
    /// the default level when no start-of-entry pattern matched.
    /// Returns a finalized entry when a new start-of-entry line closes
    /// out the previous buffer.
    pub fn feed(&mut self, line: &str, stream: &str) -> Option<FinalizedEntry> {
        let stream_is_err = stream == "stderr";
        match detect_start(line) {
            Some(level) => {
                let finalized = self.finalize();
                self.buffered = Some(Buffered {
                    lines: vec![line.to_string()],
                    detected_level: Some(level),
                    since: Instant::now(),
                    stream_is_err,
                });
                finalized
            }
            None => {
                match &mut self.buffered {
                    Some(buf) => buf.lines.push(line.to_string()),
                    None => {
                        // No open buffer and no recognizable start: treat the
                        // line itself as its own entry, level derived from stream.
                        self.buffered = Some(Buffered {
                            lines: vec![line.to_string()],
                            detected_level: None,
                            since: Instant::now(),
                            stream_is_err,
                        });
                    }
                }
                None
            }
        }
    }

    /// Force-finalize the current buffer, if any, regardless of age. The
    /// default level for an unmatched buffer follows the stream it was
    /// opened from: `ERROR` for stderr, `INFO` otherwise.
    pub fn finalize(&mut self) -> Option<FinalizedEntry> {
        self.buffered.take().map(|buf| {
            let level = buf.detected_level.map(|l| l.to_string()).unwrap_or_else(|| {
                if buf.stream_is_err { "ERROR".to_string() } else { "INFO".to_string() }
            });
            FinalizedEntry {
                message: buf.lines.join("\n"),
                level,
            }
        })
    }

    /// Finalize the buffer if it has been open longer than the 2s stale
    /// threshold. The default level for an unmatched buffer follows the
    /// stream it was opened from, same as `finalize`.
    pub fn flush_stale(&mut self) -> Option<FinalizedEntry> {
        let is_stale = self
            .buffered
            .as_ref()
            .map(|b| b.since.elapsed() >= STALE_FLUSH)
            .unwrap_or(false);
        if !is_stale {
            return None;
        }
        self.buffered.take().map(|buf| {
            let level = buf.detected_level.map(|l| l.to_string()).unwrap_or_else(|| {
                if buf.stream_is_err { "ERROR".to_string() } else { "INFO".to_string() }
            });
            FinalizedEntry {
                message: buf.lines.join("\n"),
                level,
            }
        })
    }
}
