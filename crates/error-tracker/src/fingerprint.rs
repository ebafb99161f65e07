//! Traceback-based fingerprinting (spec §4.3). Pure function, tested
//! standalone before being wired into ingest — the same treatment the
//! Browser Relay's VLQ decoder and the Metrics Collector's percentile
//! function get (spec §9 design note: "implement and test it standalone
//! before integrating").

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches Python-style `File "<path>", line <n>` frames, and the
/// "equivalent" `<path>:<line>` form used by other runtimes.
static PY_FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"File "([^"]+)", line (\d+)"#).unwrap());
static GENERIC_FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:at\s+)?([^\s():]+):(\d+)(?::\d+)?\s*$").unwrap());

fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// The deepest application frame found in a traceback, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub line: u64,
}

/// Scan `traceback` for frame lines and return the last (deepest) match.
/// Python frames are preferred; if none are present, the generic
/// `file:line` grammar is tried.
pub fn deepest_frame(traceback: &str) -> Option<Frame> {
    if let Some(last) = PY_FRAME_RE.captures_iter(traceback).last() {
        return Some(Frame {
            file: last[1].to_string(),
            line: last[2].parse().unwrap_or(0),
        });
    }
    if let Some(last) = GENERIC_FRAME_RE.captures_iter(traceback).last() {
        return Some(Frame {
            file: last[1].to_string(),
            line: last[2].parse().unwrap_or(0),
        });
    }
    None
}

/// Compute the 32-hex MD5 fingerprint for an ingested error, along with
/// the deepest frame used (if any), for diagnostics/logging.
pub fn compute(project: &str, exception_type: &str, traceback: &str, message: &str) -> String {
    let key = match deepest_frame(traceback) {
        Some(frame) => format!("{project}:{exception_type}:{}:{}", frame.file, frame.line),
        None => format!("{project}:{exception_type}:{}", md5_hex(message)),
    };
    md5_hex(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_deepest_python_frame() {
        let tb = "Traceback (most recent call last):\n  File \"/app/outer.py\", line 10, in outer\n    inner()\n  File \"/app/inner.py\", line 3, in inner\n    raise ValueError('x')";
        let frame = deepest_frame(tb).unwrap();
        assert_eq!(frame.file, "/app/inner.py");
        assert_eq!(frame.line, 3);
    }

    #[test]
    fn fingerprint_is_stable_for_same_location() {
        let tb = "File \"/a.py\", line 1, in f\n  raise ValueError('x')";
        let f1 = compute("p", "ValueError", tb, "x");
        let f2 = compute("p", "ValueError", tb, "different message");
        assert_eq!(f1, f2);
        assert_eq!(f1.len(), 32);
        assert!(f1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_line_yields_different_fingerprint() {
        let tb1 = "File \"/a.py\", line 1, in f";
        let tb2 = "File \"/a.py\", line 2, in f";
        assert_ne!(
            compute("p", "ValueError", tb1, "x"),
            compute("p", "ValueError", tb2, "x")
        );
    }

    #[test]
    fn falls_back_to_message_hash_when_no_frame() {
        let f1 = compute("p", "ValueError", "no frames here", "boom");
        let f2 = compute("p", "ValueError", "also no frames", "boom");
        let f3 = compute("p", "ValueError", "no frames here", "different");
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
    }

    #[test]
    fn generic_frame_grammar_matches_when_no_python_frame() {
        let tb = "at handler.ts:42\nthrown from there";
        let frame = deepest_frame(tb).unwrap();
        assert_eq!(frame.file, "handler.ts");
        assert_eq!(frame.line, 42);
    }
}
