//! Stack-frame parsing and rewriting (spec §4.6 step 1/2/5): Chrome/V8 and
//! Firefox/Safari grammars, with source-map-backed rewriting that
//! preserves each line's original indentation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::vlq::{self, MappingEntry};

// `    at name (https://host/path/file.js:10:5)` or `    at https://host/file.js:10:5`
static CHROME_NAMED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*at\s+)(.+?)\s+\((.+):(\d+):(\d+)\)\s*$").unwrap());
static CHROME_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*at\s+)(.+):(\d+):(\d+)\s*$").unwrap());
// `    name@https://host/file.js:10:5`
static FIREFOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([^\s@]*)@(.+):(\d+):(\d+)\s*$").unwrap());

#[derive(Debug, Clone)]
pub struct Frame {
    pub indent: String,
    pub name: Option<String>,
    pub file_url: String,
    pub line: i64,
    pub col: i64,
    pub grammar: Grammar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    ChromeNamed,
    ChromeBare,
    Firefox,
    Unrecognized,
}

/// Strips scheme and host, leaving a path usable as a `source_maps`
/// lookup key (spec §4.6 step 2).
pub fn normalize_file_url(file_url: &str) -> String {
    match file_url.find("://") {
        Some(idx) => {
            let rest = &file_url[idx + 3..];
            match rest.find('/') {
                Some(slash) => rest[slash..].to_string(),
                None => "/".to_string(),
            }
        }
        None => file_url.to_string(),
    }
}

pub fn parse_frame(line: &str) -> Option<Frame> {
    if let Some(caps) = CHROME_NAMED_RE.captures(line) {
        return Some(Frame {
            indent: caps[1].to_string(),
            name: Some(caps[2].trim().to_string()),
            file_url: caps[3].to_string(),
            line: caps[4].parse().ok()?,
            col: caps[5].parse().ok()?,
            grammar: Grammar::ChromeNamed,
        });
    }
    if let Some(caps) = CHROME_BARE_RE.captures(line) {
        return Some(Frame {
            indent: caps[1].to_string(),
            name: None,
            file_url: caps[2].to_string(),
            line: caps[3].parse().ok()?,
            col: caps[4].parse().ok()?,
            grammar: Grammar::ChromeBare,
        });
    }
    if let Some(caps) = FIREFOX_RE.captures(line) {
        let name = caps[2].trim();
        return Some(Frame {
            indent: caps[1].to_string(),
            name: if name.is_empty() { None } else { Some(name.to_string()) },
            file_url: caps[3].to_string(),
            line: caps[4].parse().ok()?,
            col: caps[5].parse().ok()?,
            grammar: Grammar::Firefox,
        });
    }
    None
}

fn render_frame(frame: &Frame, file_url: &str, line: i64, col: i64, name: Option<&str>) -> String {
    match frame.grammar {
        Grammar::ChromeNamed => {
            let display_name = name.unwrap_or(frame.name.as_deref().unwrap_or("<anonymous>"));
            format!("{}{} ({}:{}:{})", frame.indent, display_name, file_url, line, col)
        }
        Grammar::ChromeBare => {
            format!("{}{}:{}:{}", frame.indent, file_url, line, col)
        }
        Grammar::Firefox => {
            let display_name = name.unwrap_or(frame.name.as_deref().unwrap_or(""));
            format!("{}{}@{}:{}:{}", frame.indent, display_name, file_url, line, col)
        }
        Grammar::Unrecognized => frame.file_url.clone(),
    }
}

/// Looks up parsed `mappings` for one resolved source map.
pub struct ResolvedMap<'a> {
    pub entries: &'a [MappingEntry],
    pub sources: &'a [String],
    pub names: &'a [String],
}

/// Rewrites every recognizable frame in `stack` using `lookup` to find a
/// `(project, release, file_url)` source map's decoded mappings, keeping
/// each line's leading indentation intact (spec §4.6 step 5).
pub fn rewrite<'a, F>(stack: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<ResolvedMap<'a>>,
{
    stack
        .lines()
        .map(|line| {
            let Some(frame) = parse_frame(line) else {
                return line.to_string();
            };
            let normalized = normalize_file_url(&frame.file_url);
            let Some(map) = resolve(&normalized) else {
                return line.to_string();
            };
            // spec frames are 1-indexed; mapping entries are 0-indexed.
            let target_line = (frame.line - 1).max(0) as usize;
            let target_col = (frame.col - 1).max(0) as usize;
            let Some(entry) = vlq::lookup(map.entries, target_line, target_col) else {
                return line.to_string();
            };
            let source = map
                .sources
                .get(entry.source_index.max(0) as usize)
                .cloned()
                .unwrap_or_else(|| normalized.clone());
            let name = entry
                .name_index
                .and_then(|idx| map.names.get(idx.max(0) as usize))
                .map(|s| s.as_str());
            render_frame(&frame, &source, entry.orig_line + 1, entry.orig_col + 1, name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chrome_named_frame() {
        let frame = parse_frame("    at foo (https://cdn.example.com/app.js:10:5)").unwrap();
        assert_eq!(frame.grammar, Grammar::ChromeNamed);
        assert_eq!(frame.name.as_deref(), Some("foo"));
        assert_eq!(frame.file_url, "https://cdn.example.com/app.js");
        assert_eq!(frame.line, 10);
        assert_eq!(frame.col, 5);
    }

    #[test]
    fn parses_chrome_bare_frame() {
        let frame = parse_frame("    at https://cdn.example.com/app.js:20:3").unwrap();
        assert_eq!(frame.grammar, Grammar::ChromeBare);
        assert_eq!(frame.line, 20);
    }

    #[test]
    fn parses_firefox_frame() {
        let frame = parse_frame("onClick@https://cdn.example.com/app.js:7:2").unwrap();
        assert_eq!(frame.grammar, Grammar::Firefox);
        assert_eq!(frame.name.as_deref(), Some("onClick"));
        assert_eq!(frame.line, 7);
    }

    #[test]
    fn normalizes_scheme_and_host_away() {
        assert_eq!(
            normalize_file_url("https://cdn.example.com/static/app.js"),
            "/static/app.js"
        );
        assert_eq!(normalize_file_url("/already/a/path.js"), "/already/a/path.js");
    }

    #[test]
    fn rewrite_preserves_indentation_and_unrecognized_lines() {
        let stack = "TypeError: boom\n    at foo (https://cdn.example.com/app.js:1:1)";
        let entries = vlq::decode_mappings("AAAAA");
        let sources = vec!["app.ts".to_string()];
        let names = vec!["fn".to_string()];
        let rewritten = rewrite(stack, |_file| {
            Some(ResolvedMap { entries: &entries, sources: &sources, names: &names })
        });
        assert_eq!(
            rewritten,
            "TypeError: boom\n    at fn (app.ts:1:1)"
        );
    }
}
