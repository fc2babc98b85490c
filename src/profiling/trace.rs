use std::backtrace::Backtrace;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static FRAME_SYMBOL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(.+)$").ok());
static FRAME_LOCATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*at\s+(.+):(\d+):(\d+)$").ok());

/// Symbol prefix of the routine whose callers are traced.
const TRACED_ROUTINE: &str = "sql_resilient::connection::";

/// One frame of the caller stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub symbol: Option<String>,
    pub file: Option<String>,
    pub line: u32,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            symbol: None,
            file: Some(file.into()),
            line,
        }
    }

    /// Frame with no source location (FFI, stripped binaries, runtime glue).
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            symbol: None,
            file: None,
            line: 0,
        }
    }
}

/// Entry of a [`TraceRecord`]: a cleaned source path and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub file: String,
    pub line: u32,
}

/// Filtered call stack attached to a benchmark, innermost caller first.
pub type TraceRecord = Vec<TraceEntry>;

/// Supplier of the current call stack.
///
/// The first frame is the routine asking for the trace; callers follow,
/// innermost first.
pub trait StackSource: Send + Sync {
    fn frames(&self) -> Vec<Frame>;
}

/// Stack source backed by `std::backtrace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceStack;

impl StackSource for BacktraceStack {
    fn frames(&self) -> Vec<Frame> {
        let frames = parse_backtrace(&Backtrace::force_capture().to_string());
        // everything up to the outermost connection frame is capture machinery
        let start = frames
            .iter()
            .rposition(|frame| {
                frame
                    .symbol
                    .as_deref()
                    .is_some_and(|symbol| symbol.contains(TRACED_ROUTINE))
            })
            .unwrap_or(0);
        frames.into_iter().skip(start).collect()
    }
}

/// Stack source returning a fixed list of frames.
#[derive(Debug, Clone, Default)]
pub struct FixedStack(pub Vec<Frame>);

impl StackSource for FixedStack {
    fn frames(&self) -> Vec<Frame> {
        self.0.clone()
    }
}

/// Parse the `Display` output of a captured backtrace.
///
/// Only the first `at` line of each frame is kept; inlined callees listed
/// under the same frame number are dropped. Yields no frames if the frame
/// patterns failed to build.
#[must_use]
pub fn parse_backtrace(text: &str) -> Vec<Frame> {
    let (Some(symbol_re), Some(location_re)) = (FRAME_SYMBOL.as_ref(), FRAME_LOCATION.as_ref())
    else {
        return Vec::new();
    };
    let mut frames: Vec<Frame> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = location_re.captures(line) {
            if let Some(frame) = frames.last_mut().filter(|f| f.file.is_none()) {
                frame.file = Some(caps[1].to_string());
                frame.line = caps[2].parse().unwrap_or(0);
            }
        } else if let Some(caps) = symbol_re.captures(line) {
            frames.push(Frame {
                symbol: Some(caps[1].trim().to_string()),
                file: None,
                line: 0,
            });
        }
    }
    frames
}

/// Build the trace for one attempt.
///
/// Skips the first frame (the routine itself) and frames without a file. A
/// frame is kept when no filters are configured or its path contains one of
/// them; kept paths are cleaned with `aliases`.
#[must_use]
pub fn capture_trace(
    frames: Vec<Frame>,
    filters: &[String],
    aliases: &[(String, String)],
) -> TraceRecord {
    frames
        .into_iter()
        .skip(1)
        .filter_map(|frame| frame.file.map(|file| (file, frame.line)))
        .filter(|(file, _)| filters.is_empty() || filters.iter().any(|f| file.contains(f.as_str())))
        .map(|(file, line)| TraceEntry {
            file: clean_path(&file, aliases),
            line,
        })
        .collect()
}

/// Canonical form of a source path.
///
/// Separators become `/`, `.` segments are dropped and `..` pops its parent.
/// The longest matching alias prefix is then replaced by its alias.
#[must_use]
pub fn clean_path(path: &str, aliases: &[(String, String)]) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let mut cleaned = parts.join("/");
    if absolute {
        cleaned.insert(0, '/');
    }

    let alias = aliases
        .iter()
        .filter(|(prefix, _)| !prefix.is_empty() && cleaned.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len());
    match alias {
        Some((prefix, alias)) => format!("{alias}{}", &cleaned[prefix.len()..]),
        None => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Vec<Frame> {
        vec![
            Frame::new("/app/src/db/connection.rs", 10),
            Frame::new("/app/src/x.php", 20),
            Frame::unknown(),
            Frame::new("/lib/vendor/y.php", 30),
        ]
    }

    #[test]
    fn filters_keep_matching_frames_only() {
        let trace = capture_trace(stack(), &["/app/src".to_string()], &[]);
        assert_eq!(
            trace,
            vec![TraceEntry {
                file: "/app/src/x.php".into(),
                line: 20
            }]
        );
    }

    #[test]
    fn no_filters_keeps_every_known_file() {
        let trace = capture_trace(stack(), &[], &[]);
        let files: Vec<_> = trace.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["/app/src/x.php", "/lib/vendor/y.php"]);
    }

    #[test]
    fn non_matching_frame_after_match_is_dropped() {
        let frames = vec![
            Frame::new("/app/src/self.rs", 1),
            Frame::new("/app/src/a.rs", 2),
            Frame::new("/other/b.rs", 3),
        ];
        let trace = capture_trace(frames, &["/app/src".to_string()], &[]);
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn clean_path_normalizes_segments() {
        assert_eq!(clean_path("/srv/app/./src/../lib/x.rs", &[]), "/srv/app/lib/x.rs");
        assert_eq!(clean_path("C:\\app\\src\\x.rs", &[]), "C:/app/src/x.rs");
        assert_eq!(clean_path("../a/./b", &[]), "../a/b");
        assert_eq!(clean_path("/../a", &[]), "/a");
    }

    #[test]
    fn clean_path_prefers_longest_alias() {
        let aliases = vec![
            ("/srv/".to_string(), "ROOT/".to_string()),
            ("/srv/app/".to_string(), "APPPATH/".to_string()),
        ];
        assert_eq!(clean_path("/srv/app/src/x.rs", &aliases), "APPPATH/src/x.rs");
        assert_eq!(clean_path("/srv/core/y.rs", &aliases), "ROOT/core/y.rs");
    }

    #[test]
    fn parses_std_backtrace_output() {
        let text = concat!(
            "   0: std::backtrace::Backtrace::force_capture\n",
            "             at /rustc/abc/library/std/src/backtrace.rs:312:13\n",
            "   1: sql_resilient::connection::Connection<T>::execute\n",
            "             at ./src/connection.rs:120:9\n",
            "             at ./src/connection.rs:80:5\n",
            "   2: main\n",
        );
        let frames = parse_backtrace(text);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].file.as_deref(), Some("./src/connection.rs"));
        assert_eq!(frames[1].line, 120);
        assert!(frames[2].file.is_none());
    }
}
