//! Code-aware text chunker with a line-based fallback.
//!
//! Splits file content into line-bounded chunks suitable for embedding.
//! Two strategies are tried in order:
//!
//! 1. **Code-aware** — scans for block-start lines (function, class, struct,
//!    interface declarations across common languages) and cuts chunks at
//!    block boundaries, so each chunk tends to be one function or class.
//! 2. **Line fallback** — when no block start is found anywhere (prose,
//!    minified or unfamiliar input), accumulates whole lines up to the size
//!    budget with a trailing overlap carried into the next chunk.
//!
//! Every chunk records its 1-based inclusive line range in the parent
//! document. Chunks whose content is only whitespace are never produced.

use regex::Regex;
use std::sync::OnceLock;

/// Target chunk size in characters, including newlines.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Approximate overlap carried between fallback chunks, in characters.
pub const DEFAULT_OVERLAP: usize = 100;

/// A chunk of text with line provenance, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Chunk text, newlines preserved.
    pub content: String,
    /// First line (1-based, inclusive).
    pub line_start: usize,
    /// Last line (1-based, inclusive).
    pub line_end: usize,
}

/// Block-start detectors, one regex family per language group.
///
/// Applied to the trimmed line; the first match wins. The families cover
/// JS/TS (functions, arrow consts, classes, interfaces, type aliases),
/// Python, Go, Rust, C-family declarations, and Ruby.
fn block_start_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^(export\s+)?(async\s+)?(function\s+\w+|const\s+\w+\s*=\s*(async\s+)?(\([^)]*\)|[^=])\s*=>|class\s+\w+|interface\s+\w+|type\s+\w+\s*=)",
            r"^(async\s+)?def\s+\w+|^class\s+\w+",
            r"^func\s+(\([^)]+\)\s+)?\w+",
            r"^(pub\s+)?(async\s+)?fn\s+\w+|^impl\s+",
            r"^(public|private|protected)?\s*(static\s+)?(async\s+)?(class|interface|void|int|string|bool|\w+)\s+\w+\s*[({]",
            r"^(def\s+\w+|class\s+\w+|module\s+\w+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("block-start pattern"))
        .collect()
    })
}

fn is_block_start(trimmed: &str) -> bool {
    block_start_patterns().iter().any(|re| re.is_match(trimmed))
}

fn is_line_comment(trimmed: &str) -> bool {
    trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("--")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Split `content` into chunks with [`DEFAULT_CHUNK_SIZE`] /
/// [`DEFAULT_OVERLAP`].
pub fn chunk(content: &str) -> Vec<ChunkSpan> {
    chunk_with(content, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
}

/// Split `content` into chunks with explicit size and overlap budgets.
pub fn chunk_with(content: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let chunks = chunk_code_aware(content, chunk_size);
    if !chunks.is_empty() {
        return chunks;
    }

    chunk_by_lines(content, chunk_size, overlap)
}

/// Lines buffered toward the next chunk, with their starting line number.
struct Accumulator {
    lines: Vec<String>,
    start_line: usize,
    char_len: usize,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            start_line: 0,
            char_len: 0,
        }
    }

    fn push(&mut self, line_no: usize, line: &str) {
        if self.lines.is_empty() {
            self.start_line = line_no;
        }
        self.char_len += line.len() + 1; // newline
        self.lines.push(line.to_string());
    }

    /// Emit the buffered lines as a chunk, unless they are all whitespace.
    fn flush(&mut self, out: &mut Vec<ChunkSpan>) {
        if !self.lines.is_empty() {
            let content = self.lines.join("\n");
            if !content.trim().is_empty() {
                out.push(ChunkSpan {
                    line_end: self.start_line + self.lines.len() - 1,
                    line_start: self.start_line,
                    content,
                });
            }
        }
        self.lines.clear();
        self.char_len = 0;
    }
}

/// Strategy 1: cut at block boundaries.
///
/// Returns an empty vector when no block start is found anywhere, signaling
/// the caller to fall back to line-based chunking.
fn chunk_code_aware(content: &str, chunk_size: usize) -> Vec<ChunkSpan> {
    let mut out = Vec::new();
    let mut acc = Accumulator::new();
    let mut in_block = false;
    let mut block_indent = 0usize;
    let mut saw_block = false;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if is_block_start(trimmed) {
            acc.flush(&mut out);
            acc.push(line_no, line);
            in_block = true;
            saw_block = true;
            block_indent = indent_width(line);
        } else if in_block && !trimmed.is_empty() && indent_width(line) <= block_indent {
            let closes = matches!(trimmed, "}" | "};" | "end");
            let dedents = indent_width(line) < block_indent && !is_line_comment(trimmed);
            if closes {
                acc.push(line_no, line);
                acc.flush(&mut out);
                in_block = false;
            } else if dedents {
                acc.flush(&mut out);
                in_block = false;
                acc.push(line_no, line);
            } else {
                acc.push(line_no, line);
            }
        } else {
            acc.push(line_no, line);
        }

        if acc.char_len >= chunk_size {
            acc.flush(&mut out);
            in_block = false;
        }
    }

    acc.flush(&mut out);

    if !saw_block {
        return Vec::new();
    }
    out
}

/// Strategy 2: accumulate whole lines to the size budget, carrying a
/// trailing slice worth roughly `overlap` characters into the next chunk.
fn chunk_by_lines(content: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan> {
    let mut out = Vec::new();
    let mut buf: Vec<(usize, String)> = Vec::new();
    let mut buf_len = 0usize;
    let mut emitted_through = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        buf_len += line.len() + 1;
        buf.push((line_no, line.to_string()));

        if buf_len >= chunk_size {
            emit_line_chunk(&buf, &mut out);
            emitted_through = line_no;

            // Retain a tail worth ~overlap characters as the next chunk's start.
            let mut kept: Vec<(usize, String)> = Vec::new();
            let mut kept_len = 0usize;
            for (no, l) in buf.iter().rev() {
                if kept_len + l.len() + 1 > overlap {
                    break;
                }
                kept_len += l.len() + 1;
                kept.push((*no, l.clone()));
            }
            kept.reverse();
            buf = kept;
            buf_len = kept_len;
        }
    }

    // Residual lines, unless the buffer holds only carried-over overlap.
    if buf.last().map(|(no, _)| *no > emitted_through).unwrap_or(false) {
        emit_line_chunk(&buf, &mut out);
    }

    out
}

fn emit_line_chunk(buf: &[(usize, String)], out: &mut Vec<ChunkSpan>) {
    let content: String = buf
        .iter()
        .map(|(_, l)| l.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if content.trim().is_empty() {
        return;
    }
    out.push(ChunkSpan {
        line_start: buf[0].0,
        line_end: buf[buf.len() - 1].0,
        content,
    });
}
