//! Code span and fenced block detection for markdown bodies.
//!
//! Braces inside code are never template syntax, so the body is scanned
//! before tree parsing and every covered position is recorded.

use rustc_hash::FxHashSet;
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
    indent: usize,
}

/// Positions covered by code, by zero-based line and byte column.
#[derive(Debug, Default)]
pub struct CodeFragments {
    spans: Vec<(usize, Range<usize>)>,
    block_lines: FxHashSet<usize>,
}

impl CodeFragments {
    /// Scan `text`.
    ///
    /// - A backtick or tilde run closed by a run of the same marker, equal or
    ///   longer, on the same line is an inline span.
    /// - A run with no closer on its line opens a block from that run on. The
    ///   block ends with a line of the same indentation that starts with a run
    ///   of the same marker at least as long. An unclosed block runs to the end.
    pub fn scan(text: &str) -> Self {
        let mut fragments = Self::default();
        let mut open: Option<Fence> = None;

        for (index, line) in text.lines().enumerate() {
            if let Some(fence) = open {
                fragments.block_lines.insert(index);
                if closes(line, fence) {
                    open = None;
                }
                continue;
            }
            open = fragments.scan_line(index, line);
        }
        fragments
    }

    fn scan_line(&mut self, index: usize, line: &str) -> Option<Fence> {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let marker = bytes[i];
            if marker != b'`' && marker != b'~' {
                i += 1;
                continue;
            }
            let len = run_length(&bytes[i..], marker);
            match closing_run(&bytes[i + len..], marker, len) {
                Some(offset) => {
                    let end = i + len + offset;
                    self.spans.push((index, i..end));
                    i = end;
                }
                None => {
                    self.spans.push((index, i..line.len()));
                    return Some(Fence {
                        marker,
                        len,
                        indent: split_indent(line).0,
                    });
                }
            }
        }
        None
    }

    pub fn contains(&self, line: usize, column: usize) -> bool {
        self.block_lines.contains(&line)
            || self
                .spans
                .iter()
                .any(|(l, range)| *l == line && range.contains(&column))
    }
}

fn run_length(bytes: &[u8], marker: u8) -> usize {
    bytes.iter().take_while(|b| **b == marker).count()
}

fn split_indent(line: &str) -> (usize, &str) {
    let rest = line.trim_start_matches([' ', '\t']);
    (line.len() - rest.len(), rest)
}

/// End offset of the first run of `marker` at least `len` long.
fn closing_run(bytes: &[u8], marker: u8, len: usize) -> Option<usize> {
    let mut j = 0;
    while j < bytes.len() {
        if bytes[j] != marker {
            j += 1;
            continue;
        }
        let run = run_length(&bytes[j..], marker);
        if run >= len {
            return Some(j + run);
        }
        j += run;
    }
    None
}

fn closes(line: &str, fence: Fence) -> bool {
    let (indent, rest) = split_indent(line);
    let len = run_length(rest.as_bytes(), fence.marker);
    indent == fence.indent && len >= fence.len && rest[len..].trim().is_empty()
}
