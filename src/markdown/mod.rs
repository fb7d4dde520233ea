//! Markdown documents: header fields and body conversion.
//!
//! ```text
//! ---
//! title: Hello
//! tags: [foo, bar]
//! ---
//! Body text with {title} substitutions.
//! ```
//!
//! A document that does not open with `---` has an empty header.

use crate::error::{Error, Result};
use crate::expr::{Expr, parse_keyword};
use pulldown_cmark::{Options, Parser, html::push_html};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub type Header = BTreeMap<String, Expr>;

const DELIMITER: &str = "---";

/// A split document: parsed header and raw body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub header: Header,
    pub body: String,
}

// ============================================================================
// Header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// Header closed; body starts on the next line.
    Closed,
    /// No header; body starts at this line.
    Absent,
}

struct HeaderParser {
    state: State,
    line: usize,
    header: Header,
    /// Only track delimiters; field lines are not parsed.
    skip_fields: bool,
}

impl HeaderParser {
    fn new() -> Self {
        Self {
            state: State::Start,
            line: 0,
            header: Header::new(),
            skip_fields: false,
        }
    }

    fn skipping() -> Self {
        Self {
            skip_fields: true,
            ..Self::new()
        }
    }

    fn feed(&mut self, raw: &str) -> Result<Step> {
        self.line += 1;
        let line = raw.trim_end_matches(['\r', '\n']);
        let line = if self.line == 1 {
            line.trim_start_matches('\u{feff}')
        } else {
            line
        };

        match self.state {
            State::Start if line.trim().is_empty() => Ok(Step::Continue),
            State::Start if line.trim_end() == DELIMITER => {
                self.state = State::Inside;
                Ok(Step::Continue)
            }
            State::Start => Ok(Step::Absent),
            State::Inside if line.trim_end() == DELIMITER => Ok(Step::Closed),
            State::Inside if line.trim().is_empty() || self.skip_fields => Ok(Step::Continue),
            State::Inside => {
                let Some((key, value)) = line.split_once(':') else {
                    return Err(Error::format(format!(
                        "header line {}: expected `key: value`, found `{line}`",
                        self.line
                    )));
                };
                let key = key.trim();
                if key.is_empty() || key.contains(char::is_whitespace) {
                    return Err(Error::format(format!(
                        "header line {}: invalid key `{key}`",
                        self.line
                    )));
                }
                let expr = parse_keyword(key, value.trim()).map_err(|err| match err {
                    Error::Format(message) => {
                        Error::format(format!("header line {}: {message}", self.line))
                    }
                    other => other,
                })?;
                self.header.insert(key.to_owned(), expr);
                Ok(Step::Continue)
            }
        }
    }

    fn finish(self) -> Result<Header> {
        match self.state {
            State::Inside => Err(Error::format("header is not closed with `---`")),
            State::Start => Ok(self.header),
        }
    }
}

/// Split `text` into header and body.
pub fn parse_document(text: &str) -> Result<Document> {
    let (header, offset) = split(text, HeaderParser::new())?;
    Ok(Document {
        header,
        body: text[offset..].to_owned(),
    })
}

/// Body of `text`, with the header skipped but not parsed.
pub fn body(text: &str) -> Result<&str> {
    let (_, offset) = split(text, HeaderParser::skipping())?;
    Ok(&text[offset..])
}

/// Parsed header and the byte offset where the body starts.
fn split(text: &str, mut parser: HeaderParser) -> Result<(Header, usize)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        match parser.feed(line)? {
            Step::Continue => offset += line.len(),
            Step::Closed => return Ok((parser.header, offset + line.len())),
            Step::Absent => return Ok((Header::new(), offset)),
        }
    }
    Ok((parser.finish()?, text.len()))
}

/// Read only the header of the file at `path`.
pub async fn read_header(path: &Path) -> Result<Header> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|err| Error::io(path, err))?;
    let mut reader = BufReader::new(file);
    let mut parser = HeaderParser::new();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|err| Error::io(path, err))?;
        if read == 0 {
            return parser.finish();
        }
        match parser.feed(&line)? {
            Step::Continue => {}
            Step::Closed => return Ok(parser.header),
            Step::Absent => return Ok(Header::new()),
        }
    }
}

// ============================================================================
// Body
// ============================================================================

/// Convert rendered markdown to HTML (tables, strikethrough, task lists).
pub fn to_html(markdown: &str) -> String {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::with_capacity(markdown.len() * 2);
    push_html(&mut html, parser);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Value;

    #[test]
    fn test_parse_document() {
        let text = "---\ntitle: World\ntags: [a, b]\n\n---\nHello {title}!\n";
        let document = parse_document(text).unwrap();
        assert_eq!(document.header["title"], Expr::var("World"));
        assert!(matches!(document.header["tags"], Expr::Array(ref items) if items.len() == 2));
        assert_eq!(document.body, "Hello {title}!\n");
    }

    #[test]
    fn test_document_without_header() {
        let document = parse_document("\nJust text\n---\n").unwrap();
        assert!(document.header.is_empty());
        assert_eq!(document.body, "Just text\n---\n");
    }

    #[test]
    fn test_crlf_and_bom() {
        let document = parse_document("\u{feff}---\r\nlayout: post\r\n---\r\nbody").unwrap();
        assert_eq!(document.header["layout"], Expr::var("post"));
        assert_eq!(document.body, "body");
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(
            parse_document("---\nnot a field\n---\n"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            parse_document("---\ntitle: x\n"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            parse_document("---\nbad key: x\n---\n"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_body_skips_header_fields() {
        let text = "---\ntitle: 'open\n---\nHello\n";
        assert!(parse_document(text).is_err());
        assert_eq!(body(text).unwrap(), "Hello\n");
        assert_eq!(body("Just text").unwrap(), "Just text");
        assert!(matches!(body("---\ntitle: x\n"), Err(Error::Format(_))));
    }

    #[test]
    fn test_value_with_colon() {
        let document = parse_document("---\nlink: https://example.com/a\n---\n").unwrap();
        assert_eq!(
            document.header["link"],
            Expr::Value(Value::from("https://example.com/a"))
        );
    }

    #[tokio::test]
    async fn test_read_header_stops_at_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "---\ntitle: A\n---\n{unterminated\n").unwrap();
        let header = read_header(&path).await.unwrap();
        assert_eq!(header["title"], Expr::var("A"));

        let missing = read_header(&dir.path().join("none.md")).await;
        assert!(matches!(missing, Err(Error::Io { .. })));
    }

    #[test]
    fn test_to_html() {
        assert_eq!(to_html("Hello World!"), "<p>Hello World!</p>\n");
        assert!(to_html("~~x~~").contains("<del>x</del>"));
    }
}
