//! Expression parser: text → [`Expr`].
//!
//! A single left-to-right scanner drives every syntax in the system. The
//! [`ListKind`] of the outermost frame decides which characters are skipped
//! between tokens, which ones end a bare token, and how the collected terms
//! collapse into the final expression. Nested `(...)` frames always behave
//! like [`ListKind::List`] and nested `[...]` frames like
//! [`ListKind::StrictArray`].

use super::{Expr, Value};
use crate::entry::{Entry, PartialCategoryEntry, PartialTagEntry};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use std::sync::Arc;

/// How an expression text is tokenized and collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Whitespace separated; 2+ terms become `Apply(term[0], term[1..])`.
    List,
    /// Comma separated; always an `Array`, never unwrapped.
    StrictArray,
    /// Comma separated; a single term is unwrapped.
    LaxArray,
    /// Whitespace separated; exactly one term.
    Value,
    /// Whole text is one term; bare tokens run to the end of input.
    SingleValue,
}

impl ListKind {
    /// Characters skipped between tokens.
    fn is_idle(self, c: char) -> bool {
        match self {
            Self::StrictArray | Self::LaxArray => c.is_whitespace() || c == ',',
            Self::List | Self::Value | Self::SingleValue => c.is_whitespace(),
        }
    }

    /// Characters that end a bare token.
    fn is_terminator(self, c: char) -> bool {
        match self {
            Self::StrictArray | Self::LaxArray => c == ',' || is_bracket(c),
            Self::List | Self::Value => c.is_whitespace() || is_bracket(c),
            Self::SingleValue => false,
        }
    }
}

const fn is_bracket(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']')
}

/// One open bracket level.
struct Frame {
    kind: ListKind,
    /// Expected closing character; `None` for the outermost frame.
    closer: Option<char>,
    terms: Vec<Expr>,
}

impl Frame {
    const fn new(kind: ListKind, closer: Option<char>) -> Self {
        Self {
            kind,
            closer,
            terms: Vec::new(),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse `text` into an expression.
///
/// # Examples
/// ```ignore
/// parse("(123 456)", ListKind::List)   // Apply(Value(123), [Value(456)])
/// parse("[123]", ListKind::StrictArray) // Array([Value(123)])
/// parse("'abc,def'", ListKind::LaxArray) // Value("abc,def")
/// ```
pub fn parse(text: &str, kind: ListKind) -> Result<Expr> {
    let chars: Vec<char> = text.chars().collect();
    let mut stack = vec![Frame::new(kind, None)];
    let mut i = 0;

    loop {
        let kind = current(&mut stack).kind;
        while i < chars.len() && kind.is_idle(chars[i]) {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        match chars[i] {
            quote @ ('"' | '\'') => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == quote)
                    .map(|offset| start + offset)
                    .ok_or_else(|| Error::format(format!("unterminated quote in `{text}`")))?;
                let literal: String = chars[start..end].iter().collect();
                current(&mut stack).terms.push(Expr::Value(Value::Str(literal)));
                i = end + 1;
            }
            '(' => {
                stack.push(Frame::new(ListKind::List, Some(')')));
                i += 1;
            }
            '[' => {
                stack.push(Frame::new(ListKind::StrictArray, Some(']')));
                i += 1;
            }
            closer @ (')' | ']') => {
                if stack.len() == 1 || current(&mut stack).closer != Some(closer) {
                    return Err(Error::format(format!(
                        "unexpected `{closer}` in `{text}`"
                    )));
                }
                let frame = stack.pop().ok_or_else(|| Error::format("empty frame stack"))?;
                let expr = close_frame(frame, text)?;
                current(&mut stack).terms.push(expr);
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !kind.is_terminator(chars[i]) {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect();
                let token = token.trim();
                if token.is_empty() {
                    i = i.max(start + 1);
                } else {
                    current(&mut stack).terms.push(classify(token));
                }
            }
        }
    }

    if stack.len() > 1 {
        return Err(Error::format(format!("unterminated bracket in `{text}`")));
    }
    let outer = stack.pop().ok_or_else(|| Error::format("empty frame stack"))?;
    finish(outer, text)
}

/// Parse a header field value, choosing the [`ListKind`] by field name.
///
/// - `tags` → strict array of [`PartialTagEntry`]
/// - `category` → strict array folded into a [`PartialCategoryEntry`] chain
/// - `title`, `date`, `layout` → single value
/// - anything else → lax array
pub fn parse_keyword(key: &str, text: &str) -> Result<Expr> {
    let blank = text.trim().is_empty();
    match key {
        "tags" => {
            if blank {
                return Ok(Expr::Array(Vec::new()));
            }
            let Expr::Array(items) = parse(text, ListKind::StrictArray)? else {
                return Err(Error::format(format!("invalid tags `{text}`")));
            };
            Ok(Expr::Array(
                items
                    .into_iter()
                    .map(|item| match literal_name(&item) {
                        Some(name) => Expr::Value(Value::Entry(Entry::PartialTag(
                            PartialTagEntry::new(name),
                        ))),
                        None => item,
                    })
                    .collect(),
            ))
        }
        "category" => {
            if blank {
                return Ok(Expr::Value(Value::Null));
            }
            let Expr::Array(items) = parse(text, ListKind::StrictArray)? else {
                return Err(Error::format(format!("invalid category `{text}`")));
            };
            let mut chain: Option<Arc<PartialCategoryEntry>> = None;
            for item in &items {
                let name = literal_name(item).ok_or_else(|| {
                    Error::format(format!("category segment must be a name: `{item}`"))
                })?;
                chain = Some(Arc::new(PartialCategoryEntry::new(name, chain)));
            }
            Ok(Expr::Value(
                chain.map_or(Value::Null, |leaf| Value::Entry(Entry::PartialCategory(leaf))),
            ))
        }
        "title" | "date" | "layout" => {
            if blank {
                return Ok(Expr::Value(Value::Str(String::new())));
            }
            parse(text, ListKind::SingleValue)
        }
        _ => {
            if blank {
                return Ok(Expr::Value(Value::Str(String::new())));
            }
            parse(text, ListKind::LaxArray)
        }
    }
}

/// Parse the date/offset forms accepted in headers and templates.
///
/// Values without an explicit offset are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    const WITH_OFFSET: &[&str] = &[
        "%Y-%m-%d %H:%M:%S %:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y/%m/%d %H:%M:%S %:z",
        "%Y-%m-%d %H:%M %:z",
        "%Y/%m/%d %H:%M %:z",
    ];
    const NAIVE_TIME: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
    ];
    const NAIVE_DATE: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date);
    }
    if let Some(date) = WITH_OFFSET
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(date);
    }
    NAIVE_TIME
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NAIVE_DATE
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Whether `token` is a variable name: letter or `_` first, then
/// letters, digits, `_` or `.`.
pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

// ============================================================================
// Internal
// ============================================================================

#[inline]
fn current(stack: &mut [Frame]) -> &mut Frame {
    // The outermost frame is only popped after the scan loop.
    let last = stack.len() - 1;
    &mut stack[last]
}

/// Classify a bare token: bool → integer → float → identifier → date → string.
fn classify(token: &str) -> Expr {
    if token.eq_ignore_ascii_case("true") {
        return Expr::Value(Value::Bool(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Expr::Value(Value::Bool(false));
    }
    if let Ok(i) = token.parse::<i64>() {
        return Expr::Value(Value::Int(i));
    }
    if looks_numeric(token)
        && let Ok(f) = token.parse::<f64>()
    {
        return Expr::Value(Value::Float(f));
    }
    if is_identifier(token) {
        return Expr::Variable(token.to_owned());
    }
    if let Some(date) = parse_date(token) {
        return Expr::Value(Value::Date(date));
    }
    Expr::Value(Value::Str(token.to_owned()))
}

/// Rejects `inf`, `NaN` and friends that `f64::from_str` would accept.
fn looks_numeric(token: &str) -> bool {
    let digits = token.trim_start_matches(['+', '-']).trim_start_matches('.');
    digits.starts_with(|c: char| c.is_ascii_digit())
}

fn close_frame(frame: Frame, text: &str) -> Result<Expr> {
    match frame.closer {
        Some(']') => Ok(Expr::Array(frame.terms)),
        _ => collapse_list(frame.terms, text),
    }
}

fn collapse_list(mut terms: Vec<Expr>, text: &str) -> Result<Expr> {
    match terms.len() {
        0 => Err(Error::format(format!("empty expression in `{text}`"))),
        1 => Ok(terms.remove(0)),
        _ => {
            let function = terms.remove(0);
            Ok(Expr::apply(function, terms))
        }
    }
}

fn finish(outer: Frame, text: &str) -> Result<Expr> {
    let mut terms = outer.terms;
    if terms.is_empty() {
        return Err(Error::format(format!("empty expression in `{text}`")));
    }
    match outer.kind {
        ListKind::List => collapse_list(terms, text),
        ListKind::LaxArray if terms.len() == 1 => Ok(terms.remove(0)),
        ListKind::LaxArray => Ok(Expr::Array(terms)),
        ListKind::StrictArray => match terms.as_slice() {
            [Expr::Array(_)] => Ok(terms.remove(0)),
            _ => Ok(Expr::Array(terms)),
        },
        ListKind::Value | ListKind::SingleValue if terms.len() == 1 => Ok(terms.remove(0)),
        ListKind::Value | ListKind::SingleValue => Err(Error::format(format!(
            "expected a single value in `{text}`"
        ))),
    }
}

/// Literal name carried by a header array element.
fn literal_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Variable(name) => Some(name.clone()),
        Expr::Value(Value::Str(s)) => Some(s.clone()),
        Expr::Value(Value::Int(i)) => Some(i.to_string()),
        Expr::Value(Value::Float(f)) => Some(f.to_string()),
        Expr::Value(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
