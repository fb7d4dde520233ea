//! `format value [pattern]`.

use crate::error::{Error, Result};
use crate::expr::{FormatProvider, Lookup, Value, parser::parse_date};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

/// Number pattern such as `000.00`: zeros before the point set the
/// zero-padded width, zeros after it the decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumberPattern {
    width: usize,
    decimals: Option<usize>,
}

impl NumberPattern {
    fn parse(pattern: &str) -> Option<Self> {
        let (int, frac) = match pattern.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (pattern, None),
        };
        let zeros = |part: &str| part.chars().all(|c| c == '0');
        if pattern.is_empty() || !zeros(int) || !frac.is_none_or(zeros) {
            return None;
        }
        Some(Self {
            width: int.len(),
            decimals: frac.map(str::len),
        })
    }

    fn format(self, value: f64, provider: &FormatProvider) -> String {
        let decimals = self.decimals.unwrap_or(0);
        let digits = format!("{:.*}", decimals, value.abs());
        let int_len = digits.find('.').unwrap_or(digits.len());
        let pad = self.width.saturating_sub(int_len);

        let mut out = String::with_capacity(digits.len() + pad + 1);
        if value.is_sign_negative() && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        out.extend(std::iter::repeat_n('0', pad));
        let separator = provider.decimal_separator().to_string();
        out.push_str(&digits.replace('.', &separator));
        out
    }
}

fn format_date(date: &DateTime<FixedOffset>, pattern: &str) -> Result<String> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(Error::evaluation(format!("format: invalid date pattern `{pattern}`")));
    }
    let mut out = String::new();
    write!(out, "{}", date.format(pattern))
        .map_err(|_| Error::evaluation(format!("format: cannot apply `{pattern}`")))?;
    Ok(out)
}

fn format_number(value: f64, pattern: &str, provider: &FormatProvider) -> Result<String> {
    NumberPattern::parse(pattern)
        .map(|pattern| pattern.format(value, provider))
        .ok_or_else(|| Error::evaluation(format!("format: invalid number pattern `{pattern}`")))
}

pub(super) fn format(args: &[Value], _lookup: Lookup<'_>, provider: &FormatProvider) -> Result<Value> {
    let (value, pattern) = match args {
        [value] => (value, None),
        [value, Value::Str(pattern)] => (value, Some(pattern.as_str())),
        [_, other] => {
            return Err(Error::evaluation(format!(
                "format: pattern must be a string, found {}",
                other.type_name()
            )));
        }
        _ => {
            return Err(Error::evaluation(format!(
                "format: expected 1 or 2 arguments, found {}",
                args.len()
            )));
        }
    };

    let text = match (value, pattern) {
        (Value::Null, _) => String::new(),
        (Value::Date(date), Some(pattern)) => format_date(date, pattern)?,
        (Value::Date(date), None) => provider.format_date(date),
        (Value::Int(i), Some(pattern)) => format_number(*i as f64, pattern, provider)?,
        (Value::Float(f), Some(pattern)) => format_number(*f, pattern, provider)?,
        (Value::Int(i), None) => i.to_string(),
        (Value::Float(f), None) => provider.format_float(*f),
        (Value::Str(s), Some(pattern)) => {
            if let Ok(number) = s.trim().parse::<f64>()
                && NumberPattern::parse(pattern).is_some()
            {
                format_number(number, pattern, provider)?
            } else if let Some(date) = parse_date(s) {
                format_date(&date, pattern)?
            } else {
                s.clone()
            }
        }
        (Value::Str(s), None) => s.clone(),
        (Value::Bool(b), _) => b.to_string(),
        (other, _) => {
            return Err(Error::evaluation(format!(
                "format: cannot format {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Str(text))
}
