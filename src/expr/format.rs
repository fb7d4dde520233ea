//! Final text formatting of reduced values.

use super::{Expr, MetadataContext, Reducer, Value};
use crate::error::Result;
use chrono::{DateTime, FixedOffset};
use futures::future::{BoxFuture, FutureExt};

/// Languages that write `1,5` instead of `1.5`.
const DECIMAL_COMMA: &[&str] = &[
    "cs", "da", "de", "es", "fi", "fr", "it", "nb", "nl", "pl", "pt", "ru", "sv", "tr",
];

/// Locale-dependent formatting, resolved from the `lang` binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatProvider {
    lang: String,
}

impl FormatProvider {
    /// Culture-neutral formatting.
    pub fn invariant() -> Self {
        Self::default()
    }

    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Resolve `lang` in `context`; unbound means invariant.
    pub async fn resolve(context: &MetadataContext, reducer: &Reducer) -> Result<Self> {
        if context.lookup("lang").is_none() {
            return Ok(Self::invariant());
        }
        Ok(match reducer.reduce(&Expr::var("lang"), context).await? {
            Value::Str(lang) => Self::new(lang),
            _ => Self::invariant(),
        })
    }

    /// Primary language subtag, lowercased (`en-US` → `en`).
    fn primary(&self) -> String {
        self.lang
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    pub fn decimal_separator(&self) -> char {
        if DECIMAL_COMMA.contains(&self.primary().as_str()) {
            ','
        } else {
            '.'
        }
    }

    pub fn format_float(&self, value: f64) -> String {
        let text = value.to_string();
        match self.decimal_separator() {
            '.' => text,
            sep => text.replace('.', &sep.to_string()),
        }
    }

    pub fn format_date(&self, date: &DateTime<FixedOffset>) -> String {
        date.format(self.date_pattern()).to_string()
    }

    fn date_pattern(&self) -> &'static str {
        if self.lang.eq_ignore_ascii_case("en-US") {
            return "%m/%d/%Y %H:%M:%S";
        }
        match self.primary().as_str() {
            "ja" | "zh" | "ko" => "%Y/%m/%d %H:%M:%S",
            "en" | "fr" | "es" | "it" | "pt" => "%d/%m/%Y %H:%M:%S",
            "de" | "ru" | "pl" | "cs" | "fi" | "nb" | "da" => "%d.%m.%Y %H:%M:%S",
            _ => "%Y-%m-%d %H:%M:%S %:z",
        }
    }
}

/// Format a reduced value for output.
///
/// - null → empty string
/// - entries → their implicit value, formatted
/// - lists → elements formatted and joined with `,`
/// - floats and dates → per the context's `lang`
pub async fn format_value(
    value: &Value,
    context: &MetadataContext,
    reducer: &Reducer,
) -> Result<String> {
    let provider = FormatProvider::resolve(context, reducer).await?;
    format_with(value, context, reducer, &provider).await
}

fn format_with<'a>(
    value: &'a Value,
    context: &'a MetadataContext,
    reducer: &'a Reducer,
    provider: &'a FormatProvider,
) -> BoxFuture<'a, Result<String>> {
    async move {
        Ok(match value {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => provider.format_float(*f),
            Value::Date(date) => provider.format_date(date),
            Value::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(format_with(item, context, reducer, provider).await?);
                }
                parts.join(",")
            }
            Value::Entry(entry) => {
                let implicit = entry.implicit_value(context, reducer).await?;
                format_with(&implicit, context, reducer, provider).await?
            }
            Value::Callable(callable) => callable.name().to_owned(),
        })
    }
    .boxed()
}
