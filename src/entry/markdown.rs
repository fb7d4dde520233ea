//! A parsed markdown document, as seen from templates.

use super::{Entry, PathEntry};
use crate::error::Result;
use crate::expr::{Expr, MetadataContext, Reducer, Value, parser::parse_date};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One markdown source file and its header fields.
///
/// Header expressions stay unreduced; every read reduces them in a scope
/// that also sees the document's own fields, so `title: (format date ...)`
/// works both while rendering the page and from another page's loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownEntry {
    markdown_path: PathEntry,
    path: PathEntry,
    header: BTreeMap<String, Expr>,
}

impl MarkdownEntry {
    /// `markdown_path` is relative to its content root; the output path is
    /// the same location with an `.html` extension.
    pub fn new(markdown_path: PathEntry, header: BTreeMap<String, Expr>) -> Self {
        let path = markdown_path.with_extension("html");
        Self {
            markdown_path,
            path,
            header,
        }
    }

    pub fn markdown_path(&self) -> &PathEntry {
        &self.markdown_path
    }

    pub fn path(&self) -> &PathEntry {
        &self.path
    }

    pub fn header(&self) -> &BTreeMap<String, Expr> {
        &self.header
    }

    /// Bind header fields plus `path` and `markdownPath` into `context`.
    ///
    /// Well-known fields missing or blank in the header get their defaults, so a
    /// layout never falls back to the bare name.
    pub fn bind(&self, context: &MetadataContext) {
        for (key, expr) in &self.header {
            context.set(key.clone(), expr.clone());
        }
        let defaults = [
            ("title", self.default_title()),
            ("date", Value::Null),
            ("category", Value::Null),
            ("tags", Value::List(Vec::new())),
            ("published", Value::Bool(true)),
        ];
        for (key, value) in defaults {
            if self.header.get(key).is_none_or(is_blank) {
                context.set(key, value);
            }
        }
        context.set("path", Value::Entry(self.path.clone().into()));
        context.set(
            "markdownPath",
            Value::Entry(self.markdown_path.clone().into()),
        );
    }

    /// Child of `context` holding this document's fields.
    pub fn scope(&self, context: &MetadataContext) -> MetadataContext {
        let scope = context.spawn();
        self.bind(&scope);
        scope
    }

    async fn field(
        &self,
        name: &str,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Value>> {
        let Some(expr) = self.header.get(name) else {
            return Ok(None);
        };
        let scope = self.scope(context);
        reducer.reduce(expr, &scope).await.map(Some)
    }

    /// `title` header, or the file stem when absent or blank.
    pub async fn title(&self, context: &MetadataContext, reducer: &Reducer) -> Result<Value> {
        match self.field("title", context, reducer).await? {
            Some(Value::Str(title)) if title.trim().is_empty() => Ok(self.default_title()),
            Some(Value::Null) | None => Ok(self.default_title()),
            Some(title) => Ok(title),
        }
    }

    fn default_title(&self) -> Value {
        self.markdown_path.stem().map_or(Value::Null, Value::from)
    }

    pub async fn date(
        &self,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<DateTime<FixedOffset>>> {
        Ok(match self.field("date", context, reducer).await? {
            Some(Value::Date(date)) => Some(date),
            Some(Value::Str(text)) => parse_date(&text),
            _ => None,
        })
    }

    /// Documents are published unless `published` reduces to false.
    pub async fn published(&self, context: &MetadataContext, reducer: &Reducer) -> Result<bool> {
        Ok(match self.field("published", context, reducer).await? {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Str(text)) => !text.trim().eq_ignore_ascii_case("false"),
            _ => true,
        })
    }

    /// Reduced `tags`, nested lists flattened.
    pub async fn tags(&self, context: &MetadataContext, reducer: &Reducer) -> Result<Vec<Value>> {
        let mut tags = Vec::new();
        if let Some(value) = self.field("tags", context, reducer).await? {
            flatten(value, &mut tags);
        }
        Ok(tags)
    }

    /// Category path from the root, e.g. `["blog", "rust"]`.
    pub async fn category_path(
        &self,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Vec<String>> {
        Ok(match self.field("category", context, reducer).await? {
            Some(Value::Entry(Entry::PartialCategory(leaf))) => leaf.path(),
            Some(Value::Entry(Entry::Category(category))) => category.path(),
            Some(Value::Str(name)) if !name.is_empty() => vec![name],
            Some(Value::List(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Str(name) => Some(name),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub(super) async fn property(
        &self,
        name: &str,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Value>> {
        Ok(Some(match name {
            "markdownPath" => Value::Entry(self.markdown_path.clone().into()),
            "path" => Value::Entry(self.path.clone().into()),
            "title" => self.title(context, reducer).await?,
            "date" => self
                .date(context, reducer)
                .await?
                .map_or(Value::Null, Value::Date),
            "published" => Value::Bool(self.published(context, reducer).await?),
            "tags" => Value::List(self.tags(context, reducer).await?),
            "category" => self
                .field("category", context, reducer)
                .await?
                .unwrap_or(Value::Null),
            _ => return self.field(name, context, reducer).await,
        }))
    }
}

fn is_blank(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(Value::Str(text)) if text.trim().is_empty())
}

fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => items.into_iter().for_each(|item| flatten(item, out)),
        Value::Null => {}
        other => out.push(other),
    }
}

/// Wrap as an [`Entry`] value.
impl From<MarkdownEntry> for Entry {
    fn from(entry: MarkdownEntry) -> Self {
        Self::Markdown(Arc::new(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_keyword;

    fn entry(path: &str, fields: &[(&str, &str)]) -> MarkdownEntry {
        let header = fields
            .iter()
            .map(|(key, text)| ((*key).to_owned(), parse_keyword(key, text).unwrap()))
            .collect();
        MarkdownEntry::new(PathEntry::parse(path), header)
    }

    #[test]
    fn test_output_path() {
        let entry = entry("blog/post.md", &[]);
        assert_eq!(entry.path().to_string(), "blog/post.html");
        assert_eq!(entry.markdown_path().to_string(), "blog/post.md");
    }

    #[tokio::test]
    async fn test_defaults() {
        let context = MetadataContext::new();
        let reducer = Reducer::default();
        let entry = entry("blog/post.md", &[("title", "")]);
        assert_eq!(entry.title(&context, &reducer).await.unwrap(), Value::from("post"));
        assert_eq!(entry.date(&context, &reducer).await.unwrap(), None);
        assert!(entry.published(&context, &reducer).await.unwrap());
        assert!(entry.tags(&context, &reducer).await.unwrap().is_empty());
        assert!(entry.category_path(&context, &reducer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_header_fields() {
        let context = MetadataContext::new();
        let reducer = Reducer::default();
        let entry = entry(
            "a.md",
            &[
                ("title", "Hello"),
                ("date", "2022-01-02 03:04:05 +09:00"),
                ("published", "false"),
                ("category", "[blog, rust]"),
                ("tags", "[foo, bar]"),
                ("author", "kekyo"),
            ],
        );
        assert_eq!(entry.title(&context, &reducer).await.unwrap(), Value::from("Hello"));
        assert_eq!(
            entry.date(&context, &reducer).await.unwrap(),
            parse_date("2022-01-02 03:04:05 +09:00")
        );
        assert!(!entry.published(&context, &reducer).await.unwrap());
        assert_eq!(
            entry.category_path(&context, &reducer).await.unwrap(),
            vec!["blog", "rust"]
        );
        assert_eq!(entry.tags(&context, &reducer).await.unwrap().len(), 2);

        let author = entry.property("author", &context, &reducer).await.unwrap();
        assert_eq!(author, Some(Value::from("kekyo")));
        let missing = entry.property("nothing", &context, &reducer).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_scope_defaults_for_missing_fields() {
        let context = MetadataContext::new();
        let reducer = Reducer::default();
        let entry = entry("notes/hello.md", &[("author", "kekyo"), ("date", "")]);
        let scope = entry.scope(&context);

        for (name, expected) in [
            ("title", "hello"),
            ("date", ""),
            ("category", ""),
            ("author", "kekyo"),
        ] {
            let text = reducer.reduce_to_string(&Expr::var(name), &scope).await.unwrap();
            assert_eq!(text, expected, "{name}");
        }
        assert_eq!(
            reducer.reduce(&Expr::var("tags"), &scope).await.unwrap(),
            Value::List(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_fields_see_own_header() {
        let context = MetadataContext::new();
        let reducer = Reducer::default();
        let mut header = BTreeMap::new();
        header.insert("title".to_owned(), Expr::var("author"));
        header.insert("author".to_owned(), Expr::value("kekyo"));
        let entry = MarkdownEntry::new(PathEntry::parse("x.md"), header);
        assert_eq!(entry.title(&context, &reducer).await.unwrap(), Value::from("kekyo"));
    }
}
