//! Structured values that answer property lookups.
//!
//! Every value that can appear on the left of a dot (`item.title`,
//! `category.breadcrumbs`) is one of the closed set of [`Entry`] variants.
//!
//! | Variant | Produced by | Implicit value |
//! |---------|-------------|----------------|
//! | `Path` | document discovery | slash-joined path |
//! | `Markdown` | header parsing | `title` |
//! | `Category` | category aggregation | `name` |
//! | `PartialCategory` | `category:` header | `name` |
//! | `Tag` | tag aggregation | `name` |
//! | `PartialTag` | `tags:` header | `name` |
//! | `Iterator` | `{foreach}` passes | the wrapped value |
//!
//! Partial entries come straight from the parser and are only resolved
//! against the aggregated tree/index when a property is requested.

mod category;
mod iterator;
mod markdown;
mod path;
mod tag;

pub use category::{CategoryEntry, PartialCategoryEntry, ROOT_CATEGORY_NAME};
pub use iterator::IteratorEntry;
pub use markdown::MarkdownEntry;
pub use path::PathEntry;
pub use tag::{PartialTagEntry, TagEntry};

use crate::error::Result;
use crate::expr::{MetadataContext, Reducer, Value};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Context binding holding the aggregated root [`CategoryEntry`].
pub const ROOT_CATEGORY_KEY: &str = "rootCategory";
/// Context binding holding the list of all [`TagEntry`] values.
pub const TAG_LIST_KEY: &str = "tagList";

#[derive(Debug, Clone)]
pub enum Entry {
    Path(PathEntry),
    Markdown(Arc<MarkdownEntry>),
    Category(Arc<CategoryEntry>),
    PartialCategory(Arc<PartialCategoryEntry>),
    Tag(Arc<TagEntry>),
    PartialTag(PartialTagEntry),
    Iterator(Arc<IteratorEntry>),
}

impl Entry {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Markdown(_) => "markdown",
            Self::Category(_) => "category",
            Self::PartialCategory(_) => "partial-category",
            Self::Tag(_) => "tag",
            Self::PartialTag(_) => "partial-tag",
            Self::Iterator(_) => "iterator",
        }
    }

    /// Look up a named property.
    ///
    /// `Ok(None)` means "unknown property": the caller keeps the value it
    /// already has instead of failing.
    pub fn get_property<'a>(
        &'a self,
        name: &'a str,
        context: &'a MetadataContext,
        reducer: &'a Reducer,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        async move {
            match self {
                Self::Path(path) => Ok(path.property(name)),
                Self::Markdown(entry) => entry.property(name, context, reducer).await,
                Self::Category(category) => Ok(category.property(name)),
                Self::PartialCategory(partial) => partial.property(name, context, reducer).await,
                Self::Tag(tag) => Ok(tag.property(name)),
                Self::PartialTag(partial) => partial.property(name, context, reducer).await,
                Self::Iterator(iterator) => iterator.property(name, context, reducer).await,
            }
        }
        .boxed()
    }

    /// The value used when the entry itself is printed.
    pub fn implicit_value<'a>(
        &'a self,
        context: &'a MetadataContext,
        reducer: &'a Reducer,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            match self {
                Self::Path(path) => Ok(Value::Str(path.to_string())),
                Self::Markdown(entry) => entry.title(context, reducer).await,
                Self::Category(category) => Ok(Value::Str(category.name().to_owned())),
                Self::PartialCategory(partial) => Ok(Value::Str(partial.name().to_owned())),
                Self::Tag(tag) => Ok(Value::Str(tag.name().to_owned())),
                Self::PartialTag(partial) => Ok(Value::Str(partial.name().to_owned())),
                Self::Iterator(iterator) => Ok(iterator.value().clone()),
            }
        }
        .boxed()
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::Markdown(a), Self::Markdown(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Category(a), Self::Category(b)) => Arc::ptr_eq(a, b),
            (Self::PartialCategory(a), Self::PartialCategory(b)) => a.path() == b.path(),
            (Self::Tag(a), Self::Tag(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::PartialTag(a), Self::PartialTag(b)) => a == b,
            (Self::Iterator(a), Self::Iterator(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<PathEntry> for Entry {
    fn from(path: PathEntry) -> Self {
        Self::Path(path)
    }
}

impl From<Arc<MarkdownEntry>> for Entry {
    fn from(entry: Arc<MarkdownEntry>) -> Self {
        Self::Markdown(entry)
    }
}

impl From<Arc<CategoryEntry>> for Entry {
    fn from(category: Arc<CategoryEntry>) -> Self {
        Self::Category(category)
    }
}

impl From<Arc<TagEntry>> for Entry {
    fn from(tag: Arc<TagEntry>) -> Self {
        Self::Tag(tag)
    }
}
