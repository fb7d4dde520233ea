//! Tag index entries.

use super::{Entry, MarkdownEntry, TAG_LIST_KEY};
use crate::error::Result;
use crate::expr::{Expr, MetadataContext, Reducer, Value};
use std::sync::Arc;

/// A tag and the published documents carrying it, in date order.
#[derive(Debug, PartialEq)]
pub struct TagEntry {
    name: String,
    entries: Vec<Arc<MarkdownEntry>>,
}

impl TagEntry {
    pub fn new(name: String, entries: Vec<Arc<MarkdownEntry>>) -> Self {
        Self { name, entries }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Arc<MarkdownEntry>] {
        &self.entries
    }

    pub(super) fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "entries" => Some(Value::List(
                self.entries
                    .iter()
                    .map(|entry| Value::Entry(Entry::Markdown(entry.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// A tag named in a header, resolved on demand via `tagList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTagEntry {
    name: String,
}

impl PartialTagEntry {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn resolve(
        &self,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Arc<TagEntry>>> {
        if context.lookup(TAG_LIST_KEY).is_none() {
            return Ok(None);
        }
        let Value::List(tags) = reducer.reduce(&Expr::var(TAG_LIST_KEY), context).await? else {
            return Ok(None);
        };
        Ok(tags.into_iter().find_map(|tag| match tag {
            Value::Entry(Entry::Tag(tag)) if tag.name == self.name => Some(tag),
            _ => None,
        }))
    }

    pub(super) async fn property(
        &self,
        name: &str,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Value>> {
        if let Some(tag) = self.resolve(context, reducer).await? {
            return Ok(tag.property(name));
        }
        Ok(match name {
            "name" => Some(Value::from(self.name.as_str())),
            "entries" => Some(Value::List(Vec::new())),
            _ => None,
        })
    }
}
