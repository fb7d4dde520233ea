//! Tag index and category tree built from all parsed documents.
//!
//! Both run once per build, after every header has been parsed and before
//! any document is rendered. The results are bound into the root context
//! as `tagList` and `rootCategory`.

use crate::entry::{CategoryEntry, Entry, MarkdownEntry, ROOT_CATEGORY_NAME, TagEntry};
use crate::error::Result;
use crate::expr::{MetadataContext, Reducer, Value, format_value};
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

pub type TagIndex = BTreeMap<String, Arc<TagEntry>>;

/// Missing dates sort last.
fn compare_dates(a: &Option<DateTime<FixedOffset>>, b: &Option<DateTime<FixedOffset>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

async fn tag_name(tag: &Value, context: &MetadataContext, reducer: &Reducer) -> Result<String> {
    Ok(match tag {
        Value::Entry(Entry::PartialTag(partial)) => partial.name().to_owned(),
        Value::Entry(Entry::Tag(tag)) => tag.name().to_owned(),
        Value::Str(name) => name.clone(),
        other => format_value(other, context, reducer).await?,
    })
}

/// Group documents by tag name, each group in ascending date order.
///
/// Names keep their case as written; blank names are dropped. Documents
/// with the same date keep their input order.
pub async fn aggregate_tags(
    entries: &[Arc<MarkdownEntry>],
    context: &MetadataContext,
    reducer: &Reducer,
) -> Result<TagIndex> {
    let mut groups: BTreeMap<String, Vec<(Option<DateTime<FixedOffset>>, Arc<MarkdownEntry>)>> =
        BTreeMap::new();

    for entry in entries {
        let date = entry.date(context, reducer).await?;
        for tag in entry.tags(context, reducer).await? {
            let name = tag_name(&tag, context, reducer).await?;
            if name.trim().is_empty() {
                continue;
            }
            let members = groups.entry(name).or_default();
            if members.iter().any(|(_, member)| Arc::ptr_eq(member, entry)) {
                continue;
            }
            members.push((date, entry.clone()));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by(|(a, _), (b, _)| compare_dates(a, b));
            let entries = members.into_iter().map(|(_, entry)| entry).collect();
            (name.clone(), Arc::new(TagEntry::new(name, entries)))
        })
        .collect())
}

type Member = (Vec<String>, Arc<MarkdownEntry>);

/// Build the category tree rooted at a `(root)` node.
///
/// A document whose category path has `n` segments is owned by the node at
/// depth `n`; documents without a category belong to the root.
pub async fn aggregate_categories(
    entries: &[Arc<MarkdownEntry>],
    context: &MetadataContext,
    reducer: &Reducer,
) -> Result<Arc<CategoryEntry>> {
    let mut members: Vec<Member> = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.category_path(context, reducer).await?;
        members.push((path, entry.clone()));
    }
    Ok(build_node(
        ROOT_CATEGORY_NAME.to_owned(),
        Weak::new(),
        0,
        members,
    ))
}

fn build_node(
    name: String,
    parent: Weak<CategoryEntry>,
    level: usize,
    members: Vec<Member>,
) -> Arc<CategoryEntry> {
    let mut direct = Vec::new();
    let mut groups: BTreeMap<String, Vec<Member>> = BTreeMap::new();
    for (path, entry) in members {
        match path.get(level) {
            Some(segment) => groups.entry(segment.clone()).or_default().push((path, entry)),
            None => direct.push(entry),
        }
    }

    CategoryEntry::new_cyclic(name, parent, direct, |me| {
        groups
            .into_iter()
            .map(|(child, members)| {
                let node = build_node(child.clone(), me.clone(), level + 1, members);
                (child, node)
            })
            .collect()
    })
}

/// `tagList` binding: every tag, ordered by name.
pub fn tag_list(index: &TagIndex) -> Value {
    Value::List(
        index
            .values()
            .map(|tag| Value::Entry(Entry::Tag(tag.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PathEntry;
    use crate::expr::parse_keyword;

    fn doc(path: &str, fields: &[(&str, &str)]) -> Arc<MarkdownEntry> {
        let header = fields
            .iter()
            .map(|(key, text)| ((*key).to_owned(), parse_keyword(key, text).unwrap()))
            .collect();
        Arc::new(MarkdownEntry::new(PathEntry::parse(path), header))
    }

    #[tokio::test]
    async fn test_aggregate_tags() {
        let doc1 = doc("doc1.md", &[("tags", "[foo, bar]"), ("date", "2022-01-01")]);
        let doc2 = doc("doc2.md", &[("tags", "[foo]"), ("date", "2022-02-01")]);
        let context = MetadataContext::new();
        let index = aggregate_tags(&[doc2.clone(), doc1.clone()], &context, &Reducer::default())
            .await
            .unwrap();

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["bar", "foo"]);
        let foo = index["foo"].entries();
        assert_eq!(foo.len(), 2);
        assert!(Arc::ptr_eq(&foo[0], &doc1));
        assert!(Arc::ptr_eq(&foo[1], &doc2));
        let bar = index["bar"].entries();
        assert_eq!(bar.len(), 1);
        assert!(Arc::ptr_eq(&bar[0], &doc1));
    }

    #[tokio::test]
    async fn test_undated_entries_sort_last() {
        let undated = doc("a.md", &[("tags", "[t]")]);
        let dated = doc("b.md", &[("tags", "[t]"), ("date", "2020-01-01")]);
        let index = aggregate_tags(
            &[undated.clone(), dated.clone()],
            &MetadataContext::new(),
            &Reducer::default(),
        )
        .await
        .unwrap();
        let entries = index["t"].entries();
        assert!(Arc::ptr_eq(&entries[0], &dated));
        assert!(Arc::ptr_eq(&entries[1], &undated));
    }

    #[tokio::test]
    async fn test_blank_and_duplicate_tags() {
        let entry = doc("a.md", &[("tags", "[x, ' ', x, X]")]);
        let index = aggregate_tags(&[entry], &MetadataContext::new(), &Reducer::default())
            .await
            .unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["X", "x"]);
        assert_eq!(index["x"].entries().len(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_categories() {
        let b = doc("b.md", &[("category", "[a, b]")]);
        let c = doc("c.md", &[("category", "[a, c]")]);
        let top = doc("top.md", &[]);
        let root = aggregate_categories(
            &[b.clone(), c.clone(), top.clone()],
            &MetadataContext::new(),
            &Reducer::default(),
        )
        .await
        .unwrap();

        assert_eq!(root.name(), ROOT_CATEGORY_NAME);
        assert_eq!(root.entries().len(), 1);
        assert!(Arc::ptr_eq(&root.entries()[0], &top));

        let a = root.child("a").unwrap();
        assert!(a.entries().is_empty());
        let names: Vec<_> = a.children().map(|child| child.name().to_owned()).collect();
        assert_eq!(names, vec!["b", "c"]);

        let node_b = a.child("b").unwrap();
        assert_eq!(node_b.entries().len(), 1);
        assert!(Arc::ptr_eq(&node_b.entries()[0], &b));
        assert!(Arc::ptr_eq(&a.child("c").unwrap().entries()[0], &c));
        assert!(Arc::ptr_eq(&node_b.parent().unwrap(), a));
    }
}
