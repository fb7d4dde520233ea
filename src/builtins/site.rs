//! Navigation built-ins: `relative`, `lookup`, `older`, `newer`.

use crate::entry::{CategoryEntry, Entry, MarkdownEntry, PathEntry, ROOT_CATEGORY_KEY};
use crate::error::Result;
use crate::expr::{Expr, MetadataContext, Reducer, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// Current document binding inside a rendering scope.
pub const ENTRY_KEY: &str = "entry";

fn target_path(value: &Value) -> Option<PathEntry> {
    match value {
        Value::Entry(Entry::Path(path)) => Some(path.clone()),
        Value::Entry(Entry::Markdown(entry)) => Some(entry.path().clone()),
        Value::Entry(Entry::Iterator(iterator)) => target_path(iterator.value()),
        Value::Str(text) => Some(PathEntry::parse(text)),
        _ => None,
    }
}

/// `relative target`: link from the current document's `path` to `target`.
///
/// URLs pass through unchanged; outside a document the site root is the base.
pub(super) async fn relative(
    args: Vec<Expr>,
    context: MetadataContext,
    reducer: Reducer,
) -> Result<Expr> {
    let Some(arg) = args.first() else {
        return Ok(Expr::value(""));
    };
    let value = reducer.reduce(arg, &context).await?;
    if let Value::Str(text) = &value
        && text.contains("://")
    {
        return Ok(Expr::value(text.as_str()));
    }
    let Some(target) = target_path(&value) else {
        return Ok(Expr::Value(value));
    };

    let from = match context.lookup("path") {
        Some(_) => target_path(&reducer.reduce(&Expr::var("path"), &context).await?),
        None => None,
    }
    .unwrap_or_else(|| PathEntry::parse("index.html"));

    Ok(Expr::value(PathEntry::relative(&from, &target)))
}

/// `lookup name`: resolve a name computed at render time.
pub(super) async fn lookup(
    args: Vec<Expr>,
    context: MetadataContext,
    reducer: Reducer,
) -> Result<Expr> {
    let Some(arg) = args.first() else {
        return Ok(Expr::Value(Value::Null));
    };
    let name = reducer.reduce_to_string(arg, &context).await?;
    Ok(Expr::Variable(name))
}

fn collect_entries(node: &Arc<CategoryEntry>, out: &mut Vec<Arc<MarkdownEntry>>) {
    out.extend(node.entries().iter().cloned());
    for child in node.children() {
        collect_entries(child, out);
    }
}

/// Every aggregated document in ascending date order, undated last.
async fn timeline(context: &MetadataContext, reducer: &Reducer) -> Result<Vec<Arc<MarkdownEntry>>> {
    if context.lookup(ROOT_CATEGORY_KEY).is_none() {
        return Ok(Vec::new());
    }
    let Value::Entry(Entry::Category(root)) =
        reducer.reduce(&Expr::var(ROOT_CATEGORY_KEY), context).await?
    else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    collect_entries(&root, &mut entries);

    let mut dated = Vec::with_capacity(entries.len());
    for entry in entries {
        let date = entry.date(context, reducer).await?;
        dated.push((date, entry));
    }
    dated.sort_by(|(a, x), (b, y)| {
        let by_date = match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| x.markdown_path().cmp(y.markdown_path()))
    });
    Ok(dated.into_iter().map(|(_, entry)| entry).collect())
}

async fn current_entry(
    args: &[Expr],
    context: &MetadataContext,
    reducer: &Reducer,
) -> Result<Option<Arc<MarkdownEntry>>> {
    let value = match args.first() {
        Some(arg) => reducer.reduce(arg, context).await?,
        None if context.lookup(ENTRY_KEY).is_some() => {
            reducer.reduce(&Expr::var(ENTRY_KEY), context).await?
        }
        None => return Ok(None),
    };
    Ok(match value {
        Value::Entry(Entry::Markdown(entry)) => Some(entry),
        Value::Entry(Entry::Iterator(iterator)) => match iterator.value() {
            Value::Entry(Entry::Markdown(entry)) => Some(entry.clone()),
            _ => None,
        },
        _ => None,
    })
}

async fn neighbour(
    args: Vec<Expr>,
    context: MetadataContext,
    reducer: Reducer,
    step: isize,
) -> Result<Expr> {
    let Some(current) = current_entry(&args, &context, &reducer).await? else {
        return Ok(Expr::Value(Value::Null));
    };
    let timeline = timeline(&context, &reducer).await?;
    let found = timeline
        .iter()
        .position(|entry| entry.markdown_path() == current.markdown_path())
        .and_then(|index| index.checked_add_signed(step))
        .and_then(|index| timeline.get(index));
    Ok(Expr::Value(found.map_or(Value::Null, |entry| {
        Value::Entry(Entry::Markdown(entry.clone()))
    })))
}

/// `older [entry]`: the previous document by date.
pub(super) async fn older(args: Vec<Expr>, context: MetadataContext, reducer: Reducer) -> Result<Expr> {
    neighbour(args, context, reducer, -1).await
}

/// `newer [entry]`: the next document by date.
pub(super) async fn newer(args: Vec<Expr>, context: MetadataContext, reducer: Reducer) -> Result<Expr> {
    neighbour(args, context, reducer, 1).await
}
