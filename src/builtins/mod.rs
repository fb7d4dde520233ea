//! Root context bindings.
//!
//! | Name | Shape | Notes |
//! |------|-------|-------|
//! | `add` `sub` `mul` `div` `mod` | delegate | left fold, integers stay integral |
//! | `format` | simple | strftime for dates, `0.00` for numbers |
//! | `relative` | async | link from the current `path` |
//! | `lookup` | async | resolve a computed name |
//! | `older` `newer` | async | date-ordered neighbours |
//! | `card` `embed` | async | fallback link blocks |
//!
//! Plain values (`generated`, `lang`, `timezone`, `siteTitle`, `author`,
//! `layout`, `tagList`, `rootCategory`) are bound by [`bind_site`] and
//! [`bind_aggregates`].

mod arith;
mod embed;
mod format;
mod site;

pub use site::ENTRY_KEY;

use crate::aggregate::{TagIndex, tag_list};
use crate::entry::{CategoryEntry, Entry, ROOT_CATEGORY_KEY, TAG_LIST_KEY};
use crate::expr::{Callable, Expr, MetadataContext, Value};
use arith::Op;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Layout used when a document names none.
pub const DEFAULT_LAYOUT: &str = "page";

/// Site-wide values bound into the root context.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub title: String,
    pub author: String,
    pub lang: String,
    pub timezone: FixedOffset,
    pub generated: DateTime<FixedOffset>,
}

/// Bind every built-in function plus the default `layout`.
pub fn register(context: &MetadataContext) {
    for op in Op::ALL {
        context.set(
            op.name(),
            Value::Callable(Callable::delegate(op.name(), move |args| op.fold(args))),
        );
    }
    context.set("format", Value::Callable(Callable::simple("format", format::format)));

    let functions = [
        Callable::asynchronous("relative", site::relative),
        Callable::asynchronous("lookup", site::lookup),
        Callable::asynchronous("older", site::older),
        Callable::asynchronous("newer", site::newer),
        Callable::asynchronous("card", embed::card),
        Callable::asynchronous("embed", embed::embed),
    ];
    for function in functions {
        context.set(function.name(), Value::Callable(function));
    }

    context.set("layout", Expr::value(DEFAULT_LAYOUT));
}

pub fn bind_site(context: &MetadataContext, site: &SiteInfo) {
    context.set("siteTitle", Expr::value(site.title.as_str()));
    context.set("author", Expr::value(site.author.as_str()));
    context.set("lang", Expr::value(site.lang.as_str()));
    context.set("timezone", Expr::value(site.timezone.to_string()));
    context.set(
        "generated",
        Value::Date(site.generated.with_timezone(&site.timezone)),
    );
}

pub fn bind_aggregates(context: &MetadataContext, tags: &TagIndex, root: Arc<CategoryEntry>) {
    context.set(TAG_LIST_KEY, tag_list(tags));
    context.set(ROOT_CATEGORY_KEY, Value::Entry(Entry::Category(root)));
}
