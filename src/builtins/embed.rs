//! `card` and `embed` link previews.
//!
//! No remote provider is consulted; both render the fallback block, a
//! plain anchor that keeps the page usable offline.

use crate::error::Result;
use crate::expr::{Expr, MetadataContext, Reducer};

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn fallback_block(class: &str, url: &str) -> String {
    let url = escape_html(url);
    format!(
        "<div class=\"{class}\"><a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{url}</a></div>"
    )
}

async fn render(
    class: &'static str,
    args: Vec<Expr>,
    context: MetadataContext,
    reducer: Reducer,
) -> Result<Expr> {
    let Some(arg) = args.first() else {
        return Ok(Expr::value(""));
    };
    let url = reducer.reduce_to_string(arg, &context).await?;
    if url.trim().is_empty() {
        return Ok(Expr::value(""));
    }
    Ok(Expr::value(fallback_block(class, url.trim())))
}

/// `card url`
pub(super) async fn card(args: Vec<Expr>, context: MetadataContext, reducer: Reducer) -> Result<Expr> {
    render("card-fallback", args, context, reducer).await
}

/// `embed url`
pub(super) async fn embed(args: Vec<Expr>, context: MetadataContext, reducer: Reducer) -> Result<Expr> {
    render("embed-fallback", args, context, reducer).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_block_escapes() {
        assert_eq!(
            fallback_block("card-fallback", "https://x.test/?a=1&b=\"2\""),
            "<div class=\"card-fallback\"><a href=\"https://x.test/?a=1&amp;b=&quot;2&quot;\" \
             target=\"_blank\" rel=\"noopener noreferrer\">https://x.test/?a=1&amp;b=&quot;2&quot;</a></div>"
        );
    }
}
