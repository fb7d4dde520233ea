//! Text-tree templates shared by layouts and markdown bodies.
//!
//! ```text
//! "<ul>{foreach:tags}<li>{item}</li>{/}</ul>"
//!     │
//!     ├── Template::parse()     text → Vec<Node>
//!     └── Template::render()    nodes + context → String
//! ```
//!
//! Syntax:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{expr}` | substitute the formatted value of `expr` |
//! | `{{`, `}}` | literal `{`, `}` |
//! | `{foreach src}`, `{foreach:src name}` | repeat until the matching terminator |
//! | `{end}`, `{/}` | close the innermost `foreach` |

mod code;

pub use code::CodeFragments;

use crate::entry::{Entry, IteratorEntry};
use crate::error::{Error, Result};
use crate::expr::{Expr, ListKind, MetadataContext, Reducer, Value, parse};
use futures::future::{BoxFuture, FutureExt};
use std::mem;
use std::sync::Arc;

/// Binding name for loop items when none is given.
pub const DEFAULT_ITEM_NAME: &str = "item";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(String),
    Expression(Expr),
    /// Iteration arguments (source, optional binding name) and body.
    ForEach(Vec<Expr>, Vec<Node>),
}

/// A parsed layout or markdown body. Pure function of its source text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Node>,
    literal: String,
    /// Saved (iteration args, parent nodes) per open `foreach`.
    open: Vec<(Vec<Expr>, Vec<Node>)>,
}

impl TreeBuilder {
    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.nodes.push(Node::Literal(mem::take(&mut self.literal)));
        }
    }

    fn push_expression(&mut self, expr: Expr, line: usize) -> Result<()> {
        self.flush();
        match expr {
            Expr::Apply(function, args) if function.as_variable() == Some("foreach") => {
                let parent = mem::take(&mut self.nodes);
                self.open.push((args, parent));
            }
            Expr::Variable(name) if name == "foreach" => {
                return Err(Error::format(format!(
                    "line {line}: `foreach` needs a source"
                )));
            }
            Expr::Variable(name) if name == "end" => {
                let Some((args, parent)) = self.open.pop() else {
                    return Err(Error::format(format!(
                        "line {line}: `end` without matching `foreach`"
                    )));
                };
                let body = mem::replace(&mut self.nodes, parent);
                self.nodes.push(Node::ForEach(args, body));
            }
            expr => self.nodes.push(Node::Expression(expr)),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Node>> {
        self.flush();
        if !self.open.is_empty() {
            return Err(Error::format(format!(
                "{} unclosed `foreach` block(s)",
                self.open.len()
            )));
        }
        Ok(self.nodes)
    }
}

/// Offset of the `}` closing an expression; braces inside quotes are text.
fn closing_brace(text: &str) -> Option<usize> {
    let mut quote = None;
    for (offset, c) in text.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '}' => return Some(offset),
            None => {}
        }
    }
    None
}

/// Normalize block shorthands before expression parsing.
fn expression_text(inner: &str) -> String {
    let trimmed = inner.trim();
    if trimmed == "/" {
        return "end".to_owned();
    }
    match trimmed.strip_prefix("foreach:") {
        Some(rest) => format!("foreach {rest}"),
        None => trimmed.to_owned(),
    }
}

impl Template {
    /// Parse a layout; braces are always syntax.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, |_, _| false)
    }

    /// Parse a markdown body, leaving braces inside code untouched.
    pub fn parse_markdown(text: &str) -> Result<Self> {
        let fragments = CodeFragments::scan(text);
        Self::parse_with(text, |line, column| fragments.contains(line, column))
    }

    /// Parse with a caller-supplied `(line, byte column) -> inside code` predicate.
    pub fn parse_with(text: &str, is_inside_code: impl Fn(usize, usize) -> bool) -> Result<Self> {
        let mut builder = TreeBuilder::default();

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let bytes = line.as_bytes();
            let mut start = 0;
            let mut i = 0;
            while i < bytes.len() {
                let brace = bytes[i];
                if (brace != b'{' && brace != b'}') || is_inside_code(index, i) {
                    i += 1;
                    continue;
                }
                builder.literal.push_str(&line[start..i]);

                if bytes.get(i + 1) == Some(&brace) {
                    builder.literal.push(brace as char);
                    i += 2;
                } else if brace == b'}' {
                    builder.literal.push('}');
                    i += 1;
                } else {
                    let Some(len) = closing_brace(&line[i + 1..]) else {
                        return Err(Error::format(format!(
                            "line {}: unterminated `{{`",
                            index + 1
                        )));
                    };
                    let inner = &line[i + 1..i + 1 + len];
                    let expr = parse(&expression_text(inner), ListKind::List).map_err(|err| {
                        match err {
                            Error::Format(message) => {
                                Error::format(format!("line {}: {message}", index + 1))
                            }
                            other => other,
                        }
                    })?;
                    builder.push_expression(expr, index + 1)?;
                    i += len + 2;
                }
                start = i;
            }
            builder.literal.push_str(&line[start..]);
        }

        Ok(Self {
            nodes: builder.finish()?,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub async fn render(&self, context: &MetadataContext, reducer: &Reducer) -> Result<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, context, reducer, &mut out).await?;
        Ok(out)
    }
}

fn render_nodes<'a>(
    nodes: &'a [Node],
    context: &'a MetadataContext,
    reducer: &'a Reducer,
    out: &'a mut String,
) -> BoxFuture<'a, Result<()>> {
    async move {
        for node in nodes {
            match node {
                Node::Literal(text) => out.push_str(text),
                Node::Expression(expr) => {
                    out.push_str(&reducer.reduce_to_string(expr, context).await?);
                }
                Node::ForEach(args, body) => {
                    render_loop(args, body, context, reducer, out).await?;
                }
            }
        }
        Ok(())
    }
    .boxed()
}

async fn render_loop(
    args: &[Expr],
    body: &[Node],
    context: &MetadataContext,
    reducer: &Reducer,
    out: &mut String,
) -> Result<()> {
    let Some(source) = args.first() else {
        return Ok(());
    };
    let items = match reducer.reduce(source, context).await? {
        Value::List(items) => items,
        _ => return Ok(()),
    };
    let name = match args.get(1) {
        Some(Expr::Variable(name)) => name.clone(),
        Some(Expr::Value(Value::Str(name))) => name.clone(),
        _ => DEFAULT_ITEM_NAME.to_owned(),
    };

    let count = items.len() as i64;
    for (index, item) in items.into_iter().enumerate() {
        reducer.check_canceled()?;
        let scope = context.spawn();
        let entry = IteratorEntry::new(index as i64, count, item);
        scope.set(name.clone(), Value::Entry(Entry::Iterator(Arc::new(entry))));
        render_nodes(body, &scope, reducer, out).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(text: &str, context: &MetadataContext) -> String {
        Template::parse(text)
            .unwrap()
            .render(context, &Reducer::default())
            .await
            .unwrap()
    }

    fn titled() -> MetadataContext {
        let context = MetadataContext::new();
        context.set("title", Expr::value("hoehoe"));
        context
    }

    #[tokio::test]
    async fn test_substitution() {
        assert_eq!(render("<h1>{title}</h1>", &titled()).await, "<h1>hoehoe</h1>");
    }

    #[tokio::test]
    async fn test_brace_escapes() {
        let context = titled();
        assert_eq!(render("{{{title}", &context).await, "{hoehoe");
        assert_eq!(render("{title}}}", &context).await, "hoehoe}");
        assert_eq!(render("{{}}", &context).await, "{}");
    }

    #[tokio::test]
    async fn test_quoted_braces() {
        let context = MetadataContext::new();
        assert_eq!(render("a{'}'}b{\"{x}\"}c", &context).await, "a}b{x}c");
        assert!(matches!(
            Template::parse("{'}"),
            Err(Error::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_nested_loops() {
        let context = MetadataContext::new();
        context.set(
            "author",
            Expr::Array(vec![Expr::value("a"), Expr::value("b")]),
        );
        context.set("tags", Expr::Array(vec![Expr::value("x"), Expr::value("y")]));
        let text = "{foreach:author item1}{foreach:tags item2}{item1}:{item2} [{item1.index}-{item2.index}]\n{/}{/}";
        assert_eq!(
            render(text, &context).await,
            "a:x [0-0]\na:y [0-1]\nb:x [1-0]\nb:y [1-1]\n"
        );
    }

    #[tokio::test]
    async fn test_loop_default_name_and_count() {
        let context = MetadataContext::new();
        context.set("xs", Expr::Array(vec![Expr::value(1), Expr::value(2)]));
        assert_eq!(
            render("{foreach xs}{item}/{item.count};{end}", &context).await,
            "1/2;2/2;"
        );
    }

    #[tokio::test]
    async fn test_loop_over_missing_source_is_empty() {
        let context = MetadataContext::new();
        context.set("n", Expr::value(3));
        assert_eq!(render("[{foreach nothing}x{/}]", &context).await, "[]");
        assert_eq!(render("[{foreach n}x{/}]", &context).await, "[]");
    }

    #[tokio::test]
    async fn test_loop_scope_does_not_leak() {
        let context = MetadataContext::new();
        context.set("xs", Expr::Array(vec![Expr::value(1)]));
        assert_eq!(render("{foreach xs}{item}{/}{item}", &context).await, "1item");
        assert!(context.lookup("item").is_none());
    }

    #[test]
    fn test_tree_shape() {
        let template = Template::parse("a{foreach xs}b{x}{/}c").unwrap();
        assert_eq!(
            template.nodes(),
            &[
                Node::Literal("a".into()),
                Node::ForEach(
                    vec![Expr::var("xs")],
                    vec![Node::Literal("b".into()), Node::Expression(Expr::var("x"))],
                ),
                Node::Literal("c".into()),
            ]
        );
    }

    #[test]
    fn test_format_errors() {
        assert!(matches!(Template::parse("a {b"), Err(Error::Format(_))));
        assert!(matches!(Template::parse("{end}"), Err(Error::Format(_))));
        assert!(matches!(Template::parse("{foreach xs}"), Err(Error::Format(_))));
        assert!(matches!(Template::parse("{'abc}"), Err(Error::Format(_))));
        assert!(matches!(Template::parse("a {b\n}"), Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn test_markdown_code_is_literal() {
        let text = "Hello {title} `{title}`\n```\n{title}\n```\n";
        let template = Template::parse_markdown(text).unwrap();
        let out = template.render(&titled(), &Reducer::default()).await.unwrap();
        assert_eq!(out, "Hello hoehoe `{title}`\n```\n{title}\n```\n");
    }
}
