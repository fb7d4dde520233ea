//! The evaluator: [`Expr`] + [`MetadataContext`] → [`Value`].

use super::{Callable, Expr, FormatProvider, MetadataContext, Value, format_value};
use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tokio_util::sync::CancellationToken;

/// Reduces expressions against a context.
///
/// Cheap to clone; every clone observes the same cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Reducer {
    cancel: CancellationToken,
}

impl Reducer {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with [`Error::Canceled`] once the build has been canceled.
    pub fn check_canceled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Reduce `expr` to a runtime value.
    ///
    /// - `Value(v)` → `v`
    /// - `Variable("a.b.c")` → lookup `a`, then property `b`, then `c`;
    ///   an unbound `a` yields the string `"a"`, and an unknown property
    ///   stops the chain at the last resolved value
    /// - `Array(items)` → list, in source order
    /// - `Apply(f, args)` → call the callable `f` reduces to
    pub fn reduce<'a>(
        &'a self,
        expr: &'a Expr,
        context: &'a MetadataContext,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            match expr {
                Expr::Value(value) => Ok(value.clone()),
                Expr::Variable(name) => self.reduce_variable(name, context).await,
                Expr::Array(items) => Ok(Value::List(self.reduce_all(items, context).await?)),
                Expr::Apply(function, args) => self.apply(function, args, context).await,
            }
        }
        .boxed()
    }

    /// Reduce every expression concurrently, keeping source order.
    pub async fn reduce_all(
        &self,
        exprs: &[Expr],
        context: &MetadataContext,
    ) -> Result<Vec<Value>> {
        try_join_all(exprs.iter().map(|expr| self.reduce(expr, context))).await
    }

    /// Reduce and format for text output.
    pub async fn reduce_to_string(&self, expr: &Expr, context: &MetadataContext) -> Result<String> {
        let value = self.reduce(expr, context).await?;
        format_value(&value, context, self).await
    }

    async fn reduce_variable(&self, name: &str, context: &MetadataContext) -> Result<Value> {
        let mut segments = name.split('.');
        let head = segments.next().unwrap_or_default();

        let Some(mut value) = self.resolve_name(head, context).await? else {
            return Ok(Value::Str(head.to_owned()));
        };

        for segment in segments {
            let Value::Entry(entry) = &value else {
                break;
            };
            let next = entry.get_property(segment, context, self).await?;
            match next {
                Some(next) => value = next,
                None => break,
            }
        }
        Ok(value)
    }

    /// Lookup `name` and reduce its binding.
    ///
    /// A binding of the form `name: name` refers to the enclosing scope.
    async fn resolve_name(&self, name: &str, context: &MetadataContext) -> Result<Option<Value>> {
        let mut scope = context.clone();
        loop {
            let Some((expr, holder)) = scope.lookup_scoped(name) else {
                return Ok(None);
            };
            if expr.as_variable() == Some(name) {
                match holder.parent() {
                    Some(parent) => {
                        scope = parent.clone();
                        continue;
                    }
                    None => return Ok(None),
                }
            }
            return self.reduce(&expr, context).await.map(Some);
        }
    }

    async fn apply(
        &self,
        function: &Expr,
        args: &[Expr],
        context: &MetadataContext,
    ) -> Result<Value> {
        let callee = self.reduce(function, context).await?;
        let Value::Callable(callable) = callee else {
            return Err(Error::evaluation(format!(
                "`{function}` is a {}, not a function",
                callee.type_name()
            )));
        };
        self.check_canceled()?;

        match callable {
            Callable::Async { function, .. } => {
                let result = function(args.to_vec(), context.clone(), self.clone()).await?;
                self.reduce(&result, context).await
            }
            Callable::Simple { function, .. } => {
                let values = self.reduce_all(args, context).await?;
                let provider = FormatProvider::resolve(context, self).await?;
                let lookup = |name: &str| match context.lookup(name) {
                    Some(Expr::Value(value)) => Some(value),
                    _ => None,
                };
                function(&values, &lookup, &provider)
            }
            Callable::Delegate { function, .. } => {
                let values = self.reduce_all(args, context).await?;
                function(&values)
            }
        }
    }
}
