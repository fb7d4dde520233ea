//! Callable values bound in a [`MetadataContext`].
//!
//! The evaluation shape is fixed when the binding is registered, so the
//! reducer dispatches on an enum instead of probing types at call time.

use super::{Expr, FormatProvider, MetadataContext, Reducer, Value};
use crate::error::Result;
use futures::future::BoxFuture;
use std::{fmt, future::Future, sync::Arc};

/// Resolves a name to an already literal value in the caller's context.
pub type Lookup<'a> = &'a (dyn Fn(&str) -> Option<Value> + Send + Sync);

type AsyncFunction =
    Arc<dyn Fn(Vec<Expr>, MetadataContext, Reducer) -> BoxFuture<'static, Result<Expr>> + Send + Sync>;
type SimpleFunction = Arc<dyn Fn(&[Value], Lookup<'_>, &FormatProvider) -> Result<Value> + Send + Sync>;
type DelegateFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A function value.
#[derive(Clone)]
pub enum Callable {
    /// Receives unevaluated arguments, the caller's context and the reducer.
    /// The returned expression is reduced again.
    Async {
        name: &'static str,
        function: AsyncFunction,
    },
    /// Receives reduced arguments, a name lookup and the caller's locale.
    Simple {
        name: &'static str,
        function: SimpleFunction,
    },
    /// Receives reduced arguments only.
    Delegate {
        name: &'static str,
        function: DelegateFunction,
    },
}

impl Callable {
    pub fn asynchronous<F, Fut>(name: &'static str, function: F) -> Self
    where
        F: Fn(Vec<Expr>, MetadataContext, Reducer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Expr>> + Send + 'static,
    {
        Self::Async {
            name,
            function: Arc::new(move |args, context, reducer| {
                Box::pin(function(args, context, reducer))
            }),
        }
    }

    pub fn simple<F>(name: &'static str, function: F) -> Self
    where
        F: Fn(&[Value], Lookup<'_>, &FormatProvider) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Simple {
            name,
            function: Arc::new(function),
        }
    }

    pub fn delegate<F>(name: &'static str, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Delegate {
            name,
            function: Arc::new(function),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Async { name, .. } | Self::Simple { name, .. } | Self::Delegate { name, .. } => {
                name
            }
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Async { function: a, .. }, Self::Async { function: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Simple { function: a, .. }, Self::Simple { function: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Delegate { function: a, .. }, Self::Delegate { function: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name())
    }
}
