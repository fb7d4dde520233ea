//! Chained metadata scopes.
//!
//! ```text
//! root (built-ins, site defaults)
//!   └── document (header fields, path, contentBody)
//!         └── loop pass (item / item1 / item2 ...)
//! ```
//!
//! A child only ever writes into its own map, so a spawned scope can shadow
//! a parent binding but never change it.

use super::Expr;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{fmt, sync::Arc};

/// Cheaply clonable handle to one scope in the chain.
#[derive(Clone, Default)]
pub struct MetadataContext {
    scope: Arc<Scope>,
}

#[derive(Default)]
struct Scope {
    values: RwLock<FxHashMap<String, Expr>>,
    parent: Option<MetadataContext>,
}

impl MetadataContext {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope that falls back to `self` for unknown names.
    pub fn spawn(&self) -> Self {
        Self {
            scope: Arc::new(Scope {
                values: RwLock::new(FxHashMap::default()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Bind `name` in this scope only.
    pub fn set(&self, name: impl Into<String>, expr: impl Into<Expr>) {
        self.scope.values.write().insert(name.into(), expr.into());
    }

    /// Find `name` here or in the nearest ancestor that binds it.
    pub fn lookup(&self, name: &str) -> Option<Expr> {
        self.lookup_scoped(name).map(|(expr, _)| expr)
    }

    /// Like [`lookup`](Self::lookup), also returning the scope holding the binding.
    pub fn lookup_scoped(&self, name: &str) -> Option<(Expr, MetadataContext)> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(expr) = context.scope.values.read().get(name) {
                return Some((expr.clone(), context.clone()));
            }
            current = context.scope.parent.as_ref();
        }
        None
    }

    pub fn parent(&self) -> Option<&MetadataContext> {
        self.scope.parent.as_ref()
    }

    /// Whether `name` is bound directly in this scope.
    pub fn contains_own(&self, name: &str) -> bool {
        self.scope.values.read().contains_key(name)
    }

    /// Depth of this scope below the root (root = 0).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.scope.parent.as_ref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.scope.parent.as_ref();
        }
        depth
    }
}

impl fmt::Debug for MetadataContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.scope.values.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("MetadataContext")
            .field("names", &names)
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_to_parent() {
        let root = MetadataContext::new();
        root.set("lang", Expr::value("en"));
        let child = root.spawn();
        assert_eq!(child.lookup("lang"), Some(Expr::value("en")));
        assert_eq!(child.lookup("missing"), None);
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_child_shadows_without_mutating_parent() {
        let root = MetadataContext::new();
        root.set("title", Expr::value("root"));
        let child = root.spawn();
        child.set("title", Expr::value("child"));

        assert_eq!(child.lookup("title"), Some(Expr::value("child")));
        assert_eq!(root.lookup("title"), Some(Expr::value("root")));
        let (_, holder) = child.lookup_scoped("title").unwrap();
        assert_eq!(
            holder.parent().and_then(|p| p.lookup("title")),
            Some(Expr::value("root"))
        );
        assert!(child.contains_own("title"));
        assert!(!root.spawn().contains_own("title"));
    }

    #[test]
    fn test_sibling_scopes_are_isolated() {
        let root = MetadataContext::new();
        let a = root.spawn();
        let b = root.spawn();
        a.set("item", Expr::value(1));
        assert_eq!(b.lookup("item"), None);
    }
}
