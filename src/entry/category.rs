//! Category tree nodes and the unresolved chains headers produce.

use super::{Entry, MarkdownEntry, ROOT_CATEGORY_KEY};
use crate::error::Result;
use crate::expr::{Expr, MetadataContext, Reducer, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Name of the synthetic root node.
pub const ROOT_CATEGORY_NAME: &str = "(root)";

/// A node of the aggregated category tree.
///
/// Children own their subtrees; the parent link is weak so the tree has
/// no reference cycles.
#[derive(Debug)]
pub struct CategoryEntry {
    name: String,
    parent: Weak<CategoryEntry>,
    children: BTreeMap<String, Arc<CategoryEntry>>,
    entries: Vec<Arc<MarkdownEntry>>,
}

impl CategoryEntry {
    /// Build a node whose children need a link back to it.
    pub(crate) fn new_cyclic(
        name: String,
        parent: Weak<CategoryEntry>,
        entries: Vec<Arc<MarkdownEntry>>,
        children: impl FnOnce(&Weak<CategoryEntry>) -> BTreeMap<String, Arc<CategoryEntry>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            name,
            parent,
            children: children(me),
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Arc<CategoryEntry>> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    /// Children, ordered by name.
    pub fn children(&self) -> impl Iterator<Item = &Arc<CategoryEntry>> {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<CategoryEntry>> {
        self.children.get(name)
    }

    pub fn entries(&self) -> &[Arc<MarkdownEntry>] {
        &self.entries
    }

    /// Names from the top-level category down to this one; the root is
    /// not included.
    pub fn path(&self) -> Vec<String> {
        let mut path = Vec::new();
        if !self.is_root() {
            path.push(self.name.clone());
        }
        let mut current = self.parent();
        while let Some(node) = current {
            if !node.is_root() {
                path.push(node.name.clone());
            }
            current = node.parent();
        }
        path.reverse();
        path
    }

    /// Nodes from the top-level category down to `node` itself.
    pub fn breadcrumbs(node: &Arc<CategoryEntry>) -> Vec<Arc<CategoryEntry>> {
        let mut crumbs = Vec::new();
        let mut current = Some(node.clone());
        while let Some(node) = current {
            current = node.parent();
            if current.is_some() {
                crumbs.push(node);
            }
        }
        crumbs.reverse();
        crumbs
    }

    /// Walk `path` down from `root`.
    pub fn find(root: &Arc<CategoryEntry>, path: &[String]) -> Option<Arc<CategoryEntry>> {
        path.iter()
            .try_fold(root.clone(), |node, name| node.child(name).cloned())
    }

    pub(super) fn property(self: &Arc<Self>, name: &str) -> Option<Value> {
        Some(match name {
            "name" => Value::from(self.name.as_str()),
            "children" => Value::List(
                self.children()
                    .map(|child| Value::Entry(Entry::Category(child.clone())))
                    .collect(),
            ),
            "entries" => Value::List(
                self.entries
                    .iter()
                    .map(|entry| Value::Entry(Entry::Markdown(entry.clone())))
                    .collect(),
            ),
            "parent" => Value::Entry(Entry::Category(self.parent()?)),
            "breadcrumbs" => Value::List(
                Self::breadcrumbs(self)
                    .into_iter()
                    .map(|node| Value::Entry(Entry::Category(node)))
                    .collect(),
            ),
            _ => return None,
        })
    }
}

/// A `category:` header chain, resolved on demand via `rootCategory`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialCategoryEntry {
    name: String,
    parent: Option<Arc<PartialCategoryEntry>>,
}

impl PartialCategoryEntry {
    pub fn new(name: String, parent: Option<Arc<PartialCategoryEntry>>) -> Self {
        Self { name, parent }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<PartialCategoryEntry>> {
        self.parent.as_ref()
    }

    /// Names from the top of the chain down to this one.
    pub fn path(&self) -> Vec<String> {
        let mut path = vec![self.name.clone()];
        let mut current = self.parent.as_deref();
        while let Some(node) = current {
            path.push(node.name.clone());
            current = node.parent.as_deref();
        }
        path.reverse();
        path
    }

    /// The aggregated node this chain names, if any.
    pub async fn resolve(
        &self,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Arc<CategoryEntry>>> {
        if context.lookup(ROOT_CATEGORY_KEY).is_none() {
            return Ok(None);
        }
        Ok(
            match reducer.reduce(&Expr::var(ROOT_CATEGORY_KEY), context).await? {
                Value::Entry(Entry::Category(root)) => CategoryEntry::find(&root, &self.path()),
                _ => None,
            },
        )
    }

    pub(super) async fn property(
        &self,
        name: &str,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Value>> {
        if let Some(category) = self.resolve(context, reducer).await? {
            return Ok(category.property(name));
        }
        Ok(match name {
            "name" => Some(Value::from(self.name.as_str())),
            "parent" => self
                .parent
                .clone()
                .map(|parent| Value::Entry(Entry::PartialCategory(parent))),
            "breadcrumbs" => {
                let mut crumbs = Vec::new();
                let mut current = Some(Arc::new(self.clone()));
                while let Some(node) = current {
                    current = node.parent.clone();
                    crumbs.push(Value::Entry(Entry::PartialCategory(node)));
                }
                crumbs.reverse();
                Some(Value::List(crumbs))
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Arc<CategoryEntry> {
        CategoryEntry::new_cyclic(ROOT_CATEGORY_NAME.into(), Weak::new(), Vec::new(), |root| {
            let a = CategoryEntry::new_cyclic("a".into(), root.clone(), Vec::new(), |a| {
                ["b", "c"]
                    .into_iter()
                    .map(|name| {
                        let node =
                            CategoryEntry::new_cyclic(name.into(), a.clone(), Vec::new(), |_| {
                                BTreeMap::new()
                            });
                        (name.to_owned(), node)
                    })
                    .collect()
            });
            BTreeMap::from([("a".to_owned(), a)])
        })
    }

    #[test]
    fn test_tree_links() {
        let root = tree();
        assert!(root.is_root());
        let c = CategoryEntry::find(&root, &["a".into(), "c".into()]).unwrap();
        assert_eq!(c.name(), "c");
        assert_eq!(c.path(), vec!["a", "c"]);
        assert_eq!(c.parent().unwrap().name(), "a");
        assert!(Arc::ptr_eq(&c.parent().unwrap().parent().unwrap(), &root));
        assert!(CategoryEntry::find(&root, &["x".into()]).is_none());
        assert!(root.path().is_empty());
    }

    #[test]
    fn test_breadcrumbs() {
        let root = tree();
        let b = CategoryEntry::find(&root, &["a".into(), "b".into()]).unwrap();
        let names: Vec<_> = CategoryEntry::breadcrumbs(&b)
            .iter()
            .map(|node| node.name().to_owned())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(CategoryEntry::breadcrumbs(&root).is_empty());
    }

    #[test]
    fn test_children_sorted() {
        let root = tree();
        let Some(Value::List(children)) = root.child("a").unwrap().property("children") else {
            panic!("expected children list");
        };
        let names: Vec<_> = children
            .iter()
            .map(|child| match child {
                Value::Entry(Entry::Category(node)) => node.name().to_owned(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(root.property("parent"), None);
    }

    #[tokio::test]
    async fn test_partial_resolves_through_root() {
        let context = MetadataContext::new();
        let reducer = Reducer::default();
        let leaf = PartialCategoryEntry::new(
            "b".into(),
            Some(Arc::new(PartialCategoryEntry::new("a".into(), None))),
        );

        let name = leaf.property("name", &context, &reducer).await.unwrap();
        assert_eq!(name, Some(Value::from("b")));
        assert!(leaf.resolve(&context, &reducer).await.unwrap().is_none());

        context.set(ROOT_CATEGORY_KEY, Value::Entry(Entry::Category(tree())));
        let resolved = leaf.resolve(&context, &reducer).await.unwrap().unwrap();
        assert_eq!(resolved.path(), vec!["a", "b"]);
        let Some(Value::List(crumbs)) = leaf.property("breadcrumbs", &context, &reducer).await.unwrap()
        else {
            panic!("expected breadcrumbs");
        };
        assert_eq!(crumbs.len(), 2);
    }
}
