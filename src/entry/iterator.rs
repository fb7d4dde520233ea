use crate::error::Result;
use crate::expr::{MetadataContext, Reducer, Value};

/// One pass of a `{foreach}` loop.
///
/// `index` and `count` describe the pass; any other property is forwarded
/// to the wrapped item.
#[derive(Debug, Clone, PartialEq)]
pub struct IteratorEntry {
    index: i64,
    count: i64,
    value: Value,
}

impl IteratorEntry {
    pub fn new(index: i64, count: i64, value: Value) -> Self {
        Self {
            index,
            count,
            value,
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub(super) async fn property(
        &self,
        name: &str,
        context: &MetadataContext,
        reducer: &Reducer,
    ) -> Result<Option<Value>> {
        match name {
            "index" => Ok(Some(Value::Int(self.index))),
            "count" => Ok(Some(Value::Int(self.count))),
            "item" => Ok(Some(self.value.clone())),
            _ => match &self.value {
                Value::Entry(entry) => entry.get_property(name, context, reducer).await,
                _ => Ok(None),
            },
        }
    }
}
