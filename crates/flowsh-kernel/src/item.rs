//! Pipeline items and their provenance chain.
//!
//! Every item remembers the item it was derived from. The chain only ever
//! points backwards and items are immutable, so sharing it through `Arc` is
//! enough: no arena, no cycles. The tag stage marks links with a name and the
//! seek/combine stages walk the chain to find them again.

use std::fmt;
use std::sync::Arc;

use flowsh_types::Value;

use crate::error::StageFailure;

/// A value or an error, plus provenance. Cheap to clone.
#[derive(Clone)]
pub struct Item(Arc<Node>);

struct Node {
    kind: ItemKind,
    previous: Option<Item>,
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Value(Value),
    Error(ItemError),
}

/// The payload of an error item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemError {
    pub message: String,
    pub cause: StageFailure,
}

impl ItemError {
    pub fn new(message: impl Into<String>, cause: impl Into<StageFailure>) -> Self {
        Self {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// The error as seen by expressions: `{ message, cause }`.
    pub fn to_value(&self) -> Value {
        Value::object([
            ("message", Value::String(self.message.clone())),
            ("cause", Value::String(self.cause.to_string())),
        ])
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message, self.cause)
    }
}

impl Item {
    fn build(kind: ItemKind, previous: Option<&Item>, name: Option<String>) -> Self {
        Item(Arc::new(Node {
            kind,
            previous: previous.cloned(),
            name,
        }))
    }

    /// A fresh value with no provenance.
    pub fn value(value: Value) -> Self {
        Self::build(ItemKind::Value(value), None, None)
    }

    /// A value derived from `previous`.
    pub fn derived(value: Value, previous: &Item) -> Self {
        Self::build(ItemKind::Value(value), Some(previous), None)
    }

    /// An error item, optionally attached to the item that failed.
    pub fn failed(error: ItemError, previous: Option<&Item>) -> Self {
        Self::build(ItemKind::Error(error), previous, None)
    }

    pub fn kind(&self) -> &ItemKind {
        &self.0.kind
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.0.kind {
            ItemKind::Value(v) => Some(v),
            ItemKind::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ItemError> {
        match &self.0.kind {
            ItemKind::Error(e) => Some(e),
            ItemKind::Value(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.0.kind, ItemKind::Error(_))
    }

    pub fn previous(&self) -> Option<&Item> {
        self.0.previous.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Same variant and payload under a new name, derived from `self`.
    pub fn tagged(&self, name: &str) -> Item {
        Self::build(self.0.kind.clone(), Some(self), Some(name.to_string()))
    }

    /// The payload for values, the `{ message, cause }` object for errors.
    pub fn to_value(&self) -> Value {
        match &self.0.kind {
            ItemKind::Value(v) => v.clone(),
            ItemKind::Error(e) => e.to_value(),
        }
    }

    /// This item followed by its ancestors, newest first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// The most recent item in the chain, starting at `self`, tagged `name`.
    pub fn find_named(&self, name: &str) -> Option<&Item> {
        self.ancestors().find(|item| item.name() == Some(name))
    }

    /// What seek and combine report for `name`: the tagged payload, the error
    /// object when the tagged item is an error, or null when no such tag exists.
    pub fn lookup(&self, name: &str) -> Value {
        self.find_named(name).map(Item::to_value).unwrap_or(Value::Null)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Item");
        s.field("kind", &self.0.kind);
        if let Some(name) = &self.0.name {
            s.field("name", name);
        }
        s.field("depth", &self.ancestors().count()).finish()
    }
}

/// Iterator over a provenance chain.
pub struct Ancestors<'a> {
    next: Option<&'a Item>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Item;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.previous();
        Some(current)
    }
}

impl Drop for Node {
    // Long recursion loops build long chains; unlink them iteratively so
    // dropping the tail cannot overflow the stack.
    fn drop(&mut self) {
        let mut next = self.previous.take();
        while let Some(item) = next {
            match Arc::try_unwrap(item.0) {
                Ok(mut node) => next = node.previous.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsh_types::EvalError;

    fn boom() -> ItemError {
        ItemError::new("Failed to evaluate expression: x.y.z.", EvalError::Type("nope".into()))
    }

    #[test]
    fn test_tagged_links_back_to_original() {
        let original = Item::value(Value::Int(1));
        let tagged = original.tagged("first");

        assert_eq!(tagged.name(), Some("first"));
        assert_eq!(tagged.as_value(), Some(&Value::Int(1)));
        assert!(original.name().is_none());
        assert_eq!(tagged.previous().and_then(Item::as_value), Some(&Value::Int(1)));
    }

    #[test]
    fn test_find_named_walks_the_chain() {
        let a = Item::value(Value::Int(10)).tagged("a");
        let b = Item::derived(Value::Int(11), &a).tagged("b");
        let c = Item::derived(Value::Int(12), &b);

        assert_eq!(c.lookup("a"), Value::Int(10));
        assert_eq!(c.lookup("b"), Value::Int(11));
        assert_eq!(c.lookup("missing"), Value::Null);
    }

    #[test]
    fn test_find_named_prefers_most_recent_tag() {
        let first = Item::value(Value::Int(1)).tagged("n");
        let second = Item::derived(Value::Int(2), &first).tagged("n");
        let tail = Item::derived(Value::Int(3), &second);

        assert_eq!(tail.lookup("n"), Value::Int(2));
    }

    #[test]
    fn test_find_named_includes_self() {
        let item = Item::value(Value::from("me")).tagged("self");
        assert_eq!(item.lookup("self"), Value::from("me"));
    }

    #[test]
    fn test_tagged_error_stays_an_error() {
        let err = Item::failed(boom(), None).tagged("bad");
        assert!(err.is_error());
        assert_eq!(err.name(), Some("bad"));

        let next = Item::derived(Value::Null, &err);
        let found = next.lookup("bad");
        let obj = found.as_object().expect("error object");
        assert_eq!(
            obj["message"],
            Value::from("Failed to evaluate expression: x.y.z.")
        );
        assert_eq!(obj["cause"], Value::from("type error: nope"));
    }

    #[test]
    fn test_long_chain_drops_without_overflow() {
        let mut item = Item::value(Value::Int(0));
        for i in 1..200_000 {
            item = Item::derived(Value::Int(i), &item);
        }
        assert_eq!(item.as_value(), Some(&Value::Int(199_999)));
        drop(item);
    }
}
