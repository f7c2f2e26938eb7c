//! One-shot tokens that let exactly one converter handle each part of a
//! change.

use crate::model::{NodeId, TextProxy};
use crate::view::ViewId;
use std::collections::HashMap;
use std::hash::Hash;

/// Typed conversion event, in place of "insert:paragraph"-style strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Insert { name: String },
    Attribute { key: String, name: String },
    Remove { name: String },
}

impl ChangeEvent {
    pub fn name(&self) -> &str {
        match self {
            ChangeEvent::Insert { name }
            | ChangeEvent::Attribute { name, .. }
            | ChangeEvent::Remove { name } => name,
        }
    }
}

/// Model item a downcast token refers to. Text is identified by its
/// location since text nodes have no stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConsumableItem {
    Element(NodeId),
    Text {
        parent: NodeId,
        start: usize,
        end: usize,
    },
}

impl From<&TextProxy> for ConsumableItem {
    fn from(proxy: &TextProxy) -> Self {
        ConsumableItem::Text {
            parent: proxy.parent,
            start: proxy.start,
            end: proxy.end(),
        }
    }
}

/// Part of a view element an upcast converter can claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewMatchPart {
    Name,
    Attribute(String),
    Class(String),
    Style(String),
}

pub type DowncastKey = (ConsumableItem, ChangeEvent);
pub type UpcastKey = (ViewId, ViewMatchPart);

#[derive(Debug, Clone)]
pub struct Consumable<K: Eq + Hash> {
    items: HashMap<K, bool>,
}

impl<K: Eq + Hash> Default for Consumable<K> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Consumable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key` consumable. Re-adding a consumed key leaves it consumed.
    pub fn add(&mut self, key: K) {
        self.items.entry(key).or_insert(true);
    }

    /// `None` if never added, otherwise whether it can still be consumed.
    pub fn test(&self, key: &K) -> Option<bool> {
        self.items.get(key).copied()
    }

    /// `true` the first time, `false` afterwards or if never added.
    pub fn consume(&mut self, key: &K) -> bool {
        match self.items.get_mut(key) {
            Some(available) if *available => {
                *available = false;
                true
            }
            _ => false,
        }
    }

    /// Makes a consumed key available again. `None` if never added,
    /// `Some(false)` if it was not consumed.
    pub fn revert(&mut self, key: &K) -> Option<bool> {
        let available = self.items.get_mut(key)?;
        if *available {
            return Some(false);
        }
        *available = true;
        Some(true)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DowncastKey {
        (
            ConsumableItem::Element(NodeId(4)),
            ChangeEvent::Insert {
                name: "paragraph".into(),
            },
        )
    }

    #[test]
    fn test_consume_is_one_shot() {
        let mut consumable = Consumable::new();
        consumable.add(key());

        assert_eq!(consumable.test(&key()), Some(true));
        assert!(consumable.consume(&key()));
        assert!(!consumable.consume(&key()));
        assert_eq!(consumable.test(&key()), Some(false));
    }

    #[test]
    fn test_unknown_key() {
        let mut consumable: Consumable<DowncastKey> = Consumable::new();
        assert_eq!(consumable.test(&key()), None);
        assert!(!consumable.consume(&key()));
        assert_eq!(consumable.revert(&key()), None);
    }

    #[test]
    fn test_revert() {
        let mut consumable = Consumable::new();
        consumable.add(key());
        assert_eq!(consumable.revert(&key()), Some(false));
        consumable.consume(&key());
        assert_eq!(consumable.revert(&key()), Some(true));
        assert!(consumable.consume(&key()));
    }

    #[test]
    fn test_readding_does_not_reset() {
        let mut consumable = Consumable::new();
        consumable.add(key());
        consumable.consume(&key());
        consumable.add(key());
        assert_eq!(consumable.test(&key()), Some(false));
    }
}
