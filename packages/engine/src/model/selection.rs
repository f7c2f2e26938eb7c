//! Document selection.
//!
//! The selection holds a single range plus a direction, and a set of
//! attributes. Attributes are normally inferred from the text around the
//! selection; keys set or removed through the writer are "explicit" and keep
//! their state until the selection is moved directly.

use super::{Attributes, Position, Range};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub(crate) range: Range,
    pub(crate) backward: bool,
    pub(crate) attributes: Attributes,
    pub(crate) explicit_keys: BTreeSet<String>,
}

impl Selection {
    pub fn new(position: Position) -> Self {
        Self {
            range: Range::collapsed(position),
            backward: false,
            attributes: Attributes::new(),
            explicit_keys: BTreeSet::new(),
        }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn anchor(&self) -> Position {
        if self.backward {
            self.range.end
        } else {
            self.range.start
        }
    }

    pub fn focus(&self) -> Position {
        if self.backward {
            self.range.start
        } else {
            self.range.end
        }
    }

    pub fn first_position(&self) -> Position {
        self.range.start
    }

    pub fn last_position(&self) -> Position {
        self.range.end
    }

    pub fn is_collapsed(&self) -> bool {
        self.range.is_collapsed()
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub(crate) fn set_explicit_attribute(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
        self.explicit_keys.insert(key.to_string());
    }

    pub(crate) fn remove_explicit_attribute(&mut self, key: &str) {
        self.attributes.remove(key);
        self.explicit_keys.insert(key.to_string());
    }

    /// Merge freshly inferred attributes with the explicit ones.
    pub(crate) fn apply_inferred(&mut self, inferred: Attributes, clear_explicit: bool) {
        if clear_explicit {
            self.explicit_keys.clear();
        }
        let mut attributes: Attributes = self
            .attributes
            .iter()
            .filter(|(key, _)| self.explicit_keys.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in inferred {
            if !self.explicit_keys.contains(&key) {
                attributes.insert(key, value);
            }
        }
        self.attributes = attributes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;
    use serde_json::json;

    fn inferred(key: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(key.to_string(), json!(true));
        attributes
    }

    #[test]
    fn test_explicit_removal_survives_inference() {
        let mut selection = Selection::new(Position::new(NodeId(0), 0));
        selection.apply_inferred(inferred("mention"), false);
        assert!(selection.has_attribute("mention"));

        selection.remove_explicit_attribute("mention");
        selection.apply_inferred(inferred("mention"), false);
        assert!(!selection.has_attribute("mention"));

        selection.apply_inferred(inferred("mention"), true);
        assert!(selection.has_attribute("mention"));
    }

    #[test]
    fn test_backward_selection_focus() {
        let mut selection = Selection::new(Position::new(NodeId(0), 0));
        selection.range = Range::flat(NodeId(0), 1, 3);
        selection.backward = true;
        assert_eq!(selection.focus().offset, 1);
        assert_eq!(selection.anchor().offset, 3);
    }
}
