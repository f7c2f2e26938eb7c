//! Model nodes and their serializable snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable identity of a model node inside a [`Document`](super::Document).
///
/// Element ids survive moves and removal into the graveyard. Text node ids
/// do not: adjacent text with equal attributes is merged after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

pub type Attributes = BTreeMap<String, Value>;

/// Name reported for text items in change entries and conversion events.
pub const TEXT_NAME: &str = "$text";

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element { name: String, children: Vec<NodeId> },
    Text { data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub attributes: Attributes,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn element(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            kind: NodeKind::Element {
                name: name.into(),
                children: Vec::new(),
            },
            attributes,
            parent: None,
        }
    }

    pub fn text(data: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            kind: NodeKind::Text { data: data.into() },
            attributes,
            parent: None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    /// Element name, or `$text` for text nodes.
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Element { name, .. } => name,
            NodeKind::Text { .. } => TEXT_NAME,
        }
    }

    pub fn data(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { data } => Some(data),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    /// Number of offsets this node occupies in its parent.
    pub fn offset_size(&self) -> usize {
        match &self.kind {
            NodeKind::Element { .. } => 1,
            NodeKind::Text { data } => data.chars().count(),
        }
    }
}

/// Detached copy of a subtree. Operations carry snapshots so that every
/// operation can be inverted and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeSnapshot {
    Text {
        data: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: Attributes,
    },
    Element {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: Attributes,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeSnapshot>,
    },
}

impl NodeSnapshot {
    pub fn text(data: impl Into<String>) -> Self {
        NodeSnapshot::Text {
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn element(name: impl Into<String>) -> Self {
        NodeSnapshot::Element {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes_mut().insert(key.into(), value);
        self
    }

    pub fn with_children(mut self, nodes: Vec<NodeSnapshot>) -> Self {
        if let NodeSnapshot::Element { children, .. } = &mut self {
            *children = nodes;
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            NodeSnapshot::Text { .. } => TEXT_NAME,
            NodeSnapshot::Element { name, .. } => name,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            NodeSnapshot::Text { attributes, .. } | NodeSnapshot::Element { attributes, .. } => {
                attributes
            }
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            NodeSnapshot::Text { attributes, .. } | NodeSnapshot::Element { attributes, .. } => {
                attributes
            }
        }
    }

    pub fn children(&self) -> &[NodeSnapshot] {
        match self {
            NodeSnapshot::Element { children, .. } => children,
            NodeSnapshot::Text { .. } => &[],
        }
    }

    pub fn offset_size(&self) -> usize {
        match self {
            NodeSnapshot::Text { data, .. } => data.chars().count(),
            NodeSnapshot::Element { .. } => 1,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeSnapshot::Text { .. })
    }
}

/// Total offset size of a list of snapshots.
pub fn offset_size_of(nodes: &[NodeSnapshot]) -> usize {
    nodes.iter().map(NodeSnapshot::offset_size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_offset_size_counts_chars() {
        let node = Node::text("żółw", Attributes::new());
        assert_eq!(node.offset_size(), 4);
        assert_eq!(node.name(), TEXT_NAME);
    }

    #[test]
    fn test_snapshot_serializes_tagged() {
        let snapshot = NodeSnapshot::element("paragraph")
            .with_children(vec![NodeSnapshot::text("foo").with_attribute("bold", json!(true))]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["type"], "element");
        assert_eq!(value["children"][0]["attributes"]["bold"], true);

        let back: NodeSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(offset_size_of(back.children()), 3);
    }
}
