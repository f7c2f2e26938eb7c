//! Reversible model operations.
//!
//! Operations address the tree with root-relative paths. Every operation
//! carries enough data to build its inverse, so a batch can be undone by
//! applying the inverses of its operations in reverse order.

use super::{offset_size_of, Document, NodeSnapshot, Path, PathRange};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    /// Insert nodes at a position.
    Insert {
        position: Path,
        nodes: Vec<NodeSnapshot>,
    },

    /// Remove the given nodes (which must be at `position`) into the
    /// graveyard.
    Remove {
        position: Path,
        nodes: Vec<NodeSnapshot>,
    },

    /// Move `how_many` offsets from `source` to `target`. `target` is
    /// expressed in the tree as it looks after the nodes were taken out.
    #[serde(rename_all = "camelCase")]
    Move {
        source: Path,
        how_many: usize,
        target: Path,
    },

    /// Change one attribute on every item of a flat range. All items in the
    /// range had `old_value` before the operation.
    #[serde(rename_all = "camelCase")]
    Attribute {
        range: PathRange,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

impl Operation {
    pub fn apply(&self, doc: &mut Document) -> Result<()> {
        match self {
            Operation::Insert { position, nodes } => {
                let position = doc.position_at_path(position)?;
                doc.insert_nodes(position, nodes)
            }

            Operation::Remove { position, nodes } => {
                let at = doc.position_at_path(position)?;
                let detached = doc.detach(at.parent, at.offset, offset_size_of(nodes), true)?;
                let graveyard = doc.graveyard();
                let end = doc.position_at_end(graveyard);
                doc.attach(end, &detached)
            }

            Operation::Move {
                source,
                how_many,
                target,
            } => {
                let from = doc.position_at_path(source)?;
                let detached = doc.detach(from.parent, from.offset, *how_many, false)?;
                let to = doc.position_at_path(target)?;
                doc.attach(to, &detached)
            }

            Operation::Attribute {
                range,
                key,
                new_value,
                ..
            } => {
                let start = doc.position_at_path(&range.start)?;
                let end = doc.position_at_path(&range.end)?;
                if start.parent != end.parent {
                    return Err(EngineError::InvalidRange(
                        "attribute operations require a flat range".into(),
                    ));
                }
                doc.set_attribute_in(start.parent, start.offset, end.offset, key, new_value.as_ref())
            }
        }
    }

    pub fn inverse(&self) -> Operation {
        match self {
            Operation::Insert { position, nodes } => Operation::Remove {
                position: position.clone(),
                nodes: nodes.clone(),
            },
            Operation::Remove { position, nodes } => Operation::Insert {
                position: position.clone(),
                nodes: nodes.clone(),
            },
            Operation::Move {
                source,
                how_many,
                target,
            } => Operation::Move {
                source: target.clone(),
                how_many: *how_many,
                target: source.clone(),
            },
            Operation::Attribute {
                range,
                key,
                old_value,
                new_value,
            } => Operation::Attribute {
                range: range.clone(),
                key: key.clone(),
                old_value: new_value.clone(),
                new_value: old_value.clone(),
            },
        }
    }

    /// Structural operations shift positions; attribute operations do not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Operation::Attribute { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(text: &str) -> Document {
        let mut doc = Document::new();
        Operation::Insert {
            position: vec![0],
            nodes: vec![NodeSnapshot::element("paragraph")
                .with_children(vec![NodeSnapshot::text(text)])],
        }
        .apply(&mut doc)
        .unwrap();
        doc
    }

    #[test]
    fn test_remove_and_inverse_restore_content() {
        let mut doc = doc_with("foobar");
        let p = doc.children(doc.root())[0];
        let remove = Operation::Remove {
            position: vec![0, 1],
            nodes: vec![NodeSnapshot::text("oob")],
        };

        remove.apply(&mut doc).unwrap();
        assert_eq!(doc.text_content(p), "far");

        remove.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc.text_content(p), "foobar");
    }

    #[test]
    fn test_move_inverse_is_symmetric() {
        let mut doc = Document::new();
        Operation::Insert {
            position: vec![0],
            nodes: vec![
                NodeSnapshot::element("paragraph").with_children(vec![NodeSnapshot::text("ab")]),
                NodeSnapshot::element("paragraph").with_children(vec![NodeSnapshot::text("cd")]),
            ],
        }
        .apply(&mut doc)
        .unwrap();
        let [first, second] = [doc.children(doc.root())[0], doc.children(doc.root())[1]];

        let op = Operation::Move {
            source: vec![1, 0],
            how_many: 2,
            target: vec![0, 2],
        };
        op.apply(&mut doc).unwrap();
        assert_eq!(doc.text_content(first), "abcd");
        assert_eq!(doc.text_content(second), "");

        op.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc.text_content(first), "ab");
        assert_eq!(doc.text_content(second), "cd");
    }

    #[test]
    fn test_operation_serializes_camel_case() {
        let op = Operation::Move {
            source: vec![0, 1],
            how_many: 2,
            target: vec![1, 0],
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["howMany"], 2);
    }
}
