//! Change tracking between the start of a change block and now.
//!
//! Before the first mutation of an element's children (or of their
//! attributes) the differ captures that element's content as a list of
//! units: one per character and one per child element. `changes()` diffs each
//! captured snapshot against the live tree and produces normalized
//! [`ChangeEntry`] values. Entries are ordered by document order and their
//! offsets are valid when the entries are applied one after another, left to
//! right, to a view reflecting the state from before the block.

use super::{Attributes, Document, NodeId, Position, Range, TEXT_NAME};
use indexmap::IndexMap;
use serde_json::Value;
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum UnitKey {
    Char(char),
    Element(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Unit {
    pub(crate) key: UnitKey,
    pub(crate) attributes: Attributes,
}

/// A single normalized change.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEntry {
    Insert {
        position: Position,
        length: usize,
        name: String,
        node: Option<NodeId>,
    },
    Remove {
        position: Position,
        length: usize,
        name: String,
        node: Option<NodeId>,
    },
    Attribute {
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

impl ChangeEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            ChangeEntry::Insert { name, .. } | ChangeEntry::Remove { name, .. } => Some(name),
            ChangeEntry::Attribute { .. } => None,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ChangeEntry::Insert { position, .. } | ChangeEntry::Remove { position, .. } => {
                *position
            }
            ChangeEntry::Attribute { range, .. } => range.start,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, ChangeEntry::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, ChangeEntry::Remove { .. })
    }
}

#[derive(Debug, Default, Clone)]
pub struct Differ {
    snapshots: IndexMap<NodeId, Vec<Unit>>,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// No element has been touched since the last reset.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub(crate) fn is_tracking(&self, parent: NodeId) -> bool {
        self.snapshots.contains_key(&parent)
    }

    pub(crate) fn capture(&mut self, parent: NodeId, units: Vec<Unit>) {
        self.snapshots.entry(parent).or_insert(units);
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
    }

    pub fn changes(&self, doc: &Document) -> Vec<ChangeEntry> {
        let mut groups: Vec<(Vec<usize>, NodeId, Vec<ChangeEntry>)> = Vec::new();

        for (&parent, old_units) in &self.snapshots {
            if !doc.is_attached(parent) {
                continue;
            }
            let new_units = doc.units_of(parent);
            let entries = diff_units(doc, parent, old_units, &new_units);
            if entries.is_empty() {
                continue;
            }
            let path = match doc.path_of_node(parent) {
                Ok(path) => path,
                Err(_) => continue,
            };
            groups.push((path, parent, entries));
        }

        // Content of an inserted element is converted together with it.
        let inserted: HashSet<NodeId> = groups
            .iter()
            .flat_map(|(_, _, entries)| entries.iter())
            .filter_map(|entry| match entry {
                ChangeEntry::Insert {
                    node: Some(node), ..
                } => Some(*node),
                _ => None,
            })
            .collect();

        groups.retain(|(_, parent, _)| {
            !inserted.contains(parent)
                && !doc.ancestors(*parent).iter().any(|a| inserted.contains(a))
        });
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        groups
            .into_iter()
            .flat_map(|(_, _, entries)| entries)
            .collect()
    }
}

fn diff_units(doc: &Document, parent: NodeId, old: &[Unit], new: &[Unit]) -> Vec<ChangeEntry> {
    let old_keys: Vec<UnitKey> = old.iter().map(|u| u.key.clone()).collect();
    let new_keys: Vec<UnitKey> = new.iter().map(|u| u.key.clone()).collect();
    let mut entries = Vec::new();
    let mut offset = 0;

    for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => {
                attribute_entries(
                    parent,
                    offset,
                    &old[old_index..old_index + len],
                    &new[new_index..new_index + len],
                    &mut entries,
                );
                offset += len;
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                removal_entries(doc, parent, offset, &old[old_index..old_index + old_len], &mut entries);
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                insertion_entries(doc, parent, offset, &new[new_index..new_index + new_len], &mut entries);
                offset += new_len;
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                removal_entries(doc, parent, offset, &old[old_index..old_index + old_len], &mut entries);
                insertion_entries(doc, parent, offset, &new[new_index..new_index + new_len], &mut entries);
                offset += new_len;
            }
        }
    }

    entries
}

/// Splits units into runs: consecutive characters form one run, every
/// element forms its own.
fn runs(units: &[Unit]) -> Vec<(usize, usize, Option<NodeId>)> {
    let mut result = Vec::new();
    let mut text_start: Option<usize> = None;
    for (index, unit) in units.iter().enumerate() {
        match unit.key {
            UnitKey::Char(_) => {
                text_start.get_or_insert(index);
            }
            UnitKey::Element(id) => {
                if let Some(start) = text_start.take() {
                    result.push((start, index - start, None));
                }
                result.push((index, 1, Some(id)));
            }
        }
    }
    if let Some(start) = text_start {
        result.push((start, units.len() - start, None));
    }
    result
}

fn unit_name(doc: &Document, node: Option<NodeId>) -> String {
    node.and_then(|id| doc.name(id))
        .unwrap_or(TEXT_NAME)
        .to_string()
}

fn removal_entries(
    doc: &Document,
    parent: NodeId,
    offset: usize,
    units: &[Unit],
    entries: &mut Vec<ChangeEntry>,
) {
    for (_, length, node) in runs(units) {
        entries.push(ChangeEntry::Remove {
            position: Position::new(parent, offset),
            length,
            name: unit_name(doc, node),
            node,
        });
    }
}

fn insertion_entries(
    doc: &Document,
    parent: NodeId,
    offset: usize,
    units: &[Unit],
    entries: &mut Vec<ChangeEntry>,
) {
    for (start, length, node) in runs(units) {
        entries.push(ChangeEntry::Insert {
            position: Position::new(parent, offset + start),
            length,
            name: unit_name(doc, node),
            node,
        });
    }
}

fn attribute_entries(
    parent: NodeId,
    offset: usize,
    old: &[Unit],
    new: &[Unit],
    entries: &mut Vec<ChangeEntry>,
) {
    let mut keys: BTreeSet<&String> = BTreeSet::new();
    for (before, after) in old.iter().zip(new.iter()) {
        if before.attributes != after.attributes {
            keys.extend(before.attributes.keys());
            keys.extend(after.attributes.keys());
        }
    }

    for key in keys {
        let mut run: Option<(usize, Option<&Value>, Option<&Value>)> = None;
        for index in 0..=old.len() {
            let change = (index < old.len())
                .then(|| (old[index].attributes.get(key), new[index].attributes.get(key)))
                .filter(|(before, after)| before != after);

            let continues = matches!(
                (&run, &change),
                (Some((_, a, b)), Some((c, d))) if a == c && b == d
            );
            if continues {
                continue;
            }
            if let Some((start, old_value, new_value)) = run.take() {
                entries.push(ChangeEntry::Attribute {
                    range: Range::flat(parent, offset + start, offset + index),
                    key: key.clone(),
                    old_value: old_value.cloned(),
                    new_value: new_value.cloned(),
                });
            }
            if let Some((before, after)) = change {
                run = Some((index, before, after));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<Unit> {
        text.chars()
            .map(|c| Unit {
                key: UnitKey::Char(c),
                attributes: Attributes::new(),
            })
            .collect()
    }

    #[test]
    fn test_runs_split_elements_from_text() {
        let mut units = chars("ab");
        units.push(Unit {
            key: UnitKey::Element(NodeId(7)),
            attributes: Attributes::new(),
        });
        units.extend(chars("c"));

        let runs = runs(&units);
        assert_eq!(runs, vec![(0, 2, None), (2, 1, Some(NodeId(7))), (3, 1, None)]);
    }

    #[test]
    fn test_attribute_entries_group_contiguous_changes() {
        let old = chars("abcd");
        let mut new = chars("abcd");
        for unit in &mut new[1..3] {
            unit.attributes
                .insert("bold".to_string(), Value::Bool(true));
        }

        let mut entries = Vec::new();
        attribute_entries(NodeId(2), 0, &old, &new, &mut entries);
        assert_eq!(
            entries,
            vec![ChangeEntry::Attribute {
                range: Range::flat(NodeId(2), 1, 3),
                key: "bold".to_string(),
                old_value: None,
                new_value: Some(Value::Bool(true)),
            }]
        );
    }
}
