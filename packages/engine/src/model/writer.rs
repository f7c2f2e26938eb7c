//! The only way to modify the model: every method records reversible
//! operations in the current batch.

use super::{
    Attributes, Batch, BatchHandle, Document, Item, NodeId, NodeSnapshot, Operation, PathRange,
    Position, Range, Schema,
};
use crate::error::{EngineError, Result};
use serde_json::Value;
use std::collections::VecDeque;

pub(crate) type ChangeCallback = Box<dyn FnOnce(&mut Writer<'_>) -> Result<()>>;

pub(crate) struct PendingChange {
    pub(crate) batch: Option<BatchHandle>,
    pub(crate) callback: ChangeCallback,
}

pub struct Writer<'a> {
    pub(crate) doc: &'a mut Document,
    pub(crate) schema: &'a Schema,
    pub(crate) batch: &'a mut Batch,
    pub(crate) pending: &'a mut VecDeque<PendingChange>,
    pub(crate) selection_changed: &'a mut bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        schema: &'a Schema,
        batch: &'a mut Batch,
        pending: &'a mut VecDeque<PendingChange>,
        selection_changed: &'a mut bool,
    ) -> Self {
        Self {
            doc,
            schema,
            batch,
            pending,
            selection_changed,
        }
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn batch(&self) -> BatchHandle {
        self.batch.handle
    }

    pub fn apply_operation(&mut self, operation: Operation) -> Result<()> {
        operation.apply(self.doc)?;
        self.batch.operations.push(operation);
        Ok(())
    }

    fn ensure_attached(&self, node: NodeId) -> Result<()> {
        if self.doc.is_attached(node) {
            Ok(())
        } else {
            Err(EngineError::InvalidPosition(format!(
                "{node:?} is not in the document"
            )))
        }
    }

    // ---- insertion ----

    pub fn insert(&mut self, nodes: Vec<NodeSnapshot>, position: Position) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        self.ensure_attached(position.parent)?;
        let position = self.doc.path_of(position)?;
        self.apply_operation(Operation::Insert { position, nodes })
    }

    pub fn insert_text(&mut self, text: &str, attributes: Attributes, position: Position) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.insert(
            vec![NodeSnapshot::Text {
                data: text.to_string(),
                attributes,
            }],
            position,
        )
    }

    /// Inserts an empty element and returns its id.
    pub fn insert_element(
        &mut self,
        name: &str,
        attributes: Attributes,
        position: Position,
    ) -> Result<NodeId> {
        self.insert(
            vec![NodeSnapshot::Element {
                name: name.to_string(),
                attributes,
                children: Vec::new(),
            }],
            position,
        )?;
        self.doc
            .node_after(position)
            .ok_or_else(|| EngineError::InvalidPosition("inserted element not found".into()))
    }

    pub fn append_element(&mut self, name: &str, attributes: Attributes, parent: NodeId) -> Result<NodeId> {
        let position = self.doc.position_at_end(parent);
        self.insert_element(name, attributes, position)
    }

    pub fn append_text(&mut self, text: &str, attributes: Attributes, parent: NodeId) -> Result<()> {
        let position = self.doc.position_at_end(parent);
        self.insert_text(text, attributes, position)
    }

    // ---- removal and moves ----

    pub fn remove(&mut self, range: Range) -> Result<()> {
        self.ensure_attached(range.start.parent)?;
        let flats = self.doc.flat_ranges(&range)?;
        for flat in flats.iter().rev() {
            let nodes = self.doc.snapshot_range(flat)?;
            if nodes.is_empty() {
                continue;
            }
            let position = self.doc.path_of(flat.start)?;
            self.apply_operation(Operation::Remove { position, nodes })?;
        }
        Ok(())
    }

    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let range = self.doc.range_on(node)?;
        self.remove(range)
    }

    /// Moves a flat range to `target`, given in current coordinates.
    pub fn move_range(&mut self, range: Range, target: Position) -> Result<()> {
        let how_many = range
            .len_if_flat()
            .ok_or_else(|| EngineError::InvalidRange("only flat ranges can be moved".into()))?;
        if how_many == 0 {
            return Ok(());
        }
        self.ensure_attached(range.start.parent)?;
        self.ensure_attached(target.parent)?;
        let source = self.doc.path_of(range.start)?;
        let mut target_path = self.doc.path_of(target)?;

        let depth = source.len() - 1;
        let offset = source[depth];
        if target_path.len() > depth && target_path[..depth] == source[..depth] {
            let at = target_path[depth];
            let nested = target_path.len() > depth + 1;
            if nested && at >= offset && at < offset + how_many {
                return Err(EngineError::MoveIntoItself);
            }
            if at >= offset + how_many {
                target_path[depth] -= how_many;
            } else if !nested && at > offset {
                target_path[depth] = offset;
            }
        }

        self.apply_operation(Operation::Move {
            source,
            how_many,
            target: target_path,
        })
    }

    /// Merges the element after `position` into the element before it.
    pub fn merge(&mut self, position: Position) -> Result<()> {
        let before = self.doc.node_before(position).filter(|n| self.doc.is_element(*n));
        let after = self.doc.node_after(position).filter(|n| self.doc.is_element(*n));
        let (Some(before), Some(after)) = (before, after) else {
            return Err(EngineError::InvalidPosition(
                "merge requires an element on both sides".into(),
            ));
        };
        let content = self.doc.range_in(after);
        if !content.is_collapsed() {
            let target = self.doc.position_at_end(before);
            self.move_range(content, target)?;
        }
        self.remove_node(after)
    }

    /// Removes the content of a range; blocks cut in half are merged.
    pub fn delete_content(&mut self, range: Range) -> Result<()> {
        if range.is_collapsed() {
            return Ok(());
        }
        let start = range.start;
        let end = range.end;
        self.remove(range)?;

        let adjacent = start.parent != end.parent
            && self.doc.is_attached(end.parent)
            && self.doc.next_sibling(start.parent) == Some(end.parent)
            && !self.doc.name(end.parent).map_or(true, |n| self.schema.is_limit(n));
        if adjacent {
            let between = self.doc.position_after(start.parent)?;
            self.merge(between)?;
        }
        self.set_selection_at(start)?;
        Ok(())
    }

    // ---- attributes ----

    pub fn set_attribute(&mut self, key: &str, value: Value, range: Range) -> Result<()> {
        self.change_attribute(key, Some(value), range)
    }

    pub fn remove_attribute(&mut self, key: &str, range: Range) -> Result<()> {
        self.change_attribute(key, None, range)
    }

    /// Sets an attribute on a single element or text node.
    pub fn set_attribute_on(&mut self, key: &str, value: Value, node: NodeId) -> Result<()> {
        let range = self.doc.range_on(node)?;
        self.change_attribute(key, Some(value), range)
    }

    pub fn remove_attribute_from(&mut self, key: &str, node: NodeId) -> Result<()> {
        let range = self.doc.range_on(node)?;
        self.change_attribute(key, None, range)
    }

    fn change_attribute(&mut self, key: &str, value: Option<Value>, range: Range) -> Result<()> {
        self.ensure_attached(range.start.parent)?;
        for flat in self.doc.flat_ranges(&range)? {
            // Runs of items sharing the same current value.
            let mut runs: Vec<(usize, usize, Option<Value>)> = Vec::new();
            for item in self.doc.items(&flat, false)? {
                let (start, end, current) = match item {
                    Item::Element(id) => {
                        let start = self.doc.start_offset(id).unwrap_or_default();
                        (start, start + 1, self.doc.attribute(id, key).cloned())
                    }
                    Item::Text(proxy) => {
                        let end = proxy.end();
                        (proxy.start, end, self.doc.attribute(proxy.node, key).cloned())
                    }
                };
                match runs.last_mut() {
                    Some(last) if last.1 == start && last.2 == current => last.1 = end,
                    _ => runs.push((start, end, current)),
                }
            }

            let parent = flat.start.parent;
            for (start, end, old_value) in runs {
                if old_value == value {
                    continue;
                }
                let range = PathRange {
                    start: self.doc.path_of(Position::new(parent, start))?,
                    end: self.doc.path_of(Position::new(parent, end))?,
                };
                self.apply_operation(Operation::Attribute {
                    range,
                    key: key.to_string(),
                    old_value,
                    new_value: value.clone(),
                })?;
            }
        }
        Ok(())
    }

    // ---- selection ----

    pub fn set_selection(&mut self, range: Range, backward: bool) -> Result<()> {
        for position in [range.start, range.end] {
            self.ensure_attached(position.parent)?;
            if position.offset > self.doc.max_offset(position.parent) {
                return Err(EngineError::InvalidPosition(format!(
                    "offset {} is past the end of {:?}",
                    position.offset, position.parent
                )));
            }
        }
        self.doc.set_selection_range(range, backward);
        *self.selection_changed = true;
        Ok(())
    }

    pub fn set_selection_at(&mut self, position: Position) -> Result<()> {
        self.set_selection(Range::collapsed(position), false)
    }

    /// Selects a node as a whole.
    pub fn set_selection_on(&mut self, node: NodeId) -> Result<()> {
        let range = self.doc.range_on(node)?;
        self.set_selection(range, false)
    }

    pub fn set_selection_attribute(&mut self, key: &str, value: Value) {
        self.doc.set_selection_attribute(key, value);
        *self.selection_changed = true;
    }

    pub fn remove_selection_attribute(&mut self, key: &str) {
        self.doc.remove_selection_attribute(key);
        *self.selection_changed = true;
    }

    // ---- scheduling ----

    /// Queues a change block to run after the current one (and after any
    /// blocks queued before it). `None` starts a new default batch.
    pub fn enqueue_change(
        &mut self,
        batch: Option<BatchHandle>,
        callback: impl FnOnce(&mut Writer<'_>) -> Result<()> + 'static,
    ) {
        self.pending.push_back(PendingChange {
            batch,
            callback: Box::new(callback),
        });
    }
}
