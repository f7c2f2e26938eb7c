//! # Undo/Redo Stack
//!
//! Tracks model history by observing change blocks.
//!
//! ## Design
//!
//! - Each recorded step keeps the operations of one batch, so blocks that
//!   share a batch (consecutive typing) undo together
//! - Undo applies the inverses in an `Undo` batch; that batch becomes the
//!   redo step
//! - Redo applies the inverses of the redo step in a `Redo` batch, which
//!   goes back on the undo stack
//! - New default batches clear the redo stack
//! - Transparent batches are not recorded
//!
//! Steps are not transformed against transparent changes made after them.
//!
//! ## Example
//!
//! ```rust,ignore
//! let stack = Rc::new(RefCell::new(UndoStack::new()));
//! model.add_observer(stack.clone());
//!
//! model.change(|writer| writer.insert_text("a", Default::default(), position))?;
//! UndoStack::undo(&stack, &mut model)?;
//! UndoStack::redo(&stack, &mut model)?;
//! ```

use folio_engine::model::{
    BatchId, BatchKind, ChangeBlock, ChangeObserver, Document, Model, Operation, Path, Range, Scheduler,
};
use folio_engine::Result;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Selection stored as paths so it survives re-created elements.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSelection {
    pub start: Path,
    pub end: Path,
    pub backward: bool,
}

impl StoredSelection {
    fn capture(document: &Document) -> Option<Self> {
        let selection = document.selection();
        let range = selection.range();
        Some(Self {
            start: document.path_of(range.start).ok()?,
            end: document.path_of(range.end).ok()?,
            backward: selection.is_backward(),
        })
    }

    fn resolve(&self, document: &Document) -> Option<Range> {
        let start = document.position_at_path(&self.start).ok()?;
        let end = document.position_at_path(&self.end).ok()?;
        Some(Range::new(start, end))
    }
}

/// Operations of one batch that are undone or redone together.
#[derive(Debug, Clone)]
pub struct HistoryStep {
    pub batch: BatchId,
    /// Operations in application order.
    pub operations: Vec<Operation>,
    pub selection_before: Option<StoredSelection>,
}

impl HistoryStep {
    /// The operations that revert this step, in application order.
    pub fn inverses(&self) -> Vec<Operation> {
        self.operations.iter().rev().map(Operation::inverse).collect()
    }
}

#[derive(Debug)]
pub struct UndoStack {
    /// Most recent last.
    undo_stack: Vec<HistoryStep>,

    /// Most recent last.
    redo_stack: Vec<HistoryStep>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Selection after the last observed block.
    last_selection: Option<StoredSelection>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            last_selection: None,
        }
    }

    fn push_undo(&mut self, step: HistoryStep) {
        self.undo_stack.push(step);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    fn record(&mut self, block: &ChangeBlock<'_>) {
        let step = HistoryStep {
            batch: block.batch.id,
            operations: block.operations.to_vec(),
            selection_before: self.last_selection.clone(),
        };
        match block.batch.kind {
            BatchKind::Transparent => {}
            BatchKind::Default => {
                let continues_last = self
                    .undo_stack
                    .last()
                    .map_or(false, |last| last.batch == step.batch);
                if !continues_last {
                    self.push_undo(step);
                } else if let Some(last) = self.undo_stack.last_mut() {
                    last.operations.extend(step.operations);
                }
                self.redo_stack.clear();
            }
            BatchKind::Undo => self.redo_stack.push(step),
            BatchKind::Redo => self.push_undo(step),
        }
    }

    /// Reverts the most recent step. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(stack: &Rc<RefCell<Self>>, model: &mut Model) -> Result<bool> {
        let Some(step) = stack.borrow_mut().undo_stack.pop() else {
            return Ok(false);
        };
        Self::revert(step, BatchKind::Undo, model)?;
        Ok(true)
    }

    /// Re-applies the most recently undone step.
    pub fn redo(stack: &Rc<RefCell<Self>>, model: &mut Model) -> Result<bool> {
        let Some(step) = stack.borrow_mut().redo_stack.pop() else {
            return Ok(false);
        };
        Self::revert(step, BatchKind::Redo, model)?;
        Ok(true)
    }

    fn revert(step: HistoryStep, kind: BatchKind, model: &mut Model) -> Result<()> {
        let batch = model.create_batch(kind);
        let operations = step.inverses();
        debug!(kind = ?kind, operations = operations.len(), "Reverting history step");
        let result = model.change_in(batch, |writer| {
            for operation in operations {
                writer.apply_operation(operation)?;
            }
            let range = step
                .selection_before
                .as_ref()
                .and_then(|selection| selection.resolve(writer.document()).map(|r| (r, selection.backward)));
            match range {
                Some((range, backward)) => writer.set_selection(range, backward),
                None => {
                    let position = writer.document().default_position();
                    writer.set_selection(Range::collapsed(position), false)
                }
            }
        });
        if let Err(err) = &result {
            warn!(error = %err, "History step could not be reverted, dropping it");
        }
        result
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Forgets all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeObserver for UndoStack {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, _scheduler: &mut Scheduler<'_>) -> Result<()> {
        if !block.operations.is_empty() {
            self.record(block);
        }
        self.last_selection = StoredSelection::capture(block.document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_engine::dev_utils::{get_data, set_data};
    use folio_engine::model::{ItemDefinition, Position, ROOT_NAME};

    fn setup(max_levels: usize) -> (Model, Rc<RefCell<UndoStack>>) {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", ItemDefinition::default().allowed_in(ROOT_NAME).block());
        let stack = Rc::new(RefCell::new(UndoStack::with_max_levels(max_levels)));
        model.add_observer(stack.clone());
        set_data(&mut model, "<paragraph>foo[]</paragraph>").unwrap();
        (model, stack)
    }

    fn type_text(model: &mut Model, text: &str) {
        model
            .change(|writer| {
                let position = writer.document().selection().focus();
                writer.insert_text(text, Default::default(), position)?;
                writer.set_selection_at(Position::new(position.parent, position.offset + text.chars().count()))
            })
            .unwrap();
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.undo_levels(), 0);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_transparent_batches_are_not_recorded() {
        let (_, stack) = setup(100);
        assert_eq!(stack.borrow().undo_levels(), 0);
    }

    #[test]
    fn test_undo_and_redo() {
        let (mut model, stack) = setup(100);
        type_text(&mut model, "bar");
        assert_eq!(get_data(model.document(), true), "<paragraph>foobar[]</paragraph>");

        assert!(UndoStack::undo(&stack, &mut model).unwrap());
        assert_eq!(get_data(model.document(), true), "<paragraph>foo[]</paragraph>");
        assert_eq!(stack.borrow().redo_levels(), 1);

        assert!(UndoStack::redo(&stack, &mut model).unwrap());
        assert_eq!(get_data(model.document(), true), "<paragraph>foobar[]</paragraph>");
        assert_eq!(stack.borrow().undo_levels(), 1);
        assert_eq!(stack.borrow().redo_levels(), 0);
    }

    #[test]
    fn test_blocks_in_one_batch_undo_together() {
        let (mut model, stack) = setup(100);
        let batch = model.create_batch(BatchKind::Default);
        for text in ["a", "b"] {
            model
                .change_in(batch, |writer| {
                    let position = writer.document().selection().focus();
                    writer.insert_text(text, Default::default(), position)?;
                    writer.set_selection_at(position.shifted_by(1))
                })
                .unwrap();
        }
        assert_eq!(stack.borrow().undo_levels(), 1);
        UndoStack::undo(&stack, &mut model).unwrap();
        assert_eq!(get_data(model.document(), false), "<paragraph>foo</paragraph>");
    }

    #[test]
    fn test_new_change_clears_redo() {
        let (mut model, stack) = setup(100);
        type_text(&mut model, "a");
        UndoStack::undo(&stack, &mut model).unwrap();
        assert!(stack.borrow().can_redo());
        type_text(&mut model, "b");
        assert!(!stack.borrow().can_redo());
    }

    #[test]
    fn test_max_levels_enforced() {
        let (mut model, stack) = setup(2);
        for text in ["a", "b", "c"] {
            type_text(&mut model, text);
        }
        assert_eq!(stack.borrow().undo_levels(), 2);
    }

    #[test]
    fn test_nothing_to_undo() {
        let (mut model, stack) = setup(100);
        assert!(!UndoStack::undo(&stack, &mut model).unwrap());
        assert!(!UndoStack::redo(&stack, &mut model).unwrap());
    }
}
