//! Change blocks: the [`Model`] runs writer callbacks, repairs the result
//! with post-fixers and tells observers what changed.

use super::writer::{ChangeCallback, PendingChange};
use super::{
    Batch, BatchHandle, BatchId, BatchKind, ChangeEntry, Document, Operation, PostFixer,
    PostFixerRegistry, Schema, Writer,
};
use crate::error::{EngineError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, instrument};

/// What a finished change block did.
pub struct ChangeBlock<'a> {
    pub document: &'a Document,
    pub schema: &'a Schema,
    pub batch: BatchHandle,
    pub operations: &'a [Operation],
    pub changes: &'a [ChangeEntry],
    pub selection_changed: bool,
}

/// Lets observers queue follow-up change blocks.
pub struct Scheduler<'a> {
    pending: &'a mut VecDeque<PendingChange>,
    next_batch_id: &'a mut u64,
}

impl Scheduler<'_> {
    pub fn create_batch(&mut self, kind: BatchKind) -> BatchHandle {
        let id = BatchId(*self.next_batch_id);
        *self.next_batch_id += 1;
        BatchHandle { id, kind }
    }

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

pub trait ChangeObserver {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, scheduler: &mut Scheduler<'_>) -> Result<()>;
}

pub struct Model {
    document: Document,
    schema: Schema,
    post_fixers: PostFixerRegistry,
    observers: Vec<Rc<RefCell<dyn ChangeObserver>>>,
    pending: VecDeque<PendingChange>,
    in_change_block: bool,
    next_batch_id: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            schema: Schema::new(),
            post_fixers: PostFixerRegistry::new(),
            observers: Vec::new(),
            pending: VecDeque::new(),
            in_change_block: false,
            next_batch_id: 1,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn register_post_fixer(&mut self, fixer: impl PostFixer + 'static) -> Result<()> {
        self.post_fixers.register(Box::new(fixer))
    }

    pub fn post_fixer_names(&self) -> Vec<&str> {
        self.post_fixers.names()
    }

    /// Observers are notified in registration order.
    pub fn add_observer(&mut self, observer: Rc<RefCell<dyn ChangeObserver>>) {
        self.observers.push(observer);
    }

    pub fn create_batch(&mut self, kind: BatchKind) -> BatchHandle {
        let id = BatchId(self.next_batch_id);
        self.next_batch_id += 1;
        BatchHandle { id, kind }
    }

    pub fn is_in_change_block(&self) -> bool {
        self.in_change_block
    }

    /// Runs `f` in a new default batch.
    pub fn change<R>(&mut self, f: impl FnOnce(&mut Writer<'_>) -> Result<R>) -> Result<R> {
        let batch = self.create_batch(BatchKind::Default);
        self.change_in(batch, f)
    }

    /// Runs `f` in the given batch, then every change queued meanwhile.
    /// Fails with [`EngineError::ChangeBlockActive`] when called while a
    /// block is running.
    pub fn change_in<R>(
        &mut self,
        batch: BatchHandle,
        f: impl FnOnce(&mut Writer<'_>) -> Result<R>,
    ) -> Result<R> {
        if self.in_change_block {
            return Err(EngineError::ChangeBlockActive);
        }
        self.in_change_block = true;
        let result = self.run_block(batch, f);
        let drained = self.drain_pending();
        self.in_change_block = false;
        let value = result?;
        drained?;
        Ok(value)
    }

    /// Queues a change. Runs immediately when no block is active, otherwise
    /// after the active block and everything queued before it.
    pub fn enqueue_change(
        &mut self,
        batch: Option<BatchHandle>,
        callback: impl FnOnce(&mut Writer<'_>) -> Result<()> + 'static,
    ) -> Result<()> {
        self.pending.push_back(PendingChange {
            batch,
            callback: Box::new(callback),
        });
        if self.in_change_block {
            return Ok(());
        }
        self.in_change_block = true;
        let drained = self.drain_pending();
        self.in_change_block = false;
        drained
    }

    fn drain_pending(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(PendingChange { batch, callback }) = self.pending.pop_front() {
            let batch = batch.unwrap_or_else(|| self.create_batch(BatchKind::Default));
            if let Err(err) = self.run_block::<()>(batch, callback_fn(callback)) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    #[instrument(skip_all, fields(batch = batch.id.0, kind = ?batch.kind))]
    fn run_block<R>(
        &mut self,
        batch: BatchHandle,
        f: impl FnOnce(&mut Writer<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut operations = Batch::new(batch);
        let mut selection_changed = false;

        let result = {
            let mut writer = Writer::new(
                &mut self.document,
                &self.schema,
                &mut operations,
                &mut self.pending,
                &mut selection_changed,
            );
            f(&mut writer)
        };
        self.document.refresh_selection_attributes(false);

        // A failed fixer loop leaves the document as the last pass wrote it,
        // so observers still hear about it before the error is returned.
        let mut fixed = Ok(());
        if !self.document.differ.is_empty() || selection_changed {
            let mut writer = Writer::new(
                &mut self.document,
                &self.schema,
                &mut operations,
                &mut self.pending,
                &mut selection_changed,
            );
            fixed = self.post_fixers.run(&mut writer).map(drop);
            self.document.refresh_selection_attributes(false);
        }

        let changes = self.document.changes();
        debug!(
            operations = operations.operations.len(),
            changes = changes.len(),
            selection_changed,
            "Change block finished"
        );
        let notified = if changes.is_empty() && !selection_changed {
            Ok(())
        } else {
            self.notify(&operations, &changes, selection_changed)
        };
        self.document.differ.reset();

        let value = result?;
        fixed?;
        notified?;
        Ok(value)
    }

    fn notify(&mut self, batch: &Batch, changes: &[ChangeEntry], selection_changed: bool) -> Result<()> {
        let observers = self.observers.clone();
        let block = ChangeBlock {
            document: &self.document,
            schema: &self.schema,
            batch: batch.handle,
            operations: &batch.operations,
            changes,
            selection_changed,
        };
        let mut scheduler = Scheduler {
            pending: &mut self.pending,
            next_batch_id: &mut self.next_batch_id,
        };
        for observer in &observers {
            observer
                .borrow_mut()
                .on_change_block(&block, &mut scheduler)?;
        }
        Ok(())
    }
}

fn callback_fn(callback: ChangeCallback) -> impl FnOnce(&mut Writer<'_>) -> Result<()> {
    move |writer| callback(writer)
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("document", &self.document)
            .field("post_fixers", &self.post_fixers)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FnPostFixer, NodeSnapshot, Position, MAX_POST_FIXER_PASSES};
    use std::cell::Cell;

    fn paragraph() -> Vec<NodeSnapshot> {
        vec![NodeSnapshot::element("paragraph")]
    }

    #[test]
    fn test_change_inside_active_block_is_rejected() {
        let mut model = Model::new();
        model.in_change_block = true;
        let result = model.change(|_| Ok(()));
        assert_eq!(result.unwrap_err(), EngineError::ChangeBlockActive);
    }

    #[test]
    fn test_enqueued_changes_run_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new();
        let outer = order.clone();
        model
            .change(move |writer| {
                for label in ["first", "second"] {
                    let order = outer.clone();
                    writer.enqueue_change(None, move |_| {
                        order.borrow_mut().push(label);
                        Ok(())
                    });
                }
                outer.borrow_mut().push("block");
                Ok(())
            })
            .unwrap();
        assert_eq!(*order.borrow(), vec!["block", "first", "second"]);
    }

    #[test]
    fn test_enqueue_change_runs_immediately_when_idle() {
        let mut model = Model::new();
        model
            .enqueue_change(None, |writer| {
                let root = writer.document().root();
                writer.insert(paragraph(), Position::new(root, 0))
            })
            .unwrap();
        assert_eq!(model.document().children(model.document().root()).len(), 1);
    }

    #[test]
    fn test_fixed_point_takes_one_extra_pass() {
        let calls = Rc::new(Cell::new(0));
        let mut model = Model::new();
        let counter = calls.clone();
        model
            .register_post_fixer(FnPostFixer::new("fill-root", move |writer| {
                counter.set(counter.get() + 1);
                let root = writer.document().root();
                if writer.document().is_empty(root) {
                    writer.insert(paragraph(), Position::new(root, 0))?;
                    return Ok(true);
                }
                Ok(false)
            }))
            .unwrap();

        model
            .change(|writer| {
                let root = writer.document().root();
                writer.insert(paragraph(), Position::new(root, 0))?;
                let all = writer.document().range_in(root);
                writer.remove(all)
            })
            .unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(model.document().children(model.document().root()).len(), 1);
    }

    #[test]
    fn test_diverging_post_fixers_are_reported() {
        let mut model = Model::new();
        model
            .register_post_fixer(FnPostFixer::new("toggle", |writer| {
                let root = writer.document().root();
                let count = writer.document().children(root).len();
                writer.insert(paragraph(), Position::new(root, count))?;
                Ok(true)
            }))
            .unwrap();

        let err = model
            .change(|writer| {
                let root = writer.document().root();
                writer.insert(paragraph(), Position::new(root, 0))
            })
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PostFixerDivergence {
                passes: MAX_POST_FIXER_PASSES,
                fixers: vec!["toggle".into()],
            }
        );
        assert!(!model.is_in_change_block());
    }

    struct Recorder {
        kinds: Rc<RefCell<Vec<BatchKind>>>,
    }

    impl ChangeObserver for Recorder {
        fn on_change_block(&mut self, block: &ChangeBlock<'_>, _: &mut Scheduler<'_>) -> Result<()> {
            self.kinds.borrow_mut().push(block.batch.kind);
            Ok(())
        }
    }

    #[test]
    fn test_observers_hear_about_diverged_blocks() {
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new();
        model.add_observer(Rc::new(RefCell::new(Recorder { kinds: kinds.clone() })));
        model
            .register_post_fixer(FnPostFixer::new("grow", |writer| {
                let root = writer.document().root();
                writer.insert(paragraph(), Position::new(root, 0))?;
                Ok(true)
            }))
            .unwrap();

        let result = model.change(|writer| {
            let root = writer.document().root();
            writer.insert(paragraph(), Position::new(root, 0))
        });
        assert!(matches!(result, Err(EngineError::PostFixerDivergence { .. })));
        assert_eq!(*kinds.borrow(), vec![BatchKind::Default]);
        assert!(model.document().differ.is_empty());
        assert_eq!(
            model.document().children(model.document().root()).len(),
            1 + MAX_POST_FIXER_PASSES
        );
    }

    #[test]
    fn test_observers_see_batch_kind_and_skip_empty_blocks() {
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new();
        model.add_observer(Rc::new(RefCell::new(Recorder { kinds: kinds.clone() })));

        model.change(|_| Ok(())).unwrap();
        let batch = model.create_batch(BatchKind::Transparent);
        model
            .change_in(batch, |writer| {
                let root = writer.document().root();
                writer.insert(paragraph(), Position::new(root, 0))
            })
            .unwrap();
        assert_eq!(*kinds.borrow(), vec![BatchKind::Transparent]);
    }
}
