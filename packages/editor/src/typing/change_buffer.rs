//! Groups consecutive typing into one batch, so it undoes as one step.

use folio_engine::model::{BatchHandle, BatchKind, ChangeBlock, ChangeObserver, Model, Scheduler};
use folio_engine::Result;
use tracing::trace;

#[derive(Debug)]
pub struct ChangeBuffer {
    /// Characters typed into the current batch.
    size: usize,
    /// Size at which a new batch starts.
    limit: usize,
    locked: bool,
    batch: Option<BatchHandle>,
}

impl ChangeBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            size: 0,
            limit,
            locked: false,
            batch: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The batch typing goes into, created on first use.
    pub fn batch(&mut self, model: &mut Model) -> BatchHandle {
        *self
            .batch
            .get_or_insert_with(|| model.create_batch(BatchKind::Default))
    }

    pub fn current_batch(&self) -> Option<BatchHandle> {
        self.batch
    }

    /// Records `changes` typed characters; starts over once the limit is
    /// reached.
    pub fn input(&mut self, changes: usize) {
        self.size += changes;
        if self.size >= self.limit {
            self.reset(true);
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Drops the current batch unless locked. `ignore_lock` resets anyway.
    pub fn reset(&mut self, ignore_lock: bool) {
        if self.locked && !ignore_lock {
            return;
        }
        trace!(size = self.size, "Change buffer reset");
        self.batch = None;
        self.size = 0;
    }
}

impl ChangeObserver for ChangeBuffer {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, _scheduler: &mut Scheduler<'_>) -> Result<()> {
        let own = self.batch.map_or(false, |batch| batch.id == block.batch.id);
        if own {
            return Ok(());
        }
        if !block.changes.is_empty() && block.batch.kind != BatchKind::Transparent {
            self.reset(true);
        } else if block.selection_changed {
            self.reset(false);
        }
        Ok(())
    }
}
