//! Bindings between model and view elements, and position mapping.
//!
//! Only elements are bound. Positions are mapped by finding the view
//! element bound to the model position's parent and walking its children,
//! counting how many model offsets each view node stands for. Model elements
//! that no converter handled have no view node, so they are left out of the
//! count.

use crate::model::{Document, NodeId, Position, Range};
use crate::view::{View, ViewElementKind, ViewId, ViewPosition, ViewRange};
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingConflict {
    #[error("model element {model:?} is already bound to view element {existing:?}")]
    ModelAlreadyBound { model: NodeId, existing: ViewId },

    #[error("view element {view:?} is already bound to model element {existing:?}")]
    ViewAlreadyBound { view: ViewId, existing: NodeId },
}

/// Where a model position lands when zero-length view nodes (UI elements,
/// unbound empty elements) sit at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Before the zero-length nodes. Used for range ends.
    Before,
    /// After the zero-length nodes. Used for range starts and insertions.
    After,
}

#[derive(Debug, Default, Clone)]
pub struct Mapper {
    model_to_view: IndexMap<NodeId, ViewId>,
    view_to_model: IndexMap<ViewId, NodeId>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a pair, refusing to overwrite an existing binding of either side.
    pub fn bind_elements(&mut self, model: NodeId, view: ViewId) -> Result<(), BindingConflict> {
        if let Some(&existing) = self.model_to_view.get(&model) {
            if existing != view {
                return Err(BindingConflict::ModelAlreadyBound { model, existing });
            }
        }
        if let Some(&existing) = self.view_to_model.get(&view) {
            if existing != model {
                return Err(BindingConflict::ViewAlreadyBound { view, existing });
            }
        }
        self.model_to_view.insert(model, view);
        self.view_to_model.insert(view, model);
        Ok(())
    }

    /// Binds a pair, replacing any existing binding of either side. Returns
    /// the binding that was displaced, if any.
    pub fn rebind(&mut self, model: NodeId, view: ViewId) -> Option<BindingConflict> {
        let mut displaced = None;
        if let Some(existing) = self.model_to_view.insert(model, view) {
            if existing != view {
                self.view_to_model.shift_remove(&existing);
                displaced = Some(BindingConflict::ModelAlreadyBound { model, existing });
            }
        }
        if let Some(existing) = self.view_to_model.insert(view, model) {
            if existing != model {
                if self.model_to_view.get(&existing) == Some(&view) {
                    self.model_to_view.shift_remove(&existing);
                }
                displaced.get_or_insert(BindingConflict::ViewAlreadyBound { view, existing });
            }
        }
        displaced
    }

    /// Removes the binding of a view element. The model side is only cleared
    /// if it still points at this view element, since the model element may
    /// have been re-bound to a fresh view in the meantime.
    pub fn unbind_view_element(&mut self, view: ViewId) {
        if let Some(model) = self.view_to_model.shift_remove(&view) {
            if self.model_to_view.get(&model) == Some(&view) {
                self.model_to_view.shift_remove(&model);
            }
        }
    }

    pub fn unbind_model_element(&mut self, model: NodeId) {
        if let Some(view) = self.model_to_view.shift_remove(&model) {
            if self.view_to_model.get(&view) == Some(&model) {
                self.view_to_model.shift_remove(&view);
            }
        }
    }

    pub fn to_view_element(&self, model: NodeId) -> Option<ViewId> {
        self.model_to_view.get(&model).copied()
    }

    pub fn to_model_element(&self, view: ViewId) -> Option<NodeId> {
        self.view_to_model.get(&view).copied()
    }

    pub fn len(&self) -> usize {
        self.model_to_view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model_to_view.is_empty()
    }

    pub fn clear(&mut self) {
        self.model_to_view.clear();
        self.view_to_model.clear();
    }

    pub fn bindings(&self) -> impl Iterator<Item = (NodeId, ViewId)> + '_ {
        self.model_to_view.iter().map(|(m, v)| (*m, *v))
    }

    /// How many model offsets a view node represents.
    pub fn model_length(&self, view: &View, node: ViewId) -> usize {
        if let Some(text) = view.text(node) {
            return text.chars().count();
        }
        if self.view_to_model.contains_key(&node) {
            return 1;
        }
        if matches!(view.kind(node), Some(ViewElementKind::Ui)) {
            return 0;
        }
        view.children(node)
            .iter()
            .map(|child| self.model_length(view, *child))
            .sum()
    }

    pub fn to_view_position(
        &self,
        document: &Document,
        view: &View,
        position: Position,
        bias: Bias,
    ) -> Option<ViewPosition> {
        let container = self.to_view_element(position.parent)?;
        let offset = self.visible_offset(document, position.parent, position.offset);
        self.find_position_in(view, container, offset, bias)
    }

    /// View range of `length` model offsets that were removed at `position`.
    /// The document no longer has them, so only the start is looked up there.
    pub fn to_view_range_of_removed(
        &self,
        document: &Document,
        view: &View,
        position: Position,
        length: usize,
    ) -> Option<ViewRange> {
        let container = self.to_view_element(position.parent)?;
        let start = self.visible_offset(document, position.parent, position.offset);
        Some(ViewRange::new(
            self.find_position_in(view, container, start, Bias::After)?,
            self.find_position_in(view, container, start + length, Bias::Before)?,
        ))
    }

    fn is_unconverted(&self, document: &Document, node: NodeId) -> bool {
        document.is_element(node) && !self.model_to_view.contains_key(&node)
    }

    /// `offset` in `parent` minus the unconverted elements before it.
    fn visible_offset(&self, document: &Document, parent: NodeId, offset: usize) -> usize {
        let mut start = 0;
        let mut hidden = 0;
        for child in document.children(parent) {
            if start >= offset {
                break;
            }
            if self.is_unconverted(document, *child) {
                hidden += 1;
            }
            start += document.offset_size(*child);
        }
        offset.saturating_sub(hidden)
    }

    /// Inverse of `visible_offset`. Lands before unconverted elements.
    fn model_offset(&self, document: &Document, parent: NodeId, visible: usize) -> usize {
        let mut remaining = visible;
        let mut offset = 0;
        for child in document.children(parent) {
            if remaining == 0 {
                break;
            }
            let size = document.offset_size(*child);
            if self.is_unconverted(document, *child) {
                offset += size;
                continue;
            }
            if remaining < size {
                return offset + remaining;
            }
            remaining -= size;
            offset += size;
        }
        offset + remaining
    }

    fn find_position_in(
        &self,
        view: &View,
        container: ViewId,
        offset: usize,
        bias: Bias,
    ) -> Option<ViewPosition> {
        let mut remaining = offset;
        let children = view.children(container);
        for (index, child) in children.iter().enumerate() {
            let length = self.model_length(view, *child);
            if remaining == 0 {
                if bias == Bias::Before || length > 0 {
                    return Some(ViewPosition::new(container, index));
                }
                continue;
            }
            if remaining < length {
                if view.is_text(*child) {
                    return Some(ViewPosition::new(*child, remaining));
                }
                return self.find_position_in(view, *child, remaining, bias);
            }
            remaining -= length;
        }
        (remaining == 0).then(|| ViewPosition::new(container, children.len()))
    }

    pub fn to_view_range(&self, document: &Document, view: &View, range: &Range) -> Option<ViewRange> {
        let start = self.to_view_position(document, view, range.start, Bias::After)?;
        let end_bias = if range.is_collapsed() {
            Bias::After
        } else {
            Bias::Before
        };
        let end = self.to_view_position(document, view, range.end, end_bias)?;
        Some(ViewRange::new(start, end))
    }

    pub fn to_model_position(&self, document: &Document, view: &View, position: ViewPosition) -> Option<Position> {
        let mut current = position.parent;
        let mut offset = if view.is_text(current) {
            position.offset
        } else {
            self.length_before(view, current, position.offset)
        };
        loop {
            if !view.is_text(current) {
                if let Some(model) = self.to_model_element(current) {
                    return Some(Position::new(model, self.model_offset(document, model, offset)));
                }
            }
            let parent = view.parent(current)?;
            let index = view.index_in_parent(current)?;
            offset += self.length_before(view, parent, index);
            current = parent;
        }
    }

    fn length_before(&self, view: &View, parent: ViewId, index: usize) -> usize {
        view.children(parent)
            .iter()
            .take(index)
            .map(|child| self.model_length(view, *child))
            .sum()
    }
}
