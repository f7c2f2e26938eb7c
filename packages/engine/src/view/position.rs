use super::ViewId;

/// Position in the view. `parent` may be a text node, in which case
/// `offset` counts characters; otherwise it is a child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewPosition {
    pub parent: ViewId,
    pub offset: usize,
}

impl ViewPosition {
    pub fn new(parent: ViewId, offset: usize) -> Self {
        Self { parent, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRange {
    pub start: ViewPosition,
    pub end: ViewPosition,
}

impl ViewRange {
    pub fn new(start: ViewPosition, end: ViewPosition) -> Self {
        Self { start, end }
    }

    pub fn collapsed(position: ViewPosition) -> Self {
        Self::new(position, position)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}
