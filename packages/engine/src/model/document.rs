//! The model document: an arena of nodes with a main root and a graveyard.

use super::differ::{Unit, UnitKey};
use super::position::common_prefix;
use super::{
    Attributes, ChangeEntry, Differ, Node, NodeId, NodeKind, NodeSnapshot, Path, Position, Range,
    Selection,
};
use crate::error::{EngineError, Result};
use serde_json::Value;
use std::cmp::Ordering;

pub const ROOT_NAME: &str = "$root";
pub const GRAVEYARD_NAME: &str = "$graveyard";

/// A slice of a text node, as seen by ranges and conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct TextProxy {
    pub node: NodeId,
    pub parent: NodeId,
    /// Offset of the first character in the parent.
    pub start: usize,
    pub data: String,
}

impl TextProxy {
    pub fn end(&self) -> usize {
        self.start + self.data.chars().count()
    }

    pub fn range(&self) -> Range {
        Range::flat(self.parent, self.start, self.end())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Element(NodeId),
    Text(TextProxy),
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    graveyard: NodeId,
    pub(crate) selection: Selection,
    pub(crate) differ: Differ,
    version: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = NodeId(0);
        Self {
            nodes: vec![
                Some(Node::element(ROOT_NAME, Attributes::new())),
                Some(Node::element(GRAVEYARD_NAME, Attributes::new())),
            ],
            root,
            graveyard: NodeId(1),
            selection: Selection::new(Position::new(root, 0)),
            differ: Differ::new(),
            version: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn graveyard(&self) -> NodeId {
        self.graveyard
    }

    /// Incremented on every applied mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    /// Changes made since the current change block started.
    pub fn changes(&self) -> Vec<ChangeEntry> {
        self.differ.changes(self)
    }

    // ---- node access ----

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(EngineError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(EngineError::NodeNotFound(id))
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Element { children, .. } => Ok(children),
            NodeKind::Text { .. } => Err(EngineError::NotAnElement(id)),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(Node::name)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.node(id).map_or(false, Node::is_element)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.node(id).map_or(false, Node::is_text)
    }

    /// Element named `name`.
    pub fn is(&self, id: NodeId, name: &str) -> bool {
        self.node(id)
            .map_or(false, |node| node.is_element() && node.name() == name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], Node::children)
    }

    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        self.node(id).map(|node| &node.attributes)
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.node(id).and_then(|node| node.attributes.get(key))
    }

    pub fn has_attribute(&self, id: NodeId, key: &str) -> bool {
        self.attribute(id, key).is_some()
    }

    pub fn data(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(Node::data)
    }

    pub fn offset_size(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, Node::offset_size)
    }

    pub fn max_offset(&self, parent: NodeId) -> usize {
        self.children(parent)
            .iter()
            .map(|child| self.offset_size(*child))
            .sum()
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Offset at which `id` starts inside its parent.
    pub fn start_offset(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let mut offset = 0;
        for child in self.children(parent) {
            if *child == id {
                return Some(offset);
            }
            offset += self.offset_size(*child);
        }
        None
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Ancestors of `id`, nearest first. Does not include `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    /// Reachable from the main root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id).is_some() && self.root_of(id) == self.root
    }

    /// `ancestor` is `id` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Nearest element named `name`, starting at `id` itself.
    pub fn find_ancestor(&self, id: NodeId, name: &str) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|node| self.is(*node, name))
    }

    /// All descendants of `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        for child in self.children(id) {
            result.push(*child);
            result.extend(self.descendants(*child));
        }
        result
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.node(id) {
            Some(Node {
                kind: NodeKind::Text { data },
                ..
            }) => data.clone(),
            Some(node) => node
                .children()
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
            None => String::new(),
        }
    }

    // ---- positions ----

    pub fn position_before(&self, id: NodeId) -> Result<Position> {
        let parent = self.parent(id).ok_or(EngineError::NodeNotFound(id))?;
        let offset = self.start_offset(id).ok_or(EngineError::NodeNotFound(id))?;
        Ok(Position::new(parent, offset))
    }

    pub fn position_after(&self, id: NodeId) -> Result<Position> {
        Ok(self.position_before(id)?.shifted_by(self.offset_size(id) as isize))
    }

    pub fn position_at_end(&self, parent: NodeId) -> Position {
        Position::new(parent, self.max_offset(parent))
    }

    /// Range containing exactly the node `id`.
    pub fn range_on(&self, id: NodeId) -> Result<Range> {
        Ok(Range::new(self.position_before(id)?, self.position_after(id)?))
    }

    /// Range spanning the whole content of `id`.
    pub fn range_in(&self, id: NodeId) -> Range {
        Range::flat(id, 0, self.max_offset(id))
    }

    /// Child that occupies `offset`, with its start offset.
    pub fn child_at_offset(&self, parent: NodeId, offset: usize) -> Option<(NodeId, usize)> {
        let mut start = 0;
        for child in self.children(parent) {
            let size = self.offset_size(*child);
            if offset >= start && offset < start + size {
                return Some((*child, start));
            }
            start += size;
        }
        None
    }

    /// Text node the position lies strictly inside of.
    pub fn text_node_at(&self, position: Position) -> Option<NodeId> {
        self.child_at_offset(position.parent, position.offset)
            .filter(|(child, start)| self.is_text(*child) && *start < position.offset)
            .map(|(child, _)| child)
    }

    pub fn node_after(&self, position: Position) -> Option<NodeId> {
        self.child_at_offset(position.parent, position.offset)
            .filter(|(_, start)| *start == position.offset)
            .map(|(child, _)| child)
    }

    pub fn node_before(&self, position: Position) -> Option<NodeId> {
        if position.offset == 0 {
            return None;
        }
        self.child_at_offset(position.parent, position.offset - 1)
            .filter(|(child, start)| start + self.offset_size(*child) == position.offset)
            .map(|(child, _)| child)
    }

    pub fn is_at_end(&self, position: Position) -> bool {
        position.offset == self.max_offset(position.parent)
    }

    /// Offsets leading from the node's root to `id`.
    pub fn path_of_node(&self, id: NodeId) -> Result<Path> {
        self.get(id)?;
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(
                self.start_offset(current)
                    .ok_or(EngineError::NodeNotFound(current))?,
            );
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    pub fn path_of(&self, position: Position) -> Result<Path> {
        let mut path = self.path_of_node(position.parent)?;
        path.push(position.offset);
        Ok(path)
    }

    /// Resolves a path relative to the main root.
    pub fn position_at_path(&self, path: &[usize]) -> Result<Position> {
        let (last, ancestors) = path
            .split_last()
            .ok_or_else(|| EngineError::InvalidPath(path.to_vec()))?;
        let mut parent = self.root;
        for offset in ancestors {
            match self.child_at_offset(parent, *offset) {
                Some((child, start)) if start == *offset && self.is_element(child) => {
                    parent = child
                }
                _ => return Err(EngineError::InvalidPath(path.to_vec())),
            }
        }
        if *last > self.max_offset(parent) {
            return Err(EngineError::InvalidPath(path.to_vec()));
        }
        Ok(Position::new(parent, *last))
    }

    pub fn compare(&self, a: Position, b: Position) -> Ordering {
        match (self.path_of(a), self.path_of(b)) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        }
    }

    /// Range with boundaries in document order.
    pub fn ordered_range(&self, a: Position, b: Position) -> Range {
        if self.compare(a, b) == Ordering::Greater {
            Range::new(b, a)
        } else {
            Range::new(a, b)
        }
    }

    /// Splits a range into the minimal set of flat ranges covering it.
    pub fn flat_ranges(&self, range: &Range) -> Result<Vec<Range>> {
        if range.is_flat() {
            return Ok(if range.is_collapsed() { vec![] } else { vec![*range] });
        }
        let start = self.path_of(range.start)?;
        let end = self.path_of(range.end)?;
        let diff_at = common_prefix(&start, &end);
        let mut ranges = Vec::new();
        let mut path = start;

        while path.len() > diff_at + 1 {
            let position = self.resolve_relative(range.start.parent, &path)?;
            let max = self.max_offset(position.parent);
            if max != position.offset {
                ranges.push(Range::flat(position.parent, position.offset, max));
            }
            path.pop();
            if let Some(last) = path.last_mut() {
                *last += 1;
            }
        }

        while path.len() <= end.len() {
            let target = end[path.len() - 1];
            let position = self.resolve_relative(range.start.parent, &path)?;
            if target != position.offset {
                ranges.push(Range::flat(position.parent, position.offset, target));
            }
            if let Some(last) = path.last_mut() {
                *last = target;
            }
            path.push(0);
        }

        Ok(ranges)
    }

    /// Like `position_at_path` but relative to the root containing `anchor`.
    fn resolve_relative(&self, anchor: NodeId, path: &[usize]) -> Result<Position> {
        let root = self.root_of(anchor);
        let (last, ancestors) = path
            .split_last()
            .ok_or_else(|| EngineError::InvalidPath(path.to_vec()))?;
        let mut parent = root;
        for offset in ancestors {
            match self.child_at_offset(parent, *offset) {
                Some((child, start)) if start == *offset && self.is_element(child) => {
                    parent = child
                }
                _ => return Err(EngineError::InvalidPath(path.to_vec())),
            }
        }
        Ok(Position::new(parent, *last))
    }

    /// Items in a range. Shallow walks only the flat ranges' direct children;
    /// deep also descends into elements, yielding each element before its
    /// content.
    pub fn items(&self, range: &Range, deep: bool) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for flat in self.flat_ranges(range)? {
            self.collect_items(
                flat.start.parent,
                flat.start.offset,
                flat.end.offset,
                deep,
                &mut items,
            );
        }
        Ok(items)
    }

    fn collect_items(&self, parent: NodeId, from: usize, to: usize, deep: bool, out: &mut Vec<Item>) {
        if from >= to {
            return;
        }
        let mut start = 0;
        for child in self.children(parent) {
            let size = self.offset_size(*child);
            let end = start + size;
            if start >= to {
                break;
            }
            if end > from {
                match self.node(*child).map(|node| &node.kind) {
                    Some(NodeKind::Text { data }) => {
                        let first = from.max(start) - start;
                        let last = to.min(end) - start;
                        out.push(Item::Text(TextProxy {
                            node: *child,
                            parent,
                            start: start + first,
                            data: data.chars().skip(first).take(last - first).collect(),
                        }));
                    }
                    Some(NodeKind::Element { .. }) => {
                        out.push(Item::Element(*child));
                        if deep {
                            let max = self.max_offset(*child);
                            self.collect_items(*child, 0, max, deep, out);
                        }
                    }
                    None => {}
                }
            }
            start = end;
        }
    }

    /// The element selected as a whole, if the selection wraps exactly one.
    pub fn selected_element(&self) -> Option<NodeId> {
        let range = self.selection.range();
        if range.len_if_flat() != Some(1) {
            return None;
        }
        self.node_after(range.start)
            .filter(|node| self.is_element(*node))
    }

    /// First position inside the first element child of the root, or the
    /// root start when the document is empty.
    pub fn default_position(&self) -> Position {
        match self.children(self.root).first() {
            Some(first) if self.is_element(*first) => Position::new(*first, 0),
            _ => Position::new(self.root, 0),
        }
    }

    // ---- snapshots ----

    pub fn snapshot(&self, id: NodeId) -> Result<NodeSnapshot> {
        let node = self.get(id)?;
        Ok(match &node.kind {
            NodeKind::Text { data } => NodeSnapshot::Text {
                data: data.clone(),
                attributes: node.attributes.clone(),
            },
            NodeKind::Element { name, children } => NodeSnapshot::Element {
                name: name.clone(),
                attributes: node.attributes.clone(),
                children: children
                    .iter()
                    .map(|child| self.snapshot(*child))
                    .collect::<Result<_>>()?,
            },
        })
    }

    /// Snapshots of the items of a flat range; partially covered text is cut.
    pub fn snapshot_range(&self, range: &Range) -> Result<Vec<NodeSnapshot>> {
        if !range.is_flat() {
            return Err(EngineError::InvalidRange("expected a flat range".into()));
        }
        self.items(range, false)?
            .into_iter()
            .map(|item| match item {
                Item::Element(id) => self.snapshot(id),
                Item::Text(proxy) => Ok(NodeSnapshot::Text {
                    data: proxy.data,
                    attributes: self.attributes(proxy.node).cloned().unwrap_or_default(),
                }),
            })
            .collect()
    }

    fn create_from_snapshot(&mut self, snapshot: &NodeSnapshot, parent: NodeId) -> NodeId {
        match snapshot {
            NodeSnapshot::Text { data, attributes } => {
                let mut node = Node::text(data.clone(), attributes.clone());
                node.parent = Some(parent);
                self.alloc(node)
            }
            NodeSnapshot::Element {
                name,
                attributes,
                children,
            } => {
                let mut node = Node::element(name.clone(), attributes.clone());
                node.parent = Some(parent);
                let id = self.alloc(node);
                let ids: Vec<NodeId> = children
                    .iter()
                    .map(|child| self.create_from_snapshot(child, id))
                    .collect();
                if let Ok(children) = self.children_mut(id) {
                    *children = ids;
                }
                self.normalize_text(id);
                id
            }
        }
    }

    // ---- mutation primitives used by operations ----

    pub(crate) fn units_of(&self, parent: NodeId) -> Vec<Unit> {
        let mut units = Vec::new();
        for child in self.children(parent) {
            let Some(node) = self.node(*child) else { continue };
            match &node.kind {
                NodeKind::Text { data } => units.extend(data.chars().map(|c| Unit {
                    key: UnitKey::Char(c),
                    attributes: node.attributes.clone(),
                })),
                NodeKind::Element { .. } => units.push(Unit {
                    key: UnitKey::Element(*child),
                    attributes: node.attributes.clone(),
                }),
            }
        }
        units
    }

    fn capture(&mut self, parent: NodeId) {
        if self.differ.is_tracking(parent) || !self.is_attached(parent) {
            return;
        }
        let units = self.units_of(parent);
        self.differ.capture(parent, units);
    }

    /// Makes sure a child boundary exists at `offset`, splitting a text node
    /// if needed. Returns the child index at that boundary.
    fn split_at(&mut self, parent: NodeId, offset: usize) -> Result<usize> {
        let children = self.children_mut(parent)?.clone();
        let mut start = 0;
        for (index, child) in children.iter().enumerate() {
            if start == offset {
                return Ok(index);
            }
            let size = self.offset_size(*child);
            if offset < start + size {
                let node = self.get_mut(*child)?;
                let attributes = node.attributes.clone();
                let right = match &mut node.kind {
                    NodeKind::Text { data } => {
                        let at = data
                            .char_indices()
                            .nth(offset - start)
                            .map_or(data.len(), |(byte, _)| byte);
                        data.split_off(at)
                    }
                    NodeKind::Element { .. } => {
                        return Err(EngineError::InvalidPosition(format!(
                            "offset {offset} is inside element {child:?}"
                        )))
                    }
                };
                let mut tail = Node::text(right, attributes);
                tail.parent = Some(parent);
                let tail = self.alloc(tail);
                self.children_mut(parent)?.insert(index + 1, tail);
                return Ok(index + 1);
            }
            start += size;
        }
        if start == offset {
            Ok(children.len())
        } else {
            Err(EngineError::InvalidPosition(format!(
                "offset {offset} is past the end of {parent:?}"
            )))
        }
    }

    /// Merges adjacent text nodes with equal attributes and drops empty ones.
    fn normalize_text(&mut self, parent: NodeId) {
        let children = match self.children_mut(parent) {
            Ok(children) => std::mem::take(children),
            Err(_) => return,
        };
        let mut result: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let Some(node) = self.node(child) else { continue };
            if let NodeKind::Text { data } = &node.kind {
                if data.is_empty() {
                    self.nodes[child.0] = None;
                    continue;
                }
                if let Some(&last) = result.last() {
                    let mergeable = self
                        .node(last)
                        .map_or(false, |prev| prev.is_text() && prev.attributes == node.attributes);
                    if mergeable {
                        let data = data.clone();
                        if let Some(Node {
                            kind: NodeKind::Text { data: prev },
                            ..
                        }) = self.nodes[last.0].as_mut()
                        {
                            prev.push_str(&data);
                        }
                        self.nodes[child.0] = None;
                        continue;
                    }
                }
            }
            result.push(child);
        }
        if let Ok(children) = self.children_mut(parent) {
            *children = result;
        }
    }

    pub(crate) fn insert_nodes(&mut self, position: Position, nodes: &[NodeSnapshot]) -> Result<()> {
        self.capture(position.parent);
        let index = self.split_at(position.parent, position.offset)?;
        let ids: Vec<NodeId> = nodes
            .iter()
            .map(|snapshot| self.create_from_snapshot(snapshot, position.parent))
            .collect();
        let length = super::offset_size_of(nodes);
        self.children_mut(position.parent)?
            .splice(index..index, ids);
        self.normalize_text(position.parent);
        self.transform_selection_on_insert(position, length);
        self.version += 1;
        Ok(())
    }

    /// Takes `length` offsets out of `parent` starting at `offset`.
    pub(crate) fn detach(
        &mut self,
        parent: NodeId,
        offset: usize,
        length: usize,
        removal: bool,
    ) -> Result<Vec<NodeId>> {
        if offset + length > self.max_offset(parent) {
            return Err(EngineError::InvalidRange(format!(
                "{offset}+{length} exceeds the content of {parent:?}"
            )));
        }
        self.capture(parent);
        self.split_at(parent, offset + length)?;
        let start = self.split_at(parent, offset)?;
        let end = self.boundary_index(parent, offset + length)?;
        let detached: Vec<NodeId> = self.children_mut(parent)?.drain(start..end).collect();
        for id in &detached {
            self.get_mut(*id)?.parent = None;
        }
        self.normalize_text(parent);
        self.transform_selection_on_remove(parent, offset, length, &detached, removal);
        self.version += 1;
        Ok(detached)
    }

    /// Child index of a boundary created by `split_at`.
    fn boundary_index(&self, parent: NodeId, offset: usize) -> Result<usize> {
        let mut start = 0;
        for (index, child) in self.children(parent).iter().enumerate() {
            if start == offset {
                return Ok(index);
            }
            start += self.offset_size(*child);
        }
        if start == offset {
            Ok(self.children(parent).len())
        } else {
            Err(EngineError::InvalidPosition(format!(
                "no boundary at {offset} in {parent:?}"
            )))
        }
    }

    pub(crate) fn attach(&mut self, position: Position, ids: &[NodeId]) -> Result<()> {
        self.capture(position.parent);
        let index = self.split_at(position.parent, position.offset)?;
        let mut length = 0;
        for id in ids {
            let node = self.get_mut(*id)?;
            node.parent = Some(position.parent);
            length += node.offset_size();
        }
        self.children_mut(position.parent)?
            .splice(index..index, ids.iter().copied());
        self.normalize_text(position.parent);
        self.transform_selection_on_insert(position, length);
        self.version += 1;
        Ok(())
    }

    /// Sets (or with `None` removes) `key` on every item of a flat range.
    pub(crate) fn set_attribute_in(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        key: &str,
        value: Option<&Value>,
    ) -> Result<()> {
        self.capture(parent);
        self.split_at(parent, end)?;
        let first = self.split_at(parent, start)?;
        let last = self.boundary_index(parent, end)?;
        let targets: Vec<NodeId> = self.children(parent)[first..last].to_vec();
        for id in targets {
            let node = self.get_mut(id)?;
            match value {
                Some(value) => node.attributes.insert(key.to_string(), value.clone()),
                None => node.attributes.remove(key),
            };
        }
        self.normalize_text(parent);
        self.version += 1;
        Ok(())
    }

    // ---- selection ----

    pub(crate) fn set_selection_range(&mut self, range: Range, backward: bool) {
        self.selection.range = range;
        self.selection.backward = backward;
        self.refresh_selection_attributes(true);
    }

    pub(crate) fn set_selection_attribute(&mut self, key: &str, value: Value) {
        self.selection.set_explicit_attribute(key, value);
    }

    pub(crate) fn remove_selection_attribute(&mut self, key: &str) {
        self.selection.remove_explicit_attribute(key);
    }

    /// Re-infers selection attributes from the surrounding text.
    pub(crate) fn refresh_selection_attributes(&mut self, clear_explicit: bool) {
        let inferred = self.surrounding_attributes();
        self.selection.apply_inferred(inferred, clear_explicit);
    }

    fn surrounding_attributes(&self) -> Attributes {
        let range = self.selection.range();
        if !range.is_collapsed() {
            let first_text = self.items(&range, true).ok().and_then(|items| {
                items.into_iter().find_map(|item| match item {
                    Item::Text(proxy) => Some(proxy.node),
                    Item::Element(_) => None,
                })
            });
            return first_text
                .and_then(|node| self.attributes(node).cloned())
                .unwrap_or_default();
        }
        let focus = self.selection.focus();
        let before = self
            .text_node_at(focus)
            .or_else(|| self.node_before(focus).filter(|n| self.is_text(*n)));
        let around = before.or_else(|| self.node_after(focus).filter(|n| self.is_text(*n)));
        around
            .and_then(|node| self.attributes(node).cloned())
            .unwrap_or_default()
    }

    fn transform_selection_on_insert(&mut self, at: Position, length: usize) {
        let collapsed = self.selection.range.is_collapsed();
        let shift = |position: &mut Position, sticky: bool| {
            if position.parent == at.parent
                && (position.offset > at.offset || (sticky && position.offset == at.offset))
            {
                position.offset += length;
            }
        };
        shift(&mut self.selection.range.start, true);
        shift(&mut self.selection.range.end, collapsed);
    }

    fn transform_selection_on_remove(
        &mut self,
        parent: NodeId,
        offset: usize,
        length: usize,
        removed: &[NodeId],
        removal: bool,
    ) {
        let mut start = self.selection.range.start;
        let mut end = self.selection.range.end;
        for position in [&mut start, &mut end] {
            if position.parent == parent {
                if position.offset >= offset + length {
                    position.offset -= length;
                } else if position.offset > offset {
                    position.offset = offset;
                }
            } else if removal && removed.iter().any(|id| self.contains(*id, position.parent)) {
                *position = Position::new(parent, offset);
            }
        }
        self.selection.range = Range::new(start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paragraph(text: &str) -> NodeSnapshot {
        NodeSnapshot::element("paragraph").with_children(vec![NodeSnapshot::text(text)])
    }

    #[test]
    fn test_insert_merges_text_with_equal_attributes() {
        let mut doc = Document::new();
        doc.insert_nodes(Position::new(doc.root(), 0), &[paragraph("foobar")])
            .unwrap();
        let p = doc.children(doc.root())[0];

        doc.insert_nodes(Position::new(p, 3), &[NodeSnapshot::text("X")])
            .unwrap();

        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "fooXbar");
    }

    #[test]
    fn test_attribute_splits_text() {
        let mut doc = Document::new();
        doc.insert_nodes(Position::new(doc.root(), 0), &[paragraph("foobar")])
            .unwrap();
        let p = doc.children(doc.root())[0];

        doc.set_attribute_in(p, 1, 3, "bold", Some(&json!(true)))
            .unwrap();

        let children = doc.children(p);
        assert_eq!(children.len(), 3);
        assert_eq!(doc.data(children[1]), Some("oo"));
        assert_eq!(doc.attribute(children[1], "bold"), Some(&json!(true)));
    }

    #[test]
    fn test_paths_round_trip() {
        let mut doc = Document::new();
        doc.insert_nodes(
            Position::new(doc.root(), 0),
            &[paragraph("abc"), paragraph("def")],
        )
        .unwrap();
        let second = doc.children(doc.root())[1];
        let position = Position::new(second, 2);

        let path = doc.path_of(position).unwrap();
        assert_eq!(path, vec![1, 2]);
        assert_eq!(doc.position_at_path(&path).unwrap(), position);
    }

    #[test]
    fn test_flat_ranges_across_blocks() {
        let mut doc = Document::new();
        doc.insert_nodes(
            Position::new(doc.root(), 0),
            &[paragraph("abc"), paragraph("def"), paragraph("ghi")],
        )
        .unwrap();
        let blocks = doc.children(doc.root()).to_vec();
        let range = Range::new(Position::new(blocks[0], 1), Position::new(blocks[2], 2));

        let ranges = doc.flat_ranges(&range).unwrap();
        assert_eq!(
            ranges,
            vec![
                Range::flat(blocks[0], 1, 3),
                Range::flat(doc.root(), 1, 2),
                Range::flat(blocks[2], 0, 2),
            ]
        );
    }

    #[test]
    fn test_detach_moves_selection_out_of_removed_element() {
        let mut doc = Document::new();
        doc.insert_nodes(
            Position::new(doc.root(), 0),
            &[paragraph("abc"), paragraph("def")],
        )
        .unwrap();
        let second = doc.children(doc.root())[1];
        doc.set_selection_range(Range::collapsed(Position::new(second, 1)), false);

        doc.detach(doc.root(), 1, 1, true).unwrap();

        assert_eq!(
            doc.selection().focus(),
            Position::new(doc.root(), 1)
        );
    }

    #[test]
    fn test_text_node_at_and_neighbours() {
        let mut doc = Document::new();
        doc.insert_nodes(Position::new(doc.root(), 0), &[paragraph("foobar")])
            .unwrap();
        let p = doc.children(doc.root())[0];
        doc.set_attribute_in(p, 3, 6, "bold", Some(&json!(true)))
            .unwrap();

        assert!(doc.text_node_at(Position::new(p, 1)).is_some());
        assert!(doc.text_node_at(Position::new(p, 3)).is_none());
        let before = doc.node_before(Position::new(p, 3)).unwrap();
        let after = doc.node_after(Position::new(p, 3)).unwrap();
        assert_eq!(doc.data(before), Some("foo"));
        assert_eq!(doc.data(after), Some("bar"));
    }
}
