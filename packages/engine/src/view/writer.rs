//! Mutations of the view tree used by downcast converters.

use super::{View, ViewElement, ViewElementKind, ViewId, ViewNodeKind, ViewPosition, ViewRange};
use crate::error::{EngineError, Result};
use serde_json::Value;

pub struct ViewWriter<'a> {
    view: &'a mut View,
}

impl<'a> ViewWriter<'a> {
    pub fn new(view: &'a mut View) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &View {
        self.view
    }

    // ---- creation ----

    fn create(&mut self, name: &str, kind: ViewElementKind, attributes: &[(&str, &str)]) -> ViewId {
        let mut element = ViewElement::new(name, kind);
        for (key, value) in attributes {
            element.set_attribute(key, value);
        }
        self.view.alloc(ViewNodeKind::Element(element))
    }

    pub fn create_container_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> ViewId {
        self.create(name, ViewElementKind::Container, attributes)
    }

    pub fn create_attribute_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        priority: i32,
        id: Option<String>,
    ) -> ViewId {
        self.create(name, ViewElementKind::Attribute { priority, id }, attributes)
    }

    pub fn create_empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> ViewId {
        self.create(name, ViewElementKind::Empty, attributes)
    }

    pub fn create_ui_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> ViewId {
        self.create(name, ViewElementKind::Ui, attributes)
    }

    pub fn create_editable_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> ViewId {
        self.create(name, ViewElementKind::Editable, attributes)
    }

    pub fn create_text(&mut self, data: &str) -> ViewId {
        self.view.alloc(ViewNodeKind::Text(data.to_string()))
    }

    /// Frees a node that is no longer attached, with its subtree.
    pub fn release(&mut self, id: ViewId) {
        self.view.release(id);
    }

    // ---- element properties ----

    fn element_mut(&mut self, id: ViewId) -> Result<&mut ViewElement> {
        self.view
            .element_mut(id)
            .ok_or(EngineError::ViewNodeNotFound(id))
    }

    pub fn set_attribute(&mut self, key: &str, value: &str, id: ViewId) -> Result<()> {
        self.element_mut(id)?.set_attribute(key, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, key: &str, id: ViewId) -> Result<()> {
        let element = self.element_mut(id)?;
        match key {
            "class" => element.classes.clear(),
            "style" => element.styles.clear(),
            _ => {
                element.attributes.remove(key);
            }
        }
        Ok(())
    }

    pub fn add_class(&mut self, class: &str, id: ViewId) -> Result<()> {
        self.element_mut(id)?.classes.insert(class.to_string());
        Ok(())
    }

    pub fn remove_class(&mut self, class: &str, id: ViewId) -> Result<()> {
        self.element_mut(id)?.classes.remove(class);
        Ok(())
    }

    pub fn set_style(&mut self, key: &str, value: &str, id: ViewId) -> Result<()> {
        self.element_mut(id)?
            .styles
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_style(&mut self, key: &str, id: ViewId) -> Result<()> {
        self.element_mut(id)?.styles.remove(key);
        Ok(())
    }

    pub fn set_custom_property(&mut self, key: &str, value: Value, id: ViewId) -> Result<()> {
        self.element_mut(id)?
            .custom_properties
            .insert(key.to_string(), value);
        Ok(())
    }

    // ---- structure ----

    fn children_mut(&mut self, id: ViewId) -> Result<&mut Vec<ViewId>> {
        Ok(&mut self.element_mut(id)?.children)
    }

    fn set_parent(&mut self, id: ViewId, parent: Option<ViewId>) {
        if let Some(node) = self.view.node_mut(id) {
            node.parent = parent;
        }
    }

    /// Appends `child` as the last child of `parent` without any breaking or
    /// merging.
    pub fn append(&mut self, child: ViewId, parent: ViewId) -> Result<()> {
        self.children_mut(parent)?.push(child);
        self.set_parent(child, Some(parent));
        Ok(())
    }

    /// Splits text and attribute elements at `position` until it lies in a
    /// non-attribute element. Returns the resulting position.
    pub fn break_attributes(&mut self, position: ViewPosition) -> Result<ViewPosition> {
        let mut position = position;

        if let Some(data) = self.view.text(position.parent).map(str::to_string) {
            let text = position.parent;
            let parent = self
                .view
                .parent(text)
                .ok_or(EngineError::ViewNodeNotFound(text))?;
            let index = self
                .view
                .index_in_parent(text)
                .ok_or(EngineError::ViewNodeNotFound(text))?;
            let length = data.chars().count();
            position = if position.offset == 0 {
                ViewPosition::new(parent, index)
            } else if position.offset >= length {
                ViewPosition::new(parent, index + 1)
            } else {
                let left: String = data.chars().take(position.offset).collect();
                let right: String = data.chars().skip(position.offset).collect();
                if let Some(node) = self.view.node_mut(text) {
                    node.kind = ViewNodeKind::Text(left);
                }
                let tail = self.create_text(&right);
                self.children_mut(parent)?.insert(index + 1, tail);
                self.set_parent(tail, Some(parent));
                ViewPosition::new(parent, index + 1)
            };
        }

        while self.view.is_attribute(position.parent) {
            let element = position.parent;
            let parent = self
                .view
                .parent(element)
                .ok_or(EngineError::ViewNodeNotFound(element))?;
            let index = self
                .view
                .index_in_parent(element)
                .ok_or(EngineError::ViewNodeNotFound(element))?;
            let count = self.view.children(element).len();
            position = if position.offset == 0 {
                ViewPosition::new(parent, index)
            } else if position.offset >= count {
                ViewPosition::new(parent, index + 1)
            } else {
                let clone = self
                    .view
                    .element(element)
                    .map(ViewElement::shallow_clone)
                    .ok_or(EngineError::ViewNodeNotFound(element))?;
                let clone = self.view.alloc(ViewNodeKind::Element(clone));
                let moved: Vec<ViewId> = self.children_mut(element)?.drain(position.offset..).collect();
                for child in &moved {
                    self.set_parent(*child, Some(clone));
                }
                *self.children_mut(clone)? = moved;
                self.children_mut(parent)?.insert(index + 1, clone);
                self.set_parent(clone, Some(parent));
                ViewPosition::new(parent, index + 1)
            };
        }

        Ok(position)
    }

    /// Breaks both ends of a range. Returns the container and child indexes.
    fn break_range(&mut self, range: ViewRange) -> Result<(ViewId, usize, usize)> {
        let end = self.break_attributes(range.end)?;
        let before = self.view.children(end.parent).len();
        let start = self.break_attributes(range.start)?;
        if start.parent != end.parent {
            return Err(EngineError::Conversion(
                "view range boundaries are in different containers".into(),
            ));
        }
        let added = self.view.children(end.parent).len() - before;
        Ok((start.parent, start.offset, end.offset + added))
    }

    pub fn insert(&mut self, position: ViewPosition, node: ViewId) -> Result<()> {
        let position = self.break_attributes(position)?;
        let children = self.children_mut(position.parent)?;
        let index = position.offset.min(children.len());
        children.insert(index, node);
        self.set_parent(node, Some(position.parent));
        self.normalize(position.parent);
        Ok(())
    }

    /// Removes the content of a range and returns the detached nodes.
    pub fn remove(&mut self, range: ViewRange) -> Result<Vec<ViewId>> {
        if range.is_collapsed() {
            return Ok(Vec::new());
        }
        let (container, start, end) = self.break_range(range)?;
        let removed: Vec<ViewId> = self.children_mut(container)?.drain(start..end).collect();
        for node in &removed {
            self.set_parent(*node, None);
        }
        self.normalize(container);
        Ok(removed)
    }

    /// Wraps the content of a range in copies of the attribute element
    /// `wrapper`, respecting priorities.
    pub fn wrap(&mut self, range: ViewRange, wrapper: ViewId) -> Result<()> {
        if range.is_collapsed() {
            return Ok(());
        }
        let template = self
            .view
            .element(wrapper)
            .filter(|e| e.is_attribute())
            .cloned()
            .ok_or_else(|| EngineError::Conversion("wrap requires an attribute element".into()))?;
        let (container, start, end) = self.break_range(range)?;
        self.wrap_children(container, start, end, &template)?;
        self.normalize(container);
        Ok(())
    }

    fn wrap_children(&mut self, parent: ViewId, start: usize, end: usize, template: &ViewElement) -> Result<()> {
        let children: Vec<ViewId> = self.view.children(parent)[start..end].to_vec();
        for (i, child) in children.into_iter().enumerate() {
            let element = self.view.element(child).cloned();
            match element {
                Some(existing) if existing.is_attribute() => {
                    if existing.is_similar(template) {
                        continue;
                    }
                    if should_be_outside(template, &existing) {
                        self.wrap_node(parent, start + i, child, template)?;
                    } else {
                        let count = existing.children.len();
                        self.wrap_children(child, 0, count, template)?;
                    }
                }
                Some(existing)
                    if matches!(
                        existing.kind,
                        ViewElementKind::Container | ViewElementKind::Editable | ViewElementKind::Root
                    ) => {}
                _ => self.wrap_node(parent, start + i, child, template)?,
            }
        }
        Ok(())
    }

    fn wrap_node(&mut self, parent: ViewId, index: usize, child: ViewId, template: &ViewElement) -> Result<()> {
        let wrapper = self.view.alloc(ViewNodeKind::Element(template.shallow_clone()));
        self.children_mut(parent)?[index] = wrapper;
        self.set_parent(wrapper, Some(parent));
        self.children_mut(wrapper)?.push(child);
        self.set_parent(child, Some(wrapper));
        Ok(())
    }

    /// Removes attribute elements similar to `wrapper` from a range, keeping
    /// their content.
    pub fn unwrap(&mut self, range: ViewRange, wrapper: ViewId) -> Result<()> {
        if range.is_collapsed() {
            return Ok(());
        }
        let template = self
            .view
            .element(wrapper)
            .cloned()
            .ok_or(EngineError::ViewNodeNotFound(wrapper))?;
        let (container, start, end) = self.break_range(range)?;
        self.unwrap_children(container, start, end, &template)?;
        self.normalize(container);
        Ok(())
    }

    fn unwrap_children(&mut self, parent: ViewId, start: usize, end: usize, template: &ViewElement) -> Result<()> {
        let mut index = start;
        let mut end = end;
        while index < end {
            let child = self.view.children(parent)[index];
            let element = self.view.element(child).cloned();
            if let Some(existing) = element.filter(ViewElement::is_attribute) {
                if existing.is_similar(template) {
                    let inner = existing.children;
                    for node in &inner {
                        self.set_parent(*node, Some(parent));
                    }
                    self.set_parent(child, None);
                    self.children_mut(child)?.clear();
                    self.view.release(child);
                    let count = inner.len();
                    self.children_mut(parent)?.splice(index..index + 1, inner);
                    end = end + count - 1;
                    index += count;
                    continue;
                }
                let count = existing.children.len();
                self.unwrap_children(child, 0, count, template)?;
            }
            index += 1;
        }
        Ok(())
    }

    /// Merges adjacent text nodes and similar attribute elements, drops empty
    /// text and empty attribute elements.
    pub fn normalize(&mut self, parent: ViewId) {
        let Ok(children) = self.children_mut(parent).map(std::mem::take) else {
            return;
        };
        let mut result: Vec<ViewId> = Vec::with_capacity(children.len());
        for child in children {
            if self.view.text(child).map_or(false, str::is_empty) {
                self.set_parent(child, None);
                self.view.release(child);
                continue;
            }
            if self.view.is_attribute(child) && self.view.children(child).is_empty() {
                self.set_parent(child, None);
                self.view.release(child);
                continue;
            }
            if let Some(&last) = result.last() {
                if let (Some(a), Some(b)) = (self.view.text(last), self.view.text(child)) {
                    let merged = format!("{a}{b}");
                    if let Some(node) = self.view.node_mut(last) {
                        node.kind = ViewNodeKind::Text(merged);
                    }
                    self.set_parent(child, None);
                    self.view.release(child);
                    continue;
                }
                let similar = match (self.view.element(last), self.view.element(child)) {
                    (Some(a), Some(b)) => a.is_similar(b),
                    _ => false,
                };
                if similar {
                    let moved = self
                        .children_mut(child)
                        .map(std::mem::take)
                        .unwrap_or_default();
                    for node in &moved {
                        self.set_parent(*node, Some(last));
                    }
                    if let Ok(children) = self.children_mut(last) {
                        children.extend(moved);
                    }
                    self.set_parent(child, None);
                    self.view.release(child);
                    continue;
                }
            }
            result.push(child);
        }
        for child in &result {
            if self.view.is_attribute(*child) {
                self.normalize(*child);
            }
        }
        if let Ok(children) = self.children_mut(parent) {
            *children = result;
        }
    }
}

/// Lower priority wraps higher priority; ties are broken by identity.
fn should_be_outside(a: &ViewElement, b: &ViewElement) -> bool {
    match a.priority().cmp(&b.priority()) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => a.identity() < b.identity(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::DEFAULT_PRIORITY;

    fn paragraph_with(view: &mut View, text: &str) -> (ViewId, ViewId) {
        let mut writer = ViewWriter::new(view);
        let p = writer.create_container_element("p", &[]);
        let t = writer.create_text(text);
        writer.append(t, p).unwrap();
        let root = writer.view().root();
        writer.append(p, root).unwrap();
        (p, t)
    }

    #[test]
    fn test_insert_inside_text_merges() {
        let mut view = View::new("div");
        let (p, t) = paragraph_with(&mut view, "foobar");
        let mut writer = ViewWriter::new(&mut view);
        let x = writer.create_text("X");

        writer.insert(ViewPosition::new(t, 3), x).unwrap();

        assert_eq!(view.children(p).len(), 1);
        assert_eq!(view.text_content(p), "fooXbar");
    }

    #[test]
    fn test_wrap_nests_by_priority() {
        let mut view = View::new("div");
        let (p, t) = paragraph_with(&mut view, "foo");
        let mut writer = ViewWriter::new(&mut view);
        let mention = writer.create_attribute_element("span", &[("class", "mention")], 20, Some("1".into()));
        let strong = writer.create_attribute_element("strong", &[], DEFAULT_PRIORITY, None);

        let all = ViewRange::new(ViewPosition::new(t, 0), ViewPosition::new(t, 3));
        writer.wrap(all, mention).unwrap();
        let all = writer.view().range_in(p);
        writer.wrap(all, strong).unwrap();

        let outer = view.children(p)[0];
        assert_eq!(view.name(outer), Some("strong"));
        let inner = view.children(outer)[0];
        assert_eq!(view.name(inner), Some("span"));
    }

    #[test]
    fn test_unwrap_restores_text() {
        let mut view = View::new("div");
        let (p, t) = paragraph_with(&mut view, "foobar");
        let mut writer = ViewWriter::new(&mut view);
        let strong = writer.create_attribute_element("strong", &[], DEFAULT_PRIORITY, None);

        writer
            .wrap(ViewRange::new(ViewPosition::new(t, 1), ViewPosition::new(t, 4)), strong)
            .unwrap();
        assert_eq!(view.children(p).len(), 3);

        let mut writer = ViewWriter::new(&mut view);
        let range = writer.view().range_in(p);
        writer.unwrap(range, strong).unwrap();
        assert_eq!(view.children(p).len(), 1);
        assert_eq!(view.text_content(p), "foobar");
    }

    #[test]
    fn test_remove_partial_attribute_content() {
        let mut view = View::new("div");
        let (p, t) = paragraph_with(&mut view, "foobar");
        let mut writer = ViewWriter::new(&mut view);
        let strong = writer.create_attribute_element("strong", &[], DEFAULT_PRIORITY, None);
        writer.wrap(writer.view().range_in(p), strong).unwrap();
        let inner_text = view.children(view.children(p)[0])[0];
        assert_eq!(inner_text, t);

        let mut writer = ViewWriter::new(&mut view);
        writer
            .remove(ViewRange::new(ViewPosition::new(t, 1), ViewPosition::new(t, 3)))
            .unwrap();

        assert_eq!(view.children(p).len(), 1);
        assert_eq!(view.text_content(p), "fbar");
    }
}
