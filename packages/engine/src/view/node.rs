//! View tree: a DOM-like arena of elements and text.

use super::{ViewPosition, ViewRange};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

/// Priority given to attribute elements created without an explicit one.
pub const DEFAULT_PRIORITY: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewElementKind {
    /// Structural element bound to a model element (`<p>`, `<figure>`).
    Container,
    /// Formatting wrapper (`<strong>`, `<span class="mention">`). Lower
    /// priority elements are nested outside higher priority ones.
    Attribute { priority: i32, id: Option<String> },
    /// Editor chrome; never maps to model content.
    Ui,
    /// Element that cannot have children (`<video>`, `<img>`).
    Empty,
    /// Nested editable region inside a widget (`<figcaption>`).
    Editable,
    Root,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewElement {
    pub name: String,
    pub kind: ViewElementKind,
    pub attributes: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    pub styles: BTreeMap<String, String>,
    pub custom_properties: BTreeMap<String, Value>,
    pub children: Vec<ViewId>,
}

impl ViewElement {
    pub fn new(name: impl Into<String>, kind: ViewElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            styles: BTreeMap::new(),
            custom_properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, ViewElementKind::Attribute { .. })
    }

    pub fn priority(&self) -> i32 {
        match self.kind {
            ViewElementKind::Attribute { priority, .. } => priority,
            _ => DEFAULT_PRIORITY,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match &self.kind {
            ViewElementKind::Attribute { id, .. } => id.as_deref(),
            _ => None,
        }
    }

    /// Applies `class` and `style` specially; everything else is a plain
    /// attribute.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match key {
            "class" => self.classes.extend(value.split_whitespace().map(str::to_string)),
            "style" => self.styles.extend(parse_style(value)),
            _ => {
                self.attributes.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Copy without children.
    pub fn shallow_clone(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Same formatting: two attribute elements that may be merged.
    pub fn is_similar(&self, other: &ViewElement) -> bool {
        if !self.is_attribute() || !other.is_attribute() {
            return false;
        }
        if self.name != other.name || self.priority() != other.priority() {
            return false;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.attributes == other.attributes
                    && self.classes == other.classes
                    && self.styles == other.styles
            }
            _ => false,
        }
    }

    /// Stable textual identity used to order attribute elements of equal
    /// priority.
    pub fn identity(&self) -> String {
        let mut identity = self.name.clone();
        if !self.classes.is_empty() {
            identity.push_str(&format!(" class=\"{}\"", join_classes(&self.classes)));
        }
        if !self.styles.is_empty() {
            identity.push_str(&format!(" style=\"{}\"", join_styles(&self.styles)));
        }
        for (key, value) in &self.attributes {
            identity.push_str(&format!(" {key}=\"{value}\""));
        }
        identity
    }
}

pub fn parse_style(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|declaration| {
            let (key, value) = declaration.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn join_styles(styles: &BTreeMap<String, String>) -> String {
    styles
        .iter()
        .map(|(key, value)| format!("{key}:{value};"))
        .collect()
}

pub fn join_classes(classes: &BTreeSet<String>) -> String {
    classes.iter().cloned().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewNodeKind {
    Element(ViewElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    pub kind: ViewNodeKind,
    pub parent: Option<ViewId>,
}

/// Arena of view nodes. Slots of released nodes are reused by later
/// allocations.
#[derive(Debug, Clone)]
pub struct View {
    nodes: Vec<Option<ViewNode>>,
    free: Vec<usize>,
    root: ViewId,
    pub selection: Option<ViewRange>,
}

impl View {
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Some(ViewNode {
                kind: ViewNodeKind::Element(ViewElement::new(root_name, ViewElementKind::Root)),
                parent: None,
            })],
            free: Vec::new(),
            root: ViewId(0),
            selection: None,
        }
    }

    pub fn root(&self) -> ViewId {
        self.root
    }

    pub(crate) fn alloc(&mut self, kind: ViewNodeKind) -> ViewId {
        let node = Some(ViewNode { kind, parent: None });
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                ViewId(index)
            }
            None => {
                self.nodes.push(node);
                ViewId(self.nodes.len() - 1)
            }
        }
    }

    /// Frees a detached node and the subtree under it. Attached nodes and
    /// the root are left alone.
    pub(crate) fn release(&mut self, id: ViewId) {
        if id == self.root || self.parent(id).is_some() {
            return;
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) else {
                continue;
            };
            if let ViewNodeKind::Element(element) = node.kind {
                pending.extend(
                    element
                        .children
                        .into_iter()
                        .filter(|child| self.parent(*child) == Some(next)),
                );
            }
            self.free.push(next.0);
        }
    }

    /// Live nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn node(&self, id: ViewId) -> Option<&ViewNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, id: ViewId) -> Option<&mut ViewNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn element(&self, id: ViewId) -> Option<&ViewElement> {
        match &self.node(id)?.kind {
            ViewNodeKind::Element(element) => Some(element),
            ViewNodeKind::Text(_) => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: ViewId) -> Option<&mut ViewElement> {
        match &mut self.node_mut(id)?.kind {
            ViewNodeKind::Element(element) => Some(element),
            ViewNodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: ViewId) -> Option<&str> {
        match &self.node(id)?.kind {
            ViewNodeKind::Text(data) => Some(data),
            ViewNodeKind::Element(_) => None,
        }
    }

    pub fn is_text(&self, id: ViewId) -> bool {
        self.text(id).is_some()
    }

    pub fn kind(&self, id: ViewId) -> Option<&ViewElementKind> {
        self.element(id).map(|e| &e.kind)
    }

    pub fn is_attribute(&self, id: ViewId) -> bool {
        self.element(id).map_or(false, ViewElement::is_attribute)
    }

    pub fn is_ui(&self, id: ViewId) -> bool {
        matches!(self.kind(id), Some(ViewElementKind::Ui))
    }

    pub fn name(&self, id: ViewId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ViewId) -> &[ViewId] {
        self.element(id).map_or(&[], |e| e.children.as_slice())
    }

    pub fn index_in_parent(&self, id: ViewId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn attribute(&self, id: ViewId, key: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attributes.get(key))
            .map(String::as_str)
    }

    pub fn has_class(&self, id: ViewId, class: &str) -> bool {
        self.element(id).map_or(false, |e| e.classes.contains(class))
    }

    pub fn style(&self, id: ViewId, key: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.styles.get(key))
            .map(String::as_str)
    }

    pub fn custom_property(&self, id: ViewId, key: &str) -> Option<&Value> {
        self.element(id).and_then(|e| e.custom_properties.get(key))
    }

    /// Descendants in document order, not including `id`.
    pub fn descendants(&self, id: ViewId) -> Vec<ViewId> {
        let mut result = Vec::new();
        for child in self.children(id) {
            result.push(*child);
            result.extend(self.descendants(*child));
        }
        result
    }

    pub fn ancestors(&self, id: ViewId) -> Vec<ViewId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// First child element named `name`.
    pub fn child_named(&self, id: ViewId, name: &str) -> Option<ViewId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.name(*child) == Some(name))
    }

    pub fn text_content(&self, id: ViewId) -> String {
        match self.node(id).map(|n| &n.kind) {
            Some(ViewNodeKind::Text(data)) => data.clone(),
            Some(ViewNodeKind::Element(element)) => element
                .children
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
            None => String::new(),
        }
    }

    pub fn position_before(&self, id: ViewId) -> Option<ViewPosition> {
        Some(ViewPosition::new(self.parent(id)?, self.index_in_parent(id)?))
    }

    pub fn position_after(&self, id: ViewId) -> Option<ViewPosition> {
        Some(ViewPosition::new(self.parent(id)?, self.index_in_parent(id)? + 1))
    }

    pub fn range_on(&self, id: ViewId) -> Option<ViewRange> {
        Some(ViewRange::new(self.position_before(id)?, self.position_after(id)?))
    }

    pub fn range_in(&self, id: ViewId) -> ViewRange {
        ViewRange::new(
            ViewPosition::new(id, 0),
            ViewPosition::new(id, self.children(id).len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_attribute_elements() {
        let mut a = ViewElement::new(
            "span",
            ViewElementKind::Attribute {
                priority: 20,
                id: Some("1".into()),
            },
        );
        a.set_attribute("class", "mention");
        let mut b = a.clone();
        b.set_attribute("data-mention", "@Lily");
        assert!(a.is_similar(&b), "ids decide similarity");

        let strong = ViewElement::new(
            "strong",
            ViewElementKind::Attribute {
                priority: DEFAULT_PRIORITY,
                id: None,
            },
        );
        assert!(!a.is_similar(&strong));
    }

    #[test]
    fn test_style_parsing() {
        let mut element = ViewElement::new("span", ViewElementKind::Container);
        element.set_attribute("style", "color: red; min-width:10px;");
        assert_eq!(element.styles.get("color").map(String::as_str), Some("red"));
        assert_eq!(join_styles(&element.styles), "color:red;min-width:10px;");
    }
}
