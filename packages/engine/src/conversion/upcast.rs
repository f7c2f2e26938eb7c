//! View → model conversion.
//!
//! Upcasting produces detached model content ([`NodeSnapshot`]s) which the
//! caller inserts with a writer. Each view item fires one event; listeners
//! fill `data.output` and claim the parts of the element they used.

use super::consumable::{Consumable, UpcastKey, ViewMatchPart};
use super::downcast::Priority;
use crate::error::Result;
use crate::model::{NodeSnapshot, Schema, TEXT_NAME};
use crate::view::{View, ViewId};
use std::rc::Rc;
use tracing::debug;

/// Selects view elements by name, classes, attributes and styles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewMatcher {
    name: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
    styles: Vec<(String, Option<String>)>,
}

impl ViewMatcher {
    pub fn element(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attribute(mut self, key: &str) -> Self {
        self.attributes.push((key.to_string(), None));
        self
    }

    pub fn attribute_value(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), Some(value.to_string())));
        self
    }

    pub fn style(mut self, key: &str) -> Self {
        self.styles.push((key.to_string(), None));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The parts of `element` this matcher would claim, or `None` if it does
    /// not match.
    pub fn matches(&self, view: &View, element: ViewId) -> Option<Vec<ViewMatchPart>> {
        let el = view.element(element)?;
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            if &el.name != name {
                return None;
            }
            parts.push(ViewMatchPart::Name);
        }
        for class in &self.classes {
            if !el.classes.contains(class) {
                return None;
            }
            parts.push(ViewMatchPart::Class(class.clone()));
        }
        for (key, expected) in &self.attributes {
            let value = el.attributes.get(key)?;
            if expected.as_ref().map_or(false, |expected| expected != value) {
                return None;
            }
            parts.push(ViewMatchPart::Attribute(key.clone()));
        }
        for (key, expected) in &self.styles {
            let value = el.styles.get(key)?;
            if expected.as_ref().map_or(false, |expected| expected != value) {
                return None;
            }
            parts.push(ViewMatchPart::Style(key.clone()));
        }
        Some(parts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpcastPattern {
    Element(Option<String>),
    Text,
}

impl UpcastPattern {
    fn matches(&self, view: &View, item: ViewId) -> bool {
        match self {
            UpcastPattern::Text => view.is_text(item),
            UpcastPattern::Element(name) => match view.name(item) {
                Some(actual) => name.as_deref().map_or(true, |name| name == actual),
                None => false,
            },
        }
    }

    fn specificity(&self) -> u8 {
        match self {
            UpcastPattern::Element(None) => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpcastData {
    pub view_item: ViewId,
    /// Name of the model element the output will be inserted into.
    pub parent_name: String,
    pub output: Option<Vec<NodeSnapshot>>,
}

pub struct UpcastApi<'a> {
    pub view: &'a View,
    pub schema: &'a Schema,
    pub consumable: &'a mut Consumable<UpcastKey>,
    /// Name of the element the whole conversion is inserted into.
    pub context: String,
    dispatcher: &'a UpcastDispatcher,
}

impl UpcastApi<'_> {
    pub fn convert_item(&mut self, item: ViewId, parent_name: &str) -> Result<Vec<NodeSnapshot>> {
        let dispatcher = self.dispatcher;
        dispatcher.convert_item(item, parent_name, self)
    }

    pub fn convert_children(&mut self, element: ViewId, parent_name: &str) -> Result<Vec<NodeSnapshot>> {
        let mut output = Vec::new();
        for child in self.view.children(element).to_vec() {
            output.extend(self.convert_item(child, parent_name)?);
        }
        Ok(output)
    }

    /// Tests and consumes all parts at once; nothing is consumed if any part
    /// is already taken.
    pub fn consume_all(&mut self, element: ViewId, parts: &[ViewMatchPart]) -> bool {
        let available = parts
            .iter()
            .all(|part| self.consumable.test(&(element, part.clone())) == Some(true));
        if !available {
            return false;
        }
        for part in parts {
            self.consumable.consume(&(element, part.clone()));
        }
        true
    }

    pub fn can_consume_all(&self, element: ViewId, parts: &[ViewMatchPart]) -> bool {
        parts
            .iter()
            .all(|part| self.consumable.test(&(element, part.clone())) == Some(true))
    }

    /// Whether `child` may be placed in `parent`. Inline content is also
    /// accepted directly in the conversion context, to be auto-paragraphed
    /// by the caller.
    pub fn allows(&self, parent: &str, child: &str) -> bool {
        self.schema.check_child(parent, child)
            || (parent == self.context && (child == TEXT_NAME || self.schema.is_inline(child)))
    }
}

pub type UpcastCallback = dyn Fn(&mut UpcastData, &mut UpcastApi<'_>) -> Result<()>;

struct Listener {
    pattern: UpcastPattern,
    priority: Priority,
    order: usize,
    callback: Rc<UpcastCallback>,
}

#[derive(Default)]
pub struct UpcastDispatcher {
    listeners: Vec<Listener>,
    next_order: usize,
}

impl std::fmt::Debug for UpcastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpcastDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl UpcastDispatcher {
    /// A dispatcher with the default text converter registered.
    pub fn new() -> Self {
        let mut dispatcher = Self::default();
        dispatcher.on(UpcastPattern::Text, Priority::Lowest, |data, api| {
            if data.output.is_some() {
                return Ok(());
            }
            let item = data.view_item;
            if !api.allows(&data.parent_name, TEXT_NAME) {
                return Ok(());
            }
            if !api.consumable.consume(&(item, ViewMatchPart::Name)) {
                return Ok(());
            }
            let text = api.view.text(item).unwrap_or_default();
            data.output = Some(vec![NodeSnapshot::text(text)]);
            Ok(())
        });
        dispatcher
    }

    pub fn on<F>(&mut self, pattern: UpcastPattern, priority: Priority, callback: F)
    where
        F: Fn(&mut UpcastData, &mut UpcastApi<'_>) -> Result<()> + 'static,
    {
        self.listeners.push(Listener {
            pattern,
            priority,
            order: self.next_order,
            callback: Rc::new(callback),
        });
        self.next_order += 1;
        self.listeners.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.pattern.specificity().cmp(&a.pattern.specificity()))
                .then_with(|| a.order.cmp(&b.order))
        });
    }

    /// Converts the children of `element` for insertion into a `context`
    /// model element.
    pub fn convert(&self, view: &View, element: ViewId, schema: &Schema, context: &str) -> Result<Vec<NodeSnapshot>> {
        let mut consumable = Consumable::new();
        for node in view.descendants(element) {
            add_parts(view, node, &mut consumable);
        }
        let mut api = UpcastApi {
            view,
            schema,
            consumable: &mut consumable,
            context: context.to_string(),
            dispatcher: self,
        };
        api.convert_children(element, context)
    }

    fn convert_item(&self, item: ViewId, parent_name: &str, api: &mut UpcastApi<'_>) -> Result<Vec<NodeSnapshot>> {
        let mut data = UpcastData {
            view_item: item,
            parent_name: parent_name.to_string(),
            output: None,
        };
        for listener in &self.listeners {
            if listener.pattern.matches(api.view, item) {
                (listener.callback)(&mut data, api)?;
            }
        }
        match data.output {
            Some(output) => Ok(output),
            // Unknown elements are dropped but their content is kept.
            None if !api.view.is_text(item) => {
                if let Some(name) = api.view.name(item) {
                    debug!(element = name, "no upcast converter, keeping children");
                }
                api.convert_children(item, parent_name)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn add_parts(view: &View, node: ViewId, consumable: &mut Consumable<UpcastKey>) {
    consumable.add((node, ViewMatchPart::Name));
    if let Some(element) = view.element(node) {
        for key in element.attributes.keys() {
            consumable.add((node, ViewMatchPart::Attribute(key.clone())));
        }
        for class in &element.classes {
            consumable.add((node, ViewMatchPart::Class(class.clone())));
        }
        for key in element.styles.keys() {
            consumable.add((node, ViewMatchPart::Style(key.clone())));
        }
    }
}

/// Wraps runs of inline content that is not allowed in `context` into
/// `paragraph` elements. Runs made only of whitespace text are dropped.
pub fn auto_paragraph(nodes: Vec<NodeSnapshot>, schema: &Schema, context: &str, paragraph: &str) -> Vec<NodeSnapshot> {
    let mut output = Vec::with_capacity(nodes.len());
    let mut run: Vec<NodeSnapshot> = Vec::new();

    fn flush(run: &mut Vec<NodeSnapshot>, output: &mut Vec<NodeSnapshot>, paragraph: &str) {
        let blank = run.iter().all(|node| match node {
            NodeSnapshot::Text { data, .. } => data.trim().is_empty(),
            NodeSnapshot::Element { .. } => false,
        });
        let nodes = std::mem::take(run);
        if !blank {
            output.push(NodeSnapshot::element(paragraph).with_children(nodes));
        }
    }

    for node in nodes {
        if schema.check_child(context, node.name()) {
            flush(&mut run, &mut output, paragraph);
            output.push(node);
        } else if schema.check_child(paragraph, node.name()) {
            run.push(node);
        } else {
            debug!(name = node.name(), "dropping content not allowed in {context}");
        }
    }
    flush(&mut run, &mut output, paragraph);
    output
}
