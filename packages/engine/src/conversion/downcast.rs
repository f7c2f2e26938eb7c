//! Model → view conversion.
//!
//! The dispatcher turns differ entries into typed events and runs the
//! listeners registered for them. Listeners are ordered by priority, then by
//! how specific their pattern is, then by registration order. A listener
//! claims the parts it handles through the consumable so lower listeners can
//! skip them.

use super::consumable::{ChangeEvent, Consumable, ConsumableItem, DowncastKey};
use super::mapper::Mapper;
use crate::error::Result;
use crate::model::{Attributes, ChangeEntry, Document, Item, NodeId, Position, Range, Schema, TEXT_NAME};
use crate::view::{View, ViewWriter};
use serde_json::Value;
use std::rc::Rc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

/// Which events a listener wants. `None` matches any item name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
    Insert(Option<String>),
    Attribute { key: String, name: Option<String> },
    Remove(Option<String>),
}

impl EventPattern {
    pub fn insert(name: &str) -> Self {
        EventPattern::Insert(Some(name.to_string()))
    }

    pub fn attribute(key: &str) -> Self {
        EventPattern::Attribute {
            key: key.to_string(),
            name: None,
        }
    }

    pub fn attribute_on(key: &str, name: &str) -> Self {
        EventPattern::Attribute {
            key: key.to_string(),
            name: Some(name.to_string()),
        }
    }

    pub fn remove(name: &str) -> Self {
        EventPattern::Remove(Some(name.to_string()))
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        fn name_matches(pattern: &Option<String>, name: &str) -> bool {
            pattern.as_deref().map_or(true, |expected| expected == name)
        }
        match (self, event) {
            (EventPattern::Insert(pattern), ChangeEvent::Insert { name }) => name_matches(pattern, name),
            (EventPattern::Remove(pattern), ChangeEvent::Remove { name }) => name_matches(pattern, name),
            (
                EventPattern::Attribute { key, name: pattern },
                ChangeEvent::Attribute { key: event_key, name },
            ) => key == event_key && name_matches(pattern, name),
            _ => false,
        }
    }

    fn specificity(&self) -> u8 {
        match self {
            EventPattern::Insert(name) | EventPattern::Remove(name) => u8::from(name.is_some()),
            EventPattern::Attribute { name, .. } => 1 + u8::from(name.is_some()),
        }
    }
}

/// Per-event state shared by the listeners of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    pub event: ChangeEvent,
    stopped: bool,
}

impl EventInfo {
    pub fn new(event: ChangeEvent) -> Self {
        Self {
            event,
            stopped: false,
        }
    }

    /// Prevents the remaining listeners from running.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DowncastData {
    Insert {
        item: Item,
        range: Range,
    },
    Attribute {
        item: Item,
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    Remove {
        position: Position,
        length: usize,
        name: String,
        /// The removed element; `None` for text.
        node: Option<NodeId>,
    },
}

impl DowncastData {
    pub fn item(&self) -> Option<&Item> {
        match self {
            DowncastData::Insert { item, .. } | DowncastData::Attribute { item, .. } => Some(item),
            DowncastData::Remove { .. } => None,
        }
    }

    pub fn range(&self) -> Option<&Range> {
        match self {
            DowncastData::Insert { range, .. } | DowncastData::Attribute { range, .. } => Some(range),
            DowncastData::Remove { .. } => None,
        }
    }

    /// Consumable token for this event.
    pub fn consumable_key(&self, event: &ChangeEvent) -> Option<DowncastKey> {
        self.item().map(|item| (ConsumableItem::of(item), event.clone()))
    }
}

impl ConsumableItem {
    pub fn of(item: &Item) -> Self {
        match item {
            Item::Element(id) => ConsumableItem::Element(*id),
            Item::Text(proxy) => ConsumableItem::from(proxy),
        }
    }
}

/// What a downcast listener gets to work with.
pub struct DowncastApi<'a> {
    pub document: &'a Document,
    pub schema: &'a Schema,
    pub writer: ViewWriter<'a>,
    pub mapper: &'a mut Mapper,
    pub consumable: &'a mut Consumable<DowncastKey>,
}

impl DowncastApi<'_> {
    pub fn view(&self) -> &View {
        self.writer.view()
    }
}

pub type DowncastCallback = dyn Fn(&mut EventInfo, &DowncastData, &mut DowncastApi<'_>) -> Result<()>;

struct Listener {
    pattern: EventPattern,
    priority: Priority,
    order: usize,
    callback: Rc<DowncastCallback>,
}

#[derive(Default)]
pub struct DowncastDispatcher {
    listeners: Vec<Listener>,
    next_order: usize,
}

impl std::fmt::Debug for DowncastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DowncastDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl DowncastDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, pattern: EventPattern, priority: Priority, callback: F)
    where
        F: Fn(&mut EventInfo, &DowncastData, &mut DowncastApi<'_>) -> Result<()> + 'static,
    {
        let listener = Listener {
            pattern,
            priority,
            order: self.next_order,
            callback: Rc::new(callback),
        };
        self.next_order += 1;
        self.listeners.push(listener);
        self.listeners.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.pattern.specificity().cmp(&a.pattern.specificity()))
                .then_with(|| a.order.cmp(&b.order))
        });
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Converts differ entries, in order, into the view.
    pub fn convert_changes(
        &self,
        document: &Document,
        schema: &Schema,
        changes: &[ChangeEntry],
        view: &mut View,
        mapper: &mut Mapper,
    ) -> Result<()> {
        for change in changes {
            match change {
                ChangeEntry::Insert { position, length, .. } => {
                    let range = Range::flat(position.parent, position.offset, position.offset + length);
                    self.convert_insert(document, schema, &range, view, mapper)?;
                }
                ChangeEntry::Remove {
                    position,
                    length,
                    name,
                    node,
                } => self.convert_remove(document, schema, *position, *length, name, *node, view, mapper)?,
                ChangeEntry::Attribute {
                    range,
                    key,
                    old_value,
                    new_value,
                } => self.convert_attribute(
                    document,
                    schema,
                    range,
                    key,
                    old_value.clone(),
                    new_value.clone(),
                    view,
                    mapper,
                )?,
            }
        }
        Ok(())
    }

    /// Fires insert events for every item in the range (deep), each followed
    /// by one attribute event per attribute the item has.
    pub fn convert_insert(
        &self,
        document: &Document,
        schema: &Schema,
        range: &Range,
        view: &mut View,
        mapper: &mut Mapper,
    ) -> Result<()> {
        let items = document.items(range, true)?;
        let mut consumable = Consumable::new();
        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let name = item_name(document, &item);
            let key = ConsumableItem::of(&item);
            let attributes = item_attributes(document, &item);
            consumable.add((key.clone(), ChangeEvent::Insert { name: name.clone() }));
            for attribute in attributes.keys() {
                consumable.add((
                    key.clone(),
                    ChangeEvent::Attribute {
                        key: attribute.clone(),
                        name: name.clone(),
                    },
                ));
            }
            let range = item_range(document, &item)?;
            prepared.push((item, name, range, attributes));
        }

        let mut api = DowncastApi {
            document,
            schema,
            writer: ViewWriter::new(view),
            mapper,
            consumable: &mut consumable,
        };
        for (item, name, range, attributes) in prepared {
            let data = DowncastData::Insert {
                item: item.clone(),
                range,
            };
            self.test_and_fire(ChangeEvent::Insert { name: name.clone() }, &data, &mut api)?;
            for (key, value) in attributes {
                let event = ChangeEvent::Attribute {
                    key: key.clone(),
                    name: name.clone(),
                };
                let data = DowncastData::Attribute {
                    item: item.clone(),
                    range,
                    key,
                    old_value: None,
                    new_value: Some(value),
                };
                self.test_and_fire(event, &data, &mut api)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn convert_attribute(
        &self,
        document: &Document,
        schema: &Schema,
        range: &Range,
        key: &str,
        old_value: Option<Value>,
        new_value: Option<Value>,
        view: &mut View,
        mapper: &mut Mapper,
    ) -> Result<()> {
        let items = document.items(range, false)?;
        let mut consumable = Consumable::new();
        for item in &items {
            consumable.add((
                ConsumableItem::of(item),
                ChangeEvent::Attribute {
                    key: key.to_string(),
                    name: item_name(document, item),
                },
            ));
        }
        let mut api = DowncastApi {
            document,
            schema,
            writer: ViewWriter::new(view),
            mapper,
            consumable: &mut consumable,
        };
        for item in items {
            let event = ChangeEvent::Attribute {
                key: key.to_string(),
                name: item_name(document, &item),
            };
            let data = DowncastData::Attribute {
                range: item_range(document, &item)?,
                item,
                key: key.to_string(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            };
            self.test_and_fire(event, &data, &mut api)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn convert_remove(
        &self,
        document: &Document,
        schema: &Schema,
        position: Position,
        length: usize,
        name: &str,
        node: Option<NodeId>,
        view: &mut View,
        mapper: &mut Mapper,
    ) -> Result<()> {
        let mut consumable = Consumable::new();
        let mut api = DowncastApi {
            document,
            schema,
            writer: ViewWriter::new(view),
            mapper,
            consumable: &mut consumable,
        };
        let data = DowncastData::Remove {
            position,
            length,
            name: name.to_string(),
            node,
        };
        self.fire(
            ChangeEvent::Remove {
                name: name.to_string(),
            },
            &data,
            &mut api,
        )
    }

    /// Fires only while the item still holds the event's token.
    fn test_and_fire(&self, event: ChangeEvent, data: &DowncastData, api: &mut DowncastApi<'_>) -> Result<()> {
        if let Some(key) = data.consumable_key(&event) {
            if api.consumable.test(&key) != Some(true) {
                trace!(event = ?event, "already consumed, not fired");
                return Ok(());
            }
        }
        self.fire(event, data, api)
    }

    fn fire(&self, event: ChangeEvent, data: &DowncastData, api: &mut DowncastApi<'_>) -> Result<()> {
        let mut info = EventInfo::new(event);
        for listener in &self.listeners {
            if !listener.pattern.matches(&info.event) {
                continue;
            }
            (listener.callback)(&mut info, data, api)?;
            if info.is_stopped() {
                trace!(event = ?info.event, "downcast event stopped");
                break;
            }
        }
        Ok(())
    }
}

fn item_name(document: &Document, item: &Item) -> String {
    match item {
        Item::Element(id) => document.name(*id).unwrap_or_default().to_string(),
        Item::Text(_) => TEXT_NAME.to_string(),
    }
}

fn item_attributes(document: &Document, item: &Item) -> Attributes {
    let node = match item {
        Item::Element(id) => *id,
        Item::Text(proxy) => proxy.node,
    };
    document.attributes(node).cloned().unwrap_or_default()
}

fn item_range(document: &Document, item: &Item) -> Result<Range> {
    match item {
        Item::Element(id) => document.range_on(*id),
        Item::Text(proxy) => Ok(proxy.range()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let insert = ChangeEvent::Insert {
            name: "paragraph".into(),
        };
        assert!(EventPattern::insert("paragraph").matches(&insert));
        assert!(EventPattern::Insert(None).matches(&insert));
        assert!(!EventPattern::insert("video").matches(&insert));
        assert!(!EventPattern::Remove(None).matches(&insert));

        let bold = ChangeEvent::Attribute {
            key: "bold".into(),
            name: TEXT_NAME.into(),
        };
        assert!(EventPattern::attribute("bold").matches(&bold));
        assert!(EventPattern::attribute_on("bold", TEXT_NAME).matches(&bold));
        assert!(!EventPattern::attribute("italic").matches(&bold));
    }

    #[test]
    fn test_listener_ordering() {
        use std::cell::RefCell;

        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = DowncastDispatcher::new();
        for (label, pattern, priority) in [
            ("generic", EventPattern::Insert(None), Priority::Normal),
            ("specific", EventPattern::insert("paragraph"), Priority::Normal),
            ("low", EventPattern::insert("paragraph"), Priority::Low),
            ("high", EventPattern::Insert(None), Priority::High),
        ] {
            let calls = calls.clone();
            dispatcher.on(pattern, priority, move |_, _, _| {
                calls.borrow_mut().push(label);
                Ok(())
            });
        }

        let mut doc = Document::new();
        let schema = Schema::new();
        let mut view = View::new("div");
        let mut mapper = Mapper::new();
        let root = doc.root();
        doc.insert_nodes(
            Position::new(root, 0),
            &[crate::model::NodeSnapshot::element("paragraph")],
        )
        .unwrap();

        dispatcher
            .convert_insert(&doc, &schema, &Range::flat(root, 0, 1), &mut view, &mut mapper)
            .unwrap();
        assert_eq!(*calls.borrow(), vec!["high", "specific", "generic", "low"]);
    }

    #[test]
    fn test_consumed_events_are_not_fired() {
        use std::cell::Cell;

        let attribute_calls = Rc::new(Cell::new(0));
        let mut dispatcher = DowncastDispatcher::new();
        dispatcher.on(EventPattern::insert("paragraph"), Priority::Normal, |info, data, api| {
            if let Some(item) = data.item() {
                let align = ChangeEvent::Attribute {
                    key: "align".into(),
                    name: "paragraph".into(),
                };
                api.consumable.consume(&(ConsumableItem::of(item), info.event.clone()));
                api.consumable.consume(&(ConsumableItem::of(item), align));
            }
            Ok(())
        });
        let counter = attribute_calls.clone();
        dispatcher.on(EventPattern::attribute("align"), Priority::Normal, move |_, _, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        let mut doc = Document::new();
        let root = doc.root();
        doc.insert_nodes(
            Position::new(root, 0),
            &[crate::model::NodeSnapshot::element("paragraph").with_attribute("align", serde_json::json!("left"))],
        )
        .unwrap();
        let mut view = View::new("div");
        let mut mapper = Mapper::new();
        dispatcher
            .convert_insert(&doc, &Schema::new(), &Range::flat(root, 0, 1), &mut view, &mut mapper)
            .unwrap();
        assert_eq!(attribute_calls.get(), 0);
    }
}
