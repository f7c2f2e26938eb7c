//! Ready-made downcast converters.

use super::consumable::{ChangeEvent, ConsumableItem};
use super::downcast::{DowncastApi, DowncastData, DowncastDispatcher, EventPattern, Priority};
use super::mapper::Bias;
use crate::error::Result;
use crate::model::{Document, Item, NodeId, TEXT_NAME};
use crate::view::{parse_style, ViewId, ViewWriter};
use serde_json::Value;
use tracing::debug;

/// Converts inserted text into view text nodes.
pub fn insert_text(dispatcher: &mut DowncastDispatcher) {
    dispatcher.on(EventPattern::insert(TEXT_NAME), Priority::Lowest, |info, data, api| {
        let (Some(Item::Text(proxy)), Some(range)) = (data.item(), data.range()) else {
            return Ok(());
        };
        let Some(key) = data.consumable_key(&info.event) else {
            return Ok(());
        };
        if !api.consumable.consume(&key) {
            return Ok(());
        }
        let Some(position) = api
            .mapper
            .to_view_position(api.document, api.view(), range.start, Bias::After)
        else {
            debug!(parent = ?proxy.parent, "text parent is not converted, skipping");
            return Ok(());
        };
        let text = api.writer.create_text(&proxy.data);
        api.writer.insert(position, text)
    });
}

/// Removes the view counterpart of removed model content, unbinds every
/// element in it and frees the detached view nodes.
pub fn remove(dispatcher: &mut DowncastDispatcher) {
    dispatcher.on(EventPattern::Remove(None), Priority::Low, |_, data, api| {
        let DowncastData::Remove {
            position,
            length,
            node,
            ..
        } = data
        else {
            return Ok(());
        };
        if let Some(node) = node {
            if api.mapper.to_view_element(*node).is_none() {
                debug!(?node, "removed element was never converted");
                return Ok(());
            }
        }
        let Some(range) = api
            .mapper
            .to_view_range_of_removed(api.document, api.view(), *position, *length)
        else {
            debug!(?position, "removed content has no view counterpart");
            return Ok(());
        };
        let removed = api.writer.remove(range)?;
        for node in removed {
            unbind_subtree(api, node);
            api.writer.release(node);
        }
        Ok(())
    });
}

fn unbind_subtree(api: &mut DowncastApi<'_>, node: ViewId) {
    let mut nodes = vec![node];
    nodes.extend(api.writer.view().descendants(node));
    for node in nodes {
        api.mapper.unbind_view_element(node);
    }
}

/// Inserts the view element built by `create` for each inserted `model`
/// element and binds the pair. Re-inserting an element re-binds it to the
/// fresh view element.
pub fn element_to_element<F>(dispatcher: &mut DowncastDispatcher, model: &str, create: F)
where
    F: Fn(&Document, NodeId, &mut ViewWriter<'_>) -> Option<ViewId> + 'static,
{
    element_to_element_with_priority(dispatcher, model, Priority::Normal, create)
}

pub fn element_to_element_with_priority<F>(
    dispatcher: &mut DowncastDispatcher,
    model: &str,
    priority: Priority,
    create: F,
) where
    F: Fn(&Document, NodeId, &mut ViewWriter<'_>) -> Option<ViewId> + 'static,
{
    dispatcher.on(EventPattern::insert(model), priority, move |info, data, api| {
        let (Some(Item::Element(element)), Some(range)) = (data.item(), data.range()) else {
            return Ok(());
        };
        let key = (ConsumableItem::Element(*element), info.event.clone());
        if api.consumable.test(&key) != Some(true) {
            return Ok(());
        }
        let Some(position) = api
            .mapper
            .to_view_position(api.document, api.view(), range.start, Bias::After)
        else {
            debug!(?element, "parent is not converted, skipping");
            return Ok(());
        };
        let Some(view_element) = create(api.document, *element, &mut api.writer) else {
            return Ok(());
        };
        api.consumable.consume(&key);
        if let Some(displaced) = api.mapper.rebind(*element, view_element) {
            debug!(%displaced, "replaced an existing binding");
        }
        api.writer.insert(position, view_element)
    });
}

/// Wraps text with an attribute element built from the attribute value. On
/// change, the element built from the old value is unwrapped first. Both are
/// only templates and are freed once applied.
pub fn attribute_to_element<F>(dispatcher: &mut DowncastDispatcher, key: &str, create: F)
where
    F: Fn(&Value, &mut ViewWriter<'_>) -> Option<ViewId> + 'static,
{
    attribute_to_element_with_priority(dispatcher, key, Priority::Normal, create)
}

pub fn attribute_to_element_with_priority<F>(
    dispatcher: &mut DowncastDispatcher,
    key: &str,
    priority: Priority,
    create: F,
) where
    F: Fn(&Value, &mut ViewWriter<'_>) -> Option<ViewId> + 'static,
{
    dispatcher.on(EventPattern::attribute(key), priority, move |info, data, api| {
        let DowncastData::Attribute {
            range,
            old_value,
            new_value,
            ..
        } = data
        else {
            return Ok(());
        };
        let Some(token) = data.consumable_key(&info.event) else {
            return Ok(());
        };
        if api.consumable.test(&token) != Some(true) {
            return Ok(());
        }
        let Some(view_range) = api.mapper.to_view_range(api.document, api.view(), range) else {
            return Ok(());
        };
        let old_element = old_value.as_ref().and_then(|value| create(value, &mut api.writer));
        let new_element = new_value.as_ref().and_then(|value| create(value, &mut api.writer));
        if old_element.is_none() && new_element.is_none() {
            return Ok(());
        }
        api.consumable.consume(&token);
        if let Some(old) = old_element {
            api.writer.unwrap(view_range, old)?;
            api.writer.release(old);
        }
        if let Some(new) = new_element {
            // Unwrapping may have merged text, so map again.
            if let Some(view_range) = api.mapper.to_view_range(api.document, api.view(), range) {
                api.writer.wrap(view_range, new)?;
            }
            api.writer.release(new);
        }
        Ok(())
    });
}

/// Maps a model attribute of `model` elements to a view attribute. The
/// closure returns the view key and value; `class` and `style` keys are
/// merged with what the element already has.
pub fn attribute_to_attribute<F>(dispatcher: &mut DowncastDispatcher, model: &str, key: &str, convert: F)
where
    F: Fn(&Value) -> Option<(String, String)> + 'static,
{
    dispatcher.on(
        EventPattern::attribute_on(key, model),
        Priority::Normal,
        move |info, data, api| {
            let DowncastData::Attribute {
                item: Item::Element(element),
                old_value,
                new_value,
                ..
            } = data
            else {
                return Ok(());
            };
            let token = (ConsumableItem::Element(*element), info.event.clone());
            if !api.consumable.consume(&token) {
                return Ok(());
            }
            let Some(view_element) = api.mapper.to_view_element(*element) else {
                return Ok(());
            };
            if let Some((view_key, value)) = old_value.as_ref().and_then(&convert) {
                remove_view_attribute(&mut api.writer, view_element, &view_key, &value)?;
            }
            if let Some((view_key, value)) = new_value.as_ref().and_then(&convert) {
                set_view_attribute(&mut api.writer, view_element, &view_key, &value)?;
            }
            Ok(())
        },
    );
}

fn set_view_attribute(writer: &mut ViewWriter<'_>, element: ViewId, key: &str, value: &str) -> Result<()> {
    match key {
        "class" => {
            for class in value.split_whitespace() {
                writer.add_class(class, element)?;
            }
            Ok(())
        }
        "style" => {
            for (property, value) in parse_style(value) {
                writer.set_style(&property, &value, element)?;
            }
            Ok(())
        }
        _ => writer.set_attribute(key, value, element),
    }
}

fn remove_view_attribute(writer: &mut ViewWriter<'_>, element: ViewId, key: &str, value: &str) -> Result<()> {
    match key {
        "class" => {
            for class in value.split_whitespace() {
                writer.remove_class(class, element)?;
            }
            Ok(())
        }
        "style" => {
            for (property, _) in parse_style(value) {
                writer.remove_style(&property, element)?;
            }
            Ok(())
        }
        _ => writer.remove_attribute(key, element),
    }
}

/// Stops the attribute event on items that already had their insert
/// claimed, for attributes a converter handles as part of the element.
pub fn consume_attribute(dispatcher: &mut DowncastDispatcher, model: &str, key: &str) {
    let event = ChangeEvent::Attribute {
        key: key.to_string(),
        name: model.to_string(),
    };
    dispatcher.on(
        EventPattern::attribute_on(key, model),
        Priority::Low,
        move |_, data, api| {
            if let Some(item) = data.item() {
                api.consumable.consume(&(ConsumableItem::of(item), event.clone()));
            }
            Ok(())
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::Mapper;
    use crate::model::{NodeSnapshot, Position, Range, Schema};
    use crate::view::View;
    use serde_json::json;

    fn dispatcher() -> DowncastDispatcher {
        let mut dispatcher = DowncastDispatcher::new();
        insert_text(&mut dispatcher);
        remove(&mut dispatcher);
        element_to_element(&mut dispatcher, "paragraph", |_, _, writer| {
            Some(writer.create_container_element("p", &[]))
        });
        attribute_to_element(&mut dispatcher, "bold", |_, writer| {
            Some(writer.create_attribute_element("strong", &[], 10, None))
        });
        dispatcher
    }

    #[test]
    fn test_insert_paragraph_with_bold_text() {
        let mut doc = crate::model::Document::new();
        let root = doc.root();
        doc.insert_nodes(
            Position::new(root, 0),
            &[NodeSnapshot::element("paragraph").with_children(vec![
                NodeSnapshot::text("foo"),
                NodeSnapshot::text("bar").with_attribute("bold", json!(true)),
            ])],
        )
        .unwrap();

        let mut view = View::new("div");
        let mut mapper = Mapper::new();
        mapper.bind_elements(root, view.root()).unwrap();
        dispatcher()
            .convert_insert(&doc, &Schema::new(), &Range::flat(root, 0, 1), &mut view, &mut mapper)
            .unwrap();

        let p = view.children(view.root())[0];
        assert_eq!(view.name(p), Some("p"));
        assert_eq!(view.children(p).len(), 2);
        let strong = view.children(p)[1];
        assert_eq!(view.name(strong), Some("strong"));
        assert_eq!(view.text_content(strong), "bar");
        assert_eq!(mapper.to_model_element(p), doc.children(root).first().copied());
    }

    #[test]
    fn test_unconverted_parent_is_skipped() {
        let mut doc = crate::model::Document::new();
        let root = doc.root();
        doc.insert_nodes(Position::new(root, 0), &[NodeSnapshot::element("paragraph")])
            .unwrap();

        let mut view = View::new("div");
        let mut mapper = Mapper::new();
        dispatcher()
            .convert_insert(&doc, &Schema::new(), &Range::flat(root, 0, 1), &mut view, &mut mapper)
            .unwrap();
        assert!(view.children(view.root()).is_empty());
        assert!(mapper.is_empty());
    }
}
