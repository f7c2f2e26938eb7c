//! Ready-made upcast converters.

use super::downcast::Priority;
use super::upcast::{UpcastDispatcher, UpcastPattern, ViewMatcher};
use crate::model::{NodeSnapshot, Schema};
use crate::view::{View, ViewId};
use serde_json::Value;
use tracing::debug;

fn pattern_for(matcher: &ViewMatcher) -> UpcastPattern {
    UpcastPattern::Element(matcher.name().map(str::to_string))
}

/// Converts matched view elements to model elements built by `create` and
/// converts their children into them. If the schema does not allow the
/// element where it lands, the element is skipped and its children are
/// converted in its place.
pub fn element_to_element<F>(dispatcher: &mut UpcastDispatcher, matcher: ViewMatcher, create: F)
where
    F: Fn(&View, ViewId) -> Option<NodeSnapshot> + 'static,
{
    element_to_element_with_priority(dispatcher, matcher, Priority::Normal, create)
}

pub fn element_to_element_with_priority<F>(
    dispatcher: &mut UpcastDispatcher,
    matcher: ViewMatcher,
    priority: Priority,
    create: F,
) where
    F: Fn(&View, ViewId) -> Option<NodeSnapshot> + 'static,
{
    dispatcher.on(pattern_for(&matcher), priority, move |data, api| {
        if data.output.is_some() {
            return Ok(());
        }
        let item = data.view_item;
        let Some(parts) = matcher.matches(api.view, item) else {
            return Ok(());
        };
        if !api.can_consume_all(item, &parts) {
            return Ok(());
        }
        let Some(element) = create(api.view, item) else {
            return Ok(());
        };
        if !api.allows(&data.parent_name, element.name()) {
            debug!(
                element = element.name(),
                parent = %data.parent_name,
                "element not allowed here"
            );
            return Ok(());
        }
        api.consume_all(item, &parts);
        let name = element.name().to_string();
        let children = api.convert_children(item, &name)?;
        data.output = Some(vec![element.with_children(children)]);
        Ok(())
    });
}

/// Converts matched view elements into a model attribute set on their
/// converted children. Existing values are not overridden, so the innermost
/// element wins.
pub fn element_to_attribute<F>(dispatcher: &mut UpcastDispatcher, matcher: ViewMatcher, key: &str, value: F)
where
    F: Fn(&View, ViewId) -> Option<Value> + 'static,
{
    let key = key.to_string();
    dispatcher.on(pattern_for(&matcher), Priority::Normal, move |data, api| {
        if data.output.is_some() {
            return Ok(());
        }
        let item = data.view_item;
        let Some(parts) = matcher.matches(api.view, item) else {
            return Ok(());
        };
        if !api.can_consume_all(item, &parts) {
            return Ok(());
        }
        let Some(value) = value(api.view, item) else {
            return Ok(());
        };
        api.consume_all(item, &parts);
        let mut children = api.convert_children(item, &data.parent_name)?;
        set_attribute_on(&mut children, &key, &value, api.schema);
        data.output = Some(children);
        Ok(())
    });
}

/// Converts a view attribute of an already converted element into a model
/// attribute on that element.
pub fn attribute_to_attribute<F>(dispatcher: &mut UpcastDispatcher, matcher: ViewMatcher, key: &str, value: F)
where
    F: Fn(&View, ViewId) -> Option<Value> + 'static,
{
    let key = key.to_string();
    dispatcher.on(pattern_for(&matcher), Priority::Low, move |data, api| {
        let item = data.view_item;
        let Some(parts) = matcher.matches(api.view, item) else {
            return Ok(());
        };
        // The element itself is claimed by its own converter.
        let parts: Vec<_> = parts
            .into_iter()
            .filter(|part| *part != super::consumable::ViewMatchPart::Name)
            .collect();
        let Some(output) = data.output.as_mut() else {
            return Ok(());
        };
        if !api.can_consume_all(item, &parts) {
            return Ok(());
        }
        let Some(value) = value(api.view, item) else {
            return Ok(());
        };
        api.consume_all(item, &parts);
        set_attribute_on(output, &key, &value, api.schema);
        Ok(())
    });
}

fn set_attribute_on(nodes: &mut [NodeSnapshot], key: &str, value: &Value, schema: &Schema) {
    for node in nodes {
        if !schema.check_attribute(node.name(), key) || node.attributes().contains_key(key) {
            continue;
        }
        node.attributes_mut().insert(key.to_string(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDefinition, ROOT_NAME, TEXT_NAME};
    use crate::view::ViewWriter;
    use serde_json::json;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("paragraph", ItemDefinition::default().allowed_in(ROOT_NAME).block());
        schema.extend(TEXT_NAME, |def| def.allow_attributes.push("bold".into()));
        schema
    }

    fn dispatcher() -> UpcastDispatcher {
        let mut dispatcher = UpcastDispatcher::new();
        element_to_element(&mut dispatcher, ViewMatcher::element("p"), |_, _| {
            Some(NodeSnapshot::element("paragraph"))
        });
        element_to_attribute(&mut dispatcher, ViewMatcher::element("strong"), "bold", |_, _| {
            Some(json!(true))
        });
        element_to_attribute(&mut dispatcher, ViewMatcher::element("b"), "bold", |_, _| {
            Some(json!("outer"))
        });
        dispatcher
    }

    #[test]
    fn test_paragraph_with_bold() {
        let mut view = View::new("div");
        let mut writer = ViewWriter::new(&mut view);
        let p = writer.create_container_element("p", &[]);
        let b = writer.create_attribute_element("b", &[], 10, None);
        let strong = writer.create_attribute_element("strong", &[], 10, None);
        let inner = writer.create_text("in");
        let outer = writer.create_text("out");
        writer.append(inner, strong).unwrap();
        writer.append(strong, b).unwrap();
        writer.append(outer, b).unwrap();
        writer.append(b, p).unwrap();
        let root = writer.view().root();
        writer.append(p, root).unwrap();

        let output = dispatcher().convert(&view, view.root(), &schema(), ROOT_NAME).unwrap();
        assert_eq!(
            output,
            vec![NodeSnapshot::element("paragraph").with_children(vec![
                NodeSnapshot::text("in").with_attribute("bold", json!(true)),
                NodeSnapshot::text("out").with_attribute("bold", json!("outer")),
            ])]
        );
    }

    #[test]
    fn test_disallowed_element_keeps_children() {
        let mut view = View::new("div");
        let mut writer = ViewWriter::new(&mut view);
        let outer = writer.create_container_element("p", &[]);
        let inner = writer.create_container_element("p", &[]);
        let text = writer.create_text("x");
        writer.append(text, inner).unwrap();
        writer.append(inner, outer).unwrap();
        let root = writer.view().root();
        writer.append(outer, root).unwrap();

        let output = dispatcher().convert(&view, view.root(), &schema(), ROOT_NAME).unwrap();
        assert_eq!(
            output,
            vec![NodeSnapshot::element("paragraph").with_children(vec![NodeSnapshot::text("x")])]
        );
    }
}
