//! Widgets: editing view elements that behave as a single unit.

use crate::editing::{ViewFixContext, ViewPostFixer};
use folio_engine::view::{View, ViewId, ViewWriter};
use folio_engine::Result;
use serde_json::Value;

pub const WIDGET_CLASS: &str = "ck-widget";
pub const SELECTED_CLASS: &str = "ck-widget_selected";
pub const EDITABLE_CLASS: &str = "ck-editor__editable";

/// Marks `element` as a widget.
pub fn to_widget(writer: &mut ViewWriter<'_>, element: ViewId) -> Result<ViewId> {
    writer.set_custom_property("widget", Value::Bool(true), element)?;
    writer.add_class(WIDGET_CLASS, element)?;
    writer.set_attribute("contenteditable", "false", element)?;
    Ok(element)
}

/// Marks `element` as an editable region nested inside a widget.
pub fn to_widget_editable(writer: &mut ViewWriter<'_>, element: ViewId) -> Result<ViewId> {
    writer.add_class(EDITABLE_CLASS, element)?;
    writer.add_class("ck-editor__nested-editable", element)?;
    writer.set_attribute("contenteditable", "true", element)?;
    Ok(element)
}

pub fn is_widget(view: &View, element: ViewId) -> bool {
    view.custom_property(element, "widget")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Keeps `ck-widget_selected` on the widget of the selected model element.
#[derive(Debug, Default)]
pub struct WidgetSelection {
    highlighted: Option<ViewId>,
}

impl ViewPostFixer for WidgetSelection {
    fn name(&self) -> &str {
        "widget-selection"
    }

    fn fix(&mut self, context: &ViewFixContext<'_>, writer: &mut ViewWriter<'_>) -> Result<bool> {
        let selected = context
            .document
            .selected_element()
            .and_then(|element| context.mapper.to_view_element(element))
            .filter(|element| is_widget(writer.view(), *element));

        let mut changed = false;
        if let Some(previous) = self.highlighted.filter(|previous| Some(*previous) != selected) {
            if writer.view().has_class(previous, SELECTED_CLASS) {
                writer.remove_class(SELECTED_CLASS, previous)?;
                changed = true;
            }
        }
        if let Some(widget) = selected {
            if !writer.view().has_class(widget, SELECTED_CLASS) {
                writer.add_class(SELECTED_CLASS, widget)?;
                changed = true;
            }
        }
        self.highlighted = selected;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_widget() {
        let mut view = View::new("$root");
        let mut writer = ViewWriter::new(&mut view);
        let figure = writer.create_container_element("figure", &[]);
        to_widget(&mut writer, figure).unwrap();
        assert!(is_widget(&view, figure));
        assert!(view.has_class(figure, WIDGET_CLASS));
        assert_eq!(view.attribute(figure, "contenteditable"), Some("false"));
    }

    #[test]
    fn test_plain_element_is_not_a_widget() {
        let mut view = View::new("$root");
        let p = ViewWriter::new(&mut view).create_container_element("p", &[]);
        assert!(!is_widget(&view, p));
    }
}
