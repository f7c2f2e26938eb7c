//! Full-width template blocks.
//!
//! A template block marked `maxWidth` takes the whole available width. The
//! paragraph holding such blocks is marked `maxWidthTemplateBlock` so the
//! host can lay it out as a wrapper.
//!
//! ```text
//! data: <p class="ck-max-width-template-block-wrapper"><app-hero-block class="ck-max-width stencil-template"></app-hero-block></p>
//! ```

use super::stencil::STENCIL;
use crate::command::{parse_params, Command};
use crate::data::PARAGRAPH;
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{Document, Item, Model, NodeId, Schema};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const MAX_WIDTH: &str = "maxWidth";
pub const MAX_WIDTH_WRAPPER: &str = "maxWidthTemplateBlock";

const MAX_WIDTH_CLASS: &str = "ck-max-width";
const WRAPPER_CLASS: &str = "ck-max-width-template-block-wrapper";

/// Template blocks in the selection, in document order.
fn selected_templates(document: &Document) -> Vec<NodeId> {
    let range = document.selection().range();
    document
        .items(&range, true)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item {
            Item::Element(element) if document.is(element, STENCIL) => Some(element),
            _ => None,
        })
        .collect()
}

fn is_set(document: &Document, node: NodeId, key: &str) -> bool {
    document.attribute(node, key).and_then(Value::as_bool) == Some(true)
}

/// Paragraph holding `template`, if it is one.
fn wrapper_of(document: &Document, template: NodeId) -> Option<NodeId> {
    document
        .parent(template)
        .filter(|parent| document.is(*parent, PARAGRAPH))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetMaxWidthParams {
    pub value: bool,
}

/// `setMaxWidth`: marks the selected template blocks full width, or clears
/// the mark. Accepts a bare boolean or `{ "value": bool }`. Its value says
/// whether every selected block is full width.
#[derive(Debug, Default)]
pub struct SetMaxWidthCommand {
    active: bool,
    template_selected: bool,
    enabled: bool,
}

impl SetMaxWidthCommand {
    /// Whether the selection is exactly one template block.
    pub fn is_template_selected(&self) -> bool {
        self.template_selected
    }
}

impl Command for SetMaxWidthCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        let templates = selected_templates(document);
        self.enabled = !templates.is_empty();
        self.active = self.enabled && templates.iter().all(|template| is_set(document, *template, MAX_WIDTH));
        self.template_selected = document
            .selected_element()
            .map_or(false, |element| document.is(element, STENCIL));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        Value::Bool(self.active)
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let value = match params {
            Value::Bool(value) => value,
            other => parse_params::<SetMaxWidthParams>(other)?.value,
        };
        model.change(|writer| {
            let templates = selected_templates(writer.document());
            for template in &templates {
                let wrapper = wrapper_of(writer.document(), *template);
                if value {
                    writer.set_attribute_on(MAX_WIDTH, Value::Bool(true), *template)?;
                    if let Some(wrapper) = wrapper.filter(|wrapper| !is_set(writer.document(), *wrapper, MAX_WIDTH_WRAPPER)) {
                        writer.set_attribute_on(MAX_WIDTH_WRAPPER, Value::Bool(true), wrapper)?;
                    }
                    continue;
                }
                if is_set(writer.document(), *template, MAX_WIDTH) {
                    writer.remove_attribute_from(MAX_WIDTH, *template)?;
                }
                let Some(wrapper) = wrapper else {
                    continue;
                };
                let document = writer.document();
                let others_full_width = document
                    .children(wrapper)
                    .iter()
                    .any(|child| is_set(document, *child, MAX_WIDTH));
                if is_set(document, wrapper, MAX_WIDTH_WRAPPER) && !others_full_width {
                    debug!(?wrapper, "Last full-width block left, clearing wrapper");
                    writer.remove_attribute_from(MAX_WIDTH_WRAPPER, wrapper)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// `maxWidth` on template blocks, `maxWidthTemplateBlock` on paragraphs and
/// the `setMaxWidth` command.
pub struct MaxWidth;

impl Plugin for MaxWidth {
    fn name(&self) -> &'static str {
        "MaxWidth"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Paragraph", "Stencil"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let selectors: Vec<String> = editor
            .config()
            .stencil
            .blocks
            .iter()
            .map(|block| block.selector.clone())
            .collect();
        let schema = editor.model_mut().schema_mut();
        schema.extend(PARAGRAPH, |definition| {
            definition.allow_attributes.push(MAX_WIDTH_WRAPPER.to_string())
        });
        schema.extend(STENCIL, |definition| definition.allow_attributes.push(MAX_WIDTH.to_string()));

        let mut conversion = editor.conversion();
        conversion.for_downcast(|dispatcher| {
            downcast_helpers::attribute_to_attribute(dispatcher, PARAGRAPH, MAX_WIDTH_WRAPPER, |value| {
                (value.as_bool() == Some(true)).then(|| ("class".to_string(), WRAPPER_CLASS.to_string()))
            });
            downcast_helpers::attribute_to_attribute(dispatcher, STENCIL, MAX_WIDTH, |value| {
                (value.as_bool() == Some(true)).then(|| ("class".to_string(), MAX_WIDTH_CLASS.to_string()))
            });
        });
        upcast_helpers::attribute_to_attribute(
            &mut conversion.upcast,
            ViewMatcher::element("p").class(WRAPPER_CLASS),
            MAX_WIDTH_WRAPPER,
            |_, _| Some(Value::Bool(true)),
        );
        for selector in &selectors {
            upcast_helpers::attribute_to_attribute(
                &mut conversion.upcast,
                ViewMatcher::element(selector).class(MAX_WIDTH_CLASS),
                MAX_WIDTH,
                |_, _| Some(Value::Bool(true)),
            );
        }
        drop(conversion);

        editor.add_command("setMaxWidth", SetMaxWidthCommand::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::features::{Paragraph, Stencil};
    use serde_json::json;

    const PLAIN: &str = "<p>foo<app-hero-block class=\"stencil-template\"></app-hero-block></p>";
    const FULL_WIDTH: &str = "<p class=\"ck-max-width-template-block-wrapper\">foo<app-hero-block class=\"ck-max-width stencil-template\"></app-hero-block></p>";

    fn editor() -> Editor {
        let config = EditorConfig::from_json_str(
            r#"{ "stencil": { "blocks": [{ "selector": "app-hero-block", "label": "Hero" }] } }"#,
        )
        .unwrap();
        Editor::create(config, vec![Box::new(Paragraph), Box::new(Stencil), Box::new(MaxWidth)]).unwrap()
    }

    fn select_template(editor: &mut Editor) {
        editor
            .model_mut()
            .change(|writer| {
                let document = writer.document();
                let paragraph = document.children(document.root())[0];
                let template = document.children(paragraph)[1];
                writer.set_selection_on(template)
            })
            .unwrap();
    }

    #[test]
    fn test_toggle_on_selected_template() {
        let mut editor = editor();
        editor.set_data(PLAIN).unwrap();
        select_template(&mut editor);
        let command = editor.command("setMaxWidth").unwrap();
        assert!(command.borrow().is_enabled());
        assert_eq!(command.borrow().value(), json!(false));

        editor.execute("setMaxWidth", json!(true)).unwrap();
        assert_eq!(editor.get_data().unwrap(), FULL_WIDTH);
        assert_eq!(command.borrow().value(), json!(true));
        assert!(editor.editing_html().contains(MAX_WIDTH_CLASS));

        editor.execute("setMaxWidth", json!({ "value": false })).unwrap();
        assert_eq!(editor.get_data().unwrap(), PLAIN);
    }

    #[test]
    fn test_full_width_round_trip() {
        let mut editor = editor();
        editor.set_data(FULL_WIDTH).unwrap();

        let document = editor.model().document();
        let paragraph = document.children(document.root())[0];
        assert!(is_set(document, paragraph, MAX_WIDTH_WRAPPER));
        assert!(is_set(document, document.children(paragraph)[1], MAX_WIDTH));
        assert_eq!(editor.get_data().unwrap(), FULL_WIDTH);
    }

    #[test]
    fn test_wrapper_stays_while_another_block_is_full_width() {
        let mut editor = editor();
        editor
            .set_data(
                "<p class=\"ck-max-width-template-block-wrapper\">\
                 <app-hero-block class=\"ck-max-width stencil-template\"></app-hero-block>\
                 <app-hero-block class=\"ck-max-width stencil-template\"></app-hero-block></p>",
            )
            .unwrap();
        editor
            .model_mut()
            .change(|writer| {
                let document = writer.document();
                let paragraph = document.children(document.root())[0];
                let first = document.children(paragraph)[0];
                writer.set_selection_on(first)
            })
            .unwrap();
        editor.execute("setMaxWidth", json!(false)).unwrap();

        let document = editor.model().document();
        let paragraph = document.children(document.root())[0];
        assert!(is_set(document, paragraph, MAX_WIDTH_WRAPPER));
        assert!(!is_set(document, document.children(paragraph)[0], MAX_WIDTH));
        assert!(is_set(document, document.children(paragraph)[1], MAX_WIDTH));
    }

    #[test]
    fn test_disabled_without_template() {
        let mut editor = editor();
        editor.set_data("<p>foo</p>").unwrap();
        assert!(!editor.command("setMaxWidth").unwrap().borrow().is_enabled());
    }
}
