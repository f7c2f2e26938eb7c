//! # Stencil
//!
//! Template blocks rendered by the host application. In the model a block is
//! a `stencilTemplatePreview` inline object that remembers its `selector`,
//! its descriptors and a few style attributes.
//!
//! ```text
//! data:    <app-hero-block class="stencil-template" style="min-width:120px;" data-properties="hero"></app-hero-block>
//! editing: <section class="stencil-template-preview ck-widget" …><div class="stencil-template-wrapper"></div></section>
//! ```
//!
//! Only blocks listed in `stencil.blocks` are recognized when parsing data.

use super::font::{self, FONT_BACKGROUND_COLOR, FONT_COLOR, FONT_FAMILY, FONT_SIZE, LINE_HEIGHT};
use super::selected_blocks;
use crate::command::{parse_params, Command};
use crate::config::{descriptor_string, StencilBlock};
use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use crate::plugin::Plugin;
use crate::widget::to_widget;
use folio_engine::conversion::{
    downcast_helpers, upcast_helpers, DowncastData, DowncastDispatcher, EventPattern, Priority, ViewMatcher,
};
use folio_engine::model::{
    Attributes, Document, Item, ItemDefinition, Model, NodeId, NodeSnapshot, Position, Schema, TEXT_NAME,
};
use folio_engine::view::{View, ViewId, ViewWriter};
use folio_engine::EngineError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const STENCIL: &str = "stencilTemplatePreview";
pub const SELECTOR: &str = "selector";
pub const MIN_WIDTH: &str = "minWidth";

const TEMPLATE_CLASS: &str = "stencil-template";
const PREVIEW_CLASS: &str = "stencil-template-preview";
const WRAPPER_CLASS: &str = "stencil-template-wrapper";
const STENCIL_BLOCK_PROPERTY: &str = "stencilBlock";

/// Model attribute and the inline style it maps to.
const TEMPLATE_STYLES: &[(&str, &str)] = &[
    ("bold", "font-weight"),
    ("italic", "font-style"),
    ("underline", "text-decoration"),
    (MIN_WIDTH, "min-width"),
    (FONT_BACKGROUND_COLOR, "background-color"),
    (FONT_SIZE, "font-size"),
    (FONT_FAMILY, "font-family"),
    (FONT_COLOR, "color"),
    (LINE_HEIGHT, "line-height"),
];

/// Inline style value for a template attribute.
fn template_style(key: &str, value: &Value) -> Option<String> {
    let flag = || value.as_bool().filter(|on| *on);
    match key {
        "bold" => flag().map(|_| "bold".to_string()),
        "italic" => flag().map(|_| "italic".to_string()),
        "underline" => flag().map(|_| "underline".to_string()),
        _ => font::style_value(key, value),
    }
}

/// Model value for an inline style found on a template element.
fn parse_template_style(key: &str, css: &str) -> Option<Value> {
    match key {
        "bold" | "italic" | "underline" => Some(Value::Bool(true)),
        FONT_SIZE => {
            let size: f64 = css.trim_end_matches("px").trim().parse().ok()?;
            if size.fract() == 0.0 {
                Some(Value::from(size as i64))
            } else {
                serde_json::Number::from_f64(size).map(Value::Number)
            }
        }
        _ => Some(Value::String(css.to_string())),
    }
}

fn descriptor_attribute(name: &str) -> String {
    format!("data-{name}")
}

/// Converts attribute `key` of template elements with `apply`, which gets
/// the new value or `None` when the attribute was removed.
fn template_attribute<F>(dispatcher: &mut DowncastDispatcher, key: &str, apply: F)
where
    F: Fn(&mut ViewWriter<'_>, ViewId, Option<&Value>) -> folio_engine::Result<()> + 'static,
{
    dispatcher.on(EventPattern::attribute_on(key, STENCIL), Priority::Normal, move |info, data, api| {
        let DowncastData::Attribute {
            item: Item::Element(element),
            new_value,
            ..
        } = data
        else {
            return Ok(());
        };
        let Some(token) = data.consumable_key(&info.event) else {
            return Ok(());
        };
        if !api.consumable.consume(&token) {
            return Ok(());
        }
        let Some(view_element) = api.mapper.to_view_element(*element) else {
            return Ok(());
        };
        apply(&mut api.writer, view_element, new_value.as_ref())
    });
}

fn register_template_attributes(dispatcher: &mut DowncastDispatcher, descriptors: &[String]) {
    for &(key, property) in TEMPLATE_STYLES {
        template_attribute(dispatcher, key, move |writer, element, value| {
            match value.and_then(|value| template_style(key, value)) {
                Some(css) => writer.set_style(property, &css, element),
                None => writer.remove_style(property, element),
            }
        });
    }
    for name in descriptors {
        let view_key = descriptor_attribute(name);
        template_attribute(dispatcher, name, move |writer, element, value| match value {
            Some(value) => writer.set_attribute(&view_key, &descriptor_string(value), element),
            None => writer.remove_attribute(&view_key, element),
        });
    }
    downcast_helpers::consume_attribute(dispatcher, STENCIL, SELECTOR);
}

fn template_from_view(view: &View, element: ViewId, selector: &str, descriptors: &[String]) -> NodeSnapshot {
    let mut snapshot = NodeSnapshot::element(STENCIL).with_attribute(SELECTOR, Value::String(selector.to_string()));
    for &(key, property) in TEMPLATE_STYLES {
        if let Some(value) = view.style(element, property).and_then(|css| parse_template_style(key, css)) {
            snapshot = snapshot.with_attribute(key, value);
        }
    }
    for name in descriptors {
        if let Some(value) = view.attribute(element, &descriptor_attribute(name)) {
            snapshot = snapshot.with_attribute(name, Value::String(value.to_string()));
        }
    }
    snapshot
}

fn selected_template(document: &Document) -> Option<NodeId> {
    document
        .selected_element()
        .filter(|element| document.is(*element, STENCIL))
}

/// Where an inline object lands: after a selected block, inside an empty
/// block, otherwise at the selection focus.
fn inline_insertion_position(document: &Document, schema: &Schema) -> Position {
    if let Some(selected) = document.selected_element() {
        let is_block = document.name(selected).map_or(false, |name| schema.is_block(name));
        if let (true, Ok(after)) = (is_block, document.position_after(selected)) {
            return after;
        }
    }
    match selected_blocks(document, schema).first() {
        Some(block) if document.is_empty(*block) => Position::new(*block, 0),
        _ => document.selection().focus(),
    }
}

fn validate_blocks(blocks: &[StencilBlock]) -> Result<()> {
    match blocks.iter().position(|block| block.selector.trim().is_empty()) {
        Some(index) => Err(EditorError::configuration(
            "stencilconfig-missing-selector",
            format!("stencil block {index} has no selector"),
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsertTemplateParams {
    pub selector: String,
}

/// `insertTemplateBlock`: inserts a configured block at the selection and
/// selects it.
pub struct InsertTemplateCommand {
    blocks: Vec<StencilBlock>,
    enabled: bool,
}

impl Command for InsertTemplateCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        let parent = document.selection().focus().parent;
        self.enabled = schema.check_child(document.name(parent).unwrap_or_default(), STENCIL);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: InsertTemplateParams = parse_params(params)?;
        let block = self
            .blocks
            .iter()
            .find(|block| block.selector == params.selector)
            .ok_or_else(|| EditorError::Command {
                code: "inserttemplatecommand-unknown-block",
                message: format!("no stencil block with selector {}", params.selector),
            })?;

        let mut attributes = Attributes::new();
        attributes.insert(SELECTOR.to_string(), Value::String(block.selector.clone()));
        for descriptor in &block.descriptors {
            attributes.insert(descriptor.name.clone(), Value::String(descriptor_string(&descriptor.value)));
        }

        model.change(|writer| {
            let position = inline_insertion_position(writer.document(), writer.schema());
            let parent = writer.document().name(position.parent).unwrap_or_default().to_string();
            if !writer.schema().check_child(&parent, STENCIL) {
                return Err(EngineError::InvalidPosition(format!("{STENCIL} is not allowed in {parent}")));
            }
            let template = writer.insert_element(STENCIL, attributes, position)?;
            debug!(?template, "Inserted template block");
            writer.set_selection_on(template)
        })?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplateResizeParams {
    /// `null` removes the width.
    pub width: Option<String>,
}

/// `templateResize`: sets `minWidth` on the selected template block.
#[derive(Debug, Default)]
pub struct TemplateResizeCommand {
    enabled: bool,
}

impl Command for TemplateResizeCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        self.enabled = selected_template(document).is_some();
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: TemplateResizeParams = parse_params(params)?;
        model.change(|writer| {
            let Some(template) = selected_template(writer.document()) else {
                return Ok(());
            };
            match params.width {
                Some(width) => writer.set_attribute_on(MIN_WIDTH, Value::String(width), template),
                None => writer.remove_attribute_from(MIN_WIDTH, template),
            }
        })?;
        Ok(())
    }
}

/// `currentTemplateBlock`: the label of the template block in the selection.
/// Its value is `""` when the block is not configured.
pub struct CurrentTemplateCommand {
    blocks: Vec<StencilBlock>,
    label: String,
    enabled: bool,
}

impl CurrentTemplateCommand {
    fn label_for(&self, document: &Document, template: NodeId) -> String {
        let selector = document.attribute(template, SELECTOR).and_then(Value::as_str);
        let properties = document.attribute(template, "properties").and_then(Value::as_str);
        self.blocks
            .iter()
            .filter(|block| Some(block.selector.as_str()) == selector)
            .find(|block| properties.map_or(true, |properties| descriptor_string(&block.properties) == properties))
            .map(|block| block.label.clone())
            .unwrap_or_default()
    }
}

impl Command for CurrentTemplateCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        let range = document.selection().range();
        let template = document
            .items(&range, true)
            .unwrap_or_default()
            .into_iter()
            .find_map(|item| match item {
                Item::Element(element) if document.is(element, STENCIL) => Some(element),
                _ => None,
            });
        self.enabled = template.is_some();
        self.label = template
            .map(|template| self.label_for(document, template))
            .unwrap_or_default();
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        Value::String(self.label.clone())
    }

    fn execute(&mut self, _model: &mut Model, _params: Value) -> Result<()> {
        Ok(())
    }
}

/// Template block schema, converters and commands.
pub struct Stencil;

impl Plugin for Stencil {
    fn name(&self) -> &'static str {
        "Stencil"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let blocks = editor.config().stencil.blocks.clone();
        validate_blocks(&blocks)?;
        let mut descriptors: Vec<String> = Vec::new();
        for descriptor in blocks.iter().flat_map(|block| &block.descriptors) {
            if !descriptors.contains(&descriptor.name) {
                descriptors.push(descriptor.name.clone());
            }
        }

        let schema = editor.model_mut().schema_mut();
        let allow_in = schema
            .definition(TEXT_NAME)
            .map(|text| text.allow_in.clone())
            .unwrap_or_default();
        let mut definition = ItemDefinition::default().inline().object();
        definition.allow_in = allow_in;
        definition.allow_attributes.push(SELECTOR.to_string());
        definition
            .allow_attributes
            .extend(TEMPLATE_STYLES.iter().map(|(key, _)| key.to_string()));
        definition.allow_attributes.extend(descriptors.iter().cloned());
        schema.register(STENCIL, definition);

        let mut conversion = editor.conversion();
        downcast_helpers::element_to_element(&mut conversion.data_downcast, STENCIL, |document, template, writer| {
            let selector = document.attribute(template, SELECTOR)?.as_str()?;
            Some(writer.create_container_element(selector, &[("class", TEMPLATE_CLASS)]))
        });
        downcast_helpers::element_to_element(
            &mut conversion.editing_downcast,
            STENCIL,
            |document, template, writer| {
                let selector = document.attribute(template, SELECTOR)?.as_str()?;
                let section = writer.create_container_element(
                    "section",
                    &[("class", PREVIEW_CLASS), ("data-selector", selector)],
                );
                let wrapper = writer.create_ui_element("div", &[("class", WRAPPER_CLASS)]);
                writer.append(wrapper, section).ok()?;
                writer
                    .set_custom_property(STENCIL_BLOCK_PROPERTY, Value::Bool(true), section)
                    .ok()?;
                to_widget(writer, section).ok()
            },
        );
        conversion.for_downcast(|dispatcher| register_template_attributes(dispatcher, &descriptors));

        for block in &blocks {
            let selector = block.selector.clone();
            let descriptors = descriptors.clone();
            upcast_helpers::element_to_element(
                &mut conversion.upcast,
                ViewMatcher::element(&block.selector).class(TEMPLATE_CLASS),
                move |view, element| Some(template_from_view(view, element, &selector, &descriptors)),
            );
        }
        drop(conversion);

        editor.add_command(
            "insertTemplateBlock",
            InsertTemplateCommand {
                blocks: blocks.clone(),
                enabled: false,
            },
        );
        editor.add_command("templateResize", TemplateResizeCommand::default());
        editor.add_command(
            "currentTemplateBlock",
            CurrentTemplateCommand {
                blocks,
                label: String::new(),
                enabled: false,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::features::Paragraph;
    use serde_json::json;

    fn config() -> EditorConfig {
        EditorConfig::from_json_str(
            r#"{
                "stencil": {
                    "blocks": [{
                        "selector": "app-hero-block",
                        "label": "Hero",
                        "properties": "hero",
                        "descriptors": [{ "name": "properties", "value": "hero" }]
                    }]
                }
            }"#,
        )
        .unwrap()
    }

    fn editor() -> Editor {
        Editor::create(config(), vec![Box::new(Paragraph), Box::new(Stencil)]).unwrap()
    }

    #[test]
    fn test_data_round_trip() {
        let mut editor = editor();
        let html = "<p>foo<app-hero-block class=\"stencil-template\" style=\"font-weight:bold;min-width:120px;\" data-properties=\"hero\"></app-hero-block></p>";
        editor.set_data(html).unwrap();

        let document = editor.model().document();
        let paragraph = document.children(document.root())[0];
        let template = document.children(paragraph)[1];
        assert!(document.is(template, STENCIL));
        assert_eq!(document.attribute(template, "bold"), Some(&json!(true)));
        assert_eq!(document.attribute(template, MIN_WIDTH), Some(&json!("120px")));
        assert_eq!(document.attribute(template, "properties"), Some(&json!("hero")));
        assert_eq!(editor.get_data().unwrap(), html);
    }

    #[test]
    fn test_unconfigured_selector_is_not_a_template() {
        let editor = editor();
        let nodes = editor
            .parse_data("<p><app-other-block class=\"stencil-template\"></app-other-block></p>", None)
            .unwrap();
        assert_eq!(nodes, vec![NodeSnapshot::element("paragraph")]);
    }

    #[test]
    fn test_insert_then_resize() {
        let mut editor = editor();
        editor.set_data("<p>foo</p>").unwrap();
        editor
            .execute("insertTemplateBlock", json!({ "selector": "app-hero-block" }))
            .unwrap();
        assert_eq!(
            editor.get_data().unwrap(),
            "<p><app-hero-block class=\"stencil-template\" data-properties=\"hero\"></app-hero-block>foo</p>"
        );
        assert_eq!(editor.command("currentTemplateBlock").unwrap().borrow().value(), json!("Hero"));

        editor.execute("templateResize", json!({ "width": "200px" })).unwrap();
        assert_eq!(
            editor.get_data().unwrap(),
            "<p><app-hero-block class=\"stencil-template\" style=\"min-width:200px;\" data-properties=\"hero\"></app-hero-block>foo</p>"
        );
        let html = editor.editing_html();
        assert!(html.contains(WRAPPER_CLASS), "{html}");
        assert!(html.contains("min-width:200px"), "{html}");
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let mut editor = editor();
        editor.set_data("<p>foo</p>").unwrap();
        let err = editor
            .execute("insertTemplateBlock", json!({ "selector": "app-missing-block" }))
            .unwrap_err();
        assert_eq!(err.code(), Some("inserttemplatecommand-unknown-block"));
    }

    #[test]
    fn test_block_without_selector_fails_init() {
        let config = EditorConfig::from_json_str(r#"{ "stencil": { "blocks": [{ "label": "Empty" }] } }"#).unwrap();
        let err = Editor::create(config, vec![Box::new(Paragraph), Box::new(Stencil)]).unwrap_err();
        assert_eq!(err.code(), Some("stencilconfig-missing-selector"));
    }

    #[test]
    fn test_template_styles() {
        assert_eq!(template_style("bold", &json!(true)), Some("bold".into()));
        assert_eq!(template_style("bold", &json!(false)), None);
        assert_eq!(template_style(FONT_SIZE, &json!(14)), Some("14px".into()));
        assert_eq!(parse_template_style(FONT_SIZE, "14px"), Some(json!(14)));
        assert_eq!(parse_template_style(FONT_SIZE, "1.5px"), Some(json!(1.5)));
        assert_eq!(parse_template_style(FONT_SIZE, "large"), None);
    }
}
