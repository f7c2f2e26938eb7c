//! Font color, background color, size, family and line height.
//!
//! Each is a text attribute rendered as `<span style="…">`. Line height also
//! marks the blocks it was applied to with `lineHeightWrapper`.

use super::selected_blocks;
use crate::command::{parse_params, Command};
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{Document, Model, NodeId, Schema, TEXT_NAME};
use serde::Deserialize;
use serde_json::Value;

pub const FONT_COLOR: &str = "fontColor";
pub const FONT_BACKGROUND_COLOR: &str = "fontBackgroundColor";
pub const FONT_SIZE: &str = "fontSize";
pub const FONT_FAMILY: &str = "fontFamily";
pub const LINE_HEIGHT: &str = "lineHeight";
pub const LINE_HEIGHT_WRAPPER: &str = "lineHeightWrapper";
pub const LINE_HEIGHT_WRAPPER_CLASS: &str = "ck-line-height-wrapper";

/// Font spans nest outside basic styles.
const FONT_PRIORITY: i32 = 7;

const FONT_STYLES: &[(&str, &str)] = &[
    (FONT_COLOR, "color"),
    (FONT_BACKGROUND_COLOR, "background-color"),
    (FONT_SIZE, "font-size"),
    (FONT_FAMILY, "font-family"),
    (LINE_HEIGHT, "line-height"),
];

/// Style value for a model attribute value. Bare font sizes are pixels.
pub fn style_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) if key == FONT_SIZE && s.parse::<f64>().is_ok() => Some(format!("{s}px")),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if key == FONT_SIZE => Some(format!("{n}px")),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn register_font_style(editor: &mut Editor, key: &'static str, property: &'static str) {
    editor
        .model_mut()
        .schema_mut()
        .extend(TEXT_NAME, |definition| definition.allow_attributes.push(key.to_string()));

    let mut conversion = editor.conversion();
    conversion.for_downcast(|dispatcher| {
        downcast_helpers::attribute_to_element(dispatcher, key, move |value, writer| {
            let style = style_value(key, value)?;
            let declaration = format!("{property}:{style}");
            Some(writer.create_attribute_element("span", &[("style", declaration.as_str())], FONT_PRIORITY, None))
        });
    });
    upcast_helpers::element_to_attribute(
        &mut conversion.upcast,
        ViewMatcher::element("span").style(property),
        key,
        move |view, element| view.style(element, property).map(|v| Value::String(v.to_string())),
    );
    drop(conversion);

    editor.add_command(key, FontCommand::new(key));
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FontParams {
    value: Option<Value>,
}

/// Sets a font attribute on the selection; `null` removes it.
pub struct FontCommand {
    key: &'static str,
    value: Value,
    enabled: bool,
}

impl FontCommand {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            value: Value::Null,
            enabled: false,
        }
    }
}

impl Command for FontCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        self.value = document.selection().attribute(self.key).cloned().unwrap_or(Value::Null);
        self.enabled = schema.check_attribute_in_selection(document, self.key);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: FontParams = parse_params(params)?;
        let value = params.value.filter(|v| !v.is_null());
        let key = self.key;
        model.change(|writer| {
            let selection = writer.document().selection().clone();
            if selection.is_collapsed() {
                match &value {
                    Some(value) => writer.set_selection_attribute(key, value.clone()),
                    None => writer.remove_selection_attribute(key),
                }
            } else {
                let ranges = writer
                    .schema()
                    .valid_ranges(writer.document(), &selection.range(), key)?;
                for range in ranges {
                    match &value {
                        Some(value) => writer.set_attribute(key, value.clone(), range)?,
                        None => writer.remove_attribute(key, range)?,
                    }
                }
            }

            if key != LINE_HEIGHT {
                return Ok(());
            }
            let blocks: Vec<NodeId> = selected_blocks(writer.document(), writer.schema())
                .into_iter()
                .filter(|block| {
                    let name = writer.document().name(*block).unwrap_or_default();
                    writer.schema().check_attribute(name, LINE_HEIGHT_WRAPPER)
                })
                .collect();
            for block in blocks {
                if value.is_some() {
                    writer.set_attribute_on(LINE_HEIGHT_WRAPPER, Value::Bool(true), block)?;
                } else {
                    writer.remove_attribute_from(LINE_HEIGHT_WRAPPER, block)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// All font features, each with its command.
pub struct Font;

impl Plugin for Font {
    fn name(&self) -> &'static str {
        "Font"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        for &(key, property) in FONT_STYLES {
            register_font_style(editor, key, property);
        }
        Ok(())
    }

    /// Blocks registered by other plugins are known by now.
    fn after_init(&self, editor: &mut Editor) -> Result<()> {
        editor
            .model_mut()
            .schema_mut()
            .allow_attribute_on_blocks(LINE_HEIGHT_WRAPPER);
        let blocks: Vec<String> = {
            let schema = editor.model().schema();
            schema
                .names()
                .filter(|name| schema.is_block(name))
                .map(str::to_string)
                .collect()
        };

        let mut conversion = editor.conversion();
        for block in &blocks {
            conversion.for_downcast(|dispatcher| {
                downcast_helpers::attribute_to_attribute(dispatcher, block, LINE_HEIGHT_WRAPPER, |value| {
                    (value == &Value::Bool(true)).then(|| ("class".to_string(), LINE_HEIGHT_WRAPPER_CLASS.to_string()))
                });
            });
        }
        upcast_helpers::attribute_to_attribute(
            &mut conversion.upcast,
            ViewMatcher::any().class(LINE_HEIGHT_WRAPPER_CLASS),
            LINE_HEIGHT_WRAPPER,
            |_, _| Some(Value::Bool(true)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_style_values() {
        assert_eq!(style_value(FONT_SIZE, &json!(12)), Some("12px".into()));
        assert_eq!(style_value(FONT_SIZE, &json!("14")), Some("14px".into()));
        assert_eq!(style_value(FONT_SIZE, &json!("1.2em")), Some("1.2em".into()));
        assert_eq!(style_value(FONT_COLOR, &json!("red")), Some("red".into()));
        assert_eq!(style_value(LINE_HEIGHT, &json!(1.5)), Some("1.5".into()));
        assert_eq!(style_value(FONT_COLOR, &json!("")), None);
        assert_eq!(style_value(FONT_COLOR, &json!(true)), None);
    }
}
