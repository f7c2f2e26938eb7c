//! Bold, italic and underline.

use super::attribute_command::AttributeCommand;
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::TEXT_NAME;
use folio_engine::view::DEFAULT_PRIORITY;
use serde_json::Value;

struct Style {
    key: &'static str,
    element: &'static str,
    aliases: &'static [&'static str],
    plugin: &'static str,
}

const BOLD: Style = Style {
    key: "bold",
    element: "strong",
    aliases: &["b"],
    plugin: "Bold",
};

const ITALIC: Style = Style {
    key: "italic",
    element: "i",
    aliases: &["em"],
    plugin: "Italic",
};

const UNDERLINE: Style = Style {
    key: "underline",
    element: "u",
    aliases: &[],
    plugin: "Underline",
};

fn init_style(style: &Style, editor: &mut Editor) -> Result<()> {
    editor
        .model_mut()
        .schema_mut()
        .extend(TEXT_NAME, |definition| definition.allow_attributes.push(style.key.to_string()));

    let element = style.element;
    let mut conversion = editor.conversion();
    conversion.for_downcast(|dispatcher| {
        downcast_helpers::attribute_to_element(dispatcher, style.key, move |value, writer| {
            (value == &Value::Bool(true))
                .then(|| writer.create_attribute_element(element, &[], DEFAULT_PRIORITY, None))
        });
    });
    for name in std::iter::once(&style.element).chain(style.aliases) {
        upcast_helpers::element_to_attribute(&mut conversion.upcast, ViewMatcher::element(name), style.key, |_, _| {
            Some(Value::Bool(true))
        });
    }
    drop(conversion);

    editor.add_command(style.key, AttributeCommand::new(style.key));
    Ok(())
}

pub struct Bold;

impl Plugin for Bold {
    fn name(&self) -> &'static str {
        BOLD.plugin
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        init_style(&BOLD, editor)
    }
}

pub struct Italic;

impl Plugin for Italic {
    fn name(&self) -> &'static str {
        ITALIC.plugin
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        init_style(&ITALIC, editor)
    }
}

pub struct Underline;

impl Plugin for Underline {
    fn name(&self) -> &'static str {
        UNDERLINE.plugin
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        init_style(&UNDERLINE, editor)
    }
}
