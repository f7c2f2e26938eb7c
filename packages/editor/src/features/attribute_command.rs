use crate::command::{parse_params, Command};
use crate::errors::Result;
use folio_engine::model::{Document, Model, Schema};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ToggleParams {
    force_value: Option<bool>,
}

/// Toggles a boolean text attribute on the selection.
///
/// With a collapsed selection the attribute goes on the selection itself, so
/// the next typed text picks it up.
pub struct AttributeCommand {
    key: &'static str,
    value: bool,
    enabled: bool,
}

impl AttributeCommand {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            value: false,
            enabled: false,
        }
    }
}

impl Command for AttributeCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        self.value = document.selection().has_attribute(self.key);
        self.enabled = schema.check_attribute_in_selection(document, self.key);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        Value::Bool(self.value)
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: ToggleParams = parse_params(params)?;
        let apply = params.force_value.unwrap_or(!self.value);
        let key = self.key;
        model.change(|writer| {
            let selection = writer.document().selection().clone();
            if selection.is_collapsed() {
                if apply {
                    writer.set_selection_attribute(key, Value::Bool(true));
                } else {
                    writer.remove_selection_attribute(key);
                }
                return Ok(());
            }
            let ranges = writer
                .schema()
                .valid_ranges(writer.document(), &selection.range(), key)?;
            for range in ranges {
                if apply {
                    writer.set_attribute(key, Value::Bool(true), range)?;
                } else {
                    writer.remove_attribute(key, range)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}
