use super::ChangeBuffer;
use crate::command::{parse_params, resolve_range, Command};
use crate::errors::Result;
use folio_engine::model::{
    Attributes, Document, Model, PathRange, Position, Range, Schema, Writer, TEXT_NAME,
};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputParams {
    pub text: String,
    /// Replaced content; the selection when absent.
    pub range: Option<PathRange>,
    /// Selection after typing; right after the text when absent.
    pub result_range: Option<PathRange>,
}

/// Types text, replacing the selected content. Consecutive input goes
/// into the change buffer's batch.
pub struct InputCommand {
    buffer: Rc<RefCell<ChangeBuffer>>,
    enabled: bool,
}

impl InputCommand {
    pub fn new(buffer: Rc<RefCell<ChangeBuffer>>) -> Self {
        Self { buffer, enabled: true }
    }

    pub fn buffer(&self) -> Rc<RefCell<ChangeBuffer>> {
        self.buffer.clone()
    }
}

impl Command for InputCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        self.enabled = document.is_attached(document.selection().focus().parent);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: InputParams = parse_params(params)?;
        let batch = self.buffer.borrow_mut().batch(model);
        let buffer = self.buffer.clone();
        let typed = params.text.chars().count();

        model.enqueue_change(Some(batch), move |writer| {
            let range = match &params.range {
                Some(range) => resolve_range(range, writer.document())?,
                None => writer.document().selection().range(),
            };
            if params.text.is_empty() && range.is_collapsed() {
                return Ok(());
            }
            let attributes: Attributes = writer
                .document()
                .selection()
                .attributes()
                .iter()
                .filter(|(key, _)| writer.schema().check_attribute(TEXT_NAME, key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            buffer.borrow_mut().lock();
            let replaced = replace_content(writer, range, &params, attributes, typed);
            buffer.borrow_mut().unlock();
            let inserted = replaced?;
            buffer.borrow_mut().input(inserted);
            Ok(())
        })?;
        Ok(())
    }
}

/// Deletes `range` and types the text in its place. Returns the number of
/// characters inserted.
fn replace_content(
    writer: &mut Writer<'_>,
    range: Range,
    params: &InputParams,
    attributes: Attributes,
    typed: usize,
) -> folio_engine::Result<usize> {
    writer.delete_content(range)?;
    let start = range.start;
    let parent_name = writer.document().name(start.parent).unwrap_or_default().to_string();
    let inserted = if writer.schema().check_child(&parent_name, TEXT_NAME) {
        writer.insert_text(&params.text, attributes, start)?;
        typed
    } else {
        debug!(parent = %parent_name, "Text is not allowed here");
        0
    };
    match &params.result_range {
        Some(result) => {
            let result = resolve_range(result, writer.document())?;
            writer.set_selection(result, false)?;
        }
        None => writer.set_selection_at(Position::new(start.parent, start.offset + inserted))?,
    }
    Ok(inserted)
}
