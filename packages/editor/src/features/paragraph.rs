use crate::data::PARAGRAPH;
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{ItemDefinition, NodeSnapshot, ROOT_NAME};

/// `paragraph` ↔ `<p>`.
pub struct Paragraph;

impl Plugin for Paragraph {
    fn name(&self) -> &'static str {
        "Paragraph"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        editor
            .model_mut()
            .schema_mut()
            .register(PARAGRAPH, ItemDefinition::default().allowed_in(ROOT_NAME).block());

        let mut conversion = editor.conversion();
        conversion.for_downcast(|dispatcher| {
            downcast_helpers::element_to_element(dispatcher, PARAGRAPH, |_, _, writer| {
                Some(writer.create_container_element("p", &[]))
            });
        });
        upcast_helpers::element_to_element(&mut conversion.upcast, ViewMatcher::element("p"), |_, _| {
            Some(NodeSnapshot::element(PARAGRAPH))
        });
        Ok(())
    }
}
