//! The data pipeline: HTML in, HTML out.

use crate::conversion::Conversion;
use crate::errors::Result;
use folio_engine::conversion::{auto_paragraph, Mapper};
use folio_engine::dev_utils::{parse_html, stringify_children};
use folio_engine::model::{BatchKind, Document, Model, NodeSnapshot, Position, Range, Schema, ROOT_NAME};
use folio_engine::view::View;
use folio_engine::EngineError;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, instrument};

/// Element used to wrap loose inline content found at the root.
pub const PARAGRAPH: &str = "paragraph";

pub struct DataController {
    conversion: Rc<RefCell<Conversion>>,
}

impl DataController {
    pub fn new(conversion: Rc<RefCell<Conversion>>) -> Self {
        Self { conversion }
    }

    /// Serializes the root content through the data downcast.
    #[instrument(skip_all)]
    pub fn stringify(&self, document: &Document, schema: &Schema) -> Result<String> {
        let mut view = View::new(ROOT_NAME);
        let mut mapper = Mapper::new();
        mapper
            .bind_elements(document.root(), view.root())
            .map_err(EngineError::from)?;
        let root = document.root();
        let content = document.range_in(root);
        self.conversion
            .borrow()
            .data_downcast
            .convert_insert(document, schema, &content, &mut view, &mut mapper)?;
        Ok(stringify_children(&view, view.root(), false))
    }

    /// Converts HTML into model content that may be inserted into a
    /// `context` element.
    #[instrument(skip_all, fields(context = %context))]
    pub fn parse(&self, html: &str, schema: &Schema, context: &str) -> Result<Vec<NodeSnapshot>> {
        let view = parse_html(html)?;
        let nodes = self
            .conversion
            .borrow()
            .upcast
            .convert(&view, view.root(), schema, context)?;
        let nodes = if context == ROOT_NAME {
            auto_paragraph(nodes, schema, context, PARAGRAPH)
        } else {
            nodes
        };
        debug!(nodes = nodes.len(), "Parsed data");
        Ok(nodes)
    }

    /// Replaces the whole document with `html` in a transparent batch and
    /// puts the selection at the default position.
    pub fn set(&self, model: &mut Model, html: &str) -> Result<()> {
        let nodes = self.parse(html, model.schema(), ROOT_NAME)?;
        let batch = model.create_batch(BatchKind::Transparent);
        model.change_in(batch, move |writer| {
            let root = writer.document().root();
            let all = writer.document().range_in(root);
            writer.remove(all)?;
            writer.insert(nodes, Position::new(root, 0))?;
            let position = writer.document().default_position();
            writer.set_selection(Range::collapsed(position), false)
        })?;
        Ok(())
    }
}
