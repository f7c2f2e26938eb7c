//! The editing pipeline: model changes are replayed into the editing view,
//! then view post-fixers adjust presentation-only state.

use crate::conversion::Conversion;
use folio_engine::conversion::Mapper;
use folio_engine::dev_utils::{stringify_children, stringify_with_selection};
use folio_engine::model::{ChangeBlock, ChangeObserver, Document, Model, Scheduler, Schema, MAX_POST_FIXER_PASSES};
use folio_engine::view::{View, ViewWriter};
use folio_engine::{EngineError, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{instrument, trace, warn};

/// Read-only state a view post-fixer may consult.
pub struct ViewFixContext<'a> {
    pub document: &'a Document,
    pub schema: &'a Schema,
    pub mapper: &'a Mapper,
}

/// Adjusts the editing view after conversion. Runs to a fixed point like
/// model post-fixers, but may not touch the model.
pub trait ViewPostFixer {
    fn name(&self) -> &str;

    /// Returns `true` when the view was changed.
    fn fix(&mut self, context: &ViewFixContext<'_>, writer: &mut ViewWriter<'_>) -> Result<bool>;
}

pub struct EditingController {
    conversion: Rc<RefCell<Conversion>>,
    view: View,
    mapper: Mapper,
    post_fixers: Vec<Box<dyn ViewPostFixer>>,
}

impl EditingController {
    pub fn new(model: &Model, conversion: Rc<RefCell<Conversion>>) -> Result<Self> {
        let view = View::new(folio_engine::model::ROOT_NAME);
        let mut mapper = Mapper::new();
        mapper.bind_elements(model.document().root(), view.root())?;
        Ok(Self {
            conversion,
            view,
            mapper,
            post_fixers: Vec::new(),
        })
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn add_post_fixer(&mut self, fixer: impl ViewPostFixer + 'static) {
        self.post_fixers.push(Box::new(fixer));
    }

    /// Editing view content, UI elements included.
    pub fn to_html(&self) -> String {
        stringify_children(&self.view, self.view.root(), true)
    }

    /// Editing view content with the view selection marked.
    pub fn to_html_with_selection(&self) -> String {
        stringify_with_selection(&self.view, self.view.root())
    }

    fn run_post_fixers(&mut self, document: &Document, schema: &Schema) -> Result<()> {
        if self.post_fixers.is_empty() {
            return Ok(());
        }
        let context = ViewFixContext {
            document,
            schema,
            mapper: &self.mapper,
        };
        let mut writer = ViewWriter::new(&mut self.view);
        for pass in 1..=MAX_POST_FIXER_PASSES {
            let mut changed = Vec::new();
            for fixer in &mut self.post_fixers {
                if fixer.fix(&context, &mut writer)? {
                    changed.push(fixer.name().to_string());
                }
            }
            if changed.is_empty() {
                trace!(passes = pass, "View post-fixers settled");
                return Ok(());
            }
            if pass == MAX_POST_FIXER_PASSES {
                warn!(passes = pass, fixers = ?changed, "View post-fixers diverged");
                return Err(EngineError::PostFixerDivergence {
                    passes: pass,
                    fixers: changed,
                });
            }
        }
        Ok(())
    }
}

impl ChangeObserver for EditingController {
    #[instrument(skip_all, fields(changes = block.changes.len()))]
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, _scheduler: &mut Scheduler<'_>) -> Result<()> {
        self.conversion.borrow().editing_downcast.convert_changes(
            block.document,
            block.schema,
            block.changes,
            &mut self.view,
            &mut self.mapper,
        )?;
        let selection = block.document.selection().range();
        self.view.selection = self.mapper.to_view_range(block.document, &self.view, &selection);
        self.run_post_fixers(block.document, block.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_engine::conversion::downcast_helpers;
    use folio_engine::dev_utils::set_data;
    use folio_engine::model::{ItemDefinition, ROOT_NAME};

    struct MarkFirst;

    impl ViewPostFixer for MarkFirst {
        fn name(&self) -> &str {
            "mark-first"
        }

        fn fix(&mut self, _: &ViewFixContext<'_>, writer: &mut ViewWriter<'_>) -> Result<bool> {
            let root = writer.view().root();
            let Some(first) = writer.view().children(root).first().copied() else {
                return Ok(false);
            };
            if writer.view().has_class(first, "first") {
                return Ok(false);
            }
            writer.add_class("first", first)?;
            Ok(true)
        }
    }

    fn setup() -> (Model, Rc<RefCell<EditingController>>) {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", ItemDefinition::default().allowed_in(ROOT_NAME).block());
        let conversion = Rc::new(RefCell::new(Conversion::new()));
        downcast_helpers::element_to_element(&mut conversion.borrow_mut().editing_downcast, "paragraph", |_, _, writer| {
            Some(writer.create_container_element("p", &[]))
        });
        let editing = Rc::new(RefCell::new(EditingController::new(&model, conversion).unwrap()));
        editing.borrow_mut().add_post_fixer(MarkFirst);
        model.add_observer(editing.clone());
        (model, editing)
    }

    #[test]
    fn test_changes_reach_the_editing_view() {
        let (mut model, editing) = setup();
        set_data(&mut model, "<paragraph>foo[]</paragraph><paragraph>bar</paragraph>").unwrap();
        let editing = editing.borrow();
        assert_eq!(editing.to_html(), "<p class=\"first\">foo</p><p>bar</p>");
        assert!(editing.view().selection.is_some());
    }

    #[test]
    fn test_root_is_bound() {
        let (model, editing) = setup();
        let editing = editing.borrow();
        assert_eq!(
            editing.mapper().to_view_element(model.document().root()),
            Some(editing.view().root())
        );
    }
}
