//! `undo` and `redo` commands over a shared [`UndoStack`].

use crate::command::Command;
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use crate::undo_stack::UndoStack;
use folio_engine::model::{Document, Model, Schema};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

pub struct HistoryCommand {
    stack: Rc<RefCell<UndoStack>>,
    direction: Direction,
    enabled: bool,
}

impl HistoryCommand {
    pub fn undo(stack: Rc<RefCell<UndoStack>>) -> Self {
        Self {
            stack,
            direction: Direction::Undo,
            enabled: false,
        }
    }

    pub fn redo(stack: Rc<RefCell<UndoStack>>) -> Self {
        Self {
            stack,
            direction: Direction::Redo,
            enabled: false,
        }
    }
}

impl Command for HistoryCommand {
    fn refresh(&mut self, _document: &Document, _schema: &Schema) {
        let stack = self.stack.borrow();
        self.enabled = match self.direction {
            Direction::Undo => stack.can_undo(),
            Direction::Redo => stack.can_redo(),
        };
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, _params: Value) -> Result<()> {
        match self.direction {
            Direction::Undo => UndoStack::undo(&self.stack, model)?,
            Direction::Redo => UndoStack::redo(&self.stack, model)?,
        };
        Ok(())
    }
}

pub struct Undo;

impl Plugin for Undo {
    fn name(&self) -> &'static str {
        "Undo"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let stack = Rc::new(RefCell::new(UndoStack::with_max_levels(editor.config().undo.max_levels)));
        editor.model_mut().add_observer(stack.clone());
        editor.add_command("undo", HistoryCommand::undo(stack.clone()));
        editor.add_command("redo", HistoryCommand::redo(stack));
        Ok(())
    }
}
