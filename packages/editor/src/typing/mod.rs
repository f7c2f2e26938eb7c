//! Typing: the `input` command and the change buffer behind it.

mod change_buffer;
mod input_command;

pub use change_buffer::ChangeBuffer;
pub use input_command::{InputCommand, InputParams};

use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Typing;

impl Plugin for Typing {
    fn name(&self) -> &'static str {
        "Typing"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let buffer = Rc::new(RefCell::new(ChangeBuffer::new(editor.config().typing.undo_step)));
        editor.model_mut().add_observer(buffer.clone());
        editor.add_command("input", InputCommand::new(buffer));
        Ok(())
    }
}
