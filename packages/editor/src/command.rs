//! Commands: named, refreshable actions on the model.

use crate::errors::Result;
use folio_engine::model::{ChangeBlock, ChangeObserver, Document, Model, PathRange, Range, Scheduler, Schema};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

pub trait Command {
    /// Recomputes `is_enabled` and `value` from the current model state.
    fn refresh(&mut self, document: &Document, schema: &Schema);

    fn is_enabled(&self) -> bool;

    fn value(&self) -> Value {
        Value::Null
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()>;
}

pub type CommandHandle = Rc<RefCell<dyn Command>>;

/// Registered commands in registration order.
#[derive(Default)]
pub struct CommandCollection {
    commands: IndexMap<String, CommandHandle>,
}

impl CommandCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, command: CommandHandle) {
        self.commands.insert(name.to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<CommandHandle> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Refreshes every command that is not running. A running command is
    /// refreshed by whoever executes it once it returns.
    pub fn refresh_all(&self, document: &Document, schema: &Schema) {
        for (name, command) in &self.commands {
            match command.try_borrow_mut() {
                Ok(mut command) => command.refresh(document, schema),
                Err(_) => trace!(command = %name, "Command is running, refresh deferred"),
            }
        }
    }
}

/// Refreshes the commands after every change block.
pub struct CommandRefresher {
    commands: Rc<RefCell<CommandCollection>>,
}

impl CommandRefresher {
    pub fn new(commands: Rc<RefCell<CommandCollection>>) -> Self {
        Self { commands }
    }
}

impl ChangeObserver for CommandRefresher {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, _scheduler: &mut Scheduler<'_>) -> folio_engine::Result<()> {
        if let Ok(commands) = self.commands.try_borrow() {
            commands.refresh_all(block.document, block.schema);
        }
        Ok(())
    }
}

/// Deserializes command parameters; `null` gives the defaults.
pub fn parse_params<T: DeserializeOwned + Default>(params: Value) -> Result<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(params)?)
}

/// A parameter that accepts a single value or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Resolves a range given as paths against the live document. Reversed
/// paths give the same range as their ordered counterpart.
pub fn resolve_range(range: &PathRange, document: &Document) -> folio_engine::Result<Range> {
    Ok(document.ordered_range(
        document.position_at_path(&range.start)?,
        document.position_at_path(&range.end)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Params {
        #[serde(default)]
        text: String,
    }

    #[test]
    fn test_null_params_give_defaults() {
        let params: Params = parse_params(Value::Null).unwrap();
        assert_eq!(params, Params::default());
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<String> = serde_json::from_value(json!("a.mp4")).unwrap();
        let many: OneOrMany<String> = serde_json::from_value(json!(["a.mp4", "b.mp4"])).unwrap();
        assert_eq!(one.into_vec(), vec!["a.mp4"]);
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn test_wrong_shape_is_invalid() {
        let result: Result<Params> = parse_params(json!({ "text": 3 }));
        assert!(matches!(result, Err(crate::errors::EditorError::InvalidParams(_))));
    }
}
