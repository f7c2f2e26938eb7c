//! Error types for the editor

use thiserror::Error;

/// Where configuration error codes are documented.
pub const DOCUMENTATION_URL: &str = "https://folio.dev/docs/errors";

#[derive(Error, Debug)]
pub enum EditorError {
    /// Declarative configuration that a plugin refuses at init.
    #[error("{code}: {message}. Read more: {DOCUMENTATION_URL}#error-{code}")]
    Configuration { code: &'static str, message: String },

    #[error("Plugin {plugin} requires {missing}, which was not loaded")]
    MissingPlugin { plugin: String, missing: String },

    #[error("Plugin {0} is loaded more than once")]
    DuplicatePlugin(String),

    #[error("Plugins depend on each other: {0:?}")]
    PluginCycle(Vec<String>),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid command parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    /// A command refused its input.
    #[error("{code}: {message}")]
    Command { code: &'static str, message: String },

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Engine error: {0}")]
    Engine(#[from] folio_engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        EditorError::Configuration {
            code,
            message: message.into(),
        }
    }

    /// Documentation code for errors that have one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            EditorError::Configuration { code, .. } | EditorError::Command { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
