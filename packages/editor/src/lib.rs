//! # Folio Editor
//!
//! Editor built on the Folio engine: plugins, commands, data I/O and the
//! editing view.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host: commands, set_data / get_data         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Editor + plugins                    │
//! │  - Plugins register schema and converters   │
//! │  - Commands change the model in blocks      │
//! │  - Post-fixers keep features consistent     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ engine: model → editing view / data HTML    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Plugins own their features**: schema, converters, fixers, commands
//! 2. **Consistency after every block**: mentions never end up partial and
//!    videos always have one caption
//! 3. **Host-driven I/O**: uploads finish when the host reports back
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_editor::{features, Editor, EditorConfig};
//! use serde_json::json;
//!
//! let mut editor = Editor::create(EditorConfig::default(), features::standard_plugins())?;
//! editor.set_data("<p>Hello</p>")?;
//! editor.execute("bold", json!(null))?;
//! println!("{}", editor.get_data()?);
//! ```

pub mod command;
pub mod config;
pub mod conversion;
mod data;
pub mod editing;
mod editor;
mod errors;
pub mod features;
pub mod notification;
pub mod plugin;
pub mod typing;
pub mod undo_stack;
pub mod upload;
pub mod widget;

pub use command::Command;
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use data::PARAGRAPH;
pub use editing::{ViewFixContext, ViewPostFixer};
pub use editor::Editor;
pub use errors::{EditorError, Result, DOCUMENTATION_URL};
pub use notification::{Notification, NotificationKind, Notifications};
pub use plugin::Plugin;
pub use upload::{FileLoader, FileRepository, LoaderStatus, UploadFile};

// Re-export the engine for hosts that only depend on the editor
pub use folio_engine;
