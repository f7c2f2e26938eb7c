//! # Conversion
//!
//! Model ↔ view conversion.
//!
//! ```text
//! differ entries ──► DowncastDispatcher ──► ViewWriter ──► View
//!                         │      ▲
//!                         ▼      │
//!                        Mapper (model element ↔ view element)
//!
//! View ──► UpcastDispatcher ──► Vec<NodeSnapshot> ──► Writer::insert
//! ```

mod consumable;
mod downcast;
pub mod downcast_helpers;
mod mapper;
mod upcast;
pub mod upcast_helpers;

pub use consumable::{ChangeEvent, Consumable, ConsumableItem, DowncastKey, UpcastKey, ViewMatchPart};
pub use downcast::{
    DowncastApi, DowncastCallback, DowncastData, DowncastDispatcher, EventInfo, EventPattern, Priority,
};
pub use mapper::{Bias, BindingConflict, Mapper};
pub use upcast::{auto_paragraph, UpcastApi, UpcastCallback, UpcastData, UpcastDispatcher, UpcastPattern, ViewMatcher};
