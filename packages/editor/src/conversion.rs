//! The three dispatchers every editor owns.

use folio_engine::conversion::{downcast_helpers, DowncastDispatcher, UpcastDispatcher};

/// Converters for the editing view, the data view and data input.
///
/// Plugins register converters while they are initialized; afterwards the
/// editing and data controllers only read from it.
#[derive(Debug)]
pub struct Conversion {
    pub editing_downcast: DowncastDispatcher,
    pub data_downcast: DowncastDispatcher,
    pub upcast: UpcastDispatcher,
}

impl Default for Conversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversion {
    /// Dispatchers with text insertion and removal already handled.
    pub fn new() -> Self {
        let mut conversion = Self {
            editing_downcast: DowncastDispatcher::new(),
            data_downcast: DowncastDispatcher::new(),
            upcast: UpcastDispatcher::new(),
        };
        conversion.for_downcast(|dispatcher| {
            downcast_helpers::insert_text(dispatcher);
            downcast_helpers::remove(dispatcher);
        });
        conversion
    }

    /// Runs `register` against both downcast dispatchers.
    pub fn for_downcast(&mut self, register: impl Fn(&mut DowncastDispatcher)) {
        register(&mut self.editing_downcast);
        register(&mut self.data_downcast);
    }
}
