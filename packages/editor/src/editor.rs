//! The editor: a model, its conversion pipelines, plugins and commands.

use crate::command::{Command, CommandCollection, CommandHandle, CommandRefresher};
use crate::config::EditorConfig;
use crate::conversion::Conversion;
use crate::data::DataController;
use crate::editing::{EditingController, ViewPostFixer};
use crate::errors::{EditorError, Result};
use crate::notification::Notifications;
use crate::plugin::{resolve_order, Plugin};
use crate::upload::FileRepository;
use crate::widget::WidgetSelection;
use folio_engine::model::{Model, ROOT_NAME};
use folio_engine::view::View;
use serde_json::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use tracing::{debug, info, instrument};

pub struct Editor {
    model: Model,
    config: EditorConfig,
    conversion: Rc<RefCell<Conversion>>,
    editing: Rc<RefCell<EditingController>>,
    data: DataController,
    commands: Rc<RefCell<CommandCollection>>,
    plugins: Vec<Rc<dyn Plugin>>,
    notifications: Rc<RefCell<Notifications>>,
    file_repository: Rc<RefCell<FileRepository>>,
}

impl Editor {
    /// Builds an editor and initializes `plugins` in dependency order.
    #[instrument(skip_all, fields(plugins = plugins.len()))]
    pub fn create(config: EditorConfig, plugins: Vec<Box<dyn Plugin>>) -> Result<Self> {
        let plugins = resolve_order(plugins)?;
        let mut model = Model::new();
        let conversion = Rc::new(RefCell::new(Conversion::new()));
        let editing = Rc::new(RefCell::new(EditingController::new(&model, conversion.clone())?));
        editing.borrow_mut().add_post_fixer(WidgetSelection::default());
        model.add_observer(editing.clone());

        let mut editor = Self {
            model,
            config,
            data: DataController::new(conversion.clone()),
            conversion,
            editing,
            commands: Rc::new(RefCell::new(CommandCollection::new())),
            plugins: plugins.clone(),
            notifications: Rc::new(RefCell::new(Notifications::new())),
            file_repository: Rc::new(RefCell::new(FileRepository::new())),
        };

        for plugin in &plugins {
            debug!(plugin = plugin.name(), "Initializing plugin");
            plugin.init(&mut editor)?;
        }
        for plugin in &plugins {
            plugin.after_init(&mut editor)?;
        }
        // Last, so commands read state the plugins' observers already updated.
        let refresher = CommandRefresher::new(editor.commands.clone());
        editor.model.add_observer(Rc::new(RefCell::new(refresher)));
        editor.refresh_commands();
        info!(
            plugins = editor.plugins.len(),
            commands = editor.commands.borrow().len(),
            "Editor ready"
        );
        Ok(editor)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn conversion(&self) -> RefMut<'_, Conversion> {
        self.conversion.borrow_mut()
    }

    pub fn editing(&self) -> Ref<'_, EditingController> {
        self.editing.borrow()
    }

    pub fn add_view_post_fixer(&mut self, fixer: impl ViewPostFixer + 'static) {
        self.editing.borrow_mut().add_post_fixer(fixer);
    }

    pub fn notifications(&self) -> Ref<'_, Notifications> {
        self.notifications.borrow()
    }

    pub fn notifications_handle(&self) -> Rc<RefCell<Notifications>> {
        self.notifications.clone()
    }

    pub fn file_repository(&self) -> Rc<RefCell<FileRepository>> {
        self.file_repository.clone()
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.name() == name)
    }

    // ---- commands ----

    pub fn add_command(&mut self, name: &str, command: impl Command + 'static) {
        self.commands
            .borrow_mut()
            .add(name, Rc::new(RefCell::new(command)));
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.borrow().contains(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.borrow().names()
    }

    /// The command. Its state is refreshed after every change block.
    pub fn command(&self, name: &str) -> Result<CommandHandle> {
        self.commands
            .borrow()
            .get(name)
            .ok_or_else(|| EditorError::UnknownCommand(name.to_string()))
    }

    pub fn refresh_commands(&self) {
        self.commands
            .borrow()
            .refresh_all(self.model.document(), self.model.schema());
    }

    /// Runs a command. Disabled commands do nothing.
    #[instrument(skip(self, params))]
    pub fn execute(&mut self, name: &str, params: Value) -> Result<()> {
        let handle = self.command(name)?;
        let mut command = handle.borrow_mut();
        command.refresh(self.model.document(), self.model.schema());
        if !command.is_enabled() {
            debug!("Command is disabled");
            return Ok(());
        }
        let result = command.execute(&mut self.model, params);
        command.refresh(self.model.document(), self.model.schema());
        result
    }

    // ---- data ----

    /// The document as HTML.
    pub fn get_data(&self) -> Result<String> {
        self.data.stringify(self.model.document(), self.model.schema())
    }

    /// Replaces the document with `html`.
    pub fn set_data(&mut self, html: &str) -> Result<()> {
        self.data.set(&mut self.model, html)
    }

    /// Parses HTML into model content allowed in `context`.
    pub fn parse_data(&self, html: &str, context: Option<&str>) -> Result<Vec<folio_engine::model::NodeSnapshot>> {
        self.data
            .parse(html, self.model.schema(), context.unwrap_or(ROOT_NAME))
    }

    /// The editing view as HTML, widget chrome included.
    pub fn editing_html(&self) -> String {
        self.editing.borrow().to_html()
    }

    /// A copy of the editing view tree.
    pub fn editing_view(&self) -> View {
        self.editing.borrow().view().clone()
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("model", &self.model)
            .field("plugins", &self.plugin_names())
            .field("commands", &self.command_names())
            .finish()
    }
}
