//! # Plugins
//!
//! Every feature is a plugin. The editor initializes plugins in dependency
//! order: a plugin's `requires` are always initialized before it, otherwise
//! the order in which plugins were given is kept.

use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use std::collections::HashSet;
use std::rc::Rc;

pub trait Plugin {
    fn name(&self) -> &'static str;

    /// Names of plugins that must be loaded and initialized first.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Registers schema, converters, post-fixers and commands.
    fn init(&self, editor: &mut Editor) -> Result<()>;

    /// Runs once every plugin has been initialized.
    fn after_init(&self, _editor: &mut Editor) -> Result<()> {
        Ok(())
    }
}

/// Orders plugins so that each comes after everything it requires.
pub(crate) fn resolve_order(plugins: Vec<Box<dyn Plugin>>) -> Result<Vec<Rc<dyn Plugin>>> {
    let mut seen = HashSet::new();
    for plugin in &plugins {
        if !seen.insert(plugin.name()) {
            return Err(EditorError::DuplicatePlugin(plugin.name().to_string()));
        }
    }
    for plugin in &plugins {
        if let Some(missing) = plugin.requires().iter().find(|r| !seen.contains(*r)) {
            return Err(EditorError::MissingPlugin {
                plugin: plugin.name().to_string(),
                missing: missing.to_string(),
            });
        }
    }

    let mut pending: Vec<Rc<dyn Plugin>> = plugins.into_iter().map(Rc::from).collect();
    let mut ordered: Vec<Rc<dyn Plugin>> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|plugin| {
            plugin
                .requires()
                .iter()
                .all(|required| ordered.iter().any(|done| done.name() == *required))
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                return Err(EditorError::PluginCycle(
                    pending.iter().map(|p| p.name().to_string()).collect(),
                ))
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static [&'static str]);

    impl Plugin for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn requires(&self) -> &'static [&'static str] {
            self.1
        }

        fn init(&self, _editor: &mut Editor) -> Result<()> {
            Ok(())
        }
    }

    fn names(plugins: &[Rc<dyn Plugin>]) -> Vec<&'static str> {
        plugins.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_requirements_come_first() {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Named("VideoCaption", &["Video"])),
            Box::new(Named("Paragraph", &[])),
            Box::new(Named("Video", &[])),
        ];
        let ordered = resolve_order(plugins).unwrap();
        assert_eq!(names(&ordered), vec!["Paragraph", "Video", "VideoCaption"]);
    }

    #[test]
    fn test_missing_requirement() {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Named("VideoCaption", &["Video"]))];
        let err = resolve_order(plugins).err().unwrap();
        assert!(matches!(
            err,
            EditorError::MissingPlugin { ref missing, .. } if missing == "Video"
        ));
    }

    #[test]
    fn test_cycle() {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Named("A", &["B"])),
            Box::new(Named("B", &["A"])),
        ];
        assert!(matches!(resolve_order(plugins), Err(EditorError::PluginCycle(_))));
    }

    #[test]
    fn test_duplicate() {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Named("A", &[])), Box::new(Named("A", &[]))];
        assert!(matches!(resolve_order(plugins), Err(EditorError::DuplicatePlugin(_))));
    }
}
