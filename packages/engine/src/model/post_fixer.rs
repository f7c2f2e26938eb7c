//! Post-fixers repair model invariants at the end of every change block.
//!
//! All registered fixers run in full passes until a pass in which none of
//! them reports a change. A pass that still changes something after
//! [`MAX_POST_FIXER_PASSES`] passes aborts with
//! [`EngineError::PostFixerDivergence`].
//!
//! Execution order is registration order, refined by the names each fixer
//! declares in [`PostFixer::runs_after`].

use super::Writer;
use crate::error::{EngineError, Result};
use tracing::{debug, warn};

pub const MAX_POST_FIXER_PASSES: usize = 50;

pub trait PostFixer {
    fn name(&self) -> &str;

    /// Names of fixers that must run before this one within a pass.
    fn runs_after(&self) -> &[&str] {
        &[]
    }

    /// Returns `true` when the model was changed.
    fn fix(&mut self, writer: &mut Writer<'_>) -> Result<bool>;
}

type FixFn = Box<dyn FnMut(&mut Writer<'_>) -> Result<bool>>;

/// Post-fixer backed by a closure.
pub struct FnPostFixer {
    name: String,
    after: Vec<&'static str>,
    fix: FixFn,
}

impl FnPostFixer {
    pub fn new(
        name: impl Into<String>,
        fix: impl FnMut(&mut Writer<'_>) -> Result<bool> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            fix: Box::new(fix),
        }
    }

    pub fn after(mut self, names: &[&'static str]) -> Self {
        self.after.extend_from_slice(names);
        self
    }
}

impl PostFixer for FnPostFixer {
    fn name(&self) -> &str {
        &self.name
    }

    fn runs_after(&self) -> &[&str] {
        &self.after
    }

    fn fix(&mut self, writer: &mut Writer<'_>) -> Result<bool> {
        (self.fix)(writer)
    }
}

#[derive(Default)]
pub struct PostFixerRegistry {
    fixers: Vec<Box<dyn PostFixer>>,
    order: Vec<usize>,
}

impl PostFixerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, fixer: Box<dyn PostFixer>) -> Result<()> {
        self.fixers.push(fixer);
        match self.resolve_order() {
            Ok(order) => {
                self.order = order;
                Ok(())
            }
            Err(err) => {
                self.fixers.pop();
                Err(err)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixers.is_empty()
    }

    /// Fixer names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.fixers[i].name()).collect()
    }

    /// Stable topological sort: among the fixers whose dependencies are
    /// already placed, the earliest registered goes first.
    fn resolve_order(&self) -> Result<Vec<usize>> {
        let names: Vec<&str> = self.fixers.iter().map(|f| f.name()).collect();
        let mut placed = vec![false; self.fixers.len()];
        let mut order = Vec::with_capacity(self.fixers.len());

        while order.len() < self.fixers.len() {
            let next = (0..self.fixers.len()).find(|&i| {
                !placed[i]
                    && self.fixers[i].runs_after().iter().all(|dependency| {
                        names
                            .iter()
                            .enumerate()
                            .all(|(j, name)| name != dependency || placed[j] || j == i)
                    })
            });
            match next {
                Some(i) => {
                    placed[i] = true;
                    order.push(i);
                }
                None => {
                    let stuck = (0..self.fixers.len())
                        .filter(|&i| !placed[i])
                        .map(|i| names[i].to_string())
                        .collect();
                    return Err(EngineError::PostFixerCycle(stuck));
                }
            }
        }
        Ok(order)
    }

    /// Runs passes until the model settles. Returns the number of passes.
    pub(crate) fn run(&mut self, writer: &mut Writer<'_>) -> Result<usize> {
        for pass in 1..=MAX_POST_FIXER_PASSES {
            let mut changed = Vec::new();
            for &index in &self.order {
                writer.doc.refresh_selection_attributes(false);
                let fixer = &mut self.fixers[index];
                if fixer.fix(writer)? {
                    changed.push(fixer.name().to_string());
                }
            }
            if changed.is_empty() {
                debug!(passes = pass, "Post-fixers settled");
                return Ok(pass);
            }
            debug!(pass, fixers = ?changed, "Post-fixer pass changed the model");
            if pass == MAX_POST_FIXER_PASSES {
                warn!(passes = pass, fixers = ?changed, "Post-fixers diverged");
                return Err(EngineError::PostFixerDivergence {
                    passes: pass,
                    fixers: changed,
                });
            }
        }
        Ok(MAX_POST_FIXER_PASSES)
    }
}

impl std::fmt::Debug for PostFixerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFixerRegistry")
            .field("fixers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &'static str) -> FnPostFixer {
        FnPostFixer::new(name, |_| Ok(false))
    }

    #[test]
    fn test_registration_order_is_kept_without_dependencies() {
        let mut registry = PostFixerRegistry::new();
        registry.register(Box::new(noop("a"))).unwrap();
        registry.register(Box::new(noop("b"))).unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_declared_dependency_reorders() {
        let mut registry = PostFixerRegistry::new();
        registry
            .register(Box::new(noop("caption").after(&["mention"])))
            .unwrap();
        registry.register(Box::new(noop("mention"))).unwrap();
        assert_eq!(registry.names(), vec!["mention", "caption"]);
    }

    #[test]
    fn test_unknown_dependency_is_ignored() {
        let mut registry = PostFixerRegistry::new();
        registry
            .register(Box::new(noop("caption").after(&["missing"])))
            .unwrap();
        assert_eq!(registry.names(), vec!["caption"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut registry = PostFixerRegistry::new();
        registry.register(Box::new(noop("a").after(&["b"]))).unwrap();
        let err = registry
            .register(Box::new(noop("b").after(&["a"])))
            .unwrap_err();
        assert!(matches!(err, EngineError::PostFixerCycle(_)));
        assert_eq!(registry.len(), 1);
    }
}
