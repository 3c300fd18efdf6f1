// src/transform/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{AssetflowError, Result};
use crate::graph::Stage;

use super::builtin::{ConcatTransform, CopyTransform, RenameTransform};
use super::command::CommandTransform;
use super::Transform;

/// Name -> implementation table consulted by the scheduler.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Arc<dyn Transform>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransformRegistry {
    /// An empty registry. Mostly useful in tests that register fakes.
    pub fn new() -> Self {
        Self::default()
    }

    /// `copy`, `concat`, `rename` and `command`.
    pub fn with_builtins() -> Self {
        Self::new()
            .with("copy", CopyTransform)
            .with("concat", ConcatTransform)
            .with("rename", RenameTransform)
            .with("command", CommandTransform)
    }

    pub fn with(mut self, name: impl Into<String>, transform: impl Transform + 'static) -> Self {
        self.register(name, Arc::new(transform));
        self
    }

    /// Register or replace a transform.
    pub fn register(&mut self, name: impl Into<String>, transform: Arc<dyn Transform>) {
        self.transforms.insert(name.into(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transform>> {
        self.transforms.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(|s| s.as_str())
    }

    /// Every operation of `stage` must name a registered transform with
    /// valid options.
    pub fn validate_stage(&self, stage: &Stage) -> Result<()> {
        for op in &stage.operations {
            let transform = self.get(&op.uses).ok_or_else(|| {
                AssetflowError::ConfigError(format!(
                    "stage '{}' uses unknown operation '{}' (known: {})",
                    stage.name,
                    op.uses,
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })?;
            transform.validate(op).map_err(|e| {
                AssetflowError::ConfigError(format!(
                    "stage '{}', operation '{}': {e:#}",
                    stage.name, op.uses
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Operation;

    #[test]
    fn unknown_operation_is_rejected() {
        let registry = TransformRegistry::with_builtins();
        let stage = Stage::new("styles").operation(Operation::new("sass"));

        let err = registry.validate_stage(&stage).unwrap_err();
        assert!(err.to_string().contains("unknown operation 'sass'"), "{err}");
    }

    #[test]
    fn invalid_options_are_rejected() {
        let registry = TransformRegistry::with_builtins();
        let stage = Stage::new("scripts").operation(Operation::new("concat"));

        assert!(registry.validate_stage(&stage).is_err());
    }
}
