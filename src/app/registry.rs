//! Lookup of application objects by import string.

use std::collections::HashMap;
use std::sync::Arc;

use crate::app::builtin::LivenessApp;
use crate::app::target::{AppRef, AppRefError};
use crate::app::Application;

/// Errors produced while resolving an [`AppRef`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppResolveError {
    #[error("could not import module '{0}'")]
    ModuleNotFound(String),
    #[error("attribute '{attribute}' not found in module '{module}'")]
    AttributeNotFound { module: String, attribute: String },
}

/// Registered applications, keyed by module then attribute.
#[derive(Default)]
pub struct AppRegistry {
    modules: HashMap<String, HashMap<String, Arc<dyn Application>>>,
}

impl AppRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in liveness application at `main:app`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(AppRef::new("main", "app"), LivenessApp);
        registry
    }

    /// Register an application under an import string, replacing any previous one.
    pub fn register<A: Application>(&mut self, target: &str, app: A) -> Result<(), AppRefError> {
        let target: AppRef = target.parse()?;
        self.insert(target, app);
        Ok(())
    }

    fn insert<A: Application>(&mut self, target: AppRef, app: A) {
        tracing::debug!(target = %target, "Registering application");
        self.modules
            .entry(target.module().to_string())
            .or_default()
            .insert(target.attribute().to_string(), Arc::new(app));
    }

    /// Find the application an import string points at.
    pub fn resolve(&self, target: &AppRef) -> Result<Arc<dyn Application>, AppResolveError> {
        let module = self
            .modules
            .get(target.module())
            .ok_or_else(|| AppResolveError::ModuleNotFound(target.module().to_string()))?;

        module
            .get(target.attribute())
            .cloned()
            .ok_or_else(|| AppResolveError::AttributeNotFound {
                module: target.module().to_string(),
                attribute: target.attribute().to_string(),
            })
    }

}
