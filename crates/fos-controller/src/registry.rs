//! Controller Registry
//!
//! Registration surface used by controller authors. A registered factory is
//! also seeded into the resolution cache, so names registered up front never
//! trigger a load.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use url::Url;

use crate::{ControllerFactory, EngineError, ResolutionCache};

/// Name -> factory registrations
pub struct ControllerRegistry {
    factories: RefCell<HashMap<String, ControllerFactory>>,
    cache: Rc<ResolutionCache>,
}

impl ControllerRegistry {
    pub(crate) fn new(cache: Rc<ResolutionCache>) -> Self {
        Self {
            factories: RefCell::new(HashMap::new()),
            cache,
        }
    }

    /// Associate `factory` with `name`.
    ///
    /// Re-registering replaces the factory used by later script loads; a
    /// name that already resolved keeps its cached factory.
    pub fn register(&self, name: &str, factory: ControllerFactory) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidName(name.to_string()));
        }

        let previous = self
            .factories
            .borrow_mut()
            .insert(name.to_string(), factory.clone());
        if previous.is_some() {
            tracing::warn!(controller = name, "Controller registered more than once");
        }

        if self.cache.seed(name, factory) {
            tracing::debug!(controller = name, "Controller registered");
        } else {
            tracing::debug!(controller = name, "Controller registered for pending resolution");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ControllerFactory> {
        self.factories.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.borrow().is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Registration handle given to a running script.
///
/// The script was loaded on behalf of `declared_name`. That name overrides
/// any alias hardcoded in the script; the alias is only used when the script
/// was loaded without one.
#[derive(Clone)]
pub struct ScriptRegistrar {
    registry: Rc<ControllerRegistry>,
    declared_name: Option<String>,
    url: Url,
}

impl ScriptRegistrar {
    pub(crate) fn new(registry: Rc<ControllerRegistry>, declared_name: Option<&str>, url: Url) -> Self {
        Self {
            registry,
            declared_name: declared_name.map(str::to_string),
            url,
        }
    }

    /// Name the script was loaded for
    pub fn declared_name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Register a controller from the script.
    ///
    /// Failures are logged rather than returned: the script has no way to
    /// handle them.
    pub fn register(&self, factory: ControllerFactory, alias: Option<&str>) {
        let name = self
            .declared_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(alias.filter(|a| !a.is_empty()));

        let result = match name {
            Some(name) => self.registry.register(name, factory),
            None => Err(EngineError::UnnamedRegistration(self.url.to_string())),
        };
        if let Err(err) = result {
            tracing::error!(script = %self.url, error = %err, "Controller registration failed");
        }
    }
}

impl std::fmt::Debug for ScriptRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistrar")
            .field("declared_name", &self.declared_name)
            .field("url", &self.url.as_str())
            .finish()
    }
}
