//! Load transport
//!
//! The engine does not fetch or evaluate anything itself. A [`Loader`]
//! supplied by the host turns a [`LoadReference`] into either an evaluated
//! script (which registers controllers as a side effect) or a module's
//! exports.

use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use url::Url;

use crate::{ControllerFactory, LoadError, ScriptRegistrar};

/// Future returned by loader operations
pub type LoadFuture<T> = LocalBoxFuture<'static, Result<T, LoadError>>;

/// How a reference is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Classic script; controllers register themselves while it runs
    Script,
    /// ES module; controllers are taken from its exports
    Module,
}

impl LoadKind {
    /// Parse an explicit kind declaration (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("script") {
            Some(Self::Script)
        } else if value.eq_ignore_ascii_case("module") {
            Some(Self::Module)
        } else {
            None
        }
    }

    /// Guess the kind from the declaration's `rel` and the file extension,
    /// falling back to `Script`
    pub fn infer(url: &Url, rel: Option<&str>) -> Self {
        let preload = rel.is_some_and(|r| r.eq_ignore_ascii_case("modulepreload"));
        let mjs = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|file| file.rsplit_once('.'))
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("mjs"));

        if preload || mjs { Self::Module } else { Self::Script }
    }
}

/// Declared location of a controller implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReference {
    pub url: Url,
    pub kind: LoadKind,
}

/// Transport for controller code
pub trait Loader {
    /// Fetch and run a classic script. The script registers its
    /// controllers through `registrar`; the future completes once it ran.
    fn load_script(&self, reference: &LoadReference, registrar: ScriptRegistrar) -> LoadFuture<()>;

    /// Fetch and evaluate a module, returning its exported controllers
    fn import_module(&self, reference: &LoadReference) -> LoadFuture<ModuleExports>;
}

/// Loader used when the host supplies none: every load fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLoader;

impl Loader for UnavailableLoader {
    fn load_script(&self, _: &LoadReference, _: ScriptRegistrar) -> LoadFuture<()> {
        future::ready(Err(LoadError::Unavailable)).boxed_local()
    }

    fn import_module(&self, _: &LoadReference) -> LoadFuture<ModuleExports> {
        future::ready(Err(LoadError::Unavailable)).boxed_local()
    }
}

/// Controllers exported by a module
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    default: Option<ControllerFactory>,
    named: HashMap<String, ControllerFactory>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default export
    pub fn with_default(mut self, factory: ControllerFactory) -> Self {
        self.default = Some(factory);
        self
    }

    /// Add an export under a controller name
    pub fn with_export(mut self, name: &str, factory: ControllerFactory) -> Self {
        self.named.insert(name.to_string(), factory);
        self
    }

    /// Export for `name`, falling back to the default export
    pub fn get(&self, name: &str) -> Option<ControllerFactory> {
        self.named.get(name).or(self.default.as_ref()).cloned()
    }
}

/// Result of loading one reference, shared by every name declared on it
#[derive(Debug)]
pub(crate) enum LoadedReference {
    Script,
    Module(ModuleExports),
}

pub(crate) type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<LoadedReference>, LoadError>>>;
