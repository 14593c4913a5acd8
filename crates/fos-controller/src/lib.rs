//! fOS Controller
//!
//! Attribute-driven controller binding for the fOS DOM.
//!
//! An element carrying `controller="name"` gets an instance of the controller
//! registered (or declared) under `name` attached to it. Changing the value
//! re-binds the element; removing the element or the attribute detaches it.
//!
//! # Resolution
//! Names resolve once and are cached. A name is either registered up front
//! or declared with a `<link controller-name="name" href="...">` element, in
//! which case the host's [`Loader`] fetches it as a script or module.
//!
//! # Example
//! ```rust,ignore
//! use fos_controller::{ControllerFactory, Engine};
//! use fos_dom::Document;
//!
//! let engine = Engine::builder(Document::new("https://example.com/"))
//!     .register("counter", ControllerFactory::of::<Counter>())
//!     .build()?;
//! engine.start()?;
//! engine.settle();
//! ```

mod cache;
mod config;
mod controller;
mod engine;
mod error;
mod events;
mod lifecycle;
mod loader;
mod registry;
mod resolver;
mod watcher;

pub use cache::{Resolution, ResolutionCache, ResolutionEntry, ResolveFuture, SharedResolution};
pub use config::Config;
pub use controller::{Controller, ControllerError, ControllerFactory, ControllerHandle};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, LifecycleError, LoadError, ResolveError};
pub use events::{ControllerEvent, EventListeners, LifecycleEvent, Listener, ListenerId};
pub use lifecycle::BindingState;
pub use loader::{LoadFuture, LoadKind, LoadReference, Loader, ModuleExports, UnavailableLoader};
pub use registry::{ControllerRegistry, ScriptRegistrar};
pub use resolver::{LinkResolver, Resolver};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
