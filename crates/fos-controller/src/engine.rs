//! Engine and builder
//!
//! Start-up is two-phase: collect registrations on an [`EngineBuilder`],
//! build the [`Engine`], then [`Engine::start`] the tree watcher.
//!
//! The engine never blocks on its own. After mutating the document the host
//! either calls [`Engine::settle`] to drain everything that can run now, or
//! drives [`Engine::run_until_idle`] on the engine's executor when loads
//! depend on real I/O.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use fos_dom::{Document, NodeId};
use smol::LocalExecutor;

use crate::events::{ControllerEvent, LifecycleEvent, ListenerId};
use crate::lifecycle::{BindingState, Lifecycle};
use crate::watcher::TreeWatcher;
use crate::{
    Config, ControllerFactory, ControllerHandle, ControllerRegistry, EngineError, LinkResolver,
    Loader, ResolutionCache, ResolutionEntry, Resolver, UnavailableLoader,
};

/// Collects configuration and registrations before the engine exists
pub struct EngineBuilder {
    document: Document,
    config: Config,
    loader: Option<Rc<dyn Loader>>,
    resolver: Option<Rc<dyn Resolver>>,
    registrations: Vec<(String, ControllerFactory)>,
}

impl EngineBuilder {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            config: Config::default(),
            loader: None,
            resolver: None,
            registrations: Vec::new(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Transport used by the default resolver
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Rc::new(loader));
        self
    }

    /// Replace the default resolver
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    /// Queue a registration; applied in order by [`build`](Self::build)
    pub fn register(mut self, name: &str, factory: ControllerFactory) -> Self {
        self.registrations.push((name.to_string(), factory));
        self
    }

    pub fn build(mut self) -> Result<Engine, EngineError> {
        let registrations = std::mem::take(&mut self.registrations);
        let engine = self.assemble();
        for (name, factory) in registrations {
            engine.registry.register(&name, factory)?;
        }

        tracing::debug!(registered = engine.registry.len(), "Controller engine built");
        Ok(engine)
    }

    fn assemble(self) -> Engine {
        let document = Rc::new(RefCell::new(self.document));
        let config = Rc::new(self.config);
        let cache = Rc::new(ResolutionCache::new());
        let registry = Rc::new(ControllerRegistry::new(Rc::clone(&cache)));

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => {
                let loader = self.loader.unwrap_or_else(|| Rc::new(UnavailableLoader));
                Rc::new(LinkResolver::new(
                    Rc::clone(&document),
                    Rc::clone(&config),
                    Rc::clone(&cache),
                    Rc::clone(&registry),
                    loader,
                ))
            }
        };

        let executor = Rc::new(LocalExecutor::new());
        let lifecycle = Rc::new(Lifecycle::new(
            document,
            config,
            cache,
            resolver,
            Rc::clone(&executor),
        ));
        Engine {
            lifecycle,
            registry,
            executor,
            watcher: RefCell::new(None),
        }
    }
}

/// Controller binding engine for one document
pub struct Engine {
    lifecycle: Rc<Lifecycle>,
    registry: Rc<ControllerRegistry>,
    executor: Rc<LocalExecutor<'static>>,
    watcher: RefCell<Option<TreeWatcher>>,
}

impl Engine {
    pub fn builder(document: Document) -> EngineBuilder {
        EngineBuilder::new(document)
    }

    /// Engine with default configuration and no loader
    pub fn new(document: Document) -> Self {
        Self::builder(document).assemble()
    }

    /// Start watching the document.
    ///
    /// If the document is already ready, elements carrying the target
    /// attribute are bound right away; otherwise on the first
    /// [`settle`](Self::settle) after it becomes ready.
    pub fn start(&self) -> Result<(), EngineError> {
        {
            let mut watcher = self.watcher.borrow_mut();
            if watcher.is_some() {
                return Err(EngineError::AlreadyStarted);
            }
            let mut document = self.lifecycle.document().borrow_mut();
            *watcher = Some(TreeWatcher::install(&mut document, self.lifecycle.config()));
        }

        tracing::info!(
            attribute = %self.lifecycle.config().target_attribute,
            registered = self.registry.len(),
            "Controller engine started"
        );
        self.process_mutations();
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.watcher.borrow().is_some()
    }

    /// Register a controller after start-up
    pub fn register_controller(&self, name: &str, factory: ControllerFactory) -> Result<(), EngineError> {
        self.registry.register(name, factory)
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Replace the resolver; names already cached keep their resolution
    pub fn set_resolver(&self, resolver: impl Resolver + 'static) {
        self.lifecycle.set_resolver(Rc::new(resolver));
    }

    /// Cached resolution for `name`, if it was ever requested or registered
    pub fn resolution(&self, name: &str) -> Option<Rc<ResolutionEntry>> {
        self.lifecycle.cache().get(name)
    }

    /// Number of names in the resolution cache
    pub fn resolution_count(&self) -> usize {
        self.lifecycle.cache().len()
    }

    /// Re-evaluate an element's binding against its current attribute.
    ///
    /// `previous` is the value the caller last saw; pass `None` for an
    /// element it has not seen before.
    pub fn apply_controller(&self, previous: Option<&str>, element: NodeId) {
        self.lifecycle.apply_controller(previous, element);
    }

    /// Detach the element's controller, if any
    pub fn detach_controller(&self, element: NodeId) {
        self.lifecycle.detach_controller(element);
    }

    /// Deliver pending mutation records to the engine.
    ///
    /// Returns the number of records processed; zero before [`start`](Self::start).
    pub fn process_mutations(&self) -> usize {
        let watcher = self.watcher.borrow();
        match watcher.as_ref() {
            Some(watcher) => watcher.pump(&self.lifecycle),
            None => 0,
        }
    }

    fn has_pending_mutations(&self) -> bool {
        let watcher = self.watcher.borrow();
        watcher
            .as_ref()
            .is_some_and(|w| w.has_work(&self.lifecycle.document().borrow()))
    }

    /// Run every continuation that is ready now. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.executor.try_tick() {
            ran += 1;
        }
        ran
    }

    /// Process mutations and run continuations until neither makes progress.
    ///
    /// Loads that are still waiting on outside events stay pending.
    pub fn settle(&self) {
        loop {
            let records = self.process_mutations();
            let ran = self.run_pending();
            if records == 0 && ran == 0 && !self.has_pending_mutations() {
                break;
            }
        }
    }

    /// Resolves once no element is resolving and no mutation is queued.
    ///
    /// Must be polled on the engine's executor, e.g. through
    /// [`block_on`](Self::block_on).
    pub async fn run_until_idle(&self) {
        let signal = self.lifecycle.settled_signal();
        loop {
            self.process_mutations();
            if self.lifecycle.pending() == 0 && !self.has_pending_mutations() {
                return;
            }
            if signal.recv().await.is_err() {
                return;
            }
        }
    }

    /// Drive `future` to completion while running the engine's tasks
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        smol::block_on(self.executor.run(future))
    }

    /// Listen for `attached` / `detached` on one element
    pub fn add_listener<F>(&self, element: NodeId, kind: LifecycleEvent, listener: F) -> ListenerId
    where
        F: Fn(&ControllerEvent) + 'static,
    {
        self.lifecycle
            .listeners()
            .borrow_mut()
            .add(element, kind, Rc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.lifecycle.listeners().borrow_mut().remove(id)
    }

    pub fn binding(&self, element: NodeId) -> BindingState {
        self.lifecycle.state(element)
    }

    /// Attached controller of `element`
    pub fn controller(&self, element: NodeId) -> Option<ControllerHandle> {
        match self.lifecycle.state(element) {
            BindingState::Attached { controller, .. } => Some(controller),
            _ => None,
        }
    }

    /// Number of elements waiting on a resolution
    pub fn pending(&self) -> usize {
        self.lifecycle.pending()
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        self.lifecycle.document()
    }

    pub fn config(&self) -> &Config {
        self.lifecycle.config()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("started", &self.is_started())
            .field("registry", &self.registry)
            .field("cache", self.lifecycle.cache())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Controller, ControllerError};
    use fos_dom::ReadyState;

    #[derive(Default)]
    struct Noop;

    impl Controller for Noop {
        fn attach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
            Ok(())
        }

        fn detach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
            Ok(())
        }
    }

    #[test]
    fn test_start_twice() {
        let engine = Engine::new(Document::default());
        assert!(!engine.is_started());
        engine.start().unwrap();
        assert_eq!(engine.start(), Err(EngineError::AlreadyStarted));
    }

    #[test]
    fn test_builder_rejects_blank_name() {
        let result = Engine::builder(Document::default())
            .register("", ControllerFactory::of::<Noop>())
            .build();
        assert!(matches!(result, Err(EngineError::InvalidName(_))));
    }

    #[test]
    fn test_sweep_waits_for_ready_state() {
        let mut doc = Document::default();
        let body = doc.body();
        let el = doc.create_element("div");
        doc.set_attribute(el, "controller", "menu").unwrap();
        doc.append_child(body, el).unwrap();

        let engine = Engine::builder(doc)
            .register("menu", ControllerFactory::of::<Noop>())
            .build()
            .unwrap();
        engine.start().unwrap();
        engine.settle();
        assert!(matches!(engine.binding(el), BindingState::Unbound));

        engine.document().borrow_mut().set_ready_state(ReadyState::Interactive);
        engine.settle();
        assert!(engine.binding(el).is_attached());
    }

    #[test]
    fn test_apply_without_start() {
        let mut doc = Document::default();
        let body = doc.body();
        doc.set_attribute(body, "controller", "menu").unwrap();

        let engine = Engine::builder(doc)
            .register("menu", ControllerFactory::of::<Noop>())
            .build()
            .unwrap();
        engine.apply_controller(None, body);
        assert_eq!(engine.binding(body).name(), Some("menu"));

        engine.settle();
        assert!(engine.controller(body).is_some());
    }

    #[test]
    fn test_settled_signal_stays_bounded() {
        let engine = Engine::builder(Document::default())
            .register("a", ControllerFactory::of::<Noop>())
            .register("b", ControllerFactory::of::<Noop>())
            .build()
            .unwrap();
        engine.start().unwrap();
        let body = engine.document().borrow().body();

        for round in 0..200 {
            let name = if round % 2 == 0 { "a" } else { "b" };
            engine.document().borrow_mut().set_attribute(body, "controller", name).unwrap();
            engine.settle();
        }

        assert_eq!(engine.binding(body).name(), Some("b"));
        assert!(engine.lifecycle.settled_signal().len() <= 1);
    }
}
