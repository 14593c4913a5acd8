//! Shared fixtures for the integration suites

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fos_controller::{
    Controller, ControllerError, ControllerEvent, ControllerFactory, Engine, LifecycleEvent,
    LoadError, LoadFuture, LoadReference, Loader, ModuleExports, ResolveError, ResolveFuture,
    Resolver, ScriptRegistrar,
};
use fos_dom::{Document, NodeId, ReadyState};
use futures::future::FutureExt;
use smol::channel::{Receiver, Sender};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Document at `https://example.com/app/` that is already ready
pub fn ready_document() -> Document {
    let mut doc = Document::new("https://example.com/app/");
    doc.set_ready_state(ReadyState::Complete);
    doc
}

/// Create an element, optionally carrying `controller`, and append it
pub fn element(doc: &mut Document, parent: NodeId, controller: Option<&str>) -> NodeId {
    let el = doc.create_element("div");
    if let Some(name) = controller {
        doc.set_attribute(el, "controller", name).unwrap();
    }
    doc.append_child(parent, el).unwrap();
    el
}

/// Append a `<link controller-name href [type-is]>` declaration to `<head>`
pub fn declare(doc: &mut Document, name: &str, href: &str, kind: Option<&str>) {
    let head = doc.head();
    let link = doc.create_element("link");
    doc.set_attribute(link, "controller-name", name).unwrap();
    doc.set_attribute(link, "href", href).unwrap();
    if let Some(kind) = kind {
        doc.set_attribute(link, "type-is", kind).unwrap();
    }
    doc.append_child(head, link).unwrap();
}

pub fn body(engine: &Engine) -> NodeId {
    engine.document().borrow().body()
}

pub fn add(engine: &Engine, parent: NodeId, controller: Option<&str>) -> NodeId {
    element(&mut engine.document().borrow_mut(), parent, controller)
}

pub fn set_controller(engine: &Engine, el: NodeId, value: &str) {
    engine.document().borrow_mut().set_attribute(el, "controller", value).unwrap();
}

pub fn remove(engine: &Engine, el: NodeId) {
    engine.document().borrow_mut().remove(el).unwrap();
}

/// Record `attached` / `detached` events of `el` as `"<type>:<name>"`
pub fn record_events(engine: &Engine, el: NodeId, log: &Log) {
    for kind in [LifecycleEvent::Attached, LifecycleEvent::Detached] {
        let log = Rc::clone(log);
        engine.add_listener(el, kind, move |event: &ControllerEvent| {
            log.borrow_mut().push(format!("{}:{}", event.event_type, event.name));
        });
    }
}

/// Increments on attach, decrements on detach
pub struct Counter {
    count: Rc<Cell<i32>>,
}

impl Controller for Counter {
    fn attach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        self.count.set(self.count.get() + 1);
        Ok(())
    }

    fn detach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        self.count.set(self.count.get() - 1);
        Ok(())
    }
}

pub fn counter(count: &Rc<Cell<i32>>) -> ControllerFactory {
    let count = Rc::clone(count);
    ControllerFactory::new(move || Ok(Box::new(Counter { count: Rc::clone(&count) })))
}

/// Logs `"<label> attach <el>"` and `"<label> detach <el>"`
pub struct Recorder {
    label: String,
    log: Log,
}

impl Controller for Recorder {
    fn attach(&mut self, element: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        self.log.borrow_mut().push(format!("{} attach {element}", self.label));
        Ok(())
    }

    fn detach(&mut self, element: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        self.log.borrow_mut().push(format!("{} detach {element}", self.label));
        Ok(())
    }
}

pub fn recorder(label: &str, log: &Log) -> ControllerFactory {
    let label = label.to_string();
    let log = Rc::clone(log);
    ControllerFactory::new(move || {
        Ok(Box::new(Recorder {
            label: label.clone(),
            log: Rc::clone(&log),
        }))
    })
}

/// Fails in whichever phase is configured
#[derive(Default)]
pub struct Faulty {
    pub fail_attach: bool,
    pub fail_detach: bool,
}

impl Controller for Faulty {
    fn attach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        if self.fail_attach {
            return Err(ControllerError::new("attach failed"));
        }
        Ok(())
    }

    fn detach(&mut self, _: NodeId, _: &mut Document) -> Result<(), ControllerError> {
        if self.fail_detach {
            return Err(ControllerError::new("detach failed"));
        }
        Ok(())
    }
}

pub fn faulty(fail_attach: bool, fail_detach: bool) -> ControllerFactory {
    ControllerFactory::new(move || {
        Ok(Box::new(Faulty {
            fail_attach,
            fail_detach,
        }))
    })
}

#[derive(Default)]
struct ResolverState {
    calls: RefCell<Vec<String>>,
    factories: RefCell<HashMap<String, ControllerFactory>>,
    gate: RefCell<Option<Receiver<()>>>,
}

/// In-memory resolver counting its invocations.
///
/// When gated, each resolution waits for one message on the gate.
#[derive(Clone, Default)]
pub struct TestResolver {
    state: Rc<ResolverState>,
}

impl TestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, factory: ControllerFactory) -> Self {
        self.state.factories.borrow_mut().insert(name.to_string(), factory);
        self
    }

    pub fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = smol::channel::unbounded();
        *self.state.gate.borrow_mut() = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.borrow().len()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.state.calls.borrow().iter().filter(|n| *n == name).count()
    }
}

impl Resolver for TestResolver {
    fn resolve(&self, name: &str) -> ResolveFuture {
        self.state.calls.borrow_mut().push(name.to_string());
        let factory = self.state.factories.borrow().get(name).cloned();
        let gate = self.state.gate.borrow().clone();
        let name = name.to_string();

        async move {
            if let Some(gate) = gate {
                let _ = gate.recv().await;
            }
            factory.ok_or(ResolveError::UnresolvedName { name })
        }
        .boxed_local()
    }
}

#[derive(Default)]
struct LoaderState {
    calls: RefCell<Vec<String>>,
    scripts: RefCell<HashMap<String, Vec<(Option<String>, ControllerFactory)>>>,
    modules: RefCell<HashMap<String, ModuleExports>>,
    failures: RefCell<HashMap<String, LoadError>>,
    gate: RefCell<Option<Receiver<()>>>,
}

/// In-memory loader keyed by URL path
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Rc<LoaderState>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The script at `path` registers `factory`, under `alias` if given
    pub fn script(self, path: &str, alias: Option<&str>, factory: ControllerFactory) -> Self {
        self.state
            .scripts
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push((alias.map(str::to_string), factory));
        self
    }

    pub fn module(self, path: &str, exports: ModuleExports) -> Self {
        self.state.modules.borrow_mut().insert(path.to_string(), exports);
        self
    }

    pub fn fail(self, path: &str, err: LoadError) -> Self {
        self.state.failures.borrow_mut().insert(path.to_string(), err);
        self
    }

    pub fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = smol::channel::unbounded();
        *self.state.gate.borrow_mut() = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.borrow().len()
    }

    fn begin(&self, reference: &LoadReference) -> (String, Option<Receiver<()>>) {
        let path = reference.url.path().to_string();
        self.state.calls.borrow_mut().push(path.clone());
        (path, self.state.gate.borrow().clone())
    }
}

impl Loader for MockLoader {
    fn load_script(&self, reference: &LoadReference, registrar: ScriptRegistrar) -> LoadFuture<()> {
        let (path, gate) = self.begin(reference);
        let state = Rc::clone(&self.state);

        async move {
            if let Some(gate) = gate {
                let _ = gate.recv().await;
            }
            if let Some(err) = state.failures.borrow().get(&path) {
                return Err(err.clone());
            }
            let registrations = state.scripts.borrow().get(&path).cloned();
            let Some(registrations) = registrations else {
                return Err(LoadError::NotFound);
            };
            for (alias, factory) in registrations {
                registrar.register(factory, alias.as_deref());
            }
            Ok(())
        }
        .boxed_local()
    }

    fn import_module(&self, reference: &LoadReference) -> LoadFuture<ModuleExports> {
        let (path, gate) = self.begin(reference);
        let state = Rc::clone(&self.state);

        async move {
            if let Some(gate) = gate {
                let _ = gate.recv().await;
            }
            if let Some(err) = state.failures.borrow().get(&path) {
                return Err(err.clone());
            }
            state.modules.borrow().get(&path).cloned().ok_or(LoadError::NotFound)
        }
        .boxed_local()
    }
}

/// Counts `ERROR` events
#[derive(Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` with a subscriber counting error events; returns the count
pub fn count_errors(f: impl FnOnce()) -> usize {
    use tracing_subscriber::layer::SubscriberExt;

    let counter = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    tracing::subscriber::with_default(subscriber, f);
    counter.count()
}
