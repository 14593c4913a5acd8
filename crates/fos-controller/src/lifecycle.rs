//! Lifecycle Engine
//!
//! Owns the per-element binding table and drives attach/detach.
//!
//! Each element is in one of three states:
//!
//! ```text
//!   Unbound --apply(name)--> Resolving --resolved & still current--> Attached
//!      ^                        |                                       |
//!      +--detach / failure------+----------------detach----------------+
//! ```
//!
//! `apply_controller` detaches synchronously and attaches asynchronously: an
//! element is never bound to two controllers, but it may have none while the
//! new name resolves. Every resolution carries a ticket; a continuation whose
//! ticket no longer matches the element's state is discarded.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use fos_dom::{Document, NodeId};
use smol::LocalExecutor;
use smol::channel::{Receiver, Sender};

use crate::events::{ControllerEvent, EventListeners, LifecycleEvent};
use crate::{
    Config, ControllerHandle, LifecycleError, Resolution, ResolutionCache, ResolutionEntry, Resolver,
};

/// Observable binding state of an element
#[derive(Debug, Clone)]
pub enum BindingState {
    Unbound,
    Resolving { name: String },
    Attached { name: String, controller: ControllerHandle },
}

impl BindingState {
    /// Controller name of a resolving or attached binding
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Unbound => None,
            Self::Resolving { name } | Self::Attached { name, .. } => Some(name),
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached { .. })
    }
}

enum Binding {
    Resolving { name: String, ticket: u64 },
    Attached { name: String, controller: ControllerHandle },
}

impl Binding {
    fn name(&self) -> &str {
        match self {
            Self::Resolving { name, .. } | Self::Attached { name, .. } => name,
        }
    }
}

pub(crate) struct Lifecycle {
    document: Rc<RefCell<Document>>,
    config: Rc<Config>,
    cache: Rc<ResolutionCache>,
    resolver: RefCell<Rc<dyn Resolver>>,
    bindings: RefCell<HashMap<NodeId, Binding>>,
    listeners: RefCell<EventListeners>,
    executor: Rc<LocalExecutor<'static>>,
    next_ticket: Cell<u64>,
    settled_tx: Sender<()>,
    settled_rx: Receiver<()>,
}

impl Lifecycle {
    pub(crate) fn new(
        document: Rc<RefCell<Document>>,
        config: Rc<Config>,
        cache: Rc<ResolutionCache>,
        resolver: Rc<dyn Resolver>,
        executor: Rc<LocalExecutor<'static>>,
    ) -> Self {
        // A queued wake-up already covers later completions
        let (settled_tx, settled_rx) = smol::channel::bounded(1);
        Self {
            document,
            config,
            cache,
            resolver: RefCell::new(resolver),
            bindings: RefCell::new(HashMap::new()),
            listeners: RefCell::new(EventListeners::new()),
            executor,
            next_ticket: Cell::new(0),
            settled_tx,
            settled_rx,
        }
    }

    pub(crate) fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub(crate) fn listeners(&self) -> &RefCell<EventListeners> {
        &self.listeners
    }

    /// Replace the resolver; cached entries are kept
    pub(crate) fn set_resolver(&self, resolver: Rc<dyn Resolver>) {
        *self.resolver.borrow_mut() = resolver;
    }

    pub(crate) fn state(&self, element: NodeId) -> BindingState {
        match self.bindings.borrow().get(&element) {
            None => BindingState::Unbound,
            Some(Binding::Resolving { name, .. }) => BindingState::Resolving { name: name.clone() },
            Some(Binding::Attached { name, controller }) => BindingState::Attached {
                name: name.clone(),
                controller: controller.clone(),
            },
        }
    }

    pub(crate) fn is_tracked(&self, element: NodeId) -> bool {
        self.bindings.borrow().contains_key(&element)
    }

    /// Number of elements waiting on a resolution
    pub(crate) fn pending(&self) -> usize {
        self.bindings
            .borrow()
            .values()
            .filter(|b| matches!(b, Binding::Resolving { .. }))
            .count()
    }

    /// Wakes once some resolution continuation has finished
    pub(crate) fn settled_signal(&self) -> Receiver<()> {
        self.settled_rx.clone()
    }

    /// Bring the element's binding in line with its attribute.
    ///
    /// `previous` is the attribute value before the change, `None` when the
    /// element was not tracked (or the attribute was absent).
    pub(crate) fn apply_controller(self: &Rc<Self>, previous: Option<&str>, element: NodeId) {
        let current = self
            .document
            .borrow()
            .get_attribute(element, &self.config.target_attribute)
            .map(str::to_string);

        if previous == current.as_deref() {
            return;
        }
        let already_bound = self
            .bindings
            .borrow()
            .get(&element)
            .is_some_and(|b| Some(b.name()) == current.as_deref());
        if already_bound {
            tracing::trace!(%element, controller = ?current, "Binding unchanged");
            return;
        }

        let name = current.filter(|value| !value.is_empty());
        let entry = name.as_deref().map(|name| self.request(name));

        self.detach_controller(element);

        let (Some(name), Some(entry)) = (name, entry) else {
            return;
        };

        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);
        self.bindings
            .borrow_mut()
            .insert(element, Binding::Resolving { name, ticket });

        let this = Rc::clone(self);
        self.executor
            .spawn(async move {
                let resolution = entry.resolution().await;
                this.complete(element, ticket, &entry, resolution);
                let _ = this.settled_tx.try_send(());
            })
            .detach();
    }

    /// Detach and forget the element's controller, if any
    pub(crate) fn detach_controller(&self, element: NodeId) {
        let binding = self.bindings.borrow_mut().remove(&element);
        match binding {
            Some(Binding::Attached { name, controller }) => {
                let result = controller.detach(element, &mut self.document.borrow_mut());
                controller.release();
                if let Err(source) = result {
                    report(&LifecycleError::Detach {
                        name: name.clone(),
                        element,
                        source,
                    });
                }
                tracing::debug!(controller = %name, %element, "Controller detached");
                self.emit(LifecycleEvent::Detached, element, &name, controller);
            }
            Some(Binding::Resolving { name, .. }) => {
                tracing::debug!(controller = %name, %element, "Dropped pending resolution");
            }
            None => {}
        }
    }

    fn request(&self, name: &str) -> Rc<ResolutionEntry> {
        let resolver = Rc::clone(&*self.resolver.borrow());
        self.cache.get_or_resolve(name, || {
            tracing::debug!(controller = name, "Resolving controller");
            resolver.resolve(name)
        })
    }

    fn complete(&self, element: NodeId, ticket: u64, entry: &ResolutionEntry, resolution: Resolution) {
        let name = entry.name();
        let factory = match resolution {
            Ok(factory) => factory,
            Err(err) => {
                self.forget(element, ticket);
                if entry.mark_reported() {
                    tracing::error!(controller = name, error = %err, "Error resolving controller");
                }
                return;
            }
        };

        if !self.is_current(element, ticket, name) {
            tracing::debug!(controller = name, %element, "Discarding stale resolution");
            self.forget(element, ticket);
            return;
        }

        let controller = match factory.create() {
            Ok(controller) => controller,
            Err(source) => {
                self.forget(element, ticket);
                report(&LifecycleError::Instantiation {
                    name: name.to_string(),
                    element,
                    source,
                });
                return;
            }
        };

        let handle = ControllerHandle::new(controller, element);
        let attached = handle.attach(element, &mut self.document.borrow_mut());
        if let Err(source) = attached {
            handle.release();
            self.forget(element, ticket);
            report(&LifecycleError::Attach {
                name: name.to_string(),
                element,
                source,
            });
            return;
        }

        self.bindings.borrow_mut().insert(
            element,
            Binding::Attached {
                name: name.to_string(),
                controller: handle.clone(),
            },
        );
        tracing::debug!(controller = name, %element, "Controller attached");
        self.emit(LifecycleEvent::Attached, element, name, handle);
    }

    /// The resolution behind `ticket` is still the one the element wants
    fn is_current(&self, element: NodeId, ticket: u64, name: &str) -> bool {
        let pending = matches!(
            self.bindings.borrow().get(&element),
            Some(Binding::Resolving { ticket: t, .. }) if *t == ticket
        );
        let document = self.document.borrow();
        pending
            && document.is_connected(element)
            && document.get_attribute(element, &self.config.target_attribute) == Some(name)
    }

    /// Drop a resolving binding if it still belongs to `ticket`
    fn forget(&self, element: NodeId, ticket: u64) {
        let mut bindings = self.bindings.borrow_mut();
        if matches!(bindings.get(&element), Some(Binding::Resolving { ticket: t, .. }) if *t == ticket) {
            bindings.remove(&element);
        }
    }

    fn emit(&self, kind: LifecycleEvent, element: NodeId, name: &str, controller: ControllerHandle) {
        let listeners = self.listeners.borrow().listeners_for(element, kind);
        if listeners.is_empty() {
            return;
        }

        let event_type = match kind {
            LifecycleEvent::Attached => &self.config.attached_event,
            LifecycleEvent::Detached => &self.config.detached_event,
        };
        let event = ControllerEvent {
            kind,
            event_type: event_type.clone(),
            target: element,
            name: name.to_string(),
            controller,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

fn report(err: &LifecycleError) {
    tracing::error!(error = %err, "Controller lifecycle error");
}
