//! Lifecycle events
//!
//! Two notifications per binding: `attached` after a controller's `attach`
//! succeeded and `detached` after its `detach` ran. Events target the bound
//! element only; they do not bubble.

use std::collections::HashMap;
use std::rc::Rc;

use fos_dom::NodeId;

use crate::ControllerHandle;

/// Lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Attached,
    Detached,
}

/// Event payload
#[derive(Debug, Clone)]
pub struct ControllerEvent {
    pub kind: LifecycleEvent,
    /// Configured event type name (`controller.attached` by default)
    pub event_type: String,
    pub target: NodeId,
    /// Controller name the instance was bound under
    pub name: String,
    pub controller: ControllerHandle,
}

/// Listener callback
pub type Listener = Rc<dyn Fn(&ControllerEvent)>;

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners keyed by element and event kind
#[derive(Default)]
pub struct EventListeners {
    listeners: HashMap<(NodeId, LifecycleEvent), Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add event listener
    pub fn add(&mut self, target: NodeId, kind: LifecycleEvent, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry((target, kind)).or_default().push((id, listener));
        id
    }

    /// Remove event listener; returns whether it existed
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let mut found = false;
        self.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    /// Snapshot of the listeners an event would reach, in registration order.
    ///
    /// Callers invoke them after releasing any borrow on `self`, so a
    /// listener may add or remove listeners.
    pub fn listeners_for(&self, target: NodeId, kind: LifecycleEvent) -> Vec<Listener> {
        self.listeners
            .get(&(target, kind))
            .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners").field("len", &self.len()).finish()
    }
}
