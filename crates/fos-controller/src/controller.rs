//! Controllers and their factories
//!
//! A controller implements behavior for exactly one element between its
//! `attach` and `detach` calls. Instances are created through a
//! [`ControllerFactory`] and handed around as [`ControllerHandle`]s.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fos_dom::{Document, NodeId};

/// Error raised by controller code (construction, attach or detach)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ControllerError(String);

impl ControllerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Behavior bound to an element
pub trait Controller {
    /// Called once after construction with the element it is bound to
    fn attach(&mut self, element: NodeId, document: &mut Document) -> Result<(), ControllerError>;

    /// Called once when the binding ends. The element may already be
    /// detached from the document.
    fn detach(&mut self, element: NodeId, document: &mut Document) -> Result<(), ControllerError>;
}

type Construct = dyn Fn() -> Result<Box<dyn Controller>, ControllerError>;

/// Constructor for a named controller
#[derive(Clone)]
pub struct ControllerFactory(Rc<Construct>);

impl ControllerFactory {
    /// Wrap a fallible constructor
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Controller>, ControllerError> + 'static,
    {
        Self(Rc::new(construct))
    }

    /// Factory for a `Default`-constructible controller
    pub fn of<C>() -> Self
    where
        C: Controller + Default + 'static,
    {
        Self::new(|| Ok(Box::new(C::default())))
    }

    pub fn create(&self) -> Result<Box<dyn Controller>, ControllerError> {
        (self.0)()
    }

    /// Whether both factories wrap the same constructor
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ControllerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ControllerFactory")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

struct Instance {
    controller: Box<dyn Controller>,
    element: Option<NodeId>,
}

/// Shared reference to a live (or released) controller instance
#[derive(Clone)]
pub struct ControllerHandle(Rc<RefCell<Instance>>);

impl ControllerHandle {
    pub(crate) fn new(controller: Box<dyn Controller>, element: NodeId) -> Self {
        Self(Rc::new(RefCell::new(Instance {
            controller,
            element: Some(element),
        })))
    }

    /// Element the instance is bound to; `None` once released
    pub fn element(&self) -> Option<NodeId> {
        self.0.borrow().element
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn attach(&self, element: NodeId, document: &mut Document) -> Result<(), ControllerError> {
        self.0.borrow_mut().controller.attach(element, document)
    }

    pub(crate) fn detach(&self, element: NodeId, document: &mut Document) -> Result<(), ControllerError> {
        self.0.borrow_mut().controller.detach(element, document)
    }

    /// Clear the element reference; the instance is never reused afterwards
    pub(crate) fn release(&self) {
        self.0.borrow_mut().element = None;
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("element", &self.element())
            .finish_non_exhaustive()
    }
}
