//! Resolution Cache
//!
//! One entry per controller name ever requested. Entries hold a `Shared`
//! future, so every element asking for the same name awaits the same
//! resolution, and they are never evicted. A second map keyed by reference
//! URL shares the underlying load between names declared on one resource.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use url::Url;

use crate::loader::SharedLoad;
use crate::{ControllerFactory, ResolveError};

/// Outcome of resolving one name
pub type Resolution = Result<ControllerFactory, ResolveError>;

/// Future produced by a [`Resolver`](crate::Resolver)
pub type ResolveFuture = LocalBoxFuture<'static, Resolution>;

/// Cloneable handle on an in-flight or settled resolution
pub type SharedResolution = Shared<ResolveFuture>;

/// Cached resolution for a single controller name
pub struct ResolutionEntry {
    name: String,
    future: SharedResolution,
    reported: Cell<bool>,
}

impl ResolutionEntry {
    fn new(name: &str, future: ResolveFuture) -> Self {
        Self {
            name: name.to_string(),
            future: future.shared(),
            reported: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Await this to get the (possibly already settled) outcome
    pub fn resolution(&self) -> SharedResolution {
        self.future.clone()
    }

    /// Outcome, if the resolution has settled
    pub fn peek(&self) -> Option<&Resolution> {
        self.future.peek()
    }

    /// Returns `true` exactly once: the caller that gets it logs the failure
    pub(crate) fn mark_reported(&self) -> bool {
        !self.reported.replace(true)
    }
}

impl std::fmt::Debug for ResolutionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEntry")
            .field("name", &self.name)
            .field("settled", &self.peek().is_some())
            .field("reported", &self.reported.get())
            .finish()
    }
}

/// Name -> resolution map plus reference URL -> load map
#[derive(Default)]
pub struct ResolutionCache {
    entries: RefCell<HashMap<String, Rc<ResolutionEntry>>>,
    references: RefCell<HashMap<Url, SharedLoad>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `name`
    pub fn get(&self, name: &str) -> Option<Rc<ResolutionEntry>> {
        self.entries.borrow().get(name).cloned()
    }

    /// Return the entry for `name`, creating it from `resolve` on first use.
    ///
    /// The entry is inserted before its future is ever polled, so a
    /// concurrent request for the same name sees the in-flight resolution.
    pub fn get_or_resolve<F>(&self, name: &str, resolve: F) -> Rc<ResolutionEntry>
    where
        F: FnOnce() -> ResolveFuture,
    {
        if let Some(entry) = self.get(name) {
            return entry;
        }

        // The resolver runs without any borrow held
        let future = resolve();
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(ResolutionEntry::new(name, future)));
        Rc::clone(entry)
    }

    /// Insert an already-resolved entry unless `name` is cached.
    ///
    /// Returns whether an entry was inserted.
    pub fn seed(&self, name: &str, factory: ControllerFactory) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return false;
        }
        let ready = future::ready(Ok(factory)).boxed_local();
        entries.insert(name.to_string(), Rc::new(ResolutionEntry::new(name, ready)));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Number of distinct names requested or registered
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub(crate) fn reference(&self, url: &Url) -> Option<SharedLoad> {
        self.references.borrow().get(url).cloned()
    }

    /// Store the load for `url`; an existing load wins
    pub(crate) fn insert_reference(&self, url: Url, load: SharedLoad) -> SharedLoad {
        self.references.borrow_mut().entry(url).or_insert(load).clone()
    }

    /// Number of distinct references loaded
    pub fn reference_count(&self) -> usize {
        self.references.borrow().len()
    }
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("entries", &self.len())
            .field("references", &self.reference_count())
            .finish()
    }
}
