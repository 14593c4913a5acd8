//! Tree Watcher
//!
//! Turns mutation batches into lifecycle calls.

use std::cell::Cell;
use std::rc::Rc;

use fos_dom::{Document, MutationObserverInit, MutationRecord, MutationType, NodeId, ObserverId};

use crate::Config;
use crate::lifecycle::Lifecycle;

/// Mutation observer registration plus the one-time ready sweep flag
#[derive(Debug)]
pub(crate) struct TreeWatcher {
    observer: ObserverId,
    swept: Cell<bool>,
}

impl TreeWatcher {
    /// Observe the whole document for the target attribute and structure
    pub(crate) fn install(document: &mut Document, config: &Config) -> Self {
        let root = document.root();
        let observer = document.observe(
            root,
            MutationObserverInit {
                child_list: true,
                attributes: true,
                subtree: true,
                attribute_old_value: true,
                attribute_filter: Some(vec![config.target_attribute.clone()]),
            },
        );
        tracing::debug!(?observer, "Tree watcher installed");

        Self {
            observer,
            swept: Cell::new(false),
        }
    }

    /// Whether a batch is waiting or the ready sweep is due
    pub(crate) fn has_work(&self, document: &Document) -> bool {
        document.has_pending_records(self.observer)
            || (!self.swept.get() && document.ready_state().is_ready())
    }

    /// Deliver pending records, then run the ready sweep if it is due.
    ///
    /// Returns the number of records processed.
    pub(crate) fn pump(&self, lifecycle: &Rc<Lifecycle>) -> usize {
        let records = lifecycle.document().borrow_mut().take_records(self.observer);
        let count = records.len();
        if count > 0 {
            tracing::trace!(records = count, "Processing mutation batch");
        }
        for record in &records {
            self.handle(lifecycle, record);
        }

        self.sweep(lifecycle);
        count
    }

    fn handle(&self, lifecycle: &Rc<Lifecycle>, record: &MutationRecord) {
        match record.mutation_type {
            MutationType::Attributes => {
                let target_attribute = &lifecycle.config().target_attribute;
                if record.attribute_name.as_deref() != Some(target_attribute.as_str()) {
                    return;
                }
                if !lifecycle.document().borrow().is_connected(record.target) {
                    return;
                }
                lifecycle.apply_controller(record.old_value.as_deref(), record.target);
            }
            MutationType::ChildList => {
                if self.bindable(lifecycle, record.target) {
                    lifecycle.apply_controller(None, record.target);
                }
                for &node in &record.removed_nodes {
                    for element in self.tracked_subtree(lifecycle, node) {
                        lifecycle.detach_controller(element);
                    }
                }
                for &node in &record.added_nodes {
                    for element in self.candidates(lifecycle, node) {
                        lifecycle.apply_controller(None, element);
                    }
                }
            }
        }
    }

    /// `node` and its descendants that currently have a binding
    fn tracked_subtree(&self, lifecycle: &Lifecycle, node: NodeId) -> Vec<NodeId> {
        let document = lifecycle.document().borrow();
        std::iter::once(node)
            .chain(document.tree().descendants(node))
            .filter(|&id| lifecycle.is_tracked(id))
            .collect()
    }

    fn bindable(&self, lifecycle: &Lifecycle, node: NodeId) -> bool {
        let document = lifecycle.document().borrow();
        document.is_connected(node) && document.has_attribute(node, &lifecycle.config().target_attribute)
    }

    /// `node` and its descendants carrying the attribute, if still connected
    fn candidates(&self, lifecycle: &Lifecycle, node: NodeId) -> Vec<NodeId> {
        let document = lifecycle.document().borrow();
        if !document.is_connected(node) {
            return Vec::new();
        }

        let attribute = &lifecycle.config().target_attribute;
        let mut elements = Vec::new();
        if document.has_attribute(node, attribute) {
            elements.push(node);
        }
        elements.extend(document.elements_with_attribute(node, attribute));
        elements
    }

    fn sweep(&self, lifecycle: &Rc<Lifecycle>) {
        if self.swept.get() {
            return;
        }

        let elements = {
            let document = lifecycle.document().borrow();
            if !document.ready_state().is_ready() {
                return;
            }
            document.elements_with_attribute(document.root(), &lifecycle.config().target_attribute)
        };
        self.swept.set(true);

        tracing::debug!(elements = elements.len(), "Ready sweep");
        for element in elements {
            lifecycle.apply_controller(None, element);
        }
    }
}
