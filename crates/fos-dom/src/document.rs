//! Document - High-level document API
//!
//! All structural and attribute changes go through `Document` so that
//! registered mutation observers see them.

use crate::{
    DomError, DomTree, MutationObserverInit, MutationObservers, MutationRecord, NodeId,
    ObserverId,
};

/// Document loading state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Parsing finished (DOMContentLoaded has fired)
    pub fn is_ready(self) -> bool {
        self >= ReadyState::Interactive
    }
}

/// HTML Document
pub struct Document {
    /// The DOM tree
    tree: DomTree,
    /// Document URL
    url: String,
    ready_state: ReadyState,
    observers: MutationObservers,
    /// Cached reference to <html> element
    html_element: NodeId,
    /// Cached reference to <head> element
    head_element: NodeId,
    /// Cached reference to <body> element
    body_element: NodeId,
}

impl Document {
    /// Create a new document with `html`, `head` and `body`
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();

        let html = tree.append_element(tree.root(), "html");
        let head = tree.append_element(html, "head");
        let body = tree.append_element(html, "body");

        Self {
            tree,
            url: url.to_string(),
            ready_state: ReadyState::Loading,
            observers: MutationObservers::new(),
            html_element: html,
            head_element: head,
            body_element: body,
        }
    }

    /// Create an empty document (no structure)
    pub fn empty(url: &str) -> Self {
        Self {
            tree: DomTree::new(),
            url: url.to_string(),
            ready_state: ReadyState::Loading,
            observers: MutationObservers::new(),
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
        }
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Advance the ready state; it never moves backwards
    pub fn set_ready_state(&mut self, state: ReadyState) {
        if state > self.ready_state {
            tracing::debug!(url = %self.url, ?state, "Document ready state changed");
            self.ready_state = state;
        }
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Get <html> element
    pub fn document_element(&self) -> NodeId {
        self.html_element
    }

    /// Get <head> element
    pub fn head(&self) -> NodeId {
        self.head_element
    }

    /// Get <body> element
    pub fn body(&self) -> NodeId {
        self.body_element
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree.create_element(tag)
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.tree.create_text(content)
    }

    /// Lowercased tag name of an element
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.tree.get(node)?.as_element().map(|e| e.tag.as_str())
    }

    /// Get an attribute value
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.tree.get(node)?.as_element()?.get_attr(name)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    /// Set an attribute and queue an attribute mutation
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let old_value = self.element_mut(node)?.set_attr(name, value);
        self.queue(MutationRecord::attribute(node, name, old_value));
        Ok(())
    }

    /// Remove an attribute; only an existing attribute queues a mutation
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<Option<String>, DomError> {
        let old_value = self.element_mut(node)?.remove_attr(name);
        if old_value.is_some() {
            self.queue(MutationRecord::attribute(node, name, old_value.clone()));
        }
        Ok(old_value)
    }

    /// Append a child, moving it if it is already attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let old_parent = self.tree.parent(child);
        self.tree.append_child(parent, child)?;
        if let Some(old_parent) = old_parent {
            self.queue(MutationRecord::child_list(old_parent, Vec::new(), vec![child]));
        }
        self.queue(MutationRecord::child_list(parent, vec![child], Vec::new()));
        Ok(())
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.tree.parent(child) != Some(parent) {
            return Err(DomError::NotFound { parent, child });
        }
        self.tree.detach(child);
        self.queue(MutationRecord::child_list(parent, Vec::new(), vec![child]));
        Ok(())
    }

    /// Remove a node from whatever parent it has; detached nodes are left alone
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        match self.tree.parent(node) {
            Some(parent) => self.remove_child(parent, node),
            None if self.tree.get(node).is_some() => Ok(()),
            None => Err(DomError::InvalidNode(node)),
        }
    }

    /// Whether the node is in the document
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree.is_connected(node)
    }

    /// Elements below `root` carrying `name`, in document order.
    ///
    /// Equivalent to `root.querySelectorAll("[name]")`: `root` itself is not
    /// included and empty values match.
    pub fn elements_with_attribute(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.tree
            .descendants(root)
            .filter(|&id| {
                self.tree
                    .get(id)
                    .and_then(|n| n.as_element())
                    .is_some_and(|e| e.has_attr(name))
            })
            .collect()
    }

    /// First connected `tag[name="value"]` element in document order
    pub fn query_attribute(&self, tag: &str, name: &str, value: &str) -> Option<NodeId> {
        self.tree.descendants(self.root()).find(|&id| {
            self.tree
                .get(id)
                .and_then(|n| n.as_element())
                .is_some_and(|e| e.tag.eq_ignore_ascii_case(tag) && e.get_attr(name) == Some(value))
        })
    }

    /// Register a mutation observer on `target`
    pub fn observe(&mut self, target: NodeId, options: MutationObserverInit) -> ObserverId {
        let id = self.observers.create();
        self.observers.observe(id, target, options);
        id
    }

    /// Take the observer's pending batch
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers.take_records(observer)
    }

    pub fn has_pending_records(&self, observer: ObserverId) -> bool {
        self.observers.has_pending(observer)
    }

    pub fn disconnect(&mut self, observer: ObserverId) {
        self.observers.disconnect(observer);
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut crate::ElementData, DomError> {
        self.tree
            .get_mut(node)
            .ok_or(DomError::InvalidNode(node))?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(node))
    }

    fn queue(&mut self, record: MutationRecord) {
        self.observers.notify(&self.tree, record);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("ready_state", &self.ready_state)
            .field("nodes", &self.tree.len())
            .finish()
    }
}
