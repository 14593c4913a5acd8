//! Mutation Observers
//!
//! Observers register interest in a target (optionally its whole subtree)
//! and accumulate `MutationRecord`s until the owner takes them as a batch.

use crate::{DomTree, NodeId};

/// Observer handle returned by `MutationObservers::create`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u32);

/// Mutation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    ChildList,
}

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    /// Attribute change on `target`
    pub fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }

    /// Children added to or removed from `target`
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
        }
    }
}

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    fn wants(&self, record: &MutationRecord) -> bool {
        match record.mutation_type {
            MutationType::ChildList => self.child_list,
            MutationType::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &record.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
        }
    }
}

#[derive(Debug)]
struct MutationObserver {
    id: ObserverId,
    observations: Vec<(NodeId, MutationObserverInit)>,
    pending_records: Vec<MutationRecord>,
}

impl MutationObserver {
    fn matching(&self, tree: &DomTree, record: &MutationRecord) -> Option<&MutationObserverInit> {
        self.observations
            .iter()
            .filter(|(target, options)| {
                *target == record.target || (options.subtree && tree.contains(*target, record.target))
            })
            .map(|(_, options)| options)
            .find(|options| options.wants(record))
    }

    fn record(&mut self, tree: &DomTree, record: &MutationRecord) {
        let Some(keep_old_value) = self.matching(tree, record).map(|o| o.attribute_old_value) else {
            return;
        };
        let mut record = record.clone();
        if !keep_old_value {
            record.old_value = None;
        }
        self.pending_records.push(record);
    }
}

/// Mutation observer manager
#[derive(Debug, Default)]
pub struct MutationObservers {
    observers: Vec<MutationObserver>,
    next_id: u32,
}

impl MutationObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create observer
    pub fn create(&mut self) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push(MutationObserver {
            id,
            observations: Vec::new(),
            pending_records: Vec::new(),
        });
        id
    }

    fn get_mut(&mut self, id: ObserverId) -> Option<&mut MutationObserver> {
        self.observers.iter_mut().find(|o| o.id == id)
    }

    /// Observe a target; observing the same target again replaces its options
    pub fn observe(&mut self, id: ObserverId, target: NodeId, options: MutationObserverInit) {
        if let Some(observer) = self.get_mut(id) {
            observer.observations.retain(|(t, _)| *t != target);
            observer.observations.push((target, options));
        }
    }

    /// Drop the observer along with any queued records
    pub fn disconnect(&mut self, id: ObserverId) {
        self.observers.retain(|o| o.id != id);
    }

    /// Take pending records
    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.get_mut(id)
            .map(|o| std::mem::take(&mut o.pending_records))
            .unwrap_or_default()
    }

    /// Has pending records
    pub fn has_pending(&self, id: ObserverId) -> bool {
        self.observers
            .iter()
            .any(|o| o.id == id && !o.pending_records.is_empty())
    }

    /// Queue a mutation for every interested observer
    pub fn notify(&mut self, tree: &DomTree, record: MutationRecord) {
        for observer in &mut self.observers {
            observer.record(tree, &record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_child() -> (DomTree, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let parent = tree.create_element("div");
        let child = tree.create_element("span");
        tree.append_child(tree.root(), parent).unwrap();
        tree.append_child(parent, child).unwrap();
        (tree, parent, child)
    }

    #[test]
    fn test_attribute_filter() {
        let (tree, parent, _) = tree_with_child();
        let mut observers = MutationObservers::new();
        let id = observers.create();
        observers.observe(id, parent, MutationObserverInit {
            attributes: true,
            attribute_filter: Some(vec!["controller".to_string()]),
            ..Default::default()
        });

        observers.notify(&tree, MutationRecord::attribute(parent, "class", None));
        assert!(!observers.has_pending(id));

        observers.notify(&tree, MutationRecord::attribute(parent, "controller", None));
        assert_eq!(observers.take_records(id).len(), 1);
        assert!(!observers.has_pending(id));
    }

    #[test]
    fn test_subtree_required_for_descendants() {
        let (tree, parent, child) = tree_with_child();
        let mut observers = MutationObservers::new();
        let shallow = observers.create();
        let deep = observers.create();
        let options = MutationObserverInit {
            attributes: true,
            ..Default::default()
        };
        observers.observe(shallow, parent, options.clone());
        observers.observe(deep, parent, MutationObserverInit { subtree: true, ..options });

        observers.notify(&tree, MutationRecord::attribute(child, "id", None));
        assert!(!observers.has_pending(shallow));
        assert!(observers.has_pending(deep));
    }

    #[test]
    fn test_old_value_stripped_unless_requested() {
        let (tree, parent, _) = tree_with_child();
        let mut observers = MutationObservers::new();
        let id = observers.create();
        observers.observe(id, parent, MutationObserverInit {
            attributes: true,
            ..Default::default()
        });

        observers.notify(&tree, MutationRecord::attribute(parent, "id", Some("old".into())));
        let records = observers.take_records(id);
        assert_eq!(records[0].old_value, None);
    }

    #[test]
    fn test_disconnect_drops_records() {
        let (tree, parent, child) = tree_with_child();
        let mut observers = MutationObservers::new();
        let id = observers.create();
        observers.observe(id, parent, MutationObserverInit {
            child_list: true,
            ..Default::default()
        });

        observers.notify(&tree, MutationRecord::child_list(parent, vec![child], vec![]));
        observers.disconnect(id);
        assert!(observers.take_records(id).is_empty());
    }
}
