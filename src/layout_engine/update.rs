use crate::model::tree::{NodeId, NodeMap};

/// Layouts waiting for a geometry pass.
///
/// Marking is cheap and may happen many times per host turn; the owner
/// schedules a single flush the first time something is marked.
#[derive(Debug, Default)]
pub struct DirtySet {
    nodes: Vec<NodeId>,
    scheduled: bool,
}

impl DirtySet {
    /// Adds `node`. Returns true if a flush still has to be scheduled.
    pub fn mark(&mut self, node: NodeId) -> bool {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
        !std::mem::replace(&mut self.scheduled, true)
    }

    pub fn is_scheduled(&self) -> bool { self.scheduled }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Clears the set and returns the marked nodes that still exist and have
    /// no marked ancestor.
    pub fn take_topmost(&mut self, map: &NodeMap) -> Vec<NodeId> {
        self.scheduled = false;
        let nodes: Vec<NodeId> =
            std::mem::take(&mut self.nodes).into_iter().filter(|&n| map.contains(n)).collect();
        nodes
            .iter()
            .copied()
            .filter(|&n| !nodes.iter().any(|&other| n.is_descendant_of(other, map)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::{LayoutKind, LayoutOps, TilingLayout};
    use crate::model::tree::Node;
    use crate::sys::host::WindowId;

    #[test]
    fn only_the_first_mark_requests_a_flush() {
        let mut map = NodeMap::new();
        let a = map.insert(Node::window(None, WindowId(1)));
        let mut dirty = DirtySet::default();
        assert!(dirty.mark(a));
        assert!(!dirty.mark(a));
        assert!(dirty.is_scheduled());

        assert_eq!(dirty.take_topmost(&map), vec![a]);
        assert!(!dirty.is_scheduled());
        assert!(dirty.is_empty());
        assert!(dirty.mark(a));
    }

    #[test]
    fn descendants_of_marked_nodes_are_skipped() {
        let mut map = NodeMap::new();
        let root = map.insert(Node::layout(
            None,
            TilingLayout::new(LayoutKind::SplitHorizontal, 0.0, 10.0),
        ));
        let inner = map.insert(Node::layout(
            Some(root),
            TilingLayout::new(LayoutKind::SplitVertical, 0.0, 10.0),
        ));
        map.layout_mut(root).unwrap().insert_child(inner, None);
        let removed = map.insert(Node::window(Some(root), WindowId(9)));
        map.remove(removed);

        let mut dirty = DirtySet::default();
        dirty.mark(inner);
        dirty.mark(removed);
        dirty.mark(root);
        assert_eq!(dirty.take_topmost(&map), vec![root]);
        assert_eq!(dirty.take_topmost(&map), vec![]);
    }
}
