use slotmap::SlotMap;

use crate::layout_engine::{LayoutError, LayoutOps, TilingLayout};
use crate::sys::geometry::Rect;
use crate::sys::host::WindowId;

slotmap::new_key_type! {
    /// Represents a node somewhere in the tree.
    pub struct NodeId;
}

/// A node of the tiling tree.
///
/// Parent and child links are [`NodeId`]s into the owning [`NodeMap`]; the
/// layout inside a [`NodeKind::Layout`] holds the ordered child list.
#[derive(Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub last_focus: Option<u64>,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Layout(TilingLayout),
    Window(WindowLeaf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowLeaf {
    pub window: WindowId,
    /// Last rectangle the window was seen at or placed in.
    pub rect: Option<Rect>,
}

impl Node {
    pub fn layout(parent: Option<NodeId>, layout: TilingLayout) -> Self {
        Node { parent, last_focus: None, kind: NodeKind::Layout(layout) }
    }

    pub fn window(parent: Option<NodeId>, window: WindowId) -> Self {
        Node {
            parent,
            last_focus: None,
            kind: NodeKind::Window(WindowLeaf { window, rect: None }),
        }
    }

    pub fn as_layout(&self) -> Option<&TilingLayout> {
        match &self.kind {
            NodeKind::Layout(layout) => Some(layout),
            NodeKind::Window(_) => None,
        }
    }

    pub fn as_window(&self) -> Option<&WindowLeaf> {
        match &self.kind {
            NodeKind::Window(leaf) => Some(leaf),
            NodeKind::Layout(_) => None,
        }
    }
}

/// Arena holding every node of one tree.
#[derive(Debug, Default)]
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    pub fn new() -> NodeMap { NodeMap::default() }

    pub fn insert(&mut self, node: Node) -> NodeId { self.map.insert(node) }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> { self.map.remove(id) }

    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn get(&self, id: NodeId) -> Result<&Node, LayoutError> {
        self.map.get(id).ok_or(LayoutError::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, LayoutError> {
        self.map.get_mut(id).ok_or(LayoutError::UnknownNode(id))
    }

    pub fn layout(&self, id: NodeId) -> Result<&TilingLayout, LayoutError> {
        self.get(id)?.as_layout().ok_or(LayoutError::NotALayout(id))
    }

    pub fn layout_mut(&mut self, id: NodeId) -> Result<&mut TilingLayout, LayoutError> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Layout(layout) => Ok(layout),
            NodeKind::Window(_) => Err(LayoutError::NotALayout(id)),
        }
    }

    pub fn leaf_mut(&mut self, id: NodeId) -> Option<&mut WindowLeaf> {
        match &mut self.map.get_mut(id)?.kind {
            NodeKind::Window(leaf) => Some(leaf),
            NodeKind::Layout(_) => None,
        }
    }

    pub fn window_at(&self, id: NodeId) -> Option<WindowId> {
        self.map.get(id)?.as_window().map(|leaf| leaf.window)
    }

    pub fn is_layout(&self, id: NodeId) -> bool {
        self.map.get(id).is_some_and(|n| n.as_layout().is_some())
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), LayoutError> {
        self.get_mut(id)?.parent = parent;
        Ok(())
    }

    /// The child with the greatest focus timestamp, and its index.
    ///
    /// Unfocused children count as older than any focused one. Ties go to
    /// the first child in layout order.
    pub fn most_recently_focused_child(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let layout = self.map.get(id)?.as_layout()?;
        let mut best: Option<(NodeId, usize, Option<u64>)> = None;
        for (index, child) in layout.children().into_iter().enumerate() {
            let time = self.map.get(child).and_then(|n| n.last_focus);
            match best {
                Some((_, _, best_time)) if time <= best_time => {}
                _ => best = Some((child, index, time)),
            }
        }
        best.map(|(child, index, _)| (child, index))
    }

    /// Stamps `id` and all of its ancestors with `time`, unless they were
    /// focused more recently.
    pub fn touch_focus(&mut self, id: NodeId, time: u64) {
        let mut next = Some(id);
        while let Some(node) = next.and_then(|n| self.map.get_mut(n)) {
            node.last_focus = node.last_focus.max(Some(time));
            next = node.parent;
        }
    }
}

impl NodeId {
    #[track_caller]
    pub fn parent(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.parent)
    }

    pub fn children(self, map: &NodeMap) -> Vec<NodeId> {
        map.map.get(self).and_then(Node::as_layout).map(|l| l.children()).unwrap_or_default()
    }

    /// Returns an iterator over all ancestors of the current node, including itself.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| map.map.get(n).and_then(|nd| nd.parent));
            node
        })
    }

    /// Returns an iterator over `(node, parent)` pairs walking up from this
    /// node, stopping at the root.
    pub fn ancestors_with_parent(
        self,
        map: &NodeMap,
    ) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.ancestors(map).filter_map(|n| n.parent(map).map(|p| (n, p)))
    }

    /// The closest strict ancestor matching `predicate`.
    pub fn find_ancestor(
        self,
        map: &NodeMap,
        mut predicate: impl FnMut(NodeId, &Node) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(map)
            .skip(1)
            .find(|&id| map.map.get(id).is_some_and(|node| predicate(id, node)))
    }

    pub fn is_descendant_of(self, ancestor: NodeId, map: &NodeMap) -> bool {
        self != ancestor && self.ancestors(map).any(|id| id == ancestor)
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children(map).into_iter().rev());
            Some(node)
        })
    }
}
