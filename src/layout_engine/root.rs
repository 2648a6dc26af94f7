use std::time::Duration;

use tracing::{debug, trace, warn};

use super::error::LayoutError;
use super::graph::{Direction, LayoutKind};
use super::layout::{LayoutOps, SplitLayout, TilingLayout};
use super::registry::LayoutKey;
use super::update::DirtySet;
use super::window::{ManagedWindow, WindowMode};
use crate::common::collections::HashMap;
use crate::model::tree::{Node, NodeId, NodeKind, NodeMap};
use crate::sys::geometry::{Rect, RectExt, Round, SameAs};
use crate::sys::host::{Deferred, GrabOp, Host, WindowId};

/// Settings a root layout is built with. They never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub default_layout: LayoutKind,
    pub default_window_state: WindowMode,
    pub gap_size: f64,
    pub stack_offset: f64,
    /// Work area of the monitor; the tree is laid out inside it, inset by the gap.
    pub root_rect: Rect,
}

/// Where an inserted window goes relative to the window it lands next to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Placement {
    /// Right after it, in layout order.
    AfterFocused,
    /// On the side a window moving in this direction arrives from.
    Entering(Direction),
}

impl Placement {
    fn position(self, kind: LayoutKind, index: usize) -> usize {
        match self {
            Placement::Entering(direction) if kind.index_delta(direction) == Some(1) => index,
            Placement::Entering(_) | Placement::AfterFocused => index + 1,
        }
    }
}

/// The tiling tree of one workspace on one monitor.
pub struct RootLayout {
    key: LayoutKey,
    config: LayoutConfig,
    pub(super) map: NodeMap,
    pub(super) root: NodeId,
    pub(super) windows: HashMap<WindowId, ManagedWindow>,
    dirty: DirtySet,
}

impl RootLayout {
    pub fn new(key: LayoutKey, config: LayoutConfig) -> Self {
        let mut map = NodeMap::new();
        let mut layout =
            TilingLayout::new(config.default_layout, config.gap_size, config.stack_offset);
        layout.set_rect(config.root_rect.inset(config.gap_size));
        let root = map.insert(Node::layout(None, layout));
        RootLayout {
            key,
            config,
            map,
            root,
            windows: HashMap::default(),
            dirty: DirtySet::default(),
        }
    }

    pub fn key(&self) -> LayoutKey { self.key }

    pub fn config(&self) -> &LayoutConfig { &self.config }

    pub fn root(&self) -> NodeId { self.root }

    pub fn map(&self) -> &NodeMap { &self.map }

    pub fn is_flush_pending(&self) -> bool { self.dirty.is_scheduled() }

    pub fn window_mode(&self, window: WindowId) -> Option<WindowMode> {
        self.windows.get(&window).map(|m| m.mode)
    }

    pub fn managed(&self, window: WindowId) -> Option<&ManagedWindow> { self.windows.get(&window) }

    pub fn node_of(&self, window: WindowId) -> Option<NodeId> {
        self.windows.get(&window).and_then(|m| m.node)
    }

    /// Tiled windows in layout order.
    pub fn tiled_windows(&self) -> Vec<WindowId> {
        self.root
            .traverse_preorder(&self.map)
            .filter_map(|node| self.map.window_at(node))
            .collect()
    }

    /// Starts managing `window`, tiling it unless it was floating before or
    /// floating is the default. Windows that cannot be tiled float.
    pub fn insert_window(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
        previous: Option<WindowMode>,
    ) -> Result<WindowMode, LayoutError> {
        if let Some(managed) = self.windows.get(&window) {
            return Ok(managed.mode);
        }
        self.windows.insert(window, ManagedWindow::floating());
        let target = previous.unwrap_or(self.config.default_window_state);
        if target == WindowMode::Tiling && self.tile_window(host, window)? {
            return Ok(WindowMode::Tiling);
        }
        self.float_window(host, window)?;
        Ok(WindowMode::Floating)
    }

    /// Puts `window` into the tree next to the most recently focused window.
    ///
    /// Returns false if the window does not allow resizing.
    pub fn tile_window(&mut self, host: &mut dyn Host, window: WindowId) -> Result<bool, LayoutError> {
        if self.windows.get(&window).is_some_and(ManagedWindow::is_tiling) {
            return Ok(true);
        }
        let was_maximized = host.is_maximized(window);
        if was_maximized {
            host.unmaximize(window);
        }
        if !host.allows_resize(window) {
            debug!(?window, "Window does not allow resizing, leaving it floating");
            return Ok(false);
        }

        let restore_rect = host.frame_rect(window);
        let node = self.insert_under(self.root, window, Placement::AfterFocused)?;
        if let Some(leaf) = self.map.leaf_mut(node) {
            leaf.rect = restore_rect;
        }
        let managed = self.windows.entry(window).or_insert_with(ManagedWindow::floating);
        managed.mode = WindowMode::Tiling;
        managed.node = Some(node);
        managed.restore_rect = restore_rect;
        managed.restore_maximized = was_maximized;

        let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
        debug!(?window, ?node, ?parent, "Tiled window");
        self.mark_dirty(host, parent);
        Ok(true)
    }

    /// Takes `window` out of the tree, if needed, and gives it back the
    /// geometry it had before it was tiled.
    pub fn float_window(&mut self, host: &mut dyn Host, window: WindowId) -> Result<(), LayoutError> {
        if self.windows.get(&window).is_some_and(ManagedWindow::is_tiling) {
            self.remove_from_tree(host, window)?;
        }
        let managed = self.windows.entry(window).or_insert_with(ManagedWindow::floating);
        managed.mode = WindowMode::Floating;
        managed.node = None;
        if let Some(rect) = managed.restore_rect.take() {
            host.move_resize_frame(window, rect);
        }
        if std::mem::take(&mut managed.restore_maximized) {
            host.maximize(window);
        }
        debug!(?window, "Floated window");
        Ok(())
    }

    /// Switches `window` between tiling and floating and returns the new mode.
    pub fn toggle_floating(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
    ) -> Result<WindowMode, LayoutError> {
        match self.window_mode(window) {
            Some(WindowMode::Tiling) => {
                self.float_window(host, window)?;
                Ok(WindowMode::Floating)
            }
            Some(WindowMode::Floating) if self.tile_window(host, window)? => Ok(WindowMode::Tiling),
            Some(WindowMode::Floating) => Ok(WindowMode::Floating),
            None => Err(LayoutError::UnknownWindow(window)),
        }
    }

    /// Stops managing `window` and returns the mode it had.
    pub fn remove_window(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
    ) -> Result<Option<WindowMode>, LayoutError> {
        let Some(mode) = self.window_mode(window) else {
            return Ok(None);
        };
        if mode == WindowMode::Tiling {
            self.remove_from_tree(host, window)?;
        }
        self.windows.remove(&window);
        debug!(?window, ?mode, "Removed window");
        Ok(Some(mode))
    }

    fn remove_from_tree(&mut self, host: &mut dyn Host, window: WindowId) -> Result<(), LayoutError> {
        let node = self
            .windows
            .get_mut(&window)
            .and_then(|m| m.node.take())
            .ok_or(LayoutError::UnknownWindow(window))?;
        let parent = self.detach(node)?;
        self.map.remove(node);
        let anchor = self.repair(parent)?;
        self.mark_dirty(host, anchor);
        Ok(())
    }

    /// Applies geometry to every layout marked dirty since the last flush.
    pub fn flush(&mut self, host: &mut dyn Host) -> Result<(), LayoutError> {
        let nodes = self.dirty.take_topmost(&self.map);
        if nodes.is_empty() {
            return Ok(());
        }
        trace!(key = ?self.key, ?nodes, "Flushing dirty layouts");
        for node in nodes {
            self.update_position_and_size(host, node)?;
        }
        Ok(())
    }

    /// Marks the closest laid-out layout at or above `node` for the next
    /// flush, scheduling one if none is pending.
    pub(super) fn mark_dirty(&mut self, host: &mut dyn Host, node: NodeId) {
        let target = node
            .ancestors(&self.map)
            .find(|&n| self.map.layout(n).is_ok_and(|l| l.rect().is_some()));
        let Some(target) = target else {
            warn!(?node, "Nothing to mark dirty");
            return;
        };
        if self.dirty.mark(target) {
            host.schedule(Duration::ZERO, Deferred::Flush(self.key));
        }
    }

    fn update_position_and_size(
        &mut self,
        host: &mut dyn Host,
        node: NodeId,
    ) -> Result<(), LayoutError> {
        let gap = self.config.gap_size;
        let rects = self.map.layout(node)?.child_rects()?;
        for (child, rect) in rects {
            let is_layout = match &mut self.map.get_mut(child)?.kind {
                NodeKind::Layout(layout) => {
                    layout.set_rect(rect);
                    layout.set_gap(gap);
                    true
                }
                NodeKind::Window(_) => false,
            };
            if is_layout {
                self.update_position_and_size(host, child)?;
            } else {
                self.apply_window_rect(host, child, rect)?;
            }
        }
        Ok(())
    }

    fn apply_window_rect(
        &mut self,
        host: &mut dyn Host,
        node: NodeId,
        rect: Rect,
    ) -> Result<(), LayoutError> {
        if !rect.is_finite() {
            return Err(LayoutError::InvalidGeometry(rect));
        }
        let rect = rect.round();
        let leaf = self.map.leaf_mut(node).ok_or(LayoutError::UnknownNode(node))?;
        let window = leaf.window;
        let being_moved = self
            .windows
            .get(&window)
            .and_then(|m| m.grab)
            .is_some_and(|op| op.contains(GrabOp::MOVING));
        if being_moved {
            trace!(?window, "Skipping window under a move grab");
            return Ok(());
        }
        leaf.rect = Some(rect);
        if !host.frame_rect(window).is_some_and(|frame| frame.same_as(rect)) {
            trace!(?window, ?rect, "Applying geometry");
            host.move_resize_frame(window, rect);
        }
        Ok(())
    }

    pub(super) fn tiled_node(&self, window: WindowId) -> Option<NodeId> {
        self.windows.get(&window).filter(|m| m.is_tiling()).and_then(|m| m.node)
    }

    fn new_layout(&mut self, parent: Option<NodeId>, kind: LayoutKind) -> NodeId {
        let layout = TilingLayout::new(kind, self.config.gap_size, self.config.stack_offset);
        self.map.insert(Node::layout(parent, layout))
    }

    /// Links `child` into `parent` at `position`.
    pub(super) fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: Option<usize>,
    ) -> Result<(), LayoutError> {
        if self.map.layout(parent)?.kind().is_stacking() && self.map.is_layout(child) {
            return Err(LayoutError::NestedInStacking(child));
        }
        self.map.layout_mut(parent)?.insert_child(child, position);
        self.map.set_parent(child, Some(parent))
    }

    fn attach_window(
        &mut self,
        parent: NodeId,
        window: WindowId,
        position: Option<usize>,
    ) -> Result<NodeId, LayoutError> {
        let node = self.map.insert(Node::window(Some(parent), window));
        self.attach(parent, node, position)?;
        Ok(node)
    }

    /// Unlinks `node` from its parent without repairing the parent. Returns
    /// the parent.
    pub(super) fn detach(&mut self, node: NodeId) -> Result<NodeId, LayoutError> {
        let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
        self.map.layout_mut(parent)?.remove_child(node)?;
        self.map.set_parent(node, None)?;
        Ok(parent)
    }

    /// Inserts a window node for `window` somewhere under `start`.
    ///
    /// Descends through the most recently focused children until it reaches
    /// a window or an empty layout. Next to a window, the new node becomes a
    /// sibling if the window's layout has the default type (or is a stack);
    /// otherwise the window is wrapped in a new default layout holding both.
    pub(super) fn insert_under(
        &mut self,
        start: NodeId,
        window: WindowId,
        placement: Placement,
    ) -> Result<NodeId, LayoutError> {
        let mut node = start;
        while self.map.is_layout(node) {
            match self.map.most_recently_focused_child(node) {
                Some((child, _)) => node = child,
                None => return self.attach_window(node, window, None),
            }
        }

        let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
        let parent_layout = self.map.layout(parent)?;
        let parent_kind = parent_layout.kind();
        let index = parent_layout.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        if parent_kind == self.config.default_layout || parent_kind.is_stacking() {
            return self.attach_window(parent, window, Some(placement.position(parent_kind, index)));
        }

        let kind = self.config.default_layout;
        let wrapper = self.new_layout(Some(parent), kind);
        let last_focus = self.map.get(node)?.last_focus;
        self.map.get_mut(wrapper)?.last_focus = last_focus;
        self.map.layout_mut(parent)?.replace_child(node, wrapper)?;
        self.attach(wrapper, node, None)?;
        let inserted = self.attach_window(wrapper, window, Some(placement.position(kind, 0)))?;
        trace!(?wrapper, ?kind, "Wrapped window in a new layout");
        self.homogenize(parent, wrapper)?;
        Ok(inserted)
    }

    /// Restores the structural invariants of `node` after a child was taken
    /// out of it. Returns the closest node that survived.
    pub(super) fn repair(&mut self, node: NodeId) -> Result<NodeId, LayoutError> {
        let children = self.map.layout(node)?.children();
        match (children.as_slice(), node.parent(&self.map)) {
            ([], Some(parent)) => {
                self.detach(node)?;
                self.map.remove(node);
                self.repair(parent)
            }
            ([only], Some(parent)) => self.collapse(node, *only, parent),
            ([only], None) if self.map.is_layout(*only) => self.promote_root(*only),
            _ => Ok(node),
        }
    }

    /// Replaces single-child `node` with `only` in `parent`. `only` inherits
    /// the share `node` had.
    fn collapse(
        &mut self,
        node: NodeId,
        only: NodeId,
        parent: NodeId,
    ) -> Result<NodeId, LayoutError> {
        self.map.layout_mut(parent)?.replace_child(node, only)?;
        self.map.set_parent(only, Some(parent))?;
        self.map.remove(node);
        debug!(?node, ?only, "Collapsed single-child layout");
        if self.map.is_layout(only) {
            self.homogenize(parent, only)?;
        }
        Ok(parent)
    }

    fn promote_root(&mut self, only: NodeId) -> Result<NodeId, LayoutError> {
        let old = self.root;
        let rect = self.map.layout(old)?.rect();
        self.map.set_parent(only, None)?;
        if let Some(rect) = rect {
            self.map.layout_mut(only)?.set_rect(rect);
        }
        self.map.remove(old);
        self.root = only;
        debug!(?old, root = ?only, "Promoted only child to root");
        Ok(only)
    }

    /// Splices `child` into `parent` when both are splits of the same
    /// orientation.
    pub(super) fn homogenize(&mut self, parent: NodeId, child: NodeId) -> Result<(), LayoutError> {
        let parent_kind = self.map.layout(parent)?.kind();
        let Ok(child_layout) = self.map.layout_mut(child) else {
            return Ok(());
        };
        if !parent_kind.is_split() || child_layout.kind() != parent_kind {
            return Ok(());
        }
        let slots = child_layout.as_split_mut().map(SplitLayout::take_slots).unwrap_or_default();
        for slot in &slots {
            self.map.set_parent(slot.node, Some(parent))?;
        }
        self.map
            .layout_mut(parent)?
            .as_split_mut()
            .ok_or(LayoutError::NotALayout(parent))?
            .splice(child, slots)?;
        self.map.remove(child);
        debug!(?parent, ?child, "Homogenized nested layout");
        Ok(())
    }

    /// Lists every broken structural invariant. Empty when the tree is sound.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(parent) = self.root.parent(&self.map) {
            issues.push(format!("root {:?} has parent {parent:?}", self.root));
        }

        let mut reachable = 0;
        for node in self.root.traverse_preorder(&self.map) {
            reachable += 1;
            let Ok(layout) = self.map.layout(node) else {
                match self.map.window_at(node) {
                    Some(window) if self.node_of(window) == Some(node) => {}
                    Some(window) => issues.push(format!("{window} is not tracked at {node:?}")),
                    None => issues.push(format!("{node:?} is missing")),
                }
                continue;
            };
            let children = layout.children();
            for &child in &children {
                if child.parent(&self.map) != Some(node) {
                    issues.push(format!("{child:?} does not point back to parent {node:?}"));
                }
            }
            if node != self.root && children.len() < 2 {
                issues.push(format!("{node:?} has {} children", children.len()));
            }
            if layout.kind().is_stacking() && children.iter().any(|&c| self.map.is_layout(c)) {
                issues.push(format!("stacking layout {node:?} holds a layout"));
            }
            let Some(split) = layout.as_split() else { continue };
            let sum: f64 = split.sizes().iter().sum();
            if !children.is_empty() && (sum - 1.0).abs() > 1e-9 {
                issues.push(format!("sizes of {node:?} sum to {sum}"));
            }
            for &child in &children {
                if self.map.layout(child).is_ok_and(|c| c.kind() == layout.kind()) {
                    issues.push(format!("{child:?} has the same type as its parent {node:?}"));
                }
            }
            if let (Some(rect), Ok(tiles)) = (layout.rect(), layout.child_rects()) {
                for (i, (a, tile)) in tiles.iter().enumerate() {
                    if !rect.contains_rect(*tile) {
                        issues.push(format!("{a:?} spills out of {node:?}"));
                    }
                    for (b, other) in &tiles[i + 1..] {
                        if tile.intersection(other).area() > 0.0 {
                            issues.push(format!("{a:?} overlaps {b:?}"));
                        }
                    }
                }
            }
        }
        if reachable != self.map.len() {
            issues.push(format!("{} nodes are unreachable", self.map.len() - reachable));
        }

        for (window, managed) in &self.windows {
            match (managed.mode, managed.node) {
                (WindowMode::Tiling, Some(node)) if self.map.window_at(node) == Some(*window) => {}
                (WindowMode::Floating, None) => {}
                (mode, node) => issues.push(format!("{window} is {mode} with node {node:?}")),
            }
        }
        issues
    }

    pub fn draw_tree(&self) -> String {
        let tree = self.get_ascii_tree(self.root);
        let mut out = String::new();
        if let Err(err) = ascii_tree::write_tree(&mut out, &tree) {
            warn!(%err, "Could not render layout tree");
        }
        out
    }

    fn get_ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let share = node
            .parent(&self.map)
            .and_then(|p| self.map.layout(p).ok()?.as_split()?.size_of(node))
            .map(|size| format!("{size:.2} "))
            .unwrap_or_default();
        match self.map.get(node).map(|n| &n.kind) {
            Ok(NodeKind::Window(leaf)) => {
                let rect = leaf
                    .rect
                    .map(|r| format!(" ({} {} {}x{})", r.x, r.y, r.width, r.height))
                    .unwrap_or_default();
                ascii_tree::Tree::Leaf(vec![format!("{share}{}{rect}", leaf.window)])
            }
            Ok(NodeKind::Layout(layout)) => {
                let children =
                    layout.children().into_iter().map(|c| self.get_ascii_tree(c)).collect();
                ascii_tree::Tree::Node(format!("{share}{} {node:?}", layout.kind()), children)
            }
            Err(_) => ascii_tree::Tree::Leaf(vec![format!("<missing {node:?}>")]),
        }
    }
}
