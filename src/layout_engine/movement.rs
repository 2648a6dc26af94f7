//! Directional focus and movement.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::error::LayoutError;
use super::graph::{Direction, LayoutKind};
use super::layout::{LayoutOps, TilingLayout};
use super::root::{Placement, RootLayout};
use crate::model::tree::{Node, NodeId};
use crate::sys::host::{Host, WindowId};

/// Which ancestors directional focus may step through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    #[default]
    All,
    /// Only cycle within stacking layouts. Used for scroll input.
    StackingOnly,
}

/// Share of an enclosing split the pre-existing content keeps when a split
/// move is folded into it.
const FOLDED_EXISTING_SHARE: f64 = 2.0 / 3.0;

impl RootLayout {
    /// Focuses the closest window in `direction` from `window`.
    ///
    /// Returns false when no ancestor has a sibling that way.
    pub fn focus_direction(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
        direction: Direction,
        mode: FocusMode,
    ) -> Result<bool, LayoutError> {
        let Some(node) = self.tiled_node(window) else {
            return Ok(false);
        };
        let pairs: Vec<_> = node.ancestors_with_parent(&self.map).collect();
        for (child, parent) in pairs {
            let layout = self.map.layout(parent)?;
            if mode == FocusMode::StackingOnly && !layout.kind().is_stacking() {
                continue;
            }
            if let Some(target) = layout.get_child_by_direction(child, direction)? {
                return self.focus_node(host, target);
            }
        }
        trace!(?window, ?direction, "No window to focus in direction");
        Ok(false)
    }

    /// Focuses and raises `node`, or the most recently focused window under it.
    fn focus_node(&mut self, host: &mut dyn Host, mut node: NodeId) -> Result<bool, LayoutError> {
        while self.map.is_layout(node) {
            match self.map.most_recently_focused_child(node) {
                Some((child, _)) => node = child,
                None => return Ok(false),
            }
        }
        let window = self.map.window_at(node).ok_or(LayoutError::UnknownNode(node))?;
        let time = host.current_time();
        self.map.touch_focus(node, time);
        host.focus(window, time);
        host.raise(window);
        Ok(true)
    }

    /// Moves `window` one step in `direction`.
    ///
    /// In order of preference: dive into an adjacent container, swap with
    /// the adjacent sibling, leave through the first ancestor with a
    /// neighbour that way, or split the first ancestor whose axis does not
    /// match `direction`. Returns false if the window is already as far as it
    /// can go.
    pub fn move_window(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
        direction: Direction,
    ) -> Result<bool, LayoutError> {
        let Some(node) = self.tiled_node(window) else {
            return Ok(false);
        };
        let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
        if parent == self.root && self.map.layout(parent)?.len() == 1 {
            return Ok(false);
        }

        let sibling = self.map.layout(parent)?.get_child_by_direction(node, direction)?;
        if let Some(target) = sibling.filter(|&s| self.map.is_layout(s)) {
            self.move_into(host, node, window, target, parent, direction)?;
            return Ok(true);
        }
        if let Some(grandparent) = parent.parent(&self.map) {
            let parent_kind = self.map.layout(parent)?.kind();
            let neighbour = self.map.layout(grandparent)?.get_child_by_direction(parent, direction)?;
            if let Some(target) = neighbour {
                if parent_kind != self.config().default_layout || self.map.is_layout(target) {
                    self.move_into(host, node, window, target, grandparent, direction)?;
                    return Ok(true);
                }
            }
        }

        if self.map.layout_mut(parent)?.move_child_in_place(node, direction)? {
            debug!(?window, ?direction, "Swapped window with its sibling");
            self.mark_dirty(host, parent);
            return Ok(true);
        }

        let wanted = LayoutKind::split(direction.orientation());
        let mut current = parent;
        loop {
            if let Some(grandparent) = current.parent(&self.map) {
                let neighbour =
                    self.map.layout(grandparent)?.get_child_by_direction(current, direction)?;
                if let Some(target) = neighbour {
                    self.move_into(host, node, window, target, grandparent, direction)?;
                    return Ok(true);
                }
            }
            if self.map.layout(current)?.kind() != wanted {
                self.split_move(host, node, current, direction)?;
                return Ok(true);
            }
            match current.parent(&self.map) {
                Some(next) => current = next,
                None => {
                    trace!(?window, ?direction, "Window cannot move further");
                    return Ok(false);
                }
            }
        }
    }

    /// Re-inserts `node` under `target`, a neighbour inside `common`.
    fn move_into(
        &mut self,
        host: &mut dyn Host,
        node: NodeId,
        window: WindowId,
        target: NodeId,
        common: NodeId,
        direction: Direction,
    ) -> Result<(), LayoutError> {
        let old_parent = self.detach(node)?;
        let removed = self.map.remove(node).ok_or(LayoutError::UnknownNode(node))?;
        let inserted = self.insert_under(target, window, Placement::Entering(direction))?;
        if let Some(leaf) = self.map.leaf_mut(inserted) {
            leaf.rect = removed.as_window().and_then(|l| l.rect);
        }
        if let Some(time) = removed.last_focus {
            self.map.touch_focus(inserted, time);
        }
        let managed = self.windows.get_mut(&window).ok_or(LayoutError::UnknownWindow(window))?;
        managed.node = Some(inserted);

        let anchor = self.repair(old_parent)?;
        debug!(?window, ?target, ?direction, "Moved window into neighbour");
        self.mark_dirty(host, anchor);
        if self.map.contains(common) {
            self.mark_dirty(host, common);
        }
        Ok(())
    }

    /// Pulls `node` out of its place and splits `ancestor` along the axis of
    /// `direction`, with the old content on one side and the window on the
    /// other.
    fn split_move(
        &mut self,
        host: &mut dyn Host,
        node: NodeId,
        ancestor: NodeId,
        direction: Direction,
    ) -> Result<(), LayoutError> {
        let kind = LayoutKind::split(direction.orientation());
        let old_parent = self.detach(node)?;

        let (gap, offset) = (self.config().gap_size, self.config().stack_offset);
        let old_layout =
            std::mem::replace(self.map.layout_mut(ancestor)?, TilingLayout::new(kind, gap, offset));
        if let Some(rect) = old_layout.rect() {
            self.map.layout_mut(ancestor)?.set_rect(rect);
        }
        let moved_children = old_layout.children();
        let inner = self.map.insert(Node::layout(Some(ancestor), old_layout));
        let last_focus = self.map.get(ancestor)?.last_focus;
        self.map.get_mut(inner)?.last_focus = last_focus;
        for child in moved_children {
            self.map.set_parent(child, Some(inner))?;
        }
        self.attach(ancestor, inner, None)?;
        self.map.set_parent(node, Some(ancestor))?;
        self.map.layout_mut(ancestor)?.insert_at_directional_end(node, direction)?;

        let old_parent = if old_parent == ancestor { inner } else { old_parent };
        self.repair(old_parent)?;
        if self.map.contains(inner) {
            self.repair(inner)?;
        }

        let mut dirty = ancestor;
        if let Some(grandparent) = ancestor.parent(&self.map) {
            if self.map.layout(grandparent)?.kind() == kind {
                if let Some(split) = self.map.layout_mut(ancestor)?.as_split_mut() {
                    split.set_share(node, 1.0 - FOLDED_EXISTING_SHARE)?;
                }
                self.homogenize(grandparent, ancestor)?;
                dirty = grandparent;
            }
        }
        debug!(?node, ?ancestor, ?kind, "Split move");
        self.mark_dirty(host, dirty);
        Ok(())
    }
}
