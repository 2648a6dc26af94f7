//! Interactive grabs and the geometry notifications that follow them.

use std::time::Duration;

use tracing::{debug, trace};

use super::error::LayoutError;
use super::graph::{Direction, Orientation};
use super::layout::LayoutOps;
use super::root::RootLayout;
use crate::model::tree::NodeId;
use crate::sys::host::{Deferred, GrabOp, Host, WindowId};

impl RootLayout {
    pub fn on_grab_begin(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
        op: GrabOp,
    ) -> Result<(), LayoutError> {
        let managed = self.windows.get_mut(&window).ok_or(LayoutError::UnknownWindow(window))?;
        managed.grab = Some(op);
        let node = managed.node;
        if let Some(leaf) = node.and_then(|n| self.map.leaf_mut(n)) {
            leaf.rect = host.frame_rect(window);
        }
        trace!(?window, ?op, "Grab started");
        Ok(())
    }

    /// Turns a size change of a window under a resize grab into a change of
    /// the split shares around it.
    ///
    /// Returns true if any share changed.
    pub fn on_window_size_changed(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
    ) -> Result<bool, LayoutError> {
        let Some(node) = self.tiled_node(window) else {
            return Ok(false);
        };
        let Some(op) = self.windows.get(&window).and_then(|m| m.grab) else {
            return Ok(false);
        };
        if !op.is_resizing() || host.focused_window() != Some(window) {
            return Ok(false);
        }
        let Some(frame) = host.frame_rect(window) else {
            return Ok(false);
        };
        let last = self.map.get(node)?.as_window().and_then(|leaf| leaf.rect);

        let mut resized = false;
        if let Some(last) = last {
            let axes = [
                (op.horizontal_direction(), Orientation::Horizontal),
                (op.vertical_direction(), Orientation::Vertical),
            ];
            for (direction, orientation) in axes {
                let Some(direction) = direction else { continue };
                let delta = frame.extent(orientation) - last.extent(orientation);
                if delta != 0.0 {
                    resized |= self.resize_towards(host, node, direction, delta)?;
                }
            }
        }
        if let Some(leaf) = self.map.leaf_mut(node) {
            leaf.rect = Some(frame);
        }
        Ok(resized)
    }

    /// Applies `delta` to the nearest split above `node` that can grow it
    /// towards `direction`.
    fn resize_towards(
        &mut self,
        host: &mut dyn Host,
        node: NodeId,
        direction: Direction,
        delta: f64,
    ) -> Result<bool, LayoutError> {
        let found = node.ancestors_with_parent(&self.map).find(|&(child, parent)| {
            self.map
                .layout(parent)
                .ok()
                .and_then(|l| l.as_split())
                .is_some_and(|split| split.can_resize_in_direction(child, direction))
        });
        let Some((child, parent)) = found else {
            trace!(?node, ?direction, "No split can absorb the resize");
            return Ok(false);
        };
        let split = self.map.layout_mut(parent)?.as_split_mut().ok_or(LayoutError::NotALayout(parent))?;
        if split.rect().is_none() {
            trace!(?parent, "Split has not been laid out yet");
            return Ok(false);
        }
        split.resize_in_direction(child, direction, delta)?;
        debug!(?parent, ?child, ?direction, delta, "Resized split");
        self.mark_dirty(host, parent);
        Ok(true)
    }

    /// A tiled window moved without a grab: lay its parent out again so it
    /// snaps back into its tile.
    pub fn on_window_position_changed(
        &mut self,
        host: &mut dyn Host,
        window: WindowId,
    ) -> Result<bool, LayoutError> {
        let Some(node) = self.tiled_node(window) else {
            return Ok(false);
        };
        if self.windows.get(&window).is_some_and(|m| m.grab.is_some()) {
            return Ok(false);
        }
        let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
        self.mark_dirty(host, parent);
        Ok(true)
    }

    /// Keeps the grab marker for `delay` longer, so trailing geometry
    /// notifications still count as part of the grab.
    pub fn on_drag_end(&mut self, host: &mut dyn Host, window: WindowId, delay: Duration) {
        if self.windows.get(&window).is_some_and(|m| m.grab.is_some()) {
            host.schedule(delay, Deferred::ReleaseGrab(window));
        }
    }

    pub fn release_grab(&mut self, host: &mut dyn Host, window: WindowId) -> Result<(), LayoutError> {
        let Some(managed) = self.windows.get_mut(&window) else {
            return Ok(());
        };
        if managed.grab.take().is_none() {
            return Ok(());
        }
        trace!(?window, "Grab released");
        if let Some(node) = self.tiled_node(window) {
            let parent = node.parent(&self.map).ok_or(LayoutError::Detached(node))?;
            self.mark_dirty(host, parent);
        }
        Ok(())
    }

    pub fn on_window_focus(&mut self, host: &dyn Host, window: WindowId) {
        if let Some(node) = self.tiled_node(window) {
            self.map.touch_focus(node, host.current_time());
        }
    }
}
