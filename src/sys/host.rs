//! The compositor side of the engine.
//!
//! Everything the layout engine needs from the window manager goes through
//! [`Host`]. Windows are referenced by [`WindowId`] and never owned: the host
//! reports their destruction and the engine drops its nodes in response.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use crate::layout_engine::{Direction, LayoutKey};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Debug for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "w{}", self.0) }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub u32);

bitflags! {
    /// Kind of an interactive grab, encoding which edges are dragged.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct GrabOp: u32 {
        const MOVING = 1 << 0;
        const KEYBOARD = 1 << 1;
        const RESIZING_N = 1 << 12;
        const RESIZING_S = 1 << 13;
        const RESIZING_E = 1 << 14;
        const RESIZING_W = 1 << 15;
    }
}

impl GrabOp {
    pub fn is_resizing(self) -> bool {
        self.intersects(
            GrabOp::RESIZING_N | GrabOp::RESIZING_S | GrabOp::RESIZING_E | GrabOp::RESIZING_W,
        )
    }

    pub fn horizontal_direction(self) -> Option<Direction> {
        if self.contains(GrabOp::RESIZING_W) {
            Some(Direction::Left)
        } else if self.contains(GrabOp::RESIZING_E) {
            Some(Direction::Right)
        } else {
            None
        }
    }

    pub fn vertical_direction(self) -> Option<Direction> {
        if self.contains(GrabOp::RESIZING_N) {
            Some(Direction::Up)
        } else if self.contains(GrabOp::RESIZING_S) {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

/// Work the engine asks the host to run later, from its own event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deferred {
    /// Recompute geometry for the dirty nodes of one root layout.
    Flush(LayoutKey),
    /// A newly created window has had time to settle its initial geometry.
    Settle(WindowId),
    /// Stop treating a window as grabbed after its drag ended.
    ReleaseGrab(WindowId),
}

pub trait Host {
    fn frame_rect(&self, window: WindowId) -> Option<Rect>;
    fn move_resize_frame(&mut self, window: WindowId, rect: Rect);

    fn is_maximized(&self, window: WindowId) -> bool;
    fn maximize(&mut self, window: WindowId);
    fn unmaximize(&mut self, window: WindowId);
    fn allows_resize(&self, window: WindowId) -> bool;

    fn focus(&mut self, window: WindowId, timestamp: u64);
    fn raise(&mut self, window: WindowId);
    fn lower(&mut self, window: WindowId);
    fn make_above(&mut self, window: WindowId);
    fn unmake_above(&mut self, window: WindowId);

    fn transient_for(&self, window: WindowId) -> Option<WindowId>;
    fn monitor_of(&self, window: WindowId) -> MonitorId;
    /// `None` while the window is not placed on any workspace yet.
    fn workspace_of(&self, window: WindowId) -> Option<WorkspaceId>;
    fn is_on_all_workspaces(&self, window: WindowId) -> bool;

    fn focused_window(&self) -> Option<WindowId>;
    fn active_workspace(&self) -> WorkspaceId;
    fn primary_monitor(&self) -> MonitorId;
    fn work_area(&self, workspace: WorkspaceId, monitor: MonitorId) -> Rect;
    /// Windows of a workspace in stacking order, topmost first.
    fn windows_on_workspace(&self, workspace: WorkspaceId) -> Vec<WindowId>;
    fn current_time(&self) -> u64;

    /// Runs `task` after `delay` by calling back into the registry. A zero
    /// delay means the next turn of the host's event loop.
    fn schedule(&mut self, delay: Duration, task: Deferred);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grab_directions_follow_dragged_edges() {
        let op = GrabOp::RESIZING_N | GrabOp::RESIZING_E;
        assert!(op.is_resizing());
        assert_eq!(op.horizontal_direction(), Some(Direction::Right));
        assert_eq!(op.vertical_direction(), Some(Direction::Up));

        let op = GrabOp::RESIZING_W | GrabOp::KEYBOARD;
        assert_eq!(op.horizontal_direction(), Some(Direction::Left));
        assert_eq!(op.vertical_direction(), None);
    }

    #[test]
    fn moving_grab_has_no_direction() {
        assert!(!GrabOp::MOVING.is_resizing());
        assert_eq!(GrabOp::MOVING.horizontal_direction(), None);
        assert_eq!(GrabOp::MOVING.vertical_direction(), None);
    }
}
