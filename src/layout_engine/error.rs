use thiserror::Error;

use super::graph::{Direction, LayoutKind};
use crate::model::tree::NodeId;
use crate::sys::geometry::Rect;
use crate::sys::host::WindowId;

/// A broken precondition inside the layout tree.
///
/// These are never expected during normal operation. "Nothing to do" outcomes
/// are reported as `Ok(false)` instead.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Node not found: {0:?}")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is a window, expected a layout")]
    NotALayout(NodeId),

    #[error("Node {0:?} is not a child of its layout")]
    ChildNotFound(NodeId),

    #[error("Node {0:?} has no parent")]
    Detached(NodeId),

    #[error("{kind} layout does not support direction {direction}")]
    UnsupportedDirection { kind: LayoutKind, direction: Direction },

    #[error("Stacking layouts can only hold windows, got layout {0:?}")]
    NestedInStacking(NodeId),

    #[error("Layout has no rectangle yet")]
    MissingGeometry,

    #[error("Computed geometry is not finite: {0:?}")]
    InvalidGeometry(Rect),

    #[error("Resize delta is not finite: {0}")]
    InvalidResize(f64),

    #[error("Window not managed by this layout: {0:?}")]
    UnknownWindow(WindowId),
}
