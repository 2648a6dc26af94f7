use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::tree::NodeId;
use crate::sys::geometry::Rect;
use crate::sys::host::GrabOp;

#[derive(
    Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Tiling,
    Floating,
}

/// Tiling state of one window inside a root layout.
///
/// `node` is set exactly when `mode` is [`WindowMode::Tiling`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedWindow {
    pub mode: WindowMode,
    pub node: Option<NodeId>,
    /// Geometry from before the window was tiled, applied again when it floats.
    pub restore_rect: Option<Rect>,
    /// Whether the window was maximized before it was tiled.
    pub restore_maximized: bool,
    /// Active interactive grab, kept until shortly after the grab ends.
    pub grab: Option<GrabOp>,
}

impl ManagedWindow {
    pub fn floating() -> Self {
        ManagedWindow {
            mode: WindowMode::Floating,
            node: None,
            restore_rect: None,
            restore_maximized: false,
            grab: None,
        }
    }

    pub fn is_tiling(&self) -> bool { self.mode == WindowMode::Tiling }
}
