mod error;
pub(crate) mod graph;
mod layout;
mod movement;
mod registry;
mod resize;
mod root;
mod update;
mod window;

pub use error::LayoutError;
pub use graph::{Direction, LayoutKind, Orientation};
pub use layout::{LayoutOps, SplitChild, SplitLayout, StackingLayout, TilingLayout};
pub use movement::FocusMode;
pub use registry::{
    LayoutCommand, LayoutKey, LayoutRegistry, MonitorSlot, TrackedWindow, WindowEvent,
    WorkspaceSlot,
};
pub use root::{LayoutConfig, RootLayout};
pub use update::DirtySet;
pub use window::{ManagedWindow, WindowMode};
