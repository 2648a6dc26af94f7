//! Root layouts for every workspace and monitor, and the event and command
//! entry points the host drives.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, trace, warn};

use super::error::LayoutError;
use super::graph::Direction;
use super::movement::FocusMode;
use super::root::{LayoutConfig, RootLayout};
use super::window::WindowMode;
use crate::common::collections::{HashMap, HashSet};
use crate::common::config::Settings;
use crate::sys::geometry::Rect;
use crate::sys::host::{Deferred, GrabOp, Host, MonitorId, WindowId, WorkspaceId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceSlot {
    /// Windows shown on every workspace.
    All,
    Workspace(WorkspaceId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorSlot {
    Primary,
    Secondary(MonitorId),
}

/// Identifies one root layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayoutKey {
    pub workspace: WorkspaceSlot,
    pub monitor: MonitorSlot,
}

impl LayoutKey {
    pub fn primary_all() -> Self {
        LayoutKey {
            workspace: WorkspaceSlot::All,
            monitor: MonitorSlot::Primary,
        }
    }

    /// The root a window belongs in right now, or `None` while it has no
    /// workspace.
    pub fn for_window(host: &dyn Host, window: WindowId) -> Option<LayoutKey> {
        let workspace = if host.is_on_all_workspaces(window) {
            WorkspaceSlot::All
        } else {
            WorkspaceSlot::Workspace(host.workspace_of(window)?)
        };
        let monitor = host.monitor_of(window);
        let monitor = if monitor == host.primary_monitor() {
            MonitorSlot::Primary
        } else {
            MonitorSlot::Secondary(monitor)
        };
        Some(LayoutKey { workspace, monitor })
    }

    fn work_area(self, host: &dyn Host) -> Rect {
        let workspace = match self.workspace {
            WorkspaceSlot::All => host.active_workspace(),
            WorkspaceSlot::Workspace(id) => id,
        };
        let monitor = match self.monitor {
            MonitorSlot::Primary => host.primary_monitor(),
            MonitorSlot::Secondary(id) => id,
        };
        host.work_area(workspace, monitor)
    }
}

/// Notifications from the host about one window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WindowEvent {
    Created(WindowId),
    Shown(WindowId),
    Destroyed(WindowId),
    WorkspaceChanged(WindowId),
    EnteredMonitor(WindowId),
    Focused(WindowId),
    PositionChanged(WindowId),
    SizeChanged(WindowId),
    GrabBegin { window: WindowId, op: GrabOp },
    GrabEnd(WindowId),
}

/// User intents, applied to the focused window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutCommand {
    FocusDirection(Direction),
    /// Scroll input: only cycles through stacking layouts.
    ScrollFocus(Direction),
    MoveWindow(Direction),
    ToggleFloating,
    ToggleFloatingFocus,
}

/// What the registry remembers about a window across roots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedWindow {
    pub root: Option<LayoutKey>,
    /// Mode the window had the last time it was managed, reused when it lands
    /// in another root.
    pub last_mode: Option<WindowMode>,
    /// Set once the initial geometry had time to settle.
    pub settled: bool,
}

pub struct LayoutRegistry {
    settings: Settings,
    roots: HashMap<LayoutKey, RootLayout>,
    windows: HashMap<WindowId, TrackedWindow>,
}

impl LayoutRegistry {
    pub fn new(settings: Settings) -> Self {
        LayoutRegistry {
            settings,
            roots: HashMap::default(),
            windows: HashMap::default(),
        }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn root(&self, key: LayoutKey) -> Option<&RootLayout> { self.roots.get(&key) }

    pub fn root_of(&self, window: WindowId) -> Option<&RootLayout> {
        self.roots.get(&self.windows.get(&window)?.root?)
    }

    pub fn tracked(&self, window: WindowId) -> Option<&TrackedWindow> { self.windows.get(&window) }

    pub fn window_mode(&self, window: WindowId) -> Option<WindowMode> {
        self.root_of(window)?.window_mode(window)
    }

    /// Keys of every root, in a stable order.
    pub fn keys(&self) -> Vec<LayoutKey> {
        let mut keys: Vec<_> = self.roots.keys().copied().collect();
        keys.sort();
        keys
    }

    #[instrument(skip(self, host))]
    pub fn handle_event(&mut self, host: &mut dyn Host, event: WindowEvent) {
        if let Err(err) = self.dispatch_event(host, event) {
            error!(?event, %err, "Failed to handle window event");
        }
    }

    fn dispatch_event(&mut self, host: &mut dyn Host, event: WindowEvent) -> Result<(), LayoutError> {
        match event {
            WindowEvent::Created(window) => {
                self.windows.entry(window).or_default();
                let delay = Duration::from_millis(self.settings.timing.settle_delay_ms);
                host.schedule(delay, Deferred::Settle(window));
            }
            WindowEvent::Shown(window)
            | WindowEvent::WorkspaceChanged(window)
            | WindowEvent::EnteredMonitor(window) => {
                if self.windows.get(&window).is_some_and(|t| t.settled) {
                    self.update_window(host, window)?;
                }
            }
            WindowEvent::Destroyed(window) => self.forget_window(host, window)?,
            WindowEvent::Focused(window) => {
                if let Some(root) = self.root_of_mut(window) {
                    root.on_window_focus(host, window);
                }
            }
            WindowEvent::PositionChanged(window) => {
                if let Some(root) = self.root_of_mut(window) {
                    root.on_window_position_changed(host, window)?;
                }
            }
            WindowEvent::SizeChanged(window) => {
                if let Some(root) = self.root_of_mut(window) {
                    root.on_window_size_changed(host, window)?;
                }
            }
            WindowEvent::GrabBegin { window, op } => {
                if let Some(root) = self.root_of_mut(window) {
                    root.on_grab_begin(host, window, op)?;
                }
            }
            WindowEvent::GrabEnd(window) => {
                let delay = Duration::from_millis(self.settings.timing.grab_release_delay_ms);
                if let Some(root) = self.root_of_mut(window) {
                    root.on_drag_end(host, window, delay);
                }
            }
        }
        Ok(())
    }

    /// Runs work the host scheduled on our behalf.
    #[instrument(skip(self, host))]
    pub fn run_deferred(&mut self, host: &mut dyn Host, task: Deferred) {
        let result = match task {
            Deferred::Flush(key) => match self.roots.get_mut(&key) {
                Some(root) => root.flush(host),
                None => Ok(()),
            },
            Deferred::Settle(window) => match self.windows.get_mut(&window) {
                Some(tracked) => {
                    tracked.settled = true;
                    self.update_window(host, window)
                }
                None => Ok(()),
            },
            Deferred::ReleaseGrab(window) => match self.root_of_mut(window) {
                Some(root) => root.release_grab(host, window),
                None => Ok(()),
            },
        };
        if let Err(err) = result {
            error!(?task, %err, "Deferred task failed");
        }
    }

    /// Applies `command` to the focused window. Returns true if anything
    /// changed.
    #[instrument(skip(self, host))]
    pub fn handle_command(&mut self, host: &mut dyn Host, command: LayoutCommand) -> bool {
        match self.dispatch_command(host, command) {
            Ok(done) => done,
            Err(err) => {
                error!(?command, %err, "Failed to handle command");
                false
            }
        }
    }

    fn dispatch_command(
        &mut self,
        host: &mut dyn Host,
        command: LayoutCommand,
    ) -> Result<bool, LayoutError> {
        if command == LayoutCommand::ToggleFloatingFocus {
            return Ok(self.toggle_floating_focus(host));
        }
        let Some(focused) = host.focused_window() else {
            trace!("No focused window");
            return Ok(false);
        };
        let window = self.transient_root(host, focused);
        let Some(key) = self.windows.get(&window).and_then(|t| t.root) else {
            trace!(?window, "Focused window is not managed");
            return Ok(false);
        };
        let Some(root) = self.roots.get_mut(&key) else {
            return Ok(false);
        };
        match command {
            LayoutCommand::FocusDirection(direction) => {
                root.focus_direction(host, window, direction, FocusMode::All)
            }
            LayoutCommand::ScrollFocus(direction) => {
                root.focus_direction(host, window, direction, FocusMode::StackingOnly)
            }
            LayoutCommand::MoveWindow(direction) => root.move_window(host, window, direction),
            LayoutCommand::ToggleFloating => {
                let mode = root.toggle_floating(host, window)?;
                if let Some(tracked) = self.windows.get_mut(&window) {
                    tracked.last_mode = Some(mode);
                }
                debug!(?window, ?mode, "Toggled floating");
                Ok(true)
            }
            LayoutCommand::ToggleFloatingFocus => Ok(false),
        }
    }

    /// Follows the transient-for chain of `window` to its top.
    pub fn transient_root(&self, host: &dyn Host, window: WindowId) -> WindowId {
        let mut seen = HashSet::default();
        let mut current = window;
        while let Some(parent) = host.transient_for(current) {
            if !seen.insert(current) {
                warn!(?window, "Transient chain loops");
                break;
            }
            current = parent;
        }
        current
    }

    /// Puts `window` into the root it belongs in now, moving it out of the
    /// previous one if needed.
    #[instrument(skip(self, host))]
    pub fn update_window(&mut self, host: &mut dyn Host, window: WindowId) -> Result<(), LayoutError> {
        let key = LayoutKey::for_window(host, window);
        let Some(tracked) = self.windows.get(&window) else {
            return Ok(());
        };
        let old = tracked.root;
        if old.is_some() && old == key {
            return Ok(());
        }

        let mut last_mode = tracked.last_mode;
        if let Some(old) = old.and_then(|k| self.roots.get_mut(&k)) {
            if let Some(mode) = old.remove_window(host, window)? {
                last_mode = Some(mode);
            }
        }
        let mode = match key {
            Some(key) => Some(self.root_mut(host, key).insert_window(host, window, last_mode)?),
            None => None,
        };
        debug!(?window, from = ?old, to = ?key, ?mode, "Placed window");
        if let Some(tracked) = self.windows.get_mut(&window) {
            tracked.root = key;
            tracked.last_mode = mode.or(last_mode);
        }
        Ok(())
    }

    fn forget_window(&mut self, host: &mut dyn Host, window: WindowId) -> Result<(), LayoutError> {
        let Some(tracked) = self.windows.remove(&window) else {
            return Ok(());
        };
        if let Some(root) = tracked.root.and_then(|k| self.roots.get_mut(&k)) {
            root.remove_window(host, window)?;
        }
        Ok(())
    }

    /// Raises every floating window of the active workspace above the tiled
    /// ones and focuses the topmost, or, if a floating window already covers
    /// a tiled one on some monitor, lowers them all and focuses the topmost
    /// tiled window. Transient windows are left alone. Returns true if any
    /// floating window was found.
    pub fn toggle_floating_focus(&mut self, host: &mut dyn Host) -> bool {
        let windows: Vec<_> = host
            .windows_on_workspace(host.active_workspace())
            .into_iter()
            .filter(|&w| host.transient_for(w).is_none())
            .map(|w| (w, self.window_mode(w)))
            .collect();
        let floating: Vec<WindowId> = windows
            .iter()
            .filter(|(_, mode)| *mode == Some(WindowMode::Floating))
            .map(|(w, _)| *w)
            .collect();
        if floating.is_empty() {
            return false;
        }

        if floating_covers_tiled(host, &windows) {
            debug!(count = floating.len(), "Lowering floating windows");
            for &(window, _) in windows.iter().rev() {
                host.unmake_above(window);
            }
            for &window in &floating {
                host.lower(window);
            }
            let tiled = windows.iter().find(|(_, mode)| *mode == Some(WindowMode::Tiling));
            if let Some(&(window, _)) = tiled {
                let time = host.current_time();
                host.focus(window, time);
            }
        } else {
            debug!(count = floating.len(), "Raising floating windows");
            for &window in floating.iter().rev() {
                host.make_above(window);
                host.raise(window);
            }
            let time = host.current_time();
            host.focus(floating[0], time);
        }
        true
    }

    /// Every root's tree, one after the other.
    pub fn debug_tree(&self) -> String {
        let mut out = String::new();
        for key in self.keys() {
            if let Some(root) = self.roots.get(&key) {
                out.push_str(&format!("{key:?}\n{}", root.draw_tree()));
            }
        }
        out
    }

    fn root_of_mut(&mut self, window: WindowId) -> Option<&mut RootLayout> {
        let key = self.windows.get(&window)?.root?;
        self.roots.get_mut(&key)
    }

    fn root_mut(&mut self, host: &dyn Host, key: LayoutKey) -> &mut RootLayout {
        let layout = &self.settings.layout;
        self.roots.entry(key).or_insert_with(|| {
            let config = LayoutConfig {
                default_layout: layout.default_layout,
                default_window_state: layout.default_window_state,
                gap_size: layout.gap_size,
                stack_offset: layout.stack_offset,
                root_rect: key.work_area(host),
            };
            debug!(?key, rect = ?config.root_rect, "Created root layout");
            RootLayout::new(key, config)
        })
    }
}

/// Whether, on any monitor, a floating window is stacked above a tiled one.
/// `windows` is in stacking order, topmost first.
fn floating_covers_tiled(host: &dyn Host, windows: &[(WindowId, Option<WindowMode>)]) -> bool {
    let mut seen_floating: HashSet<MonitorId> = HashSet::default();
    for &(window, mode) in windows {
        let monitor = host.monitor_of(window);
        match mode {
            Some(WindowMode::Floating) => {
                seen_floating.insert(monitor);
            }
            Some(WindowMode::Tiling) if seen_floating.contains(&monitor) => return true,
            _ => {}
        }
    }
    false
}
