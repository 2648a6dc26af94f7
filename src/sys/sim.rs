//! An in-memory [`Host`], used by the tests and by `tiler simulate`.
//!
//! Requests the engine makes are applied to the simulated windows and logged,
//! and scheduled work is queued until [`SimulatedHost::run_pending`] drains it.

use std::cell::Cell;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::geometry::Rect;
use super::host::{Deferred, GrabOp, Host, MonitorId, WindowId, WorkspaceId};
use crate::common::collections::HashMap;
use crate::common::config::Settings;
use crate::layout_engine::{LayoutCommand, LayoutRegistry, WindowEvent, WindowMode};

/// Upper bound on timers run by one drain, to stop runaway rescheduling.
const MAX_TIMERS_PER_DRAIN: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SimWindow {
    pub frame: Rect,
    pub maximized: bool,
    pub resizable: bool,
    pub transient_for: Option<WindowId>,
    pub monitor: MonitorId,
    pub workspace: Option<WorkspaceId>,
    pub all_workspaces: bool,
    pub above: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostRequest {
    MoveResize(WindowId, Rect),
    Maximize(WindowId),
    Unmaximize(WindowId),
    Focus(WindowId),
    Raise(WindowId),
    Lower(WindowId),
    MakeAbove(WindowId),
    UnmakeAbove(WindowId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    pub delay: Duration,
    pub task: Deferred,
}

#[derive(Debug)]
pub struct SimulatedHost {
    windows: HashMap<WindowId, SimWindow>,
    /// Topmost first.
    stack: Vec<WindowId>,
    focused: Option<WindowId>,
    active_workspace: WorkspaceId,
    primary_monitor: MonitorId,
    work_areas: HashMap<MonitorId, Rect>,
    clock: Cell<u64>,
    requests: Vec<HostRequest>,
    timers: Vec<Timer>,
}

impl Default for SimulatedHost {
    fn default() -> Self { SimulatedHost::new() }
}

impl SimulatedHost {
    /// A host with one 1000x800 monitor and workspace 0 active.
    pub fn new() -> Self {
        let primary = MonitorId(0);
        let mut work_areas = HashMap::default();
        work_areas.insert(primary, Rect::new(0.0, 0.0, 1000.0, 800.0));
        SimulatedHost {
            windows: HashMap::default(),
            stack: Vec::new(),
            focused: None,
            active_workspace: WorkspaceId(0),
            primary_monitor: primary,
            work_areas,
            clock: Cell::new(0),
            requests: Vec::new(),
            timers: Vec::new(),
        }
    }

    pub fn with_monitor(mut self, monitor: MonitorId, work_area: Rect) -> Self {
        self.work_areas.insert(monitor, work_area);
        self
    }

    /// Adds a resizable window on the primary monitor and the active
    /// workspace, on top of the stack.
    pub fn add_window(&mut self, window: WindowId, frame: Rect) -> &mut SimWindow {
        self.stack.retain(|&w| w != window);
        self.stack.insert(0, window);
        let sim = SimWindow {
            frame,
            maximized: false,
            resizable: true,
            transient_for: None,
            monitor: self.primary_monitor,
            workspace: Some(self.active_workspace),
            all_workspaces: false,
            above: false,
        };
        self.windows.entry(window).insert_entry(sim).into_mut()
    }

    pub fn remove_window(&mut self, window: WindowId) -> Option<SimWindow> {
        self.stack.retain(|&w| w != window);
        if self.focused == Some(window) {
            self.focused = None;
        }
        self.windows.remove(&window)
    }

    pub fn window(&self, window: WindowId) -> Option<&SimWindow> { self.windows.get(&window) }

    pub fn window_mut(&mut self, window: WindowId) -> Option<&mut SimWindow> {
        self.windows.get_mut(&window)
    }

    pub fn frame(&self, window: WindowId) -> Option<Rect> { self.window(window).map(|w| w.frame) }

    /// Changes a frame the way a user would, without logging a request.
    pub fn set_frame(&mut self, window: WindowId, frame: Rect) {
        if let Some(sim) = self.windows.get_mut(&window) {
            sim.frame = frame;
        }
    }

    pub fn set_focus(&mut self, window: WindowId) { self.focused = Some(window); }

    /// Stacking order, topmost first.
    pub fn stack(&self) -> &[WindowId] { &self.stack }

    pub fn requests(&self) -> &[HostRequest] { &self.requests }

    pub fn take_requests(&mut self) -> Vec<HostRequest> { std::mem::take(&mut self.requests) }

    pub fn timers(&self) -> &[Timer] { &self.timers }

    pub fn take_timers(&mut self) -> Vec<Timer> { std::mem::take(&mut self.timers) }

    /// Runs queued work that is due within `horizon`, including work it
    /// schedules in turn. Returns how many timers ran.
    pub fn run_due(&mut self, registry: &mut LayoutRegistry, horizon: Duration) -> usize {
        let mut ran = 0;
        while let Some(index) = self.next_due(horizon) {
            if ran == MAX_TIMERS_PER_DRAIN {
                warn!(pending = self.timers.len(), "Timer drain limit reached");
                break;
            }
            let timer = self.timers.remove(index);
            trace!(?timer, "Running timer");
            registry.run_deferred(self, timer.task);
            ran += 1;
        }
        ran
    }

    /// Runs every queued timer, however long its delay.
    pub fn run_pending(&mut self, registry: &mut LayoutRegistry) -> usize {
        self.run_due(registry, Duration::MAX)
    }

    fn next_due(&self, horizon: Duration) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.delay <= horizon)
            .min_by_key(|(_, t)| t.delay)
            .map(|(index, _)| index)
    }

    fn move_in_stack(&mut self, window: WindowId, top: bool) {
        if !self.stack.contains(&window) {
            return;
        }
        self.stack.retain(|&w| w != window);
        if top {
            self.stack.insert(0, window);
        } else {
            self.stack.push(window);
        }
    }
}

impl Host for SimulatedHost {
    fn frame_rect(&self, window: WindowId) -> Option<Rect> { self.frame(window) }

    fn move_resize_frame(&mut self, window: WindowId, rect: Rect) {
        self.requests.push(HostRequest::MoveResize(window, rect));
        self.set_frame(window, rect);
    }

    fn is_maximized(&self, window: WindowId) -> bool {
        self.window(window).is_some_and(|w| w.maximized)
    }

    fn maximize(&mut self, window: WindowId) {
        self.requests.push(HostRequest::Maximize(window));
        if let Some(sim) = self.windows.get_mut(&window) {
            sim.maximized = true;
        }
    }

    fn unmaximize(&mut self, window: WindowId) {
        self.requests.push(HostRequest::Unmaximize(window));
        if let Some(sim) = self.windows.get_mut(&window) {
            sim.maximized = false;
        }
    }

    fn allows_resize(&self, window: WindowId) -> bool {
        self.window(window).is_some_and(|w| w.resizable)
    }

    fn focus(&mut self, window: WindowId, _timestamp: u64) {
        self.requests.push(HostRequest::Focus(window));
        self.focused = Some(window);
    }

    fn raise(&mut self, window: WindowId) {
        self.requests.push(HostRequest::Raise(window));
        self.move_in_stack(window, true);
    }

    fn lower(&mut self, window: WindowId) {
        self.requests.push(HostRequest::Lower(window));
        self.move_in_stack(window, false);
    }

    fn make_above(&mut self, window: WindowId) {
        self.requests.push(HostRequest::MakeAbove(window));
        if let Some(sim) = self.windows.get_mut(&window) {
            sim.above = true;
        }
    }

    fn unmake_above(&mut self, window: WindowId) {
        self.requests.push(HostRequest::UnmakeAbove(window));
        if let Some(sim) = self.windows.get_mut(&window) {
            sim.above = false;
        }
    }

    fn transient_for(&self, window: WindowId) -> Option<WindowId> {
        self.window(window)?.transient_for
    }

    fn monitor_of(&self, window: WindowId) -> MonitorId {
        self.window(window).map_or(self.primary_monitor, |w| w.monitor)
    }

    fn workspace_of(&self, window: WindowId) -> Option<WorkspaceId> { self.window(window)?.workspace }

    fn is_on_all_workspaces(&self, window: WindowId) -> bool {
        self.window(window).is_some_and(|w| w.all_workspaces)
    }

    fn focused_window(&self) -> Option<WindowId> { self.focused }

    fn active_workspace(&self) -> WorkspaceId { self.active_workspace }

    fn primary_monitor(&self) -> MonitorId { self.primary_monitor }

    fn work_area(&self, _workspace: WorkspaceId, monitor: MonitorId) -> Rect {
        self.work_areas
            .get(&monitor)
            .or_else(|| self.work_areas.get(&self.primary_monitor))
            .copied()
            .unwrap_or_default()
    }

    fn windows_on_workspace(&self, workspace: WorkspaceId) -> Vec<WindowId> {
        self.stack
            .iter()
            .copied()
            .filter(|&w| {
                self.window(w)
                    .is_some_and(|sim| sim.all_workspaces || sim.workspace == Some(workspace))
            })
            .collect()
    }

    fn current_time(&self) -> u64 {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        now
    }

    fn schedule(&mut self, delay: Duration, task: Deferred) {
        self.timers.push(Timer { delay, task });
    }
}

/// A monitor in a [`Scenario`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorSpec {
    pub id: MonitorId,
    pub work_area: Rect,
}

/// A window opened by a [`Step::Open`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub id: WindowId,
    pub frame: Rect,
    #[serde(default = "yes")]
    pub resizable: bool,
    #[serde(default)]
    pub transient_for: Option<WindowId>,
    #[serde(default)]
    pub monitor: Option<MonitorId>,
    #[serde(default)]
    pub all_workspaces: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Creates the window, focuses it and lets it settle.
    Open(WindowSpec),
    Close(WindowId),
    Focus(WindowId),
    Command(LayoutCommand),
    /// Drags with `op` until the window's frame is `to`, then releases.
    Drag { window: WindowId, op: GrabOp, to: Rect },
    /// Moves the window to another monitor.
    SendToMonitor { window: WindowId, monitor: MonitorId },
    /// Any raw event, for cases the other steps do not cover.
    Event(WindowEvent),
}

/// A scripted session, read from RON by `tiler simulate`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Scenario {
    #[serde(default)]
    pub monitors: Vec<MonitorSpec>,
    pub steps: Vec<Step>,
}

/// Final state of one window after a scenario.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub window: WindowId,
    pub mode: Option<WindowMode>,
    pub frame: Rect,
}

impl Scenario {
    pub fn parse(buf: &str) -> anyhow::Result<Scenario> { Ok(ron::from_str(buf)?) }

    /// Plays every step, draining scheduled work after each one.
    pub fn run(&self, settings: Settings) -> (SimulatedHost, LayoutRegistry) {
        let mut host = SimulatedHost::new();
        for monitor in &self.monitors {
            host.work_areas.insert(monitor.id, monitor.work_area);
        }
        let mut registry = LayoutRegistry::new(settings);
        for step in &self.steps {
            trace!(?step, "Scenario step");
            host.apply(&mut registry, step);
            host.run_pending(&mut registry);
        }
        (host, registry)
    }
}

impl SimulatedHost {
    fn apply(&mut self, registry: &mut LayoutRegistry, step: &Step) {
        match *step {
            Step::Open(ref spec) => {
                let primary = self.primary_monitor;
                let sim = self.add_window(spec.id, spec.frame);
                sim.resizable = spec.resizable;
                sim.transient_for = spec.transient_for;
                sim.monitor = spec.monitor.unwrap_or(primary);
                sim.all_workspaces = spec.all_workspaces;
                registry.handle_event(self, WindowEvent::Created(spec.id));
                self.run_pending(registry);
                self.set_focus(spec.id);
                registry.handle_event(self, WindowEvent::Focused(spec.id));
            }
            Step::Close(window) => {
                self.remove_window(window);
                registry.handle_event(self, WindowEvent::Destroyed(window));
            }
            Step::Focus(window) => {
                self.set_focus(window);
                registry.handle_event(self, WindowEvent::Focused(window));
            }
            Step::Command(command) => {
                registry.handle_command(self, command);
            }
            Step::Drag { window, op, to } => {
                registry.handle_event(self, WindowEvent::GrabBegin { window, op });
                self.set_frame(window, to);
                let event = if op.is_resizing() {
                    WindowEvent::SizeChanged(window)
                } else {
                    WindowEvent::PositionChanged(window)
                };
                registry.handle_event(self, event);
                registry.handle_event(self, WindowEvent::GrabEnd(window));
            }
            Step::SendToMonitor { window, monitor } => {
                if let Some(sim) = self.windows.get_mut(&window) {
                    sim.monitor = monitor;
                }
                registry.handle_event(self, WindowEvent::EnteredMonitor(window));
            }
            Step::Event(event) => registry.handle_event(self, event),
        }
    }

    /// Frames of every window, with the mode the registry gave it.
    pub fn report(&self, registry: &LayoutRegistry) -> Vec<WindowReport> {
        let mut report: Vec<_> = self
            .windows
            .iter()
            .map(|(&window, sim)| WindowReport {
                window,
                mode: registry.window_mode(window),
                frame: sim.frame,
            })
            .collect();
        report.sort_by_key(|r| r.window);
        report
    }
}

fn yes() -> bool { true }
