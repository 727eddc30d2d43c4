//! Keeps the emulation engine's run state consistent with the host lifecycle.
//!
//! ```text
//!   HostResumed(true) ──┐
//!   SurfaceReady(true) ─┼─> try_running ──> startup | resume | nothing
//!   OverlayClosed ──────┘
//!
//!   HostResumed(false) ─┐
//!   SurfaceReady(false) ┼─> try_pausing ──> pause | nothing
//!   OverlayOpened ──────┘
//!
//!   ExitRequested ──> (modal) ──> ConfirmationResolved
//!                                   ├─ yes: pause+save ─> record ─> shutdown
//!                                   └─ no:  try_running
//! ```
//!
//! [`transition`] is a pure function of the previous snapshot, the event and a
//! fresh [`Observation`] of the engine. [`LifecycleMachine`] takes that
//! observation immediately before every call and never carries run state from
//! one event to the next.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::autosave::AutoSaveRotation;
use crate::controller::{AccessoryKind, PlayerIndex};
use crate::core_proxy::{CoreProxy, RunState};

/// Speed the core runs at when not fast-forwarding, in percent.
pub const NORMAL_SPEED: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Exit,
    Restart,
}

/// In-session requests that map onto a single core command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Alternates between normal speed and the configured fast speed.
    ToggleSpeed,
    SetSpeed(u32),
    SetSlot(u32),
    ToggleFrameLimiter,
    AdvanceFrame,
    SetAccessory {
        player: PlayerIndex,
        kind: AccessoryKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    HostResumed(bool),
    SurfaceReady(bool),
    FocusChanged(bool),
    /// The rendering context finished (re)creating its resources.
    RenderContextReady,
    OverlayOpened,
    OverlayClosed,
    ModalPending(bool),
    ExitRequested,
    RestartRequested,
    ConfirmationResolved {
        kind: ConfirmationKind,
        confirmed: bool,
    },
    MenuKey,
    BackKey,
    Action(SessionAction),
}

/// Side effects requested by a transition, in the order they must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Startup { auto_save: Option<PathBuf> },
    Resume,
    Pause {
        force_auto_save: bool,
        save_path: Option<PathBuf>,
    },
    RecordAutoSave(PathBuf),
    Shutdown,
    Restart,
    AdvanceFrame,
    SetSpeed(u32),
    SetSlot(u32),
    ToggleFrameLimiter,
    SetAccessory {
        player: PlayerIndex,
        kind: AccessoryKind,
    },
    RequestConfirmation(ConfirmationKind),
    OpenOverlay,
    DismissOverlay,
    /// The session is over; the host should close.
    Finish,
}

/// Whether a cold start waits for the game to be visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColdStartPolicy {
    /// Start only once the host is resumed and the surface is ready.
    #[default]
    AwaitVisible,
    /// Start as soon as any reconciliation sees an unstarted engine.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub cold_start: ColdStartPolicy,
    /// Skip restoring the latest auto-save on cold start.
    pub fresh_start: bool,
    pub fast_speed: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cold_start: ColdStartPolicy::default(),
            fresh_start: false,
            fast_speed: 250,
        }
    }
}

/// Run command issued but not yet observed in a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Startup,
    Resume,
    Pause,
}

/// Host-side state owned by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub host_resumed: bool,
    pub surface_ready: bool,
    pub modal_pending: bool,
    pub overlay_open: bool,
    awaiting_first_focus: bool,
    in_flight: Option<InFlight>,
    terminated: bool,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self {
            host_resumed: false,
            surface_ready: false,
            modal_pending: false,
            overlay_open: false,
            awaiting_first_focus: true,
            in_flight: None,
            terminated: false,
        }
    }
}

impl LifecycleSnapshot {
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn is_visible(&self) -> bool {
        self.host_resumed && self.surface_ready
    }

    /// The full guard for letting emulation run.
    pub fn may_run(&self) -> bool {
        self.is_visible() && !self.overlay_open && !self.modal_pending
    }

    /// Drops the in-flight marker once the poll shows its effect.
    fn settle(&mut self, polled: RunState) {
        let observed = match self.in_flight {
            Some(InFlight::Startup) => polled != RunState::Unknown,
            Some(InFlight::Resume) => polled == RunState::Running,
            Some(InFlight::Pause) => polled == RunState::Paused,
            None => false,
        };
        if observed {
            self.in_flight = None;
        }
    }

    /// The polled state adjusted for a resume or pause the engine has not
    /// applied yet. An engine that polls `Unknown` is taken at its word.
    fn effective(&self, polled: RunState) -> RunState {
        match (polled, self.in_flight) {
            (RunState::Unknown, _) => RunState::Unknown,
            (_, Some(InFlight::Resume)) => RunState::Running,
            (_, Some(InFlight::Pause)) => RunState::Paused,
            (_, Some(InFlight::Startup) | None) => polled,
        }
    }
}

/// What the machine knows about the outside world at the moment of a
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub run_state: RunState,
    pub render_context_ready: bool,
    pub speed: u32,
    pub latest_auto_save: Option<PathBuf>,
    pub exit_save_path: PathBuf,
}

struct Step<'a> {
    snap: LifecycleSnapshot,
    obs: &'a Observation,
    config: &'a MachineConfig,
    commands: Vec<Command>,
}

impl Step<'_> {
    fn try_running(&mut self) {
        match self.snap.effective(self.obs.run_state) {
            RunState::Unknown => {
                let allowed = match self.config.cold_start {
                    ColdStartPolicy::AwaitVisible => self.snap.is_visible(),
                    ColdStartPolicy::Immediate => true,
                };
                if self.snap.in_flight == Some(InFlight::Startup) {
                    debug!("Startup already sent; waiting for the engine");
                } else if allowed {
                    let auto_save = if self.config.fresh_start {
                        None
                    } else {
                        self.obs.latest_auto_save.clone()
                    };
                    self.commands.push(Command::Startup { auto_save });
                    self.snap.in_flight = Some(InFlight::Startup);
                }
            }
            RunState::Paused => {
                if self.snap.may_run() && self.obs.render_context_ready {
                    self.commands.push(Command::Resume);
                    self.snap.in_flight = Some(InFlight::Resume);
                }
            }
            RunState::Running => {}
        }
    }

    fn try_pausing(&mut self) {
        if self.snap.effective(self.obs.run_state) == RunState::Paused
            || self.snap.in_flight == Some(InFlight::Pause)
        {
            return;
        }
        self.commands.push(Command::Pause {
            force_auto_save: false,
            save_path: None,
        });
        self.snap.in_flight = Some(InFlight::Pause);
    }

    /// Pause with a forced auto-save, then hand the save to the rotation.
    ///
    /// An engine that polls `Unknown` has no state to save, so nothing is
    /// recorded and the existing slots stay untouched.
    fn save_for_teardown(&mut self) {
        let path = self.obs.exit_save_path.clone();
        self.commands.push(Command::Pause {
            force_auto_save: true,
            save_path: Some(path.clone()),
        });
        if self.obs.run_state == RunState::Unknown {
            debug!("Engine never started; not recording {}", path.display());
        } else {
            self.commands.push(Command::RecordAutoSave(path));
        }
        self.snap.in_flight = Some(InFlight::Pause);
    }

    fn exit(&mut self) {
        self.save_for_teardown();
        self.commands.push(Command::Shutdown);
        self.commands.push(Command::Finish);
        self.snap.in_flight = None;
        self.snap.terminated = true;
    }

    fn restart(&mut self) {
        self.save_for_teardown();
        self.commands.push(Command::Restart);
        if self.snap.overlay_open {
            self.commands.push(Command::DismissOverlay);
        } else {
            self.try_running();
        }
    }

    fn request_confirmation(&mut self, kind: ConfirmationKind) {
        if self.snap.modal_pending {
            debug!("{kind:?} requested while a confirmation is pending; ignoring");
            return;
        }
        self.snap.modal_pending = true;
        self.try_pausing();
        self.commands.push(Command::RequestConfirmation(kind));
    }

    fn resolve(&mut self, kind: ConfirmationKind, confirmed: bool) {
        if !self.snap.modal_pending {
            warn!("{kind:?} confirmation arrived with nothing pending; ignoring");
            return;
        }
        self.snap.modal_pending = false;
        match (kind, confirmed) {
            (ConfirmationKind::Exit, true) => self.exit(),
            (ConfirmationKind::Restart, true) => self.restart(),
            (_, false) if !self.snap.overlay_open => self.try_running(),
            (_, false) => {}
        }
    }

    fn action(&mut self, action: SessionAction) {
        let command = match action {
            SessionAction::ToggleSpeed => {
                if self.obs.speed == NORMAL_SPEED {
                    Command::SetSpeed(self.config.fast_speed)
                } else {
                    Command::SetSpeed(NORMAL_SPEED)
                }
            }
            SessionAction::SetSpeed(percent) => Command::SetSpeed(percent),
            SessionAction::SetSlot(slot) => Command::SetSlot(slot),
            SessionAction::ToggleFrameLimiter => Command::ToggleFrameLimiter,
            SessionAction::AdvanceFrame => Command::AdvanceFrame,
            SessionAction::SetAccessory { player, kind } => {
                Command::SetAccessory { player, kind }
            }
        };
        self.commands.push(command);
    }
}

/// Computes the next snapshot and the commands for `event`.
pub fn transition(
    snapshot: LifecycleSnapshot,
    event: &LifecycleEvent,
    obs: &Observation,
    config: &MachineConfig,
) -> (LifecycleSnapshot, Vec<Command>) {
    if snapshot.terminated {
        return (snapshot, Vec::new());
    }

    let mut step = Step {
        snap: snapshot,
        obs,
        config,
        commands: Vec::new(),
    };
    step.snap.settle(obs.run_state);

    match *event {
        LifecycleEvent::HostResumed(true) => {
            step.snap.host_resumed = true;
            step.try_running();
        }
        LifecycleEvent::HostResumed(false) => {
            step.snap.host_resumed = false;
            step.try_pausing();
        }
        LifecycleEvent::SurfaceReady(true) => {
            step.snap.surface_ready = true;
            step.try_running();
        }
        LifecycleEvent::SurfaceReady(false) => {
            step.snap.surface_ready = false;
            step.try_pausing();
        }
        LifecycleEvent::FocusChanged(gained) => {
            // Only the first focus of a session starts anything; later focus
            // changes come from dialogs and menus over the game.
            if gained && step.snap.awaiting_first_focus {
                step.snap.awaiting_first_focus = false;
                step.try_running();
            }
        }
        LifecycleEvent::RenderContextReady => {
            if step.snap.may_run() {
                step.try_running();
            } else if step.snap.effective(obs.run_state) == RunState::Paused {
                // Draw one frame so the surface is not left black.
                step.commands.push(Command::AdvanceFrame);
            }
        }
        LifecycleEvent::OverlayOpened => {
            step.snap.overlay_open = true;
            step.try_pausing();
        }
        LifecycleEvent::OverlayClosed => {
            step.snap.overlay_open = false;
            step.try_running();
        }
        LifecycleEvent::ModalPending(pending) => {
            step.snap.modal_pending = pending;
            if !pending {
                step.try_running();
            }
        }
        LifecycleEvent::ExitRequested => step.request_confirmation(ConfirmationKind::Exit),
        LifecycleEvent::RestartRequested => step.request_confirmation(ConfirmationKind::Restart),
        LifecycleEvent::ConfirmationResolved { kind, confirmed } => step.resolve(kind, confirmed),
        LifecycleEvent::MenuKey => {
            let command = if step.snap.overlay_open {
                Command::DismissOverlay
            } else {
                Command::OpenOverlay
            };
            step.commands.push(command);
        }
        LifecycleEvent::BackKey => {
            if step.snap.overlay_open {
                step.commands.push(Command::DismissOverlay);
            } else {
                step.request_confirmation(ConfirmationKind::Exit);
            }
        }
        LifecycleEvent::Action(action) => step.action(action),
    }

    (step.snap, step.commands)
}

/// "Is the rendering context usable" flag shared with the render thread.
#[derive(Debug, Clone, Default)]
pub struct RenderContext(Arc<AtomicBool>);

impl RenderContext {
    pub fn new(ready: bool) -> Self {
        Self(Arc::new(AtomicBool::new(ready)))
    }

    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn mark_lost(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stateful wrapper around [`transition`] that performs the mandatory poll.
///
/// Event handlers must not be called concurrently; the machine does no
/// locking of its own.
#[derive(Debug)]
pub struct LifecycleMachine {
    snapshot: LifecycleSnapshot,
    config: MachineConfig,
    render: RenderContext,
}

impl LifecycleMachine {
    pub fn new(config: MachineConfig, render: RenderContext) -> Self {
        Self {
            snapshot: LifecycleSnapshot::default(),
            config,
            render,
        }
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.render
    }

    pub fn is_terminated(&self) -> bool {
        self.snapshot.terminated
    }

    /// Whether controller input should currently reach the core.
    pub fn routes_controller_input(&self) -> bool {
        !self.snapshot.terminated && !self.snapshot.overlay_open
    }

    pub fn handle(
        &mut self,
        event: LifecycleEvent,
        core: &dyn CoreProxy,
        autosaves: &AutoSaveRotation,
    ) -> Vec<Command> {
        match event {
            // The render thread must see the context as gone before any pause
            // reaches the engine.
            LifecycleEvent::SurfaceReady(false) => self.render.mark_lost(),
            LifecycleEvent::RenderContextReady => self.render.mark_ready(),
            _ => {}
        }

        let obs = Observation {
            run_state: core.run_state(),
            render_context_ready: self.render.is_ready(),
            speed: core.speed(),
            latest_auto_save: autosaves.latest_snapshot_path().map(Into::into),
            exit_save_path: autosaves.next_slot_path(),
        };
        debug!("{event:?} with engine {}", obs.run_state);

        let (snapshot, commands) = transition(self.snapshot, &event, &obs, &self.config);
        self.snapshot = snapshot;
        commands
    }
}
