//! Scripted host events.
//!
//! ```toml
//! steps = [
//!     { host-resumed = true },
//!     { surface-ready = true },
//!     "render-ready",
//!     { key = { device = 1, code = 96, pressed = true } },
//!     { wait = 100 },
//!     "back",
//!     { answer = true },
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;
use vibe_session::controller::{AccessoryKind, PlayerIndex};
use vibe_session::input::{DeviceSource, InputEvent, PointerPhase};
use vibe_session::{CoreProxy, LifecycleEvent, Session, SessionAction};

use crate::host::ConsoleHost;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse script {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn gamepad() -> DeviceSource {
    DeviceSource::Gamepad
}

fn touch_screen() -> DeviceSource {
    DeviceSource::TouchScreen
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    HostResumed(bool),
    SurfaceReady(bool),
    Focus(bool),
    RenderReady,
    /// The platform reports the menu overlay as opened (`true`) or closed.
    Overlay(bool),
    Modal(bool),
    Exit,
    Restart,
    Menu,
    Back,
    /// Answer to the open confirmation dialog.
    Answer(bool),
    ToggleSpeed,
    Speed(u32),
    Slot(u32),
    FrameLimiter,
    AdvanceFrame,
    Accessory {
        player: PlayerIndex,
        kind: AccessoryKind,
    },
    Key {
        #[serde(default = "gamepad")]
        source: DeviceSource,
        device: u32,
        code: u16,
        pressed: bool,
    },
    Axis {
        #[serde(default = "gamepad")]
        source: DeviceSource,
        device: u32,
        axis: u8,
        value: f32,
    },
    Touch {
        #[serde(default = "touch_screen")]
        source: DeviceSource,
        id: u32,
        x: f32,
        y: f32,
        phase: PointerPhase,
    },
    /// Sleep for the given number of milliseconds so the engine can catch up.
    Wait(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ScriptError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

enum Action {
    Lifecycle(LifecycleEvent),
    Input(InputEvent),
    Answer(bool),
    Wait(Duration),
}

impl Step {
    fn action(&self, now_ms: u64) -> Action {
        use LifecycleEvent as E;

        let event = match *self {
            Step::HostResumed(b) => E::HostResumed(b),
            Step::SurfaceReady(b) => E::SurfaceReady(b),
            Step::Focus(b) => E::FocusChanged(b),
            Step::RenderReady => E::RenderContextReady,
            Step::Overlay(true) => E::OverlayOpened,
            Step::Overlay(false) => E::OverlayClosed,
            Step::Modal(b) => E::ModalPending(b),
            Step::Exit => E::ExitRequested,
            Step::Restart => E::RestartRequested,
            Step::Menu => E::MenuKey,
            Step::Back => E::BackKey,
            Step::ToggleSpeed => E::Action(SessionAction::ToggleSpeed),
            Step::Speed(percent) => E::Action(SessionAction::SetSpeed(percent)),
            Step::Slot(slot) => E::Action(SessionAction::SetSlot(slot)),
            Step::FrameLimiter => E::Action(SessionAction::ToggleFrameLimiter),
            Step::AdvanceFrame => E::Action(SessionAction::AdvanceFrame),
            Step::Accessory { player, kind } => {
                E::Action(SessionAction::SetAccessory { player, kind })
            }
            Step::Answer(confirmed) => return Action::Answer(confirmed),
            Step::Wait(ms) => return Action::Wait(Duration::from_millis(ms)),
            Step::Key {
                source,
                device,
                code,
                pressed,
            } => return Action::Input(InputEvent::key(source, device, code, pressed).at(now_ms)),
            Step::Axis {
                source,
                device,
                axis,
                value,
            } => return Action::Input(InputEvent::axis(source, device, axis, value).at(now_ms)),
            Step::Touch {
                source,
                id,
                x,
                y,
                phase,
            } => return Action::Input(InputEvent::pointer(source, id, x, y, phase).at(now_ms)),
        };
        Action::Lifecycle(event)
    }
}

/// Feeds everything the host queued in response to earlier commands back
/// into the session.
pub fn drain_follow_ups<C: CoreProxy>(session: &mut Session<C, ConsoleHost>) -> usize {
    let mut handled = 0;
    while let Some(event) = session.host_mut().next_follow_up() {
        session.handle(event);
        handled += 1;
    }
    handled
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaySummary {
    pub steps: usize,
    pub commands: usize,
    pub inputs_handled: usize,
}

/// Runs `script` against `session` until it ends or the session finishes.
pub fn play<C: CoreProxy>(session: &mut Session<C, ConsoleHost>, script: &Script) -> PlaySummary {
    let mut summary = PlaySummary::default();
    let mut now_ms = 0u64;

    for step in &script.steps {
        if session.is_finished() {
            info!("Session finished; skipping remaining steps");
            break;
        }
        debug!("step {}: {step:?}", summary.steps);
        summary.steps += 1;

        match step.action(now_ms) {
            Action::Lifecycle(event) => summary.commands += session.handle(event).len(),
            Action::Input(event) => {
                if session.on_input(&event) {
                    summary.inputs_handled += 1;
                }
            }
            Action::Answer(confirmed) => {
                if let Some(event) = session.host_mut().answer(confirmed) {
                    summary.commands += session.handle(event).len();
                }
            }
            Action::Wait(duration) => {
                thread::sleep(duration);
                now_ms += duration.as_millis() as u64;
            }
        }
        drain_follow_ups(session);
    }
    summary
}
