//! Boundary to the emulation engine.
//!
//! The engine runs on its own and is only observable through
//! [`CoreProxy::run_state`]. Every command is fire-and-forget: its effect shows
//! up on a later poll, never as a return value.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::controller::{AccessoryKind, ControllerState, PlayerIndex};

/// Coarse execution phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Not started yet (or already torn down).
    #[default]
    Unknown,
    Running,
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Parameters handed to the engine once, before it is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub content_path: PathBuf,
    pub content_id: String,
    pub cheat_args: Option<String>,
    /// The session was launched to restart the content from power-on.
    pub fresh_start: bool,
}

pub trait CoreProxy {
    fn initialize(&mut self, config: &CoreConfig);

    /// Boots the content, optionally restoring `auto_save` first.
    fn startup(&mut self, auto_save: Option<&Path>);

    fn resume(&mut self);

    /// Halts emulation. With `force_auto_save` the engine writes its state to
    /// `save_path` before halting.
    fn pause(&mut self, force_auto_save: bool, save_path: Option<&Path>);

    fn shutdown(&mut self);

    fn restart(&mut self);

    fn run_state(&self) -> RunState;

    /// Emulation speed in percent of real time.
    fn speed(&self) -> u32;

    fn set_speed(&mut self, percent: u32);

    /// Currently selected manual save slot.
    fn slot(&self) -> u32;

    fn set_slot(&mut self, slot: u32);

    fn toggle_frame_limiter(&mut self);

    /// Runs exactly one frame while paused.
    fn advance_frame(&mut self);

    fn set_player_accessory(&mut self, player: PlayerIndex, kind: AccessoryKind);

    fn submit_input(&mut self, player: PlayerIndex, state: ControllerState);
}
