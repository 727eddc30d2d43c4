#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use vibe_session::controller::{
    AccessoryKind, Calibration, ControlTarget, ControllerState, InputMap, MapSource, PlayerIndex,
    PlayerProfile, buttons,
};
use vibe_session::{CoreConfig, CoreProxy, HostServices, RunState, SessionConfig};

/// Everything the session asked the core to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCall {
    Initialize(String),
    Startup(Option<PathBuf>),
    Resume,
    Pause(bool, Option<PathBuf>),
    Shutdown,
    Restart,
    SetSpeed(u32),
    SetSlot(u32),
    ToggleFrameLimiter,
    AdvanceFrame,
    SetAccessory(PlayerIndex, AccessoryKind),
    Input(PlayerIndex, ControllerState),
}

/// Core double whose run state only changes when the test says so, like an
/// engine that has not caught up with its commands yet.
#[derive(Debug, Default)]
pub struct RecordingCore {
    pub state: RunState,
    pub speed: u32,
    pub slot: u32,
    pub calls: Vec<CoreCall>,
    /// Apply run commands to `state` immediately.
    pub eager: bool,
}

impl RecordingCore {
    pub fn new(state: RunState) -> Self {
        Self {
            state,
            speed: 100,
            ..Self::default()
        }
    }

    pub fn eager() -> Self {
        Self {
            eager: true,
            ..Self::new(RunState::Unknown)
        }
    }

    /// Calls other than controller input.
    pub fn lifecycle_calls(&self) -> Vec<CoreCall> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, CoreCall::Input(..) | CoreCall::SetAccessory(..)))
            .cloned()
            .collect()
    }

    pub fn inputs(&self) -> Vec<(PlayerIndex, ControllerState)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                CoreCall::Input(p, s) => Some((*p, *s)),
                _ => None,
            })
            .collect()
    }

    fn settle(&mut self, next: RunState) {
        if self.eager {
            self.state = next;
        }
    }
}

impl CoreProxy for RecordingCore {
    fn initialize(&mut self, config: &CoreConfig) {
        self.calls.push(CoreCall::Initialize(config.content_id.clone()));
    }

    fn startup(&mut self, auto_save: Option<&Path>) {
        self.calls.push(CoreCall::Startup(auto_save.map(Path::to_path_buf)));
        self.settle(RunState::Running);
    }

    fn resume(&mut self) {
        self.calls.push(CoreCall::Resume);
        self.settle(RunState::Running);
    }

    fn pause(&mut self, force_auto_save: bool, save_path: Option<&Path>) {
        // An engine with nothing loaded has no state to write.
        if let Some(path) = save_path
            && force_auto_save
            && self.state != RunState::Unknown
        {
            std::fs::write(path, b"state").expect("write auto-save");
        }
        self.calls
            .push(CoreCall::Pause(force_auto_save, save_path.map(Path::to_path_buf)));
        self.settle(RunState::Paused);
    }

    fn shutdown(&mut self) {
        self.calls.push(CoreCall::Shutdown);
        self.settle(RunState::Unknown);
    }

    fn restart(&mut self) {
        self.calls.push(CoreCall::Restart);
    }

    fn run_state(&self) -> RunState {
        self.state
    }

    fn speed(&self) -> u32 {
        self.speed
    }

    fn set_speed(&mut self, percent: u32) {
        self.calls.push(CoreCall::SetSpeed(percent));
        self.speed = percent;
    }

    fn slot(&self) -> u32 {
        self.slot
    }

    fn set_slot(&mut self, slot: u32) {
        self.calls.push(CoreCall::SetSlot(slot));
        self.slot = slot;
    }

    fn toggle_frame_limiter(&mut self) {
        self.calls.push(CoreCall::ToggleFrameLimiter);
    }

    fn advance_frame(&mut self) {
        self.calls.push(CoreCall::AdvanceFrame);
    }

    fn set_player_accessory(&mut self, player: PlayerIndex, kind: AccessoryKind) {
        self.calls.push(CoreCall::SetAccessory(player, kind));
    }

    fn submit_input(&mut self, player: PlayerIndex, state: ControllerState) {
        self.calls.push(CoreCall::Input(player, state));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    ConfirmExit,
    ConfirmRestart,
    Unmapped(Vec<PlayerIndex>),
    OpenOverlay,
    DismissOverlay,
    Finish,
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
}

impl HostServices for RecordingHost {
    fn request_exit_confirmation(&mut self) {
        self.calls.push(HostCall::ConfirmExit);
    }

    fn request_restart_confirmation(&mut self) {
        self.calls.push(HostCall::ConfirmRestart);
    }

    fn prompt_for_unmapped_players(&mut self, players: &BTreeSet<PlayerIndex>) {
        self.calls
            .push(HostCall::Unmapped(players.iter().copied().collect()));
    }

    fn open_overlay(&mut self) {
        self.calls.push(HostCall::OpenOverlay);
    }

    fn dismiss_overlay(&mut self) {
        self.calls.push(HostCall::DismissOverlay);
    }

    fn finish(&mut self) {
        self.calls.push(HostCall::Finish);
    }
}

pub fn session_config(autosave_root: &Path) -> SessionConfig {
    SessionConfig {
        content_path: Some(PathBuf::from("/roms/mario.z64")),
        content_id: Some("mario".to_string()),
        autosave_root: autosave_root.to_path_buf(),
        autosave_cap: 3,
        ..SessionConfig::default()
    }
}

/// Keyboard-style profile: key 29 = A, key 30 = B, axis 0 = stick x.
pub fn keyboard_profile(player: PlayerIndex) -> PlayerProfile {
    let mut map = InputMap::new();
    map.bind(MapSource::Key(29), ControlTarget::Button(buttons::A));
    map.bind(MapSource::Key(30), ControlTarget::Button(buttons::B));
    map.bind(MapSource::AxisPositive(0), ControlTarget::StickRight);
    map.bind(MapSource::AxisNegative(0), ControlTarget::StickLeft);
    PlayerProfile {
        player,
        enabled: true,
        calibration: Calibration {
            deadzone: 0.0,
            sensitivity: 1.0,
        },
        accessory: AccessoryKind::Rumble,
        map,
    }
}
