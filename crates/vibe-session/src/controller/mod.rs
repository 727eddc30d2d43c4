//! Input consumers that turn filtered raw events into per-player controller
//! state for the core.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::input::SourceFilter;

mod peripheral;
mod player_map;
mod touch;

pub use peripheral::{ControlTarget, InputMap, MapSource, PeripheralController};
pub use player_map::PlayerMap;
pub use touch::{AutoHold, ButtonRegion, Rect, StickRegion, TouchController, TouchLayout};

/// Controller button bits as the core expects them in [`ControllerState::buttons`].
pub mod buttons {
    pub const C_RIGHT: u16 = 0x0001;
    pub const C_LEFT: u16 = 0x0002;
    pub const C_DOWN: u16 = 0x0004;
    pub const C_UP: u16 = 0x0008;
    pub const R: u16 = 0x0010;
    pub const L: u16 = 0x0020;
    pub const D_RIGHT: u16 = 0x0100;
    pub const D_LEFT: u16 = 0x0200;
    pub const D_DOWN: u16 = 0x0400;
    pub const D_UP: u16 = 0x0800;
    pub const START: u16 = 0x1000;
    pub const Z: u16 = 0x2000;
    pub const B: u16 = 0x4000;
    pub const A: u16 = 0x8000;
}

/// Practical analog stick range of the emulated controller.
pub const STICK_RANGE: f32 = 80.0;

/// Maximum number of simultaneously connected players.
pub const MAX_PLAYERS: u8 = 4;

/// One-based player slot, always within `1..=MAX_PLAYERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerIndex(u8);

impl PlayerIndex {
    pub const ONE: Self = Self(1);
    pub const TWO: Self = Self(2);
    pub const THREE: Self = Self(3);
    pub const FOUR: Self = Self(4);

    pub const ALL: [Self; MAX_PLAYERS as usize] = [Self::ONE, Self::TWO, Self::THREE, Self::FOUR];

    pub fn new(player: u8) -> Option<Self> {
        (1..=MAX_PLAYERS).contains(&player).then_some(Self(player))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PlayerIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("player index {value} outside 1..={MAX_PLAYERS}"))
    }
}

impl From<PlayerIndex> for u8 {
    fn from(player: PlayerIndex) -> Self {
        player.0
    }
}

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Accessory plugged into a controller's expansion port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessoryKind {
    None,
    #[default]
    Memory,
    Rumble,
    Transfer,
}

/// Per-player analog calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Radius of the centered region as a fraction of full deflection,
    /// `0.0..1.0`.
    pub deadzone: f32,
    /// Output gain applied after the deadzone is removed.
    pub sensitivity: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            deadzone: 0.20,
            sensitivity: 1.0,
        }
    }
}

impl Calibration {
    /// Maps a raw stick position with axes in `-1.0..=1.0` to a calibrated
    /// one. The deadzone is a circle: positions whose length falls inside it
    /// become zero, and the remaining travel is rescaled along the same
    /// direction so the output still reaches full deflection.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let deadzone = self.deadzone.clamp(0.0, 0.99);
        let length = x.hypot(y);
        if length == 0.0 || length < deadzone {
            return (0.0, 0.0);
        }
        let scaled = ((length.min(1.0) - deadzone) / (1.0 - deadzone) * self.sensitivity).min(1.0);
        (x * scaled / length, y * scaled / length)
    }
}

/// Converts a normalized axis value to the core's stick range.
pub fn stick_from_unit(v: f32) -> i8 {
    (v.clamp(-1.0, 1.0) * STICK_RANGE) as i8
}

/// Normalized control signal for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub buttons: u16,
    pub stick_x: i8,
    pub stick_y: i8,
}

impl ControllerState {
    pub fn is_pressed(&self, mask: u16) -> bool {
        self.buttons & mask == mask
    }
}

/// Everything needed to activate a profile-driven controller for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerBinding {
    pub player: PlayerIndex,
    pub source_filter: SourceFilter,
    pub calibration: Calibration,
    pub accessory: AccessoryKind,
}

/// Per-player profile as configured by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub player: PlayerIndex,
    pub enabled: bool,
    pub calibration: Calibration,
    pub accessory: AccessoryKind,
    pub map: InputMap,
}

/// Result of the one-time setup gate.
#[derive(Debug, Default)]
pub struct SetupPlan {
    /// Players whose controllers are activated, in player order.
    pub active: Vec<PlayerIndex>,
    /// Required players with no input device mapped yet.
    pub unmapped: BTreeSet<PlayerIndex>,
}

impl SetupPlan {
    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty()
    }
}

/// Decides which enabled players can be activated for content that declares
/// `declared_players` players.
///
/// The mapping check only applies to multi-player content when the player map
/// is enabled and the reminder has not been switched off. Players one and two
/// are required whenever enabled; three and four only when the content
/// declares that many.
pub fn plan_activation(
    profiles: &[PlayerProfile],
    declared_players: u8,
    player_map: &PlayerMap,
    mapping_reminder: bool,
) -> SetupPlan {
    let check_mapping = declared_players > 1 && player_map.is_enabled() && mapping_reminder;

    let mut plan = SetupPlan::default();
    for profile in profiles.iter().filter(|p| p.enabled) {
        let player = profile.player;
        let required = player.get() <= 2 || declared_players >= player.get();
        if check_mapping && required && !player_map.is_mapped(player) {
            plan.unmapped.insert(player);
        } else {
            plan.active.push(player);
        }
    }
    plan.active.sort();
    plan.active.dedup();
    plan
}
