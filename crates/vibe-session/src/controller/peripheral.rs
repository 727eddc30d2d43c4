use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::trace;

use super::{
    ControllerBinding, ControllerState, PlayerIndex, PlayerMap, buttons, stick_from_unit,
};
use crate::core_proxy::CoreProxy;
use crate::input::{InputEvent, InputKind, InputSink};

/// Axis travel past which an axis bound to a digital button counts as pressed.
const AXIS_BUTTON_THRESHOLD: f32 = 0.5;

/// What a mapped input drives on the emulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTarget {
    Button(u16),
    StickRight,
    StickLeft,
    StickUp,
    StickDown,
}

const TARGET_NAMES: [(&str, ControlTarget); 18] = [
    ("a", ControlTarget::Button(buttons::A)),
    ("b", ControlTarget::Button(buttons::B)),
    ("z", ControlTarget::Button(buttons::Z)),
    ("start", ControlTarget::Button(buttons::START)),
    ("l", ControlTarget::Button(buttons::L)),
    ("r", ControlTarget::Button(buttons::R)),
    ("dpad-up", ControlTarget::Button(buttons::D_UP)),
    ("dpad-down", ControlTarget::Button(buttons::D_DOWN)),
    ("dpad-left", ControlTarget::Button(buttons::D_LEFT)),
    ("dpad-right", ControlTarget::Button(buttons::D_RIGHT)),
    ("c-up", ControlTarget::Button(buttons::C_UP)),
    ("c-down", ControlTarget::Button(buttons::C_DOWN)),
    ("c-left", ControlTarget::Button(buttons::C_LEFT)),
    ("c-right", ControlTarget::Button(buttons::C_RIGHT)),
    ("stick-right", ControlTarget::StickRight),
    ("stick-left", ControlTarget::StickLeft),
    ("stick-up", ControlTarget::StickUp),
    ("stick-down", ControlTarget::StickDown),
];

impl FromStr for ControlTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TARGET_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, target)| target)
            .ok_or_else(|| format!("unknown control '{s}'"))
    }
}

impl fmt::Display for ControlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = TARGET_NAMES
            .iter()
            .find(|(_, target)| target == self)
            .map_or("?", |(name, _)| name);
        f.write_str(name)
    }
}

/// Physical input a profile entry listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapSource {
    Key(u16),
    AxisPositive(u8),
    AxisNegative(u8),
}

impl FromStr for MapSource {
    type Err = String;

    /// Parses `key:<code>`, `axis+:<n>` or `axis-:<n>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((kind, value)) = s.split_once(':') else {
            return Err(format!("expected kind:value, got '{s}'"));
        };
        let value = value.trim();
        match kind.trim() {
            "key" => value
                .parse()
                .map(Self::Key)
                .map_err(|e| format!("bad key code '{value}': {e}")),
            "axis+" => value
                .parse()
                .map(Self::AxisPositive)
                .map_err(|e| format!("bad axis '{value}': {e}")),
            "axis-" => value
                .parse()
                .map(Self::AxisNegative)
                .map_err(|e| format!("bad axis '{value}': {e}")),
            other => Err(format!("unknown input kind '{other}'")),
        }
    }
}

/// Profile mapping from physical inputs to controller targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputMap {
    entries: HashMap<MapSource, ControlTarget>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `source` to `target`, replacing any previous source for the
    /// same target.
    pub fn bind(&mut self, source: MapSource, target: ControlTarget) {
        self.entries.retain(|_, &mut t| t != target);
        self.entries.insert(source, target);
    }

    pub fn target_for(&self, source: MapSource) -> Option<ControlTarget> {
        self.entries.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StickHalves {
    right: f32,
    left: f32,
    up: f32,
    down: f32,
}

/// Profile-driven controller for one player.
///
/// Consumes key, button and axis events that were already routed by device
/// class, applies the player's input map and calibration, and submits the
/// resulting state to the core whenever it changes.
pub struct PeripheralController {
    binding: ControllerBinding,
    map: InputMap,
    player_map: PlayerMap,
    buttons: u16,
    stick: StickHalves,
    last_sent: Option<ControllerState>,
}

impl PeripheralController {
    pub fn new(binding: ControllerBinding, map: InputMap, player_map: PlayerMap) -> Self {
        Self {
            binding,
            map,
            player_map,
            buttons: 0,
            stick: StickHalves::default(),
            last_sent: None,
        }
    }

    pub fn player(&self) -> PlayerIndex {
        self.binding.player
    }

    pub fn binding(&self) -> &ControllerBinding {
        &self.binding
    }

    pub fn state(&self) -> ControllerState {
        let (x, y) = self.binding.calibration.apply(
            self.stick.right - self.stick.left,
            self.stick.up - self.stick.down,
        );
        ControllerState {
            buttons: self.buttons,
            stick_x: stick_from_unit(x),
            stick_y: stick_from_unit(y),
        }
    }

    fn drive(&mut self, target: ControlTarget, amount: f32) {
        let amount = amount.clamp(0.0, 1.0);
        match target {
            ControlTarget::Button(mask) => {
                if amount >= AXIS_BUTTON_THRESHOLD {
                    self.buttons |= mask;
                } else {
                    self.buttons &= !mask;
                }
            }
            ControlTarget::StickRight => self.stick.right = amount,
            ControlTarget::StickLeft => self.stick.left = amount,
            ControlTarget::StickUp => self.stick.up = amount,
            ControlTarget::StickDown => self.stick.down = amount,
        }
    }

    fn apply(&mut self, kind: InputKind) -> bool {
        match kind {
            InputKind::Key { code, pressed } => {
                let Some(target) = self.map.target_for(MapSource::Key(code)) else {
                    return false;
                };
                self.drive(target, if pressed { 1.0 } else { 0.0 });
                true
            }
            InputKind::Axis { axis, value } => {
                let positive = self.map.target_for(MapSource::AxisPositive(axis));
                let negative = self.map.target_for(MapSource::AxisNegative(axis));
                if positive.is_none() && negative.is_none() {
                    return false;
                }
                if let Some(target) = positive {
                    self.drive(target, value.max(0.0));
                }
                if let Some(target) = negative {
                    self.drive(target, (-value).max(0.0));
                }
                true
            }
            InputKind::Pointer { .. } => false,
        }
    }
}

impl InputSink for PeripheralController {
    fn on_event(&mut self, event: &InputEvent, core: &mut dyn CoreProxy) -> bool {
        if !self.player_map.accepts(event.device_id, self.binding.player) {
            return false;
        }
        if !self.apply(event.kind) {
            return false;
        }

        let state = self.state();
        if self.last_sent != Some(state) {
            trace!("{} -> {state:?}", self.binding.player);
            core.submit_input(self.binding.player, state);
            self.last_sent = Some(state);
        }
        true
    }
}
