//! Raw input events and device-class routing.

use std::fmt;

use serde::{Deserialize, Serialize};

mod demux;

pub use demux::{Demultiplexer, InputSink};

/// Key codes the session reserves for itself instead of forwarding to
/// controllers.
pub mod keycodes {
    pub const BACK: u16 = 4;
    pub const MENU: u16 = 82;
}

/// Physical device class an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceSource {
    /// Primary touch screen drawn over the game surface.
    TouchScreen,
    /// Secondary touch panel with no display of its own.
    TouchPad,
    /// Keyboards and other digital-only button devices.
    Keyboard,
    /// Analog sticks and other absolute axes.
    Joystick,
    /// Paired game controller reporting buttons and axes.
    Gamepad,
}

impl DeviceSource {
    const fn bit(self) -> u8 {
        match self {
            Self::TouchScreen => 0x01,
            Self::TouchPad => 0x02,
            Self::Keyboard => 0x04,
            Self::Joystick => 0x08,
            Self::Gamepad => 0x10,
        }
    }
}

/// Set of device classes a sink accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceFilter(u8);

impl SourceFilter {
    pub const NONE: Self = Self(0);
    pub const TOUCH_SCREEN: Self = Self::only(DeviceSource::TouchScreen);
    pub const TOUCH_PAD: Self = Self::only(DeviceSource::TouchPad);
    /// Every device class a profile-driven controller consumes.
    pub const PERIPHERAL: Self = Self(
        DeviceSource::Keyboard.bit() | DeviceSource::Joystick.bit() | DeviceSource::Gamepad.bit(),
    );
    pub const ANY: Self = Self(0x1F);

    pub const fn only(source: DeviceSource) -> Self {
        Self(source.bit())
    }

    pub const fn with(self, source: DeviceSource) -> Self {
        Self(self.0 | source.bit())
    }

    pub const fn matches(self, source: DeviceSource) -> bool {
        self.0 & source.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<DeviceSource> for SourceFilter {
    fn from_iter<I: IntoIterator<Item = DeviceSource>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ALL: [DeviceSource; 5] = [
            DeviceSource::TouchScreen,
            DeviceSource::TouchPad,
            DeviceSource::Keyboard,
            DeviceSource::Joystick,
            DeviceSource::Gamepad,
        ];
        f.debug_set()
            .entries(ALL.iter().filter(|s| self.matches(**s)))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// Payload of a raw input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputKind {
    /// Digital key or button. `code` is device specific.
    Key { code: u16, pressed: bool },
    /// Absolute axis in `-1.0..=1.0`.
    Axis { axis: u8, value: f32 },
    /// Touch contact in surface pixels.
    Pointer {
        id: u32,
        x: f32,
        y: f32,
        phase: PointerPhase,
    },
}

/// One event from the physical input stream. Only `source` is used for
/// routing; everything else is for the sinks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub source: DeviceSource,
    pub device_id: u32,
    pub kind: InputKind,
    pub timestamp_ms: u64,
}

impl InputEvent {
    pub fn key(source: DeviceSource, device_id: u32, code: u16, pressed: bool) -> Self {
        Self {
            source,
            device_id,
            kind: InputKind::Key { code, pressed },
            timestamp_ms: 0,
        }
    }

    pub fn axis(source: DeviceSource, device_id: u32, axis: u8, value: f32) -> Self {
        Self {
            source,
            device_id,
            kind: InputKind::Axis { axis, value },
            timestamp_ms: 0,
        }
    }

    pub fn pointer(source: DeviceSource, id: u32, x: f32, y: f32, phase: PointerPhase) -> Self {
        Self {
            source,
            device_id: 0,
            kind: InputKind::Pointer { id, x, y, phase },
            timestamp_ms: 0,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Returns the key code if this is a key press (not a release).
    pub fn key_down(&self) -> Option<u16> {
        match self.kind {
            InputKind::Key {
                code,
                pressed: true,
            } => Some(code),
            _ => None,
        }
    }

    /// Whether this event carries one of the session's reserved keys.
    pub fn is_reserved_key(&self) -> bool {
        matches!(
            self.kind,
            InputKind::Key {
                code: keycodes::BACK | keycodes::MENU,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_only_its_sources() {
        let f = SourceFilter::TOUCH_SCREEN.with(DeviceSource::Gamepad);
        assert!(f.matches(DeviceSource::TouchScreen));
        assert!(f.matches(DeviceSource::Gamepad));
        assert!(!f.matches(DeviceSource::TouchPad));
        assert!(!SourceFilter::NONE.matches(DeviceSource::Keyboard));
    }

    #[test]
    fn peripheral_filter_excludes_touch() {
        assert!(!SourceFilter::PERIPHERAL.matches(DeviceSource::TouchScreen));
        assert!(!SourceFilter::PERIPHERAL.matches(DeviceSource::TouchPad));
        assert!(SourceFilter::PERIPHERAL.matches(DeviceSource::Joystick));
    }

    #[test]
    fn filter_collects_from_sources() {
        let f: SourceFilter = [DeviceSource::Keyboard, DeviceSource::Joystick]
            .into_iter()
            .collect();
        assert_eq!(f, SourceFilter::only(DeviceSource::Keyboard).with(DeviceSource::Joystick));
        assert_eq!(format!("{f:?}"), "{Keyboard, Joystick}");
    }
}
