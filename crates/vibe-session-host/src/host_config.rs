use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use vibe_session::controller::{
    AccessoryKind, AutoHold, ButtonRegion, Calibration, ControlTarget, InputMap, MapSource,
    PlayerIndex, PlayerMap, PlayerProfile, Rect, StickRegion, TouchLayout,
};
use vibe_session::input::DeviceSource;
use vibe_session::{ColdStartPolicy, TouchSurface};

use crate::gamepad_codes;

fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vibe-session");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vibe-session");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".config").join("vibe-session");
    }

    PathBuf::new()
}

pub fn default_host_config_path() -> PathBuf {
    config_dir().join("host.toml")
}

pub fn default_autosave_dir() -> PathBuf {
    config_dir().join("autosaves")
}

/// One `[[players]]` entry. `player` is required; everything else has a
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub player: PlayerIndex,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub accessory: AccessoryKind,
    /// Control name (`a`, `dpad-up`, `stick-left`, ...) to source
    /// (`key:96`, `axis+:0`, ...).
    #[serde(default = "default_gamepad_bindings")]
    pub bindings: BTreeMap<String, String>,
}

fn enabled_by_default() -> bool {
    true
}

fn default_gamepad_bindings() -> BTreeMap<String, String> {
    use gamepad_codes::*;

    let keys = [
        ("a", BUTTON_A),
        ("b", BUTTON_B),
        ("z", BUTTON_L2),
        ("start", BUTTON_START),
        ("l", BUTTON_L1),
        ("r", BUTTON_R1),
        ("dpad-up", DPAD_UP),
        ("dpad-down", DPAD_DOWN),
        ("dpad-left", DPAD_LEFT),
        ("dpad-right", DPAD_RIGHT),
    ];
    let axes = [
        ("stick-right", "axis+", AXIS_LEFT_X),
        ("stick-left", "axis-", AXIS_LEFT_X),
        ("stick-up", "axis+", AXIS_LEFT_Y),
        ("stick-down", "axis-", AXIS_LEFT_Y),
        ("c-right", "axis+", AXIS_RIGHT_X),
        ("c-left", "axis-", AXIS_RIGHT_X),
        ("c-up", "axis+", AXIS_RIGHT_Y),
        ("c-down", "axis-", AXIS_RIGHT_Y),
    ];

    keys.into_iter()
        .map(|(name, code)| (name.to_string(), format!("key:{code}")))
        .chain(
            axes.into_iter()
                .map(|(name, dir, axis)| (name.to_string(), format!("{dir}:{axis}"))),
        )
        .collect()
}

impl PlayerConfig {
    pub fn new(player: PlayerIndex) -> Self {
        Self {
            player,
            enabled: true,
            calibration: Calibration::default(),
            accessory: AccessoryKind::default(),
            bindings: default_gamepad_bindings(),
        }
    }

    /// Builds the runtime profile, skipping bindings that do not parse.
    pub fn to_profile(&self) -> PlayerProfile {
        let mut map = InputMap::new();
        for (name, source) in &self.bindings {
            let Ok(target) = name.parse::<ControlTarget>() else {
                warn!("Ignoring binding for {}: unknown control '{name}'", self.player);
                continue;
            };
            let Ok(source) = source.parse::<MapSource>() else {
                warn!(
                    "Ignoring binding {name} for {}: bad source '{source}'",
                    self.player
                );
                continue;
            };
            map.bind(source, target);
        }
        PlayerProfile {
            player: self.player,
            enabled: self.enabled,
            calibration: self.calibration,
            accessory: self.accessory,
            map,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchButtonConfig {
    pub button: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TouchStickConfig {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchConfig {
    pub source: DeviceSource,
    #[serde(default)]
    pub buttons: Vec<TouchButtonConfig>,
    #[serde(default)]
    pub stick: Option<TouchStickConfig>,
    /// Buttons that latch on touch instead of releasing with the finger.
    #[serde(default)]
    pub auto_hold: Vec<String>,
}

fn button_mask(name: &str) -> Option<u16> {
    match name.parse::<ControlTarget>() {
        Ok(ControlTarget::Button(mask)) => Some(mask),
        _ => None,
    }
}

impl TouchConfig {
    pub fn to_surface(&self) -> TouchSurface {
        let buttons = self
            .buttons
            .iter()
            .filter_map(|b| {
                let Some(mask) = button_mask(&b.button) else {
                    warn!("Ignoring touch region for unknown button '{}'", b.button);
                    return None;
                };
                Some(ButtonRegion {
                    mask,
                    rect: Rect::new(b.x, b.y, b.w, b.h),
                })
            })
            .collect();
        let holdable = self
            .auto_hold
            .iter()
            .filter_map(|name| button_mask(name))
            .fold(0, |acc, mask| acc | mask);

        TouchSurface {
            source: self.source,
            layout: TouchLayout {
                buttons,
                stick: self.stick.map(|s| StickRegion {
                    cx: s.cx,
                    cy: s.cy,
                    radius: s.radius,
                }),
            },
            auto_hold: if holdable == 0 {
                AutoHold::Disabled
            } else {
                AutoHold::Toggle { holdable }
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub device: u32,
    pub player: PlayerIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub autosave_dir: Option<PathBuf>,
    pub autosave_cap: usize,
    pub cold_start: ColdStartPolicy,
    /// Fast-forward speed in percent.
    pub fast_speed: u32,
    pub player_map_enabled: bool,
    pub mapping_reminder: bool,
    pub devices: Vec<DeviceAssignment>,
    pub players: Vec<PlayerConfig>,
    pub touch: Vec<TouchConfig>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            autosave_dir: None,
            autosave_cap: 5,
            cold_start: ColdStartPolicy::default(),
            fast_speed: 250,
            player_map_enabled: false,
            mapping_reminder: true,
            devices: Vec::new(),
            players: vec![PlayerConfig::new(PlayerIndex::ONE)],
            touch: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn player_map(&self) -> PlayerMap {
        let mut map = PlayerMap::new(self.player_map_enabled);
        for assignment in &self.devices {
            map.assign(assignment.device, assignment.player);
        }
        map
    }

    pub fn profiles(&self) -> Vec<PlayerProfile> {
        self.players.iter().map(PlayerConfig::to_profile).collect()
    }

    pub fn touch_surfaces(&self) -> Vec<TouchSurface> {
        self.touch.iter().map(TouchConfig::to_surface).collect()
    }
}

pub fn load_from_file(path: &Path) -> HostConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return HostConfig::default(),
    };

    match toml::from_str::<HostConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse host config {}: {e}; using defaults",
                path.display()
            );
            HostConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &HostConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_session::controller::buttons;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("nope.toml"));
        assert_eq!(cfg.autosave_cap, 5);
        assert_eq!(cfg.players.len(), 1);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "autosave_cap = \"lots\"").unwrap();
        assert_eq!(load_from_file(&path).autosave_cap, 5);
    }

    #[test]
    fn save_then_load_keeps_players() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("host.toml");
        let mut cfg = HostConfig {
            autosave_cap: 2,
            cold_start: ColdStartPolicy::Immediate,
            ..HostConfig::default()
        };
        cfg.players.push(PlayerConfig {
            accessory: AccessoryKind::Rumble,
            ..PlayerConfig::new(PlayerIndex::TWO)
        });
        save_to_file(&path, &cfg).unwrap();

        let loaded = load_from_file(&path);
        assert_eq!(loaded.autosave_cap, 2);
        assert_eq!(loaded.cold_start, ColdStartPolicy::Immediate);
        assert_eq!(loaded.players[1].player, PlayerIndex::TWO);
        assert_eq!(loaded.players[1].accessory, AccessoryKind::Rumble);
    }

    #[test]
    fn bad_bindings_are_skipped() {
        let mut player = PlayerConfig::new(PlayerIndex::ONE);
        player.bindings.clear();
        player.bindings.insert("a".into(), "key:96".into());
        player.bindings.insert("turbo".into(), "key:1".into());
        player.bindings.insert("b".into(), "pedal:3".into());

        let profile = player.to_profile();
        assert_eq!(profile.map.len(), 1);
        assert_eq!(
            profile.map.target_for(MapSource::Key(96)),
            Some(ControlTarget::Button(buttons::A))
        );
    }

    #[test]
    fn default_bindings_cover_every_control() {
        let profile = PlayerConfig::new(PlayerIndex::ONE).to_profile();
        assert_eq!(profile.map.len(), 18);
    }

    #[test]
    fn player_entries_must_name_their_player() {
        let missing = "[[players]]\naccessory = \"rumble\"\n";
        assert!(toml::from_str::<HostConfig>(missing).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, format!("{missing}{missing}")).unwrap();
        let cfg = load_from_file(&path);
        assert_eq!(cfg.players.len(), 1, "falls back to the default player");

        let named: HostConfig = toml::from_str("[[players]]\nplayer = 3\n").unwrap();
        assert_eq!(named.players[0].player, PlayerIndex::THREE);
        assert!(named.players[0].enabled);
        assert_eq!(named.players[0].bindings.len(), 18);
    }

    #[test]
    fn touch_config_builds_surface() {
        let text = r#"
            [[touch]]
            source = "touch-screen"
            auto_hold = ["z"]
            stick = { cx = 50.0, cy = 50.0, radius = 40.0 }
            buttons = [
                { button = "a", x = 200.0, y = 0.0, w = 50.0, h = 50.0 },
                { button = "z", x = 200.0, y = 100.0, w = 50.0, h = 50.0 },
                { button = "warp", x = 0.0, y = 0.0, w = 1.0, h = 1.0 },
            ]
        "#;
        let cfg: HostConfig = toml::from_str(text).unwrap();
        let surfaces = cfg.touch_surfaces();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].layout.buttons.len(), 2);
        assert!(surfaces[0].layout.stick.is_some());
        assert_eq!(
            surfaces[0].auto_hold,
            AutoHold::Toggle {
                holdable: buttons::Z
            }
        );
    }
}
