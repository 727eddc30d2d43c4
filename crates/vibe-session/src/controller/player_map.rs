use std::collections::HashMap;

use log::debug;

use super::PlayerIndex;

/// Assignment of physical input devices to players.
///
/// When disabled, every peripheral controller accepts every device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerMap {
    enabled: bool,
    devices: HashMap<u32, PlayerIndex>,
}

impl PlayerMap {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            devices: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Maps `device` to `player`. A player owns at most one device.
    pub fn assign(&mut self, device: u32, player: PlayerIndex) {
        self.devices.retain(|_, &mut p| p != player);
        self.devices.insert(device, player);
    }

    pub fn is_mapped(&self, player: PlayerIndex) -> bool {
        self.devices.values().any(|&p| p == player)
    }

    pub fn player_for(&self, device: u32) -> Option<PlayerIndex> {
        self.devices.get(&device).copied()
    }

    /// Whether input from `device` should drive `player`.
    pub fn accepts(&self, device: u32, player: PlayerIndex) -> bool {
        !self.enabled || self.player_for(device) == Some(player)
    }

    /// Drops mappings for devices that are no longer connected.
    pub fn remove_unavailable(&mut self, connected: &[u32]) {
        self.devices.retain(|device, player| {
            let keep = connected.contains(device);
            if !keep {
                debug!("dropping mapping of disconnected device {device} from {player}");
            }
            keep
        });
    }
}
