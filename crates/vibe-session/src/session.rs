use std::collections::BTreeSet;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::autosave::AutoSaveRotation;
use crate::controller::{
    AutoHold, ControllerBinding, PeripheralController, PlayerIndex, PlayerMap, PlayerProfile,
    SetupPlan, TouchController, TouchLayout, plan_activation,
};
use crate::core_proxy::{CoreConfig, CoreProxy};
use crate::error::SessionError;
use crate::input::{Demultiplexer, DeviceSource, InputEvent, SourceFilter, keycodes};
use crate::lifecycle::{
    ColdStartPolicy, Command, ConfirmationKind, LifecycleEvent, LifecycleMachine, MachineConfig,
    RenderContext,
};

/// Things only the host platform can do for the session.
///
/// Confirmation answers come back later as
/// [`LifecycleEvent::ConfirmationResolved`]; overlay changes as
/// [`LifecycleEvent::OverlayOpened`] / [`LifecycleEvent::OverlayClosed`].
pub trait HostServices {
    fn request_exit_confirmation(&mut self);
    fn request_restart_confirmation(&mut self);
    fn prompt_for_unmapped_players(&mut self, players: &BTreeSet<PlayerIndex>);
    fn open_overlay(&mut self);
    fn dismiss_overlay(&mut self);
    /// The session is over and the host may close.
    fn finish(&mut self);
}

/// A touch surface with an on-screen controller for player one.
#[derive(Debug, Clone)]
pub struct TouchSurface {
    pub source: DeviceSource,
    pub layout: TouchLayout,
    pub auto_hold: AutoHold,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub content_path: Option<PathBuf>,
    pub content_id: Option<String>,
    pub cheat_args: Option<String>,
    /// Launched to restart the content: do not restore the latest auto-save.
    pub fresh_start: bool,
    /// Number of players the content supports.
    pub declared_players: u8,
    /// Root under which a per-content auto-save directory is created.
    pub autosave_root: PathBuf,
    pub autosave_cap: usize,
    pub cold_start: ColdStartPolicy,
    pub fast_speed: u32,
    pub profiles: Vec<PlayerProfile>,
    pub player_map: PlayerMap,
    /// Devices currently attached. When known, mappings to anything else are
    /// dropped before the setup gate runs.
    pub connected_devices: Option<Vec<u32>>,
    pub mapping_reminder: bool,
    pub touch_surfaces: Vec<TouchSurface>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let machine = MachineConfig::default();
        Self {
            content_path: None,
            content_id: None,
            cheat_args: None,
            fresh_start: false,
            declared_players: 1,
            autosave_root: PathBuf::from("autosaves"),
            autosave_cap: 5,
            cold_start: machine.cold_start,
            fast_speed: machine.fast_speed,
            profiles: Vec::new(),
            player_map: PlayerMap::new(false),
            connected_devices: None,
            mapping_reminder: true,
            touch_surfaces: Vec::new(),
        }
    }
}

/// Turns a content identity into something safe to use in file names.
fn save_base_name(content_id: &str) -> String {
    content_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One running game: the lifecycle machine, its controllers and its
/// auto-saves, wired to a core and a host.
pub struct Session<C: CoreProxy, H: HostServices> {
    core: C,
    host: H,
    machine: LifecycleMachine,
    autosaves: AutoSaveRotation,
    demux: Demultiplexer,
    plan: SetupPlan,
}

impl<C: CoreProxy, H: HostServices> Session<C, H> {
    /// Validates the configuration, initializes the core and activates the
    /// controllers. The engine is not started; that happens on the first
    /// lifecycle event that allows it.
    pub fn new(config: SessionConfig, mut core: C, mut host: H) -> Result<Self, SessionError> {
        let content_path = config
            .content_path
            .ok_or(SessionError::MissingParameter("content path"))?;
        let content_id = config
            .content_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingParameter("content id"))?;

        let base_name = save_base_name(&content_id);
        let autosaves = AutoSaveRotation::open(
            config.autosave_root.join(&base_name),
            base_name,
            config.autosave_cap,
        )?;

        core.initialize(&CoreConfig {
            content_path,
            content_id,
            cheat_args: config.cheat_args,
            fresh_start: config.fresh_start,
        });

        let mut demux = Demultiplexer::new();
        for surface in config.touch_surfaces {
            let controller = TouchController::new(PlayerIndex::ONE, surface.layout, surface.auto_hold);
            demux.register(SourceFilter::only(surface.source), Box::new(controller));
        }

        let mut player_map = config.player_map;
        if let Some(connected) = &config.connected_devices {
            player_map.remove_unavailable(connected);
        }

        let mut profiles = config.profiles;
        let mut seen = BTreeSet::new();
        profiles.retain(|p| {
            let first = seen.insert(p.player);
            if !first {
                warn!("ignoring duplicate profile for {}", p.player);
            }
            first
        });

        let plan = plan_activation(
            &profiles,
            config.declared_players,
            &player_map,
            config.mapping_reminder,
        );
        for profile in profiles.iter().filter(|p| plan.active.contains(&p.player)) {
            let binding = ControllerBinding {
                player: profile.player,
                source_filter: SourceFilter::PERIPHERAL,
                calibration: profile.calibration,
                accessory: profile.accessory,
            };
            core.set_player_accessory(binding.player, binding.accessory);
            let filter = binding.source_filter;
            let controller =
                PeripheralController::new(binding, profile.map.clone(), player_map.clone());
            demux.register(filter, Box::new(controller));
        }
        if !plan.is_complete() {
            info!("players without a mapped device: {:?}", plan.unmapped);
            host.prompt_for_unmapped_players(&plan.unmapped);
        }
        info!(
            "session ready: {} input sink(s), active players {:?}",
            demux.len(),
            plan.active
        );

        let machine = LifecycleMachine::new(
            MachineConfig {
                cold_start: config.cold_start,
                fresh_start: config.fresh_start,
                fast_speed: config.fast_speed,
            },
            RenderContext::new(false),
        );

        Ok(Self {
            core,
            host,
            machine,
            autosaves,
            demux,
            plan,
        })
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Direct access to the core, for hosts that drive it between events.
    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn autosaves(&self) -> &AutoSaveRotation {
        &self.autosaves
    }

    /// Players whose controllers were activated at setup.
    pub fn active_players(&self) -> &[PlayerIndex] {
        &self.plan.active
    }

    /// Flag the rendering thread updates when its context comes and goes.
    pub fn render_context(&self) -> RenderContext {
        self.machine.render_context().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_terminated()
    }

    /// Feeds one lifecycle event through the machine and carries out the
    /// resulting commands in order. Returns the commands for inspection.
    pub fn handle(&mut self, event: LifecycleEvent) -> Vec<Command> {
        let commands = self.machine.handle(event, &self.core, &self.autosaves);
        for command in &commands {
            self.execute(command);
        }
        commands
    }

    fn execute(&mut self, command: &Command) {
        info!("{command:?}");
        match command {
            Command::Startup { auto_save } => self.core.startup(auto_save.as_deref()),
            Command::Resume => self.core.resume(),
            Command::Pause {
                force_auto_save,
                save_path,
            } => self.core.pause(*force_auto_save, save_path.as_deref()),
            Command::RecordAutoSave(path) => {
                self.autosaves.record_snapshot(path.clone());
            }
            Command::Shutdown => self.core.shutdown(),
            Command::Restart => self.core.restart(),
            Command::AdvanceFrame => self.core.advance_frame(),
            Command::SetSpeed(percent) => self.core.set_speed(*percent),
            Command::SetSlot(slot) => self.core.set_slot(*slot),
            Command::ToggleFrameLimiter => self.core.toggle_frame_limiter(),
            Command::SetAccessory { player, kind } => self.core.set_player_accessory(*player, *kind),
            Command::RequestConfirmation(ConfirmationKind::Exit) => {
                self.host.request_exit_confirmation()
            }
            Command::RequestConfirmation(ConfirmationKind::Restart) => {
                self.host.request_restart_confirmation()
            }
            Command::OpenOverlay => self.host.open_overlay(),
            Command::DismissOverlay => self.host.dismiss_overlay(),
            Command::Finish => self.host.finish(),
        }
    }

    /// Routes one raw input event. Reserved keys drive the session itself;
    /// everything else reaches the controllers only while the game has the
    /// screen. Returns whether the event was handled.
    pub fn on_input(&mut self, event: &InputEvent) -> bool {
        if event.is_reserved_key() {
            match event.key_down() {
                Some(keycodes::MENU) => {
                    self.handle(LifecycleEvent::MenuKey);
                }
                Some(keycodes::BACK) => {
                    self.handle(LifecycleEvent::BackKey);
                }
                _ => {}
            }
            return true;
        }

        if !self.machine.routes_controller_input() {
            debug!("overlay has input focus; {:?} event not routed", event.source);
            return false;
        }
        self.demux.dispatch(event, &mut self.core)
    }
}
