//! Stand-in engine that runs on its own thread.
//!
//! Commands travel over a channel and take effect whenever the engine thread
//! gets to them, so the run state seen through [`CoreProxy::run_state`] may lag
//! behind the commands just sent, as with a real engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel as cb;
use log::{debug, info, trace, warn};
use vibe_session::controller::{AccessoryKind, ControllerState, PlayerIndex};
use vibe_session::{CoreConfig, CoreProxy, RunState};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug)]
enum EngineCommand {
    Startup(Option<PathBuf>),
    Resume,
    Pause {
        force_auto_save: bool,
        save_path: Option<PathBuf>,
    },
    Shutdown,
    Restart,
    SetSpeed(u32),
    SetSlot(u32),
    ToggleFrameLimiter,
    AdvanceFrame,
    SetAccessory(PlayerIndex, AccessoryKind),
    Input(PlayerIndex, ControllerState),
}

const STATE_UNKNOWN: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_PAUSED: u8 = 2;

struct EngineShared {
    state: AtomicU8,
    speed: AtomicU32,
    slot: AtomicU32,
    frames: AtomicU64,
}

impl EngineShared {
    fn state(&self) -> RunState {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => RunState::Running,
            STATE_PAUSED => RunState::Paused,
            _ => RunState::Unknown,
        }
    }

    fn set_state(&self, state: RunState) {
        let raw = match state {
            RunState::Unknown => STATE_UNKNOWN,
            RunState::Running => STATE_RUNNING,
            RunState::Paused => STATE_PAUSED,
        };
        self.state.store(raw, Ordering::Release);
    }
}

pub struct SimCore {
    tx: cb::Sender<EngineCommand>,
    shared: Arc<EngineShared>,
    handle: Option<JoinHandle<()>>,
    config: Option<CoreConfig>,
}

impl SimCore {
    /// Starts the engine thread. Every command is delayed by `latency` before
    /// it takes effect.
    pub fn spawn(latency: Duration) -> Self {
        let (tx, rx) = cb::unbounded();
        let shared = Arc::new(EngineShared {
            state: AtomicU8::new(STATE_UNKNOWN),
            speed: AtomicU32::new(100),
            slot: AtomicU32::new(0),
            frames: AtomicU64::new(0),
        });
        let shared_clone = Arc::clone(&shared);
        let handle = thread::spawn(move || engine_main(rx, shared_clone, latency));
        Self {
            tx,
            shared,
            handle: Some(handle),
            config: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    pub fn content_id(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.content_id.as_str())
    }

    /// Polls until the engine reports `target` or `timeout` passes.
    pub fn wait_for(&self, target: RunState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.shared.state() != target {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn send(&self, cmd: EngineCommand) {
        if let Err(cb::SendError(cmd)) = self.tx.send(cmd) {
            debug!("engine thread gone; dropping {cmd:?}");
        }
    }
}

impl Drop for SimCore {
    fn drop(&mut self) {
        let _ = self.tx.send(EngineCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl CoreProxy for SimCore {
    fn initialize(&mut self, config: &CoreConfig) {
        info!(
            "Engine configured for {} ({})",
            config.content_id,
            config.content_path.display()
        );
        self.config = Some(config.clone());
    }

    fn startup(&mut self, auto_save: Option<&Path>) {
        self.send(EngineCommand::Startup(auto_save.map(Path::to_path_buf)));
    }

    fn resume(&mut self) {
        self.send(EngineCommand::Resume);
    }

    fn pause(&mut self, force_auto_save: bool, save_path: Option<&Path>) {
        self.send(EngineCommand::Pause {
            force_auto_save,
            save_path: save_path.map(Path::to_path_buf),
        });
    }

    fn shutdown(&mut self) {
        self.send(EngineCommand::Shutdown);
    }

    fn restart(&mut self) {
        self.send(EngineCommand::Restart);
    }

    fn run_state(&self) -> RunState {
        self.shared.state()
    }

    fn speed(&self) -> u32 {
        self.shared.speed.load(Ordering::Relaxed)
    }

    fn set_speed(&mut self, percent: u32) {
        self.send(EngineCommand::SetSpeed(percent));
    }

    fn slot(&self) -> u32 {
        self.shared.slot.load(Ordering::Relaxed)
    }

    fn set_slot(&mut self, slot: u32) {
        self.send(EngineCommand::SetSlot(slot));
    }

    fn toggle_frame_limiter(&mut self) {
        self.send(EngineCommand::ToggleFrameLimiter);
    }

    fn advance_frame(&mut self) {
        self.send(EngineCommand::AdvanceFrame);
    }

    fn set_player_accessory(&mut self, player: PlayerIndex, kind: AccessoryKind) {
        self.send(EngineCommand::SetAccessory(player, kind));
    }

    fn submit_input(&mut self, player: PlayerIndex, state: ControllerState) {
        self.send(EngineCommand::Input(player, state));
    }
}

fn write_state(path: &Path, frames: u64) {
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!("Engine: cannot create {}: {e}", parent.display());
        return;
    }
    match std::fs::write(path, format!("frames = {frames}\n")) {
        Ok(()) => info!("Engine: state saved to {}", path.display()),
        Err(e) => warn!("Engine: failed to save state to {}: {e}", path.display()),
    }
}

fn read_state(path: &Path) -> Option<u64> {
    let text = std::fs::read_to_string(path).ok()?;
    text.trim().strip_prefix("frames = ")?.parse().ok()
}

fn engine_main(rx: cb::Receiver<EngineCommand>, shared: Arc<EngineShared>, latency: Duration) {
    let mut limiter = true;
    loop {
        let cmd = match rx.recv_timeout(FRAME_INTERVAL) {
            Ok(cmd) => cmd,
            Err(cb::RecvTimeoutError::Timeout) => {
                if shared.state() == RunState::Running {
                    let step = if limiter {
                        1
                    } else {
                        u64::from(shared.speed.load(Ordering::Relaxed) / 100).max(1)
                    };
                    shared.frames.fetch_add(step, Ordering::Relaxed);
                }
                continue;
            }
            Err(cb::RecvTimeoutError::Disconnected) => break,
        };

        if !latency.is_zero() {
            thread::sleep(latency);
        }
        trace!("Engine: {cmd:?}");

        match cmd {
            EngineCommand::Startup(auto_save) => {
                let restored = auto_save.as_deref().and_then(read_state);
                match (auto_save, restored) {
                    (Some(path), Some(frames)) => {
                        info!("Engine: restored {} at frame {frames}", path.display());
                        shared.frames.store(frames, Ordering::Relaxed);
                    }
                    (Some(path), None) => {
                        warn!("Engine: unreadable auto-save {}; cold boot", path.display());
                    }
                    (None, _) => info!("Engine: cold boot"),
                }
                shared.set_state(RunState::Running);
            }
            EngineCommand::Resume => shared.set_state(RunState::Running),
            EngineCommand::Pause {
                force_auto_save,
                save_path,
            } => {
                if force_auto_save && let Some(path) = save_path {
                    write_state(&path, shared.frames.load(Ordering::Relaxed));
                }
                shared.set_state(RunState::Paused);
            }
            EngineCommand::Shutdown => {
                shared.set_state(RunState::Unknown);
                info!("Engine: shut down");
                break;
            }
            EngineCommand::Restart => {
                shared.frames.store(0, Ordering::Relaxed);
                info!("Engine: reset");
            }
            EngineCommand::SetSpeed(percent) => shared.speed.store(percent, Ordering::Relaxed),
            EngineCommand::SetSlot(slot) => shared.slot.store(slot, Ordering::Relaxed),
            EngineCommand::ToggleFrameLimiter => limiter = !limiter,
            EngineCommand::AdvanceFrame => {
                if shared.state() == RunState::Paused {
                    shared.frames.fetch_add(1, Ordering::Relaxed);
                }
            }
            EngineCommand::SetAccessory(player, kind) => {
                debug!("Engine: {player} accessory {kind:?}");
            }
            EngineCommand::Input(player, state) => trace!("Engine: {player} {state:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn commands_take_effect_asynchronously() {
        let mut core = SimCore::spawn(Duration::from_millis(20));
        core.startup(None);
        assert_eq!(core.run_state(), RunState::Unknown);
        assert!(core.wait_for(RunState::Running, WAIT));

        core.pause(false, None);
        assert!(core.wait_for(RunState::Paused, WAIT));
        core.shutdown();
        assert!(core.wait_for(RunState::Unknown, WAIT));
    }

    #[test]
    fn forced_pause_writes_restorable_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots").join("game_00000_1.sav");

        let mut core = SimCore::spawn(Duration::ZERO);
        core.startup(None);
        assert!(core.wait_for(RunState::Running, WAIT));
        core.pause(true, Some(&path));
        assert!(core.wait_for(RunState::Paused, WAIT));
        assert!(read_state(&path).is_some());
        core.advance_frame();
        core.shutdown();
        assert!(core.wait_for(RunState::Unknown, WAIT));
        let saved = read_state(&path).unwrap();

        let mut restored = SimCore::spawn(Duration::ZERO);
        restored.startup(Some(&path));
        assert!(restored.wait_for(RunState::Running, WAIT));
        assert!(restored.frames() >= saved);
    }
}
