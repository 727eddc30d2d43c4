use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use thiserror::Error;
use vibe_session::{LifecycleEvent, RunState, Session, SessionConfig, SessionError};

mod gamepad_codes;
mod host;
mod host_config;
mod script;
mod sim_core;

#[cfg(not(target_os = "android"))]
mod gamepad;

use host::ConsoleHost;
use script::{Script, ScriptError};
use sim_core::SimCore;

#[derive(Parser)]
#[command(author, version, about = "Drives an emulation session from scripts or a gamepad")]
struct Args {
    /// Path to the game content
    content: Option<PathBuf>,

    /// Content identity used to name auto-saves (defaults to the file stem)
    #[arg(long)]
    id: Option<String>,

    /// Host config file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// TOML event script to play instead of reading a gamepad
    #[arg(long)]
    script: Option<PathBuf>,

    /// Number of players the content supports
    #[arg(long, default_value_t = 1)]
    players: u8,

    /// Start from power-on instead of the latest auto-save
    #[arg(long)]
    fresh: bool,

    /// Answer exit/restart confirmations automatically (yes or no)
    #[arg(long, value_parser = parse_answer)]
    confirm: Option<bool>,

    /// Simulated engine command latency in milliseconds
    #[arg(long, default_value_t = 5)]
    latency_ms: u64,

    /// Write the effective host config back to the config file
    #[arg(long)]
    save_config: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_answer(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        other => Err(format!("expected yes or no, got '{other}'")),
    }
}

#[derive(Error, Debug)]
enum HostError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Only live gamepad input has devices to check; scripted devices are
/// whatever the script says.
#[cfg(not(target_os = "android"))]
fn connected_devices(args: &Args) -> Option<Vec<u32>> {
    if args.script.is_some() {
        return None;
    }
    gamepad::connected_devices()
}

#[cfg(target_os = "android")]
fn connected_devices(_args: &Args) -> Option<Vec<u32>> {
    None
}

fn build_session(args: &Args) -> Result<Session<SimCore, ConsoleHost>, HostError> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(host_config::default_host_config_path);
    let cfg = host_config::load_from_file(&config_path);
    if args.save_config
        && let Err(e) = host_config::save_to_file(&config_path, &cfg)
    {
        warn!("Failed to save host config {}: {e}", config_path.display());
    }

    let content_id = args.id.clone().or_else(|| {
        args.content
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
    });

    let session_config = SessionConfig {
        content_path: args.content.clone(),
        content_id,
        cheat_args: None,
        fresh_start: args.fresh,
        declared_players: args.players,
        autosave_root: cfg
            .autosave_dir
            .clone()
            .unwrap_or_else(host_config::default_autosave_dir),
        autosave_cap: cfg.autosave_cap,
        cold_start: cfg.cold_start,
        fast_speed: cfg.fast_speed,
        profiles: cfg.profiles(),
        player_map: cfg.player_map(),
        connected_devices: connected_devices(args),
        mapping_reminder: cfg.mapping_reminder,
        touch_surfaces: cfg.touch_surfaces(),
    };

    let core = SimCore::spawn(Duration::from_millis(args.latency_ms));
    // Nobody can answer a dialog while reading a gamepad.
    let auto_answer = args.confirm.or_else(|| args.script.is_none().then_some(true));
    let host = ConsoleHost::new(auto_answer);
    Ok(Session::new(session_config, core, host)?)
}

/// The console is always visible: report the surface as up and focused.
fn bring_up(session: &mut Session<SimCore, ConsoleHost>) {
    for event in [
        LifecycleEvent::HostResumed(true),
        LifecycleEvent::SurfaceReady(true),
        LifecycleEvent::FocusChanged(true),
        LifecycleEvent::RenderContextReady,
    ] {
        session.handle(event);
    }
}

#[cfg(not(target_os = "android"))]
fn run_live(session: &mut Session<SimCore, ConsoleHost>) {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let (tx, rx) = crossbeam_channel::unbounded();
    let stop = Arc::new(AtomicBool::new(false));
    let Some(handle) = gamepad::spawn_gamepad_thread(tx, Arc::clone(&stop)) else {
        error!("No gamepad backend; use --script instead");
        return;
    };

    bring_up(session);
    info!("Reading gamepad input; press Select to exit");
    while !session.is_finished() {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                session.on_input(&event);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
        script::drain_follow_ups(session);
    }

    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();
}

#[cfg(target_os = "android")]
fn run_live(_session: &mut Session<SimCore, ConsoleHost>) {
    error!("Live input is not available on this platform; use --script");
}

fn run(args: Args) -> Result<(), HostError> {
    let script = args.script.as_deref().map(Script::load).transpose()?;
    let mut session = build_session(&args)?;
    if let Some(id) = session.core().content_id() {
        info!("Session for {id} ready");
    }

    match script {
        Some(script) => {
            let summary = script::play(&mut session, &script);
            info!(
                "Played {} step(s): {} command(s), {} input(s) handled",
                summary.steps, summary.commands, summary.inputs_handled
            );
        }
        None => run_live(&mut session),
    }

    if !session.host().is_finished() {
        info!("Input ended with the session still open");
    } else if !session.core().wait_for(RunState::Unknown, Duration::from_secs(1)) {
        warn!("Engine did not confirm shutdown");
    }
    let frames = session.core().frames();
    let slots = session.autosaves().len();
    info!("Engine ran {frames} frame(s); {slots} auto-save(s) kept");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
