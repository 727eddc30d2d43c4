//! Host-side session layer for an N64 emulation engine.
//!
//! The engine itself is opaque and lives behind [`CoreProxy`]. This crate keeps
//! its run state consistent with the host lifecycle, rotates auto-saves, and
//! routes raw input to per-player controllers. Frontends (the scripted host,
//! platform shells) build a [`Session`] and feed it events.

/// Capped rotation of auto-save files.
pub mod autosave;

/// Touch and profile-driven controllers plus the player setup gate.
pub mod controller;

/// Boundary trait to the emulation engine.
pub mod core_proxy;

pub mod error;

/// Raw input events and the source-filter demultiplexer.
pub mod input;

/// Lifecycle/engine synchronization state machine.
pub mod lifecycle;

/// Glue that owns the machine, the controllers and the rotation.
pub mod session;

pub use autosave::{AutoSaveRotation, AutoSaveSlot};
pub use core_proxy::{CoreConfig, CoreProxy, RunState};
pub use error::SessionError;
pub use lifecycle::{
    ColdStartPolicy, Command, ConfirmationKind, LifecycleEvent, LifecycleMachine, SessionAction,
};
pub use session::{HostServices, Session, SessionConfig, TouchSurface};
