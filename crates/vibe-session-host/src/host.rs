use std::collections::{BTreeSet, VecDeque};

use log::{info, warn};
use vibe_session::controller::PlayerIndex;
use vibe_session::{ConfirmationKind, HostServices, LifecycleEvent};

/// Headless host: overlay requests are acknowledged at once and confirmation
/// dialogs are answered from a fixed policy or left for the script.
#[derive(Debug, Default)]
pub struct ConsoleHost {
    auto_answer: Option<bool>,
    pending: Option<ConfirmationKind>,
    follow_ups: VecDeque<LifecycleEvent>,
    finished: bool,
}

impl ConsoleHost {
    pub fn new(auto_answer: Option<bool>) -> Self {
        Self {
            auto_answer,
            ..Self::default()
        }
    }

    /// Next event the host platform would report back to the session.
    pub fn next_follow_up(&mut self) -> Option<LifecycleEvent> {
        self.follow_ups.pop_front()
    }

    /// Answers the open confirmation dialog, if any.
    pub fn answer(&mut self, confirmed: bool) -> Option<LifecycleEvent> {
        let Some(kind) = self.pending.take() else {
            warn!("No confirmation dialog is open; ignoring answer");
            return None;
        };
        info!(
            "{kind:?} {}",
            if confirmed { "confirmed" } else { "declined" }
        );
        Some(LifecycleEvent::ConfirmationResolved { kind, confirmed })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ask(&mut self, kind: ConfirmationKind) {
        match self.auto_answer {
            Some(confirmed) => {
                info!("{kind:?} requested; answering {confirmed}");
                self.follow_ups
                    .push_back(LifecycleEvent::ConfirmationResolved { kind, confirmed });
            }
            None => {
                info!("{kind:?} requested; waiting for an answer");
                self.pending = Some(kind);
            }
        }
    }
}

impl HostServices for ConsoleHost {
    fn request_exit_confirmation(&mut self) {
        self.ask(ConfirmationKind::Exit);
    }

    fn request_restart_confirmation(&mut self) {
        self.ask(ConfirmationKind::Restart);
    }

    fn prompt_for_unmapped_players(&mut self, players: &BTreeSet<PlayerIndex>) {
        let names: Vec<String> = players.iter().map(ToString::to_string).collect();
        warn!(
            "No input device mapped for {}; map them in the host config",
            names.join(", ")
        );
    }

    fn open_overlay(&mut self) {
        info!("Menu opened");
        self.follow_ups.push_back(LifecycleEvent::OverlayOpened);
    }

    fn dismiss_overlay(&mut self) {
        info!("Menu closed");
        self.follow_ups.push_back(LifecycleEvent::OverlayClosed);
    }

    fn finish(&mut self) {
        info!("Session finished");
        self.finished = true;
    }
}
