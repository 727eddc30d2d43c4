//! Capped rotation of auto-save files.
//!
//! Slots are named `<base>_<index>_<unix-secs>.sav` inside a session-scoped
//! directory. The index increases monotonically and defines the age order, so
//! a clock that jumps backwards never reorders slots.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::error::SessionError;

const SLOT_EXTENSION: &str = "sav";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveSlot {
    pub index: u64,
    pub path: PathBuf,
    pub created_at: SystemTime,
}

#[derive(Debug)]
pub struct AutoSaveRotation {
    dir: PathBuf,
    base_name: String,
    cap: usize,
    slots: VecDeque<AutoSaveSlot>,
    next_index: u64,
}

impl AutoSaveRotation {
    /// Creates an empty rotation without touching the file system.
    pub fn new(dir: impl Into<PathBuf>, base_name: impl Into<String>, cap: usize) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            cap,
            slots: VecDeque::new(),
            next_index: 0,
        }
    }

    /// Creates the session directory if needed and adopts the slots already
    /// present for `base_name`, pruning them down to `cap`.
    pub fn open(
        dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
        cap: usize,
    ) -> Result<Self, SessionError> {
        let mut rotation = Self::new(dir, base_name, cap);
        let dir_err = |source: io::Error, path: &Path| SessionError::AutoSaveDir {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(&rotation.dir).map_err(|e| dir_err(e, &rotation.dir))?;
        let entries = std::fs::read_dir(&rotation.dir).map_err(|e| dir_err(e, &rotation.dir))?;

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some((index, secs)) = parse_slot_name(&rotation.base_name, name) {
                found.push(AutoSaveSlot {
                    index,
                    created_at: UNIX_EPOCH + Duration::from_secs(secs),
                    path,
                });
            }
        }
        found.sort_by_key(|slot| slot.index);

        rotation.next_index = found.last().map_or(0, |slot| slot.index + 1);
        rotation.slots = found.into();
        debug!(
            "auto-save rotation {} opened with {} slot(s)",
            rotation.dir.display(),
            rotation.slots.len()
        );
        rotation.prune();
        Ok(rotation)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots from oldest to newest.
    pub fn slots(&self) -> impl Iterator<Item = &AutoSaveSlot> {
        self.slots.iter()
    }

    /// Path the next auto-save should be written to.
    pub fn next_slot_path(&self) -> PathBuf {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.dir.join(format!(
            "{}_{:05}_{secs}.{SLOT_EXTENSION}",
            self.base_name, self.next_index
        ))
    }

    /// Path of the most recently created slot.
    pub fn latest_snapshot_path(&self) -> Option<&Path> {
        self.slots.back().map(|slot| slot.path.as_path())
    }

    /// Appends a slot for `path` and prunes the oldest slots until the cap
    /// holds again. Returns the pruned slots, oldest first.
    pub fn record_snapshot(&mut self, path: impl Into<PathBuf>) -> Vec<AutoSaveSlot> {
        let slot = AutoSaveSlot {
            index: self.next_index,
            path: path.into(),
            created_at: SystemTime::now(),
        };
        self.next_index += 1;
        info!("recorded auto-save {}", slot.path.display());
        self.slots.push_back(slot);
        self.prune()
    }

    fn prune(&mut self) -> Vec<AutoSaveSlot> {
        let excess = self.slots.len().saturating_sub(self.cap);
        let pruned: Vec<_> = self.slots.drain(..excess).collect();
        for slot in &pruned {
            match std::fs::remove_file(&slot.path) {
                Ok(()) => debug!("pruned auto-save {}", slot.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to delete old auto-save {}: {e}",
                    slot.path.display()
                ),
            }
        }
        pruned
    }
}

/// Parses `<base>_<index>_<secs>.sav` into `(index, secs)`.
fn parse_slot_name(base_name: &str, file_name: &str) -> Option<(u64, u64)> {
    let stem = file_name.strip_suffix(SLOT_EXTENSION)?.strip_suffix('.')?;
    let rest = stem.strip_prefix(base_name)?.strip_prefix('_')?;
    let (index, secs) = rest.split_once('_')?;
    Some((index.parse().ok()?, secs.parse().ok()?))
}
