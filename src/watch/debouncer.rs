//! Event batching for watch mode.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::ModifyKind;
use rustc_hash::FxHashMap;

use crate::debug;

/// Quiet period after the last event before a batch is released.
pub const DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            _ => None,
        }
    }
}

/// Collects changed paths until no event arrived for [`DEBOUNCE_MS`].
#[derive(Debug, Default)]
pub struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: &notify::Event) {
        let Some(kind) = ChangeKind::from_event(&event.kind) else {
            return;
        };
        for path in event.paths.iter().filter(|p| !is_temp_file(p)) {
            self.add(path.clone(), kind);
        }
    }

    fn add(&mut self, path: PathBuf, kind: ChangeKind) {
        debug!("watch"; "{kind:?}: {}", path.display());
        self.last_event = Some(Instant::now());
        match (self.changes.get(&path).copied(), kind) {
            // appeared and vanished inside the window
            (Some(ChangeKind::Created), ChangeKind::Removed) => {
                self.changes.remove(&path);
            }
            (Some(ChangeKind::Removed), _) | (_, ChangeKind::Removed) | (None, _) => {
                self.changes.insert(path, kind);
            }
            _ => {}
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.changes.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Changed paths, sorted, once the window has passed.
    pub fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.changes.drain().map(|(p, _)| p).collect();
        paths.sort();
        Some(paths)
    }

    /// Time until the pending batch may be released.
    pub fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(t) => Duration::from_millis(DEBOUNCE_MS)
                .saturating_sub(t.elapsed())
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(3600),
        }
    }
}

/// Editor swap and backup files.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    matches!(ext, "bak" | "swp" | "swo" | "tmp") || name.ends_with('~') || name.starts_with(".#")
}
