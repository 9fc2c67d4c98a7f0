use std::path::PathBuf;
use std::sync::{Mutex, TryLockError};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::domain::errors::{DomainError, Result};

#[derive(Default)]
struct SnapshotState {
    image: Option<Bytes>,
    written_at: Option<Instant>,
}

/// Most recent still image of the stream.
///
/// One mutex guards the image and its timestamp together, so the throttle
/// check, the encode and the replacement happen as a single critical section
/// and readers never observe a half-replaced image.
pub struct SnapshotStore {
    state: Mutex<SnapshotState>,
    mirror_path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SnapshotState::default()),
            mirror_path: None,
        }
    }

    /// Also write every snapshot to `path`, replacing it atomically
    pub fn with_mirror_path(mut self, path: Option<PathBuf>) -> Self {
        self.mirror_path = path;
        self
    }

    /// Replace the image. An `Err` means only the mirror write failed; the
    /// in-memory image has been replaced regardless.
    pub fn write(&self, image: Bytes) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.store(&mut state, image, Instant::now())
    }

    pub fn read(&self) -> Result<Bytes> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.image.clone().ok_or(DomainError::SnapshotUnavailable)
    }

    pub fn last_written(&self) -> Option<Instant> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).written_at
    }

    /// Whether a capture at `now` would write. Never blocks: while another
    /// caller is mid-capture this returns `false`.
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        let state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        Self::due(&state, now, interval)
    }

    /// Run `encode` and store its output if more than `interval` has passed
    /// since the last successful write. Returns whether a write happened.
    ///
    /// The lock is held across the encode so concurrent callers within the
    /// same window serialize and all but the first see the fresh timestamp.
    /// A failed mirror write is logged; the new image is still served.
    pub fn capture_if_due<F>(&self, now: Instant, interval: Duration, encode: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Bytes>,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !Self::due(&state, now, interval) {
            return Ok(false);
        }

        let image = encode()?;
        if let Err(e) = self.store(&mut state, image, now) {
            tracing::warn!("Snapshot mirror not updated: {}", e);
        }
        Ok(true)
    }

    fn due(state: &SnapshotState, now: Instant, interval: Duration) -> bool {
        match state.written_at {
            Some(last) => now.saturating_duration_since(last) > interval,
            None => true,
        }
    }

    fn store(&self, state: &mut SnapshotState, image: Bytes, now: Instant) -> Result<()> {
        let written_at = match state.written_at {
            Some(last) if last > now => last,
            _ => now,
        };
        state.image = Some(image.clone());
        state.written_at = Some(written_at);

        if let Some(path) = &self.mirror_path {
            Self::mirror(path, &image)?;
        }
        Ok(())
    }

    fn mirror(path: &PathBuf, image: &[u8]) -> Result<()> {
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, image)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| DomainError::SnapshotWriteFailed(format!("{}: {}", path.display(), e)))
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
