//! Per-target capture generations.
//!
//! "Newest request wins": a capture may only produce user-visible effects while its
//! generation is still the current one for its target. Superseded captures keep running
//! their own cleanup but stop touching the UI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::types::{Generation, TargetId};

#[derive(Debug, Default)]
pub struct CaptureTracker {
    next: AtomicU64,
    current: Mutex<HashMap<TargetId, Generation>>,
}

impl CaptureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a capture on `target`, superseding whatever was current there.
    /// Ids increase across the whole process, not per target.
    pub fn begin(&self, target: &TargetId) -> Generation {
        let generation = Generation(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        let previous = self.table().insert(target.clone(), generation);
        if let Some(previous) = previous {
            debug!(target = %target, %previous, %generation, "Capture superseded");
        }
        generation
    }

    pub fn is_current(&self, target: &TargetId, generation: Generation) -> bool {
        self.table().get(target) == Some(&generation)
    }

    /// Clear the entry only if `generation` is still current; no-op otherwise.
    pub fn end(&self, target: &TargetId, generation: Generation) {
        let mut table = self.table();
        if table.get(target) == Some(&generation) {
            table.remove(target);
        }
    }

    pub fn current(&self, target: &TargetId) -> Option<Generation> {
        self.table().get(target).copied()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<TargetId, Generation>> {
        // The map holds plain values; a panic elsewhere cannot leave it half-updated.
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
