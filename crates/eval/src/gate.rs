//! Per-field completion gates.
//!
//! One gate exists for every field key that has at least one rule targeting
//! it in the current Apply. The gate counts outstanding rule evaluations
//! (zero means settled -- that is what dependency waits block on) and owns
//! the mutual-exclusion slot that serializes rule evaluations targeting the
//! same field, since a rule evaluation may mutate the shared output.
//!
//! Gates are armed fully before any task is dispatched and are never
//! re-armed within one Apply; any number of conditionals may wait on (or
//! arrive after) settlement of the same gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Completion counter plus same-field serialization slot for one field key.
#[derive(Debug)]
pub struct FieldGate {
    outstanding: AtomicUsize,
    settled: Notify,
    slot: Mutex<()>,
}

impl FieldGate {
    /// Gate armed for `outstanding` rule evaluations.
    pub fn armed(outstanding: usize) -> Self {
        FieldGate {
            outstanding: AtomicUsize::new(outstanding),
            settled: Notify::new(),
            slot: Mutex::new(()),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Record one finished rule evaluation, waking waiters when the count
    /// reaches zero. Called exactly once per dispatched task, on every
    /// exit path.
    pub fn complete(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.settled.notify_waiters();
        }
    }

    /// Wait until every rule targeting this field has completed. Returns
    /// immediately when the gate is already settled.
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Acquire the slot serializing rule evaluations on this field.
    pub async fn acquire_slot(&self) -> MutexGuard<'_, ()> {
        self.slot.lock().await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
