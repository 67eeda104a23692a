use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const OPEN: u64 = 0;

#[derive(Debug, Default)]
struct GateState {
    /// Generation of the current holder, or `OPEN`.
    holder: AtomicU64,
    generations: AtomicU64,
}

/// Single-flight gate around notification delivery.
///
/// At most one [`GatePermit`] exists at a time. Signals that arrive while a
/// permit is held are dropped, never queued. Each permit carries its own
/// generation and only clears the gate if it is still the holder, so a permit
/// that outlived a [`force_reset`](Self::force_reset) cannot release a newer
/// one.
#[derive(Debug, Clone, Default)]
pub struct NotificationGate {
    state: Arc<GateState>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<GatePermit> {
        if self.is_held() {
            return None;
        }

        let generation = self.state.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.state
            .holder
            .compare_exchange(OPEN, generation, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit {
                state: Arc::clone(&self.state),
                generation,
            })
    }

    pub fn is_held(&self) -> bool {
        self.state.holder.load(Ordering::Acquire) != OPEN
    }

    /// Reopens the gate regardless of who holds it. Only for forced shutdown;
    /// the outstanding permit, if any, becomes inert.
    pub fn force_reset(&self) {
        if self.state.holder.swap(OPEN, Ordering::AcqRel) != OPEN {
            tracing::warn!("Notification gate force-reset while still held");
        }
    }
}

/// Right to notify exactly once. Releasing it (explicitly or on drop) reopens
/// the gate.
#[derive(Debug)]
#[must_use = "dropping the permit immediately reopens the gate"]
pub struct GatePermit {
    state: Arc<GateState>,
    generation: u64,
}

impl GatePermit {
    pub fn exit(self) {}
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let _ = self.state.holder.compare_exchange(
            self.generation,
            OPEN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}
