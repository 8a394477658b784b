use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use netstrand_transport::ExitOutcome;

use crate::error::ChannelError;

/// Terminal result of a child's run: how it exited, or why it could not be
/// observed.
pub type Outcome = std::result::Result<ExitOutcome, Arc<ChannelError>>;

/// Write-once cell for a child's [`Outcome`].
///
/// The first `settle` wins; later ones are dropped.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    outcome: Mutex<Option<Outcome>>,
    settled: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` unless one is already recorded. Returns whether this
    /// call settled it.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.settled.notify_all();
        true
    }

    pub(crate) fn get(&self) -> Option<Outcome> {
        self.lock().clone()
    }

    pub(crate) fn wait(&self) -> Outcome {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            slot = self
                .settled
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // A panic while holding the lock cannot leave the slot half-written.
    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
