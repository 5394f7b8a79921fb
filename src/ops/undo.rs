use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::task::Task;

/// A deleted task that can still be restored until `deadline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelete {
    pub task: Task,
    pub deadline: DateTime<Utc>,
}

impl PendingDelete {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.deadline
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }
}

/// Single-slot holding area for the most recent deletion.
///
/// There is no timer: the slot carries an expiring token and every access
/// checks it against the caller's clock. Replacing or clearing the token is
/// the only form of cancellation.
#[derive(Debug, Clone, Default)]
pub struct PendingDeleteSlot {
    pending: Option<PendingDelete>,
}

impl PendingDeleteSlot {
    /// Put a freshly deleted task in the slot. Returns the previous
    /// occupant, which is now final.
    pub fn hold(&mut self, task: Task, now: DateTime<Utc>, window: Duration) -> Option<PendingDelete> {
        self.pending.replace(PendingDelete {
            task,
            deadline: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }

    /// Clear the slot if its deadline has passed, returning what expired.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<PendingDelete> {
        if self.pending.as_ref().is_some_and(|p| !p.is_live(now)) {
            return self.pending.take();
        }
        None
    }

    pub fn peek(&self) -> Option<&PendingDelete> {
        self.pending.as_ref()
    }

    /// Reinstate a token loaded from storage. Expired tokens are ignored.
    pub fn restore(&mut self, token: PendingDelete, now: DateTime<Utc>) {
        if token.is_live(now) {
            self.pending = Some(token);
        }
    }

    pub fn clear(&mut self) -> Option<PendingDelete> {
        self.pending.take()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
