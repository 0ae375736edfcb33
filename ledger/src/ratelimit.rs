//! Per-actor rate limiting
//!
//! Submissions and decryption requests are throttled independently per
//! actor under a single shared cooldown duration. `check` and `record` are
//! split so the facade can run every other failure point between them: a
//! failed operation must never advance an actor's timestamp.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::errors::{LedgerError, LedgerResult};

/// Throttled action classes, tracked independently per actor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionClass {
    /// Encrypted contribution submission
    Submission,
    /// Batch decryption request
    DecryptionRequest,
}

/// Cooldown tracker keyed by (actor, action class)
#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown_secs: u64,
    last_action: HashMap<(ActorId, ActionClass), u64>,
}

impl RateLimiter {
    /// Create with the given cooldown. Zero is rejected.
    pub fn new(cooldown_secs: u64) -> LedgerResult<Self> {
        if cooldown_secs == 0 {
            return Err(LedgerError::InvalidCooldown);
        }
        Ok(Self {
            cooldown_secs,
            last_action: HashMap::new(),
        })
    }

    /// Current cooldown duration in seconds
    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    /// Change the shared cooldown. Zero is rejected.
    pub fn set_cooldown_secs(&mut self, cooldown_secs: u64) -> LedgerResult<()> {
        if cooldown_secs == 0 {
            return Err(LedgerError::InvalidCooldown);
        }
        self.cooldown_secs = cooldown_secs;
        Ok(())
    }

    /// Fail with the remaining wait when the actor is still cooling down.
    /// Never mutates state.
    pub fn check(&self, actor: &ActorId, class: ActionClass, now: u64) -> LedgerResult<()> {
        match self.last_action.get(&(*actor, class)) {
            Some(&last) if now < last.saturating_add(self.cooldown_secs) => {
                Err(LedgerError::CooldownActive {
                    remaining_secs: last.saturating_add(self.cooldown_secs) - now,
                })
            }
            _ => Ok(()),
        }
    }

    /// Record an accepted action at `now`
    pub fn record(&mut self, actor: &ActorId, class: ActionClass, now: u64) {
        self.last_action.insert((*actor, class), now);
    }

    /// Combined check-then-record for callers without intermediate
    /// failure points
    pub fn check_and_record(
        &mut self,
        actor: &ActorId,
        class: ActionClass,
        now: u64,
    ) -> LedgerResult<()> {
        self.check(actor, class, now)?;
        self.record(actor, class, now);
        Ok(())
    }
}
