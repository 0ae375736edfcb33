//! Access control
//!
//! Owner plus a provider allow-list plus a pause flag. The owner is seeded
//! into the provider set at construction; afterwards the two roles move
//! independently. Provider changes are idempotent and report whether
//! anything changed so the facade can skip the notification on no-ops.

use std::collections::HashSet;

use crate::actor::ActorId;
use crate::errors::{LedgerError, LedgerResult};

/// Authorization table: owner, providers, pause flag
#[derive(Clone, Debug)]
pub struct AccessControl {
    owner: ActorId,
    providers: HashSet<ActorId>,
    paused: bool,
}

impl AccessControl {
    /// Create with the given owner, who starts as a provider as well
    pub fn new(owner: ActorId) -> Self {
        let mut providers = HashSet::new();
        providers.insert(owner);
        Self {
            owner,
            providers,
            paused: false,
        }
    }

    /// Current owner
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Whether the actor is a registered provider
    pub fn is_provider(&self, actor: &ActorId) -> bool {
        self.providers.contains(actor)
    }

    /// Whether the ledger is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fail unless the actor is the owner
    pub fn ensure_owner(&self, actor: &ActorId) -> LedgerResult<()> {
        if *actor == self.owner {
            Ok(())
        } else {
            Err(LedgerError::NotOwner)
        }
    }

    /// Fail unless the actor is a provider
    pub fn ensure_provider(&self, actor: &ActorId) -> LedgerResult<()> {
        if self.providers.contains(actor) {
            Ok(())
        } else {
            Err(LedgerError::NotProvider)
        }
    }

    /// Fail if the ledger is paused
    pub fn ensure_not_paused(&self) -> LedgerResult<()> {
        if self.paused {
            Err(LedgerError::Paused)
        } else {
            Ok(())
        }
    }

    /// Reassign ownership. Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &ActorId,
        new_owner: ActorId,
    ) -> LedgerResult<ActorId> {
        self.ensure_owner(caller)?;
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }

    /// Add a provider. Returns false when already registered.
    pub fn add_provider(&mut self, caller: &ActorId, provider: ActorId) -> LedgerResult<bool> {
        self.ensure_owner(caller)?;
        Ok(self.providers.insert(provider))
    }

    /// Remove a provider. Returns false when not registered.
    pub fn remove_provider(&mut self, caller: &ActorId, provider: &ActorId) -> LedgerResult<bool> {
        self.ensure_owner(caller)?;
        Ok(self.providers.remove(provider))
    }

    /// Pause the ledger. Fails when already paused.
    pub fn pause(&mut self, caller: &ActorId) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if self.paused {
            return Err(LedgerError::AlreadyPaused);
        }
        self.paused = true;
        Ok(())
    }

    /// Unpause the ledger. Fails when not paused.
    pub fn unpause(&mut self, caller: &ActorId) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if !self.paused {
            return Err(LedgerError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }
}
