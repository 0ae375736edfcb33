//! Batch sequencing and encrypted aggregates
//!
//! Batch ids are allocated strictly increasing from 1; id 0 is reserved and
//! never a real batch. A batch moves Open -> Closed exactly once and never
//! reopens. The "current" batch — the only contribution target — is the
//! most recently opened id, whether or not older batches are still open.
//!
//! An aggregate starts uninitialized and is lazily set to the engine's zero
//! ciphertext on the first contribution. After that it is mutated only by
//! homomorphic add; decryption happens out of band through the oracle and
//! never alters the stored ciphertext.

use std::collections::BTreeMap;

use ciphersum_fhe::{CiphertextHandle, FheEngine};

use crate::errors::{LedgerError, LedgerResult};

/// Encrypted aggregate of a batch
#[derive(Clone, Debug, Default)]
pub struct EncryptedAggregate {
    handle: Option<CiphertextHandle>,
}

impl EncryptedAggregate {
    /// Whether the aggregate has been touched by a contribution
    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// The current ciphertext, if initialized
    pub fn handle(&self) -> Option<&CiphertextHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn set(&mut self, handle: CiphertextHandle) {
        self.handle = Some(handle);
    }
}

/// A contribution batch
#[derive(Clone, Debug)]
pub struct Batch {
    /// Sequential id, starting at 1
    pub id: u64,
    /// Whether the batch is closed to further contributions
    pub closed: bool,
    /// Encrypted running total
    pub aggregate: EncryptedAggregate,
}

/// Summary of a batch for external observers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchInfo {
    pub id: u64,
    pub closed: bool,
    pub initialized: bool,
}

/// Batch store with sequential id allocation
#[derive(Clone, Debug)]
pub struct BatchLedger {
    batches: BTreeMap<u64, Batch>,
    next_id: u64,
    /// Most recently opened batch id; 0 = none opened yet
    current_id: u64,
}

impl BatchLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            batches: BTreeMap::new(),
            next_id: 1,
            current_id: 0,
        }
    }

    /// Number of batches ever opened
    pub fn count(&self) -> usize {
        self.batches.len()
    }

    /// Id of the current contribution target, if any batch was opened
    pub fn current_id(&self) -> Option<u64> {
        if self.current_id == 0 {
            None
        } else {
            Some(self.current_id)
        }
    }

    /// Look up a batch by id
    pub fn batch(&self, id: u64) -> Option<&Batch> {
        self.batches.get(&id)
    }

    /// Summary of a batch by id
    pub fn info(&self, id: u64) -> Option<BatchInfo> {
        self.batches.get(&id).map(|b| BatchInfo {
            id: b.id,
            closed: b.closed,
            initialized: b.aggregate.is_initialized(),
        })
    }

    /// Open a new batch and make it current. Returns the new id.
    ///
    /// The previous current batch is not required to be closed first; an
    /// older open batch simply stops being the contribution target.
    pub fn open_new_batch(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.batches.insert(
            id,
            Batch {
                id,
                closed: false,
                aggregate: EncryptedAggregate::default(),
            },
        );
        self.current_id = id;
        id
    }

    /// Close the current batch. Returns its id.
    pub fn close_current_batch(&mut self) -> LedgerResult<u64> {
        let batch = self
            .batches
            .get_mut(&self.current_id)
            .ok_or(LedgerError::BatchClosedOrInvalid)?;
        if batch.closed {
            return Err(LedgerError::BatchClosedOrInvalid);
        }
        batch.closed = true;
        Ok(batch.id)
    }

    /// Merge an encrypted delta into the current batch's aggregate.
    /// Returns the batch id contributed to.
    ///
    /// The merged ciphertext is computed before anything is stored, so an
    /// engine failure leaves the aggregate untouched.
    pub fn merge_contribution(
        &mut self,
        engine: &dyn FheEngine,
        delta: &CiphertextHandle,
    ) -> LedgerResult<u64> {
        let batch = self
            .batches
            .get_mut(&self.current_id)
            .ok_or(LedgerError::BatchClosedOrInvalid)?;
        if batch.closed {
            return Err(LedgerError::BatchClosedOrInvalid);
        }

        let base = match batch.aggregate.handle() {
            Some(handle) => handle.clone(),
            None => engine.zero()?,
        };
        let merged = engine.add(&base, delta)?;

        batch.aggregate.set(merged);
        Ok(batch.id)
    }

    #[cfg(test)]
    pub(crate) fn overwrite_aggregate(&mut self, batch_id: u64, handle: CiphertextHandle) {
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.aggregate.set(handle);
        }
    }
}

impl Default for BatchLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciphersum_fhe::MockFheEngine;

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut ledger = BatchLedger::new();
        assert_eq!(ledger.current_id(), None);

        assert_eq!(ledger.open_new_batch(), 1);
        assert_eq!(ledger.open_new_batch(), 2);
        assert_eq!(ledger.open_new_batch(), 3);
        assert_eq!(ledger.current_id(), Some(3));
        assert_eq!(ledger.count(), 3);
    }

    #[test]
    fn test_close_without_open_fails() {
        let mut ledger = BatchLedger::new();
        assert!(matches!(
            ledger.close_current_batch(),
            Err(LedgerError::BatchClosedOrInvalid)
        ));
    }

    #[test]
    fn test_close_is_terminal() {
        let mut ledger = BatchLedger::new();
        ledger.open_new_batch();
        assert_eq!(ledger.close_current_batch().unwrap(), 1);

        assert!(matches!(
            ledger.close_current_batch(),
            Err(LedgerError::BatchClosedOrInvalid)
        ));
        assert!(ledger.batch(1).unwrap().closed);
    }

    #[test]
    fn test_contribution_lazily_initializes() {
        let engine = MockFheEngine::new();
        let mut ledger = BatchLedger::new();
        ledger.open_new_batch();

        assert!(!ledger.batch(1).unwrap().aggregate.is_initialized());

        let delta = engine.encrypt(5).unwrap();
        assert_eq!(ledger.merge_contribution(&engine, &delta).unwrap(), 1);
        assert!(ledger.batch(1).unwrap().aggregate.is_initialized());
    }

    #[test]
    fn test_contribution_to_closed_batch_fails_without_mutation() {
        let engine = MockFheEngine::new();
        let mut ledger = BatchLedger::new();
        ledger.open_new_batch();

        let delta = engine.encrypt(5).unwrap();
        ledger.merge_contribution(&engine, &delta).unwrap();
        let before = ledger.batch(1).unwrap().aggregate.handle().cloned();

        ledger.close_current_batch().unwrap();
        assert!(matches!(
            ledger.merge_contribution(&engine, &delta),
            Err(LedgerError::BatchClosedOrInvalid)
        ));
        assert_eq!(ledger.batch(1).unwrap().aggregate.handle().cloned(), before);
    }

    #[test]
    fn test_contribution_without_batch_fails() {
        let engine = MockFheEngine::new();
        let mut ledger = BatchLedger::new();
        let delta = engine.encrypt(5).unwrap();

        assert!(matches!(
            ledger.merge_contribution(&engine, &delta),
            Err(LedgerError::BatchClosedOrInvalid)
        ));
    }

    #[test]
    fn test_newest_open_batch_wins() {
        let engine = MockFheEngine::new();
        let mut ledger = BatchLedger::new();

        // Batch 1 stays open but stops being the target once 2 opens.
        ledger.open_new_batch();
        ledger.open_new_batch();

        let delta = engine.encrypt(7).unwrap();
        assert_eq!(ledger.merge_contribution(&engine, &delta).unwrap(), 2);
        assert!(!ledger.batch(1).unwrap().aggregate.is_initialized());
        assert!(ledger.batch(2).unwrap().aggregate.is_initialized());
    }

    #[test]
    fn test_engine_failure_leaves_aggregate_untouched() {
        let engine = MockFheEngine::new();
        let mut ledger = BatchLedger::new();
        ledger.open_new_batch();

        let good = engine.encrypt(5).unwrap();
        ledger.merge_contribution(&engine, &good).unwrap();
        let before = ledger.batch(1).unwrap().aggregate.handle().cloned();

        // A handle the engine cannot parse makes the add fail.
        let garbage = CiphertextHandle::new(vec![0xFF; 4]);
        assert!(ledger.merge_contribution(&engine, &garbage).is_err());
        assert_eq!(ledger.batch(1).unwrap().aggregate.handle().cloned(), before);
    }
}
