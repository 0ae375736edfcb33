//! Property-based tests for the aggregation core
//!
//! Uses proptest to generate random operation sequences and verify the
//! ledger's invariants hold.

use std::sync::Arc;

use proptest::prelude::*;

use ciphersum::ledger::{BatchLedger, Fingerprint, RateLimiter};
use ciphersum::prelude::*;

// =============================================================================
// PROPTEST STRATEGIES
// =============================================================================

/// Strategy for generating random 32-byte arrays
fn bytes32() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

/// Strategy for open/close sequences (true = open, false = close attempt)
fn op_sequence() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..40)
}

// =============================================================================
// BATCH SEQUENCING
// =============================================================================

proptest! {
    /// Property: batch ids are strictly increasing and never reused, for
    /// any interleaving of open and close calls
    #[test]
    fn batch_ids_strictly_increase(ops in op_sequence()) {
        let mut batches = BatchLedger::new();
        let mut opened = Vec::new();

        for op in ops {
            if op {
                opened.push(batches.open_new_batch());
            } else {
                // Close attempts may fail (nothing open / already closed);
                // they must never mint or reuse an id.
                let _ = batches.close_current_batch();
            }
        }

        for pair in opened.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        if let Some(first) = opened.first() {
            prop_assert_eq!(*first, 1);
        }
        prop_assert_eq!(opened.len(), batches.count());
    }

    /// Property: a closed batch stays closed no matter what follows
    #[test]
    fn close_is_permanent(extra_opens in 0usize..10) {
        let mut batches = BatchLedger::new();
        batches.open_new_batch();
        batches.close_current_batch().unwrap();

        for _ in 0..extra_opens {
            batches.open_new_batch();
        }
        prop_assert!(batches.batch(1).unwrap().closed);
    }
}

// =============================================================================
// RATE LIMITING
// =============================================================================

proptest! {
    /// Property: a second same-class action is allowed iff the cooldown
    /// has fully elapsed
    #[test]
    fn cooldown_boundary_is_exact(
        cooldown in 1u64..100_000,
        start in 0u64..1_000_000,
        delta in 0u64..200_000,
    ) {
        let mut limiter = RateLimiter::new(cooldown).unwrap();
        let provider = ActorId::from_bytes([1u8; 32]);

        limiter
            .check_and_record(&provider, ActionClass::Submission, start)
            .unwrap();
        let second = limiter.check_and_record(
            &provider,
            ActionClass::Submission,
            start + delta,
        );

        if delta >= cooldown {
            prop_assert!(second.is_ok());
        } else {
            let is_cooldown =
                matches!(second, Err(LedgerError::CooldownActive { .. }));
            prop_assert!(is_cooldown);
        }
    }

    /// Property: one actor's actions never throttle another's
    #[test]
    fn actors_are_isolated(a in bytes32(), b in bytes32(), now in 0u64..1_000_000) {
        prop_assume!(a != b);

        let mut limiter = RateLimiter::new(3600).unwrap();
        limiter
            .check_and_record(&ActorId::from_bytes(a), ActionClass::Submission, now)
            .unwrap();
        prop_assert!(limiter
            .check_and_record(&ActorId::from_bytes(b), ActionClass::Submission, now)
            .is_ok());
    }
}

// =============================================================================
// FINGERPRINTS
// =============================================================================

proptest! {
    /// Property: fingerprinting is deterministic
    #[test]
    fn fingerprint_is_deterministic(
        data in prop::collection::vec(any::<u8>(), 0..256),
        instance in bytes32(),
    ) {
        prop_assert_eq!(
            Fingerprint::compute(&data, &instance),
            Fingerprint::compute(&data, &instance)
        );
    }

    /// Property: identical ciphertext bytes fingerprint differently on
    /// different ledger instances
    #[test]
    fn fingerprint_binds_instance(
        data in prop::collection::vec(any::<u8>(), 0..256),
        a in bytes32(),
        b in bytes32(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(
            Fingerprint::compute(&data, &a),
            Fingerprint::compute(&data, &b)
        );
    }

    /// Property: any change to the ciphertext bytes changes the fingerprint
    #[test]
    fn fingerprint_detects_drift(
        data in prop::collection::vec(any::<u8>(), 1..256),
        flip in any::<usize>(),
        instance in bytes32(),
    ) {
        let mut mutated = data.clone();
        let idx = flip % mutated.len();
        mutated[idx] ^= 0x01;

        prop_assert_ne!(
            Fingerprint::compute(&data, &instance),
            Fingerprint::compute(&mutated, &instance)
        );
    }
}

// =============================================================================
// END-TO-END AGGREGATION
// =============================================================================

proptest! {
    /// Property: the delivered cleartext equals the sum of contributions,
    /// for any contribution set that fits in u64
    #[test]
    fn decrypted_aggregate_equals_sum(values in prop::collection::vec(0u64..1_000_000, 1..8)) {
        let engine = Arc::new(MockFheEngine::new());
        let owner = ActorId::from_bytes([1u8; 32]);
        let config = LedgerConfig::new(owner).with_cooldown_secs(10);
        let mut ledger = AggregationLedger::new(config, engine.clone()).unwrap();

        ledger.open_new_batch(&owner).unwrap();
        let mut now = 1_000u64;
        for value in &values {
            let delta = engine.encrypt(*value).unwrap();
            ledger.submit_contribution(&owner, &delta, now).unwrap();
            now += 10;
        }
        ledger.close_current_batch(&owner).unwrap();

        let request_id = ledger
            .request_batch_decryption(&owner, 1, now)
            .unwrap();
        let outcome = {
            let mut stream = engine.take_outcome_stream().unwrap();
            stream.try_recv().unwrap()
        };

        prop_assert_eq!(outcome.request_id, request_id);
        prop_assert_eq!(outcome.cleartext, values.iter().sum::<u64>());

        ledger
            .on_decryption_callback(request_id, outcome.cleartext, &outcome.proof)
            .unwrap();
        prop_assert!(matches!(
            ledger.on_decryption_callback(request_id, outcome.cleartext, &outcome.proof),
            Err(LedgerError::ReplayAttempt(_))
        ));
    }
}
