//! Aggregator service integration
//!
//! Ties the aggregation ledger and the FHE engine's asynchronous callback
//! delivery into a unified service. The ledger is held behind an
//! `Arc<RwLock<_>>` so every public operation executes as a single
//! serialized transaction; the engine's outcome stream is consumed by a
//! spawned callback loop that applies each result and republishes ledger
//! events on a broadcast channel for subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use ciphersum_fhe::{CiphertextHandle, DecryptionDelivery, FheEngine, RequestId};
use ciphersum_ledger::{ActorId, AggregationLedger, LedgerConfig, LedgerError, RecordedEvent};

/// Errors during service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Engine no longer exposes an outcome stream")]
    NoOutcomeStream,
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            event_capacity: crate::config::DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// The aggregation service
pub struct AggregatorService<E> {
    /// FHE engine, shared with the ledger
    engine: Arc<E>,
    /// The ledger, serialized behind a write lock
    ledger: Arc<RwLock<AggregationLedger>>,
    /// Event fan-out to subscribers
    events_tx: broadcast::Sender<RecordedEvent>,
    /// Next event sequence number to publish
    event_cursor: Arc<AtomicU64>,
}

impl<E> AggregatorService<E>
where
    E: FheEngine + DecryptionDelivery + 'static,
{
    /// Create a service around a fresh ledger
    pub fn new(
        ledger_config: LedgerConfig,
        config: ServiceConfig,
        engine: Arc<E>,
    ) -> ServiceResult<Self> {
        let shared: Arc<dyn FheEngine> = engine.clone();
        let ledger = AggregationLedger::new(ledger_config, shared)?;
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            engine,
            ledger: Arc::new(RwLock::new(ledger)),
            events_tx,
            event_cursor: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Shared handle to the ledger
    pub fn ledger(&self) -> Arc<RwLock<AggregationLedger>> {
        self.ledger.clone()
    }

    /// Shared handle to the engine
    pub fn engine(&self) -> Arc<E> {
        self.engine.clone()
    }

    /// Subscribe to ledger events published from this point on
    pub fn subscribe_events(&self) -> broadcast::Receiver<RecordedEvent> {
        self.events_tx.subscribe()
    }

    /// Spawn the callback loop consuming the engine's outcome stream.
    ///
    /// Rejected outcomes (replays, late results for drifted state) are
    /// expected under at-least-once delivery: they are logged and the
    /// loop keeps running.
    pub fn start_callback_loop(&self) -> ServiceResult<tokio::task::JoinHandle<()>> {
        let mut outcomes = self
            .engine
            .take_outcome_stream()
            .ok_or(ServiceError::NoOutcomeStream)?;
        let ledger = self.ledger.clone();
        let events_tx = self.events_tx.clone();
        let cursor = self.event_cursor.clone();

        Ok(tokio::spawn(async move {
            while let Some(outcome) = outcomes.recv().await {
                let mut guard = ledger.write().await;
                match guard.on_decryption_callback(
                    outcome.request_id,
                    outcome.cleartext,
                    &outcome.proof,
                ) {
                    Ok(()) => {
                        info!(request_id = outcome.request_id, "decryption result accepted")
                    }
                    Err(e) => warn!(
                        request_id = outcome.request_id,
                        error = %e,
                        "decryption result rejected"
                    ),
                }
                publish_events(&guard, &events_tx, &cursor);
            }
            debug!("outcome stream closed, callback loop exiting");
        }))
    }

    /// Register a provider
    pub async fn add_provider(&self, caller: &ActorId, provider: ActorId) -> ServiceResult<()> {
        let mut guard = self.ledger.write().await;
        guard.add_provider(caller, provider)?;
        publish_events(&guard, &self.events_tx, &self.event_cursor);
        info!(provider = %provider, "provider registered");
        Ok(())
    }

    /// Open a new batch. Returns the new batch id.
    pub async fn open_batch(&self, caller: &ActorId) -> ServiceResult<u64> {
        let mut guard = self.ledger.write().await;
        let batch_id = guard.open_new_batch(caller)?;
        publish_events(&guard, &self.events_tx, &self.event_cursor);
        info!(batch_id, "batch opened");
        Ok(batch_id)
    }

    /// Close the current batch. Returns the closed batch id.
    pub async fn close_batch(&self, caller: &ActorId) -> ServiceResult<u64> {
        let mut guard = self.ledger.write().await;
        let batch_id = guard.close_current_batch(caller)?;
        publish_events(&guard, &self.events_tx, &self.event_cursor);
        info!(batch_id, "batch closed");
        Ok(batch_id)
    }

    /// Submit an encrypted contribution to the current batch
    pub async fn submit_contribution(
        &self,
        caller: &ActorId,
        delta: &CiphertextHandle,
    ) -> ServiceResult<u64> {
        let mut guard = self.ledger.write().await;
        let batch_id = guard.submit_contribution(caller, delta, unix_now())?;
        publish_events(&guard, &self.events_tx, &self.event_cursor);
        info!(batch_id, provider = %caller, "contribution added");
        Ok(batch_id)
    }

    /// Request decryption of a closed batch's aggregate
    pub async fn request_decryption(
        &self,
        caller: &ActorId,
        batch_id: u64,
    ) -> ServiceResult<RequestId> {
        let mut guard = self.ledger.write().await;
        let request_id = guard.request_batch_decryption(caller, batch_id, unix_now())?;
        publish_events(&guard, &self.events_tx, &self.event_cursor);
        info!(request_id, batch_id, "decryption requested");
        Ok(request_id)
    }
}

/// Send every not-yet-published event to subscribers
fn publish_events(
    ledger: &AggregationLedger,
    events_tx: &broadcast::Sender<RecordedEvent>,
    cursor: &AtomicU64,
) {
    let from = cursor.load(Ordering::Acquire);
    for entry in ledger.events_since(from) {
        // A send error only means nobody is subscribed right now
        let _ = events_tx.send(entry.clone());
    }
    cursor.store(ledger.events().len() as u64, Ordering::Release);
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
