//! Per-chain ingestion workers.
//!
//! The [`Ingestor`] spawns one tokio task per chain. Each task owns a bounded
//! channel and is a strictly ordered event loop:
//!
//! ```text
//! recv event ─▶ check (block, logIndex) strictly increases ─▶ same tx as buffer?
//!                                                              ├─ yes: buffer
//!                                                              └─ no:  flush buffer, then buffer
//! channel closed ─▶ flush ─▶ stop
//! ```
//!
//! A flush hands the buffered transaction to the shared [`Processor`]. Chains
//! run concurrently; the store serialises their units of work.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use ensindex_core::error::IndexerError;
use ensindex_core::handler::DecodedEvent;
use ensindex_core::indexer::IndexerState;
use ensindex_core::types::{ChainId, EventPosition};

use crate::processor::{ProcessOutcome, Processor};

/// Final report of one chain worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub chain_id: ChainId,
    pub state: IndexerState,
    pub last_position: Option<EventPosition>,
    pub outcome: ProcessOutcome,
}

struct ChainWorker {
    chain_id: ChainId,
    processor: Arc<Processor>,
    rx: mpsc::Receiver<DecodedEvent>,
    state: watch::Sender<IndexerState>,
    buffer: Vec<DecodedEvent>,
    last_position: Option<EventPosition>,
    outcome: ProcessOutcome,
}

impl ChainWorker {
    async fn run(mut self) -> Result<WorkerReport, IndexerError> {
        info!(chain_id = self.chain_id, "chain worker started");
        self.state.send_replace(IndexerState::Running);
        match self.consume().await {
            Ok(()) => {
                self.state.send_replace(IndexerState::Stopped);
                info!(
                    chain_id = self.chain_id,
                    transactions = self.outcome.transactions,
                    actions = self.outcome.actions_opened,
                    "chain worker stopped"
                );
                Ok(self.report(IndexerState::Stopped))
            }
            Err(e) => {
                self.state.send_replace(IndexerState::Error);
                error!(
                    chain_id = self.chain_id,
                    last = ?self.last_position,
                    error = %e,
                    "chain worker halted"
                );
                Err(e)
            }
        }
    }

    async fn consume(&mut self) -> Result<(), IndexerError> {
        while let Some(event) = self.rx.recv().await {
            self.accept(&event)?;
            let new_transaction = self
                .buffer
                .first()
                .is_some_and(|b| b.transaction_hash != event.transaction_hash);
            if new_transaction {
                self.flush().await?;
            }
            self.buffer.push(event);
        }
        self.flush().await
    }

    fn accept(&mut self, event: &DecodedEvent) -> Result<(), IndexerError> {
        if event.chain_id != self.chain_id {
            return Err(IndexerError::invalid_event(
                &event.event_name,
                format!("chain {} delivered to worker for chain {}", event.chain_id, self.chain_id),
            ));
        }
        let position = event.position();
        if let Some(previous) = self.last_position {
            if position <= previous {
                return Err(IndexerError::OutOfOrder {
                    chain_id: self.chain_id,
                    previous: previous.to_string(),
                    current: position.to_string(),
                });
            }
        }
        self.last_position = Some(position);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), IndexerError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let transaction = std::mem::take(&mut self.buffer);
        let outcome = self.processor.process_transaction(&transaction).await?;
        self.outcome.absorb(outcome);
        Ok(())
    }

    fn report(&self, state: IndexerState) -> WorkerReport {
        WorkerReport {
            chain_id: self.chain_id,
            state,
            last_position: self.last_position,
            outcome: self.outcome,
        }
    }
}

/// Handle to the running chain workers.
pub struct Ingestor {
    senders: HashMap<ChainId, mpsc::Sender<DecodedEvent>>,
    states: HashMap<ChainId, watch::Receiver<IndexerState>>,
    handles: Vec<(ChainId, JoinHandle<Result<WorkerReport, IndexerError>>)>,
}

impl Ingestor {
    /// Spawn one worker per chain, each with a channel of `capacity` events.
    pub fn spawn(processor: Arc<Processor>, chains: &[ChainId], capacity: usize) -> Self {
        let mut senders = HashMap::new();
        let mut states = HashMap::new();
        let mut handles = Vec::new();
        for &chain_id in chains {
            if senders.contains_key(&chain_id) {
                continue;
            }
            let (tx, rx) = mpsc::channel(capacity.max(1));
            let (state_tx, state_rx) = watch::channel(IndexerState::Idle);
            let worker = ChainWorker {
                chain_id,
                processor: Arc::clone(&processor),
                rx,
                state: state_tx,
                buffer: Vec::new(),
                last_position: None,
                outcome: ProcessOutcome::default(),
            };
            handles.push((chain_id, tokio::spawn(worker.run())));
            senders.insert(chain_id, tx);
            states.insert(chain_id, state_rx);
        }
        Self {
            senders,
            states,
            handles,
        }
    }

    /// Chains with a running worker.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<_> = self.senders.keys().copied().collect();
        chains.sort_unstable();
        chains
    }

    /// Current state of a chain's worker.
    pub fn state(&self, chain_id: ChainId) -> Option<IndexerState> {
        self.states.get(&chain_id).map(|rx| *rx.borrow())
    }

    /// A sender for one chain's worker, for hosts that feed chains from
    /// separate tasks.
    pub fn sender(&self, chain_id: ChainId) -> Option<mpsc::Sender<DecodedEvent>> {
        self.senders.get(&chain_id).cloned()
    }

    /// Route an event to its chain's worker. Waits while the channel is full.
    pub async fn submit(&self, event: DecodedEvent) -> Result<(), IndexerError> {
        let chain_id = event.chain_id;
        let sender = self
            .senders
            .get(&chain_id)
            .ok_or_else(|| IndexerError::Other(format!("no worker for chain {chain_id}")))?;
        sender.send(event).await.map_err(|_| IndexerError::Aborted {
            reason: format!("worker for chain {chain_id} has stopped"),
        })
    }

    /// Close every channel, let the workers drain, and collect their reports.
    ///
    /// Returns the first worker error, in spawn order, if any worker halted.
    pub async fn shutdown(self) -> Result<Vec<WorkerReport>, IndexerError> {
        drop(self.senders);
        let (chains, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut reports = Vec::with_capacity(joined.len());
        let mut first_error = None;
        for (chain_id, result) in chains.into_iter().zip(joined) {
            match result {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(join) => {
                    first_error.get_or_insert(IndexerError::Aborted {
                        reason: format!("worker for chain {chain_id} panicked: {join}"),
                    });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                reports.sort_by_key(|r| r.chain_id);
                Ok(reports)
            }
        }
    }
}
