//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - Every transition goes through one task, so transitions are totally ordered
//! - Async message passing with backpressure (bounded mailbox)
//! - Replies travel back on a oneshot channel per request
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │        TransitionProcessor::apply / reconcile         │
//! │                       │                               │
//! │                       ▼                               │
//! │             Storage::commit_vote()                    │
//! │          (atomic write to RocksDB)                    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Reads do not go through the actor; they hit storage directly.

use crate::metrics::Metrics;
use crate::storage::{RepairReport, Storage};
use crate::transition::{TransitionProcessor, TransitionRequest};
use crate::types::TransitionOutcome;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply a transition
    Apply {
        /// Transition with identity and clock bound
        request: TransitionRequest,
        /// Reply channel
        response: oneshot::Sender<Result<TransitionOutcome>>,
    },

    /// Run the tally repair pass
    Reconcile {
        /// Reply channel
        response: oneshot::Sender<Result<RepairReport>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Transition processor
    processor: TransitionProcessor,

    /// Storage backend
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        processor: TransitionProcessor,
        storage: Arc<Storage>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            processor,
            storage,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Apply { request, response } => {
                    let result = self.apply(request);
                    let _ = response.send(result);
                }

                LedgerMessage::Reconcile { response } => {
                    let result = self.reconcile();
                    let _ = response.send(result);
                }

                LedgerMessage::Shutdown => break,
            }
        }

        tracing::info!("Ledger actor stopped");
    }

    fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        let started = Instant::now();
        let result = self.processor.apply(request);
        self.metrics
            .record_transition_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(TransitionOutcome::CampaignOpened { campaign }) => {
                self.metrics.record_campaign_opened();
                tracing::info!(campaign = %campaign, "Campaign opened");
            }
            Ok(TransitionOutcome::VoteCast {
                campaign,
                option_index,
                votes,
            }) => {
                self.metrics.record_vote_cast();
                tracing::info!(
                    campaign = %campaign,
                    option_index = *option_index,
                    votes = *votes,
                    "Vote cast"
                );
            }
            Err(e) => {
                self.metrics.record_rejection(e.code());
                if e.is_retryable() {
                    tracing::error!(error = %e, code = e.code(), "Transition failed");
                } else {
                    tracing::warn!(
                        error = %e,
                        code = e.code(),
                        replay = e.is_vote_replay(),
                        "Transition rejected"
                    );
                }
            }
        }

        result
    }

    fn reconcile(&self) -> Result<RepairReport> {
        let report = self.storage.reconcile_tallies(self.processor.deriver())?;
        self.metrics.record_tallies_repaired(report.votes_restored);

        tracing::info!(
            receipts = report.receipts_scanned,
            campaigns = report.campaigns_checked,
            restored = report.votes_restored,
            orphans = report.orphan_receipts,
            corrupt = report.corrupt_receipts + report.corrupt_campaigns,
            "Tally repair finished"
        );

        Ok(report)
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Apply a transition
    pub async fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Apply {
                request,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Run the tally repair pass
    pub async fn reconcile(&self) -> Result<RepairReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Reconcile { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    processor: TransitionProcessor,
    storage: Arc<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(processor, storage, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressDeriver;
    use crate::transition::{CastVoteRequest, OpenCampaignRequest};
    use crate::types::Pubkey;
    use crate::Config;

    fn spawn(config: &Config, metrics: Metrics) -> LedgerHandle {
        let storage = Arc::new(Storage::open(config).unwrap());
        let processor = TransitionProcessor::new(storage.clone(), AddressDeriver::new("test"));
        spawn_ledger_actor(processor, storage, metrics, 8)
    }

    fn test_config(temp_dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config
    }

    fn open_request() -> TransitionRequest {
        TransitionRequest::OpenCampaign(OpenCampaignRequest {
            description: "Best lang?".to_string(),
            options: vec!["Rust".to_string(), "Go".to_string()],
            duration_seconds: 3600,
            creator: Pubkey::new([1u8; 32]),
            now: 1_000,
        })
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = spawn(&test_config(&temp_dir), Metrics::new().unwrap());

        handle.shutdown().await.unwrap();

        // Messages queued behind Shutdown are never answered
        let err = handle.reconcile().await.unwrap_err();
        assert_eq!(err.code(), "Concurrency");
    }

    #[tokio::test]
    async fn test_actor_apply_and_metrics() {
        let temp_dir = tempfile::tempdir().unwrap();
        let metrics = Metrics::new().unwrap();
        let handle = spawn(&test_config(&temp_dir), metrics.clone());

        let outcome = handle.apply(open_request()).await.unwrap();
        let TransitionOutcome::CampaignOpened { campaign } = outcome else {
            panic!("expected CampaignOpened, got {:?}", outcome);
        };

        let vote = TransitionRequest::CastVote(CastVoteRequest {
            campaign,
            option_index: 0,
            voter: Pubkey::new([2u8; 32]),
            now: 1_001,
        });
        handle.apply(vote.clone()).await.unwrap();
        let err = handle.apply(vote).await.unwrap_err();
        assert!(err.is_vote_replay());

        assert_eq!(metrics.campaigns_opened.get(), 1);
        assert_eq!(metrics.votes_cast.get(), 1);
        assert_eq!(
            metrics
                .transitions_rejected
                .with_label_values(&["AlreadyVoted"])
                .get(),
            1
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_reconcile() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = spawn(&test_config(&temp_dir), Metrics::new().unwrap());

        let report = handle.reconcile().await.unwrap();
        assert_eq!(report, RepairReport::default());

        handle.shutdown().await.unwrap();
    }
}
