//! Main ledger orchestration layer
//!
//! This module ties together storage, address derivation, the writer actor
//! and metrics into a high-level API for campaigns and votes.
//!
//! # Example
//!
//! ```no_run
//! use vote_ledger::{Config, Ledger, OpenCampaignRequest, Pubkey};
//!
//! #[tokio::main]
//! async fn main() -> vote_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let campaign = ledger
//!         .open_campaign(OpenCampaignRequest {
//!             description: "Best lang?".to_string(),
//!             options: vec!["Rust".to_string(), "Go".to_string()],
//!             duration_seconds: 3600,
//!             creator: Pubkey::new([1u8; 32]),
//!             now: chrono::Utc::now().timestamp(),
//!         })
//!         .await?;
//!     println!("opened {}", campaign);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    address::AddressDeriver,
    metrics::Metrics,
    query::{CampaignFilter, CampaignQuery},
    storage::{RepairReport, StorageStats},
    transition::{CastVoteRequest, OpenCampaignRequest, TransitionProcessor, TransitionRequest},
    types::{
        Address, Campaign, Pubkey, SignedTransition, TransitionOutcome, UnixTimestamp, VoteReceipt,
    },
    Config, Error, Result, Storage,
};
use std::sync::Arc;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for transitions
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Address derivation for this namespace
    deriver: AddressDeriver,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        // Open storage
        let storage = Arc::new(Storage::open(&config)?);

        let deriver = AddressDeriver::new(&config.namespace);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        // Spawn actor
        let processor = TransitionProcessor::new(storage.clone(), deriver);
        let handle = spawn_ledger_actor(
            processor,
            storage.clone(),
            metrics.clone(),
            config.actor.mailbox_capacity,
        );

        tracing::info!(
            namespace = %config.namespace,
            namespace_id = %hex::encode(deriver.namespace_id()),
            data_dir = ?config.data_dir,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            deriver,
            metrics,
            config,
        })
    }

    // Transitions

    /// Open a campaign on behalf of `request.creator`
    pub async fn open_campaign(&self, request: OpenCampaignRequest) -> Result<Address> {
        match self
            .handle
            .apply(TransitionRequest::OpenCampaign(request))
            .await?
        {
            TransitionOutcome::CampaignOpened { campaign } => Ok(campaign),
            other => Err(unexpected_outcome(other)),
        }
    }

    /// Cast a vote on behalf of `request.voter`; returns the option's new count
    pub async fn cast_vote(&self, request: CastVoteRequest) -> Result<u64> {
        match self.handle.apply(TransitionRequest::CastVote(request)).await? {
            TransitionOutcome::VoteCast { votes, .. } => Ok(votes),
            other => Err(unexpected_outcome(other)),
        }
    }

    /// Verify a signed transition and apply it with the signer as identity
    pub async fn submit(
        &self,
        signed: SignedTransition,
        now: UnixTimestamp,
    ) -> Result<TransitionOutcome> {
        if let Err(e) = signed.verify() {
            self.metrics.record_rejection(e.code());
            tracing::warn!(signer = %signed.signer, error = %e, "Signed transition rejected");
            return Err(e);
        }

        let request = signed.transition.into_request(signed.signer, now);
        self.handle.apply(request).await
    }

    /// Run the tally repair pass through the writer
    pub async fn reconcile(&self) -> Result<RepairReport> {
        self.handle.reconcile().await
    }

    // Queries

    /// Get a campaign, checking that it re-derives to `address`
    pub fn get_campaign(&self, address: &Address) -> Result<Campaign> {
        let campaign = self.storage.get_campaign(address)?;
        self.deriver.verify_campaign(address, &campaign)?;
        tracing::debug!(campaign = %address, "Campaign loaded");
        Ok(campaign)
    }

    /// List campaigns matching `filter` at `now` (lazy, unordered)
    pub fn list_campaigns(
        &self,
        filter: CampaignFilter,
        now: UnixTimestamp,
    ) -> Result<CampaignQuery<'_>> {
        Ok(CampaignQuery::new(self.storage.campaigns()?, filter, now))
    }

    /// Whether `voter` already voted in `campaign`
    pub fn has_voted(&self, campaign: &Address, voter: &Pubkey) -> Result<bool> {
        let (receipt, _) = self.deriver.receipt_address(campaign, voter)?;
        self.storage.receipt_exists(&receipt)
    }

    /// Get the receipt of `voter` in `campaign`
    pub fn get_receipt(&self, campaign: &Address, voter: &Pubkey) -> Result<VoteReceipt> {
        let (address, _) = self.deriver.receipt_address(campaign, voter)?;
        let receipt = self.storage.get_receipt(&address)?;
        self.deriver.verify_receipt(&address, &receipt)?;
        Ok(receipt)
    }

    /// Address a campaign by `creator` with `description` has (or would have)
    pub fn campaign_address(&self, creator: &Pubkey, description: &str) -> Result<Address> {
        Ok(self.deriver.campaign_address(creator, description)?.0)
    }

    /// Approximate record counts
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

fn unexpected_outcome(outcome: TransitionOutcome) -> Error {
    Error::Concurrency(format!("Actor replied with mismatched outcome {:?}", outcome))
}
