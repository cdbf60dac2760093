//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `vote_ledger_campaigns_opened_total` - Campaigns created
//! - `vote_ledger_votes_cast_total` - Votes recorded
//! - `vote_ledger_transitions_rejected_total` - Rejected transitions, by error code
//! - `vote_ledger_transition_duration_seconds` - Histogram of transition latencies
//! - `vote_ledger_tallies_repaired_total` - Votes restored by the repair pass

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
///
/// Every instance owns its registry, so several ledgers can live in one
/// process (tests open many).
#[derive(Clone)]
pub struct Metrics {
    /// Campaigns created
    pub campaigns_opened: IntCounter,

    /// Votes recorded
    pub votes_cast: IntCounter,

    /// Rejected transitions, labelled by error code
    pub transitions_rejected: IntCounterVec,

    /// Transition duration histogram
    pub transition_duration: Histogram,

    /// Votes restored by tally repair
    pub tallies_repaired: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("campaigns_opened", &self.campaigns_opened.get())
            .field("votes_cast", &self.votes_cast.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let campaigns_opened = IntCounter::new(
            "vote_ledger_campaigns_opened_total",
            "Total number of campaigns opened",
        )?;
        registry.register(Box::new(campaigns_opened.clone()))?;

        let votes_cast = IntCounter::new(
            "vote_ledger_votes_cast_total",
            "Total number of votes recorded",
        )?;
        registry.register(Box::new(votes_cast.clone()))?;

        let transitions_rejected = IntCounterVec::new(
            Opts::new(
                "vote_ledger_transitions_rejected_total",
                "Total number of rejected transitions",
            ),
            &["code"],
        )?;
        registry.register(Box::new(transitions_rejected.clone()))?;

        let transition_duration = Histogram::with_opts(
            HistogramOpts::new(
                "vote_ledger_transition_duration_seconds",
                "Histogram of transition latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(transition_duration.clone()))?;

        let tallies_repaired = IntCounter::new(
            "vote_ledger_tallies_repaired_total",
            "Total number of votes restored by tally repair",
        )?;
        registry.register(Box::new(tallies_repaired.clone()))?;

        Ok(Self {
            campaigns_opened,
            votes_cast,
            transitions_rejected,
            transition_duration,
            tallies_repaired,
            registry,
        })
    }

    /// Record campaign creation
    pub fn record_campaign_opened(&self) {
        self.campaigns_opened.inc();
    }

    /// Record vote
    pub fn record_vote_cast(&self) {
        self.votes_cast.inc();
    }

    /// Record a rejected transition
    pub fn record_rejection(&self, code: &str) {
        self.transitions_rejected.with_label_values(&[code]).inc();
    }

    /// Record transition duration
    pub fn record_transition_duration(&self, duration_seconds: f64) {
        self.transition_duration.observe(duration_seconds);
    }

    /// Record votes restored by a repair pass
    pub fn record_tallies_repaired(&self, votes_restored: u64) {
        self.tallies_repaired.inc_by(votes_restored);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
