//! Vote Ledger
//!
//! Campaign/vote ledger state machine with derived record addresses.
//!
//! # Architecture
//!
//! - **Derived Addresses**: Records are found by hashing their own seed fields
//! - **Single Writer**: One actor task applies every transition
//! - **Atomic Votes**: Receipt and tally commit in one RocksDB write batch
//! - **Repair Pass**: Tallies that fell behind their receipts are restored
//!
//! # Invariants
//!
//! - One vote per voter per campaign: the receipt is the proof
//! - Counters never decrease; option order is fixed at creation
//! - `2 <= options <= 10` and `ends_at - created_at` within one hour to one year
//! - Expiry is computed from `ends_at` and the caller's clock, never stored

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod address;
pub mod storage;
pub mod transition;
pub mod query;
pub mod ledger;
pub mod crypto;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Address, Campaign, PollOption, Pubkey, Signature, SignedTransition, Transition,
    TransitionOutcome, UnixTimestamp, VoteReceipt,
};
pub use address::AddressDeriver;
pub use storage::{RepairReport, Storage, StorageStats};
pub use transition::{CastVoteRequest, OpenCampaignRequest};
pub use query::{CampaignFilter, CampaignStatus};
pub use crypto::KeyPair;
pub use ledger::Ledger;
pub use config::Config;
