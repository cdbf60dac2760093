//! Core types for the ledger
//!
//! All records are designed for:
//! - Deterministic serialization (bincode)
//! - Derived identity: a record's address is computed from its own fields
//! - Append/accumulate-only lifecycle (no deletes, counters only grow)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch
pub type UnixTimestamp = i64;

/// Identity of a campaign creator or voter (Ed25519 public key bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// Create from raw key bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Derived record address (32 bytes, never a valid Ed25519 point)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get address bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Rebuild from a storage key
    pub fn from_key(key: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = key.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One selectable choice within a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option text
    pub description: String,

    /// Votes received so far (monotonically non-decreasing)
    pub votes: u64,
}

impl PollOption {
    /// Create an option with no votes
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            votes: 0,
        }
    }
}

/// A voting question with a fixed, ordered option list and a time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Question text (address seed)
    pub description: String,

    /// Identity that opened the campaign (address seed)
    pub creator: Pubkey,

    /// Options in creation order; the index is the stable vote target
    pub options: Vec<PollOption>,

    /// Creation time (seconds since epoch)
    pub created_at: UnixTimestamp,

    /// End of the voting window, exclusive (seconds since epoch)
    pub ends_at: UnixTimestamp,

    /// Canonicalization marker of the derived address
    pub bump: u8,
}

impl Campaign {
    /// Current vote counters in option order
    pub fn tally(&self) -> Vec<u64> {
        self.options.iter().map(|option| option.votes).collect()
    }
}

/// Proof that an identity voted in a campaign; its existence blocks a second vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    /// Campaign address (address seed)
    pub campaign: Address,

    /// Identity that cast the vote (address seed)
    pub voter: Pubkey,

    /// Chosen option
    pub option_index: u8,

    /// Time the vote was cast (seconds since epoch)
    pub cast_at: UnixTimestamp,

    /// Canonicalization marker of the derived address
    pub bump: u8,
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

/// Transition payload as submitted by a signer
///
/// The signer's identity is the creator or voter; the ledger supplies `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Open a new campaign
    OpenCampaign {
        /// Question text
        description: String,
        /// Option texts in display order
        options: Vec<String>,
        /// Length of the voting window
        duration_seconds: i64,
    },

    /// Cast a vote into an existing campaign
    CastVote {
        /// Campaign address
        campaign: Address,
        /// Chosen option
        option_index: u8,
    },
}

impl Transition {
    /// Canonical bytes covered by the signature
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// A transition together with its signer and signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransition {
    /// The signed payload
    pub transition: Transition,

    /// Identity of the signer
    pub signer: Pubkey,

    /// Signature over [`Transition::canonical_bytes`]
    pub signature: Signature,
}

/// Result of an applied transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// A campaign was created at this address
    CampaignOpened {
        /// Address of the new campaign
        campaign: Address,
    },

    /// A vote was recorded
    VoteCast {
        /// Campaign voted in
        campaign: Address,
        /// Chosen option
        option_index: u8,
        /// New counter value of the chosen option
        votes: u64,
    },
}
