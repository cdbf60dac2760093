//! Error types for the ledger

use crate::types::Address;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Validation variants are deterministic and caller-attributable: resubmitting
/// the same request yields the same error. Only [`Error::Unavailable`] and
/// [`Error::Concurrency`] are worth retrying unchanged.
#[derive(Error, Debug)]
pub enum Error {
    /// Campaign or option description is empty (whitespace-only included)
    #[error("Description cannot be empty.")]
    EmptyDescription,

    /// Campaign or option description is longer than allowed
    #[error("Description exceeds the maximum of {max} characters.")]
    DescriptionTooLong {
        /// Maximum number of characters for the field
        max: usize,
    },

    /// Fewer than two options supplied
    #[error("Campaign must have at least two proposals.")]
    NoProposals,

    /// More than ten options supplied
    #[error("Too many proposals. Maximum allowed is 10.")]
    TooManyProposals,

    /// Option index outside the campaign's option list
    #[error("Invalid poll index {index} for a campaign with {len} options.")]
    InvalidPollIndex {
        /// Requested option index
        index: u8,
        /// Number of options in the campaign
        len: usize,
    },

    /// Vote submitted at or after `ends_at`
    #[error("Campaign has ended at {ends_at}.")]
    CampaignExpired {
        /// End of the voting window (seconds since epoch)
        ends_at: i64,
    },

    /// Duration below one hour
    #[error("Campaign duration must be at least 1 hour.")]
    CampaignDurationTooShort,

    /// Duration above one year
    #[error("Campaign duration exceeds maximum allowed (1 year).")]
    CampaignDurationTooLong,

    /// A record already occupies the derived address
    #[error("Record already exists at {0}")]
    AlreadyExists(Address),

    /// A vote receipt already exists for this (campaign, voter) pair
    ///
    /// `replay` is true when the stored receipt chose the same option as the
    /// rejected request, i.e. the request is a retry of a vote that was
    /// already recorded.
    #[error("You have already voted in this poll.")]
    AlreadyVoted {
        /// Address of the existing receipt
        receipt: Address,
        /// Option recorded on the existing receipt
        option_index: u8,
        /// Whether the rejected request repeated the recorded choice
        replay: bool,
    },

    /// No record at the given address
    #[error("Record not found: {0}")]
    NotFound(Address),

    /// Record does not correspond to the address it was loaded from
    #[error("Address mismatch: {0}")]
    AddressMismatch(String),

    /// Option counter would exceed u64::MAX
    #[error("Vote counter overflow on option {0}")]
    VoteOverflow(u8),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// Storage backend failure (RocksDB)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error name used by clients to pick user-facing copy
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyDescription => "EmptyDescription",
            Error::DescriptionTooLong { .. } => "DescriptionTooLong",
            Error::NoProposals => "NoProposals",
            Error::TooManyProposals => "TooManyProposals",
            Error::InvalidPollIndex { .. } => "InvalidPollIndex",
            Error::CampaignExpired { .. } => "CampaignExpired",
            Error::CampaignDurationTooShort => "CampaignDurationTooShort",
            Error::CampaignDurationTooLong => "CampaignDurationTooLong",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::AlreadyVoted { .. } => "AlreadyVoted",
            Error::NotFound(_) => "NotFound",
            Error::AddressMismatch(_) => "AddressMismatch",
            Error::VoteOverflow(_) => "VoteOverflow",
            Error::SignatureError(_) => "SignatureError",
            Error::Unavailable(_) => "Unavailable",
            Error::Serialization(_) => "Serialization",
            Error::Concurrency(_) => "Concurrency",
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Concurrency(_))
    }

    /// Whether this is the rejection of a retried, already-recorded vote
    pub fn is_vote_replay(&self) -> bool {
        matches!(self, Error::AlreadyVoted { replay: true, .. })
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_names() {
        assert_eq!(Error::EmptyDescription.code(), "EmptyDescription");
        assert_eq!(Error::NotFound(Address::new([1u8; 32])).code(), "NotFound");
        assert_eq!(
            Error::InvalidPollIndex { index: 2, len: 2 }.code(),
            "InvalidPollIndex"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Unavailable("disk".to_string()).is_retryable());
        assert!(Error::Concurrency("mailbox".to_string()).is_retryable());
        assert!(!Error::CampaignDurationTooShort.is_retryable());
        assert!(!Error::AlreadyExists(Address::new([0u8; 32])).is_retryable());
    }

    #[test]
    fn test_already_voted_message_and_replay() {
        let err = Error::AlreadyVoted {
            receipt: Address::new([7u8; 32]),
            option_index: 1,
            replay: true,
        };
        assert_eq!(err.to_string(), "You have already voted in this poll.");
        assert!(err.is_vote_replay());

        let err = Error::AlreadyVoted {
            receipt: Address::new([7u8; 32]),
            option_index: 1,
            replay: false,
        };
        assert!(!err.is_vote_replay());
    }
}
