//! Transition processor
//!
//! Validates and applies the two ledger transitions. Each call is fully
//! applied or fully rejected; a rejected call writes nothing.
//!
//! Validation runs in a fixed order so a request with several problems always
//! reports the same error:
//!
//! ```text
//! OpenCampaign: description -> option count -> option texts -> duration -> address
//! CastVote:     load -> address check -> expiry -> option index -> receipt
//! ```

use crate::{
    address::AddressDeriver,
    error::{Error, Result},
    storage::Storage,
    types::{
        Address, Campaign, PollOption, Pubkey, Transition, TransitionOutcome, UnixTimestamp,
        VoteReceipt,
    },
};
use std::sync::Arc;

/// Minimum number of options per campaign
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options per campaign
pub const MAX_OPTIONS: usize = 10;

/// Maximum campaign description length (characters)
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Maximum option description length (characters)
pub const MAX_OPTION_DESCRIPTION_LEN: usize = 80;

/// Shortest voting window: one hour
pub const MIN_CAMPAIGN_DURATION_SECS: i64 = 3_600;

/// Longest voting window: 365 days
pub const MAX_CAMPAIGN_DURATION_SECS: i64 = 31_536_000;

/// Request to open a campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCampaignRequest {
    /// Question text (address seed)
    pub description: String,
    /// Option texts in display order
    pub options: Vec<String>,
    /// Length of the voting window
    pub duration_seconds: i64,
    /// Identity opening the campaign
    pub creator: Pubkey,
    /// Ledger clock
    pub now: UnixTimestamp,
}

/// Request to cast a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastVoteRequest {
    /// Campaign address as supplied by the caller
    pub campaign: Address,
    /// Chosen option
    pub option_index: u8,
    /// Identity casting the vote
    pub voter: Pubkey,
    /// Ledger clock
    pub now: UnixTimestamp,
}

/// A transition request with its identity and clock filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRequest {
    /// Open a campaign
    OpenCampaign(OpenCampaignRequest),
    /// Cast a vote
    CastVote(CastVoteRequest),
}

impl Transition {
    /// Bind a signed payload to its signer and the ledger clock
    pub fn into_request(self, signer: Pubkey, now: UnixTimestamp) -> TransitionRequest {
        match self {
            Transition::OpenCampaign {
                description,
                options,
                duration_seconds,
            } => TransitionRequest::OpenCampaign(OpenCampaignRequest {
                description,
                options,
                duration_seconds,
                creator: signer,
                now,
            }),
            Transition::CastVote {
                campaign,
                option_index,
            } => TransitionRequest::CastVote(CastVoteRequest {
                campaign,
                option_index,
                voter: signer,
                now,
            }),
        }
    }
}

/// Applies transitions against the record stores
#[derive(Debug, Clone)]
pub struct TransitionProcessor {
    storage: Arc<Storage>,
    deriver: AddressDeriver,
}

impl TransitionProcessor {
    /// Create new processor
    pub fn new(storage: Arc<Storage>, deriver: AddressDeriver) -> Self {
        Self { storage, deriver }
    }

    /// Deriver used to compute and check record addresses
    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Open a campaign and return its address
    pub fn open_campaign(&self, request: OpenCampaignRequest) -> Result<Address> {
        validate_description(&request.description, MAX_DESCRIPTION_LEN)?;

        if request.options.len() < MIN_OPTIONS {
            return Err(Error::NoProposals);
        }
        if request.options.len() > MAX_OPTIONS {
            return Err(Error::TooManyProposals);
        }
        for option in &request.options {
            validate_description(option, MAX_OPTION_DESCRIPTION_LEN)?;
        }

        if request.duration_seconds < MIN_CAMPAIGN_DURATION_SECS {
            return Err(Error::CampaignDurationTooShort);
        }
        if request.duration_seconds > MAX_CAMPAIGN_DURATION_SECS {
            return Err(Error::CampaignDurationTooLong);
        }
        let ends_at = request
            .now
            .checked_add(request.duration_seconds)
            .ok_or(Error::CampaignDurationTooLong)?;

        let (address, bump) = self
            .deriver
            .campaign_address(&request.creator, &request.description)?;

        let campaign = Campaign {
            description: request.description,
            creator: request.creator,
            options: request.options.into_iter().map(PollOption::new).collect(),
            created_at: request.now,
            ends_at,
            bump,
        };

        // Rejects with AlreadyExists if the address is taken
        self.storage.create_campaign(&address, &campaign)?;

        Ok(address)
    }

    /// Cast a vote and return the chosen option's new counter value
    pub fn cast_vote(&self, request: CastVoteRequest) -> Result<u64> {
        let campaign = self.storage.get_campaign(&request.campaign)?;
        self.deriver.verify_campaign(&request.campaign, &campaign)?;

        if request.now >= campaign.ends_at {
            return Err(Error::CampaignExpired {
                ends_at: campaign.ends_at,
            });
        }

        if usize::from(request.option_index) >= campaign.options.len() {
            return Err(Error::InvalidPollIndex {
                index: request.option_index,
                len: campaign.options.len(),
            });
        }

        let (receipt_address, bump) = self
            .deriver
            .receipt_address(&request.campaign, &request.voter)?;
        let receipt = VoteReceipt {
            campaign: request.campaign,
            voter: request.voter,
            option_index: request.option_index,
            cast_at: request.now,
            bump,
        };

        // Receipt and counter land in one atomic batch, receipt first
        self.storage
            .commit_vote(&request.campaign, &receipt_address, &receipt)
    }

    /// Apply either transition
    pub fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        match request {
            TransitionRequest::OpenCampaign(request) => {
                let campaign = self.open_campaign(request)?;
                Ok(TransitionOutcome::CampaignOpened { campaign })
            }
            TransitionRequest::CastVote(request) => {
                let votes = self.cast_vote(request)?;
                Ok(TransitionOutcome::VoteCast {
                    campaign: request.campaign,
                    option_index: request.option_index,
                    votes,
                })
            }
        }
    }
}

fn validate_description(text: &str, max: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::EmptyDescription);
    }
    if text.chars().count() > max {
        return Err(Error::DescriptionTooLong { max });
    }
    Ok(())
}
