//! Read-only query surface over stored campaigns
//!
//! Status is computed from `ends_at` against a caller-supplied clock; nothing
//! here writes.

use crate::{
    error::Result,
    storage::RecordIter,
    types::{Address, Campaign, Pubkey, UnixTimestamp},
};
use chrono::{DateTime, Utc};

/// Computed campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    /// Accepting votes (`now < ends_at`)
    Active,
    /// Voting window closed (`now >= ends_at`)
    Expired,
}

impl Campaign {
    /// Sum of all option counters
    pub fn total_votes(&self) -> u64 {
        self.options
            .iter()
            .fold(0u64, |total, option| total.saturating_add(option.votes))
    }

    /// Indices of every option tied at the highest count; empty if nobody voted
    pub fn leading_options(&self) -> Vec<u8> {
        let max = self.options.iter().map(|option| option.votes).max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }

        self.options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.votes == max)
            .map(|(index, _)| index as u8)
            .collect()
    }

    /// Share of all votes for one option, in whole percent (rounded)
    ///
    /// `None` for an index outside the option list; `Some(0)` when no votes
    /// have been cast.
    pub fn vote_share(&self, option_index: u8) -> Option<u8> {
        let votes = self.options.get(usize::from(option_index))?.votes;
        let total = self.total_votes();
        if total == 0 {
            return Some(0);
        }

        let percent = (u128::from(votes) * 100 + u128::from(total) / 2) / u128::from(total);
        Some(percent.min(100) as u8)
    }

    /// Whether the voting window has closed
    pub fn is_expired(&self, now: UnixTimestamp) -> bool {
        now >= self.ends_at
    }

    /// Seconds until the window closes, zero once expired
    pub fn seconds_remaining(&self, now: UnixTimestamp) -> i64 {
        self.ends_at.saturating_sub(now).max(0)
    }

    /// Status at `now`
    pub fn status(&self, now: UnixTimestamp) -> CampaignStatus {
        if self.is_expired(now) {
            CampaignStatus::Expired
        } else {
            CampaignStatus::Active
        }
    }

    /// Creation time as UTC (None if out of chrono's range)
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    /// End of the voting window as UTC (None if out of chrono's range)
    pub fn ends_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.ends_at, 0)
    }
}

/// Predicate for campaign listings; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    /// Only campaigns opened by this identity
    pub creator: Option<Pubkey>,
    /// Only campaigns with this status at the query's `now`
    pub status: Option<CampaignStatus>,
}

impl CampaignFilter {
    /// Filter matching every campaign
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one creator
    pub fn created_by(mut self, creator: Pubkey) -> Self {
        self.creator = Some(creator);
        self
    }

    /// Restrict to active campaigns
    pub fn active(mut self) -> Self {
        self.status = Some(CampaignStatus::Active);
        self
    }

    /// Restrict to expired campaigns
    pub fn expired(mut self) -> Self {
        self.status = Some(CampaignStatus::Expired);
        self
    }

    /// Whether `campaign` passes the filter at `now`
    pub fn matches(&self, campaign: &Campaign, now: UnixTimestamp) -> bool {
        if let Some(creator) = &self.creator {
            if campaign.creator != *creator {
                return false;
            }
        }
        if let Some(status) = self.status {
            if campaign.status(now) != status {
                return false;
            }
        }
        true
    }
}

/// Lazy filtered campaign listing (no ordering guarantee)
#[derive(Debug)]
pub struct CampaignQuery<'a> {
    records: RecordIter<'a, Campaign>,
    filter: CampaignFilter,
    now: UnixTimestamp,
}

impl<'a> CampaignQuery<'a> {
    pub(crate) fn new(records: RecordIter<'a, Campaign>, filter: CampaignFilter, now: UnixTimestamp) -> Self {
        Self {
            records,
            filter,
            now,
        }
    }
}

impl Iterator for CampaignQuery<'_> {
    type Item = Result<(Address, Campaign)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.records.next()? {
                Ok((address, campaign)) => {
                    if self.filter.matches(&campaign, self.now) {
                        return Some(Ok((address, campaign)));
                    }
                }
                // Undecodable records are reported, not skipped
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PollOption;

    fn campaign_with_votes(votes: &[u64]) -> Campaign {
        Campaign {
            description: "Best lang?".to_string(),
            creator: Pubkey::new([1u8; 32]),
            options: votes
                .iter()
                .enumerate()
                .map(|(i, v)| PollOption {
                    description: format!("option {}", i),
                    votes: *v,
                })
                .collect(),
            created_at: 1_000,
            ends_at: 4_600,
            bump: 255,
        }
    }

    #[test]
    fn test_total_votes() {
        assert_eq!(campaign_with_votes(&[3, 4, 0]).total_votes(), 7);
        assert_eq!(campaign_with_votes(&[u64::MAX, 1]).total_votes(), u64::MAX);
    }

    #[test]
    fn test_leading_options() {
        assert_eq!(campaign_with_votes(&[0, 0]).leading_options(), Vec::<u8>::new());
        assert_eq!(campaign_with_votes(&[1, 5, 2]).leading_options(), vec![1]);
        assert_eq!(campaign_with_votes(&[4, 1, 4]).leading_options(), vec![0, 2]);
    }

    #[test]
    fn test_vote_share() {
        let campaign = campaign_with_votes(&[1, 2]);
        assert_eq!(campaign.vote_share(0), Some(33));
        assert_eq!(campaign.vote_share(1), Some(67));
        assert_eq!(campaign.vote_share(2), None);

        assert_eq!(campaign_with_votes(&[0, 0]).vote_share(0), Some(0));
        assert_eq!(campaign_with_votes(&[u64::MAX, 0]).vote_share(0), Some(100));
    }

    #[test]
    fn test_expiry_and_remaining() {
        let campaign = campaign_with_votes(&[0, 0]);
        assert!(!campaign.is_expired(4_599));
        assert!(campaign.is_expired(4_600));
        assert_eq!(campaign.seconds_remaining(4_000), 600);
        assert_eq!(campaign.seconds_remaining(5_000), 0);
        assert_eq!(campaign.status(4_599), CampaignStatus::Active);
        assert_eq!(campaign.status(4_600), CampaignStatus::Expired);
    }

    #[test]
    fn test_utc_times() {
        let campaign = campaign_with_votes(&[0, 0]);
        assert_eq!(campaign.created_at_utc().unwrap().timestamp(), 1_000);
        assert_eq!(campaign.ends_at_utc().unwrap().timestamp(), 4_600);
    }

    #[test]
    fn test_filter_matches() {
        let campaign = campaign_with_votes(&[0, 0]);

        assert!(CampaignFilter::all().matches(&campaign, 0));
        assert!(CampaignFilter::all().active().matches(&campaign, 4_599));
        assert!(!CampaignFilter::all().active().matches(&campaign, 4_600));
        assert!(CampaignFilter::all().expired().matches(&campaign, 4_600));
        assert!(CampaignFilter::all()
            .created_by(Pubkey::new([1u8; 32]))
            .matches(&campaign, 0));
        assert!(!CampaignFilter::all()
            .created_by(Pubkey::new([2u8; 32]))
            .active()
            .matches(&campaign, 0));
    }
}
