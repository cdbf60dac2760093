//! Deterministic record addresses
//!
//! Campaigns and vote receipts are located by computing their address from
//! the seed fields stored on the record itself, so no lookup table exists:
//!
//! ```text
//! campaign = derive("campaign", creator, description)
//! receipt  = derive("receipt",  campaign, voter)
//! ```
//!
//! For bump = 255 down to 0 the deriver hashes
//! `len(seed)||seed ... || bump || namespace_id || marker` with SHA-256 and
//! returns the first digest that does not decompress to an Ed25519 point.
//! Derived addresses therefore never collide with a signing identity.

use crate::{
    error::{Error, Result},
    types::{Address, Campaign, Pubkey, VoteReceipt},
};
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

/// Seed prefix for campaign addresses
pub const CAMPAIGN_SEED_PREFIX: &[u8] = b"campaign";

/// Seed prefix for vote receipt addresses
pub const RECEIPT_SEED_PREFIX: &[u8] = b"receipt";

const DERIVED_ADDRESS_MARKER: &[u8] = b"VoteLedgerDerivedAddress";

/// Record kinds with derived addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Campaign record
    Campaign,
    /// Vote receipt record
    Receipt,
}

impl RecordKind {
    /// Kind tag hashed as the first seed
    pub fn seed_prefix(&self) -> &'static [u8] {
        match self {
            RecordKind::Campaign => CAMPAIGN_SEED_PREFIX,
            RecordKind::Receipt => RECEIPT_SEED_PREFIX,
        }
    }
}

/// Pure address derivation scoped to one ledger namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    namespace_id: [u8; 32],
}

impl AddressDeriver {
    /// Create a deriver for the given namespace
    pub fn new(namespace: &str) -> Self {
        let namespace_id = Sha256::digest(namespace.as_bytes()).into();
        Self { namespace_id }
    }

    /// Namespace identifier mixed into every address
    pub fn namespace_id(&self) -> &[u8; 32] {
        &self.namespace_id
    }

    /// Compute the address for one bump, `None` if the digest lies on the curve
    pub fn create_address(&self, kind: RecordKind, seeds: &[&[u8]], bump: u8) -> Option<Address> {
        let mut hasher = Sha256::new();
        for seed in std::iter::once(kind.seed_prefix()).chain(seeds.iter().copied()) {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update((seed.len() as u32).to_be_bytes());
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(self.namespace_id);
        hasher.update(DERIVED_ADDRESS_MARKER);
        let digest: [u8; 32] = hasher.finalize().into();

        if is_on_curve(&digest) {
            None
        } else {
            Some(Address::new(digest))
        }
    }

    /// Find the canonical address and bump (highest bump that yields an address)
    pub fn find_address(&self, kind: RecordKind, seeds: &[&[u8]]) -> Result<(Address, u8)> {
        (0..=u8::MAX)
            .rev()
            .find_map(|bump| {
                self.create_address(kind, seeds, bump)
                    .map(|address| (address, bump))
            })
            .ok_or_else(|| {
                Error::AddressMismatch(format!("no off-curve address for {:?} seeds", kind))
            })
    }

    /// Campaign address from (creator, description)
    pub fn campaign_address(&self, creator: &Pubkey, description: &str) -> Result<(Address, u8)> {
        self.find_address(
            RecordKind::Campaign,
            &[creator.as_ref(), description.as_bytes()],
        )
    }

    /// Receipt address from (campaign, voter)
    pub fn receipt_address(&self, campaign: &Address, voter: &Pubkey) -> Result<(Address, u8)> {
        self.find_address(RecordKind::Receipt, &[campaign.as_ref(), voter.as_ref()])
    }

    /// Check that a loaded campaign re-derives to the address it was read from
    pub fn verify_campaign(&self, address: &Address, campaign: &Campaign) -> Result<()> {
        let (derived, bump) = self.campaign_address(&campaign.creator, &campaign.description)?;
        if derived != *address || bump != campaign.bump {
            return Err(Error::AddressMismatch(format!(
                "campaign at {} derives to {} (bump {})",
                address, derived, bump
            )));
        }
        Ok(())
    }

    /// Check that a loaded receipt re-derives to the address it was read from
    pub fn verify_receipt(&self, address: &Address, receipt: &VoteReceipt) -> Result<()> {
        let (derived, bump) = self.receipt_address(&receipt.campaign, &receipt.voter)?;
        if derived != *address || bump != receipt.bump {
            return Err(Error::AddressMismatch(format!(
                "receipt at {} derives to {} (bump {})",
                address, derived, bump
            )));
        }
        Ok(())
    }
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PollOption;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new("vote-ledger-test")
    }

    #[test]
    fn test_campaign_address_deterministic() {
        let creator = Pubkey::new([1u8; 32]);
        let (a1, b1) = deriver().campaign_address(&creator, "Best lang?").unwrap();
        let (a2, b2) = deriver().campaign_address(&creator, "Best lang?").unwrap();
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_distinct_seeds_distinct_addresses() {
        let d = deriver();
        let alice = Pubkey::new([1u8; 32]);
        let bob = Pubkey::new([2u8; 32]);

        let (a, _) = d.campaign_address(&alice, "Best lang?").unwrap();
        let (b, _) = d.campaign_address(&bob, "Best lang?").unwrap();
        let (c, _) = d.campaign_address(&alice, "Best editor?").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);

        let (r1, _) = d.receipt_address(&a, &alice).unwrap();
        let (r2, _) = d.receipt_address(&a, &bob).unwrap();
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_kind_separates_addresses() {
        let d = deriver();
        let seeds: [&[u8]; 2] = [&[3u8; 32], &[4u8; 32]];
        let (campaign, _) = d.find_address(RecordKind::Campaign, &seeds).unwrap();
        let (receipt, _) = d.find_address(RecordKind::Receipt, &seeds).unwrap();
        assert_ne!(campaign, receipt);
    }

    #[test]
    fn test_seed_boundaries_are_canonical() {
        let d = deriver();
        let (a, _) = d.find_address(RecordKind::Campaign, &[b"ab", b"c"]).unwrap();
        let (b, _) = d.find_address(RecordKind::Campaign, &[b"a", b"bc"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_namespace_scopes_addresses() {
        let creator = Pubkey::new([5u8; 32]);
        let (a, _) = AddressDeriver::new("one")
            .campaign_address(&creator, "q")
            .unwrap();
        let (b, _) = AddressDeriver::new("two")
            .campaign_address(&creator, "q")
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_namespace_id_is_digest_of_name() {
        let expected: [u8; 32] = Sha256::digest(b"vote-ledger-test").into();
        assert_eq!(deriver().namespace_id(), &expected);
        assert_ne!(AddressDeriver::new("other").namespace_id(), &expected);
    }

    #[test]
    fn test_found_address_is_off_curve_and_canonical() {
        let d = deriver();
        let creator = Pubkey::new([6u8; 32]);
        let (address, bump) = d.campaign_address(&creator, "Favorite color?").unwrap();

        assert!(!is_on_curve(address.as_bytes()));
        assert_eq!(
            d.create_address(
                RecordKind::Campaign,
                &[creator.as_ref(), b"Favorite color?"],
                bump
            ),
            Some(address)
        );
        // Every higher bump was rejected
        for higher in (u16::from(bump) + 1)..=255u16 {
            assert!(d
                .create_address(
                    RecordKind::Campaign,
                    &[creator.as_ref(), b"Favorite color?"],
                    higher as u8
                )
                .is_none());
        }
    }

    #[test]
    fn test_verify_campaign() {
        let d = deriver();
        let creator = Pubkey::new([7u8; 32]);
        let (address, bump) = d.campaign_address(&creator, "Lunch?").unwrap();
        let mut campaign = Campaign {
            description: "Lunch?".to_string(),
            creator,
            options: vec![PollOption::new("Pizza"), PollOption::new("Sushi")],
            created_at: 0,
            ends_at: 3600,
            bump,
        };
        assert!(d.verify_campaign(&address, &campaign).is_ok());

        campaign.description = "Dinner?".to_string();
        let err = d.verify_campaign(&address, &campaign).unwrap_err();
        assert_eq!(err.code(), "AddressMismatch");
    }

    #[test]
    fn test_verify_receipt() {
        let d = deriver();
        let campaign = Address::new([8u8; 32]);
        let voter = Pubkey::new([9u8; 32]);
        let (address, bump) = d.receipt_address(&campaign, &voter).unwrap();
        let receipt = VoteReceipt {
            campaign,
            voter,
            option_index: 0,
            cast_at: 10,
            bump,
        };
        assert!(d.verify_receipt(&address, &receipt).is_ok());
        assert!(d
            .verify_receipt(&Address::new([0u8; 32]), &receipt)
            .is_err());
    }
}
