//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - Signing and verification of transitions on behalf of an identity

use crate::types::{Pubkey, Signature, SignedTransition, Transition};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Identity of this key pair
    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.verifying_key.to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::from_bytes(signature.to_bytes())
    }
}

/// Verify a signature with a public key
pub fn verify_signature(message: &[u8], signature: &Signature, signer: &Pubkey) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(signer.as_bytes())
        .map_err(|e| Error::SignatureError(format!("Invalid signer key {}: {}", signer, e)))?;

    let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());
    verifying_key
        .verify(message, &dalek_sig)
        .map_err(|e| Error::SignatureError(format!("Verification failed: {}", e)))
}

impl SignedTransition {
    /// Sign a transition as the key pair's identity
    pub fn sign(transition: Transition, keypair: &KeyPair) -> Result<Self> {
        let signature = keypair.sign(&transition.canonical_bytes()?);
        Ok(Self {
            transition,
            signer: keypair.pubkey(),
            signature,
        })
    }

    /// Check the signature against the signer's key
    pub fn verify(&self) -> Result<()> {
        verify_signature(
            &self.transition.canonical_bytes()?,
            &self.signature,
            &self.signer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);

        // Same seed should produce same identity
        assert_eq!(keypair1.pubkey(), keypair2.pubkey());
        assert_ne!(keypair1.pubkey(), KeyPair::generate().pubkey());
    }

    #[test]
    fn test_verify_signature() {
        let keypair = KeyPair::generate();
        let message = b"test message";
        let signature = keypair.sign(message);

        assert!(verify_signature(message, &signature, &keypair.pubkey()).is_ok());

        // Wrong message should fail
        assert!(verify_signature(b"wrong message", &signature, &keypair.pubkey()).is_err());

        // Wrong signer should fail
        let other = KeyPair::generate();
        let err = verify_signature(message, &signature, &other.pubkey()).unwrap_err();
        assert_eq!(err.code(), "SignatureError");
    }

    #[test]
    fn test_signed_transition_roundtrip() {
        let keypair = KeyPair::from_seed(&[7u8; 32]);
        let signed = SignedTransition::sign(
            Transition::CastVote {
                campaign: Address::new([1u8; 32]),
                option_index: 0,
            },
            &keypair,
        )
        .unwrap();

        assert_eq!(signed.signer, keypair.pubkey());
        assert!(signed.verify().is_ok());
    }

    #[test]
    fn test_tampered_transition_rejected() {
        let keypair = KeyPair::from_seed(&[7u8; 32]);
        let mut signed = SignedTransition::sign(
            Transition::CastVote {
                campaign: Address::new([1u8; 32]),
                option_index: 0,
            },
            &keypair,
        )
        .unwrap();

        signed.transition = Transition::CastVote {
            campaign: Address::new([1u8; 32]),
            option_index: 1,
        };
        assert!(signed.verify().is_err());
    }

    #[test]
    fn test_impersonation_rejected() {
        let alice = KeyPair::from_seed(&[1u8; 32]);
        let mallory = KeyPair::from_seed(&[2u8; 32]);

        let mut signed = SignedTransition::sign(
            Transition::OpenCampaign {
                description: "Q".to_string(),
                options: vec!["A".to_string(), "B".to_string()],
                duration_seconds: 3600,
            },
            &mallory,
        )
        .unwrap();
        signed.signer = alice.pubkey();

        assert!(signed.verify().is_err());
    }

    #[test]
    fn test_known_signature_vector() {
        // RFC 8032 test vector
        let seed = [
            0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60,
            0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
            0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19,
            0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
        ];

        let keypair = KeyPair::from_seed(&seed);
        assert_eq!(
            keypair.pubkey().to_string(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );

        let signature = keypair.sign(b"");
        assert!(verify_signature(b"", &signature, &keypair.pubkey()).is_ok());
    }
}
