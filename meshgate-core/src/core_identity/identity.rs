//! Identity key material
//!
//! A `FullIdentity` is the decrypted form of what lives inside an
//! identity's `identity.enc` envelope: the principal, an optional nick,
//! and the ed25519 keypair the transport layer authenticates with.
//! Secret bytes are zeroized when the value is dropped.

use crate::core_identity::principal::Principal;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Ed25519 keypair backing an identity
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IdentityKeypair {
    /// Public verification key bytes
    #[zeroize(skip)]
    pub public: [u8; 32],
    /// Secret signing key seed
    pub secret: [u8; 32],
}

impl std::fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret half
        f.debug_struct("IdentityKeypair")
            .field("public", &bs58::encode(&self.public).into_string())
            .finish_non_exhaustive()
    }
}

impl IdentityKeypair {
    /// Generate a fresh keypair from the OS RNG
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        let signing = SigningKey::from_bytes(&seed);
        let public = signing.verifying_key().to_bytes();
        IdentityKeypair {
            public,
            secret: seed,
        }
    }

    /// Reconstruct the signing key for transport authentication
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret)
    }
}

/// Decrypted identity material plus profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullIdentity {
    /// The identity's principal, derived from the public key at creation
    pub principal: Principal,
    /// Optional human-readable nick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Keypair used by the transport layer
    pub keypair: IdentityKeypair,
}

impl FullIdentity {
    /// Create a brand-new identity with a freshly generated keypair
    pub fn generate(nick: Option<String>) -> Self {
        let keypair = IdentityKeypair::generate();
        let principal = Principal::from_public_key(&keypair.public);
        FullIdentity {
            principal,
            nick,
            keypair,
        }
    }
}
