//! Principal identifiers
//!
//! A principal is the globally unique, opaque identifier of an identity.
//! Principals are treated as plain strings everywhere except at trust
//! boundaries, where the `stacks:` scheme prefix is checked.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scheme prefix every well-formed principal carries
pub const PRINCIPAL_SCHEME: &str = "stacks:";

/// Principal parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("Invalid principal {0:?}: must start with \"stacks:\"")]
    MissingScheme(String),

    #[error("Invalid principal: empty address after scheme")]
    EmptyAddress,
}

/// Opaque, globally unique identity identifier (`stacks:ST...`)
///
/// The wrapped string is kept verbatim; equality and hashing are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Parse a principal, enforcing the scheme prefix
    pub fn parse(raw: impl Into<String>) -> Result<Self, PrincipalError> {
        let raw = raw.into();
        match raw.strip_prefix(PRINCIPAL_SCHEME) {
            None => Err(PrincipalError::MissingScheme(raw)),
            Some("") => Err(PrincipalError::EmptyAddress),
            Some(_) => Ok(Principal(raw)),
        }
    }

    /// Check whether a raw string would parse as a principal
    pub fn is_wellformed(raw: &str) -> bool {
        raw.strip_prefix(PRINCIPAL_SCHEME)
            .is_some_and(|rest| !rest.is_empty())
    }

    /// Derive a principal from an ed25519 public key
    ///
    /// The address part is the base58 encoding of the first 20 bytes of
    /// the key's SHA-256 digest. Stable across runs for the same key.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let address = bs58::encode(&digest[..20]).into_string();
        Principal(format!("{}ST{}", PRINCIPAL_SCHEME, address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::parse(s)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets HashMap<Principal, _> be queried with a plain &str selector.
// Sound because the derived Hash of a single-field struct equals the
// field's own Hash.
impl std::borrow::Borrow<str> for Principal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_scheme_prefixed() {
        let p = Principal::parse("stacks:ST1ABC").unwrap();
        assert_eq!(p.as_str(), "stacks:ST1ABC");
        assert_eq!(p.to_string(), "stacks:ST1ABC");
    }

    #[test]
    fn parse_rejects_missing_scheme() {
        let err = Principal::parse("invalid-principal").unwrap_err();
        assert!(err.to_string().contains("must start with \"stacks:\""));
    }

    #[test]
    fn parse_rejects_empty_address() {
        assert_eq!(
            Principal::parse("stacks:").unwrap_err(),
            PrincipalError::EmptyAddress
        );
    }

    #[test]
    fn wellformed_check() {
        assert!(Principal::is_wellformed("stacks:ST1ABC"));
        assert!(!Principal::is_wellformed("ST1ABC"));
        assert!(!Principal::is_wellformed("stacks:"));
        assert!(!Principal::is_wellformed("*"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let key = [7u8; 32];
        let a = Principal::from_public_key(&key);
        let b = Principal::from_public_key(&key);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("stacks:ST"));

        let other = Principal::from_public_key(&[8u8; 32]);
        assert_ne!(a, other);
    }

    #[test]
    fn serde_is_transparent() {
        let p = Principal::parse("stacks:ST1ABC").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"stacks:ST1ABC\"");

        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
