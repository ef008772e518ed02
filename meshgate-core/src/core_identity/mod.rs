//! Identity primitives: principals, key material, and keystores

mod identity;
mod principal;

pub mod keystore;

pub use identity::{FullIdentity, IdentityKeypair};
pub use keystore::{FileKeystore, Keystore, KeystoreError, MemoryKeystore, IDENTITY_FILE};
pub use principal::{Principal, PrincipalError, PRINCIPAL_SCHEME};
