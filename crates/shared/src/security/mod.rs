//! Request authentication primitives: bearer tokens, nonce decryption and the
//! replay guard that admits each (identity, nonce, timestamp) triple once.

mod nonce_cipher;
mod replay;
mod tokens;

#[cfg(test)]
mod tests;

use std::fmt;

pub use nonce_cipher::{DecryptionError, NonceCipher, NonceCipherError};
pub use replay::{RejectReason, ReplayGuard, ReplayPolicy, Verdict, nonce_fingerprint};
pub use tokens::{TokenClaims, TokenError, TokenIdentity, TokenService};

/// Name of an authenticated requester. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
