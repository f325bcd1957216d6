use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::Identity;
use super::nonce_cipher::NonceCipher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    pub max_age_ms: i64,
    pub clock_skew_ms: i64,
    pub min_interval_ms: i64,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 5 * 60 * 1000,
            clock_skew_ms: 60 * 1000,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    StaleTimestamp,
    FutureTimestamp,
    RateLimited,
    Replay,
    DecryptionFailure,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaleTimestamp => "stale_timestamp",
            Self::FutureTimestamp => "future_timestamp",
            Self::RateLimited => "rate_limited",
            Self::Replay => "nonce_replayed",
            Self::DecryptionFailure => "nonce_decryption_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Process-wide record of used nonces and per-identity request times.
///
/// A nonce stays in the used set until [`ReplayGuard::sweep`] removes it after
/// its expiry, and blocks reuse for that whole time even once expired. The
/// commit of a nonce is an insert-if-absent on its map entry, so two requests
/// racing with the same ciphertext cannot both be admitted.
///
/// The last-seen check and update for an identity are separate map
/// operations. Two concurrent requests from one identity can both pass the
/// interval check before either records its admission.
pub struct ReplayGuard {
    used_nonces: DashMap<String, i64>,
    last_seen: DashMap<String, i64>,
    cipher: NonceCipher,
    policy: ReplayPolicy,
}

impl ReplayGuard {
    pub fn new(cipher: NonceCipher, policy: ReplayPolicy) -> Self {
        Self {
            used_nonces: DashMap::new(),
            last_seen: DashMap::new(),
            cipher,
            policy,
        }
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    pub fn admit(
        &self,
        identity: &Identity,
        encrypted_nonce: &str,
        client_timestamp_ms: i64,
        now_ms: i64,
    ) -> Verdict {
        if client_timestamp_ms < now_ms.saturating_sub(self.policy.max_age_ms) {
            return Verdict::Reject(RejectReason::StaleTimestamp);
        }
        if client_timestamp_ms > now_ms.saturating_add(self.policy.clock_skew_ms) {
            return Verdict::Reject(RejectReason::FutureTimestamp);
        }

        let last_seen = self.last_seen.get(identity.as_str()).map(|entry| *entry);
        if let Some(last_seen) = last_seen
            && now_ms.saturating_sub(last_seen) < self.policy.min_interval_ms
        {
            return Verdict::Reject(RejectReason::RateLimited);
        }

        if self.used_nonces.contains_key(encrypted_nonce) {
            return Verdict::Reject(RejectReason::Replay);
        }

        if self.cipher.decrypt(encrypted_nonce).is_err() {
            return Verdict::Reject(RejectReason::DecryptionFailure);
        }

        // The entry guard holds a shard lock and must be released before the
        // sweep below walks every shard.
        {
            match self.used_nonces.entry(encrypted_nonce.to_string()) {
                Entry::Occupied(_) => return Verdict::Reject(RejectReason::Replay),
                Entry::Vacant(slot) => {
                    slot.insert(now_ms.saturating_add(self.policy.max_age_ms));
                }
            }
        }
        self.last_seen.insert(identity.as_str().to_string(), now_ms);

        let removed = self.sweep(now_ms);
        debug!(
            identity = identity.as_str(),
            nonce = %nonce_fingerprint(encrypted_nonce),
            swept = removed,
            "request admitted by replay guard"
        );

        Verdict::Accept
    }

    /// Removes every used-nonce entry whose expiry is before `now_ms`.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        self.used_nonces.retain(|_, expires_at| {
            let keep = *expires_at >= now_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = guard.sweep(Utc::now().timestamp_millis());
                if removed > 0 {
                    debug!(removed, "swept expired nonces");
                }
            }
        })
    }

    pub fn used_nonce_count(&self) -> usize {
        self.used_nonces.len()
    }

    pub fn contains_nonce(&self, encrypted_nonce: &str) -> bool {
        self.used_nonces.contains_key(encrypted_nonce)
    }

    pub fn last_seen(&self, identity: &Identity) -> Option<i64> {
        self.last_seen.get(identity.as_str()).map(|entry| *entry)
    }
}

/// Short, stable label for a nonce so log lines can be correlated without
/// recording the ciphertext.
pub fn nonce_fingerprint(encrypted_nonce: &str) -> String {
    let digest = Sha256::digest(encrypted_nonce.as_bytes());
    digest[..6].iter().map(|byte| format!("{byte:02x}")).collect()
}
