//! Remembers recent checkout submissions to warn about accidental double payments.
//!
//! This is a best effort guard for the person at the keyboard, the payment processor still has
//! the final say on duplicate charges.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// Identifies submissions of the same person, derived from email and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn of(email: &str, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.trim().to_lowercase().as_bytes());
        hasher.update([0_u8]);
        hasher.update(name.trim().as_bytes());
        Self(Base64UrlUnpadded::encode_string(&hasher.finalize()))
    }
}

/// Storage for the last submission time per fingerprint.
pub trait SubmissionCache: Send + Sync {
    fn last_submission(&self, key: &Fingerprint) -> Option<DateTime<Utc>>;

    fn record(&self, key: Fingerprint, at: DateTime<Utc>);

    fn forget(&self, key: &Fingerprint);

    /// Drops every entry recorded before `cutoff`.
    fn prune(&self, cutoff: DateTime<Utc>);

    /// Records `key` at `now` unless it was recorded after `cutoff`, in which case that time is
    /// returned and nothing changes. Looking and recording are a single step.
    fn record_unless_after(
        &self,
        key: Fingerprint,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Default)]
pub struct InMemorySubmissionCache {
    entries: Mutex<HashMap<Fingerprint, DateTime<Utc>>>,
}

impl InMemorySubmissionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, DateTime<Utc>>> {
        // the map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SubmissionCache for InMemorySubmissionCache {
    fn last_submission(&self, key: &Fingerprint) -> Option<DateTime<Utc>> {
        self.entries().get(key).copied()
    }

    fn record(&self, key: Fingerprint, at: DateTime<Utc>) {
        self.entries().insert(key, at);
    }

    fn forget(&self, key: &Fingerprint) {
        self.entries().remove(key);
    }

    fn prune(&self, cutoff: DateTime<Utc>) {
        self.entries().retain(|_, at| *at >= cutoff);
    }

    fn record_unless_after(
        &self,
        key: Fingerprint,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut entries = self.entries();
        entries.retain(|_, at| *at > cutoff);
        if let Some(at) = entries.get(&key) {
            return Some(*at);
        }
        entries.insert(key, now);
        None
    }
}

/// Decides whether a submission looks like a repeat of one within the window.
pub struct DuplicateGuard {
    cache: Box<dyn SubmissionCache>,
    window: Duration,
}

impl DuplicateGuard {
    /// The usual five minute window.
    pub const DEFAULT_WINDOW_SECS: i64 = 5 * 60;

    #[must_use]
    pub fn new(cache: Box<dyn SubmissionCache>, window: Duration) -> Self {
        Self { cache, window }
    }

    #[must_use]
    pub fn in_memory(window: Duration) -> Self {
        Self::new(Box::new(InMemorySubmissionCache::new()), window)
    }

    /// When the same fingerprint was last submitted, if that was within the window before `now`.
    #[must_use]
    pub fn recent_submission(
        &self,
        key: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.cache
            .last_submission(key)
            .filter(|at| now.signed_duration_since(*at) < self.window)
    }

    pub fn record(&self, key: Fingerprint, now: DateTime<Utc>) {
        self.cache.prune(now - self.window);
        self.cache.record(key, now);
    }

    /// Records a submission of `key` at `now`, unless the same key was submitted within the
    /// window. Then the earlier submission time is returned and nothing is recorded.
    #[must_use]
    pub fn check_and_record(&self, key: Fingerprint, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cache.record_unless_after(key, now, now - self.window)
    }

    /// Forgets a submission that didn't go through, so retrying isn't flagged.
    pub fn release(&self, key: &Fingerprint) {
        self.cache.forget(key);
    }
}

impl std::fmt::Debug for DuplicateGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateGuard")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
