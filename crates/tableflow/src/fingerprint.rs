// ── Query fingerprinting ──
//
// A fingerprint is the cache key for one fetch: a digest over the
// query-relevant slice of state plus the controller's session key.
// The digest runs over canonical JSON, so two structurally equal
// queries always collide and nothing else does (up to SHA-256).

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::state::{Criteria, Meta};

// ── SessionKey ──────────────────────────────────────────────────────

/// Per-controller isolation key mixed into every fingerprint.
///
/// Generated once at construction, so two controllers with identical
/// criteria and a shared fingerprint function still key their caches
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Fingerprint ─────────────────────────────────────────────────────

/// Cache key derived from a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ── QueryKey ────────────────────────────────────────────────────────

/// Borrowed view of the state fields that determine what is fetched.
///
/// Handed to the fingerprint function on every refresh. The `meta`
/// field is part of the key: a resolve that changes metadata also
/// changes the next fingerprint.
#[derive(Debug, Serialize)]
pub struct QueryKey<'a> {
    pub meta: &'a Meta,
    pub page: usize,
    pub page_size: usize,
    pub search: &'a str,
    pub filters: &'a Criteria,
    pub sorting: &'a Criteria,
    pub session: SessionKey,
}

/// Replaceable fingerprint function, injected at build time.
pub type FingerprintFn = dyn Fn(&QueryKey<'_>) -> Fingerprint + Send + Sync;

/// Default fingerprint: SHA-256 over the canonical JSON form of the key,
/// hex-encoded.
///
/// `serde_json` maps serialize with sorted keys, which is what makes the
/// encoding canonical rather than insertion-ordered.
pub fn default_fingerprint(key: &QueryKey<'_>) -> Fingerprint {
    // Serializing a QueryKey cannot fail: every field is a JSON-native
    // shape with string keys.
    let canonical = serde_json::to_vec(key).unwrap_or_default();
    Fingerprint(hex::encode(Sha256::digest(canonical)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::{Fingerprint, QueryKey, SessionKey, default_fingerprint};
    use crate::state::{Criteria, Meta};

    fn key_with<'a>(meta: &'a Meta, filters: &'a Criteria, page: usize) -> QueryKey<'a> {
        QueryKey {
            meta,
            page,
            page_size: 10,
            search: "",
            filters,
            sorting: filters,
            session: SessionKey(uuid::Uuid::nil()),
        }
    }

    #[test]
    fn identical_queries_share_a_fingerprint() {
        let meta = Meta::new();
        let filters = Criteria::new();
        let a = default_fingerprint(&key_with(&meta, &filters, 0));
        let b = default_fingerprint(&key_with(&meta, &filters, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = Criteria::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!(2));

        let mut reverse = Criteria::new();
        reverse.insert("beta".into(), json!(2));
        reverse.insert("alpha".into(), json!(1));

        let meta = Meta::new();
        let a = default_fingerprint(&key_with(&meta, &forward, 0));
        let b = default_fingerprint(&key_with(&meta, &reverse, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn page_changes_the_fingerprint() {
        let meta = Meta::new();
        let filters = Criteria::new();
        let a = default_fingerprint(&key_with(&meta, &filters, 0));
        let b = default_fingerprint(&key_with(&meta, &filters, 1));
        assert_ne!(a, b);
    }

    #[test]
    fn meta_changes_the_fingerprint() {
        let empty = Meta::new();
        let mut counted = Meta::new();
        counted.insert("count".into(), Value::from(25));

        let filters = Criteria::new();
        let a = default_fingerprint(&key_with(&empty, &filters, 0));
        let b = default_fingerprint(&key_with(&counted, &filters, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn sessions_keep_controllers_apart() {
        let meta = Meta::new();
        let filters = Criteria::new();
        let mut a = key_with(&meta, &filters, 0);
        let mut b = key_with(&meta, &filters, 0);
        a.session = SessionKey::generate();
        b.session = SessionKey::generate();
        assert_ne!(default_fingerprint(&a), default_fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let meta = Meta::new();
        let filters = Criteria::new();
        let fp = default_fingerprint(&key_with(&meta, &filters, 0));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn display_matches_as_str() {
        let fp = Fingerprint::new("abc123");
        assert_eq!(fp.to_string(), fp.as_str());
    }
}
