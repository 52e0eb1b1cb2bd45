//! Ephemeral share links.
//!
//! A share grant is an unguessable capability: whoever holds the token can
//! fetch one resource for a bounded time and a bounded number of downloads,
//! without the server-wide credential. Grants live only in memory; a restart
//! revokes everything.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Default grant lifetime in seconds.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default download limit per grant.
pub const DEFAULT_DOWNLOAD_LIMIT: i64 = 1;

/// Token entropy in bytes. 32 bytes keeps tokens far beyond guessing range.
const TOKEN_BYTES: usize = 32;

/// One issued capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    /// Request path the grant covers.
    pub file_path: PathBuf,
    /// Whether the target is a directory (served as a zip stream).
    pub is_dir: bool,
    /// Absolute expiry instant.
    pub expires_at: Instant,
    /// Downloads left; -1 means unlimited.
    pub remaining_downloads: i64,
}

impl ShareGrant {
    fn expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// In-memory token -> grant map behind one coarse lock.
///
/// Every operation holds the lock for the whole map access, so a token can
/// never be double-spent by concurrent consumers: the lookup and the
/// decrement of `consume` form one critical section. Expiry is evaluated
/// lazily on access; there is no background sweep.
#[derive(Debug, Default)]
pub struct ShareLinkStore {
    grants: Mutex<HashMap<String, ShareGrant>>,
}

/// Generate an opaque URL-safe token.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl ShareLinkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a grant for `path` and return its token.
    pub fn create(
        &self,
        path: PathBuf,
        is_dir: bool,
        ttl: Duration,
        download_limit: i64,
    ) -> String {
        let token = generate_token();
        let grant = ShareGrant {
            file_path: path,
            is_dir,
            expires_at: Instant::now() + ttl,
            remaining_downloads: download_limit,
        };
        let mut grants = self.grants.lock().expect("share map lock poisoned");
        grants.insert(token.clone(), grant);
        token
    }

    /// Spend one download off a grant and return it.
    ///
    /// Returns `None` for unknown, expired, or exhausted tokens; expired
    /// entries are removed on the way out. Lookup and decrement happen
    /// under one lock, and the entry is deleted the moment its count hits
    /// zero, so a single-use link serves exactly one request even under
    /// concurrent access. Unlimited grants (-1) are never decremented.
    pub fn consume(&self, token: &str) -> Option<ShareGrant> {
        let mut grants = self.grants.lock().expect("share map lock poisoned");
        let grant = grants.get(token)?;
        if grant.expired() {
            grants.remove(token);
            return None;
        }
        Self::decrement_locked(&mut grants, token)
    }

    /// Burn one download off a grant without the expiry check.
    ///
    /// Exposed for revocation-style bookkeeping; [`consume`](Self::consume)
    /// is the request-path entry point.
    pub fn decrement(&self, token: &str) -> Option<ShareGrant> {
        let mut grants = self.grants.lock().expect("share map lock poisoned");
        Self::decrement_locked(&mut grants, token)
    }

    fn decrement_locked(
        grants: &mut HashMap<String, ShareGrant>,
        token: &str,
    ) -> Option<ShareGrant> {
        let grant = grants.get_mut(token)?;
        match grant.remaining_downloads {
            -1 => Some(grant.clone()),
            0 => {
                grants.remove(token);
                None
            }
            _ => {
                let spent = grant.clone();
                grant.remaining_downloads -= 1;
                if grant.remaining_downloads == 0 {
                    grants.remove(token);
                }
                Some(spent)
            }
        }
    }

    /// Explicitly revoke a grant.
    pub fn delete(&self, token: &str) {
        let mut grants = self.grants.lock().expect("share map lock poisoned");
        grants.remove(token);
    }

    /// Snapshot of unexpired grants, for display.
    pub fn active(&self) -> Vec<(String, ShareGrant)> {
        let grants = self.grants.lock().expect("share map lock poisoned");
        grants
            .iter()
            .filter(|(_, grant)| !grant.expired())
            .map(|(token, grant)| (token.clone(), grant.clone()))
            .collect()
    }

    /// Number of stored grants, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.grants.lock().expect("share map lock poisoned").len()
    }

    /// Whether the store holds no grants.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
