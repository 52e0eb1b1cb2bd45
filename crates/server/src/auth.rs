//! Credential verification for the server-wide gate and per-directory ACLs.
//!
//! The server credential is either `user:password` or `user:bcrypt-hash`
//! (detected by the `$2` prefix). Overlay files always carry bcrypt hashes.
//! Verified Authorization header values are cached so that a busy client
//! does not pay the bcrypt cost on every request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;

/// How the configured secret is compared.
#[derive(Debug, Clone)]
enum Secret {
    Plain(String),
    Bcrypt(String),
}

/// Server-wide basic-auth gate with a success cache.
#[derive(Debug)]
pub struct AuthGate {
    username: String,
    secret: Secret,
    /// Raw Authorization header values that already verified once.
    verified: DashMap<String, ()>,
}

impl AuthGate {
    /// Build a gate from a `user:password` or `user:bcrypt-hash` credential.
    ///
    /// Returns `None` when the credential has no `user:` part.
    pub fn from_credential(credential: &str) -> Option<Self> {
        let (username, secret) = credential.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        let secret = if secret.starts_with("$2") {
            Secret::Bcrypt(secret.to_string())
        } else {
            Secret::Plain(secret.to_string())
        };
        Some(Self {
            username: username.to_string(),
            secret,
            verified: DashMap::new(),
        })
    }

    /// Verify a raw `Authorization` header value.
    ///
    /// The cache is consulted first; a hit skips decoding and hashing
    /// entirely. Only successful verifications are cached.
    pub fn verify_header(&self, header_value: &str) -> bool {
        if self.verified.contains_key(header_value) {
            return true;
        }

        let Some((username, password)) = decode_basic(header_value) else {
            return false;
        };
        if username != self.username {
            return false;
        }
        let ok = match &self.secret {
            Secret::Plain(expected) => password == *expected,
            Secret::Bcrypt(hash) => bcrypt::verify(&password, hash).unwrap_or(false),
        };
        if ok {
            self.verified.insert(header_value.to_string(), ());
        }
        ok
    }

    /// The configured username, for startup logging.
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Decode a `Basic <base64>` header value into (user, password).
fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Verify a request credential against an overlay `user:bcryptHash` spec.
///
/// Overlay specs never hold plaintext; comparison goes through bcrypt,
/// which is constant-time on the hash.
pub fn verify_overlay_credential(auth_spec: &str, header_value: &str) -> bool {
    let Some((expected_user, hash)) = auth_spec.split_once(':') else {
        return false;
    };
    let Some((username, password)) = decode_basic(header_value) else {
        return false;
    };
    username == expected_user && bcrypt::verify(&password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn test_plain_credential_verifies() {
        let gate = AuthGate::from_credential("alice:secret").unwrap();
        assert!(gate.verify_header(&basic("alice", "secret")));
        assert!(!gate.verify_header(&basic("alice", "wrong")));
        assert!(!gate.verify_header(&basic("bob", "secret")));
    }

    #[test]
    fn test_bcrypt_credential_verifies() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let gate = AuthGate::from_credential(&format!("alice:{hash}")).unwrap();
        assert!(gate.verify_header(&basic("alice", "hunter2")));
        assert!(!gate.verify_header(&basic("alice", "hunter3")));
    }

    #[test]
    fn test_success_is_cached() {
        let gate = AuthGate::from_credential("alice:secret").unwrap();
        let header = basic("alice", "secret");
        assert!(gate.verify_header(&header));
        assert!(gate.verified.contains_key(&header));
        // Second call hits the cache
        assert!(gate.verify_header(&header));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let gate = AuthGate::from_credential("alice:secret").unwrap();
        let header = basic("alice", "wrong");
        assert!(!gate.verify_header(&header));
        assert!(!gate.verified.contains_key(&header));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let gate = AuthGate::from_credential("alice:secret").unwrap();
        assert!(!gate.verify_header("Bearer abc"));
        assert!(!gate.verify_header("Basic not-base64!!!"));
        assert!(!gate.verify_header(""));
    }

    #[test]
    fn test_credential_without_user_rejected() {
        assert!(AuthGate::from_credential(":pass").is_none());
        assert!(AuthGate::from_credential("nocolon").is_none());
    }

    #[test]
    fn test_overlay_credential() {
        let hash = bcrypt::hash("dirsecret", 4).unwrap();
        let spec = format!("carol:{hash}");
        assert!(verify_overlay_credential(&spec, &basic("carol", "dirsecret")));
        assert!(!verify_overlay_credential(&spec, &basic("carol", "nope")));
        assert!(!verify_overlay_credential(&spec, &basic("mallory", "dirsecret")));
        assert!(!verify_overlay_credential("nocolon", &basic("carol", "dirsecret")));
    }
}
