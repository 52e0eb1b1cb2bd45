//! Request-path resolution against the webroot and per-directory ACL
//! overlays.
//!
//! Every directory may carry a reserved overlay file granting an auth
//! requirement and a block list for that directory's contents. Overlays are
//! read fresh from disk on every request so live edits take effect
//! immediately. Blocked and missing resources are indistinguishable: both
//! resolve to NotFound.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Reserved per-directory overlay filename. Never listed, never served.
pub const OVERLAY_FILE: &str = ".lanshare";

/// Per-directory access-control record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclOverlay {
    /// Auth requirement as `user:bcryptHash`; empty means none.
    #[serde(default)]
    pub auth: String,

    /// Entry names hidden from listings and unservable. Directory names
    /// carry a trailing slash.
    #[serde(default)]
    pub block: Vec<String>,
}

impl AclOverlay {
    /// Whether this overlay demands credentials.
    pub fn requires_auth(&self) -> bool {
        !self.auth.is_empty()
    }

    /// Whether a file with this name is blocked.
    pub fn blocks_file(&self, name: &str) -> bool {
        self.block.iter().any(|blocked| blocked == name)
    }

    /// Whether a child directory with this name is blocked. Block entries
    /// name directories with a trailing slash.
    pub fn blocks_dir(&self, name: &str) -> bool {
        self.block
            .iter()
            .any(|blocked| blocked.strip_suffix('/') == Some(name))
    }
}

/// A resolved request target.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Absolute filesystem location.
    pub full_path: PathBuf,
    /// Webroot-relative request path, cleaned.
    pub rel_path: PathBuf,
    /// Whether the target is a directory.
    pub is_dir: bool,
    /// The overlay governing this target: the directory's own overlay for
    /// directories, the containing directory's for files.
    pub overlay: AclOverlay,
}

/// Resolves request paths to filesystem locations inside one webroot.
#[derive(Debug, Clone)]
pub struct PathResolver {
    webroot: PathBuf,
}

/// Lexically normalize a request path: collapse `.` and `..`, never
/// ascending past the root. The result is relative to the webroot.
pub fn clean_request_path(request_path: &str) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::ParentDir => {
                cleaned.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    cleaned
}

impl PathResolver {
    /// Create a resolver for the given webroot.
    pub fn new(webroot: PathBuf) -> Self {
        Self { webroot }
    }

    /// The served root directory.
    pub fn webroot(&self) -> &Path {
        &self.webroot
    }

    /// Read a directory's overlay file.
    ///
    /// A missing overlay yields the empty record. An unreadable or
    /// malformed overlay is logged and treated as empty rather than
    /// failing the request.
    pub fn load_overlay(&self, dir: &Path) -> AclOverlay {
        let path = dir.join(OVERLAY_FILE);
        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(overlay) => overlay,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "malformed overlay file");
                    AclOverlay::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AclOverlay::default(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "unreadable overlay file");
                AclOverlay::default()
            }
        }
    }

    /// Resolve a request path to its filesystem target.
    ///
    /// Directory targets are checked against the parent directory's block
    /// list (`name/` entries) and then annotated with their own overlay.
    /// File targets are checked against the containing directory's block
    /// list, and the overlay file itself always resolves to NotFound.
    pub fn resolve(&self, request_path: &str) -> ServerResult<Resolved> {
        let rel_path = clean_request_path(request_path);
        let full_path = self.webroot.join(&rel_path);

        let metadata = fs::metadata(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServerError::NotFound,
            _ => ServerError::Internal(e.to_string()),
        })?;

        if metadata.is_dir() {
            // The webroot itself has no parent inside the tree to consult.
            if let Some(name) = full_path.file_name().map(|n| n.to_string_lossy()) {
                if !rel_path.as_os_str().is_empty() {
                    if let Some(parent) = full_path.parent() {
                        let parent_overlay = self.load_overlay(parent);
                        if parent_overlay.blocks_dir(&name) {
                            return Err(ServerError::NotFound);
                        }
                    }
                }
            }
            let overlay = self.load_overlay(&full_path);
            Ok(Resolved {
                full_path,
                rel_path,
                is_dir: true,
                overlay,
            })
        } else {
            let name = full_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            // The overlay file and in-flight upload temps are never served.
            if name == OVERLAY_FILE || name.ends_with('~') {
                return Err(ServerError::NotFound);
            }
            let containing = full_path.parent().unwrap_or(&self.webroot);
            let overlay = self.load_overlay(containing);
            if overlay.blocks_file(&name) {
                return Err(ServerError::NotFound);
            }
            Ok(Resolved {
                full_path,
                rel_path,
                is_dir: false,
                overlay,
            })
        }
    }
}
