//! Directory listings as serializable entry records.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::error::ServerResult;
use crate::files::resolver::{AclOverlay, OVERLAY_FILE};

/// One entry in a directory listing. Directory names carry a trailing
/// slash so clients can tell them apart without a second field lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub size_bytes: u64,
    pub size_human: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    pub read_only: bool,
    pub no_delete: bool,
}

/// Render a byte count with decimal units, one fraction digit.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut suffix = 0;
    while value >= UNIT as f64 && suffix < 5 {
        value /= UNIT as f64;
        suffix += 1;
    }
    let suffixes = ["kB", "MB", "GB", "TB", "PB"];
    format!("{value:.1} {}", suffixes[suffix - 1])
}

/// Enumerate a directory, applying the directory's own block list.
///
/// The overlay file and any blocked name are omitted. Entries sort
/// case-insensitively ascending by name. Unreadable entries are skipped
/// rather than failing the whole listing.
pub fn list_directory(
    dir: &Path,
    overlay: &AclOverlay,
    read_only: bool,
    no_delete: bool,
) -> ServerResult<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();

    for item in fs::read_dir(dir)? {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let raw_name = item.file_name().to_string_lossy().to_string();
        // In-flight upload temps stay invisible until renamed into place.
        if raw_name == OVERLAY_FILE || raw_name.ends_with('~') {
            continue;
        }

        // Symlink status comes from the entry itself; size and mtime from
        // the followed target so links report what they point at.
        let link_meta = match item.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(name = %raw_name, error = %e, "skipping entry without metadata");
                continue;
            }
        };
        let is_symlink = link_meta.file_type().is_symlink();
        let meta = if is_symlink {
            fs::metadata(item.path()).unwrap_or(link_meta)
        } else {
            link_meta
        };

        let is_dir = meta.is_dir();
        if is_dir && overlay.blocks_dir(&raw_name) {
            continue;
        }
        if !is_dir && overlay.blocks_file(&raw_name) {
            continue;
        }

        let name = if is_dir {
            format!("{raw_name}/")
        } else {
            raw_name.clone()
        };
        let symlink_target = if is_symlink {
            fs::read_link(item.path())
                .ok()
                .map(|t| t.to_string_lossy().to_string())
        } else {
            None
        };
        let extension = if is_dir {
            None
        } else {
            Path::new(&raw_name)
                .extension()
                .map(|e| e.to_string_lossy().to_string())
        };
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let size_bytes = if is_dir { 0 } else { meta.len() };
        entries.push(DirectoryEntry {
            name,
            is_dir,
            is_symlink,
            symlink_target,
            extension,
            size_bytes,
            size_human: format_size(size_bytes),
            last_modified,
            read_only,
            no_delete,
        });
    }

    entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_listing_sorts_case_insensitively() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("banana.txt"), "b").unwrap();
        fs::write(dir.path().join("Apple.txt"), "a").unwrap();
        fs::write(dir.path().join("cherry.txt"), "c").unwrap();

        let entries =
            list_directory(dir.path(), &AclOverlay::default(), false, false).unwrap();
        assert_eq!(
            names(&entries),
            vec!["Apple.txt", "banana.txt", "cherry.txt"]
        );
    }

    #[test]
    fn test_directories_carry_trailing_slash() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();

        let entries =
            list_directory(dir.path(), &AclOverlay::default(), false, false).unwrap();
        let sub = entries.iter().find(|e| e.is_dir).unwrap();
        assert_eq!(sub.name, "sub/");
        assert_eq!(sub.size_bytes, 0);
    }

    #[test]
    fn test_overlay_file_and_blocked_names_omitted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OVERLAY_FILE), "{}").unwrap();
        fs::write(dir.path().join("secret.txt"), "s").unwrap();
        fs::write(dir.path().join("public.txt"), "p").unwrap();
        fs::create_dir(dir.path().join("hidden")).unwrap();

        let overlay = AclOverlay {
            auth: String::new(),
            block: vec!["secret.txt".into(), "hidden/".into()],
        };
        let entries = list_directory(dir.path(), &overlay, false, false).unwrap();
        assert_eq!(names(&entries), vec!["public.txt"]);
    }

    #[test]
    fn test_in_flight_upload_temp_omitted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.pdf~"), "partial").unwrap();
        fs::write(dir.path().join("done.txt"), "d").unwrap();

        let entries =
            list_directory(dir.path(), &AclOverlay::default(), false, false).unwrap();
        assert_eq!(names(&entries), vec!["done.txt"]);
    }

    #[test]
    fn test_entry_metadata_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.tar.gz"), b"12345").unwrap();

        let entries =
            list_directory(dir.path(), &AclOverlay::default(), true, true).unwrap();
        let entry = &entries[0];
        assert_eq!(entry.size_bytes, 5);
        assert_eq!(entry.size_human, "5 B");
        assert_eq!(entry.extension.as_deref(), Some("gz"));
        assert!(entry.last_modified > 0);
        assert!(entry.read_only);
        assert!(entry.no_delete);
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1000), "1.0 kB");
        assert_eq!(format_size(1_500_000), "1.5 MB");
        assert_eq!(format_size(2_000_000_000), "2.0 GB");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_reports_target() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), "real").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let entries =
            list_directory(dir.path(), &AclOverlay::default(), false, false).unwrap();
        let link = entries.iter().find(|e| e.name == "link.txt").unwrap();
        assert!(link.is_symlink);
        assert!(link.symlink_target.as_deref().unwrap().ends_with("real.txt"));
        assert_eq!(link.size_bytes, 4);
    }
}
