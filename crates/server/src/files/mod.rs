//! Filesystem subsystem: path resolution with ACL overlays, directory
//! listings, streamed uploads and zip archives.

pub mod archive;
pub mod listing;
pub mod resolver;
pub mod upload;

pub use archive::{build_zip, ArchiveTarget};
pub use listing::{format_size, list_directory, DirectoryEntry};
pub use resolver::{clean_request_path, AclOverlay, PathResolver, Resolved, OVERLAY_FILE};
pub use upload::{receive_stream, sanitize_filename};
