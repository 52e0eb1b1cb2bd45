//! Streamed upload pipeline.
//!
//! Bodies are written chunk by chunk into a `<final-name>~` temp file in
//! the destination directory, synced, then atomically renamed over the
//! final name. A reader never observes a partially written file, and a
//! failed transfer leaves nothing behind.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{ServerError, ServerResult};
use crate::files::resolver::OVERLAY_FILE;

/// Reduce a client-supplied filename to its final path segment and reject
/// names that cannot safely land in the destination directory.
pub fn sanitize_filename(raw: &str) -> ServerResult<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ServerError::BadRequest(format!(
            "invalid upload filename {raw:?}"
        )));
    }
    if name == OVERLAY_FILE || name.ends_with('~') {
        return Err(ServerError::BadRequest(
            "reserved filename".to_string(),
        ));
    }
    Ok(name)
}

/// Stream a request body into `dest_dir/filename`.
///
/// Returns the final path. The temp file is claimed exclusively, so a
/// second transfer for the same name fails instead of interleaving its
/// chunks, and it is removed on any write or rename error.
pub async fn receive_stream<S, E>(
    dest_dir: &Path,
    filename: &str,
    mut stream: S,
) -> ServerResult<PathBuf>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let final_path = dest_dir.join(filename);
    let temp_path = dest_dir.join(format!("{filename}~"));

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            // Another transfer owns this temp name; its file stays put.
            return Err(ServerError::BadRequest(format!(
                "upload already in progress for {filename:?}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = write_chunks(&mut file, &mut stream).await {
        drop(file);
        remove_temp(&temp_path).await;
        return Err(e);
    }
    drop(file);

    if let Err(e) = fs::rename(&temp_path, &final_path).await {
        remove_temp(&temp_path).await;
        return Err(ServerError::Internal(format!(
            "renaming {} into place: {e}",
            temp_path.display()
        )));
    }

    tracing::info!(path = %final_path.display(), "upload complete");
    Ok(final_path)
}

async fn remove_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        tracing::debug!(path = %temp_path.display(), error = %e, "temp file cleanup failed");
    }
}

async fn write_chunks<S, E>(file: &mut File, stream: &mut S) -> ServerResult<()>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| ServerError::BadRequest(format!("body stream: {e}")))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;

    fn ok_chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_sanitize_strips_path_segments() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("/tmp/evil/report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("C:\\Users\\x\\report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_reserved() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename(OVERLAY_FILE).is_err());
        assert!(sanitize_filename("report.pdf~").is_err());
    }

    #[tokio::test]
    async fn test_upload_writes_final_file() {
        let dir = TempDir::new().unwrap();
        let path = receive_stream(dir.path(), "hello.txt", ok_chunks(&["hel", "lo"]))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        // No temp file remains.
        assert!(!dir.path().join("hello.txt~").exists());
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset".to_string()),
        ];
        let result =
            receive_stream(dir.path(), "broken.bin", stream::iter(chunks)).await;
        assert!(result.is_err());
        assert!(!dir.path().join("broken.bin").exists());
        assert!(!dir.path().join("broken.bin~").exists());
    }

    #[tokio::test]
    async fn test_second_upload_for_same_name_fails_without_interleaving() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.txt~"), "in flight").unwrap();
        let result = receive_stream(dir.path(), "data.txt", ok_chunks(&["rival"])).await;
        assert!(matches!(result, Err(ServerError::BadRequest(_))));
        // The first transfer's temp file is untouched and nothing was
        // published under the final name.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("data.txt~")).unwrap(),
            "in flight"
        );
        assert!(!dir.path().join("data.txt").exists());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("report")).unwrap();
        let result = receive_stream(dir.path(), "report", ok_chunks(&["body"])).await;
        assert!(matches!(result, Err(ServerError::Internal(_))));
        assert!(!dir.path().join("report~").exists());
    }

    #[tokio::test]
    async fn test_upload_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.txt"), "old").unwrap();
        receive_stream(dir.path(), "data.txt", ok_chunks(&["new"]))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("data.txt")).unwrap(),
            "new"
        );
    }
}
