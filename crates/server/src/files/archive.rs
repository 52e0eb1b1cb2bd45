//! On-the-fly zip archives for directory and multi-file downloads.
//!
//! The archive is assembled in a blocking task into an unlinked temp file
//! (the writer needs seek access for the central directory), then handed
//! back as an async reader for the response body. Memory stays bounded
//! regardless of archive size.

use std::fs;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ServerError, ServerResult};
use crate::files::resolver::{PathResolver, OVERLAY_FILE};

/// One archive root: the filesystem path and the name it takes inside
/// the archive.
#[derive(Debug, Clone)]
pub struct ArchiveTarget {
    pub full_path: PathBuf,
    pub entry_name: String,
}

/// Build a zip archive of the given targets and return it as an async
/// file positioned at the start.
///
/// Directories recurse. Per-directory overlays apply during the walk, so
/// blocked entries never leak into an archive.
pub async fn build_zip(
    resolver: PathResolver,
    targets: Vec<ArchiveTarget>,
) -> ServerResult<File> {
    let std_file = tokio::task::spawn_blocking(move || -> ServerResult<fs::File> {
        let mut spool = tempfile::tempfile()
            .map_err(|e| ServerError::Internal(format!("archive spool: {e}")))?;
        write_archive(&resolver, &targets, &mut spool)?;
        spool.rewind()
            .map_err(|e| ServerError::Internal(format!("archive spool: {e}")))?;
        Ok(spool)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("archive task: {e}")))??;

    Ok(File::from_std(std_file))
}

fn write_archive<W: Write + Seek>(
    resolver: &PathResolver,
    targets: &[ArchiveTarget],
    out: W,
) -> ServerResult<()> {
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    for target in targets {
        add_path(resolver, &mut zip, &target.full_path, &target.entry_name, options)?;
    }

    zip.finish()
        .map_err(|e| ServerError::Internal(format!("finishing archive: {e}")))?;
    Ok(())
}

fn add_path<W: Write + Seek>(
    resolver: &PathResolver,
    zip: &mut ZipWriter<W>,
    full_path: &Path,
    entry_name: &str,
    options: SimpleFileOptions,
) -> ServerResult<()> {
    let meta = fs::metadata(full_path)?;
    if meta.is_dir() {
        zip.add_directory(format!("{entry_name}/"), options)
            .map_err(|e| ServerError::Internal(format!("archiving {entry_name}: {e}")))?;
        let overlay = resolver.load_overlay(full_path);
        for item in fs::read_dir(full_path)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().to_string();
            if name == OVERLAY_FILE || name.ends_with('~') {
                continue;
            }
            let child_is_dir = item
                .file_type()
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if child_is_dir && overlay.blocks_dir(&name) {
                continue;
            }
            if !child_is_dir && overlay.blocks_file(&name) {
                continue;
            }
            add_path(
                resolver,
                zip,
                &item.path(),
                &format!("{entry_name}/{name}"),
                options,
            )?;
        }
    } else {
        zip.start_file(entry_name, options)
            .map_err(|e| ServerError::Internal(format!("archiving {entry_name}: {e}")))?;
        let mut src = fs::File::open(full_path)?;
        io::copy(&mut src, zip)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn read_archive(file: &mut File) -> zip::ZipArchive<std::io::Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await.unwrap();
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap()
    }

    #[tokio::test]
    async fn test_zip_single_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "remember").unwrap();
        let resolver = PathResolver::new(dir.path().to_path_buf());

        let mut file = build_zip(
            resolver,
            vec![ArchiveTarget {
                full_path: dir.path().join("notes.txt"),
                entry_name: "notes.txt".to_string(),
            }],
        )
        .await
        .unwrap();

        let mut archive = read_archive(&mut file).await;
        let mut content = String::new();
        archive
            .by_name("notes.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "remember");
    }

    #[tokio::test]
    async fn test_zip_directory_recurses_and_honors_overlay() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("proj/sub")).unwrap();
        fs::write(dir.path().join("proj/keep.txt"), "k").unwrap();
        fs::write(dir.path().join("proj/keep.txt~"), "partial").unwrap();
        fs::write(dir.path().join("proj/secret.txt"), "s").unwrap();
        fs::write(dir.path().join("proj/sub/deep.txt"), "d").unwrap();
        fs::write(
            dir.path().join("proj").join(OVERLAY_FILE),
            r#"{"auth":"","block":["secret.txt"]}"#,
        )
        .unwrap();
        let resolver = PathResolver::new(dir.path().to_path_buf());

        let mut file = build_zip(
            resolver,
            vec![ArchiveTarget {
                full_path: dir.path().join("proj"),
                entry_name: "proj".to_string(),
            }],
        )
        .await
        .unwrap();

        let archive = read_archive(&mut file).await;
        let names: Vec<_> = archive.file_names().collect();
        assert!(names.contains(&"proj/keep.txt"));
        assert!(names.contains(&"proj/sub/deep.txt"));
        assert!(!names.contains(&"proj/secret.txt"));
        assert!(!names.contains(&"proj/keep.txt~"));
        assert!(!names.iter().any(|n| n.ends_with(OVERLAY_FILE)));
    }

    #[tokio::test]
    async fn test_zip_multiple_targets() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        let resolver = PathResolver::new(dir.path().to_path_buf());

        let targets = ["a.txt", "b.txt"]
            .iter()
            .map(|n| ArchiveTarget {
                full_path: dir.path().join(n),
                entry_name: n.to_string(),
            })
            .collect();
        let mut file = build_zip(resolver, targets).await.unwrap();
        let archive = read_archive(&mut file).await;
        assert_eq!(archive.len(), 2);
    }
}
