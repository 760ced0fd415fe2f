//! Chapter archive packaging.
//!
//! Bundles a completed chapter's page files into one flat CBZ container.
//! The archive name is the chapter directory's name with a `.cbz`
//! extension, disambiguated with ` (1)`, ` (2)`, … on collision.
//! Cancellation is checked between file additions; a partially written
//! archive is removed best-effort before the cancellation propagates.
//! After a successful save the loose page files and the emptied directory
//! are cleaned up best-effort — cleanup failures never surface, since the
//! archive itself already succeeded.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{Error, Result};

/// First free archive path for a chapter directory.
///
/// `<parent>/<dir-name>.cbz`, then `<dir-name> (1).cbz`, `<dir-name>
/// (2).cbz`, … until a name is free.
pub fn archive_path_for(chapter_dir: &Path) -> PathBuf {
    let parent = chapter_dir.parent().unwrap_or_else(|| Path::new(""));
    let stem = chapter_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chapter".to_string());

    let mut candidate = parent.join(format!("{stem}.cbz"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = parent.join(format!("{stem} ({counter}).cbz"));
        counter += 1;
    }
    candidate
}

/// Package the given page files into a chapter archive.
///
/// Entries are added flatly (no internal subdirectories) in the order
/// given. Returns the path of the written archive.
pub fn package_chapter(
    chapter_dir: &Path,
    page_files: &[PathBuf],
    token: &CancellationToken,
) -> Result<PathBuf> {
    let archive_path = archive_path_for(chapter_dir);
    tracing::info!(
        archive = %archive_path.display(),
        files = page_files.len(),
        "packaging chapter"
    );

    let file = File::create(&archive_path)?;
    let mut writer = zip::ZipWriter::new(file);

    if let Err(e) = add_pages(&mut writer, page_files, token) {
        drop(writer);
        // A cancelled packaging must not leave a half-written archive behind
        if let Err(remove_err) = std::fs::remove_file(&archive_path) {
            tracing::warn!(
                archive = %archive_path.display(),
                error = %remove_err,
                "failed to remove partial archive"
            );
        }
        return Err(e);
    }
    writer.finish()?;

    cleanup_loose_files(chapter_dir, page_files);
    Ok(archive_path)
}

fn add_pages(
    writer: &mut zip::ZipWriter<File>,
    page_files: &[PathBuf],
    token: &CancellationToken,
) -> Result<()> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in page_files {
        if token.is_cancelled() {
            tracing::info!("cancellation observed between archive entries");
            return Err(Error::Cancelled);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(name, options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, writer)?;
    }
    Ok(())
}

/// Delete the loose page files and the emptied chapter directory.
///
/// Best-effort only: the archive already succeeded, so nothing here may
/// fail the task.
fn cleanup_loose_files(chapter_dir: &Path, page_files: &[PathBuf]) {
    for path in page_files {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(file = %path.display(), error = %e, "failed to delete loose page file");
        }
    }

    let is_empty = std::fs::read_dir(chapter_dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty && let Err(e) = std::fs::remove_dir(chapter_dir) {
        tracing::warn!(dir = %chapter_dir.display(), error = %e, "failed to remove chapter directory");
    }
}
