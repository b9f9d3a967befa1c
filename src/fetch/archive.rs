use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;
use zip::ZipArchive;

use crate::constants::fetch::EXTRACTING_SUFFIX;
use crate::errors::{DatasetError, Result};
use crate::locator::ResourceId;

/// Extract `archive` into `target`, returning `target`.
///
/// Extraction writes into a temporary sibling directory that is renamed into
/// place once complete. An existing `target` is treated as already extracted.
pub fn extract_archive(resource: &ResourceId, archive: &Path, target: &Path) -> Result<PathBuf> {
    if target.is_dir() {
        return Ok(target.to_path_buf());
    }
    let parent = target.parent().ok_or_else(|| {
        DatasetError::unavailable(
            resource,
            format!("extraction target {} has no parent", target.display()),
        )
    })?;
    fs::create_dir_all(parent).map_err(|err| {
        DatasetError::unavailable(
            resource,
            format!("failed creating extraction dir {}: {err}", parent.display()),
        )
    })?;

    let started = Instant::now();
    let file = File::open(archive).map_err(|err| {
        DatasetError::unavailable(
            resource,
            format!("failed opening archive {}: {err}", archive.display()),
        )
    })?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|err| {
        DatasetError::unavailable(
            resource,
            format!("invalid ZIP archive {}: {err}", archive.display()),
        )
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".")
        .suffix(&format!(".{EXTRACTING_SUFFIX}"))
        .tempdir_in(parent)
        .map_err(|err| {
            DatasetError::unavailable(
                resource,
                format!("failed creating staging dir in {}: {err}", parent.display()),
            )
        })?;
    zip.extract(staging.path()).map_err(|err| {
        DatasetError::unavailable(
            resource,
            format!("failed extracting {}: {err}", archive.display()),
        )
    })?;

    if let Err(err) = fs::rename(staging.path(), target) {
        // Another extractor may have finished the same shard first.
        if !target.is_dir() {
            return Err(DatasetError::unavailable(
                resource,
                format!(
                    "failed moving extracted shard into {}: {err}",
                    target.display()
                ),
            ));
        }
    }
    info!(
        "[diffusiondb:fetch] extracted {} entries from {} in {:.2}s",
        zip.len(),
        archive.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ShardId;
    use crate::locator::ShardLocator;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn resource() -> ResourceId {
        ShardLocator::default().locate(ShardId::new(1).unwrap())
    }

    #[test]
    fn extracts_entries_into_target() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("part-000001.zip");
        write_zip(&archive, &[("a.png", b"png-a"), ("part-000001.json", b"{}")]);
        let target = dir.path().join("out").join("part-000001");

        let extracted = extract_archive(&resource(), &archive, &target).unwrap();
        assert_eq!(extracted, target);
        assert_eq!(fs::read(target.join("a.png")).unwrap(), b"png-a");
        assert!(target.join("part-000001.json").is_file());

        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(EXTRACTING_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn existing_target_short_circuits() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("part-000001");
        fs::create_dir_all(&target).unwrap();
        let missing_archive = dir.path().join("missing.zip");
        let extracted = extract_archive(&resource(), &missing_archive, &target).unwrap();
        assert_eq!(extracted, target);
    }

    #[test]
    fn invalid_archive_reports_resource_unavailable() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("part-000001.zip");
        fs::write(&archive, b"not a zip").unwrap();
        let err = extract_archive(&resource(), &archive, &dir.path().join("x")).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ResourceUnavailable { ref reason, .. } if reason.contains("invalid ZIP")
        ));
    }
}
