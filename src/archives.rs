use async_compression::tokio::bufread::GzipDecoder;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, File};
use tokio::io::BufReader;
use tokio_tar::ArchiveBuilder;
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to unpack {path}: {source}")]
    Unpack {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Unpacks a `.tar.gz` archive into `target_dir`, creating it when missing.
pub async fn unpack_gzip(target_dir: &Path, source_tar: &Path) -> Result<(), ArchiveError> {
    create_dir_all(target_dir)
        .await
        .map_err(|source| ArchiveError::CreateDir {
            path: target_dir.to_path_buf(),
            source,
        })?;

    let tar_gz = File::open(source_tar)
        .await
        .map_err(|source| ArchiveError::Open {
            path: source_tar.to_path_buf(),
            source,
        })?;

    let buf_reader = BufReader::new(tar_gz);

    let gz_decoder = GzipDecoder::new(buf_reader);

    let archive_builder = ArchiveBuilder::new(gz_decoder).set_preserve_permissions(true);

    let mut archive = archive_builder.build();

    archive
        .unpack(target_dir)
        .await
        .map_err(|source| ArchiveError::Unpack {
            path: source_tar.to_path_buf(),
            source,
        })?;

    info!(
        "unpacked: {} -> {}",
        source_tar.display(),
        target_dir.display()
    );

    Ok(())
}
