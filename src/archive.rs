// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! On-disk archive of every obtained certificate bundle.
//!
//! Layout: `<root>/<domain>/<unix timestamp>/{privkey,fullchain,chain}.pem` plus
//! `info.json`. Files are written into a hidden `.<timestamp>.partial` sibling and
//! the directory is renamed into place once complete, so a final directory is
//! never half-populated.

use crate::bundle::ObtainedBundle;
use crate::constants::{
    ARCHIVE_CHAIN_FILE, ARCHIVE_FULLCHAIN_FILE, ARCHIVE_INFO_FILE, ARCHIVE_PRIVKEY_FILE,
};
use crate::errors::ArchiveError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Writes obtained bundles under a root directory.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    /// Archive under `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist `bundle` and return the final directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if any file or directory operation fails, or if
    /// the target directory already exists.
    pub async fn write(&self, bundle: &ObtainedBundle) -> Result<PathBuf, ArchiveError> {
        let domain_dir = self.root.join(archive_dir_name(&bundle.domain));
        let timestamp = bundle.obtained_at.timestamp();
        let staging = domain_dir.join(format!(".{timestamp}.partial"));
        let target = domain_dir.join(timestamp.to_string());

        if fs::try_exists(&target).await.map_err(|e| io_error(&target, e))? {
            return Err(io_error(
                &target,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "archive entry exists"),
            ));
        }

        // Leftover from an interrupted write of the same timestamp
        if fs::try_exists(&staging).await.map_err(|e| io_error(&staging, e))? {
            fs::remove_dir_all(&staging)
                .await
                .map_err(|e| io_error(&staging, e))?;
        }

        fs::create_dir_all(&staging)
            .await
            .map_err(|e| io_error(&staging, e))?;

        write_private_key(&staging.join(ARCHIVE_PRIVKEY_FILE), &bundle.private_key).await?;
        write_file(&staging.join(ARCHIVE_FULLCHAIN_FILE), bundle.certificate.as_bytes()).await?;
        write_file(&staging.join(ARCHIVE_CHAIN_FILE), bundle.issuer_certificate.as_bytes()).await?;

        let info = serde_json::to_vec_pretty(bundle)?;
        write_file(&staging.join(ARCHIVE_INFO_FILE), &info).await?;

        debug!(staging = %staging.display(), "Archive files written, moving into place");
        fs::rename(&staging, &target)
            .await
            .map_err(|e| io_error(&target, e))?;

        info!(
            domain = %bundle.domain,
            path = %target.display(),
            "Archived certificate bundle"
        );
        Ok(target)
    }
}

/// Directory name for a domain; `*.a.com` becomes `_wildcard.a.com`.
#[must_use]
pub fn archive_dir_name(domain: &str) -> String {
    match domain.strip_prefix("*.") {
        Some(rest) => format!("_wildcard.{rest}"),
        None => domain.to_string(),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ArchiveError> {
    fs::write(path, contents).await.map_err(|e| io_error(path, e))
}

#[cfg(unix)]
async fn write_private_key(path: &Path, pem: &str) -> Result<(), ArchiveError> {
    use tokio::io::AsyncWriteExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(pem.as_bytes())
        .await
        .map_err(|e| io_error(path, e))?;
    file.flush().await.map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
async fn write_private_key(path: &Path, pem: &str) -> Result<(), ArchiveError> {
    write_file(path, pem.as_bytes()).await
}
