//! Writes accepted multipart files to the upload directory before they are
//! forwarded to the provider.
//!
//! What gets accepted and where it lands are plain functions held by
//! [`UploadPolicy`], so the pipeline itself never inspects content types or
//! invents filenames.

use crate::models::upload::{FileMeta, StagedFile};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Decides whether a file part is kept.
pub type AcceptFn = fn(&FileMeta) -> bool;

/// Picks the staged filename for an accepted file.
pub type NameFn = fn(&FileMeta) -> String;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("File too large: limit is {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("failed reading upload stream: {0}")]
    Stream(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Accept anything whose declared content type mentions `image`.
pub fn accept_images(meta: &FileMeta) -> bool {
    meta.content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("image"))
}

/// `<field>_<unix millis>_<8 hex>.<subtype>`, e.g. `profilePhotos_1700000000000_1a2b3c4d.png`.
pub fn timestamped_name(meta: &FileMeta) -> String {
    let content_type = meta
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let subtype: String = content_type
        .trim_start_matches("image/")
        .chars()
        .take_while(|c| *c != ';')
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let base = format!("{}_{}_{}", meta.field, Utc::now().timestamp_millis(), suffix);
    if subtype.is_empty() {
        base
    } else {
        format!("{}.{}", base, subtype)
    }
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Directory staged files are written to.
    pub upload_dir: PathBuf,
    /// The only multipart field files are accepted under.
    pub file_field: String,
    pub max_files: usize,
    pub max_file_size: u64,
    pub accept: AcceptFn,
    pub name: NameFn,
}

impl UploadPolicy {
    pub fn new(upload_dir: impl Into<PathBuf>, file_field: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            file_field: file_field.into(),
            max_files: crate::config::MAX_FILES,
            max_file_size: 10 * 1024 * 1024,
            accept: accept_images,
            name: timestamped_name,
        }
    }

    pub fn with_limits(mut self, max_files: usize, max_file_size: u64) -> Self {
        self.max_files = max_files;
        self.max_file_size = max_file_size;
        self
    }

    /// Upper bound for a whole upload body.
    pub fn body_limit(&self) -> usize {
        let files = (self.max_files as u64).saturating_mul(self.max_file_size);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// Stream one file part to disk.
    ///
    /// Returns `Ok(None)` when the accept predicate rejects the file; its
    /// bytes are still drained so the multipart body can continue. A file
    /// over the size limit leaves nothing behind on disk.
    pub async fn stage<S, E>(
        &self,
        meta: FileMeta,
        stream: S,
    ) -> Result<Option<StagedFile>, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        pin_mut!(stream);

        if !(self.accept)(&meta) {
            debug!(field = %meta.field, content_type = ?meta.content_type, "dropping non-image file");
            while let Some(chunk) = stream.next().await {
                chunk.map_err(|err| StagingError::Stream(err.to_string()))?;
            }
            return Ok(None);
        }

        let path = self.upload_dir.join((self.name)(&meta));
        let mut file = File::create(&path).await?;
        let mut size_bytes: u64 = 0;

        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&path).await;
                    return Err(StagingError::Stream(err.to_string()));
                }
            };
            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_file_size {
                let _ = fs::remove_file(&path).await;
                return Err(StagingError::TooLarge {
                    limit: self.max_file_size,
                });
            }
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&path).await;
                return Err(StagingError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&path).await;
            return Err(StagingError::Io(err));
        }

        debug!(
            path = %path.display(),
            original = ?meta.file_name,
            size_bytes,
            "staged upload"
        );
        Ok(Some(StagedFile {
            meta,
            path,
            size_bytes,
        }))
    }
}

/// Remove staged files, best-effort.
pub async fn discard(files: &[StagedFile]) {
    for file in files {
        remove_quietly(&file.path).await;
    }
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(_) => debug!("removed staged file {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => debug!("failed to remove staged file {}: {}", path.display(), err),
    }
}
