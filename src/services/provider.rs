//! The seam between the gateway and whichever image host stores the files.

use crate::models::image::StoredImage;
use async_trait::async_trait;
use std::{io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("unexpected provider response: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Naming and placement options for a single upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Folder (namespace) the image is stored under.
    pub folder: String,
    /// Derive the public id from the local filename.
    pub use_filename: bool,
    /// Append a random suffix to the derived public id.
    pub unique_filename: bool,
    /// Replace an existing image with the same public id.
    pub overwrite: bool,
    pub tags: Vec<String>,
}

impl UploadOptions {
    /// Stable filename-derived ids inside `folder`, tagged with `tag`.
    pub fn stable(folder: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            use_filename: true,
            unique_filename: false,
            overwrite: true,
            tags: vec![tag.into()],
        }
    }
}

/// Remote image storage.
///
/// Implementations report a missing image as [`ProviderError::NotFound`] so
/// callers can tell it apart from an outage.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Upload the file at `path`.
    async fn upload(&self, path: &Path, options: &UploadOptions) -> ProviderResult<StoredImage>;

    /// Every image whose id starts with `prefix`.
    async fn list_by_prefix(&self, prefix: &str) -> ProviderResult<Vec<StoredImage>>;

    async fn get(&self, public_id: &str) -> ProviderResult<StoredImage>;

    async fn delete(&self, public_id: &str) -> ProviderResult<()>;

    /// Remove every image whose id starts with `prefix`, in one call.
    async fn delete_by_prefix(&self, prefix: &str) -> ProviderResult<()>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> ProviderResult<()>;
}
