//! GatewayService — validates upload submissions and relays image
//! operations to the configured [`ImageProvider`].
//!
//! Every operation is a single pass: validate, call the provider, hand the
//! result back. Nothing is cached and nothing is retried.

use crate::{
    models::{
        envelope::UploadedProfile,
        image::{ImageQuery, StoredImage},
        upload::{StagedFile, UploadForm, UploadRequest},
    },
    services::{
        provider::{ImageProvider, ProviderError, UploadOptions},
        staging::{self, StagingError, UploadPolicy},
    },
};
use futures::future::try_join_all;
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};

pub const MISSING_ID: &str = "Please provide public ID of image";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),
    #[error("Failure uploading files to the image provider")]
    UploadFailed,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<StagingError> for GatewayError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::Io(err) => GatewayError::Io(err),
            other => GatewayError::Validation(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Shared handler state: the provider plus the fixed namespace/tag and the
/// staging policy for uploads.
#[derive(Clone)]
pub struct GatewayService {
    provider: Arc<dyn ImageProvider>,
    pub policy: UploadPolicy,
    pub namespace: String,
    pub tag: String,
}

impl GatewayService {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        policy: UploadPolicy,
        namespace: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            policy,
            namespace: namespace.into(),
            tag: tag.into(),
        }
    }

    pub fn provider(&self) -> &dyn ImageProvider {
        self.provider.as_ref()
    }

    /// Validate a parsed form and forward its files.
    ///
    /// Staged files are discarded afterwards whatever the outcome.
    pub async fn upload(&self, form: UploadForm) -> GatewayResult<UploadedProfile> {
        let staged = form.files.clone();
        let result = self.validate_and_forward(form).await;
        staging::discard(&staged).await;
        result
    }

    async fn validate_and_forward(&self, form: UploadForm) -> GatewayResult<UploadedProfile> {
        let rejected = form.rejected;
        let request =
            UploadRequest::try_from(form).map_err(|msg| GatewayError::Validation(msg.into()))?;
        info!(
            files = request.files.len(),
            bytes = request.files.iter().map(|f| f.size_bytes).sum::<u64>(),
            rejected,
            provider = self.provider.name(),
            "forwarding upload"
        );

        let images = self.forward(&request.files).await?;
        Ok(UploadedProfile::new(request, images))
    }

    /// One provider upload per file, run concurrently; results keep the
    /// order of `files` and any failure fails the whole batch.
    async fn forward(&self, files: &[StagedFile]) -> GatewayResult<Vec<StoredImage>> {
        let options = UploadOptions::stable(&self.namespace, &self.tag);
        let uploads = files
            .iter()
            .map(|file| self.provider.upload(&file.path, &options));

        try_join_all(uploads).await.map_err(|err| {
            warn!(error = %err, "provider upload failed");
            GatewayError::UploadFailed
        })
    }

    /// Folder prefix for namespace-wide operations. The trailing slash keeps
    /// sibling folders such as `users_archive/` out of `users`.
    fn folder_prefix(&self) -> String {
        format!("{}/", self.namespace)
    }

    /// Every image under the namespace.
    pub async fn list_images(&self) -> GatewayResult<Vec<StoredImage>> {
        let images = self.provider.list_by_prefix(&self.folder_prefix()).await?;
        info!(count = images.len(), namespace = %self.namespace, "listed images");
        Ok(images)
    }

    pub async fn get_image(&self, query: Option<ImageQuery>) -> GatewayResult<StoredImage> {
        let id = self.resolve(query)?;
        Ok(self.provider.get(&id).await?)
    }

    pub async fn delete_image(&self, query: Option<ImageQuery>) -> GatewayResult<()> {
        let id = self.resolve(query)?;
        self.provider.delete(&id).await?;
        info!(id = %id, "deleted image");
        Ok(())
    }

    /// One bulk delete for the whole namespace.
    pub async fn delete_all(&self) -> GatewayResult<()> {
        self.provider.delete_by_prefix(&self.folder_prefix()).await?;
        info!(namespace = %self.namespace, "deleted all images");
        Ok(())
    }

    fn resolve(&self, query: Option<ImageQuery>) -> GatewayResult<String> {
        let id = query
            .map(|q| q.resolve(&self.namespace))
            .filter(|id| !id.is_empty() && !id.ends_with('/'))
            .ok_or_else(|| GatewayError::Validation(MISSING_ID.into()))?;
        Ok(id)
    }
}
