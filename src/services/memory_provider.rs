//! In-process [`ImageProvider`] for local development and tests.
//!
//! Images are only indexed, never copied: the gateway's staged file is the
//! only copy and the returned URL uses the `memory://` scheme. Tags from
//! [`UploadOptions`] are not kept: nothing here lists or filters by tag, and
//! an image's identity depends only on its folder and filename.

use crate::{
    models::image::StoredImage,
    services::provider::{ImageProvider, ProviderError, ProviderResult, UploadOptions},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, path::Path};
use tokio::{fs, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryProvider {
    images: RwLock<BTreeMap<String, StoredImage>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn public_id(path: &Path, options: &UploadOptions) -> String {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|_| options.use_filename);
        let name = match stem {
            Some(stem) if options.unique_filename => {
                format!("{}_{}", stem, &Uuid::new_v4().simple().to_string()[..6])
            }
            Some(stem) => stem.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        if options.folder.is_empty() {
            name
        } else {
            format!("{}/{}", options.folder, name)
        }
    }
}

#[async_trait]
impl ImageProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, path: &Path, options: &UploadOptions) -> ProviderResult<StoredImage> {
        // Fail the same way a remote provider would when the staged file is gone.
        fs::metadata(path).await?;

        let id = Self::public_id(path, options);
        let mut images = self.images.write().await;
        if let Some(existing) = images.get(&id) {
            if !options.overwrite {
                return Ok(existing.clone());
            }
        }

        let url = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("memory://{}.{}", id, ext),
            None => format!("memory://{}", id),
        };
        let image = StoredImage { id: id.clone(), url };
        images.insert(id, image.clone());
        debug!(id = %image.id, "stored image in memory");
        Ok(image)
    }

    async fn list_by_prefix(&self, prefix: &str) -> ProviderResult<Vec<StoredImage>> {
        let images = self.images.read().await;
        Ok(images
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(_, image)| image.clone())
            .collect())
    }

    async fn get(&self, public_id: &str) -> ProviderResult<StoredImage> {
        self.images
            .read()
            .await
            .get(public_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("Resource not found - {}", public_id)))
    }

    async fn delete(&self, public_id: &str) -> ProviderResult<()> {
        self.images
            .write()
            .await
            .remove(public_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("Resource not found - {}", public_id)))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> ProviderResult<()> {
        let mut images = self.images.write().await;
        images.retain(|id, _| !id.starts_with(prefix));
        Ok(())
    }

    async fn ping(&self) -> ProviderResult<()> {
        Ok(())
    }
}
