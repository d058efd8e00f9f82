//! [`ImageProvider`] backed by the Cloudinary REST API.
//!
//! Uploads and single deletes go through the signed upload API; listing,
//! lookup and bulk deletes use the Admin API with basic auth.

use crate::{
    config::CloudinaryConfig,
    models::image::StoredImage,
    services::provider::{ImageProvider, ProviderError, ProviderResult, UploadOptions},
};
use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Client, RequestBuilder, StatusCode, Url,
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use sha1::{Digest, Sha1};
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::{debug, warn};

/// Parameters sent with a request but never part of its signature.
const UNSIGNED_PARAMS: [&str; 4] = ["file", "api_key", "resource_type", "cloud_name"];
const LIST_PAGE_SIZE: &str = "500";

#[derive(Deserialize)]
struct Resource {
    public_id: String,
    secure_url: String,
}

impl From<Resource> for StoredImage {
    fn from(resource: Resource) -> Self {
        Self {
            id: resource.public_id,
            url: resource.secure_url,
        }
    }
}

#[derive(Deserialize)]
struct ResourcePage {
    #[serde(default)]
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct DestroyResult {
    result: String,
}

#[derive(Deserialize)]
struct BulkDeleteResult {
    #[serde(default)]
    partial: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct CloudinaryProvider {
    client: Client,
    base: Url,
    config: CloudinaryConfig,
}

impl CloudinaryProvider {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(&config.api_base)
            .with_context(|| format!("parsing Cloudinary API base `{}`", config.api_base))?;
        if base.cannot_be_a_base() {
            bail!("Cloudinary API base `{}` is not a base URL", config.api_base);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// `{api_base}/v1_1/{cloud_name}/{path...}`; every segment is escaped.
    fn url<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("v1_1")
                .push(&self.config.cloud_name)
                .extend(path);
        }
        url
    }

    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.api_key, Some(&self.config.api_secret))
    }

    /// Add `timestamp`, `api_key` and `signature` to a signed-API parameter set.
    fn signed(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign(&params, &self.config.api_secret);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature", signature));
        params
    }
}

/// `k=v` pairs sorted by key and joined with `&`, skipping empty values and
/// parameters Cloudinary does not sign.
pub fn string_to_sign(params: &[(&str, String)]) -> String {
    let mut signed: Vec<_> = params
        .iter()
        .filter(|(key, value)| !value.is_empty() && !UNSIGNED_PARAMS.contains(key))
        .collect();
    signed.sort_by(|a, b| a.0.cmp(b.0));
    signed
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex SHA-1 of the string to sign followed by the API secret.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Turn a non-success response into a [`ProviderError`], keeping
/// Cloudinary's own message when the body carries one.
fn classify(status: StatusCode, body: &[u8]) -> ProviderError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("provider error").to_string()
            } else {
                text
            }
        });
    if status == StatusCode::NOT_FOUND {
        ProviderError::NotFound(message)
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

async fn read_json<T: DeserializeOwned>(builder: RequestBuilder) -> ProviderResult<T> {
    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(classify(status, &body));
    }
    serde_json::from_slice(&body).map_err(|err| ProviderError::Decode(err.to_string()))
}

#[async_trait]
impl ImageProvider for CloudinaryProvider {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, path: &Path, options: &UploadOptions) -> ProviderResult<StoredImage> {
        let mut params = vec![
            ("folder", options.folder.clone()),
            ("overwrite", options.overwrite.to_string()),
            ("unique_filename", options.unique_filename.to_string()),
            ("use_filename", options.use_filename.to_string()),
        ];
        if !options.tags.is_empty() {
            params.push(("tags", options.tags.join(",")));
        }

        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        debug!(file = %file_name, size = bytes.len(), "uploading to cloudinary");

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        for (key, value) in self.signed(params) {
            form = form.text(key, value);
        }

        let resource: Resource =
            read_json(self.client.post(self.url(["image", "upload"])).multipart(form)).await?;
        Ok(resource.into())
    }

    async fn list_by_prefix(&self, prefix: &str) -> ProviderResult<Vec<StoredImage>> {
        let mut images = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self
                .admin(self.client.get(self.url(["resources", "image", "upload"])))
                .query(&[("prefix", prefix), ("max_results", LIST_PAGE_SIZE)]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("next_cursor", cursor)]);
            }

            let page: ResourcePage = read_json(request).await?;
            images.extend(page.resources.into_iter().map(StoredImage::from));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(images)
    }

    async fn get(&self, public_id: &str) -> ProviderResult<StoredImage> {
        let url = self.url(
            ["resources", "image", "upload"]
                .into_iter()
                .chain(public_id.split('/')),
        );
        let resource: Resource = read_json(self.admin(self.client.get(url))).await?;
        Ok(resource.into())
    }

    async fn delete(&self, public_id: &str) -> ProviderResult<()> {
        let params = self.signed(vec![("public_id", public_id.to_string())]);
        let outcome: DestroyResult =
            read_json(self.client.post(self.url(["image", "destroy"])).form(&params)).await?;
        match outcome.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(ProviderError::NotFound(format!(
                "Resource not found - {}",
                public_id
            ))),
            other => Err(ProviderError::Decode(format!(
                "destroy returned `{}`",
                other
            ))),
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) -> ProviderResult<()> {
        let request = self
            .admin(
                self.client
                    .delete(self.url(["resources", "image", "upload"])),
            )
            .query(&[("prefix", prefix)]);
        let outcome: BulkDeleteResult = read_json(request).await?;
        if outcome.partial {
            warn!(prefix, "cloudinary deleted only part of the prefix in one call");
        }
        Ok(())
    }

    async fn ping(&self) -> ProviderResult<()> {
        let _: serde_json::Value = read_json(self.admin(self.client.get(self.url(["ping"])))).await?;
        Ok(())
    }
}
