//! Uniform JSON response wrapper shared by every endpoint.

use crate::models::{image::StoredImage, upload::UploadRequest};
use serde::Serialize;

/// Submitted details echoed back after a successful upload.
#[derive(Serialize, Debug, Clone)]
pub struct UploadedProfile {
    pub name: String,
    pub email: String,
    pub password: String,
    pub images: Vec<StoredImage>,
}

impl UploadedProfile {
    pub fn new(request: UploadRequest, images: Vec<StoredImage>) -> Self {
        Self {
            name: request.name,
            email: request.email,
            password: request.password,
            images,
        }
    }
}

/// `{ success, message, ...payload }`. Payload keys are omitted when unset.
#[derive(Serialize, Debug)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UploadedProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<StoredImage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<StoredImage>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            images: None,
            image: None,
        }
    }

    pub fn with_data(mut self, data: UploadedProfile) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_images(mut self, images: Vec<StoredImage>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_image(mut self, image: StoredImage) -> Self {
        self.image = Some(image);
        self
    }
}
