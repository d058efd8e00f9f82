//! Represents a multipart upload submission and its staged files.

use std::{collections::HashMap, fmt, path::PathBuf};

pub const NO_FIELDS: &str = "No field values were provided";
pub const MISSING_DETAILS: &str = "Please provide all the details";
pub const NO_FILES: &str = "No files were uploaded";

/// Metadata a client declared for one file part.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Multipart field the file arrived under.
    pub field: String,
    /// Client-supplied filename, if any.
    pub file_name: Option<String>,
    /// Declared MIME type.
    pub content_type: Option<String>,
}

/// An accepted file written to the upload directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub meta: FileMeta,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Everything parsed out of a multipart body, before validation.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Text fields; the first value wins when a name repeats.
    pub fields: HashMap<String, String>,
    /// Accepted files in submission order.
    pub files: Vec<StagedFile>,
    /// Files dropped by the accept predicate.
    pub rejected: usize,
}

impl UploadForm {
    pub fn add_field(&mut self, name: String, value: String) {
        self.fields.entry(name).or_insert(value);
    }
}

/// A validated upload: all details present and at least one image.
#[derive(Clone)]
pub struct UploadRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub files: Vec<StagedFile>,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("files", &self.files.len())
            .finish()
    }
}

impl TryFrom<UploadForm> for UploadRequest {
    type Error = &'static str;

    /// Checks, in order: any fields at all, the three details, any files.
    fn try_from(mut form: UploadForm) -> Result<Self, Self::Error> {
        if form.fields.is_empty() {
            return Err(NO_FIELDS);
        }

        let mut take = |key: &str| form.fields.remove(key).filter(|v| !v.is_empty());
        let (Some(name), Some(email), Some(password)) = (take("name"), take("email"), take("password"))
        else {
            return Err(MISSING_DETAILS);
        };

        if form.files.is_empty() {
            return Err(NO_FILES);
        }

        Ok(Self {
            name,
            email,
            password,
            files: form.files,
        })
    }
}
