//! Represents an image held by the remote provider.

use serde::{Deserialize, Serialize};

/// Reference to an image stored by the provider.
///
/// The gateway never owns the image itself; it only relays the identifier
/// and public address the provider handed back.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredImage {
    /// Opaque provider identifier (e.g. `users/profilePhotos_1700000000000_ab12cd34`).
    pub id: String,

    /// Publicly resolvable URL.
    pub url: String,
}

/// Address of a single image, as requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageQuery {
    /// Full public identifier, taken verbatim from `?id=`.
    PublicId(String),
    /// Bare name taken from the path, resolved inside the namespace.
    InNamespace(String),
}

impl ImageQuery {
    /// Build the provider identifier for this query.
    pub fn resolve(&self, namespace: &str) -> String {
        match self {
            ImageQuery::PublicId(id) => id.clone(),
            ImageQuery::InNamespace(name) => format!("{}/{}", namespace, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ids() {
        let q = ImageQuery::PublicId("users/a".into());
        assert_eq!(q.resolve("avatars"), "users/a");

        let q = ImageQuery::InNamespace("a".into());
        assert_eq!(q.resolve("users"), "users/a");
    }
}
