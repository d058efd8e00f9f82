//! Data models for the upload gateway.
//!
//! Nothing here is persisted by the gateway; images live with the provider
//! and these types only carry a request through to its response.

pub mod envelope;
pub mod image;
pub mod upload;
