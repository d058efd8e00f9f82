pub mod cloudinary_provider;
pub mod gateway_service;
pub mod memory_provider;
pub mod provider;
pub mod staging;
