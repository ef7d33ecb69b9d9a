//! Object storage for punch photos.

use async_trait::async_trait;
use derive_more::Display;
use uuid::Uuid;

mod http;
mod local;

pub use http::HttpPutStorage;
pub use local::LocalDiskStorage;

pub const UPPER_BODY_FOLDER: &str = "attendance/upper";
pub const FULL_BODY_FOLDER: &str = "attendance/full";

#[derive(Debug, Display)]
#[display(fmt = "storage error: {}", _0)]
pub struct StorageError(pub String);

impl std::error::Error for StorageError {}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the bytes under `folder` and returns a durable public URL.
    async fn put(&self, folder: &str, bytes: &[u8], content_type: &str)
    -> Result<String, StorageError>;
}

/// `<folder>/<uuid>.<ext>`, extension taken from the content type.
pub fn object_key(folder: &str, content_type: &str) -> String {
    let ext = match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    };
    format!("{}/{}.{}", folder.trim_matches('/'), Uuid::new_v4(), ext)
}
