use super::{ObjectStorage, StorageError, object_key};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error};

/// Writes objects below a root directory served elsewhere at `public_base_url`.
pub struct LocalDiskStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn put(
        &self,
        folder: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = object_key(folder, content_type);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!(error = %e, path = %parent.display(), "Failed to create upload folder");
                StorageError(format!("create folder failed: {e}"))
            })?;
        }

        fs::write(&path, bytes).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "Failed to write upload");
            StorageError(format!("write failed: {e}"))
        })?;

        debug!(key = %key, bytes = bytes.len(), "stored object on disk");
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}
