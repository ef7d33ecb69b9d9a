use super::{ObjectStorage, StorageError, object_key};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// PUTs objects to an S3-compatible endpoint (or presigned base URL).
/// One attempt per object.
pub struct HttpPutStorage {
    endpoint: String,
    auth_bearer: Option<String>,
    client: reqwest::Client,
}

impl HttpPutStorage {
    pub fn new(endpoint: &str, auth_bearer: Option<String>) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| StorageError(format!("http client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_bearer,
            client,
        })
    }
}

#[async_trait]
impl ObjectStorage for HttpPutStorage {
    #[instrument(name = "storage_http_put", skip(self, bytes), fields(bytes = bytes.len()))]
    async fn put(
        &self,
        folder: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = format!("{}/{}", self.endpoint, object_key(folder, content_type));

        let mut req = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.auth_bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Upload request failed");
            StorageError(format!("upload failed: {e}"))
        })?;

        if !resp.status().is_success() {
            error!(status = %resp.status(), url = %url, "Upload rejected");
            return Err(StorageError(format!("upload failed status={}", resp.status())));
        }

        debug!(url = %url, "stored object");
        Ok(url)
    }
}
