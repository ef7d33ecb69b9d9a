use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Http,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_punch_per_min: u32,
    pub rate_admin_per_min: u32,

    pub max_image_bytes: usize,

    // Object storage
    pub storage_backend: StorageBackend,
    pub storage_local_root: String,
    pub storage_public_base_url: String,
    pub storage_http_endpoint: Option<String>,
    pub storage_http_token: Option<String>,

    // Vision model
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub vision_model: String,
    pub assessment_timeout_secs: u64,

    pub directory_warmup_days: u32,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let storage_backend = match optional("STORAGE_BACKEND").as_deref() {
            None | Some("local") => StorageBackend::Local,
            Some("http") => StorageBackend::Http,
            Some(other) => anyhow::bail!("STORAGE_BACKEND must be `local` or `http`, got {other}"),
        };

        let storage_http_endpoint = optional("STORAGE_HTTP_ENDPOINT");
        if storage_backend == StorageBackend::Http && storage_http_endpoint.is_none() {
            anyhow::bail!("STORAGE_HTTP_ENDPOINT must be set when STORAGE_BACKEND=http");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,

            rate_punch_per_min: parsed_or("RATE_PUNCH_PER_MIN", 30)?,
            rate_admin_per_min: parsed_or("RATE_ADMIN_PER_MIN", 600)?,

            max_image_bytes: parsed_or("MAX_IMAGE_BYTES", 10 * 1024 * 1024)?, // 10 MiB

            storage_backend,
            storage_local_root: optional("STORAGE_LOCAL_ROOT")
                .unwrap_or_else(|| "uploads".to_string()),
            storage_public_base_url: optional("STORAGE_PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080/uploads".to_string()),
            storage_http_endpoint,
            storage_http_token: optional("STORAGE_HTTP_TOKEN"),

            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            vision_model: optional("VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            assessment_timeout_secs: parsed_or("ASSESSMENT_TIMEOUT_SECS", 45)?,

            directory_warmup_days: parsed_or("DIRECTORY_WARMUP_DAYS", 30)?,
        })
    }

    /// Settings suitable for unit tests; nothing here touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/test".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            rate_punch_per_min: 1000,
            rate_admin_per_min: 1000,
            max_image_bytes: 1024 * 1024,
            storage_backend: StorageBackend::Local,
            storage_local_root: "uploads".to_string(),
            storage_public_base_url: "http://localhost/uploads".to_string(),
            storage_http_endpoint: None,
            storage_http_token: None,
            openai_api_key: None,
            openai_base_url: "http://localhost/v1".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            assessment_timeout_secs: 5,
            directory_warmup_days: 30,
        }
    }
}
