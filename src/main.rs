use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod assessment;
mod config;
mod db;
mod docs;
mod error;
mod ledger;
mod model;
mod repo;
mod routes;
mod storage;
mod utils;

use crate::assessment::{AttireAssessor, UnconfiguredAssessor, VisionAssessor, VisionSettings};
use crate::docs::ApiDoc;
use crate::ledger::Ledger;
use crate::repo::MySqlPunchRepository;
use crate::routes::RateLimits;
use crate::storage::{HttpPutStorage, LocalDiskStorage, ObjectStorage};
use config::{Config, StorageBackend};
use db::init_db;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service is running"
}

fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    Ok(match config.storage_backend {
        StorageBackend::Local => Arc::new(LocalDiskStorage::new(
            &config.storage_local_root,
            &config.storage_public_base_url,
        )),
        StorageBackend::Http => {
            let endpoint = config
                .storage_http_endpoint
                .as_deref()
                .context("STORAGE_HTTP_ENDPOINT must be set")?;
            Arc::new(
                HttpPutStorage::new(endpoint, config.storage_http_token.clone())
                    .map_err(|e| anyhow::anyhow!("{e}"))?,
            )
        }
    })
}

fn build_assessor(config: &Config) -> anyhow::Result<Arc<dyn AttireAssessor>> {
    let Some(api_key) = config.openai_api_key.clone() else {
        warn!("OPENAI_API_KEY not set; self-verified punches get a transport_error assessment");
        return Ok(Arc::new(UnconfiguredAssessor));
    };

    let assessor = VisionAssessor::new(VisionSettings {
        base_url: config.openai_base_url.clone(),
        api_key,
        model: config.vision_model.clone(),
        timeout: Duration::from_secs(config.assessment_timeout_secs),
    })
    .context("failed to build vision client")?;
    Ok(Arc::new(assessor))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let ledger = Data::new(Ledger::new(
        Arc::new(MySqlPunchRepository::new(pool)),
        build_storage(&config)?,
        build_assessor(&config)?,
        // the gateway's own HTTP timeout fires first; this is the outer bound
        Duration::from_secs(config.assessment_timeout_secs + 5),
    ));
    let limits = RateLimits::from_config(&config)?;

    let warmup_ledger = ledger.clone();
    let warmup_days = config.directory_warmup_days;
    actix_web::rt::spawn(async move {
        // Warm up employees seen in the last N days in batches of 250
        if let Err(e) = warmup_ledger.directory().warmup(warmup_days, 250).await {
            error!(error = %e, "Failed to warmup employee directory");
        }
    });

    let server_addr = config.server_addr.clone();
    let config = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(ledger.clone())
            .app_data(config.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &limits))
    })
    .bind(&server_addr)?
    .run()
    .await?;

    Ok(())
}
