use crate::{api::attendance, config::Config};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use anyhow::{Context, Result};

type Limit = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter state. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimits {
    punch: Limit,
    admin: Limit,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            punch: build_limit(config.rate_punch_per_min).context("punch rate limit")?,
            admin: build_limit(config.rate_admin_per_min).context("admin rate limit")?,
        })
    }
}

fn build_limit(requests_per_min: u32) -> Result<Limit> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("invalid rate limit")
}

pub fn configure(cfg: &mut web::ServiceConfig, limits: &RateLimits) {
    cfg.service(
        web::scope("/attendance")
            // /attendance/punch
            .service(
                web::resource("/punch")
                    .wrap(Governor::new(&limits.punch))
                    .route(web::post().to(attendance::punch)),
            )
            // /attendance/punch/{punch_id}
            .service(
                web::resource("/punch/{punch_id}")
                    .wrap(Governor::new(&limits.admin))
                    .route(web::get().to(attendance::get_punch)),
            )
            // /attendance/analyze-attire
            .service(
                web::resource("/analyze-attire")
                    .wrap(Governor::new(&limits.punch))
                    .route(web::post().to(attendance::analyze_attire)),
            )
            // /attendance/daily
            .service(
                web::resource("/daily")
                    .wrap(Governor::new(&limits.admin))
                    .route(web::get().to(attendance::daily)),
            )
            .service(
                web::scope("/admin")
                    .wrap(Governor::new(&limits.admin))
                    // /attendance/admin/pending
                    .service(
                        web::resource("/pending").route(web::get().to(attendance::admin_pending)),
                    )
                    // /attendance/admin/verified
                    .service(
                        web::resource("/verified").route(web::get().to(attendance::admin_verified)),
                    )
                    // /attendance/admin/verify/{punch_id}
                    .service(
                        web::resource("/verify/{punch_id}")
                            .route(web::post().to(attendance::admin_verify)),
                    ),
            ),
    );
}
