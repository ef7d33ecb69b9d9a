use crate::assessment::{AssessmentOutcome, AssessmentRequest};
use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::{Ledger, PunchSubmission};
use crate::model::attendance::{PunchStatus, VerifyAction, VerifyType};
use crate::utils::multipart_form::read_form;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

const IMAGE_FIELDS: [&str; 2] = ["upper_body", "full_body"];

/// Multipart body of a punch (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct PunchForm {
    /// upper-body photo
    #[schema(value_type = String, format = Binary)]
    pub upper_body: Vec<u8>,
    /// full-body photo
    #[schema(value_type = String, format = Binary)]
    pub full_body: Vec<u8>,
    #[schema(example = "Alice")]
    pub employee_name: String,
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "HQ-Lobby")]
    pub location: String,
    /// `self` (default) or `admin`
    #[schema(example = "self")]
    pub verify_type: Option<String>,
}

/// Multipart body of a standalone attire analysis (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AnalyzeForm {
    #[schema(value_type = String, format = Binary)]
    pub upper_body: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub full_body: Vec<u8>,
    pub candidate_name: Option<String>,
    pub candidate_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// `approve` or `reject`
    #[schema(example = "approve")]
    #[serde(default)]
    pub action: String,
    #[schema(example = "Mgr1")]
    #[serde(default)]
    pub admin_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub status: PunchStatus,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Calendar date `YYYY-MM-DD`; today when omitted
    #[schema(example = "2026-01-05")]
    pub date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttireSummary {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = "Well groomed and formally dressed.")]
    pub overall: String,
    pub details: Vec<String>,
    #[schema(example = "proper_interview_attire")]
    pub attire_recommendation: Option<String>,
    #[schema(value_type = Object)]
    pub raw: Value,
}

impl From<&AssessmentOutcome> for AttireSummary {
    fn from(outcome: &AssessmentOutcome) -> Self {
        let opinion = outcome.opinion();
        Self {
            status: outcome.status().to_string(),
            overall: opinion
                .and_then(|o| o.overall_summary())
                .unwrap_or("Visual attire analysis completed.")
                .to_string(),
            details: opinion.map(|o| o.detail_lines()).unwrap_or_default(),
            attire_recommendation: opinion.and_then(|o| {
                o.recommendation()
                    .map(|r| r.as_ref().to_string())
                    .or_else(|| o.attire_recommendation().map(str::to_string))
            }),
            raw: outcome.to_payload(),
        }
    }
}

/* =========================
Punch
========================= */
/// Record today's punch with two photos
#[utoipa::path(
    post,
    path = "/attendance/punch",
    request_body(content = PunchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Punch recorded", body = AttendancePunch),
        (
            status = 400,
            description = "Validation failed or already punched today",
            body = Object,
            example = json!({
                "error": "duplicate_punch",
                "message": "employee E1 already punched on 2026-01-05"
            })
        ),
        (status = 500, description = "Photo upload or database failure")
    ),
    tag = "Attendance"
)]
pub async fn punch(
    ledger: web::Data<Ledger>,
    config: web::Data<Config>,
    payload: Multipart,
) -> actix_web::Result<impl Responder> {
    let mut form = read_form(payload, &IMAGE_FIELDS, config.max_image_bytes).await?;

    let verify_type = match form.text("verify_type") {
        None => VerifyType::default(),
        Some(raw) => VerifyType::from_str(&raw.to_ascii_lowercase())
            .map_err(|_| LedgerError::validation(["verify_type"]))?,
    };

    let submission = PunchSubmission {
        employee_id: form.text("employee_id").unwrap_or_default().to_string(),
        employee_name: form.text("employee_name").unwrap_or_default().to_string(),
        location_text: form.text("location").unwrap_or_default().to_string(),
        upper_body: form.take_file("upper_body"),
        full_body: form.take_file("full_body"),
        verify_type,
    };

    let punch = ledger.record_punch(submission).await?;
    Ok(HttpResponse::Ok().json(punch))
}

/// Fetch one punch record
#[utoipa::path(
    get,
    path = "/attendance/punch/{punch_id}",
    params(
        ("punch_id" = u64, Path, description = "ID of the punch")
    ),
    responses(
        (status = 200, description = "Punch found", body = AttendancePunch),
        (status = 404, description = "Punch not found")
    ),
    tag = "Attendance"
)]
pub async fn get_punch(
    ledger: web::Data<Ledger>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let punch = ledger.find_punch(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(punch))
}

/// Punches of one calendar day
#[utoipa::path(
    get,
    path = "/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Punches on the date", body = [DailyPunch]),
        (status = 400, description = "Malformed date")
    ),
    tag = "Attendance"
)]
pub async fn daily(
    ledger: web::Data<Ledger>,
    query: web::Query<DailyQuery>,
) -> actix_web::Result<impl Responder> {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => Local::now().date_naive(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| LedgerError::validation(["date"]))?,
    };

    let punches = ledger.list_by_date(date).await?;
    Ok(HttpResponse::Ok().json(punches))
}

/* =========================
Admin review
========================= */
/// Punches awaiting an admin decision, newest first
#[utoipa::path(
    get,
    path = "/attendance/admin/pending",
    responses(
        (status = 200, description = "Pending punches", body = [AttendancePunch])
    ),
    tag = "Admin"
)]
pub async fn admin_pending(ledger: web::Data<Ledger>) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(ledger.list_pending().await?))
}

/// Self- and admin-verified punches, newest first
#[utoipa::path(
    get,
    path = "/attendance/admin/verified",
    responses(
        (status = 200, description = "Verified punches", body = [AttendancePunch])
    ),
    tag = "Admin"
)]
pub async fn admin_verified(ledger: web::Data<Ledger>) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(ledger.list_verified().await?))
}

/// Approve or reject a pending punch
#[utoipa::path(
    post,
    path = "/attendance/admin/verify/{punch_id}",
    params(
        ("punch_id" = u64, Path, description = "ID of the punch to decide")
    ),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Decision stored", body = VerifyResponse, example = json!({
            "status": "ADMIN_VERIFIED"
        })),
        (
            status = 400,
            description = "Already verified or invalid action",
            body = Object,
            example = json!({
                "error": "already_verified",
                "message": "punch 42 is already ADMIN_VERIFIED"
            })
        ),
        (status = 404, description = "Punch not found")
    ),
    tag = "Admin"
)]
pub async fn admin_verify(
    ledger: web::Data<Ledger>,
    path: web::Path<u64>,
    body: web::Either<web::Json<VerifyRequest>, web::Form<VerifyRequest>>,
) -> actix_web::Result<impl Responder> {
    let punch_id = path.into_inner();
    let body = match body {
        web::Either::Left(json) => json.into_inner(),
        web::Either::Right(form) => form.into_inner(),
    };

    let action = VerifyAction::from_str(&body.action.trim().to_ascii_lowercase())
        .map_err(|_| LedgerError::validation(["action"]))?;

    let status = ledger
        .decide_verification(punch_id, action, &body.admin_name)
        .await?;
    Ok(HttpResponse::Ok().json(VerifyResponse { status }))
}

/* =========================
Standalone attire check
========================= */
/// Run the attire assessment without recording a punch
#[utoipa::path(
    post,
    path = "/attendance/analyze-attire",
    request_body(content = AnalyzeForm, content_type = "multipart/form-data"),
    responses(
        (
            status = 200,
            description = "Assessment result (success or typed failure)",
            body = AttireSummary
        ),
        (status = 400, description = "An image is missing")
    ),
    tag = "Attendance"
)]
pub async fn analyze_attire(
    ledger: web::Data<Ledger>,
    config: web::Data<Config>,
    payload: Multipart,
) -> actix_web::Result<impl Responder> {
    let mut form = read_form(payload, &IMAGE_FIELDS, config.max_image_bytes).await?;

    let (upper, full) = (form.take_file("upper_body"), form.take_file("full_body"));
    let (Some(upper), Some(full)) = (upper, full) else {
        return Err(LedgerError::validation(IMAGE_FIELDS).into());
    };

    let outcome = ledger
        .assess(AssessmentRequest {
            frames: vec![upper, full],
            candidate_name: form.text("candidate_name").map(str::to_string),
            candidate_id: form.text("candidate_id").map(str::to_string),
        })
        .await;

    Ok(HttpResponse::Ok().json(AttireSummary::from(&outcome)))
}
