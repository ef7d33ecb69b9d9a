use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;

/// Marker stored in `verified_by` when the employee attested the punch.
pub const SELF_VERIFIER: &str = "SELF";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PunchStatus {
    SelfVerified,
    PendingAdmin,
    AdminVerified,
    Rejected,
}

impl PunchStatus {
    /// Statuses reported by the verified listing.
    pub const VERIFIED: [PunchStatus; 2] = [PunchStatus::SelfVerified, PunchStatus::AdminVerified];
}

/// How the punch is verified; chosen by the client at punch time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerifyType {
    #[default]
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    SelfCheck,
    Admin,
}

impl VerifyType {
    pub fn initial_status(self) -> PunchStatus {
        match self {
            VerifyType::SelfCheck => PunchStatus::SelfVerified,
            VerifyType::Admin => PunchStatus::PendingAdmin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerifyAction {
    Approve,
    Reject,
}

impl VerifyAction {
    pub fn target_status(self) -> PunchStatus {
        match self {
            VerifyAction::Approve => PunchStatus::AdminVerified,
            VerifyAction::Reject => PunchStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "employee_id": "E1",
    "employee_name": "Alice",
    "date": "2026-01-05",
    "punch_time": "2026-01-05T08:58:12Z",
    "upper_body_image_url": "https://bucket.example/attendance/upper/1c6c.jpg",
    "full_body_image_url": "https://bucket.example/attendance/full/9a0e.jpg",
    "location_text": "HQ-Lobby",
    "assessment": {"status": "success", "overall_summary": "Neat formal attire."},
    "status": "SELF_VERIFIED",
    "verified_by": "SELF",
    "verified_at": "2026-01-05T08:58:14Z"
}))]
pub struct AttendancePunch {
    #[schema(example = 42)]
    pub id: u64,
    /// external employee identifier
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "Alice")]
    pub employee_name: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-05T08:58:12Z", format = "date-time", value_type = String)]
    pub punch_time: DateTime<Utc>,
    pub upper_body_image_url: String,
    pub full_body_image_url: String,
    pub location_text: String,
    /// opaque payload from the attire assessment, success or failure shaped
    #[schema(value_type = Option<Object>)]
    pub assessment: Option<Value>,
    pub status: PunchStatus,
    pub verified_by: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Row for the daily listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyPunch {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "Alice")]
    pub employee_name: String,
    #[schema(example = "2026-01-05T08:58:12Z", format = "date-time", value_type = String)]
    pub punch_time: DateTime<Utc>,
    pub status: PunchStatus,
}

impl From<&AttendancePunch> for DailyPunch {
    fn from(p: &AttendancePunch) -> Self {
        Self {
            employee_id: p.employee_id.clone(),
            employee_name: p.employee_name.clone(),
            punch_time: p.punch_time,
            status: p.status,
        }
    }
}

/// Everything written when a punch row is created.
#[derive(Debug, Clone)]
pub struct NewPunch {
    pub employee_pk: u64,
    pub date: NaiveDate,
    pub punch_time: DateTime<Utc>,
    pub upper_body_image_url: String,
    pub full_body_image_url: String,
    pub location_text: String,
    pub status: PunchStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}
