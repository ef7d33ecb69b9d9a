use crate::api::attendance::{
    AnalyzeForm, AttireSummary, DailyQuery, PunchForm, VerifyRequest, VerifyResponse,
};
use crate::model::attendance::{AttendancePunch, DailyPunch, PunchStatus, VerifyAction, VerifyType};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Punch API",
        version = "1.0.0",
        description = r#"
## Photo-verified attendance

Employees record **one punch per calendar day** with an upper-body and a full-body photo.

### 🔹 Verification
- **self**: an automated attire assessment is attached and the punch is verified immediately
- **admin**: the punch waits in the review queue until an admin approves or rejects it

### 📦 Response Format
- JSON bodies; errors are `{ "error", "message", "fields"? }`
- `400` for validation, duplicate punches and already-decided punches; `404` for unknown punches

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::punch,
        crate::api::attendance::get_punch,
        crate::api::attendance::daily,
        crate::api::attendance::analyze_attire,

        crate::api::attendance::admin_pending,
        crate::api::attendance::admin_verified,
        crate::api::attendance::admin_verify
    ),
    components(
        schemas(
            AttendancePunch,
            DailyPunch,
            PunchStatus,
            VerifyType,
            VerifyAction,
            PunchForm,
            AnalyzeForm,
            VerifyRequest,
            VerifyResponse,
            DailyQuery,
            AttireSummary
        )
    ),
    tags(
        (name = "Attendance", description = "Punch recording and attire checks"),
        (name = "Admin", description = "Review queue and verification decisions"),
    )
)]
pub struct ApiDoc;
