use crate::model::attendance::PunchStatus;
use crate::repo::StoreError;
use crate::storage::StorageError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;
use serde_json::json;

#[derive(Debug, Display)]
pub enum LedgerError {
    #[display(fmt = "missing or invalid fields: {}", "fields.join(\", \")")]
    Validation { fields: Vec<String> },
    #[display(fmt = "employee {} already punched on {}", employee_id, date)]
    DuplicatePunch { employee_id: String, date: NaiveDate },
    #[display(fmt = "punch {} not found", _0)]
    NotFound(u64),
    #[display(fmt = "punch {} is already {}", punch_id, status)]
    AlreadyVerified { punch_id: u64, status: PunchStatus },
    #[display(fmt = "{}", _0)]
    Storage(StorageError),
    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LedgerError::Validation {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Machine-readable reason used in error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "validation_error",
            LedgerError::DuplicatePunch { .. } => "duplicate_punch",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyVerified { .. } => "already_verified",
            LedgerError::Storage(_) => "storage_error",
            LedgerError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        LedgerError::Internal(e.to_string())
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation { .. }
            | LedgerError::DuplicatePunch { .. }
            | LedgerError::AlreadyVerified { .. } => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Storage(_) | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // details stay in the logs
            LedgerError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "error": self.reason(),
            "message": message,
        });
        if let LedgerError::Validation { fields } = self {
            body["fields"] = json!(fields);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
