//! Ledger persistence.

use crate::model::{
    attendance::{AttendancePunch, NewPunch, PunchStatus},
    employee::Employee,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde_json::Value;

#[cfg(test)]
pub mod memory;
mod mysql;

pub use mysql::MySqlPunchRepository;

#[derive(Debug, Display)]
pub enum StoreError {
    /// (employee, date) already has a punch.
    #[display(fmt = "punch already recorded for this employee today")]
    DuplicatePunch,
    #[display(fmt = "database error: {}", _0)]
    Backend(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Result of a guarded verification update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Applied,
    NotFound,
    AlreadyDecided(PunchStatus),
}

#[async_trait]
pub trait PunchRepository: Send + Sync {
    /// First write wins: an existing employee keeps its stored name.
    async fn get_or_create_employee(
        &self,
        employee_id: &str,
        name: &str,
    ) -> Result<Employee, StoreError>;

    /// Employees with a punch in the last `days` days, most recent first.
    async fn recent_employees(&self, days: u32) -> Result<Vec<Employee>, StoreError>;

    /// Inserts atomically; a second punch for the same (employee, date)
    /// yields `StoreError::DuplicatePunch`.
    async fn insert_punch(&self, punch: NewPunch) -> Result<AttendancePunch, StoreError>;

    async fn complete_self_verification(
        &self,
        punch_id: u64,
        assessment: Value,
        verified_by: &str,
        verified_at: DateTime<Utc>,
    ) -> Result<AttendancePunch, StoreError>;

    /// Compare-and-set from `PENDING_ADMIN` to `status`.
    async fn decide(
        &self,
        punch_id: u64,
        status: PunchStatus,
        admin_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Decision, StoreError>;

    async fn find_punch(&self, punch_id: u64) -> Result<Option<AttendancePunch>, StoreError>;

    /// Newest punch first.
    async fn list_by_status(
        &self,
        statuses: &[PunchStatus],
    ) -> Result<Vec<AttendancePunch>, StoreError>;

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendancePunch>, StoreError>;
}
