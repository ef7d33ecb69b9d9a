use super::{Decision, PunchRepository, StoreError};
use crate::model::{
    attendance::{AttendancePunch, NewPunch, PunchStatus},
    employee::Employee,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, MySqlPool, types::Json};
use std::str::FromStr;
use tracing::{debug, error};

const PUNCH_SELECT: &str = r#"
    SELECT
        p.id,
        e.employee_id,
        e.name AS employee_name,
        p.punch_date,
        p.punch_time,
        p.upper_body_image_url,
        p.full_body_image_url,
        p.location_text,
        p.assessment,
        p.status,
        p.verified_by,
        p.verified_at
    FROM attendance_punches p
    JOIN employees e ON e.id = p.employee_pk
"#;

#[derive(FromRow)]
struct PunchRow {
    id: u64, // 👈 matches BIGINT UNSIGNED
    employee_id: String,
    employee_name: String,
    punch_date: NaiveDate,
    punch_time: NaiveDateTime,
    upper_body_image_url: String,
    full_body_image_url: String,
    location_text: String,
    assessment: Option<Json<Value>>,
    status: String,
    verified_by: Option<String>,
    verified_at: Option<NaiveDateTime>,
}

impl TryFrom<PunchRow> for AttendancePunch {
    type Error = StoreError;

    fn try_from(row: PunchRow) -> Result<Self, Self::Error> {
        let status = PunchStatus::from_str(&row.status)
            .map_err(|_| StoreError::Backend(format!("unknown punch status {}", row.status)))?;

        Ok(AttendancePunch {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            date: row.punch_date,
            punch_time: row.punch_time.and_utc(),
            upper_body_image_url: row.upper_body_image_url,
            full_body_image_url: row.full_body_image_url,
            location_text: row.location_text,
            assessment: row.assessment.map(|Json(v)| v),
            status,
            verified_by: row.verified_by,
            verified_at: row.verified_at.map(|t| t.and_utc()),
        })
    }
}

fn into_punches(rows: Vec<PunchRow>) -> Result<Vec<AttendancePunch>, StoreError> {
    rows.into_iter().map(AttendancePunch::try_from).collect()
}

pub struct MySqlPunchRepository {
    pool: MySqlPool,
}

impl MySqlPunchRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PunchRepository for MySqlPunchRepository {
    async fn get_or_create_employee(
        &self,
        employee_id: &str,
        name: &str,
    ) -> Result<Employee, StoreError> {
        // no-op update on conflict keeps the first stored name
        sqlx::query(
            r#"
            INSERT INTO employees (employee_id, name)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE id = id
            "#,
        )
        .bind(employee_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to upsert employee");
            StoreError::from(e)
        })?;

        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, employee_id, name FROM employees WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(employee)
    }

    async fn recent_employees(&self, days: u32) -> Result<Vec<Employee>, StoreError> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT e.id, e.employee_id, e.name
            FROM employees e
            JOIN attendance_punches p ON p.employee_pk = e.id
            WHERE p.punch_date >= CURDATE() - INTERVAL ? DAY
            GROUP BY e.id, e.employee_id, e.name
            ORDER BY MAX(p.punch_time) DESC
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    async fn insert_punch(&self, punch: NewPunch) -> Result<AttendancePunch, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_punches
                (employee_pk, punch_date, punch_time, upper_body_image_url,
                 full_body_image_url, location_text, status, verified_by, verified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(punch.employee_pk)
        .bind(punch.date)
        .bind(punch.punch_time.naive_utc())
        .bind(&punch.upper_body_image_url)
        .bind(&punch.full_body_image_url)
        .bind(&punch.location_text)
        .bind(<&str>::from(punch.status))
        .bind(&punch.verified_by)
        .bind(punch.verified_at.map(|t| t.naive_utc()))
        .execute(&mut *tx)
        .await;

        let punch_id = match result {
            Ok(done) => done.last_insert_id(),
            Err(e) => {
                // Duplicate (employee, date)
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        debug!(
                            employee_pk = punch.employee_pk,
                            date = %punch.date,
                            "duplicate punch"
                        );
                        return Err(StoreError::DuplicatePunch);
                    }
                }
                error!(error = %e, employee_pk = punch.employee_pk, "Punch insert failed");
                return Err(e.into());
            }
        };

        let row = sqlx::query_as::<_, PunchRow>(&format!("{PUNCH_SELECT} WHERE p.id = ?"))
            .bind(punch_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn complete_self_verification(
        &self,
        punch_id: u64,
        assessment: Value,
        verified_by: &str,
        verified_at: DateTime<Utc>,
    ) -> Result<AttendancePunch, StoreError> {
        sqlx::query(
            r#"
            UPDATE attendance_punches
            SET assessment = ?, verified_by = ?, verified_at = ?
            WHERE id = ?
            AND status = 'SELF_VERIFIED'
            "#,
        )
        .bind(Json(assessment))
        .bind(verified_by)
        .bind(verified_at.naive_utc())
        .bind(punch_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, punch_id, "Failed to store assessment");
            StoreError::from(e)
        })?;

        self.find_punch(punch_id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("punch {punch_id} vanished")))
    }

    async fn decide(
        &self,
        punch_id: u64,
        status: PunchStatus,
        admin_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_punches
            SET status = ?, verified_by = ?, verified_at = ?
            WHERE id = ?
            AND status = 'PENDING_ADMIN'
            "#,
        )
        .bind(<&str>::from(status))
        .bind(admin_name)
        .bind(at.naive_utc())
        .bind(punch_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, punch_id, "Verification update failed");
            StoreError::from(e)
        })?;

        if result.rows_affected() == 1 {
            return Ok(Decision::Applied);
        }

        let current =
            sqlx::query_scalar::<_, String>("SELECT status FROM attendance_punches WHERE id = ?")
                .bind(punch_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Ok(Decision::NotFound),
            Some(raw) => PunchStatus::from_str(&raw)
                .map(Decision::AlreadyDecided)
                .map_err(|_| StoreError::Backend(format!("unknown punch status {raw}"))),
        }
    }

    async fn find_punch(&self, punch_id: u64) -> Result<Option<AttendancePunch>, StoreError> {
        let row = sqlx::query_as::<_, PunchRow>(&format!("{PUNCH_SELECT} WHERE p.id = ?"))
            .bind(punch_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendancePunch::try_from).transpose()
    }

    async fn list_by_status(
        &self,
        statuses: &[PunchStatus],
    ) -> Result<Vec<AttendancePunch>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "{PUNCH_SELECT} WHERE p.status IN ({placeholders}) \
             ORDER BY p.punch_time DESC, p.id DESC"
        );
        debug!(sql = %sql, ?statuses, "Listing punches by status");

        let mut query = sqlx::query_as::<_, PunchRow>(&sql);
        for status in statuses {
            query = query.bind(<&str>::from(status));
        }

        into_punches(query.fetch_all(&self.pool).await?)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendancePunch>, StoreError> {
        let rows = sqlx::query_as::<_, PunchRow>(&format!(
            "{PUNCH_SELECT} WHERE p.punch_date = ? ORDER BY p.punch_time DESC, p.id DESC"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        into_punches(rows)
    }
}
