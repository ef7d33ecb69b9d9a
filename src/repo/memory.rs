//! In-process repository for unit tests. A single mutex makes every
//! operation atomic, matching the guarantees of the SQL constraints.

use super::{Decision, PunchRepository, StoreError};
use crate::model::{
    attendance::{AttendancePunch, NewPunch, PunchStatus},
    employee::Employee,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    employees: Vec<Employee>,
    punches: Vec<(u64, AttendancePunch)>, // (employee_pk, punch)
}

#[derive(Default)]
pub struct InMemoryPunchRepository {
    state: Mutex<State>,
}

impl InMemoryPunchRepository {
    pub fn employee_count(&self) -> usize {
        self.state.lock().unwrap().employees.len()
    }

    pub fn punch_count(&self) -> usize {
        self.state.lock().unwrap().punches.len()
    }
}

fn newest_first(mut punches: Vec<AttendancePunch>) -> Vec<AttendancePunch> {
    punches.sort_by(|a, b| b.punch_time.cmp(&a.punch_time).then(b.id.cmp(&a.id)));
    punches
}

#[async_trait]
impl PunchRepository for InMemoryPunchRepository {
    async fn get_or_create_employee(
        &self,
        employee_id: &str,
        name: &str,
    ) -> Result<Employee, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.employees.iter().find(|e| e.employee_id == employee_id) {
            return Ok(existing.clone());
        }
        let employee = Employee {
            id: state.employees.len() as u64 + 1,
            employee_id: employee_id.to_string(),
            name: name.to_string(),
        };
        state.employees.push(employee.clone());
        Ok(employee)
    }

    async fn recent_employees(&self, days: u32) -> Result<Vec<Employee>, StoreError> {
        let state = self.state.lock().unwrap();
        let cutoff = Utc::now().date_naive() - Duration::days(days as i64);
        let mut seen: Vec<(DateTime<Utc>, u64)> = Vec::new();
        for (pk, punch) in &state.punches {
            if punch.date < cutoff {
                continue;
            }
            match seen.iter_mut().find(|(_, id)| id == pk) {
                Some(entry) if entry.0 < punch.punch_time => entry.0 = punch.punch_time,
                Some(_) => {}
                None => seen.push((punch.punch_time, *pk)),
            }
        }
        seen.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(seen
            .into_iter()
            .filter_map(|(_, pk)| state.employees.iter().find(|e| e.id == pk).cloned())
            .collect())
    }

    async fn insert_punch(&self, punch: NewPunch) -> Result<AttendancePunch, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state
            .punches
            .iter()
            .any(|(pk, p)| *pk == punch.employee_pk && p.date == punch.date)
        {
            return Err(StoreError::DuplicatePunch);
        }
        let employee = state
            .employees
            .iter()
            .find(|e| e.id == punch.employee_pk)
            .cloned()
            .ok_or_else(|| StoreError::Backend("foreign key violation".to_string()))?;

        let record = AttendancePunch {
            id: state.punches.len() as u64 + 1,
            employee_id: employee.employee_id,
            employee_name: employee.name,
            date: punch.date,
            punch_time: punch.punch_time,
            upper_body_image_url: punch.upper_body_image_url,
            full_body_image_url: punch.full_body_image_url,
            location_text: punch.location_text,
            assessment: None,
            status: punch.status,
            verified_by: punch.verified_by,
            verified_at: punch.verified_at,
        };
        state.punches.push((punch.employee_pk, record.clone()));
        Ok(record)
    }

    async fn complete_self_verification(
        &self,
        punch_id: u64,
        assessment: Value,
        verified_by: &str,
        verified_at: DateTime<Utc>,
    ) -> Result<AttendancePunch, StoreError> {
        let mut state = self.state.lock().unwrap();
        let (_, punch) = state
            .punches
            .iter_mut()
            .find(|(_, p)| p.id == punch_id)
            .ok_or_else(|| StoreError::Backend(format!("punch {punch_id} vanished")))?;
        if punch.status == PunchStatus::SelfVerified {
            punch.assessment = Some(assessment);
            punch.verified_by = Some(verified_by.to_string());
            punch.verified_at = Some(verified_at);
        }
        Ok(punch.clone())
    }

    async fn decide(
        &self,
        punch_id: u64,
        status: PunchStatus,
        admin_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some((_, punch)) = state.punches.iter_mut().find(|(_, p)| p.id == punch_id) else {
            return Ok(Decision::NotFound);
        };
        if punch.status != PunchStatus::PendingAdmin {
            return Ok(Decision::AlreadyDecided(punch.status));
        }
        punch.status = status;
        punch.verified_by = Some(admin_name.to_string());
        punch.verified_at = Some(at);
        Ok(Decision::Applied)
    }

    async fn find_punch(&self, punch_id: u64) -> Result<Option<AttendancePunch>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .punches
            .iter()
            .find(|(_, p)| p.id == punch_id)
            .map(|(_, p)| p.clone()))
    }

    async fn list_by_status(
        &self,
        statuses: &[PunchStatus],
    ) -> Result<Vec<AttendancePunch>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(newest_first(
            state
                .punches
                .iter()
                .filter(|(_, p)| statuses.contains(&p.status))
                .map(|(_, p)| p.clone())
                .collect(),
        ))
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendancePunch>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(newest_first(
            state
                .punches
                .iter()
                .filter(|(_, p)| p.date == date)
                .map(|(_, p)| p.clone())
                .collect(),
        ))
    }
}
