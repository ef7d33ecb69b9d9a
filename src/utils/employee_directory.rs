use crate::model::employee::Employee;
use crate::repo::{PunchRepository, StoreError};
use anyhow::Result;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Employee lookups by external id, fronted by an in-memory cache.
pub struct EmployeeDirectory {
    repo: Arc<dyn PunchRepository>,
    cache: Cache<String, Employee>,
}

impl EmployeeDirectory {
    pub fn new(repo: Arc<dyn PunchRepository>) -> Self {
        Self {
            repo,
            cache: Cache::builder()
                .max_capacity(100_000) // tune based on memory
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    /// Get or create. The stored name of an existing employee is kept.
    pub async fn resolve(&self, employee_id: &str, name: &str) -> Result<Employee, StoreError> {
        if let Some(hit) = self.cache.get(employee_id).await {
            return Ok(hit);
        }

        let employee = self.repo.get_or_create_employee(employee_id, name).await?;
        self.cache
            .insert(employee.employee_id.clone(), employee.clone())
            .await;
        Ok(employee)
    }

    pub async fn cached(&self, employee_id: &str) -> Option<Employee> {
        self.cache.get(employee_id).await
    }

    /// Batch insert into cache
    async fn batch_cache(&self, employees: &[Employee]) {
        let futures: Vec<_> = employees
            .iter()
            .map(|e| self.cache.insert(e.employee_id.clone(), e.clone()))
            .collect();

        // Await all insertions concurrently
        futures::future::join_all(futures).await;
    }

    /// Load employees who punched in the last `days` days into the cache.
    pub async fn warmup(&self, days: u32, batch_size: usize) -> Result<()> {
        let employees = self.repo.recent_employees(days).await?;

        for batch in employees.chunks(batch_size.max(1)) {
            self.batch_cache(batch).await;
        }

        log::info!(
            "Employee directory warmup complete: {} employees (last {} days)",
            employees.len(),
            days
        );

        Ok(())
    }
}
