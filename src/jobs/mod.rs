//! Scheduled Jobs
//!
//! Background maintenance for the async projection outbox. These jobs run
//! on a schedule independent of `ProjectionWorker`'s own poll loop — they
//! keep `projection_tasks` bounded and recover tasks a crashed worker left
//! stuck in `processing`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;

// =========================================================================
// Stale Task Recovery Job
// =========================================================================

/// Reset tasks stuck in 'processing' status because a worker crashed or
/// was killed mid-task. Tasks stuck for more than 5 minutes are put back
/// to 'pending' so another worker picks them up.
pub async fn reset_stale_processing_tasks(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        UPDATE projection_tasks
        SET status = 'pending', available_at = NOW()
        WHERE status = 'processing'
          AND claimed_at < NOW() - INTERVAL '5 minutes'
        "#,
    )
    .execute(pool)
    .await?;

    let rows_affected = result.rows_affected();

    if rows_affected > 0 {
        tracing::warn!(
            rows_affected = rows_affected,
            "Reset stale processing projection tasks"
        );
    }

    Ok(rows_affected)
}

// =========================================================================
// Completed Task Cleanup Job
// =========================================================================

/// Delete completed tasks older than 7 days. Dead-lettered tasks are kept
/// longer (30 days) since they're the operator's only record of a
/// projection that needs manual attention.
pub async fn cleanup_completed_tasks(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        DELETE FROM projection_tasks
        WHERE status = 'completed'
          AND completed_at < NOW() - INTERVAL '7 days'
        "#,
    )
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Cleaned up completed projection tasks");
    }

    Ok(rows_deleted)
}

/// Delete dead-lettered tasks older than 30 days.
pub async fn cleanup_dead_letter_tasks(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        DELETE FROM projection_tasks
        WHERE status = 'dead_letter'
          AND completed_at < NOW() - INTERVAL '30 days'
        "#,
    )
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Cleaned up dead-lettered projection tasks");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for stale task recovery (default: 1 minute)
    pub stale_task_recovery_interval: Duration,
    /// Interval for task table cleanup (default: 1 hour)
    pub task_cleanup_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            stale_task_recovery_interval: Duration::from_secs(60),
            task_cleanup_interval: Duration::from_secs(3600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut stale_task_interval = interval(self.config.stale_task_recovery_interval);
        let mut cleanup_interval = interval(self.config.task_cleanup_interval);

        loop {
            tokio::select! {
                _ = stale_task_interval.tick() => {
                    if let Err(e) = reset_stale_processing_tasks(&self.pool).await {
                        tracing::error!(error = %e, "Stale task recovery failed");
                    }
                }
                _ = cleanup_interval.tick() => {
                    if let Err(e) = cleanup_completed_tasks(&self.pool).await {
                        tracing::error!(error = %e, "Completed task cleanup failed");
                    }
                    if let Err(e) = cleanup_dead_letter_tasks(&self.pool).await {
                        tracing::error!(error = %e, "Dead-letter task cleanup failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match reset_stale_processing_tasks(&self.pool).await {
            Ok(count) => report.stale_tasks_reset = count,
            Err(e) => report.errors.push(format!("Stale task recovery: {}", e)),
        }

        match cleanup_completed_tasks(&self.pool).await {
            Ok(count) => report.completed_tasks_deleted = count,
            Err(e) => report.errors.push(format!("Completed task cleanup: {}", e)),
        }

        match cleanup_dead_letter_tasks(&self.pool).await {
            Ok(count) => report.dead_letter_tasks_deleted = count,
            Err(e) => report.errors.push(format!("Dead-letter task cleanup: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub stale_tasks_reset: u64,
    pub completed_tasks_deleted: u64,
    pub dead_letter_tasks_deleted: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.stale_task_recovery_interval, Duration::from_secs(60));
        assert_eq!(config.task_cleanup_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.stale_tasks_reset, 0);
        assert_eq!(report.errors.len(), 0);
    }
}
