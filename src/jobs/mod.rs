//! Scheduled jobs
//!
//! Background task that scans for overdue rentals and dispatches one
//! notification per hit. The scan is read-only with respect to rental and
//! book state; delivery goes through the [`Notifier`] seam so the mail
//! transport stays out of this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::interval;
use uuid::Uuid;

// =========================================================================
// Overdue scan
// =========================================================================

/// One overdue loan, joined with what a reminder needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverdueRental {
    pub rental_id: Uuid,
    pub book_title: String,
    pub reader_email: String,
    pub rental_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Open rentals whose deadline has passed.
pub async fn find_overdue(pool: &PgPool) -> Result<Vec<OverdueRental>, JobError> {
    let overdue: Vec<OverdueRental> = sqlx::query_as(
        r#"
        SELECT r.id AS rental_id,
               b.title AS book_title,
               u.email AS reader_email,
               r.rental_date,
               r.deadline
        FROM rentals r
        JOIN books b ON b.id = r.book_id
        JOIN users u ON u.id = r.reader_id
        WHERE r.deadline <= NOW() AND r.is_returned = false
        ORDER BY r.deadline
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(overdue)
}

// =========================================================================
// Notification dispatch
// =========================================================================

/// Delivery seam for overdue reminders.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, overdue: &OverdueRental) -> Result<(), JobError>;
}

/// Notifier that records reminders in the log. Stands in for the mail
/// transport in development and tests.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, overdue: &OverdueRental) -> Result<(), JobError> {
        tracing::info!(
            rental_id = %overdue.rental_id,
            reader = %overdue.reader_email,
            book = %overdue.book_title,
            deadline = %overdue.deadline,
            "Overdue reminder dispatched"
        );
        Ok(())
    }
}

// =========================================================================
// Scheduler
// =========================================================================

/// Report from one scan pass.
#[derive(Debug, Clone, Default)]
pub struct OverdueScanReport {
    pub overdue_found: usize,
    pub notified: usize,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Runs the overdue scan on a fixed interval.
pub struct OverdueScheduler {
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    scan_interval: Duration,
}

impl OverdueScheduler {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>, scan_interval: Duration) -> Self {
        Self {
            pool,
            notifier,
            scan_interval,
        }
    }

    /// Start the scheduler in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.scan_interval.as_secs(),
            "Overdue scan scheduler started"
        );

        let mut ticker = interval(self.scan_interval);

        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            if !report.errors.is_empty() {
                tracing::error!(errors = ?report.errors, "Overdue scan finished with errors");
            }
        }
    }

    /// Run one scan pass (also used for manual trigger and tests).
    pub async fn run_once(&self) -> OverdueScanReport {
        let mut report = OverdueScanReport::default();

        match find_overdue(&self.pool).await {
            Ok(overdue) => {
                report.overdue_found = overdue.len();
                for rental in &overdue {
                    match self.notifier.notify(rental).await {
                        Ok(()) => report.notified += 1,
                        Err(e) => report
                            .errors
                            .push(format!("notify {}: {}", rental.rental_id, e)),
                    }
                }
            }
            Err(e) => report.errors.push(format!("overdue scan: {}", e)),
        }

        if report.overdue_found > 0 {
            tracing::info!(
                overdue_found = report.overdue_found,
                notified = report.notified,
                "Overdue scan completed"
            );
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification dispatch failed: {0}")]
    Dispatch(String),
}

// =========================================================================
// Tests
// =========================================================================
