//! Per-user upload caps, counted from persisted records.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::error::{PipelineError, QuotaError};
use crate::storage::models::UserId;
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    /// Records a user may hold at any time
    pub lifetime: u64,
    /// Records a user may create per calendar month (server local time)
    pub monthly: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            lifetime: 100,
            monthly: 20,
        }
    }
}

/// A user's current consumption next to the limits it is checked against.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaUsage {
    pub total: u64,
    pub this_month: u64,
    pub limits: QuotaLimits,
}

#[derive(Clone)]
pub struct QuotaTracker {
    db: Database,
    limits: QuotaLimits,
}

impl QuotaTracker {
    pub fn new(db: Database, limits: QuotaLimits) -> Self {
        Self { db, limits }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    pub fn total_uploads(&self, user_id: UserId) -> Result<u64, DatabaseError> {
        self.db.count_files_by_author(user_id)
    }

    pub fn uploads_this_month(&self, user_id: UserId) -> Result<u64, DatabaseError> {
        self.uploads_in_month_of(user_id, Local::now())
    }

    /// Records created in the calendar month containing `now`.
    pub fn uploads_in_month_of<Tz: TimeZone>(
        &self,
        user_id: UserId,
        now: DateTime<Tz>,
    ) -> Result<u64, DatabaseError> {
        let (start, end) = month_bounds(&now);
        self.db.count_files_by_author_between(user_id, start, end)
    }

    pub fn usage(&self, user_id: UserId) -> Result<QuotaUsage, DatabaseError> {
        Ok(QuotaUsage {
            total: self.total_uploads(user_id)?,
            this_month: self.uploads_this_month(user_id)?,
            limits: self.limits,
        })
    }

    /// Refuse the upload when either cap has been reached.
    pub fn check(&self, user_id: UserId) -> Result<(), PipelineError> {
        if self.total_uploads(user_id)? >= self.limits.lifetime {
            return Err(QuotaError::LifetimeLimit {
                limit: self.limits.lifetime,
            }
            .into());
        }

        let this_month = self.uploads_this_month(user_id)?;
        tracing::debug!(user_id, this_month, "Monthly conversions counted");
        if this_month >= self.limits.monthly {
            return Err(QuotaError::MonthlyLimit {
                limit: self.limits.monthly,
            }
            .into());
        }

        Ok(())
    }
}

/// `[start of month, start of next month)` for the month containing `now`,
/// with both edges taken at local midnight in `now`'s time zone.
pub fn month_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let local = now.naive_local();
    let (year, month) = (local.year(), local.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let midnight = |year: i32, month: u32| -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        // A skipped midnight (DST gap) falls back to reading it as UTC
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc())
    };

    (midnight(year, month), midnight(next_year, next_month))
}
