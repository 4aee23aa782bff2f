use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::escrow::coordinator::EscrowCoordinator;
use crate::escrow::db::EscrowStore;
use crate::escrow::error::EscrowError;
use crate::escrow::sweeper::DeadlineSweeper;

/// Fixed-window quota for dispute opening
#[derive(Debug, Clone)]
pub struct DisputeRateQuota {
    /// Max open-dispute attempts per window per purchase
    pub limit: i64,
    /// Window length in minutes; windows are aligned to the hour grid
    pub window_minutes: i64,
}

impl Default for DisputeRateQuota {
    fn default() -> Self {
        Self {
            limit: 5,
            window_minutes: 60,
        }
    }
}

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<EscrowCoordinator>,
    pub sweeper: Arc<DeadlineSweeper>,
    pub store: Arc<dyn EscrowStore>,
    pub verifier: Arc<TokenVerifier>,
    /// Shared secret for the /internal surface
    pub internal_secret: String,
    pub dispute_quota: DisputeRateQuota,
}

impl AppState {
    /// Count an open-dispute attempt against the purchase's fixed window.
    /// The counter lives in the record store so the limit holds across
    /// process instances.
    pub async fn check_dispute_rate(&self, key: &str) -> Result<(), EscrowError> {
        let window_start = window_floor(Utc::now(), self.dispute_quota.window_minutes);
        let count = self
            .store
            .bump_rate_window(&format!("dispute:{key}"), window_start)
            .await?;

        if count > self.dispute_quota.limit {
            return Err(EscrowError::RateLimited);
        }
        Ok(())
    }
}

/// Align `now` down to the start of its fixed window (epoch-aligned grid)
fn window_floor(now: DateTime<Utc>, window_minutes: i64) -> DateTime<Utc> {
    let window_secs = window_minutes.max(1) * 60;
    let secs = now.timestamp();
    let floored = secs - secs.rem_euclid(window_secs);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_floor_aligns_to_grid() {
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 14, 37, 22).unwrap();

        let hourly = window_floor(t, 60);
        assert_eq!(hourly, Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap());

        let quarter = window_floor(t, 15);
        assert_eq!(quarter, Utc.with_ymd_and_hms(2025, 6, 1, 14, 30, 0).unwrap());
    }
}
