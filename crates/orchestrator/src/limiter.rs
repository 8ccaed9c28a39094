//! Request gating: sliding windows and tier-based monthly quotas.
//!
//! Both gates run before any provider call. The sliding windows are
//! in-process and per user+endpoint; the monthly quota is counted from
//! successful usage ledger rows inside the current UTC calendar month.
//! Counts tolerate bounded staleness, so no locks guard the ledger reads.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ai_core::AiTask;
use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use database::{usage, user, Database, SubscriptionTier};
use tracing::debug;
use uuid::Uuid;

use crate::error::OrchestratorError;

/// Sentinel for "no monthly cap".
pub const UNLIMITED: i64 = -1;

/// Concurrent per-endpoint caps, enforced short-circuit in order.
const WINDOW_CAPS: [(u32, Duration); 3] = [
    (3, Duration::from_secs(1)),
    (20, Duration::from_secs(10)),
    (100, Duration::from_secs(60)),
];

/// Monthly quota numbers per tier.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub free_identification: i64,
    pub free_health_assessment: i64,
    pub free_chat: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_identification: 5,
            free_health_assessment: 2,
            free_chat: 10,
        }
    }
}

impl QuotaConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `VERDANT_FREE_IDENTIFY_QUOTA` - free-tier identifications/month (default: 5)
    /// - `VERDANT_FREE_HEALTH_QUOTA` - free-tier assessments/month (default: 2)
    /// - `VERDANT_FREE_CHAT_QUOTA` - free-tier chats/month (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: i64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            free_identification: read("VERDANT_FREE_IDENTIFY_QUOTA", defaults.free_identification),
            free_health_assessment: read("VERDANT_FREE_HEALTH_QUOTA", defaults.free_health_assessment),
            free_chat: read("VERDANT_FREE_CHAT_QUOTA", defaults.free_chat),
        }
    }

    /// The cap for a feature under a tier. Premium is uncapped, as is
    /// embedding (an internal task with no user-facing quota).
    pub fn limit_for(&self, tier: SubscriptionTier, task: AiTask) -> i64 {
        if tier == SubscriptionTier::Premium {
            return UNLIMITED;
        }
        match task.quota_feature() {
            "identification" => self.free_identification,
            "health_assessment" => self.free_health_assessment,
            "chat" => self.free_chat,
            _ => UNLIMITED,
        }
    }
}

/// In-process sliding-window tracker.
pub struct SlidingWindows {
    events: Mutex<HashMap<(Uuid, &'static str), VecDeque<Instant>>>,
}

impl Default for SlidingWindows {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindows {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit and check every window, short-circuiting on the first
    /// violation. Returns the suggested retry delay on rejection.
    pub fn check(&self, user_id: Uuid, endpoint: &'static str) -> Result<(), Duration> {
        self.check_at(user_id, endpoint, Instant::now())
    }

    fn check_at(
        &self,
        user_id: Uuid,
        endpoint: &'static str,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut events = self.events.lock().unwrap();
        let queue = events.entry((user_id, endpoint)).or_default();

        let longest = WINDOW_CAPS
            .iter()
            .map(|(_, window)| *window)
            .max()
            .unwrap_or_default();
        while let Some(front) = queue.front() {
            if now.duration_since(*front) > longest {
                queue.pop_front();
            } else {
                break;
            }
        }

        for (cap, window) in WINDOW_CAPS {
            let in_window = queue
                .iter()
                .rev()
                .take_while(|t| now.duration_since(**t) <= window)
                .count();
            if in_window as u32 >= cap {
                // The oldest hit inside this window dictates when a slot
                // frees up.
                let oldest_in_window = queue
                    .iter()
                    .find(|t| now.duration_since(**t) <= window)
                    .copied()
                    .unwrap_or(now);
                let retry_after = window.saturating_sub(now.duration_since(oldest_in_window));
                return Err(retry_after.max(Duration::from_secs(1)));
            }
        }

        queue.push_back(now);
        Ok(())
    }
}

/// The UTC calendar month containing `now`: `[start, end)`.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_date = now.date_naive().with_day(1).expect("day 1 always exists");
    let start = Utc
        .from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).expect("midnight always exists"));
    let end = start
        .checked_add_months(Months::new(1))
        .expect("next month exists");
    (start, end)
}

/// Ledger-backed quota labels for a task's feature bucket.
fn feature_actions(task: AiTask) -> Vec<String> {
    match task.quota_feature() {
        "chat" => vec![
            AiTask::ChatSimple.as_str().to_string(),
            AiTask::ChatComplex.as_str().to_string(),
        ],
        feature => vec![feature.to_string()],
    }
}

/// Both request gates, checked in order: window first, quota second.
pub struct RateLimiter {
    windows: SlidingWindows,
    quotas: QuotaConfig,
    db: Database,
}

impl RateLimiter {
    pub fn new(db: Database, quotas: QuotaConfig) -> Self {
        Self {
            windows: SlidingWindows::new(),
            quotas,
            db,
        }
    }

    /// Sliding-window gate for an endpoint.
    pub fn check_window(
        &self,
        user_id: Uuid,
        endpoint: &'static str,
    ) -> Result<(), OrchestratorError> {
        self.windows.check(user_id, endpoint).map_err(|retry_after| {
            debug!(%user_id, endpoint, "sliding window rejected request");
            OrchestratorError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            }
        })
    }

    /// Monthly quota gate for a task. Premium tier skips the ledger read
    /// entirely.
    pub async fn check_quota(&self, user_id: Uuid, task: AiTask) -> Result<(), OrchestratorError> {
        let tier = user::get_tier(self.db.pool(), user_id)
            .await
            .map_err(|e| OrchestratorError::from_lookup(e, "User"))?;

        let limit = self.quotas.limit_for(tier, task);
        if limit == UNLIMITED {
            return Ok(());
        }

        let (start, end) = month_window(Utc::now());
        let used = usage::success_count_in_window(
            self.db.pool(),
            user_id,
            &feature_actions(task),
            start,
            end,
        )
        .await?;

        if used >= limit {
            let feature = match task.quota_feature() {
                "identification" => "identification",
                "health_assessment" => "health_assessment",
                _ => "chat",
            };
            return Err(OrchestratorError::QuotaExceeded {
                feature,
                used,
                limit,
                resets_at: end,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_burst_cap_three_per_second() {
        let windows = SlidingWindows::new();
        let user = Uuid::new_v4();
        let now = Instant::now();

        for _ in 0..3 {
            assert!(windows.check_at(user, "/api/v1/chat", now).is_ok());
        }
        assert!(windows.check_at(user, "/api/v1/chat", now).is_err());
    }

    #[test]
    fn test_window_slides() {
        let windows = SlidingWindows::new();
        let user = Uuid::new_v4();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(windows.check_at(user, "/api/v1/chat", start).is_ok());
        }
        // Two seconds later the per-second window has slid past.
        let later = start + Duration::from_secs(2);
        assert!(windows.check_at(user, "/api/v1/chat", later).is_ok());
    }

    #[test]
    fn test_ten_second_window() {
        let windows = SlidingWindows::new();
        let user = Uuid::new_v4();
        let start = Instant::now();

        // 20 hits spread under the 3/sec cap but up against 20/10s.
        for i in 0..20 {
            let at = start + Duration::from_millis(400 * i);
            assert!(windows.check_at(user, "/api/v1/identify", at).is_ok(), "hit {}", i);
        }
        let at = start + Duration::from_millis(400 * 20);
        assert!(windows.check_at(user, "/api/v1/identify", at).is_err());
    }

    #[test]
    fn test_windows_are_per_user() {
        let windows = SlidingWindows::new();
        let now = Instant::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        for _ in 0..3 {
            assert!(windows.check_at(first, "/api/v1/chat", now).is_ok());
        }
        assert!(windows.check_at(second, "/api/v1/chat", now).is_ok());
    }

    #[test]
    fn test_month_window_boundaries() {
        let mid_january = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 1, 17)
                .unwrap()
                .and_hms_opt(13, 45, 0)
                .unwrap(),
        );
        let (start, end) = month_window(mid_january);

        assert_eq!(start.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-02-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_window_december_rolls_over() {
        let december = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
        );
        let (_, end) = month_window(december);
        assert_eq!(end.year(), 2025);
        assert_eq!(end.month(), 1);
    }

    #[test]
    fn test_quota_limits_by_tier() {
        let quotas = QuotaConfig::default();
        assert_eq!(
            quotas.limit_for(SubscriptionTier::Free, AiTask::Identification),
            5
        );
        assert_eq!(
            quotas.limit_for(SubscriptionTier::Free, AiTask::HealthAssessment),
            2
        );
        assert_eq!(quotas.limit_for(SubscriptionTier::Free, AiTask::ChatSimple), 10);
        assert_eq!(quotas.limit_for(SubscriptionTier::Free, AiTask::ChatComplex), 10);
        assert_eq!(
            quotas.limit_for(SubscriptionTier::Premium, AiTask::Identification),
            UNLIMITED
        );
        assert_eq!(quotas.limit_for(SubscriptionTier::Free, AiTask::Embedding), UNLIMITED);
    }

    #[test]
    fn test_chat_feature_spans_both_tiers() {
        assert_eq!(
            feature_actions(AiTask::ChatSimple),
            vec!["chat_simple".to_string(), "chat_complex".to_string()]
        );
        assert_eq!(
            feature_actions(AiTask::Identification),
            vec!["identification".to_string()]
        );
    }
}
