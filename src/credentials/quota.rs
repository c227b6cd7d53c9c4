use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// Result of one submission attempt, as far as quota bookkeeping is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Failure,
}

/// Mutable usage state of a single credential
///
/// The daily budget rolls over at UTC midnight; the consecutive-failure counter only
/// resets on a successful attempt or an explicit operator reset.
#[derive(Debug, Clone)]
pub struct QuotaState {
    /// When the credential last issued a request
    pub last_used: Option<DateTime<Utc>>,

    /// Failed attempts since the last success
    pub consecutive_failures: u32,

    /// Attempts issued during `day`
    pub used_today: u32,

    /// UTC day `used_today` refers to
    pub day: NaiveDate,
}

impl QuotaState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_used: None,
            consecutive_failures: 0,
            used_today: 0,
            day: now.date_naive(),
        }
    }

    /// Attempts used on the UTC day containing `now`
    pub fn used_on(&self, now: DateTime<Utc>) -> u32 {
        if now.date_naive() == self.day {
            self.used_today
        } else {
            0
        }
    }

    /// Requests left in today's budget
    pub fn remaining(&self, daily_limit: u32, now: DateTime<Utc>) -> u32 {
        daily_limit.saturating_sub(self.used_on(now))
    }

    /// Returns true if the credential may be handed out for another submission
    pub fn is_usable(&self, daily_limit: u32, failure_threshold: u32, now: DateTime<Utc>) -> bool {
        self.consecutive_failures < failure_threshold && self.remaining(daily_limit, now) > 0
    }

    /// Records one attempt made at `now`
    pub fn record(&mut self, result: AttemptResult, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            self.day = today;
            self.used_today = 0;
        }

        self.used_today += 1;
        self.last_used = Some(now);

        match result {
            AttemptResult::Success => self.consecutive_failures = 0,
            AttemptResult::Failure => self.consecutive_failures += 1,
        }
    }

    /// Clears the failure counter
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// Point-in-time view of one credential's quota, for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaReport {
    pub slot: u8,
    pub name: String,
    pub email: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub consecutive_failures: u32,
    pub usable: bool,
    pub resets_at: DateTime<Utc>,
}

impl QuotaReport {
    /// One-line human-readable summary
    pub fn message(&self) -> String {
        format!(
            "{} ({}): {}/{} used, {} remaining. Resets {}",
            self.name,
            self.email,
            self.used,
            self.limit,
            self.remaining,
            self.resets_at.format("%H:%M %d-%m-%Y UTC")
        )
    }
}

/// Next UTC midnight after `now`
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
