//! Time source shared by every time-based rule (token expiry, session
//! inactivity, interview access windows).

use chrono::{DateTime, Duration, DurationRound, Utc};

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        // Whole seconds keep the stored RFC 3339 text fixed-width, so SQL
        // string comparison on timestamp columns orders correctly.
        let now = Utc::now();
        now.duration_trunc(Duration::seconds(1)).unwrap_or(now)
    }
}
