//! Window arithmetic.
//!
//! A window is the slice of send-time space one leader is responsible
//! for. Its span never crosses the next hour boundary measured from the
//! cycle's start, so a late-starting leader governs only the remainder
//! of its own hour.

use chrono::{DateTime, Duration, Timelike, Utc};

/// The time range one leader schedules, bounded by its lease lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First intended send time queried (`now + lead offset`).
    pub start: DateTime<Utc>,
    /// Exclusive end of the queried send-time range.
    pub end: DateTime<Utc>,
    /// Processing deadline: the hour boundary that also bounds the lease.
    pub deadline: DateTime<Utc>,
}

impl Window {
    /// Compute the window for a cycle starting at `now`.
    ///
    /// The span is the lesser of the time remaining to the next hour
    /// boundary and one full hour; the lead offset shifts the queried
    /// send times, not the deadline.
    pub fn upcoming(now: DateTime<Utc>, lead_offset: Duration) -> Self {
        let deadline = next_hour_boundary(now);
        let span = (deadline - now).min(Duration::hours(1));
        let start = now + lead_offset;

        Self {
            start,
            end: start + span,
            deadline,
        }
    }

    /// Time left until the deadline, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    /// Remaining window time as a store TTL, at least one second so a
    /// write issued at the deadline edge still lands with an expiry.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> std::time::Duration {
        std::time::Duration::from_secs(self.remaining(now).num_seconds().max(1) as u64)
    }

    /// Whether the deadline has passed.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// The next top-of-hour strictly after `now` (a full hour when `now` is
/// exactly on a boundary).
pub fn next_hour_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let into_hour = Duration::seconds((now.minute() * 60 + now.second()) as i64)
        + Duration::nanoseconds(now.nanosecond() as i64);
    now - into_hour + Duration::hours(1)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test_case(at(12, 40, 30), at(13, 0, 0); "mid hour")]
    #[test_case(at(12, 0, 0), at(13, 0, 0); "exactly on boundary")]
    #[test_case(at(12, 59, 59), at(13, 0, 0); "last second")]
    fn boundary_is_next_top_of_hour(now: DateTime<Utc>, expected: DateTime<Utc>) {
        assert_eq!(next_hour_boundary(now), expected);
    }

    #[test]
    fn full_hour_window_from_boundary() {
        let now = at(12, 0, 0);
        let window = Window::upcoming(now, Duration::minutes(10));

        assert_eq!(window.start, at(12, 10, 0));
        assert_eq!(window.end, at(13, 10, 0));
        assert_eq!(window.deadline, at(13, 0, 0));
    }

    #[test]
    fn late_start_shrinks_span_to_hour_remainder() {
        let now = at(12, 40, 0);
        let window = Window::upcoming(now, Duration::minutes(10));

        // 20 minutes left in the hour: the leader only governs those.
        assert_eq!(window.start, at(12, 50, 0));
        assert_eq!(window.end, at(13, 10, 0));
        assert_eq!(window.deadline, at(13, 0, 0));
    }

    #[test]
    fn remaining_clamps_at_zero_after_deadline() {
        let window = Window::upcoming(at(12, 40, 0), Duration::minutes(10));
        assert_eq!(window.remaining(at(13, 5, 0)), Duration::zero());
        assert!(window.is_closed(at(13, 0, 0)));
        assert!(!window.is_closed(at(12, 59, 59)));
    }

    #[test]
    fn remaining_ttl_is_at_least_one_second() {
        let window = Window::upcoming(at(12, 40, 0), Duration::minutes(10));
        assert_eq!(
            window.remaining_ttl(at(13, 5, 0)),
            std::time::Duration::from_secs(1)
        );
        assert_eq!(
            window.remaining_ttl(at(12, 50, 0)),
            std::time::Duration::from_secs(600)
        );
    }
}
