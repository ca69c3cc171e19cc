//! Timer arithmetic for project loops.

use std::time::Duration;
use time::{OffsetDateTime, Time};

/// Next poll instant after a cycle completed at `from`.
///
/// Relative projects re-arm from cycle completion. Absolute projects
/// land on the smallest multiple of `interval` past UTC midnight that
/// is still in the future, so a 6-hour project polls at 06:00, 12:00,
/// 18:00, 00:00 regardless of how long each cycle took.
pub fn next_poll(absolute: bool, from: OffsetDateTime, interval: Duration) -> OffsetDateTime {
    if absolute {
        next_absolute(from, interval)
    } else {
        from + interval
    }
}

fn next_absolute(now: OffsetDateTime, interval: Duration) -> OffsetDateTime {
    let midnight = now.replace_time(Time::MIDNIGHT);
    let since_midnight = (now - midnight).whole_seconds().max(0) as u64;
    let secs = interval.as_secs().max(1);
    let steps = since_midnight / secs + 1;
    midnight + Duration::from_secs(steps * secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn ts(s: &str) -> OffsetDateTime {
        OffsetDateTime::parse(s, &Rfc3339).expect("valid rfc3339")
    }

    #[test]
    fn relative_adds_interval_to_completion() {
        let next = next_poll(false, ts("2024-03-01T10:07:00Z"), Duration::from_secs(600));
        assert_eq!(next, ts("2024-03-01T10:17:00Z"));
    }

    #[test]
    fn absolute_rounds_up_to_next_multiple() {
        let next = next_poll(true, ts("2024-03-01T10:20:00Z"), Duration::from_secs(3600));
        assert_eq!(next, ts("2024-03-01T11:00:00Z"));
    }

    #[test]
    fn absolute_on_exact_multiple_moves_to_the_next() {
        let next = next_poll(true, ts("2024-03-01T10:00:00Z"), Duration::from_secs(3600));
        assert_eq!(next, ts("2024-03-01T11:00:00Z"));
    }

    #[test]
    fn absolute_at_midnight_is_one_interval_in() {
        let next = next_poll(true, ts("2024-03-01T00:00:00Z"), Duration::from_secs(21600));
        assert_eq!(next, ts("2024-03-01T06:00:00Z"));
    }

    #[test]
    fn absolute_daily_lands_on_next_midnight() {
        let next = next_poll(true, ts("2024-03-01T15:45:00Z"), Duration::from_secs(86400));
        assert_eq!(next, ts("2024-03-02T00:00:00Z"));
    }

    #[test]
    fn absolute_sub_minute_interval() {
        let next = next_poll(true, ts("2024-03-01T00:01:00Z"), Duration::from_secs(90));
        assert_eq!(next, ts("2024-03-01T00:01:30Z"));
    }
}
