//! # UTC Calendar Days
//!
//! Daily rules aggregate over the UTC calendar day containing the evaluated
//! transaction, never a rolling 24h window and never the client's local day.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// The UTC calendar day containing `at`.
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Half-open bounds `[start, end)` of a UTC calendar day.
pub fn utc_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn last_second_belongs_to_same_day() {
        let late = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(utc_day(late), utc_day(early));
    }

    #[test]
    fn midnight_starts_next_day() {
        let before = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_ne!(utc_day(before), utc_day(after));
    }

    #[test]
    fn bounds_are_half_open() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (start, end) = utc_day_bounds(day);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(utc_day(end), day.succ_opt().unwrap());
    }
}
