//! Local calendar-day boundaries.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Converts local midnight of `date` in `tz` to UTC.
///
/// Ambiguous midnights (DST fall-back) resolve to the earlier instant. When
/// midnight does not exist (DST spring-forward) the day starts at 01:00.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// The local calendar date `timestamp` falls on.
pub fn local_date<Tz: TimeZone>(timestamp: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    timestamp.with_timezone(tz).date_naive()
}

/// Inclusive `[start, end]` bounds covering the local days `first..=last`.
///
/// The end is one microsecond before the following midnight, the finest
/// precision stored timestamps carry.
pub fn days_range<Tz: TimeZone>(
    first: NaiveDate,
    last: NaiveDate,
    tz: &Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(first, tz);
    let end = local_midnight(last + Duration::days(1), tz) - Duration::microseconds(1);
    (start, end)
}

/// Inclusive bounds of a single local day.
pub fn day_range<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    days_range(date, date, tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::FixedOffset;

    #[test]
    fn utc_day_range_spans_whole_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (start, end) = day_range(date, &Utc);
        assert_eq!(start.to_rfc3339(), "2025-03-10T00:00:00+00:00");
        assert_eq!(end - start, Duration::days(1) - Duration::microseconds(1));
    }

    #[test]
    fn offset_midnight_converts_to_utc() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(
            local_midnight(date, &tz).to_rfc3339(),
            "2025-03-09T22:00:00+00:00"
        );
    }

    #[test]
    fn local_date_respects_offset() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let ts = DateTime::parse_from_rfc3339("2025-03-10T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local_date(ts, &tz), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    }
}
