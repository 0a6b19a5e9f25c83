use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};

/// Timezone that defines the calendar day used for activity bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarZone {
    /// The host's local timezone.
    Local,
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .map(CalendarZone::Fixed)
            .unwrap_or(CalendarZone::Local)
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            CalendarZone::Local => instant.with_timezone(&Local).date_naive(),
            CalendarZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }
}

/// Normalizes a stored date or timestamp string into a calendar-day key.
///
/// Bare `YYYY-MM-DD` values are already bucketed and kept as-is. Timestamps
/// are converted into `zone` first; naive timestamps are taken as UTC.
pub fn normalize_date_key(raw: &str, zone: CalendarZone) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(zone.date_of(instant.with_timezone(&Utc)));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| zone.date_of(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(hours: i32) -> CalendarZone {
        CalendarZone::Fixed(FixedOffset::east_opt(hours * 3600).unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn out_of_range_offsets_fall_back_to_local() {
        assert_eq!(CalendarZone::from_offset_minutes(None), CalendarZone::Local);
        assert_eq!(
            CalendarZone::from_offset_minutes(Some(i32::MAX)),
            CalendarZone::Local
        );
        assert_eq!(
            CalendarZone::from_offset_minutes(Some(-1500)),
            CalendarZone::Local
        );
        assert_eq!(
            CalendarZone::from_offset_minutes(Some(330)),
            CalendarZone::Fixed(FixedOffset::east_opt(330 * 60).unwrap())
        );
    }

    #[test]
    fn bare_dates_are_kept() {
        assert_eq!(
            normalize_date_key("2024-01-05", zone(-8)),
            Some(day(2024, 1, 5))
        );
    }

    #[test]
    fn rfc3339_is_bucketed_in_calendar_zone() {
        // 23:30 in New York is already the next day in UTC.
        assert_eq!(
            normalize_date_key("2024-01-06T04:30:00Z", zone(-5)),
            Some(day(2024, 1, 5))
        );
        assert_eq!(
            normalize_date_key("2024-01-05T23:30:00-05:00", zone(-5)),
            Some(day(2024, 1, 5))
        );
    }

    #[test]
    fn naive_timestamps_are_utc() {
        assert_eq!(
            normalize_date_key("2024-01-05 22:15:00", zone(3)),
            Some(day(2024, 1, 6))
        );
        assert_eq!(
            normalize_date_key("2024-01-05T10:00:00.250", zone(0)),
            Some(day(2024, 1, 5))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize_date_key("", zone(0)), None);
        assert_eq!(normalize_date_key("last tuesday", zone(0)), None);
    }

    #[test]
    fn offset_minutes_out_of_range_fall_back_to_local() {
        assert_eq!(
            CalendarZone::from_offset_minutes(Some(100_000)),
            CalendarZone::Local
        );
        assert_eq!(CalendarZone::from_offset_minutes(Some(60)), zone(1));
    }
}
