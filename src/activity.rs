//! Activity-window classification.
//!
//! Device records carry a `lastContactTime` string in whatever ISO-8601
//! dialect the backend emits, frequently incomplete. Parsing is tolerant
//! and failure is a value, not an error: a record with no parseable
//! timestamp is simply not active. Upstream data is too ragged for
//! anything stricter.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::model::{DeviceRecord, FleetActivityRatio};

/// Parse a last-contact timestamp.
///
/// RFC 3339 first (a trailing `Z` parses as zero offset), then two
/// explicit fallbacks: zoned without a colon in the offset, and naive,
/// which is assumed UTC. `None` is the typed "unparseable" result; callers
/// treat it as "not active", never as an error.
pub fn parse_last_contact(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    None
}

/// Whether a last-contact time falls within the recency window.
pub fn is_active(last_contact: DateTime<Utc>, window_days: i64, now: DateTime<Utc>) -> bool {
    (now - last_contact).num_days() <= window_days
}

/// Keep the records whose last contact falls inside the window.
///
/// A window of zero or less disables filtering entirely and returns the
/// input unchanged. Records whose timestamp cannot be parsed are dropped.
pub fn filter_active(
    rows: Vec<DeviceRecord>,
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<DeviceRecord> {
    if window_days <= 0 {
        return rows;
    }

    rows.into_iter()
        .filter(|row| match parse_last_contact(&row.last_contact_time) {
            Some(last) => is_active(last, window_days, now),
            None => false,
        })
        .collect()
}

/// Compute the fleet-wide active ratio over an inventory listing.
///
/// Each element is a raw last-contact string (empty for devices that never
/// reported one). Unparseable entries count toward the total but are never
/// active. An empty inventory yields a ratio of 0.0.
pub fn fleet_activity<'a, I>(last_contacts: I, window_days: i64, now: DateTime<Utc>) -> FleetActivityRatio
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total: u64 = 0;
    let mut active: u64 = 0;

    for raw in last_contacts {
        total += 1;
        if let Some(last) = parse_last_contact(raw)
            && is_active(last, window_days, now)
        {
            active += 1;
        }
    }

    let ratio = if total > 0 {
        active as f64 / total as f64
    } else {
        0.0
    };

    FleetActivityRatio {
        total_devices: total,
        active_devices: active,
        ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(last_contact: &str) -> DeviceRecord {
        DeviceRecord {
            computer_name: "mac".to_string(),
            last_contact_time: last_contact.to_string(),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_zulu_and_offset_forms() {
        let zulu = parse_last_contact("2025-07-20T11:02:33Z").unwrap();
        let offset = parse_last_contact("2025-07-20T11:02:33+00:00").unwrap();
        let compact = parse_last_contact("2025-07-20T11:02:33+0000").unwrap();
        assert_eq!(zulu, offset);
        assert_eq!(zulu, compact);
    }

    #[test]
    fn test_parse_naive_assumes_utc() {
        let naive = parse_last_contact("2025-07-20T11:02:33").unwrap();
        let zulu = parse_last_contact("2025-07-20T11:02:33Z").unwrap();
        assert_eq!(naive, zulu);
    }

    #[test]
    fn test_parse_failure_is_none() {
        assert_eq!(parse_last_contact(""), None);
        assert_eq!(parse_last_contact("yesterday"), None);
        assert_eq!(parse_last_contact("2025/07/20"), None);
    }

    #[test]
    fn test_filter_zero_window_is_identity() {
        let rows = vec![record("garbage"), record(""), record("2020-01-01T00:00:00Z")];
        let out = filter_active(rows.clone(), 0, now());
        assert_eq!(out.len(), rows.len());
    }

    #[test]
    fn test_filter_drops_stale_and_unparseable() {
        let rows = vec![
            record("2025-07-20T11:02:33Z"), // 11 days before `now`
            record("2025-05-01T00:00:00Z"), // stale
            record("not a timestamp"),
        ];
        let out = filter_active(rows, 30, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].last_contact_time, "2025-07-20T11:02:33Z");
    }

    #[test]
    fn test_fleet_activity_ratio() {
        let mut contacts: Vec<String> = Vec::new();
        for _ in 0..25 {
            contacts.push("2025-07-25T08:00:00Z".to_string());
        }
        for _ in 0..70 {
            contacts.push("2024-01-01T00:00:00Z".to_string());
        }
        for _ in 0..5 {
            contacts.push(String::new());
        }

        let ratio = fleet_activity(contacts.iter().map(String::as_str), 30, now());
        assert_eq!(ratio.total_devices, 100);
        assert_eq!(ratio.active_devices, 25);
        assert!((ratio.ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fleet_activity_empty_inventory() {
        let ratio = fleet_activity(std::iter::empty(), 30, now());
        assert_eq!(ratio.total_devices, 0);
        assert!((ratio.ratio - 0.0).abs() < f64::EPSILON);
    }
}
