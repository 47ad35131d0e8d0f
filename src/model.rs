//! Data models for patchlight.
//!
//! Shared types for the compliance pipeline: catalog items, resolved
//! baselines, device report rows, and the summary rows the presentation
//! layer consumes. Wire-facing types map backend field names with serde
//! renames and tolerate missing fields with defaults; everything the
//! pipeline derives is plain serializable data.

use serde::{Deserialize, Deserializer, Serialize};

/// A software title tracked by the backend catalog.
///
/// Identity is the backend-assigned `id`; the display title is only used
/// for name resolution and report labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Opaque identifier assigned by the backend catalog.
    pub id: String,

    /// Human-readable title.
    pub title: String,
}

/// A tracked item together with its minimum acceptable installed version.
///
/// An empty `min_version` means "no floor": every device counts as
/// compliant. A resolved set contains at most one selection per `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSelection {
    /// Backend identifier of the tracked item.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Minimum acceptable version; empty means no floor.
    #[serde(default)]
    pub min_version: String,
}

impl BaselineSelection {
    /// Whether an explicit non-empty baseline is set.
    pub fn has_baseline(&self) -> bool {
        !self.min_version.trim().is_empty()
    }

    /// Baseline string for report rows, `"(none)"` when no floor is set.
    pub fn baseline_label(&self) -> String {
        if self.has_baseline() {
            self.min_version.clone()
        } else {
            "(none)".to_string()
        }
    }
}

/// One device row from a per-title patch report.
///
/// Sourced verbatim from the paged backend listing; held only while the
/// owning title is being processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device hostname.
    #[serde(default, rename = "computerName")]
    pub computer_name: String,

    /// Assigned user.
    #[serde(default)]
    pub username: String,

    /// Backend device identifier (some backends report it as a number).
    #[serde(default, rename = "deviceId", deserialize_with = "string_or_number")]
    pub device_id: String,

    /// Operating system version string.
    #[serde(default, rename = "operatingSystemVersion")]
    pub os_version: String,

    /// Last check-in timestamp as reported, ISO-8601-ish, possibly zoned.
    #[serde(default, rename = "lastContactTime")]
    pub last_contact_time: String,

    /// Installed version of the tracked title.
    #[serde(default, rename = "version")]
    pub installed_version: String,
}

/// Per-title compliance summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Display title of the tracked item.
    pub title: String,

    /// Baseline the devices were compared against, `"(none)"` for no floor.
    pub baseline: String,

    /// Devices that survived the activity-window filter.
    pub active_devices: u64,

    /// Devices at or above the baseline.
    pub compliant: u64,

    /// `max(active_devices - compliant, 0)`.
    pub non_compliant: u64,

    /// Compliant share of active devices, percent, rounded to 2 decimals.
    pub compliance_pct: f64,
}

/// Per-device detail row emitted alongside each [`ComplianceSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetailRow {
    pub computer_name: String,
    pub username: String,
    pub device_id: String,
    pub os_version: String,
    pub last_contact_time: String,
    pub installed_version: String,

    /// Result of the installed-version vs baseline comparison.
    pub compliant: bool,
}

/// Fleet-wide share of inventory that checked in recently.
///
/// Used as a global multiplier in ratio mode, not for per-item filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FleetActivityRatio {
    /// Devices in the full inventory listing.
    pub total_devices: u64,

    /// Devices whose last contact falls inside the window.
    pub active_devices: u64,

    /// `active / total`, or 0.0 for an empty inventory.
    pub ratio: f64,
}

/// Ratio-mode output row: vendor-reported counts plus the active-scaled
/// estimate for one tracked item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallRow {
    pub title: String,
    pub title_id: String,

    /// Vendor-reported latest version.
    pub latest_version: String,

    /// Release date, truncated to the date portion when present.
    pub release_date: String,

    /// `hosts_patched + hosts_out_of_date`.
    pub hosts_total: u64,
    pub hosts_patched: u64,
    pub hosts_out_of_date: u64,

    /// Completion percent over all hosts, 2 decimals, 0.0 when no hosts.
    pub completion_pct: f64,

    /// Counts scaled by the fleet activity ratio, rounded before the
    /// percentage is recomputed.
    pub adjusted_patched: u64,
    pub adjusted_out_of_date: u64,
    pub adjusted_completion_pct: f64,
}

/// Accept a JSON string or number and coerce it to a string field.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_label() {
        let explicit = BaselineSelection {
            id: "12".to_string(),
            title: "Google Chrome".to_string(),
            min_version: "129.0".to_string(),
        };
        let open = BaselineSelection {
            id: "13".to_string(),
            title: "Mozilla Firefox".to_string(),
            min_version: "  ".to_string(),
        };

        assert!(explicit.has_baseline());
        assert_eq!(explicit.baseline_label(), "129.0");
        assert!(!open.has_baseline());
        assert_eq!(open.baseline_label(), "(none)");
    }

    #[test]
    fn test_device_record_from_wire_names() {
        let row: DeviceRecord = serde_json::from_value(serde_json::json!({
            "computerName": "mac-042",
            "username": "jdoe",
            "deviceId": 4711,
            "operatingSystemVersion": "14.6.1",
            "lastContactTime": "2025-07-20T11:02:33Z",
            "version": "129.0.1"
        }))
        .unwrap();

        assert_eq!(row.computer_name, "mac-042");
        assert_eq!(row.device_id, "4711");
        assert_eq!(row.installed_version, "129.0.1");
    }

    #[test]
    fn test_device_record_tolerates_missing_fields() {
        let row: DeviceRecord = serde_json::from_value(serde_json::json!({
            "computerName": "mac-043"
        }))
        .unwrap();

        assert_eq!(row.computer_name, "mac-043");
        assert!(row.installed_version.is_empty());
        assert!(row.last_contact_time.is_empty());
    }
}
