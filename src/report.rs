//! Compliance aggregation.
//!
//! Two report shapes come out of a run. Baseline mode walks the resolved
//! selections one at a time: collect the device report, apply the activity
//! window, classify each device against the baseline floor, and emit a
//! summary plus the per-device detail. Fleet-ratio mode has no baselines
//! at all: it scales the vendor-reported patched/out-of-date counts by the
//! fleet-wide active ratio to estimate active-adjusted completion.
//!
//! Processing is strictly sequential; item *i+1* starts only after item
//! *i*'s rows are produced. In ratio mode a failed per-title fetch is
//! logged and skipped; in baseline mode it aborts the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::activity::{filter_active, fleet_activity};
use crate::client::{ApiClient, ApiError, PatchSummary};
use crate::model::{
    BaselineSelection, ComplianceSummary, DeviceDetailRow, DeviceRecord, FleetActivityRatio,
    OverallRow, TrackedItem,
};
use crate::version::is_at_least;

/// Ratio-mode per-title detail stops after this many catalog items.
const DETAIL_TITLE_LIMIT: usize = 50;

/// How ratio mode decides which devices count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveMode {
    /// Scale vendor counts by the fleet-wide active ratio.
    Ratio,

    /// Filter each detail row by its own last-contact time.
    PerRecord,
}

/// Per-device detail rows for one title, with compliance classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleDetail {
    pub title: String,
    pub rows: Vec<DeviceDetailRow>,
}

/// Raw per-device rows for one title (ratio mode carries no baseline, so
/// there is nothing to classify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleDevices {
    pub title: String,
    pub rows: Vec<DeviceRecord>,
}

/// Output of a baseline-mode run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineReport {
    pub window_days: i64,
    pub summaries: Vec<ComplianceSummary>,
    pub details: Vec<TitleDetail>,
}

/// Output of a fleet-ratio run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallReport {
    pub activity: FleetActivityRatio,
    pub rows: Vec<OverallRow>,

    /// Subset of `rows` matching the caller's highlight list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlighted: Vec<OverallRow>,

    pub details: Vec<TitleDevices>,
}

/// Round to two decimal places, half away from zero.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classify the device rows for one selection.
///
/// Rows pass the activity window first (a window of zero or less keeps
/// everything), then each surviving row is compared against the baseline
/// floor. The summary maintains `compliant + non_compliant == active` and
/// `non_compliant >= 0` for any input.
pub fn build_baseline_summary(
    selection: &BaselineSelection,
    rows: Vec<DeviceRecord>,
    window_days: i64,
    now: DateTime<Utc>,
) -> (ComplianceSummary, Vec<DeviceDetailRow>) {
    let rows = filter_active(rows, window_days, now);

    let mut compliant: u64 = 0;
    let mut details = Vec::with_capacity(rows.len());

    for row in rows {
        let installed = row.installed_version.trim().to_string();
        let is_compliant = is_at_least(&installed, &selection.min_version);
        if is_compliant {
            compliant += 1;
        }
        details.push(DeviceDetailRow {
            computer_name: row.computer_name,
            username: row.username,
            device_id: row.device_id,
            os_version: row.os_version,
            last_contact_time: row.last_contact_time,
            installed_version: installed,
            compliant: is_compliant,
        });
    }

    let active = details.len() as u64;
    let summary = ComplianceSummary {
        title: selection.title.clone(),
        baseline: selection.baseline_label(),
        active_devices: active,
        compliant,
        non_compliant: active.saturating_sub(compliant),
        compliance_pct: if active > 0 {
            round2(compliant as f64 / active as f64 * 100.0)
        } else {
            0.0
        },
    };

    (summary, details)
}

/// Build one ratio-mode row from a vendor summary.
///
/// The scaled counts are rounded before the percentage is recomputed; the
/// scaled pair can therefore drift slightly from `round(total * ratio)`.
/// That lossiness is intentional and kept as reported behavior.
pub fn build_overall_row(item: &TrackedItem, summary: &PatchSummary, ratio: f64) -> OverallRow {
    let patched = summary.hosts_on_latest;
    let out_of_date = summary.hosts_out_of_date;
    let total = patched + out_of_date;

    let completion = if total > 0 {
        round2(patched as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    let adjusted_patched = (patched as f64 * ratio).round() as u64;
    let adjusted_out_of_date = (out_of_date as f64 * ratio).round() as u64;
    let adjusted_total = adjusted_patched + adjusted_out_of_date;
    let adjusted_completion = if adjusted_total > 0 {
        round2(adjusted_patched as f64 / adjusted_total as f64 * 100.0)
    } else {
        0.0
    };

    OverallRow {
        title: item.title.clone(),
        title_id: item.id.clone(),
        latest_version: summary.latest_version.clone(),
        release_date: summary.release_date_label(),
        hosts_total: total,
        hosts_patched: patched,
        hosts_out_of_date: out_of_date,
        completion_pct: completion,
        adjusted_patched,
        adjusted_out_of_date,
        adjusted_completion_pct: adjusted_completion,
    }
}

/// Select the rows whose title or identifier appears in the highlight
/// list (case-insensitive).
pub fn filter_highlighted(rows: &[OverallRow], names: &[String]) -> Vec<OverallRow> {
    let wanted: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
    rows.iter()
        .filter(|row| {
            wanted.contains(&row.title.to_lowercase()) || wanted.contains(&row.title_id.to_lowercase())
        })
        .cloned()
        .collect()
}

/// Run baseline mode over the resolved selections.
///
/// Any page-fetch failure is fatal: the error unwinds out with nothing
/// written, partial summaries included.
pub async fn run_baseline_report(
    client: &ApiClient,
    selections: &[BaselineSelection],
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<BaselineReport, ApiError> {
    let mut summaries = Vec::with_capacity(selections.len());
    let mut details = Vec::with_capacity(selections.len());

    for selection in selections {
        info!(title = %selection.title, baseline = %selection.baseline_label(), "fetching patch report");
        let rows = client.patch_report(&selection.id).await?;
        let (summary, rows) = build_baseline_summary(selection, rows, window_days, now);
        summaries.push(summary);
        details.push(TitleDetail {
            title: selection.title.clone(),
            rows,
        });
    }

    Ok(BaselineReport {
        window_days,
        summaries,
        details,
    })
}

/// Run fleet-ratio mode over the whole catalog.
///
/// The inventory fetch is fatal; per-title summary and detail fetches are
/// logged and skipped so one bad title cannot sink the batch.
pub async fn run_overall_report(
    client: &ApiClient,
    catalog: &[TrackedItem],
    window_days: i64,
    active_mode: ActiveMode,
    highlight: &[String],
    now: DateTime<Utc>,
) -> Result<OverallReport, ApiError> {
    info!("fetching inventory to compute the active ratio");
    let inventory = client.list_inventory().await?;
    let activity = fleet_activity(
        inventory.iter().map(|r| r.general.last_contact_time.as_str()),
        window_days,
        now,
    );
    info!(
        total = activity.total_devices,
        active = activity.active_devices,
        ratio = activity.ratio,
        "inventory activity computed"
    );

    let mut rows = Vec::with_capacity(catalog.len());
    for item in catalog {
        match client.patch_summary(&item.id).await {
            Ok(summary) => rows.push(build_overall_row(item, &summary, activity.ratio)),
            Err(e) => warn!(title = %item.title, error = %e, "summary fetch failed, skipping"),
        }
    }

    let highlighted = if highlight.is_empty() {
        Vec::new()
    } else {
        filter_highlighted(&rows, highlight)
    };

    let mut details = Vec::new();
    for item in catalog.iter().take(DETAIL_TITLE_LIMIT) {
        match client.patch_report(&item.id).await {
            Ok(report_rows) => {
                let report_rows = match active_mode {
                    ActiveMode::PerRecord => filter_active(report_rows, window_days, now),
                    ActiveMode::Ratio => report_rows,
                };
                details.push(TitleDevices {
                    title: item.title.clone(),
                    rows: report_rows,
                });
            }
            Err(e) => warn!(title = %item.title, error = %e, "detail fetch failed, skipping"),
        }
    }

    Ok(OverallReport {
        activity,
        rows,
        highlighted,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 31, 12, 0, 0).unwrap()
    }

    fn selection(min_version: &str) -> BaselineSelection {
        BaselineSelection {
            id: "101".to_string(),
            title: "Google Chrome".to_string(),
            min_version: min_version.to_string(),
        }
    }

    fn device(installed: &str, last_contact: &str) -> DeviceRecord {
        DeviceRecord {
            computer_name: "mac".to_string(),
            installed_version: installed.to_string(),
            last_contact_time: last_contact.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_baseline_classification_scenarios() {
        let rows = vec![
            device("129.0.1", "2025-07-30T08:00:00Z"),
            device("128.9", "2025-07-30T08:00:00Z"),
            device("", "2025-07-30T08:00:00Z"),
        ];

        let (summary, details) = build_baseline_summary(&selection("129.0"), rows, 30, now());

        assert_eq!(summary.active_devices, 3);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.non_compliant, 2);
        assert!(details[0].compliant);
        assert!(!details[1].compliant);
        assert!(!details[2].compliant);
        assert_eq!(summary.compliance_pct, 33.33);
    }

    #[test]
    fn test_no_floor_means_everything_compliant() {
        let rows = vec![device("", "2025-07-30T08:00:00Z")];
        let (summary, _) = build_baseline_summary(&selection(""), rows, 30, now());

        assert_eq!(summary.baseline, "(none)");
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.non_compliant, 0);
        assert_eq!(summary.compliance_pct, 100.0);
    }

    #[test]
    fn test_activity_window_shrinks_the_denominator() {
        let rows = vec![
            device("129.0", "2025-07-30T08:00:00Z"),
            device("129.0", "2024-01-01T00:00:00Z"), // stale
            device("129.0", "not a timestamp"),
        ];

        let (summary, details) = build_baseline_summary(&selection("129.0"), rows, 30, now());
        assert_eq!(summary.active_devices, 1);
        assert_eq!(details.len(), 1);
    }

    #[test]
    fn test_summary_counts_always_balance() {
        let cases: Vec<Vec<DeviceRecord>> = vec![
            vec![],
            vec![device("1.0", "2025-07-30T08:00:00Z")],
            vec![
                device("2.0", "2025-07-30T08:00:00Z"),
                device("0.5", "2025-07-30T08:00:00Z"),
            ],
        ];

        for rows in cases {
            let (summary, _) = build_baseline_summary(&selection("1.0"), rows, 30, now());
            assert_eq!(summary.compliant + summary.non_compliant, summary.active_devices);
        }
    }

    #[test]
    fn test_overall_row_ratio_scaling() {
        let item = TrackedItem {
            id: "7".to_string(),
            title: "Google Chrome".to_string(),
        };
        let summary = PatchSummary {
            latest_version: "129.0".to_string(),
            hosts_on_latest: 40,
            hosts_out_of_date: 10,
            ..Default::default()
        };

        let row = build_overall_row(&item, &summary, 0.25);

        assert_eq!(row.hosts_total, 50);
        assert_eq!(row.completion_pct, 80.0);
        // 40 * 0.25 = 10; 10 * 0.25 = 2.5, rounded half away from zero.
        assert_eq!(row.adjusted_patched, 10);
        assert_eq!(row.adjusted_out_of_date, 3);
        assert_eq!(row.adjusted_completion_pct, round2(10.0 / 13.0 * 100.0));
        assert_eq!(row.adjusted_completion_pct, 76.92);
    }

    #[test]
    fn test_overall_row_empty_denominators() {
        let item = TrackedItem {
            id: "8".to_string(),
            title: "Ghost Title".to_string(),
        };
        let row = build_overall_row(&item, &PatchSummary::default(), 0.5);

        assert_eq!(row.completion_pct, 0.0);
        assert_eq!(row.adjusted_completion_pct, 0.0);
    }

    #[test]
    fn test_highlight_matches_title_or_id() {
        let item_a = TrackedItem {
            id: "7".to_string(),
            title: "Google Chrome".to_string(),
        };
        let item_b = TrackedItem {
            id: "8".to_string(),
            title: "Mozilla Firefox".to_string(),
        };
        let rows = vec![
            build_overall_row(&item_a, &PatchSummary::default(), 1.0),
            build_overall_row(&item_b, &PatchSummary::default(), 1.0),
        ];

        let by_name = filter_highlighted(&rows, &["google chrome".to_string()]);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].title_id, "7");

        let by_id = filter_highlighted(&rows, &["8".to_string()]);
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].title, "Mozilla Firefox");
    }
}
