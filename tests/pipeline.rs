//! Integration tests for the compliance pipeline.
//!
//! These drive the public surface end to end with scripted page
//! responses: baseline resolution, paged collection, activity filtering,
//! version classification, and trend assembly.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use patchlight::baseline::{BaselineRequest, apply_global_default, resolve_requests};
use patchlight::model::{DeviceRecord, TrackedItem};
use patchlight::paging::collect_paged;
use patchlight::report::build_baseline_summary;
use patchlight::trend::{SnapshotPoint, TrendHistoryBuilder};

fn catalog() -> Vec<TrackedItem> {
    vec![
        TrackedItem {
            id: "101".to_string(),
            title: "Google Chrome".to_string(),
        },
        TrackedItem {
            id: "102".to_string(),
            title: "Mozilla Firefox".to_string(),
        },
    ]
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 31, 12, 0, 0).unwrap()
}

fn device(installed: &str, last_contact: &str) -> Value {
    json!({
        "computerName": "mac",
        "username": "jdoe",
        "deviceId": 1,
        "operatingSystemVersion": "14.6",
        "lastContactTime": last_contact,
        "version": installed
    })
}

#[tokio::test]
async fn baseline_pipeline_end_to_end() {
    // Resolve requests against the catalog: one explicit floor, one
    // unknown title that drops with a warning, one floorless entry that
    // picks up the global default.
    let requests = vec![
        BaselineRequest {
            title: "google chrome".to_string(),
            min_version: "129.0".to_string(),
        },
        BaselineRequest {
            title: "Unknown Thing".to_string(),
            min_version: "1.0".to_string(),
        },
        BaselineRequest {
            title: "Mozilla Firefox".to_string(),
            min_version: String::new(),
        },
    ];

    let mut selections = resolve_requests(&catalog(), &requests);
    assert_eq!(selections.len(), 2);

    apply_global_default(&mut selections, "128.0");
    assert_eq!(selections[0].min_version, "129.0");
    assert_eq!(selections[1].min_version, "128.0");

    // Drain a two-page device report for the first selection.
    let pages = vec![
        json!({
            "results": [
                device("129.0.1", "2025-07-30T08:00:00Z"),
                device("128.9", "2025-07-30T08:00:00Z"),
            ],
            "totalCount": 3
        }),
        json!({
            "results": [device("200.0", "2024-01-01T00:00:00Z")],
            "totalCount": 3
        }),
    ];
    let raw = collect_paged(2, async |page: u32, _size: u32| {
        Ok::<Value, String>(pages[page as usize].clone())
    })
    .await
    .unwrap();
    assert_eq!(raw.len(), 3);

    let rows: Vec<DeviceRecord> = raw
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect();

    // The stale device falls out of the window; of the two active ones,
    // only 129.0.1 clears the 129.0 floor.
    let (summary, details) = build_baseline_summary(&selections[0], rows, 30, now());

    assert_eq!(summary.title, "Google Chrome");
    assert_eq!(summary.baseline, "129.0");
    assert_eq!(summary.active_devices, 2);
    assert_eq!(summary.compliant, 1);
    assert_eq!(summary.non_compliant, 1);
    assert_eq!(summary.compliance_pct, 50.0);
    assert_eq!(summary.compliant + summary.non_compliant, summary.active_devices);

    assert_eq!(details.len(), 2);
    assert!(details[0].compliant);
    assert!(!details[1].compliant);
}

#[tokio::test]
async fn window_zero_disables_filtering() {
    let pages = vec![json!([
        device("1.2.3", "not a timestamp"),
        device("1.2.3", "")
    ])];
    let raw = collect_paged(50, async |page: u32, _size: u32| {
        Ok::<Value, String>(pages.get(page as usize).cloned().unwrap_or(json!([])))
    })
    .await
    .unwrap();

    let rows: Vec<DeviceRecord> = raw
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect();

    let selection = patchlight::model::BaselineSelection {
        id: "101".to_string(),
        title: "Google Chrome".to_string(),
        min_version: String::new(),
    };

    // Unparseable timestamps survive because the window is off entirely.
    let (summary, _) = build_baseline_summary(&selection, rows, 0, now());
    assert_eq!(summary.active_devices, 2);
    assert_eq!(summary.compliant, 2);
}

#[test]
fn trend_assembly_over_two_cycles() {
    let mut builder = TrendHistoryBuilder::new();
    builder.add_snapshot(vec![
        SnapshotPoint {
            entity_key: "SN1".to_string(),
            display_label: "mac-01".to_string(),
            date_key: "2025-06-01".to_string(),
            failure_count: 5.0,
        },
        SnapshotPoint {
            entity_key: "SN2".to_string(),
            display_label: "mac-02".to_string(),
            date_key: "2025-06-01".to_string(),
            failure_count: 9.0,
        },
    ]);
    builder.add_snapshot(vec![SnapshotPoint {
        entity_key: "SN1".to_string(),
        display_label: "mac-01".to_string(),
        date_key: "2025-07-01".to_string(),
        failure_count: 0.0,
    }]);

    let report = builder.build();
    assert_eq!(report.dates, vec!["2025-06-01", "2025-07-01"]);

    let average = report.rows.last().unwrap();
    assert_eq!(average.entity_key, "Average");
    assert_eq!(average.cells["2025-06-01"], 7.0);
    // Only SN1 is present on the second date.
    assert_eq!(average.cells["2025-07-01"], 0.0);
}
