//! Longitudinal trend assembly.
//!
//! Each reporting cycle leaves behind one dated snapshot of per-entity
//! failure counts. [`TrendHistoryBuilder`] merges several of them into a
//! per-entity time series plus a cross-entity average per date. Missing
//! cells stay missing: an entity absent from a snapshot is excluded from
//! that date's average rather than counted as zero.
//!
//! Which snapshots participate is the caller's decision; the helpers here
//! cover the usual policy: a date token embedded in the source name, a
//! file-creation-time recency cut, and keeping the most recent four.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tabular::Table;

/// Snapshots kept for one trend report.
pub const MAX_SNAPSHOTS: usize = 4;

/// Entity label of the synthetic average row.
const AVERAGE_ROW_KEY: &str = "Average";

/// Date token embedded in snapshot names, e.g. `2025-07-01T08_30_00`.
static NAME_DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})T\d{2}_\d{2}_\d{2}").expect("valid regex"));

/// One entity's failure count on one snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    /// Stable entity identity, e.g. a serial number.
    pub entity_key: String,

    /// Display label, e.g. the computer name.
    pub display_label: String,

    /// Snapshot date this point belongs to.
    pub date_key: String,

    /// Failed checks for the entity on that date.
    pub failure_count: f64,
}

/// One row of the trend table: an entity across all snapshot dates.
///
/// `cells` holds only the dates the entity was present on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    pub entity_key: String,
    pub display_label: String,
    pub cells: BTreeMap<String, f64>,
}

/// The assembled trend table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    /// Snapshot dates, ascending; the column order of the table.
    pub dates: Vec<String>,

    /// Entity rows in discovery order, then the synthetic average row.
    pub rows: Vec<TrendRow>,
}

/// Accumulates snapshot points into the per-entity history.
#[derive(Debug, Default)]
pub struct TrendHistoryBuilder {
    /// Entity keys in first-seen order.
    order: Vec<String>,
    labels: HashMap<String, String>,
    history: HashMap<String, BTreeMap<String, f64>>,
    dates: BTreeSet<String>,
}

impl TrendHistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one point. The latest label and the latest value for a
    /// given `(entity, date)` win.
    pub fn add_point(&mut self, point: SnapshotPoint) {
        if !self.history.contains_key(&point.entity_key) {
            self.order.push(point.entity_key.clone());
        }
        self.labels
            .insert(point.entity_key.clone(), point.display_label);
        self.dates.insert(point.date_key.clone());
        self.history
            .entry(point.entity_key)
            .or_default()
            .insert(point.date_key, point.failure_count);
    }

    /// Record a whole snapshot's worth of points.
    pub fn add_snapshot(&mut self, points: impl IntoIterator<Item = SnapshotPoint>) {
        for point in points {
            self.add_point(point);
        }
    }

    /// Assemble the table: entity rows in discovery order plus one
    /// trailing average row whose per-date value is the mean over the
    /// entities present on that date.
    pub fn build(self) -> TrendReport {
        let dates: Vec<String> = self.dates.iter().cloned().collect();

        let mut rows: Vec<TrendRow> = self
            .order
            .iter()
            .map(|key| TrendRow {
                entity_key: key.clone(),
                display_label: self.labels.get(key).cloned().unwrap_or_default(),
                cells: self.history.get(key).cloned().unwrap_or_default(),
            })
            .collect();

        let mut averages = BTreeMap::new();
        for date in &dates {
            let values: Vec<f64> = self
                .history
                .values()
                .filter_map(|cells| cells.get(date).copied())
                .collect();
            if !values.is_empty() {
                averages.insert(date.clone(), values.iter().sum::<f64>() / values.len() as f64);
            }
        }
        rows.push(TrendRow {
            entity_key: AVERAGE_ROW_KEY.to_string(),
            display_label: String::new(),
            cells: averages,
        });

        TrendReport { dates, rows }
    }
}

/// Extract the `YYYY-MM-DD` date token from a snapshot source name.
pub fn date_from_name(name: &str) -> Option<String> {
    NAME_DATE_TOKEN
        .captures(name)
        .map(|caps| caps[1].to_string())
}

/// Keep the [`MAX_SNAPSHOTS`] most recent sources by date key, oldest
/// first.
pub fn select_latest<H>(mut dated: Vec<(H, String)>) -> Vec<(H, String)> {
    dated.sort_by(|a, b| a.1.cmp(&b.1));
    let keep_from = dated.len().saturating_sub(MAX_SNAPSHOTS);
    dated.split_off(keep_from)
}

/// Whether a file was created within the recency window.
///
/// Creation time falls back to modification time on filesystems that do
/// not record it.
pub fn created_recently(path: &Path, window_days: i64, now: DateTime<Utc>) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(created) = metadata.created().or_else(|_| metadata.modified()) else {
        return false;
    };
    let created: DateTime<Utc> = created.into();
    (now - created).num_days() <= window_days
}

/// Read one snapshot file into points for `date_key`.
///
/// Expects `Serial Number`, `Computer Name` and `Failed Checks` columns;
/// rows whose failed count does not parse are skipped.
pub fn read_snapshot_file(path: &Path, date_key: &str) -> anyhow::Result<Vec<SnapshotPoint>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let table = Table::parse(&text);

    let (Some(serial_col), Some(name_col), Some(failed_col)) = (
        table.column("Serial Number"),
        table.column("Computer Name"),
        table.column("Failed Checks"),
    ) else {
        bail!(
            "snapshot {} must include 'Serial Number', 'Computer Name' and 'Failed Checks' columns",
            path.display()
        );
    };

    let mut points = Vec::new();
    for row in &table.rows {
        let serial = table.cell(row, serial_col).trim();
        if serial.is_empty() {
            continue;
        }
        let Ok(failure_count) = table.cell(row, failed_col).trim().parse::<f64>() else {
            continue;
        };
        points.push(SnapshotPoint {
            entity_key: serial.to_string(),
            display_label: table.cell(row, name_col).trim().to_string(),
            date_key: date_key.to_string(),
            failure_count,
        });
    }
    Ok(points)
}
