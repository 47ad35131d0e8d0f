//! Baseline requests and catalog resolution.
//!
//! Administrators name the titles they care about in a file (or pick them
//! interactively); the backend only understands catalog identifiers. This
//! module reads requests, resolves them against the catalog by
//! case-insensitive title match, and applies the global default baseline
//! to whatever is still floorless. Unresolvable names are warnings, not
//! errors: the run proceeds with the subset that resolves.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, bail};
use tracing::{debug, warn};

use crate::model::{BaselineSelection, TrackedItem};
use crate::tabular::Table;

/// A baseline request as read from a file or picker, not yet attached to a
/// catalog identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineRequest {
    pub title: String,

    /// Requested minimum version; empty means no floor.
    pub min_version: String,
}

/// Read baseline requests from a titles file.
///
/// A `.csv` file must carry a `title` header column and may carry
/// `min_version` (blank cell means no floor). Any other extension is
/// treated as a plain newline list of titles with no baselines.
pub fn read_requests_file(path: &Path) -> anyhow::Result<Vec<BaselineRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading titles file {}", path.display()))?;

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        parse_requests_csv(&text)
    } else {
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| BaselineRequest {
                title: line.to_string(),
                min_version: String::new(),
            })
            .collect())
    }
}

fn parse_requests_csv(text: &str) -> anyhow::Result<Vec<BaselineRequest>> {
    let table = Table::parse(text);

    let Some(title_col) = table.column("title") else {
        bail!("titles file must include a 'title' column; 'min_version' is optional");
    };
    let min_version_col = table.column("min_version");

    let mut requests = Vec::new();
    for row in &table.rows {
        let title = table.cell(row, title_col).trim();
        if title.is_empty() {
            continue;
        }
        let min_version = min_version_col
            .map(|col| table.cell(row, col).trim().to_string())
            .unwrap_or_default();

        requests.push(BaselineRequest {
            title: title.to_string(),
            min_version,
        });
    }
    Ok(requests)
}

/// Resolve requests against the catalog by case-insensitive exact title
/// match.
///
/// Unresolvable titles are logged and skipped. The result holds at most
/// one selection per identifier; later duplicates are dropped.
pub fn resolve_requests(
    catalog: &[TrackedItem],
    requests: &[BaselineRequest],
) -> Vec<BaselineSelection> {
    let by_name: HashMap<String, &TrackedItem> = catalog
        .iter()
        .map(|item| (item.title.to_lowercase(), item))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut resolved = Vec::new();

    for request in requests {
        let Some(item) = by_name.get(&request.title.to_lowercase()) else {
            warn!(title = %request.title, "title not found in catalog, skipping");
            continue;
        };
        if !seen.insert(item.id.clone()) {
            debug!(title = %request.title, id = %item.id, "duplicate selection, keeping first");
            continue;
        }
        resolved.push(BaselineSelection {
            id: item.id.clone(),
            title: item.title.clone(),
            min_version: request.min_version.clone(),
        });
    }

    resolved
}

/// The full-catalog default: every tracked item, no floor.
pub fn selections_from_catalog(catalog: &[TrackedItem]) -> Vec<BaselineSelection> {
    catalog
        .iter()
        .map(|item| BaselineSelection {
            id: item.id.clone(),
            title: item.title.clone(),
            min_version: String::new(),
        })
        .collect()
}

/// Fill the global default baseline into selections that are still
/// floorless. Explicit non-empty baselines are never overwritten.
pub fn apply_global_default(selections: &mut [BaselineSelection], default_min_version: &str) {
    let default_min_version = default_min_version.trim();
    if default_min_version.is_empty() {
        return;
    }

    for selection in selections.iter_mut() {
        if !selection.has_baseline() {
            selection.min_version = default_min_version.to_string();
        }
    }
}
