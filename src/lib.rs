//! Patchlight - fleet software-version compliance reporting.
//!
//! # Overview
//!
//! Patchlight reconciles per-device software-version records from an
//! MDM-style backend against administrator-defined minimum-version
//! baselines and produces plain structured compliance rows for a
//! presentation layer to render.
//!
//! The pipeline runs strictly in sequence: resolve baselines against the
//! catalog, drain each title's paged device report, drop devices outside
//! the activity window, compare installed versions against the baseline
//! floor, and aggregate per-title summaries. When no baselines are
//! requested at all, a fleet-wide active ratio scales the vendor-reported
//! counts instead. Dated snapshot exports from previous cycles merge into
//! a longitudinal trend table.
//!
//! # Modules
//!
//! - [`model`]: Shared domain and wire types
//! - [`version`]: Version normalization and ordering
//! - [`paging`]: Page-envelope coercion and the listing drain loop
//! - [`activity`]: Last-contact parsing and the recency window
//! - [`baseline`]: Baseline files and catalog resolution
//! - [`picker`]: Interactive title selection as a pure state machine
//! - [`client`]: Backend API client and token acquisition
//! - [`report`]: Compliance aggregation for both report modes
//! - [`trend`]: Snapshot merging into the trend table
//! - [`tabular`]: Minimal delimited-text helpers

pub mod activity;
pub mod baseline;
pub mod client;
pub mod model;
pub mod paging;
pub mod picker;
pub mod report;
pub mod tabular;
pub mod trend;
pub mod version;
