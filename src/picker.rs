//! Interactive title picker.
//!
//! A REPL-style search/filter/select loop for choosing tracked items and
//! entering per-title baselines. The session is a pure state machine
//! driven by command text: the terminal loop in `main` only reads lines
//! and renders [`PickerStep`]s, so every transition is testable without an
//! input stream.
//!
//! Commands in the list phase: empty input re-shows the listing, `?` or
//! `help` prints usage, `done` ends selection, `all` selects everything in
//! the current view, digits and ranges (`1,3-6`) pick rows by number, and
//! anything else narrows the listing to titles containing the text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{BaselineSelection, TrackedItem};

/// Digits, commas, ranges and whitespace: a pick command, not a search.
static NUMERIC_PICKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9,\-\s]+$").expect("valid regex"));

/// Rows shown per listing before asking for a narrower search.
const LISTING_LIMIT: usize = 50;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    /// Viewing the full catalog.
    Browsing,

    /// Viewing a search-narrowed listing.
    Filtered,

    /// At least one row picked, still in the list phase.
    Selecting,

    /// Collecting a baseline version per picked title.
    Confirming,
}

/// What the terminal loop should render next.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerStep {
    /// Show these `(display_number, title)` rows and prompt for a command.
    Listing {
        shown: Vec<(usize, String)>,
        /// Rows matched beyond the listing cap.
        more: usize,
    },

    /// Print command usage.
    Help,

    /// Report how many picks the last command added.
    Added(usize),

    /// Ask for the minimum version of this title (empty input = no floor).
    BaselinePrompt { title: String },

    /// Session over; the deduplicated selections in pick order.
    Finished(Vec<BaselineSelection>),
}

/// One interactive selection session over a catalog.
pub struct PickerSession {
    catalog: Vec<TrackedItem>,
    /// Catalog indexes currently listed.
    view: Vec<usize>,
    /// Catalog indexes picked so far, in pick order.
    picked: Vec<usize>,
    /// Selections being confirmed, with the next prompt index.
    pending: Vec<BaselineSelection>,
    next_prompt: usize,
    state: PickerState,
    done: bool,
}

impl PickerSession {
    pub fn new(catalog: Vec<TrackedItem>) -> Self {
        let view = (0..catalog.len()).collect();
        Self {
            catalog,
            view,
            picked: Vec::new(),
            pending: Vec::new(),
            next_prompt: 0,
            state: PickerState::Browsing,
            done: false,
        }
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    /// The current listing, capped at [`LISTING_LIMIT`] rows.
    pub fn listing(&self) -> PickerStep {
        let shown = self
            .view
            .iter()
            .take(LISTING_LIMIT)
            .enumerate()
            .map(|(i, &idx)| (i + 1, self.catalog[idx].title.clone()))
            .collect();
        let more = self.view.len().saturating_sub(LISTING_LIMIT);
        PickerStep::Listing { shown, more }
    }

    /// Advance the session with one line of input.
    pub fn handle(&mut self, input: &str) -> PickerStep {
        if self.done {
            return PickerStep::Finished(self.pending.clone());
        }
        match self.state {
            PickerState::Confirming => self.confirm(input),
            _ => self.browse(input),
        }
    }

    fn browse(&mut self, input: &str) -> PickerStep {
        let input = input.trim();

        if input.is_empty() {
            return self.listing();
        }
        match input.to_lowercase().as_str() {
            "?" | "help" => return PickerStep::Help,
            "done" => return self.finish_list_phase(),
            "all" => {
                let view = self.view.clone();
                self.picked.extend(view);
                return self.finish_list_phase();
            }
            _ => {}
        }

        if NUMERIC_PICKS.is_match(input) {
            let added = self.add_picks(input);
            if added > 0 {
                self.state = PickerState::Selecting;
            }
            return PickerStep::Added(added);
        }

        // Anything else is a search over the full catalog.
        let query = input.to_lowercase();
        self.view = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, item)| item.title.to_lowercase().contains(&query))
            .map(|(idx, _)| idx)
            .collect();
        self.state = PickerState::Filtered;
        self.listing()
    }

    /// Parse `1,3-6`-style picks against the current view.
    fn add_picks(&mut self, input: &str) -> usize {
        let mut added = 0;
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (lo, hi) = match part.split_once('-') {
                Some((a, b)) => match (a.trim().parse::<usize>(), b.trim().parse::<usize>()) {
                    (Ok(a), Ok(b)) => (a.min(b), a.max(b)),
                    _ => continue,
                },
                None => match part.parse::<usize>() {
                    Ok(n) => (n, n),
                    Err(_) => continue,
                },
            };
            for number in lo..=hi {
                if number >= 1 && number <= self.view.len() {
                    self.picked.push(self.view[number - 1]);
                    added += 1;
                }
            }
        }
        added
    }

    /// Leave the list phase: dedup picks and start confirming baselines.
    fn finish_list_phase(&mut self) -> PickerStep {
        let mut seen = std::collections::HashSet::new();
        self.pending = self
            .picked
            .iter()
            .filter(|&&idx| seen.insert(self.catalog[idx].id.clone()))
            .map(|&idx| BaselineSelection {
                id: self.catalog[idx].id.clone(),
                title: self.catalog[idx].title.clone(),
                min_version: String::new(),
            })
            .collect();

        if self.pending.is_empty() {
            self.done = true;
            return PickerStep::Finished(Vec::new());
        }

        self.state = PickerState::Confirming;
        self.next_prompt = 0;
        PickerStep::BaselinePrompt {
            title: self.pending[0].title.clone(),
        }
    }

    fn confirm(&mut self, input: &str) -> PickerStep {
        self.pending[self.next_prompt].min_version = input.trim().to_string();
        self.next_prompt += 1;

        if self.next_prompt >= self.pending.len() {
            self.done = true;
            return PickerStep::Finished(self.pending.clone());
        }
        PickerStep::BaselinePrompt {
            title: self.pending[self.next_prompt].title.clone(),
        }
    }
}
