//! Version string normalization and ordering.
//!
//! Backends report installed versions in whatever form the vendor ships:
//! `129.0.6668.90`, `23.008.20458`, `14.6.1 (18619.1.26.111.1)`, sometimes
//! nothing at all. [`normalize`] strips parenthesized build metadata and
//! whitespace; [`is_at_least`] answers "does this installed version satisfy
//! the baseline floor".
//!
//! Ordering tokenizes each string into maximal digit and letter runs and
//! compares the token sequences lexicographically, with numeric tokens
//! ordering below alpha tokens when the kinds differ. A shorter sequence
//! that is a prefix of a longer one compares as less. This is a deliberate
//! approximation of semantic-version precedence: it agrees with it on
//! purely numeric dotted versions, but pre-release tags such as `-beta` are
//! not ordered below their release counterparts.

use once_cell::sync::Lazy;
use regex::Regex;

/// Parenthesized build-metadata suffixes, e.g. ` (18619.1.26.111.1)`.
static PAREN_METADATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

/// Maximal digit or letter runs; everything else is a separator.
static TOKEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|[A-Za-z]+").expect("valid regex"));

/// One comparable component of a version string.
///
/// Variant order matters: deriving `Ord` places every numeric token below
/// every alpha token, so a number is never compared to a string by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum VersionToken {
    Numeric(u128),
    Alpha(String),
}

/// Strip parenthesized build metadata and surrounding whitespace.
///
/// Idempotent: normalizing an already-normalized string is a no-op.
pub fn normalize(version: &str) -> String {
    let stripped = PAREN_METADATA.replace_all(version.trim(), "");
    stripped.trim().to_string()
}

/// Tokenize a normalized version string into comparable components.
fn tokens(version: &str) -> Vec<VersionToken> {
    TOKEN_RUNS
        .find_iter(version)
        .map(|m| {
            let run = m.as_str();
            match run.parse::<u128>() {
                Ok(n) => VersionToken::Numeric(n),
                // Letter runs, and digit runs too long for u128.
                Err(_) => VersionToken::Alpha(run.to_lowercase()),
            }
        })
        .collect()
}

/// Whether `candidate` satisfies the `baseline` floor.
///
/// An empty baseline means no floor (always true); an empty candidate
/// against a non-empty baseline is never compliant.
pub fn is_at_least(candidate: &str, baseline: &str) -> bool {
    let candidate = normalize(candidate);
    let baseline = normalize(baseline);

    if baseline.is_empty() {
        return true;
    }
    if candidate.is_empty() {
        return false;
    }

    tokens(&candidate) >= tokens(&baseline)
}
