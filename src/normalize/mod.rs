//! Best-effort cleanup of free-text affiliation lines.
//!
//! One raw line can name several institutions ("X; Y", "X and Y") and often
//! carries role text ("Professor at X"). Normalization splits, strips and
//! filters; it never tries to resolve institutions to canonical entities.

mod countries;

pub use countries::is_country;

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;

use crate::common::AffiliationRecord;

lazy_static! {
    // Semicolons and the standalone word "and" separate institutions
    static ref CANDIDATE_SEPARATOR: Regex = Regex::new(r"[;]|\band\b").unwrap();

    // ASCII and full-width commas
    static ref COMMA_SEPARATOR: Regex = Regex::new(r"[,，]").unwrap();

    // Everything up to and including an "at" word or "@"
    static ref ROLE_PREFIX: Regex = Regex::new(r"(?i).*?\bat\b|.*?@").unwrap();

    // Segments naming a person's role rather than an institution
    static ref IDENTITY_MARKERS: Regex = Regex::new(
        r"(?i)\b(director|manager|chair|engineer|programmer|scientist|professor|lecturer|phd|ph\.d|postdoc|doctor|student|department of)\b"
    ).unwrap();
}

/// Remove role/email prefixes: "Researcher at X" -> "X", "jane@x.edu" -> "x.edu"
pub fn strip_role_prefix(text: &str) -> String {
    ROLE_PREFIX.replace_all(text, "").trim().to_string()
}

// Only the first prefix, so institutions after it survive the comma split
fn strip_leading_role(text: &str) -> String {
    ROLE_PREFIX.replace(text, "").trim().to_string()
}

pub fn is_identity_marker(text: &str) -> bool {
    IDENTITY_MARKERS.is_match(text)
}

/// Split on commas, keeping a trailing country attached to the entity before it.
/// A country with nothing in front of it is dropped.
pub fn country_aware_split(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut pieces = COMMA_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .peekable();

    while let Some(piece) = pieces.next() {
        if is_country(piece) {
            continue;
        }
        match pieces.peek() {
            Some(next) if is_country(next) => {
                segments.push(format!("{}, {}", piece, next));
                pieces.next();
            }
            _ => segments.push(piece.to_string()),
        }
    }

    segments
}

/// Normalize one raw affiliation line into zero or more institution strings.
///
/// The leading role prefix of each semicolon/"and" candidate is removed before
/// the comma split, so a person name in front ("Jane Doe, Professor at MIT")
/// goes with it. Later segments lose their own prefixes after the split.
pub fn normalize_affiliation(raw: &str) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();

    for candidate in CANDIDATE_SEPARATOR.split(raw) {
        let candidate = strip_leading_role(candidate.trim());
        if candidate.is_empty() {
            continue;
        }

        for segment in country_aware_split(&candidate) {
            let segment = strip_role_prefix(&segment);
            if segment.is_empty() || is_identity_marker(&segment) {
                continue;
            }
            if !cleaned.contains(&segment) {
                cleaned.push(segment);
            }
        }
    }

    cleaned
}

/// Normalize every record, emitting one record per cleaned segment.
/// Records whose affiliation is entirely role text disappear.
pub fn normalize_records(records: &[AffiliationRecord]) -> Vec<AffiliationRecord> {
    records
        .par_iter()
        .flat_map_iter(|record| {
            normalize_affiliation(&record.affiliation)
                .into_iter()
                .map(move |affiliation| record.with_affiliation(&affiliation))
        })
        .collect()
}
