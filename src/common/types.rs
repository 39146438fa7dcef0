use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel for "looked up, nothing found" in output rows
pub const UNKNOWN: &str = "unknown";

/// Placeholder the search service uses for authors without a profile id
pub const NOT_AVAILABLE: &str = "NA";

/// True when an author id or name slot carries no usable value
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
}

/// A publication in the researcher's corpus. The title is its identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    /// Service-specific id used to fetch full metadata (may be absent)
    pub source_id: Option<String>,
    /// Citation-group ids; more than one when the service merged versions
    pub citation_group_ids: Vec<String>,
    pub citation_count: u32,
}

impl Publication {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            source_id: None,
            citation_group_ids: Vec::new(),
            citation_count: 0,
        }
    }

    /// Expand into citation-resolution units, one per group id.
    /// A publication without any group id still yields one unit.
    pub fn citation_units(&self) -> Vec<CitationUnit> {
        if self.citation_group_ids.is_empty() {
            return vec![CitationUnit {
                group_id: None,
                cited_title: self.title.clone(),
            }];
        }
        self.citation_group_ids
            .iter()
            .map(|id| CitationUnit {
                group_id: Some(id.clone()),
                cited_title: self.title.clone(),
            })
            .collect()
    }
}

/// One (citation-group-id, cited-title) pair handed to the citation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationUnit {
    pub group_id: Option<String>,
    pub cited_title: String,
}

/// Whether a citing record's author ids line up with its author names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Unmatched,
}

impl MatchStatus {
    /// Matched iff the non-placeholder id count equals the non-placeholder name count.
    /// Records without a name list have nothing to compare against.
    pub fn evaluate(author_ids: &[String], author_names: Option<&[String]>) -> Self {
        let Some(names) = author_names else {
            return MatchStatus::Matched;
        };
        let ids = author_ids.iter().filter(|id| !is_placeholder(id)).count();
        let names = names.iter().filter(|name| !is_placeholder(name)).count();
        if ids == names {
            MatchStatus::Matched
        } else {
            MatchStatus::Unmatched
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "matched" => Ok(MatchStatus::Matched),
            "unmatched" => Ok(MatchStatus::Unmatched),
            other => Err(format!("unknown match status '{}'", other)),
        }
    }
}

/// A paper citing one of the researcher's publications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitingRecord {
    /// Positionally aligned with `author_names` when both are present
    pub author_ids: Vec<String>,
    pub citing_title: String,
    pub cited_title: String,
    pub author_names: Option<Vec<String>>,
    pub citing_year: Option<String>,
    pub match_status: MatchStatus,
}

impl CitingRecord {
    pub fn new(
        author_ids: Vec<String>,
        citing_title: &str,
        cited_title: &str,
        author_names: Option<Vec<String>>,
    ) -> Self {
        let mut record = Self {
            author_ids,
            citing_title: citing_title.to_string(),
            cited_title: cited_title.to_string(),
            author_names,
            citing_year: None,
            match_status: MatchStatus::Matched,
        };
        record.refresh_match_status();
        record
    }

    /// Author-less record keeping an uncited publication visible downstream
    pub fn placeholder(cited_title: &str) -> Self {
        Self::new(Vec::new(), "", cited_title, None)
    }

    pub fn with_year(mut self, year: Option<String>) -> Self {
        self.citing_year = year;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.author_ids.is_empty()
            && self.citing_title.is_empty()
            && self.author_names.as_ref().map_or(true, |n| n.is_empty())
    }

    pub fn resolved_id_count(&self) -> usize {
        self.author_ids.iter().filter(|id| !is_placeholder(id)).count()
    }

    pub fn resolved_name_count(&self) -> usize {
        self.author_names
            .as_ref()
            .map_or(0, |names| names.iter().filter(|n| !is_placeholder(n)).count())
    }

    pub fn refresh_match_status(&mut self) {
        self.match_status = MatchStatus::evaluate(&self.author_ids, self.author_names.as_deref());
    }

    /// Pad the id list with placeholders so every name has an id slot
    pub fn align_ids_to_names(&mut self) {
        if let Some(names) = &self.author_names {
            while self.author_ids.len() < names.len() {
                self.author_ids.push(NOT_AVAILABLE.to_string());
            }
        }
    }

    /// Number of author slots (ids or names, whichever is longer)
    pub fn author_slots(&self) -> usize {
        let names = self.author_names.as_ref().map_or(0, |n| n.len());
        self.author_ids.len().max(names)
    }

    /// Display name for the author at `position`, if the record carries one
    pub fn author_name_at(&self, position: usize) -> Option<&str> {
        self.author_names
            .as_ref()
            .and_then(|names| names.get(position))
            .map(|name| name.trim())
            .filter(|name| !is_placeholder(name))
    }
}

/// One author's raw affiliation for one (citing, cited) pair.
/// After normalization `affiliation` holds a single cleaned segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffiliationRecord {
    pub author_id: String,
    pub author_name: String,
    pub citing_title: String,
    pub cited_title: String,
    pub affiliation: String,
}

impl AffiliationRecord {
    pub fn join_key(&self) -> JoinKey {
        JoinKey::new(&self.author_id, &self.citing_title, &self.cited_title)
    }

    pub fn with_affiliation(&self, affiliation: &str) -> Self {
        Self {
            affiliation: affiliation.to_string(),
            ..self.clone()
        }
    }
}

/// (author identity, citing title, cited title)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey {
    pub author_id: String,
    pub citing_title: String,
    pub cited_title: String,
}

impl JoinKey {
    pub fn new(author_id: &str, citing_title: &str, cited_title: &str) -> Self {
        Self {
            author_id: author_id.to_string(),
            citing_title: citing_title.to_string(),
            cited_title: cited_title.to_string(),
        }
    }
}

/// Coordinates returned by forward geocoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Administrative fields recovered by reverse geocoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub county: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Geocoding result shared by every record naming the same affiliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub coordinates: Coordinates,
    pub address: Address,
}

/// Unique cleaned affiliation -> location. `None` marks a string the geocoder
/// answered "not found" for, as opposed to one never looked up.
pub type GeoTable = BTreeMap<String, Option<GeoLocation>>;

/// Author profile as exposed by the search service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorProfile {
    pub author_id: String,
    pub name: Option<String>,
    /// Free-text affiliation line from the profile
    pub affiliation: Option<String>,
    /// Structured organization name, when the service exposes one
    pub organization: Option<String>,
}

/// Final aggregate row handed to renderers and exporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub author_name: String,
    pub author_id: String,
    pub match_status: MatchStatus,
    pub citing_year: String,
    pub citing_paper: String,
    pub cited_paper: String,
    pub affiliation: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub county: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl CitationEntry {
    pub fn has_affiliation(&self) -> bool {
        self.affiliation != UNKNOWN
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A unit of work that was dropped after its retries ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Omission {
    pub stage: &'static str,
    pub unit: String,
    pub reason: String,
}

impl Omission {
    pub fn new(stage: &'static str, unit: &str, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Stage result: whatever could be resolved, plus the log of omitted units
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub items: Vec<T>,
    pub omissions: Vec<Omission>,
}

impl<T> StageOutput<T> {
    pub fn new(items: Vec<T>, omissions: Vec<Omission>) -> Self {
        Self { items, omissions }
    }
}
