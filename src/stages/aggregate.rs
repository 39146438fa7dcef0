use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::LocatedAffiliation;
use crate::common::{CitationEntry, CitingRecord, JoinKey, MatchStatus, NOT_AVAILABLE, UNKNOWN};

/// One citing author of one record, before any affiliation work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickRow {
    pub author_id: String,
    pub author_name: String,
    pub match_status: MatchStatus,
    pub citing_year: String,
    pub citing_title: String,
    pub cited_title: String,
}

impl QuickRow {
    pub fn join_key(&self) -> JoinKey {
        JoinKey::new(&self.author_id, &self.citing_title, &self.cited_title)
    }
}

/// Explode citing records into one row per author slot.
///
/// A record with no author slot at all still yields one row so its cited
/// paper stays visible.
pub fn quick_path_rows(records: &[CitingRecord]) -> Vec<QuickRow> {
    let mut rows = Vec::new();

    for record in records {
        let citing_year = record
            .citing_year
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());
        let row = |author_id: String, author_name: String| QuickRow {
            author_id,
            author_name,
            match_status: record.match_status,
            citing_year: citing_year.clone(),
            citing_title: record.citing_title.clone(),
            cited_title: record.cited_title.clone(),
        };

        let slots = record.author_slots();
        if slots == 0 {
            rows.push(row(UNKNOWN.to_string(), UNKNOWN.to_string()));
            continue;
        }
        for position in 0..slots {
            let author_id = record
                .author_ids
                .get(position)
                .map(|id| id.trim().to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            let author_name = record
                .author_name_at(position)
                .unwrap_or(UNKNOWN)
                .to_string();
            rows.push(row(author_id, author_name));
        }
    }
    rows
}

fn text_or_unknown(value: Option<&String>) -> String {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Left-join the quick path against the resolved affiliations.
///
/// Every quick-path row produces exactly one entry. Among several affiliation
/// candidates for the same author and paper pair, the first located one wins,
/// then the first unlocated one; rows with no candidate carry "unknown".
pub fn aggregate(records: &[CitingRecord], affiliations: &[LocatedAffiliation]) -> Vec<CitationEntry> {
    let mut slow_path: HashMap<JoinKey, Vec<&LocatedAffiliation>> = HashMap::new();
    for located in affiliations {
        slow_path
            .entry(located.record.join_key())
            .or_default()
            .push(located);
    }

    let entries: Vec<CitationEntry> = quick_path_rows(records)
        .into_iter()
        .map(|row| {
            let candidate = slow_path.get(&row.join_key()).and_then(|candidates| {
                candidates
                    .iter()
                    .find(|c| c.location.is_some())
                    .or_else(|| candidates.first())
                    .copied()
            });

            let author_name = match (row.author_name.as_str(), candidate) {
                (UNKNOWN, Some(c)) => c.record.author_name.clone(),
                _ => row.author_name.clone(),
            };
            let affiliation = candidate
                .map(|c| c.record.affiliation.clone())
                .unwrap_or_else(|| UNKNOWN.to_string());
            let location = candidate.and_then(|c| c.location.as_ref());
            let address = location.map(|l| &l.address);

            CitationEntry {
                author_name,
                author_id: row.author_id,
                match_status: row.match_status,
                citing_year: row.citing_year,
                citing_paper: row.citing_title,
                cited_paper: row.cited_title,
                affiliation,
                latitude: location.map(|l| l.coordinates.latitude),
                longitude: location.map(|l| l.coordinates.longitude),
                county: text_or_unknown(address.and_then(|a| a.county.as_ref())),
                city: text_or_unknown(address.and_then(|a| a.city.as_ref())),
                state: text_or_unknown(address.and_then(|a| a.state.as_ref())),
                country: text_or_unknown(address.and_then(|a| a.country.as_ref())),
            }
        })
        .collect();

    info!(
        "Aggregated {} rows from {} citing records and {} affiliation records",
        entries.len(),
        records.len(),
        affiliations.len()
    );
    entries
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub rows_with_affiliation: usize,
    pub rows_with_coordinates: usize,
    /// Distinct (citing, cited) pairs per match status
    pub matched_records: usize,
    pub unmatched_records: usize,
    /// Rows per country, most frequent first
    pub countries: Vec<(String, usize)>,
}

impl RunSummary {
    pub fn from_entries(entries: &[CitationEntry]) -> Self {
        let mut matched = BTreeSet::new();
        let mut unmatched = BTreeSet::new();
        let mut countries: BTreeMap<&str, usize> = BTreeMap::new();

        for entry in entries {
            let pair = (entry.citing_paper.as_str(), entry.cited_paper.as_str());
            match entry.match_status {
                MatchStatus::Matched => matched.insert(pair),
                MatchStatus::Unmatched => unmatched.insert(pair),
            };
            let country = entry.country.trim();
            if !country.is_empty() && country != UNKNOWN {
                *countries.entry(country).or_default() += 1;
            }
        }

        let mut countries: Vec<(String, usize)> = countries
            .into_iter()
            .map(|(country, count)| (country.to_string(), count))
            .collect();
        countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            rows: entries.len(),
            rows_with_affiliation: entries.iter().filter(|e| e.has_affiliation()).count(),
            rows_with_coordinates: entries.iter().filter(|e| e.has_coordinates()).count(),
            matched_records: matched.len(),
            unmatched_records: unmatched.len(),
            countries,
        }
    }

    pub fn log(&self) {
        let percent = |part: usize| {
            if self.rows == 0 {
                0.0
            } else {
                part as f64 / self.rows as f64 * 100.0
            }
        };
        info!("Total rows: {}", self.rows);
        info!(
            "Rows with affiliation: {} ({:.1}%)",
            self.rows_with_affiliation,
            percent(self.rows_with_affiliation)
        );
        info!(
            "Rows with coordinates: {} ({:.1}%)",
            self.rows_with_coordinates,
            percent(self.rows_with_coordinates)
        );
        info!(
            "Citing records: {} matched, {} unmatched",
            self.matched_records, self.unmatched_records
        );
        if !self.countries.is_empty() {
            info!("Citing authors by country ({} countries):", self.countries.len());
            for (country, count) in &self.countries {
                info!("  {}: {} ({:.1}%)", country, count, percent(*count));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Address, AffiliationRecord, Coordinates, GeoLocation};
    use crate::stages::testing::record;

    fn located(author: &str, citing: &str, text: &str, country: Option<&str>) -> LocatedAffiliation {
        LocatedAffiliation {
            record: AffiliationRecord {
                author_id: author.to_string(),
                author_name: format!("{} (profile)", author),
                citing_title: citing.to_string(),
                cited_title: "Cited".to_string(),
                affiliation: text.to_string(),
            },
            location: country.map(|c| GeoLocation {
                coordinates: Coordinates {
                    latitude: 1.0,
                    longitude: 2.0,
                },
                address: Address {
                    country: Some(c.to_string()),
                    ..Default::default()
                },
            }),
        }
    }

    #[test]
    fn test_quick_path_explodes_slots() {
        let records = vec![
            record(&["a1", "NA"], "C1", "Cited", &["Alice", "Bob", "Carol"]),
            CitingRecord::placeholder("Lonely"),
        ];
        let rows = quick_path_rows(&records);

        let ids: Vec<&str> = rows.iter().map(|r| r.author_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "NA", "NA", UNKNOWN]);
        assert_eq!(rows[2].author_name, "Carol");
        assert_eq!(rows[3].cited_title, "Lonely");
        assert_eq!(rows[3].citing_year, UNKNOWN);
    }

    #[test]
    fn test_aggregate_keeps_every_quick_row() {
        let records = vec![
            record(&["a1", "b1", "NA"], "C1", "Cited", &["Alice", "Bob", "Carol"]),
            CitingRecord::placeholder("Lonely"),
        ];
        let affiliations = vec![
            located("a1", "C1", "Dept. X", None),
            located("a1", "C1", "Stanford, USA", Some("United States")),
            located("b1", "C1", "Nowhere", None),
        ];

        let entries = aggregate(&records, &affiliations);
        assert_eq!(entries.len(), quick_path_rows(&records).len());

        assert_eq!(entries[0].affiliation, "Stanford, USA");
        assert_eq!(entries[0].country, "United States");
        assert_eq!(entries[0].author_name, "Alice");
        assert!(entries[0].has_coordinates());

        assert_eq!(entries[1].affiliation, "Nowhere");
        assert!(!entries[1].has_coordinates());
        assert_eq!(entries[1].country, UNKNOWN);

        assert_eq!(entries[2].affiliation, UNKNOWN);
        assert_eq!(entries[3].cited_paper, "Lonely");
        assert_eq!(entries[3].author_id, UNKNOWN);
    }

    #[test]
    fn test_aggregate_without_affiliations() {
        let records = vec![
            record(&["a1", "b1"], "C1", "Cited", &["Alice", "Bob"]),
            CitingRecord::placeholder("Lonely"),
        ];

        let entries = aggregate(&records, &[]);
        assert_eq!(entries.len(), quick_path_rows(&records).len());
        assert_eq!(entries[1].author_name, "Bob");
        for entry in &entries {
            assert_eq!(entry.affiliation, UNKNOWN);
            assert_eq!(entry.country, UNKNOWN);
            assert!(entry.latitude.is_none());
            assert!(!entry.has_coordinates());
        }
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(&["a1", "b1"], "C1", "Cited", &["Alice", "Bob"]),
            record(&["c1"], "C2", "Cited", &["Carol", "Dan"]),
        ];
        let affiliations = vec![
            located("a1", "C1", "MIT", Some("United States")),
            located("b1", "C1", "ETH", Some("Switzerland")),
            located("c1", "C2", "Harvard", Some("United States")),
        ];
        let summary = RunSummary::from_entries(&aggregate(&records, &affiliations));

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.rows_with_affiliation, 3);
        assert_eq!(summary.rows_with_coordinates, 3);
        assert_eq!(summary.matched_records, 1);
        assert_eq!(summary.unmatched_records, 1);
        assert_eq!(
            summary.countries,
            vec![
                ("United States".to_string(), 2),
                ("Switzerland".to_string(), 1)
            ]
        );
    }
}
