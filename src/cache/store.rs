//! CSV snapshots of stage output.

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::common::{
    split_list, Address, AffiliationRecord, CitingRecord, Coordinates, GeoLocation, GeoTable,
    NOT_AVAILABLE,
};

/// Column layout written for citing records
pub const CITING_HEADERS: [&str; 6] = [
    "source_title",
    "citing_year",
    "citing_title",
    "citing_author_id",
    "citing_author_names",
    "match_status",
];

/// Citing-record cache layouts in the wild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSchema {
    /// source_title, citing_title, citing_author_id ("NA" for none)
    V1,
    /// V1 plus citing_year, citing_author_names and match_status
    V2,
}

impl CacheSchema {
    pub fn detect(headers: &StringRecord) -> Self {
        if headers.iter().any(|h| h.trim() == "citing_author_names") {
            CacheSchema::V2
        } else {
            CacheSchema::V1
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

fn column(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("Cache {} is missing column '{}'", path.display(), name))
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Titles are join keys downstream and must survive a round trip unchanged
fn raw_field<'a>(row: &'a StringRecord, index: Option<usize>) -> &'a str {
    index.and_then(|i| row.get(i)).unwrap_or("")
}

fn field<'a>(row: &'a StringRecord, index: Option<usize>) -> &'a str {
    raw_field(row, index).trim()
}

/// Save citing records in the current (v2) layout
pub fn save_citing_records(records: &[CitingRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create cache file: {}", path.display()))?;

    writer.write_record(CITING_HEADERS)?;
    for record in records {
        let ids = record.author_ids.join(",");
        let names = record
            .author_names
            .as_ref()
            .map(|names| names.join(", "))
            .unwrap_or_default();
        writer.write_record([
            record.cited_title.as_str(),
            record.citing_year.as_deref().unwrap_or(""),
            record.citing_title.as_str(),
            ids.as_str(),
            names.as_str(),
            record.match_status.as_str(),
        ])?;
    }
    writer.flush()?;

    info!("Cached {} citing records to {}", records.len(), path.display());
    Ok(())
}

/// Load citing records from either cache layout.
///
/// V1 writes "NA" for an author-less row. V2 stores a comma-joined id list
/// where an empty field means no ids. Match status is always recomputed.
/// With `skip_authorless`, v2 rows without any author id are dropped.
pub fn load_citing_records(path: &Path, skip_authorless: bool) -> Result<Vec<CitingRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open cache file: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let schema = CacheSchema::detect(&headers);

    let cited = column(&headers, "source_title", path)?;
    let citing = column(&headers, "citing_title", path)?;
    let ids = column(&headers, "citing_author_id", path)?;
    let year = optional_column(&headers, "citing_year");
    let names = optional_column(&headers, "citing_author_names");

    let mut records = Vec::new();
    let mut skipped = 0;

    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| {
            format!("Failed to read row {} of {}", line + 2, path.display())
        })?;

        let raw_ids = field(&row, Some(ids));
        let author_ids = match schema {
            CacheSchema::V1 if raw_ids.eq_ignore_ascii_case(NOT_AVAILABLE) => Vec::new(),
            _ => split_list(raw_ids, ','),
        };

        if schema == CacheSchema::V2 && skip_authorless && author_ids.is_empty() {
            skipped += 1;
            continue;
        }

        let author_names = match field(&row, names) {
            "" => None,
            joined => Some(split_list(joined, ',')),
        };
        let citing_year = match field(&row, year) {
            "" => None,
            value => Some(value.to_string()),
        };

        records.push(
            CitingRecord::new(
                author_ids,
                raw_field(&row, Some(citing)),
                raw_field(&row, Some(cited)),
                author_names,
            )
            .with_year(citing_year),
        );
    }

    if skipped > 0 {
        warn!("Skipped {} cached rows without author ids", skipped);
    }
    info!(
        "Loaded {} citing records ({:?} layout) from {}",
        records.len(),
        schema,
        path.display()
    );
    Ok(records)
}

pub fn save_affiliations(records: &[AffiliationRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create cache file: {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("Cached {} affiliation records to {}", records.len(), path.display());
    Ok(())
}

pub fn load_affiliations(path: &Path) -> Result<Vec<AffiliationRecord>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open cache file: {}", path.display()))?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<AffiliationRecord>, _>>()
        .with_context(|| format!("Failed to parse affiliation cache {}", path.display()))?;

    info!("Loaded {} affiliation records from {}", records.len(), path.display());
    Ok(records)
}

#[derive(Debug, Serialize, Deserialize)]
struct GeocodeRow {
    affiliation: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    county: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl GeocodeRow {
    fn from_entry(affiliation: &str, location: Option<&GeoLocation>) -> Self {
        let address = location.map(|l| l.address.clone()).unwrap_or_default();
        Self {
            affiliation: affiliation.to_string(),
            latitude: location.map(|l| l.coordinates.latitude),
            longitude: location.map(|l| l.coordinates.longitude),
            county: address.county,
            city: address.city,
            state: address.state,
            country: address.country,
        }
    }

    fn into_entry(self) -> (String, Option<GeoLocation>) {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                coordinates: Coordinates { latitude, longitude },
                address: Address {
                    county: self.county,
                    city: self.city,
                    state: self.state,
                    country: self.country,
                },
            }),
            _ => None,
        };
        (self.affiliation, location)
    }
}

/// Save the geocode table; rows without coordinates record a not-found answer
pub fn save_geocodes(table: &GeoTable, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create cache file: {}", path.display()))?;
    for (affiliation, location) in table {
        writer.serialize(GeocodeRow::from_entry(affiliation, location.as_ref()))?;
    }
    writer.flush()?;

    info!("Cached {} geocoded affiliations to {}", table.len(), path.display());
    Ok(())
}

pub fn load_geocodes(path: &Path) -> Result<GeoTable> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open cache file: {}", path.display()))?;

    let mut table = GeoTable::new();
    for row in reader.deserialize::<GeocodeRow>() {
        let (affiliation, location) = row
            .with_context(|| format!("Failed to parse geocode cache {}", path.display()))?
            .into_entry();
        table.insert(affiliation, location);
    }

    info!("Loaded {} geocoded affiliations from {}", table.len(), path.display());
    Ok(table)
}
