use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Instant;

use crate::common::{
    create_count_progress_bar, format_elapsed, AffiliationRecord, GeoLocation, GeoTable, Omission,
};
use crate::service::{Geocoder, Outcome, RetryPolicy};

pub const STAGE: &str = "geocoding";

/// A cleaned affiliation record with whatever location its string resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedAffiliation {
    pub record: AffiliationRecord,
    pub location: Option<GeoLocation>,
}

#[derive(Debug, Clone)]
pub struct GeocodeOutput {
    /// Every string with a definitive answer, including ones already known
    pub table: GeoTable,
    /// One entry per input record, in input order
    pub located: Vec<LocatedAffiliation>,
    pub omissions: Vec<Omission>,
    /// Strings sent to the geocoder during this call
    pub lookups: usize,
}

/// Unique affiliation strings in first-appearance order, each with the
/// indices of the records naming it
pub fn dedup_affiliations(records: &[AffiliationRecord]) -> Vec<(String, Vec<usize>)> {
    let mut order: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let key = record.affiliation.as_str();
        if key.trim().is_empty() {
            continue;
        }
        match positions.get(key) {
            Some(&slot) => order[slot].1.push(index),
            None => {
                positions.insert(key, order.len());
                order.push((key.to_string(), vec![index]));
            }
        }
    }
    order
}

async fn locate(
    geocoder: &dyn Geocoder,
    affiliation: &str,
    policy: &RetryPolicy,
) -> Result<Option<GeoLocation>, Omission> {
    let label = format!("geocode '{}'", affiliation);
    let coordinates = match policy.run(&label, || geocoder.geocode(affiliation)).await {
        Outcome::Done(coordinates) => coordinates,
        Outcome::NotFound => return Ok(None),
        Outcome::Failed(e) => return Err(Omission::new(STAGE, affiliation, &e)),
    };

    let label = format!("reverse geocode '{}'", affiliation);
    let address = match policy.run(&label, || geocoder.reverse(coordinates)).await {
        Outcome::Done(address) => address,
        Outcome::NotFound => Default::default(),
        Outcome::Failed(e) => {
            warn!("Keeping coordinates without address for '{}': {}", affiliation, e);
            Default::default()
        }
    };

    Ok(Some(GeoLocation {
        coordinates,
        address,
    }))
}

/// Geocode each distinct affiliation string exactly once and fan the result
/// out to every record that names it.
///
/// Lookups run strictly one at a time whatever the worker setting, because
/// the geocoding service forbids concurrent bulk requests. Strings already in
/// `known` are not sent again. A string that fails every attempt is left out
/// of the table so a later run retries it; its records stay unlocated.
pub async fn geocode_affiliations(
    geocoder: &dyn Geocoder,
    records: &[AffiliationRecord],
    known: GeoTable,
    policy: &RetryPolicy,
) -> GeocodeOutput {
    let start = Instant::now();
    let unique = dedup_affiliations(records);
    let pending: Vec<&str> = unique
        .iter()
        .map(|(affiliation, _)| affiliation.as_str())
        .filter(|affiliation| !known.contains_key(*affiliation))
        .collect();

    info!(
        "Geocoding {} unique affiliations ({} records, {} already known)",
        unique.len(),
        records.len(),
        unique.len() - pending.len()
    );

    let mut table = known;
    let mut omissions = Vec::new();
    let progress = create_count_progress_bar(pending.len() as u64, "affiliations");

    for affiliation in &pending {
        match locate(geocoder, affiliation, policy).await {
            Ok(location) => {
                if location.is_none() {
                    debug!("No location for '{}'", affiliation);
                }
                table.insert(affiliation.to_string(), location);
            }
            Err(omission) => {
                warn!("Dropped {}: {}", omission.unit, omission.reason);
                omissions.push(omission);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut located: Vec<LocatedAffiliation> = records
        .iter()
        .map(|record| LocatedAffiliation {
            record: record.clone(),
            location: None,
        })
        .collect();
    for (affiliation, indices) in &unique {
        if let Some(Some(location)) = table.get(affiliation) {
            for &index in indices {
                located[index].location = Some(location.clone());
            }
        }
    }

    let found = table.values().filter(|l| l.is_some()).count();
    info!(
        "Geocoding complete: {} lookups, {} of {} strings located in {}",
        pending.len(),
        found,
        table.len(),
        format_elapsed(start.elapsed())
    );

    GeocodeOutput {
        table,
        located,
        omissions,
        lookups: pending.len(),
    }
}
