use log::{info, warn};
use std::collections::HashMap;
use std::time::Instant;

use super::run_bounded;
use crate::common::{
    format_elapsed, is_placeholder, CitationUnit, CitingRecord, MatchStatus, Omission,
    Publication, StageOutput,
};
use crate::service::{CitationService, Outcome, RetryPolicy};

pub const STAGE: &str = "citations";
pub const RECONCILE_STAGE: &str = "reconciliation";

/// Author-less record standing in for a publication nobody cites
pub fn placeholder_record(cited_title: &str) -> CitingRecord {
    CitingRecord::placeholder(cited_title)
}

enum UnitResult {
    Records(Vec<CitingRecord>),
    Failed(Omission),
}

async fn resolve_unit(
    service: &dyn CitationService,
    unit: &CitationUnit,
    policy: &RetryPolicy,
) -> UnitResult {
    let Some(group_id) = unit.group_id.as_deref() else {
        return UnitResult::Records(Vec::new());
    };

    let label = format!("citations of '{}' (group {})", unit.cited_title, group_id);
    match policy
        .run(&label, || service.citing_records_for(group_id, &unit.cited_title))
        .await
    {
        Outcome::Done(records) => UnitResult::Records(records),
        Outcome::NotFound => UnitResult::Records(Vec::new()),
        Outcome::Failed(e) => UnitResult::Failed(Omission::new(
            STAGE,
            &format!("{} ({})", unit.cited_title, group_id),
            &e,
        )),
    }
}

/// List the citing papers of every publication across the worker pool.
///
/// Each (group id, cited title) pair is one unit of work. Records come back
/// grouped by publication in discovery order, each group in the service's
/// enumeration order. A publication with no citing papers at all is kept as a
/// single placeholder record; one whose listing failed after every retry
/// contributes nothing and is reported as an omission.
pub async fn resolve_citations(
    service: &dyn CitationService,
    publications: &[Publication],
    policy: &RetryPolicy,
    workers: usize,
) -> StageOutput<CitingRecord> {
    let start = Instant::now();

    let units: Vec<(usize, CitationUnit)> = publications
        .iter()
        .enumerate()
        .flat_map(|(index, publication)| {
            publication
                .citation_units()
                .into_iter()
                .map(move |unit| (index, unit))
        })
        .collect();
    info!(
        "Resolving citations for {} publications ({} citation groups)",
        publications.len(),
        units.iter().filter(|(_, u)| u.group_id.is_some()).count()
    );

    let results = run_bounded(units, workers, "citation groups", |_, (index, unit)| async move {
        (index, resolve_unit(service, &unit, policy).await)
    })
    .await;

    let mut per_publication: Vec<(Vec<CitingRecord>, bool)> =
        vec![(Vec::new(), false); publications.len()];
    let mut omissions = Vec::new();
    for (index, result) in results {
        match result {
            UnitResult::Records(records) => per_publication[index].0.extend(records),
            UnitResult::Failed(omission) => {
                warn!("Dropped {}: {}", omission.unit, omission.reason);
                per_publication[index].1 = true;
                omissions.push(omission);
            }
        }
    }

    let mut records = Vec::new();
    for (publication, (found, failed)) in publications.iter().zip(per_publication) {
        if found.is_empty() && !failed {
            records.push(placeholder_record(&publication.title));
        } else {
            records.extend(found);
        }
    }

    info!(
        "Citation resolution complete: {} citing records, {} omitted units in {}",
        records.len(),
        omissions.len(),
        format_elapsed(start.elapsed())
    );
    StageOutput::new(records, omissions)
}

/// Repair records whose author ids and names disagree.
///
/// Every unmatched record is padded so each name has an id slot, each empty
/// slot with a name is looked up by name (once per distinct name), and the
/// match status is recomputed. Names nobody resolves stay "NA".
pub async fn reconcile_records(
    service: &dyn CitationService,
    mut records: Vec<CitingRecord>,
    policy: &RetryPolicy,
    workers: usize,
) -> StageOutput<CitingRecord> {
    let unmatched_before = records
        .iter()
        .filter(|r| r.match_status == MatchStatus::Unmatched)
        .count();
    if unmatched_before == 0 {
        return StageOutput::new(records, Vec::new());
    }

    let start = Instant::now();
    info!("Reconciling {} unmatched citing records", unmatched_before);

    // slots[name] -> (record, position) pairs waiting on that name
    let mut names: Vec<String> = Vec::new();
    let mut slots: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    for (index, record) in records.iter_mut().enumerate() {
        if record.match_status != MatchStatus::Unmatched {
            continue;
        }
        record.align_ids_to_names();
        for position in 0..record.author_ids.len() {
            if !is_placeholder(&record.author_ids[position]) {
                continue;
            }
            let Some(name) = record.author_name_at(position) else {
                continue;
            };
            let name = name.to_string();
            slots
                .entry(name.clone())
                .or_insert_with(|| {
                    names.push(name.clone());
                    Vec::new()
                })
                .push((index, position));
        }
    }

    let lookups = run_bounded(names.clone(), workers, "author names", |_, name| async move {
        let label = format!("author name '{}'", name);
        match policy.run(&label, || service.find_author_id(&name)).await {
            Outcome::Done(id) if !is_placeholder(&id) => (Some(id), None),
            Outcome::Done(_) | Outcome::NotFound => (None, None),
            Outcome::Failed(e) => (None, Some(Omission::new(RECONCILE_STAGE, &name, &e))),
        }
    })
    .await;

    let mut omissions = Vec::new();
    let mut resolved_names = 0;
    let mut resolved_slots = 0;
    for (name, (id, omission)) in names.iter().zip(lookups) {
        omissions.extend(omission);
        let Some(id) = id else { continue };
        resolved_names += 1;
        for &(index, position) in slots.get(name).into_iter().flatten() {
            records[index].author_ids[position] = id.clone();
            resolved_slots += 1;
        }
    }

    for record in records.iter_mut() {
        record.refresh_match_status();
    }
    let unmatched_after = records
        .iter()
        .filter(|r| r.match_status == MatchStatus::Unmatched)
        .count();

    info!(
        "Reconciliation complete: {} of {} distinct names resolved ({} slots), unmatched {} -> {} in {}",
        resolved_names,
        names.len(),
        resolved_slots,
        unmatched_before,
        unmatched_after,
        format_elapsed(start.elapsed())
    );
    StageOutput::new(records, omissions)
}
