use anyhow::Result;
use log::info;
use std::collections::HashSet;
use std::path::Path;

use citation_geomap::cache::load_citing_records;
use citation_geomap::common::{setup_logging, MatchStatus};

use crate::cli::InspectCacheArgs;

pub fn run_inspect_cache(args: InspectCacheArgs) -> Result<()> {
    setup_logging(&args.log_level)?;

    let records = load_citing_records(Path::new(&args.input), args.skip_authorless)?;

    let placeholders = records.iter().filter(|r| r.is_placeholder()).count();
    let unmatched = records
        .iter()
        .filter(|r| r.match_status == MatchStatus::Unmatched)
        .count();
    let author_slots: usize = records.iter().map(|r| r.author_slots()).sum();
    let resolved_ids: usize = records.iter().map(|r| r.resolved_id_count()).sum();
    let cited: HashSet<&str> = records.iter().map(|r| r.cited_title.as_str()).collect();
    let with_year = records.iter().filter(|r| r.citing_year.is_some()).count();

    info!("==================== CACHE SUMMARY ====================");
    info!("File: {}", args.input);
    info!("Citing records: {}", records.len());
    info!("Cited publications: {}", cited.len());
    info!("Placeholder records: {}", placeholders);
    info!("Author slots: {} ({} with ids)", author_slots, resolved_ids);
    info!("Match status: {} matched, {} unmatched", records.len() - unmatched, unmatched);
    info!("Records with citing year: {}", with_year);
    info!("========================================================");

    Ok(())
}
