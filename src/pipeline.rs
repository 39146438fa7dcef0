//! Stage orchestration with per-researcher cache resume.

use anyhow::{Context, Result};
use log::{info, warn};
use std::time::Instant;
use uuid::Uuid;

use crate::cache::{
    load_affiliations, load_citing_records, load_geocodes, save_affiliations, save_citing_records,
    save_geocodes, CacheStore, Manifest, Stage,
};
use crate::common::{
    format_elapsed, AffiliationRecord, CitationEntry, CitingRecord, GeoTable, MatchStatus,
    Omission,
};
use crate::config::PipelineConfig;
use crate::normalize::normalize_records;
use crate::service::{CitationService, Geocoder};
use crate::stages::{
    aggregate, discover_publications, geocode_affiliations, reconcile_records,
    resolve_affiliations, resolve_citations, RunSummary,
};

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: String,
    pub entries: Vec<CitationEntry>,
    pub summary: RunSummary,
    /// Units dropped after exhausting their retries, across all stages
    pub omissions: Vec<Omission>,
}

/// Cache state for one run; a no-op when caching is disabled
struct RunCache {
    store: Option<CacheStore>,
    manifest: Manifest,
    resume: bool,
}

impl RunCache {
    fn open(config: &PipelineConfig, run_id: &str) -> Result<Self> {
        let store = config
            .cache_dir
            .as_deref()
            .map(|dir| CacheStore::for_researcher(dir, &config.researcher_id));

        let mut manifest = match &store {
            Some(store) if config.resume => store
                .load_manifest()?
                .filter(|m| m.researcher_id == config.researcher_id)
                .unwrap_or_else(|| Manifest::new(run_id, &config.researcher_id)),
            _ => Manifest::new(run_id, &config.researcher_id),
        };
        manifest.run_id = run_id.to_string();

        if manifest.is_complete(Stage::Affiliations)
            && manifest.affiliation_policy != Some(config.policy)
        {
            info!(
                "Cached affiliations used a different policy; resolving again with {}",
                config.policy
            );
            manifest.invalidate_from(Stage::Affiliations);
        }

        if let Some(store) = &store {
            info!("Cache directory: {}", store.dir().display());
            if !manifest.completed.is_empty() {
                info!("Resuming with cached stages: {:?}", manifest.completed);
            }
        }

        Ok(Self {
            store,
            manifest,
            resume: config.resume,
        })
    }

    fn cached_path(&self, stage: Stage) -> Option<std::path::PathBuf> {
        let store = self.store.as_ref()?;
        store
            .has_stage(&self.manifest, stage)
            .then(|| store.stage_path(stage))
    }

    /// The geocode table is keyed by affiliation text, so any previous table
    /// stays valid even when upstream stages were recomputed.
    fn known_geocodes(&self) -> Result<GeoTable> {
        match &self.store {
            Some(store) if self.resume && store.stage_path(Stage::Geocodes).exists() => {
                load_geocodes(&store.stage_path(Stage::Geocodes))
            }
            _ => Ok(GeoTable::new()),
        }
    }

    fn complete<F>(&mut self, stage: Stage, save: F) -> Result<()>
    where
        F: FnOnce(&std::path::Path) -> Result<()>,
    {
        let Some(store) = &self.store else {
            self.manifest.mark_complete(stage);
            return Ok(());
        };
        store.ensure_dir()?;
        save(&store.stage_path(stage))?;
        self.manifest.mark_complete(stage);
        store.save_manifest(&self.manifest)
    }
}

fn banner(step: usize, title: &str) {
    info!("");
    info!("=== STEP {}/4: {} ===", step, title);
    info!("");
}

async fn citation_stage(
    config: &PipelineConfig,
    service: &dyn CitationService,
    omissions: &mut Vec<Omission>,
) -> Result<(usize, Vec<CitingRecord>)> {
    let workers = config.workers;
    let discovered = discover_publications(
        service,
        &config.researcher_id,
        &config.retry,
        workers,
    )
    .await?;
    omissions.extend(discovered.omissions);

    let resolved =
        resolve_citations(service, &discovered.items, &config.retry.citations, workers).await;
    omissions.extend(resolved.omissions);

    let reconciled =
        reconcile_records(service, resolved.items, &config.retry.reconcile, workers).await;
    omissions.extend(reconciled.omissions);

    Ok((discovered.items.len(), reconciled.items))
}

/// Run every stage for `config.researcher_id`.
///
/// With a cache directory, each stage's snapshot is written as soon as the
/// stage finishes and the manifest is updated, so an interrupted run resumes
/// at the first incomplete stage. Only the publication listing can fail the
/// run; every other external failure degrades to an omission.
pub async fn run_pipeline(
    config: &PipelineConfig,
    service: &dyn CitationService,
    geocoder: &dyn Geocoder,
) -> Result<PipelineOutput> {
    config.validate()?;
    let start = Instant::now();
    let run_id = Uuid::new_v4().to_string()[..8].to_string();

    info!("Starting citation enrichment for researcher {}", config.researcher_id);
    info!("Run id: {}", run_id);
    info!("Workers: {}", config.workers);
    info!("Affiliation policy: {}", config.policy);

    let mut cache = RunCache::open(config, &run_id)?;
    let mut omissions = Vec::new();

    banner(1, "Resolving publications and citations");
    let records = match cache.cached_path(Stage::Citations) {
        Some(path) => load_citing_records(&path, config.skip_authorless_cached_rows)
            .context("Failed to load cached citing records")?,
        None => {
            let (publications, records) = citation_stage(config, service, &mut omissions).await?;
            cache.manifest.invalidate_from(Stage::Citations);
            cache.manifest.stats.publications = publications;
            cache.complete(Stage::Citations, |path| save_citing_records(&records, path))?;
            records
        }
    };
    cache.manifest.stats.citing_records = records.len();
    cache.manifest.stats.unmatched_records = records
        .iter()
        .filter(|r| r.match_status == MatchStatus::Unmatched)
        .count();
    info!(
        "{} citing records ({} unmatched)",
        records.len(),
        cache.manifest.stats.unmatched_records
    );

    banner(2, "Resolving citing-author affiliations");
    let raw_affiliations: Vec<AffiliationRecord> = match cache.cached_path(Stage::Affiliations) {
        Some(path) => {
            load_affiliations(&path).context("Failed to load cached affiliations")?
        }
        None => {
            let resolved = resolve_affiliations(
                service,
                &records,
                config.policy,
                &config.retry.authors,
                config.workers,
            )
            .await;
            omissions.extend(resolved.omissions);
            cache.manifest.invalidate_from(Stage::Affiliations);
            cache.manifest.affiliation_policy = Some(config.policy);
            cache.complete(Stage::Affiliations, |path| save_affiliations(&resolved.items, path))?;
            resolved.items
        }
    };
    cache.manifest.stats.affiliations = raw_affiliations.len();

    let cleaned = normalize_records(&raw_affiliations);
    info!(
        "Normalized {} raw affiliations into {} cleaned records",
        raw_affiliations.len(),
        cleaned.len()
    );

    banner(3, "Geocoding affiliations");
    let known = cache.known_geocodes()?;
    let geocoded = geocode_affiliations(geocoder, &cleaned, known, &config.retry.geocode).await;
    omissions.extend(geocoded.omissions);
    cache.manifest.stats.unique_affiliations = geocoded.table.len();
    cache.manifest.stats.located_affiliations =
        geocoded.table.values().filter(|l| l.is_some()).count();
    let table = geocoded.table;
    cache.complete(Stage::Geocodes, |path| save_geocodes(&table, path))?;

    banner(4, "Aggregating results");
    let entries = aggregate(&records, &geocoded.located);
    let summary = RunSummary::from_entries(&entries);

    info!("");
    info!("=== RUN COMPLETE ===");
    summary.log();
    if !omissions.is_empty() {
        warn!("{} units were omitted after exhausting retries", omissions.len());
    }
    info!("Total time: {}", format_elapsed(start.elapsed()));

    Ok(PipelineOutput {
        run_id,
        entries,
        summary,
        omissions,
    })
}
