use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use std::time::Instant;

use super::run_bounded;
use crate::common::{format_elapsed, Omission, Publication, StageOutput};
use crate::config::StagePolicies;
use crate::service::{CitationService, Outcome};

pub const STAGE: &str = "discovery";

/// List the researcher's publications once, then fill each one's metadata
/// across the worker pool.
///
/// Only the publication listing is fatal. A publication whose metadata fetch
/// fails is kept as listed, so it still reaches the output.
pub async fn discover_publications(
    service: &dyn CitationService,
    researcher_id: &str,
    policies: &StagePolicies,
    workers: usize,
) -> Result<StageOutput<Publication>> {
    let start = Instant::now();
    info!("Discovering publications for researcher {}", researcher_id);

    let listed = match policies
        .metadata
        .run(&format!("researcher {}", researcher_id), || {
            service.search_publications(researcher_id)
        })
        .await
    {
        Outcome::Done(publications) => publications,
        Outcome::NotFound => bail!("No researcher profile found for '{}'", researcher_id),
        Outcome::Failed(e) => {
            return Err(anyhow!(e).context(format!(
                "Failed to list publications for researcher '{}'",
                researcher_id
            )))
        }
    };
    info!("Found {} publications", listed.len());

    let results = run_bounded(listed, workers, "publications", |_, publication| async move {
        let label = format!("publication '{}'", publication.title);
        match policies
            .metadata
            .run(&label, || service.fill_publication(&publication))
            .await
        {
            Outcome::Done(filled) => (filled, None),
            Outcome::NotFound => (publication, None),
            Outcome::Failed(e) => {
                let omission = Omission::new(STAGE, &publication.title, &e);
                (publication, Some(omission))
            }
        }
    })
    .await;

    let mut publications = Vec::with_capacity(results.len());
    let mut omissions = Vec::new();
    for (publication, omission) in results {
        publications.push(publication);
        omissions.extend(omission);
    }

    for omission in &omissions {
        warn!("Metadata unavailable for '{}': {}", omission.unit, omission.reason);
    }

    let citations: u64 = publications.iter().map(|p| p.citation_count as u64).sum();
    let without_group = publications
        .iter()
        .filter(|p| p.citation_group_ids.is_empty())
        .count();
    info!(
        "Discovery complete: {} publications, {} citations reported, {} without citation group in {}",
        publications.len(),
        citations,
        without_group,
        format_elapsed(start.elapsed())
    );

    Ok(StageOutput::new(publications, omissions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::MockService;

    #[tokio::test]
    async fn test_failed_fill_keeps_publication() {
        let service = MockService::new()
            .with_publication("Paper A", &["g1"])
            .with_publication("Paper B", &[])
            .failing_fill("Paper B");

        let output = discover_publications(&service, "r1", &StagePolicies::immediate(2), 4)
            .await
            .unwrap();

        assert_eq!(output.items.len(), 2);
        assert_eq!(output.items[0].citation_group_ids, vec!["g1"]);
        assert_eq!(output.items[1].title, "Paper B");
        assert_eq!(output.omissions.len(), 1);
        assert_eq!(output.omissions[0].unit, "Paper B");
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let service = MockService::new().failing_search();
        let result = discover_publications(&service, "r1", &StagePolicies::immediate(2), 4).await;
        assert!(result.is_err());
        assert_eq!(service.calls("search"), 2);
    }
}
