use log::{debug, info, warn};
use std::time::Instant;

use super::run_bounded;
use crate::common::{
    format_elapsed, is_placeholder, AffiliationRecord, AuthorProfile, CitingRecord, Omission,
    StageOutput, UNKNOWN,
};
use crate::config::AffiliationPolicy;
use crate::service::{CitationService, Outcome, RetryPolicy};

pub const STAGE: &str = "affiliations";

/// Last comma segment of a free-text affiliation line
fn last_segment(affiliation: &str) -> Option<String> {
    affiliation
        .rsplit(',')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

/// Pick the affiliation string a profile contributes under `policy`
pub fn choose_affiliation(profile: &AuthorProfile, policy: AffiliationPolicy) -> Option<String> {
    if policy == AffiliationPolicy::Conservative {
        let organization = profile
            .organization
            .as_deref()
            .map(str::trim)
            .filter(|org| !org.is_empty());
        if let Some(organization) = organization {
            return Some(organization.to_string());
        }
    }
    profile.affiliation.as_deref().and_then(last_segment)
}

struct AuthorTask<'a> {
    author_id: &'a str,
    aligned_name: Option<&'a str>,
    record: &'a CitingRecord,
}

/// Look up every citing author's profile and turn it into an affiliation record.
///
/// Author slots holding "NA" are skipped. A profile that is not found, has no
/// usable affiliation, or fails every retry contributes nothing; only the
/// exhausted lookups are reported as omissions. Output follows record order,
/// then author position.
pub async fn resolve_affiliations(
    service: &dyn CitationService,
    records: &[CitingRecord],
    policy: AffiliationPolicy,
    retry: &RetryPolicy,
    workers: usize,
) -> StageOutput<AffiliationRecord> {
    let start = Instant::now();

    let tasks: Vec<AuthorTask> = records
        .iter()
        .flat_map(|record| {
            record
                .author_ids
                .iter()
                .enumerate()
                .filter(|(_, id)| !is_placeholder(id))
                .map(move |(position, id)| AuthorTask {
                    author_id: id.trim(),
                    aligned_name: record.author_name_at(position),
                    record,
                })
        })
        .collect();
    info!(
        "Resolving affiliations for {} citing authors ({} policy)",
        tasks.len(),
        policy
    );

    let results = run_bounded(tasks, workers, "citing authors", |_, task| async move {
        let label = format!("author {}", task.author_id);
        match retry.run(&label, || service.author_profile(task.author_id)).await {
            Outcome::Done(profile) => {
                let Some(affiliation) = choose_affiliation(&profile, policy) else {
                    debug!("No affiliation on profile {}", task.author_id);
                    return Ok(None);
                };
                let author_name = task
                    .aligned_name
                    .map(String::from)
                    .or(profile.name)
                    .unwrap_or_else(|| UNKNOWN.to_string());
                Ok(Some(AffiliationRecord {
                    author_id: task.author_id.to_string(),
                    author_name,
                    citing_title: task.record.citing_title.clone(),
                    cited_title: task.record.cited_title.clone(),
                    affiliation,
                }))
            }
            Outcome::NotFound => Ok(None),
            Outcome::Failed(e) => Err(Omission::new(STAGE, task.author_id, &e)),
        }
    })
    .await;

    let mut affiliations = Vec::new();
    let mut omissions = Vec::new();
    for result in results {
        match result {
            Ok(found) => affiliations.extend(found),
            Err(omission) => {
                warn!("No affiliation for author {}: {}", omission.unit, omission.reason);
                omissions.push(omission);
            }
        }
    }

    info!(
        "Affiliation resolution complete: {} affiliation records, {} failed lookups in {}",
        affiliations.len(),
        omissions.len(),
        format_elapsed(start.elapsed())
    );
    StageOutput::new(affiliations, omissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::{record, MockService};

    fn profile(affiliation: Option<&str>, organization: Option<&str>) -> AuthorProfile {
        AuthorProfile {
            author_id: "x".to_string(),
            name: Some("Profile Name".to_string()),
            affiliation: affiliation.map(String::from),
            organization: organization.map(String::from),
        }
    }

    #[test]
    fn test_choose_affiliation_policies() {
        let both = profile(Some("Professor, Dept. of CS, Stanford University"), Some("Stanford"));
        assert_eq!(
            choose_affiliation(&both, AffiliationPolicy::Conservative).as_deref(),
            Some("Stanford")
        );
        assert_eq!(
            choose_affiliation(&both, AffiliationPolicy::Aggressive).as_deref(),
            Some("Stanford University")
        );

        let free_text = profile(Some("MIT"), Some("  "));
        assert_eq!(
            choose_affiliation(&free_text, AffiliationPolicy::Conservative).as_deref(),
            Some("MIT")
        );

        let empty = profile(None, None);
        assert_eq!(choose_affiliation(&empty, AffiliationPolicy::Aggressive), None);
    }

    #[tokio::test]
    async fn test_skips_na_and_tolerates_failures() {
        let service = MockService::new()
            .with_profile("a1", "Alice A", "Researcher, MIT", None)
            .with_profile("c1", "Carol C", "Oxford", Some("University of Oxford"))
            .failing_author("d1");
        let records = vec![
            record(&["a1", "NA", "c1"], "Citing", "Cited", &["Alice", "Bob", "Carol"]),
            record(&["d1", "z1"], "Citing 2", "Cited", &["Dan"]),
        ];

        let output = resolve_affiliations(
            &service,
            &records,
            AffiliationPolicy::Conservative,
            &RetryPolicy::immediate(2),
            4,
        )
        .await;

        let got: Vec<(&str, &str, &str)> = output
            .items
            .iter()
            .map(|a| (a.author_id.as_str(), a.author_name.as_str(), a.affiliation.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![("a1", "Alice", "MIT"), ("c1", "Carol", "University of Oxford")]
        );
        assert_eq!(output.omissions.len(), 1);
        assert_eq!(output.omissions[0].unit, "d1");
        // a1, c1, z1 once each, d1 twice; the NA slot is never looked up
        assert_eq!(service.calls("profile"), 5);
    }

    #[tokio::test]
    async fn test_profile_name_used_without_aligned_name() {
        let service = MockService::new().with_profile("a1", "Alice Profile", "ETH Zurich", None);
        let records = vec![record(&["a1"], "Citing", "Cited", &[])];

        let output = resolve_affiliations(
            &service,
            &records,
            AffiliationPolicy::Aggressive,
            &RetryPolicy::immediate(1),
            1,
        )
        .await;

        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].author_name, "Alice Profile");
    }
}
