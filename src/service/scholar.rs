//! Google Scholar access through a SerpAPI-compatible JSON endpoint.

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::{get_json, CitationService, ServiceError};
use crate::common::{split_list, AuthorProfile, CitingRecord, Publication, NOT_AVAILABLE};

const AUTHOR_PAGE_SIZE: usize = 100;
const SEARCH_PAGE_SIZE: usize = 20;

lazy_static! {
    static ref YEAR_PATTERN: Regex = Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").unwrap();
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitedBy {
    #[serde(alias = "total")]
    value: Option<u32>,
    cites_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    citation_id: Option<String>,
    cited_by: Option<CitedBy>,
}

#[derive(Debug, Deserialize)]
struct AuthorInfo {
    name: Option<String>,
    affiliations: Option<String>,
    organization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorResponse {
    error: Option<String>,
    author: Option<AuthorInfo>,
    #[serde(default)]
    articles: Vec<Article>,
    serpapi_pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct TotalCitations {
    cited_by: Option<CitedBy>,
}

#[derive(Debug, Deserialize)]
struct CitationView {
    total_citations: Option<TotalCitations>,
}

#[derive(Debug, Deserialize)]
struct CitationViewResponse {
    error: Option<String>,
    citation: Option<CitationView>,
}

#[derive(Debug, Deserialize)]
struct LinkedAuthor {
    name: String,
    author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicationInfo {
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<LinkedAuthor>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    publication_info: Option<PublicationInfo>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    serpapi_pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ProfileHit {
    author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfilesResponse {
    error: Option<String>,
    #[serde(default)]
    profiles: Vec<ProfileHit>,
}

/// Map an in-body error message into the taxonomy
fn check_error(error: Option<&str>, context: &str) -> Result<(), ServiceError> {
    match error {
        None => Ok(()),
        Some(message) if message.contains("hasn't returned any results") => {
            Err(ServiceError::not_found(context))
        }
        Some(message) => Err(ServiceError::transient(format!("{} ({})", message, context))),
    }
}

/// Split merged-version group ids ("123,456")
fn split_cites_ids(cites_id: &str) -> Vec<String> {
    split_list(cites_id, ',')
}

/// Parse a result summary like "J Doe, A Smith… - Journal, 2020 - host.org"
/// into author names and publication year.
pub fn parse_summary(summary: &str) -> (Vec<String>, Option<String>) {
    let mut parts = summary.splitn(2, " - ");
    let names = parts
        .next()
        .unwrap_or_default()
        .split(',')
        .map(|name| name.trim().trim_end_matches('…').trim())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();
    let year = parts
        .next()
        .and_then(|rest| YEAR_PATTERN.find(rest))
        .map(|m| m.as_str().to_string());
    (names, year)
}

/// Build a citing record, aligning linked author ids onto the summary's name list
fn citing_record_from_result(result: OrganicResult, cited_title: &str) -> CitingRecord {
    let title = result.title.unwrap_or_default();
    let info = result.publication_info.unwrap_or(PublicationInfo {
        summary: None,
        authors: Vec::new(),
    });

    let (mut names, year) = info
        .summary
        .as_deref()
        .map(parse_summary)
        .unwrap_or_default();
    if names.is_empty() {
        names = info.authors.iter().map(|a| a.name.clone()).collect();
    }

    let ids = names
        .iter()
        .map(|name| {
            info.authors
                .iter()
                .find(|linked| linked.name.eq_ignore_ascii_case(name))
                .and_then(|linked| linked.author_id.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        })
        .collect();

    CitingRecord::new(ids, &title, cited_title, Some(names)).with_year(year)
}

pub struct ScholarClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_pages: usize,
}

impl ScholarClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, max_pages: usize) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            max_pages: max_pages.max(1),
        }
    }

    async fn author_page(&self, author_id: &str, start: usize) -> Result<AuthorResponse, ServiceError> {
        let start = start.to_string();
        let num = AUTHOR_PAGE_SIZE.to_string();
        let response: AuthorResponse = get_json(
            &self.client,
            &self.base_url,
            &[
                ("engine", "google_scholar_author"),
                ("author_id", author_id),
                ("hl", "en"),
                ("start", &start),
                ("num", &num),
                ("api_key", &self.api_key),
            ],
            &format!("author {}", author_id),
        )
        .await?;
        check_error(response.error.as_deref(), &format!("author {}", author_id))?;
        Ok(response)
    }
}

#[async_trait]
impl CitationService for ScholarClient {
    async fn search_publications(&self, researcher_id: &str) -> Result<Vec<Publication>, ServiceError> {
        let mut publications = Vec::new();

        for page in 0..self.max_pages {
            let response = self.author_page(researcher_id, page * AUTHOR_PAGE_SIZE).await?;
            if page == 0 && response.author.is_none() {
                return Err(ServiceError::not_found(format!("researcher {}", researcher_id)));
            }

            let count = response.articles.len();
            for article in response.articles {
                let Some(title) = article.title else { continue };
                let mut publication = Publication::new(&title);
                publication.source_id = article.citation_id;
                if let Some(cited_by) = article.cited_by {
                    publication.citation_count = cited_by.value.unwrap_or(0);
                    if let Some(cites_id) = cited_by.cites_id {
                        publication.citation_group_ids = split_cites_ids(&cites_id);
                    }
                }
                publications.push(publication);
            }

            let has_next = response
                .serpapi_pagination
                .map_or(false, |p| p.next.is_some());
            if count < AUTHOR_PAGE_SIZE && !has_next {
                break;
            }
        }

        Ok(publications)
    }

    async fn fill_publication(&self, publication: &Publication) -> Result<Publication, ServiceError> {
        let Some(citation_id) = publication.source_id.as_deref() else {
            return Ok(publication.clone());
        };
        if !publication.citation_group_ids.is_empty() {
            return Ok(publication.clone());
        }

        let context = format!("publication '{}'", publication.title);
        let response: CitationViewResponse = get_json(
            &self.client,
            &self.base_url,
            &[
                ("engine", "google_scholar_author"),
                ("view_op", "view_citation"),
                ("citation_id", citation_id),
                ("hl", "en"),
                ("api_key", &self.api_key),
            ],
            &context,
        )
        .await?;
        check_error(response.error.as_deref(), &context)?;

        let mut filled = publication.clone();
        if let Some(cited_by) = response
            .citation
            .and_then(|c| c.total_citations)
            .and_then(|t| t.cited_by)
        {
            filled.citation_count = cited_by.value.unwrap_or(filled.citation_count);
            if let Some(cites_id) = cited_by.cites_id {
                filled.citation_group_ids = split_cites_ids(&cites_id);
            }
        }
        Ok(filled)
    }

    async fn citing_records_for(
        &self,
        group_id: &str,
        cited_title: &str,
    ) -> Result<Vec<CitingRecord>, ServiceError> {
        let context = format!("citation group {}", group_id);
        let num = SEARCH_PAGE_SIZE.to_string();
        let mut records = Vec::new();

        for page in 0..self.max_pages {
            let start = (page * SEARCH_PAGE_SIZE).to_string();
            let response: SearchResponse = get_json(
                &self.client,
                &self.base_url,
                &[
                    ("engine", "google_scholar"),
                    ("cites", group_id),
                    ("hl", "en"),
                    ("start", &start),
                    ("num", &num),
                    ("api_key", &self.api_key),
                ],
                &context,
            )
            .await?;

            // Running past the last page is reported as "no results"
            match check_error(response.error.as_deref(), &context) {
                Err(e) if e.is_not_found() && page > 0 => break,
                other => other?,
            }

            let count = response.organic_results.len();
            records.extend(
                response
                    .organic_results
                    .into_iter()
                    .map(|result| citing_record_from_result(result, cited_title)),
            );

            let has_next = response
                .serpapi_pagination
                .map_or(false, |p| p.next.is_some());
            if !has_next || count == 0 {
                break;
            }
        }

        debug!("{}: {} citing papers", context, records.len());
        Ok(records)
    }

    async fn author_profile(&self, author_id: &str) -> Result<AuthorProfile, ServiceError> {
        let response = self.author_page(author_id, 0).await?;
        let author = response
            .author
            .ok_or_else(|| ServiceError::not_found(format!("author {}", author_id)))?;

        Ok(AuthorProfile {
            author_id: author_id.to_string(),
            name: author.name,
            affiliation: author.affiliations,
            organization: author.organization,
        })
    }

    async fn find_author_id(&self, name: &str) -> Result<String, ServiceError> {
        let context = format!("profile search '{}'", name);
        let response: ProfilesResponse = get_json(
            &self.client,
            &self.base_url,
            &[
                ("engine", "google_scholar_profiles"),
                ("mauthors", name),
                ("hl", "en"),
                ("api_key", &self.api_key),
            ],
            &context,
        )
        .await?;
        check_error(response.error.as_deref(), &context)?;

        response
            .profiles
            .into_iter()
            .find_map(|hit| hit.author_id)
            .ok_or_else(|| ServiceError::not_found(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MatchStatus;

    #[test]
    fn test_parse_summary() {
        let (names, year) =
            parse_summary("J Doe, A Smith, B Lee… - Journal of Things, 2021 - example.org");
        assert_eq!(names, vec!["J Doe", "A Smith", "B Lee"]);
        assert_eq!(year.as_deref(), Some("2021"));

        let (names, year) = parse_summary("J Doe");
        assert_eq!(names, vec!["J Doe"]);
        assert_eq!(year, None);
    }

    #[test]
    fn test_citing_record_aligns_linked_authors() {
        let json = r#"{
            "title": "A citing paper",
            "publication_info": {
                "summary": "J Doe, A Smith - Conference, 2019 - example.org",
                "authors": [{"name": "A Smith", "author_id": "smith01"}]
            }
        }"#;
        let result: OrganicResult = serde_json::from_str(json).unwrap();
        let record = citing_record_from_result(result, "Cited paper");

        assert_eq!(record.author_ids, vec!["NA", "smith01"]);
        assert_eq!(
            record.author_names,
            Some(vec!["J Doe".to_string(), "A Smith".to_string()])
        );
        assert_eq!(record.citing_year.as_deref(), Some("2019"));
        assert_eq!(record.match_status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_split_cites_ids() {
        assert_eq!(split_cites_ids("123, 456,"), vec!["123", "456"]);
    }

    #[test]
    fn test_check_error_classification() {
        assert!(check_error(None, "x").is_ok());
        let err = check_error(Some("Google hasn't returned any results for this query."), "x")
            .unwrap_err();
        assert!(err.is_not_found());
        let err = check_error(Some("Your account has run out of searches."), "x").unwrap_err();
        assert!(err.is_retryable());
    }
}
