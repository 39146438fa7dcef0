//! In-memory adapters for stage tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::common::{Address, AuthorProfile, CitingRecord, Coordinates, Publication};
use crate::service::{CitationService, Geocoder, ServiceError};

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Citing record; an empty name list means the record carries no names
pub fn record(ids: &[&str], citing: &str, cited: &str, author_names: &[&str]) -> CitingRecord {
    let author_names = if author_names.is_empty() {
        None
    } else {
        Some(names(author_names))
    };
    CitingRecord::new(names(ids), citing, cited, author_names)
}

#[derive(Default)]
pub struct MockService {
    publications: Vec<Publication>,
    citing: HashMap<String, Vec<CitingRecord>>,
    profiles: HashMap<String, AuthorProfile>,
    ids_by_name: HashMap<String, String>,
    fail_search: bool,
    fail_fill: HashSet<String>,
    fail_groups: HashSet<String>,
    fail_authors: HashSet<String>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publication(mut self, title: &str, groups: &[&str]) -> Self {
        let mut publication = Publication::new(title);
        publication.source_id = Some(format!("src-{}", title));
        publication.citation_group_ids = names(groups);
        self.publications.push(publication);
        self
    }

    pub fn with_citing(mut self, group_id: &str, records: Vec<CitingRecord>) -> Self {
        self.citing.insert(group_id.to_string(), records);
        self
    }

    pub fn with_profile(
        mut self,
        author_id: &str,
        name: &str,
        affiliation: &str,
        organization: Option<&str>,
    ) -> Self {
        self.profiles.insert(
            author_id.to_string(),
            AuthorProfile {
                author_id: author_id.to_string(),
                name: Some(name.to_string()),
                affiliation: Some(affiliation.to_string()),
                organization: organization.map(String::from),
            },
        );
        self
    }

    pub fn with_name(mut self, name: &str, author_id: &str) -> Self {
        self.ids_by_name.insert(name.to_string(), author_id.to_string());
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_fill(mut self, title: &str) -> Self {
        self.fail_fill.insert(title.to_string());
        self
    }

    pub fn failing_group(mut self, group_id: &str) -> Self {
        self.fail_groups.insert(group_id.to_string());
        self
    }

    pub fn failing_author(mut self, author_id: &str) -> Self {
        self.fail_authors.insert(author_id.to_string());
        self
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    fn count(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
    }
}

#[async_trait]
impl CitationService for MockService {
    async fn search_publications(&self, _researcher_id: &str) -> Result<Vec<Publication>, ServiceError> {
        self.count("search");
        if self.fail_search {
            return Err(ServiceError::transient("search unavailable"));
        }
        // Listing carries no group ids; those arrive with the metadata fill
        Ok(self
            .publications
            .iter()
            .map(|p| Publication {
                citation_group_ids: Vec::new(),
                ..p.clone()
            })
            .collect())
    }

    async fn fill_publication(&self, publication: &Publication) -> Result<Publication, ServiceError> {
        self.count("fill");
        if self.fail_fill.contains(&publication.title) {
            return Err(ServiceError::transient("quota exceeded"));
        }
        self.publications
            .iter()
            .find(|p| p.title == publication.title)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(publication.title.clone()))
    }

    async fn citing_records_for(
        &self,
        group_id: &str,
        _cited_title: &str,
    ) -> Result<Vec<CitingRecord>, ServiceError> {
        self.count("citing");
        if self.fail_groups.contains(group_id) {
            return Err(ServiceError::transient("timeout"));
        }
        Ok(self.citing.get(group_id).cloned().unwrap_or_default())
    }

    async fn author_profile(&self, author_id: &str) -> Result<AuthorProfile, ServiceError> {
        self.count("profile");
        if self.fail_authors.contains(author_id) {
            return Err(ServiceError::transient("timeout"));
        }
        self.profiles
            .get(author_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(author_id))
    }

    async fn find_author_id(&self, name: &str) -> Result<String, ServiceError> {
        self.count("find_author");
        self.ids_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(name))
    }
}

#[derive(Default)]
pub struct MockGeocoder {
    places: HashMap<String, (Coordinates, Address)>,
    failing: HashSet<String>,
    forward: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, query: &str, latitude: f64, longitude: f64, country: &str) -> Self {
        self.places.insert(
            query.to_string(),
            (
                Coordinates { latitude, longitude },
                Address {
                    country: Some(country.to_string()),
                    ..Default::default()
                },
            ),
        );
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn forward_calls(&self, query: &str) -> usize {
        self.forward.lock().unwrap().get(query).copied().unwrap_or(0)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinates, ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        *self.forward.lock().unwrap().entry(query.to_string()).or_default() += 1;
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(query) {
            return Err(ServiceError::transient("geocoder timeout"));
        }
        self.places
            .get(query)
            .map(|(coordinates, _)| *coordinates)
            .ok_or_else(|| ServiceError::not_found(query))
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Address, ServiceError> {
        self.places
            .values()
            .find(|(c, _)| *c == coordinates)
            .map(|(_, address)| address.clone())
            .ok_or_else(|| ServiceError::not_found("coordinates"))
    }
}
