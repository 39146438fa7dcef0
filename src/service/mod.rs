//! Uniform call interface to the publication search service and the geocoder.
//!
//! Responses are mapped into the typed records of [`crate::common`] here; no
//! stage ever touches raw JSON. Adapters classify failures but never retry;
//! retry policy belongs to the calling stage.

pub mod error;
pub mod http;
pub mod nominatim;
pub mod retry;
pub mod scholar;

pub use error::ServiceError;
pub use http::*;
pub use nominatim::NominatimGeocoder;
pub use retry::{Outcome, RetryPolicy};
pub use scholar::ScholarClient;

use async_trait::async_trait;

use crate::common::{Address, AuthorProfile, CitingRecord, Coordinates, Publication};

/// Publication/citation search service
#[async_trait]
pub trait CitationService: Send + Sync {
    /// List a researcher's publications. Failure here is fatal to a run.
    async fn search_publications(&self, researcher_id: &str)
        -> Result<Vec<Publication>, ServiceError>;

    /// Fetch full metadata (citation-group ids, citation count) for one publication
    async fn fill_publication(&self, publication: &Publication)
        -> Result<Publication, ServiceError>;

    /// List papers citing a citation group, in the service's enumeration order
    async fn citing_records_for(
        &self,
        group_id: &str,
        cited_title: &str,
    ) -> Result<Vec<CitingRecord>, ServiceError>;

    async fn author_profile(&self, author_id: &str) -> Result<AuthorProfile, ServiceError>;

    /// Resolve an author display name to the first matching profile id
    async fn find_author_id(&self, name: &str) -> Result<String, ServiceError>;
}

/// Forward and reverse geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Coordinates, ServiceError>;

    async fn reverse(&self, coordinates: Coordinates) -> Result<Address, ServiceError>;
}
