//! Pipeline stages. Each stage takes its adapter as an explicit argument and
//! returns what it could resolve together with the units it had to drop.

pub mod affiliations;
pub mod aggregate;
pub mod citations;
pub mod discovery;
pub mod geocode;
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

pub use affiliations::{choose_affiliation, resolve_affiliations};
pub use aggregate::{aggregate, quick_path_rows, QuickRow, RunSummary};
pub use citations::{placeholder_record, reconcile_records, resolve_citations};
pub use discovery::discover_publications;
pub use geocode::{dedup_affiliations, geocode_affiliations, GeocodeOutput, LocatedAffiliation};
pub use pool::run_bounded;
