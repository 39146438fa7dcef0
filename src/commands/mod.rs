pub mod inspect;
pub mod normalize;
pub mod run;

pub use inspect::run_inspect_cache;
pub use normalize::run_normalize;
pub use run::run_enrichment;
