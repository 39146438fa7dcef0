pub mod cache;
pub mod common;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod service;
pub mod stages;

pub use config::{AffiliationPolicy, PipelineConfig, ServiceConfig};
pub use pipeline::{run_pipeline, PipelineOutput};
