use clap::{Parser, Subcommand};

use citation_geomap::AffiliationPolicy;

#[derive(Parser)]
#[command(name = "citation-geomap")]
#[command(about = "Resolve who cites a researcher's publications and where those authors are")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run discovery, citation and affiliation resolution, geocoding and aggregation
    Run(RunArgs),

    /// Print the cleaned segments the affiliation normalizer produces
    Normalize(NormalizeArgs),

    /// Summarize a cached citing-records file (either schema version)
    InspectCache(InspectCacheArgs),
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Researcher profile id on the search service
    #[arg(short, long, required = true)]
    pub researcher: String,

    /// Output JSONL file for the aggregated rows
    #[arg(short, long, default_value = "citation_entries.jsonl")]
    pub output: String,

    /// Cache directory; omit to disable caching
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Ignore existing cache snapshots and recompute every stage
    #[arg(long, default_value = "false")]
    pub no_resume: bool,

    /// Affiliation resolution policy
    #[arg(long, value_enum, default_value_t = AffiliationPolicy::Conservative)]
    pub policy: AffiliationPolicy,

    /// Worker-pool width for citation and affiliation resolution (1 = sequential)
    #[arg(short, long, default_value = "16")]
    pub workers: usize,

    /// Proxy URL for search-service requests
    #[arg(long)]
    pub proxy: Option<String>,

    /// Timeout in seconds per request
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,

    /// Search-service API key (falls back to SCHOLAR_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Search-service endpoint
    #[arg(long)]
    pub scholar_url: Option<String>,

    /// Geocoder endpoint
    #[arg(long)]
    pub geocoder_url: Option<String>,

    /// Drop cached citing records that carry no author id
    #[arg(long, default_value = "false")]
    pub skip_authorless_cached_rows: bool,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct NormalizeArgs {
    /// Raw affiliation strings
    #[arg(required = true)]
    pub affiliations: Vec<String>,
}

#[derive(Parser, Clone)]
pub struct InspectCacheArgs {
    /// Path to a citing_records.csv file
    #[arg(short, long, required = true)]
    pub input: String,

    /// Drop rows without author ids (newer schema only)
    #[arg(long, default_value = "false")]
    pub skip_authorless: bool,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}
