use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use citation_geomap::common::{setup_logging, write_entries_jsonl};
use citation_geomap::service::{create_client, NominatimGeocoder, ScholarClient};
use citation_geomap::{run_pipeline, PipelineConfig, PipelineOutput, ServiceConfig};

use crate::cli::RunArgs;

fn pipeline_config(args: &RunArgs) -> PipelineConfig {
    let mut config = PipelineConfig::new(&args.researcher);
    config.cache_dir = args.cache_dir.as_ref().map(PathBuf::from);
    config.resume = !args.no_resume;
    config.policy = args.policy;
    config.workers = args.workers;
    config.proxy = args.proxy.clone();
    config.timeout_secs = args.timeout;
    config.skip_authorless_cached_rows = args.skip_authorless_cached_rows;
    config
}

fn service_config(args: &RunArgs) -> Result<ServiceConfig> {
    let mut service = ServiceConfig::default().with_api_key(args.api_key.clone())?;
    if let Some(url) = &args.scholar_url {
        service.scholar_base_url = url.clone();
    }
    if let Some(url) = &args.geocoder_url {
        service.geocoder_base_url = url.clone();
    }
    Ok(service)
}

pub async fn run_enrichment_async(args: RunArgs) -> Result<PipelineOutput> {
    setup_logging(&args.log_level)?;

    let config = pipeline_config(&args);
    config.validate()?;
    let service = service_config(&args)?;

    // The proxy only fronts the search service; the geocoder is always direct
    let scholar_http = create_client(&service.user_agent, config.timeout(), config.proxy.as_deref())
        .context("Failed to build search-service HTTP client")?;
    let geocoder_http = create_client(&service.user_agent, config.timeout(), None)
        .context("Failed to build geocoder HTTP client")?;

    let scholar = ScholarClient::new(
        scholar_http,
        &service.scholar_base_url,
        &service.api_key,
        service.max_pages,
    );
    let geocoder = NominatimGeocoder::new(
        geocoder_http,
        &service.geocoder_base_url,
        service.geocoder_interval,
    );

    let output = run_pipeline(&config, &scholar, &geocoder).await?;

    write_entries_jsonl(&output.entries, Path::new(&args.output))?;

    Ok(output)
}

pub fn run_enrichment(args: RunArgs) -> Result<PipelineOutput> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_enrichment_async(args))
}
