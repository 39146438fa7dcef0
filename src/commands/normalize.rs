use anyhow::Result;

use citation_geomap::normalize::normalize_affiliation;

use crate::cli::NormalizeArgs;

pub fn run_normalize(args: NormalizeArgs) -> Result<()> {
    for raw in &args.affiliations {
        let cleaned = normalize_affiliation(raw);
        println!("{}", raw);
        if cleaned.is_empty() {
            println!("  (no institution)");
        }
        for segment in cleaned {
            println!("  -> {}", segment);
        }
    }
    Ok(())
}
