use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::CitationEntry;

/// Write citation entries as JSON lines, one row per (author, citing, cited) triple
pub fn write_entries_jsonl(entries: &[CitationEntry], path: &Path) -> Result<()> {
    info!("Writing {} citation entries to: {}", entries.len(), path.display());

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{MatchStatus, UNKNOWN};
    use tempfile::tempdir;

    #[test]
    fn test_write_entries_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entries.jsonl");

        let entry = CitationEntry {
            author_name: "Alice".to_string(),
            author_id: "a1".to_string(),
            match_status: MatchStatus::Matched,
            citing_year: "2021".to_string(),
            citing_paper: "Citing".to_string(),
            cited_paper: "Cited".to_string(),
            affiliation: UNKNOWN.to_string(),
            latitude: None,
            longitude: None,
            county: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
        };

        write_entries_jsonl(&[entry.clone(), entry], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"match_status\":\"matched\""));
        assert!(lines[0].contains("\"latitude\":null"));
    }
}
