use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};

use jobscout_client::FeedConfig;

/// Load and validate a JSON sources file: an array of
/// `{ "id", "url", "timeout_secs"?, "user_agent"? }`.
pub fn load_sources(path: &Path) -> Result<Vec<FeedConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;
    parse_sources(&raw).with_context(|| format!("Invalid sources file: {}", path.display()))
}

pub fn parse_sources(raw: &str) -> Result<Vec<FeedConfig>> {
    let sources: Vec<FeedConfig> = serde_json::from_str(raw).context("Expected a JSON array of sources")?;
    if sources.is_empty() {
        bail!("No sources configured");
    }

    let mut seen = HashSet::new();
    for source in &sources {
        if source.id.as_str().is_empty() {
            bail!("Source with url {} has an empty id", source.url);
        }
        if !seen.insert(source.id.clone()) {
            bail!("Duplicate source id '{}'", source.id);
        }
        if !matches!(source.url.scheme(), "http" | "https") {
            bail!(
                "Source '{}' uses unsupported scheme '{}'",
                source.id,
                source.url.scheme()
            );
        }
        if source.timeout_secs == Some(0) {
            bail!("Source '{}' has a zero timeout", source.id);
        }
    }
    Ok(sources)
}
