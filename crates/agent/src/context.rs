//! Recorded-interaction context: loading event files and correlating
//! element queries against prior recorded actions.

use std::path::Path;
use tracing::{debug, info};

use webpilot_core::{ContextEvent, Error, Locator, Result};

/// Load an ordered event sequence from a recording file.
///
/// A missing file and a file that fails to parse are distinct errors; the
/// serve surface maps them to 404 and 400 respectively.
pub fn load_context_file(path: &Path) -> Result<Vec<ContextEvent>> {
    if !path.exists() {
        return Err(Error::ContextFileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let events: Vec<ContextEvent> = serde_json::from_str(&content)
        .map_err(|e| Error::ContextFileMalformed(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), events = events.len(), "Loaded context events");
    Ok(events)
}

/// Match an element query against recorded events. The first (earliest)
/// event whose description covers at least 60% of the query tokens wins,
/// and its recorded locator is used verbatim, bypassing the scan entirely.
pub fn correlate(query: &str, events: &[ContextEvent]) -> Option<Locator> {
    let query_lower = query.to_lowercase();
    let tokens: Vec<&str> = query_lower.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    for event in events {
        let mut haystack = String::new();
        if let Some(desc) = &event.element_description {
            haystack.push_str(desc);
            haystack.push(' ');
        }
        haystack.push_str(&event.kind);
        if let Some(value) = &event.value {
            haystack.push(' ');
            haystack.push_str(value);
        }
        let haystack = haystack.to_lowercase();

        let matched = tokens.iter().filter(|t| haystack.contains(**t)).count();
        if matched as f64 / tokens.len() as f64 >= 0.6 {
            if let Some(locator) = event.locator() {
                debug!(
                    query = query,
                    event_id = %event.id,
                    matched,
                    total = tokens.len(),
                    "Context event correlated to query"
                );
                return Some(locator);
            }
        }
    }
    None
}
