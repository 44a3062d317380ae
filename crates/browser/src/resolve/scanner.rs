//! Candidate scanning: which elements are even eligible for scoring.

use webpilot_core::{Error, Result};

use crate::page::PageSnapshot;

/// Tags that never produce actionable candidates.
const DENYLIST: &[&str] = &["script", "style", "head", "meta", "link"];

/// Collect the indices of scoreable elements.
///
/// With a scope XPath, only strict descendants of the container participate;
/// the container itself is excluded. A scope that resolves to nothing is an
/// error, never a silent widening to the whole document.
pub fn scan(snapshot: &PageSnapshot, scope: Option<&str>) -> Result<Vec<usize>> {
    let container = match scope {
        Some(xpath) => Some(
            snapshot
                .evaluate_xpath(xpath)
                .ok_or_else(|| Error::ContainerNotFound(xpath.to_string()))?,
        ),
        None => None,
    };

    Ok(snapshot
        .elements
        .iter()
        .filter(|el| !DENYLIST.contains(&el.tag.as_str()))
        .filter(|el| match container {
            Some(c) => snapshot.is_descendant_of(el.index, c),
            None => true,
        })
        .map(|el| el.index)
        .collect())
}
