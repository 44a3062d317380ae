//! Element resolution: scan, score, and synthesize locators for the
//! elements on a page that best match a natural-language query.

pub mod locator;
pub mod scanner;
pub mod scorer;

use tracing::debug;

use webpilot_core::config::ScoringParams;
use webpilot_core::{safe_truncate, Candidate, Result};

use crate::page::{PageElement, PageSnapshot};

/// Resolve a query against a snapshot into ranked candidates.
///
/// Scoped resolution restricts scanning to descendants of the container
/// XPath. Candidates are sorted by score descending (document order breaks
/// ties, so equal inputs always rank identically) and capped.
pub fn resolve(
    snapshot: &PageSnapshot,
    query: &str,
    scope: Option<&str>,
    params: &ScoringParams,
) -> Result<Vec<Candidate>> {
    let query_lower = query.to_lowercase();
    let tokens: Vec<&str> = query_lower.split_whitespace().collect();

    let indices = scanner::scan(snapshot, scope)?;

    let mut scored: Vec<(usize, f64)> = indices
        .into_iter()
        .map(|i| {
            let s = scorer::score_element(&snapshot.elements[i], &query_lower, &tokens, params);
            (i, s)
        })
        .filter(|(_, s)| *s > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(params.max_results);

    let candidates: Vec<Candidate> = scored
        .into_iter()
        .map(|(i, s)| {
            let el = &snapshot.elements[i];
            Candidate {
                tag: el.tag.clone(),
                name: concise_name(el, params.name_max_chars),
                selector: locator::synthesize(snapshot, i),
                score: s.round() as i64,
            }
        })
        .collect();

    debug!(
        query = query,
        scoped = scope.is_some(),
        count = candidates.len(),
        "Resolved element candidates"
    );
    Ok(candidates)
}

/// Human-readable label for a candidate: the most specific non-empty source,
/// truncated for the report.
fn concise_name(el: &PageElement, max_chars: usize) -> String {
    let best = [
        &el.aria_label,
        &el.placeholder,
        &el.name,
        &el.value,
        &el.text,
        &el.id,
    ]
    .into_iter()
    .find(|s| !s.is_empty())
    .map(|s| s.as_str())
    .unwrap_or("");
    safe_truncate(best, max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::Error;

    fn login_page() -> PageSnapshot {
        PageSnapshot::from_elements(vec![
            PageElement::new(0, "html", None).with_size(1080.0, 720.0),
            PageElement::new(1, "body", Some(0)).with_size(1080.0, 720.0),
            // Zero-size decoy mentioning "login"
            PageElement::new(2, "div", Some(1)).with_text("login"),
            PageElement::new(3, "form", Some(1)).with_size(400.0, 300.0),
            PageElement::new(4, "input", Some(3))
                .with_placeholder("Username")
                .with_size(200.0, 30.0),
            PageElement::new(5, "button", Some(3))
                .with_id("submit-btn")
                .with_text("Login")
                .with_size(100.0, 40.0),
        ])
    }

    #[test]
    fn test_visible_button_beats_invisible_decoy() {
        let page = login_page();
        let results = resolve(&page, "login button", None, &ScoringParams::default()).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].selector, "//*[@id=\"submit-btn\"]");
        // The zero-size div never appears
        assert!(results.iter().all(|c| c.selector != "/html/body/div[1]"));
    }

    #[test]
    fn test_deterministic_ranking() {
        let page = login_page();
        let params = ScoringParams::default();
        let a = resolve(&page, "login", None, &params).unwrap();
        let b = resolve(&page, "login", None, &params).unwrap();
        let sa: Vec<_> = a.iter().map(|c| (&c.selector, c.score)).collect();
        let sb: Vec<_> = b.iter().map(|c| (&c.selector, c.score)).collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let page = login_page();
        let results = resolve(&page, "xyzzy frobnicate", None, &ScoringParams::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_result_cap() {
        let mut elements = vec![
            PageElement::new(0, "html", None).with_size(1080.0, 720.0),
            PageElement::new(1, "body", Some(0)).with_size(1080.0, 720.0),
        ];
        for i in 2..30 {
            elements.push(
                PageElement::new(i, "button", Some(1))
                    .with_text("save")
                    .with_size(80.0, 30.0),
            );
        }
        let page = PageSnapshot::from_elements(elements);
        let results = resolve(&page, "save", None, &ScoringParams::default()).unwrap();
        assert_eq!(results.len(), 15);
    }

    #[test]
    fn test_scoped_resolution_propagates_missing_container() {
        let page = login_page();
        let err = resolve(
            &page,
            "login",
            Some("//*[@id=\"missing\"]"),
            &ScoringParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound(_)));
    }

    #[test]
    fn test_concise_name_prefers_specific_sources() {
        let el = PageElement::new(0, "input", None)
            .with_placeholder("Search query")
            .with_text("ignored")
            .with_size(200.0, 30.0);
        assert_eq!(concise_name(&el, 100), "Search query");
    }
}
