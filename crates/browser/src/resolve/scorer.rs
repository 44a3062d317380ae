//! Relevance scoring for scanned elements.
//!
//! Each element is scored against the query across several text sources,
//! from generic subtree text up to high-signal attributes like data-testid.
//! Scores flow through three tiers per source: exact whole-query match,
//! per-token substring match, and edit-distance near miss.

use webpilot_core::config::ScoringParams;

use crate::page::PageElement;

/// Score an element against a lowercased query and its tokens.
///
/// Invisible elements score -1 and are excluded before ranking. A positive
/// score means at least one source matched at some tier.
pub fn score_element(
    el: &PageElement,
    query_lower: &str,
    tokens: &[&str],
    params: &ScoringParams,
) -> f64 {
    if !el.is_visible() {
        return -1.0;
    }

    let sources: [(&str, f64, bool); 7] = [
        (el.text.as_str(), params.content_weight, true),
        (el.value.as_str(), params.value_weight, false),
        (el.placeholder.as_str(), params.placeholder_weight, false),
        (el.aria_label.as_str(), params.aria_label_weight, false),
        (el.name.as_str(), params.name_weight, false),
        (el.id.as_str(), params.id_weight, false),
        (el.test_id.as_str(), params.test_id_weight, false),
    ];

    let mut score = 0.0;
    for (raw, weight, is_content) in sources {
        if raw.is_empty() {
            continue;
        }
        let source = raw.to_lowercase();

        // Long subtree text is diluted: a paragraph containing the query is
        // weaker evidence than a short label equal to it.
        let specificity = if is_content {
            1.0 / (1.0 + (source.chars().count().max(1) as f64).log10())
        } else {
            1.0
        };

        // Tiers accumulate: an exact whole-query match also collects the
        // per-token bonuses below, so it stays ahead of partial matches.
        if source == query_lower {
            score += params.exact_match_points * weight * specificity;
        }

        let source_len = source.chars().count() as f64;
        for token in tokens {
            if source.contains(token) {
                let token_len = token.chars().count() as f64;
                score +=
                    params.token_match_points * weight * (token_len / source_len) * specificity;
            } else {
                let distance = levenshtein(token, &source);
                if distance <= params.max_edit_distance {
                    score +=
                        params.near_miss_points / (distance as f64 + 1.0) * weight * specificity;
                }
            }
        }
    }

    let multiplier = params.tag_multipliers.get(&el.tag).copied().unwrap_or(1.0);
    score * multiplier
}

/// Character-level Levenshtein distance, single-row DP.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScoringParams {
        ScoringParams::default()
    }

    fn score(el: &PageElement, query: &str) -> f64 {
        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();
        score_element(el, &query_lower, &tokens, &params())
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", "abd"), 1);
        assert_eq!(levenshtein("submit", "sumbit"), 2);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_invisible_scores_negative() {
        let zero_size = PageElement::new(0, "button", None).with_text("Login");
        let hidden = PageElement::new(1, "button", None)
            .with_text("Login")
            .with_size(80.0, 30.0)
            .invisible();
        assert_eq!(score(&zero_size, "login"), -1.0);
        assert_eq!(score(&hidden, "login"), -1.0);
    }

    #[test]
    fn test_exact_attribute_match() {
        let el = PageElement::new(0, "button", None)
            .with_aria_label("Login")
            .with_size(80.0, 30.0);
        // (exact 100 + token 20 * 5/5) * aria weight (2.0) * button (1.5)
        let s = score(&el, "login");
        assert!((s - 360.0).abs() < 1e-9, "got {}", s);
    }

    #[test]
    fn test_exact_match_outscores_token_only() {
        let exact = PageElement::new(0, "button", None)
            .with_aria_label("Login")
            .with_size(80.0, 30.0);
        let partial = PageElement::new(1, "button", None)
            .with_aria_label("Login form")
            .with_size(80.0, 30.0);
        assert!(score(&exact, "login") > score(&partial, "login"));
    }

    #[test]
    fn test_typo_in_multi_token_query() {
        let el = PageElement::new(0, "input", None)
            .with_id("search")
            .with_size(200.0, 30.0);
        // "serch" is one edit from the id; the other token misses entirely
        // but must not drag the near-miss bonus down to zero.
        assert!(score(&el, "serch box") > 0.0);
    }

    #[test]
    fn test_specificity_discounts_long_text() {
        let short = PageElement::new(0, "p", None)
            .with_text("login")
            .with_size(100.0, 20.0);
        let long = PageElement::new(1, "p", None)
            .with_text("please login to your account to continue using the service today")
            .with_size(100.0, 20.0);
        assert!(score(&short, "login") > score(&long, "login"));
    }

    #[test]
    fn test_token_substring_scales_with_coverage() {
        let tight = PageElement::new(0, "button", None)
            .with_text("login now")
            .with_size(80.0, 30.0);
        let loose = PageElement::new(1, "button", None)
            .with_text("login to your corporate account")
            .with_size(80.0, 30.0);
        assert!(score(&tight, "login") > score(&loose, "login"));
        assert!(score(&loose, "login") > 0.0);
    }

    #[test]
    fn test_typo_tolerance() {
        let el = PageElement::new(0, "button", None)
            .with_id("submit")
            .with_size(80.0, 30.0);
        assert!(score(&el, "sumbit") > 0.0);
        assert_eq!(score(&el, "cancel"), 0.0);
    }

    #[test]
    fn test_tag_multiplier_prefers_interactive() {
        let button = PageElement::new(0, "button", None)
            .with_text("Search")
            .with_size(80.0, 30.0);
        let div = PageElement::new(1, "div", None)
            .with_text("Search")
            .with_size(80.0, 30.0);
        assert!(score(&button, "search") > score(&div, "search"));
    }

    #[test]
    fn test_structural_tags_suppressed() {
        let body = PageElement::new(0, "body", None)
            .with_text("search")
            .with_size(1080.0, 720.0);
        let link = PageElement::new(1, "a", None)
            .with_text("search")
            .with_size(60.0, 20.0);
        assert!(score(&link, "search") > score(&body, "search") * 10.0);
    }
}
