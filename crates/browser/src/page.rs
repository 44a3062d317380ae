//! Typed page snapshot for element resolution.
//!
//! One round trip per resolution: a harvest script dumps raw per-element
//! facts for every element in the document, and everything downstream
//! (scanning, scoring, locator synthesis) runs on the typed snapshot in Rust.

use serde::Deserialize;
use tracing::debug;

use webpilot_core::{Error, Result};

use crate::cdp::CdpClient;

/// Raw facts about a single element, in document order.
#[derive(Debug, Clone)]
pub struct PageElement {
    /// Index of this element within the snapshot arena.
    pub index: usize,
    /// Index of the parent element, None for the root (`html`).
    pub parent: Option<usize>,
    /// Lowercased tag name.
    pub tag: String,
    pub id: String,
    pub name: String,
    pub aria_label: String,
    pub placeholder: String,
    pub value: String,
    pub test_id: String,
    /// Whitespace-normalized subtree text.
    pub text: String,
    pub width: f64,
    pub height: f64,
    /// True when CSS computes the element as hidden.
    pub hidden: bool,
}

impl PageElement {
    pub fn is_visible(&self) -> bool {
        !self.hidden && self.width > 0.0 && self.height > 0.0
    }
}

/// All elements of a page at one point in time, in document order.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub elements: Vec<PageElement>,
}

/// Dumps every element's facts as a JSON array. Parent references are
/// indices into the same array, so the Rust side can rebuild the tree
/// without a second round trip.
const HARVEST_JS: &str = r#"
(() => {
  const all = Array.from(document.querySelectorAll('*'));
  const indexOf = new Map();
  all.forEach((el, i) => indexOf.set(el, i));
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  return JSON.stringify(all.map((el, i) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const hidden = style.display === 'none'
      || style.visibility === 'hidden'
      || el.hidden === true;
    const parent = el.parentElement && indexOf.has(el.parentElement)
      ? indexOf.get(el.parentElement) : null;
    return {
      index: i,
      parent: parent,
      tag: el.tagName.toLowerCase(),
      id: el.id || '',
      name: el.getAttribute('name') || '',
      ariaLabel: el.getAttribute('aria-label') || '',
      placeholder: el.getAttribute('placeholder') || '',
      value: (typeof el.value === 'string') ? el.value : '',
      testId: el.getAttribute('data-testid') || '',
      text: norm(el.textContent).slice(0, 2000),
      width: rect.width,
      height: rect.height,
      hidden: hidden,
    };
  }));
})()
"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
    index: usize,
    parent: Option<usize>,
    tag: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    aria_label: String,
    #[serde(default)]
    placeholder: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    test_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    hidden: bool,
}

impl PageSnapshot {
    /// Capture a snapshot of the current page over CDP.
    pub async fn harvest(cdp: &CdpClient) -> Result<Self> {
        let raw = cdp
            .evaluate_string(HARVEST_JS)
            .await?
            .ok_or_else(|| Error::Cdp("Element harvest returned no value".to_string()))?;
        let raws: Vec<RawElement> = serde_json::from_str(&raw)?;
        let elements = raws
            .into_iter()
            .map(|r| PageElement {
                index: r.index,
                parent: r.parent,
                tag: r.tag,
                id: r.id,
                name: r.name,
                aria_label: r.aria_label,
                placeholder: r.placeholder,
                value: r.value,
                test_id: r.test_id,
                text: r.text,
                width: r.width,
                height: r.height,
                hidden: r.hidden,
            })
            .collect::<Vec<_>>();
        debug!(count = elements.len(), "Harvested page elements");
        Ok(Self { elements })
    }

    /// Build a snapshot directly from elements. Test construction path.
    pub fn from_elements(elements: Vec<PageElement>) -> Self {
        Self { elements }
    }

    pub fn get(&self, index: usize) -> Option<&PageElement> {
        self.elements.get(index)
    }

    /// 1-based position of the element among same-tag siblings, the ordinal
    /// used in synthesized absolute XPath steps.
    pub fn ordinal(&self, index: usize) -> usize {
        let el = &self.elements[index];
        let mut ord = 1;
        for sibling in &self.elements {
            if sibling.parent == el.parent && sibling.tag == el.tag {
                if sibling.index == index {
                    break;
                }
                ord += 1;
            }
        }
        ord
    }

    /// True when `descendant` is strictly below `ancestor` in the tree.
    pub fn is_descendant_of(&self, descendant: usize, ancestor: usize) -> bool {
        let mut cursor = self.elements[descendant].parent;
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.elements[p].parent;
        }
        false
    }

    /// Resolve an XPath against this snapshot, returning the index of the
    /// matching element. Supports the two shapes the locator synthesizer
    /// produces: an id shortcut and an absolute path with ordinals. The id
    /// shortcut also accepts single-quoted values and a concrete tag, the
    /// forms recorded context files carry.
    pub fn evaluate_xpath(&self, xpath: &str) -> Option<usize> {
        if let Some((tag, id)) = parse_id_shortcut(xpath) {
            return self
                .elements
                .iter()
                .find(|el| el.id == id && tag.map_or(true, |t| el.tag == t))
                .map(|el| el.index);
        }

        if !xpath.starts_with('/') {
            return None;
        }

        let mut current: Option<usize> = None;
        for step in xpath.split('/').filter(|s| !s.is_empty()) {
            let (tag, ord) = parse_step(step)?;
            let mut seen = 0;
            let mut matched = None;
            for el in &self.elements {
                if el.parent == current && el.tag == tag {
                    seen += 1;
                    if seen == ord {
                        matched = Some(el.index);
                        break;
                    }
                }
            }
            current = Some(matched?);
        }
        current
    }
}

/// Parse an id-shortcut XPath like `//*[@id="x"]`, `//*[@id='x']`, or
/// `//input[@id='x']` into (tag filter, id). `*` means any tag.
fn parse_id_shortcut(xpath: &str) -> Option<(Option<&str>, &str)> {
    let rest = xpath.strip_prefix("//")?;
    let (tag, predicate) = rest.split_once("[@id=")?;
    let tag = match tag {
        "*" => None,
        t if t.chars().all(|c| c.is_ascii_alphanumeric()) && !t.is_empty() => Some(t),
        _ => return None,
    };
    let quoted = predicate.strip_suffix(']')?;
    let id = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| quoted.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    Some((tag, id))
}

/// Parse a single XPath step like `div[2]` or `body` into (tag, ordinal).
/// A missing ordinal means the first match.
fn parse_step(step: &str) -> Option<(&str, usize)> {
    match step.find('[') {
        Some(open) => {
            let tag = &step[..open];
            let close = step.rfind(']')?;
            let ord: usize = step[open + 1..close].parse().ok()?;
            Some((tag, ord))
        }
        None => Some((step, 1)),
    }
}

// Builder helpers for constructing snapshots in tests without a browser.
impl PageElement {
    pub fn new(index: usize, tag: &str, parent: Option<usize>) -> Self {
        Self {
            index,
            parent,
            tag: tag.to_string(),
            id: String::new(),
            name: String::new(),
            aria_label: String::new(),
            placeholder: String::new(),
            value: String::new(),
            test_id: String::new(),
            text: String::new(),
            width: 0.0,
            height: 0.0,
            hidden: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = label.to_string();
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_test_id(mut self, test_id: &str) -> Self {
        self.test_id = test_id.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> PageSnapshot {
        // html > body > (div, div > button#go)
        PageSnapshot::from_elements(vec![
            PageElement::new(0, "html", None).with_size(1080.0, 720.0),
            PageElement::new(1, "body", Some(0)).with_size(1080.0, 720.0),
            PageElement::new(2, "div", Some(1)).with_size(500.0, 100.0),
            PageElement::new(3, "div", Some(1)).with_size(500.0, 100.0),
            PageElement::new(4, "button", Some(3))
                .with_id("go")
                .with_text("Go")
                .with_size(80.0, 30.0),
        ])
    }

    #[test]
    fn test_ordinal_counts_same_tag_siblings() {
        let page = sample_page();
        assert_eq!(page.ordinal(2), 1);
        assert_eq!(page.ordinal(3), 2);
        assert_eq!(page.ordinal(4), 1);
    }

    #[test]
    fn test_descendant_check() {
        let page = sample_page();
        assert!(page.is_descendant_of(4, 1));
        assert!(page.is_descendant_of(4, 3));
        assert!(!page.is_descendant_of(4, 2));
        assert!(!page.is_descendant_of(1, 1));
    }

    #[test]
    fn test_evaluate_id_shortcut() {
        let page = sample_page();
        assert_eq!(page.evaluate_xpath("//*[@id=\"go\"]"), Some(4));
        assert_eq!(page.evaluate_xpath("//*[@id=\"missing\"]"), None);
    }

    #[test]
    fn test_evaluate_id_shortcut_variants() {
        let page = sample_page();
        // Recorded context files quote ids either way and may name the tag.
        assert_eq!(page.evaluate_xpath("//*[@id='go']"), Some(4));
        assert_eq!(page.evaluate_xpath("//button[@id='go']"), Some(4));
        assert_eq!(page.evaluate_xpath("//button[@id=\"go\"]"), Some(4));
        assert_eq!(page.evaluate_xpath("//div[@id='go']"), None);
        assert_eq!(page.evaluate_xpath("//*[@id='go\"]"), None);
    }

    #[test]
    fn test_evaluate_absolute_path() {
        let page = sample_page();
        assert_eq!(page.evaluate_xpath("/html"), Some(0));
        assert_eq!(page.evaluate_xpath("/html/body"), Some(1));
        assert_eq!(page.evaluate_xpath("/html/body/div[2]"), Some(3));
        assert_eq!(page.evaluate_xpath("/html/body/div[2]/button[1]"), Some(4));
        assert_eq!(page.evaluate_xpath("/html/body/span[1]"), None);
    }

    #[test]
    fn test_visibility() {
        let visible = PageElement::new(0, "div", None).with_size(10.0, 10.0);
        let zero = PageElement::new(1, "div", None);
        let hidden = PageElement::new(2, "div", None).with_size(10.0, 10.0).invisible();
        assert!(visible.is_visible());
        assert!(!zero.is_visible());
        assert!(!hidden.is_visible());
    }
}
