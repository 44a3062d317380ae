//! Absolute XPath synthesis for harvested elements.

use crate::page::PageSnapshot;

/// Build an XPath that uniquely identifies the element within the snapshot.
///
/// An element with an id gets the short id form. The document root and body
/// get their fixed absolute paths. Everything else gets its parent's path
/// plus a `/tag[ordinal]` step, where the ordinal counts same-tag siblings
/// from 1.
pub fn synthesize(snapshot: &PageSnapshot, index: usize) -> String {
    let el = &snapshot.elements[index];

    if !el.id.is_empty() {
        return format!("//*[@id=\"{}\"]", el.id);
    }
    if el.tag == "html" {
        return "/html".to_string();
    }
    if el.tag == "body" {
        return "/html/body".to_string();
    }

    let parent_path = match el.parent {
        Some(p) => synthesize(snapshot, p),
        None => String::new(),
    };
    format!("{}/{}[{}]", parent_path, el.tag, snapshot.ordinal(index))
}
