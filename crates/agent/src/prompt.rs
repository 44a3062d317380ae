//! System prompt for the decision oracle.

use webpilot_core::ContextEvent;

const BASE_PROMPT: &str = r#"You are a browser automation agent. You control a real browser through the provided tools to accomplish the user's task.

Follow these rules when locating elements, in priority order:
1. If the user's instruction already contains an exact locator (an XPath or CSS selector), use it directly with click_element/send_keys_to_element etc.
2. If recorded context events are provided below and one of them clearly matches the element you need, use that event's xpath verbatim as by=xpath.
3. If you know a container the element lives in, call find_interactive_element with container_xpath to search inside it.
4. Otherwise call find_interactive_element with a short natural-language query describing the element.

Working with find_interactive_element results:
- The tool returns a JSON list of candidates ranked by score. Prefer the highest-scoring candidate and use its selector with by=xpath.
- If the result list is empty, rephrase the query, scroll the page, or wait for the page to load, then try again.

General rules:
- Always call start_browser first, and navigate_to_url before interacting with any page.
- When verify_text_on_element reports a result, reuse the exact same by/value it carries for any follow-up action on that element.
- Never repeat the identical failing call; change the locator or escalate to a broader find_interactive_element search instead.
- A failed action is information, not a dead end. Read the error, adjust, and continue.
- When the task is complete, call close_browser, then reply with a short summary of what happened. Reply without tool calls only when you are finished."#;

/// Build the full system prompt, appending recorded context events when
/// present so the oracle can apply rule 2.
pub fn build_system_prompt(context: &[ContextEvent]) -> String {
    if context.is_empty() {
        return BASE_PROMPT.to_string();
    }
    let events_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{}\n\nRecorded context events from a prior session on this site (ordered, earliest first):\n```json\n{}\n```",
        BASE_PROMPT, events_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::EventTarget;

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.contains("find_interactive_element"));
        assert!(!prompt.contains("Recorded context events"));
    }

    #[test]
    fn test_prompt_embeds_context_events() {
        let events = vec![ContextEvent {
            id: "e1".to_string(),
            target: EventTarget {
                selector: String::new(),
                xpath: "//*[@id=\"q\"]".to_string(),
            },
            timestamp: 0,
            kind: "input".to_string(),
            url: "https://example.com".to_string(),
            value: Some("rust".to_string()),
            element_description: Some("Main search box".to_string()),
        }];
        let prompt = build_system_prompt(&events);
        assert!(prompt.contains("Recorded context events"));
        assert!(prompt.contains("Main search box"));
    }
}
