//! The closed operation catalogue exposed to the decision oracle.
//!
//! Every request coming back from the oracle is parsed into a [`ToolCall`]
//! variant before anything executes; an unknown name or a bad locator token
//! is rejected at this boundary with a typed error.

use serde_json::{json, Value};

use webpilot_browser::{OptionSpec, ScrollDirection};
use webpilot_core::{Error, Locator, Result, Strategy};

/// One validated operation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    StartBrowser { headed: bool },
    MaximizeWindow,
    NavigateToUrl { url: String },
    ResolveElement { query: String, container: Option<String> },
    Click { locator: Locator },
    SendKeys { locator: Locator, text: String },
    PressKey { key: String, locator: Option<Locator> },
    SelectOption { locator: Locator, option: OptionSpec },
    VerifyText { locator: Locator, text: String },
    GetAttribute { locator: Locator, attribute: String },
    ReadText { locator: Locator },
    ScrollIntoView { locator: Locator },
    ScrollPage { direction: ScrollDirection },
    WaitSeconds { seconds: f64 },
    WaitForPageLoad { timeout_secs: u64 },
    CloseBrowser,
}

fn require_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Validation(format!("Missing required argument '{}'", key)))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Build a locator from the `by`/`value` argument pair.
fn locator_from_args(args: &Value) -> Result<Locator> {
    let by = require_str(args, "by")?;
    let value = require_str(args, "value")?;
    Ok(Locator::new(Strategy::parse(&by)?, value))
}

fn optional_locator(args: &Value) -> Result<Option<Locator>> {
    match (optional_str(args, "by"), optional_str(args, "value")) {
        (Some(by), Some(value)) => Ok(Some(Locator::new(Strategy::parse(&by)?, value))),
        _ => Ok(None),
    }
}

impl ToolCall {
    /// Parse a named operation and its arguments into a validated call.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        match name {
            "start_browser" => Ok(Self::StartBrowser {
                headed: args.get("headed").and_then(|v| v.as_bool()).unwrap_or(false),
            }),
            "maximize_window" => Ok(Self::MaximizeWindow),
            "navigate_to_url" => Ok(Self::NavigateToUrl {
                url: require_str(args, "url")?,
            }),
            "find_interactive_element" => Ok(Self::ResolveElement {
                query: require_str(args, "query")?,
                container: optional_str(args, "container_xpath"),
            }),
            "click_element" => Ok(Self::Click {
                locator: locator_from_args(args)?,
            }),
            "send_keys_to_element" => Ok(Self::SendKeys {
                locator: locator_from_args(args)?,
                text: require_str(args, "text")?,
            }),
            "press_key_on_element" => Ok(Self::PressKey {
                key: require_str(args, "key")?,
                locator: optional_locator(args)?,
            }),
            "select_dropdown_option" => {
                let method = optional_str(args, "option_by").unwrap_or_else(|| "visible_text".to_string());
                let value = require_str(args, "option_value")?;
                Ok(Self::SelectOption {
                    locator: locator_from_args(args)?,
                    option: OptionSpec::parse(&method, &value)?,
                })
            }
            "verify_text_on_element" => Ok(Self::VerifyText {
                locator: locator_from_args(args)?,
                text: require_str(args, "text")?,
            }),
            "get_element_attribute" => Ok(Self::GetAttribute {
                locator: locator_from_args(args)?,
                attribute: require_str(args, "attribute")?,
            }),
            "read_element_text" => Ok(Self::ReadText {
                locator: locator_from_args(args)?,
            }),
            "scroll_element_into_view" => Ok(Self::ScrollIntoView {
                locator: locator_from_args(args)?,
            }),
            "scroll_page" => Ok(Self::ScrollPage {
                direction: ScrollDirection::parse(
                    &optional_str(args, "direction").unwrap_or_else(|| "down".to_string()),
                )?,
            }),
            "wait_for_seconds" => Ok(Self::WaitSeconds {
                seconds: args
                    .get("seconds")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| Error::Validation("Missing required argument 'seconds'".to_string()))?,
            }),
            "wait_for_page_load" => Ok(Self::WaitForPageLoad {
                timeout_secs: args.get("timeout").and_then(|v| v.as_u64()).unwrap_or(30),
            }),
            "close_browser" => Ok(Self::CloseBrowser),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }

    /// The locator this call acts on, if it targets an element directly.
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Self::Click { locator }
            | Self::SendKeys { locator, .. }
            | Self::SelectOption { locator, .. }
            | Self::VerifyText { locator, .. }
            | Self::GetAttribute { locator, .. }
            | Self::ReadText { locator }
            | Self::ScrollIntoView { locator } => Some(locator),
            Self::PressKey { locator, .. } => locator.as_ref(),
            _ => None,
        }
    }
}

fn locator_params(extra: Value, extra_required: &[&str]) -> Value {
    let mut props = json!({
        "by": {
            "type": "string",
            "description": "Locator strategy: css, xpath, id, name, class_name, tag_name, link_text, or partial_link_text"
        },
        "value": {"type": "string", "description": "Locator value for the chosen strategy"}
    });
    let mut required: Vec<Value> = vec![json!("by"), json!("value")];
    if let Some(obj) = extra.as_object() {
        for (k, v) in obj {
            props[k.as_str()] = v.clone();
        }
    }
    required.extend(extra_required.iter().map(|k| json!(k)));
    json!({"type": "object", "properties": props, "required": required})
}

fn schema(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {"name": name, "description": description, "parameters": parameters}
    })
}

/// OpenAI-format schemas for the full operation catalogue.
pub fn tool_schemas() -> Vec<Value> {
    vec![
        schema(
            "start_browser",
            "Start a new browser session. Must be called before any other browser operation.",
            json!({"type": "object", "properties": {
                "headed": {"type": "boolean", "description": "Run with a visible window (default false)"}
            }}),
        ),
        schema(
            "maximize_window",
            "Maximize the browser window.",
            json!({"type": "object", "properties": {}}),
        ),
        schema(
            "navigate_to_url",
            "Navigate the browser to a URL and wait for the page to load.",
            json!({"type": "object", "properties": {
                "url": {"type": "string", "description": "Absolute URL to open"}
            }, "required": ["url"]}),
        ),
        schema(
            "find_interactive_element",
            "Find elements matching a natural-language description. Returns a JSON list of candidates ranked by relevance, each with a selector usable as by=xpath. Pass container_xpath to restrict the search to descendants of a container.",
            json!({"type": "object", "properties": {
                "query": {"type": "string", "description": "Natural-language description of the element, e.g. 'login button'"},
                "container_xpath": {"type": "string", "description": "Optional XPath of a container to search within"}
            }, "required": ["query"]}),
        ),
        schema(
            "click_element",
            "Click an element.",
            locator_params(json!({}), &[]),
        ),
        schema(
            "send_keys_to_element",
            "Clear an input element and type text into it.",
            locator_params(json!({"text": {"type": "string", "description": "Text to type"}}), &["text"]),
        ),
        schema(
            "press_key_on_element",
            "Press a key (e.g. ENTER, TAB, ESCAPE). If by/value are given, the element is focused first.",
            json!({"type": "object", "properties": {
                "key": {"type": "string", "description": "Key name, e.g. ENTER"},
                "by": {"type": "string"},
                "value": {"type": "string"}
            }, "required": ["key"]}),
        ),
        schema(
            "select_dropdown_option",
            "Select an option in a <select> dropdown.",
            locator_params(
                json!({
                    "option_by": {"type": "string", "description": "How to pick the option: visible_text, value, or index (default visible_text)"},
                    "option_value": {"type": "string", "description": "Option text, value, or zero-based index"}
                }),
                &["option_value"],
            ),
        ),
        schema(
            "verify_text_on_element",
            "Check that an element's text contains the expected string (case-insensitive). Returns success or failure with the actual text; reuse the same by/value for follow-up actions on the element.",
            locator_params(json!({"text": {"type": "string", "description": "Expected substring"}}), &["text"]),
        ),
        schema(
            "get_element_attribute",
            "Read an attribute (or property) of an element.",
            locator_params(json!({"attribute": {"type": "string", "description": "Attribute name, e.g. href"}}), &["attribute"]),
        ),
        schema(
            "read_element_text",
            "Read the visible text of an element.",
            locator_params(json!({}), &[]),
        ),
        schema(
            "scroll_element_into_view",
            "Scroll an element into the center of the viewport.",
            locator_params(json!({}), &[]),
        ),
        schema(
            "scroll_page",
            "Scroll the page.",
            json!({"type": "object", "properties": {
                "direction": {"type": "string", "description": "up, down, top, or bottom (default down)"}
            }}),
        ),
        schema(
            "wait_for_seconds",
            "Pause for a number of seconds.",
            json!({"type": "object", "properties": {
                "seconds": {"type": "number", "description": "Seconds to wait"}
            }, "required": ["seconds"]}),
        ),
        schema(
            "wait_for_page_load",
            "Wait until the current page finishes loading.",
            json!({"type": "object", "properties": {
                "timeout": {"type": "integer", "description": "Timeout in seconds (default 30)"}
            }}),
        ),
        schema(
            "close_browser",
            "Close the browser session. Call this when the task is finished.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_click() {
        let call = ToolCall::parse("click_element", &json!({"by": "id", "value": "go"})).unwrap();
        assert_eq!(
            call,
            ToolCall::Click {
                locator: Locator::new(Strategy::Id, "go")
            }
        );
    }

    #[test]
    fn test_parse_strategy_aliases_accepted() {
        let call = ToolCall::parse(
            "click_element",
            &json!({"by": "CSS_SELECTOR", "value": ".btn"}),
        )
        .unwrap();
        assert_eq!(call.locator().unwrap().strategy, Strategy::Css);
    }

    #[test]
    fn test_parse_unknown_operation() {
        let err = ToolCall::parse("teleport", &json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(n) if n == "teleport"));
    }

    #[test]
    fn test_parse_unsupported_strategy() {
        let err =
            ToolCall::parse("click_element", &json!({"by": "telepathy", "value": "x"})).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStrategy(_)));
    }

    #[test]
    fn test_parse_missing_argument() {
        let err = ToolCall::parse("navigate_to_url", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_parse_resolve_with_container() {
        let call = ToolCall::parse(
            "find_interactive_element",
            &json!({"query": "submit", "container_xpath": "//*[@id=\"form\"]"}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::ResolveElement {
                query: "submit".to_string(),
                container: Some("//*[@id=\"form\"]".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_press_key_without_target() {
        let call = ToolCall::parse("press_key_on_element", &json!({"key": "ENTER"})).unwrap();
        assert_eq!(
            call,
            ToolCall::PressKey {
                key: "ENTER".to_string(),
                locator: None,
            }
        );
    }

    #[test]
    fn test_parse_select_defaults_to_visible_text() {
        let call = ToolCall::parse(
            "select_dropdown_option",
            &json!({"by": "id", "value": "country", "option_value": "Canada"}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::SelectOption {
                locator: Locator::new(Strategy::Id, "country"),
                option: OptionSpec::Text("Canada".to_string()),
            }
        );
    }

    #[test]
    fn test_schemas_cover_catalogue() {
        let schemas = tool_schemas();
        let names: Vec<&str> = schemas
            .iter()
            .map(|s| s["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 16);
        for name in [
            "start_browser",
            "find_interactive_element",
            "click_element",
            "close_browser",
        ] {
            assert!(names.contains(&name), "missing {}", name);
        }
        // Every schema name parses back into the catalogue or fails on
        // missing args, never on an unknown name.
        for name in names {
            match ToolCall::parse(name, &json!({})) {
                Ok(_) | Err(Error::Validation(_)) => {}
                Err(e) => panic!("schema name {} rejected: {}", name, e),
            }
        }
    }
}
