//! Action primitives over a live page.
//!
//! Every locating primitive goes through [`wait_for_element`] first: the
//! element must reach the condition the action needs (present, visible, or
//! interactable) within the configured timeout, polled at a fixed interval.
//! Timeouts surface as [`Error::LocateTimeout`] and are reported back to the
//! decision oracle rather than aborting the run.

use serde_json::json;
use tracing::debug;

use webpilot_core::config::BrowserConfig;
use webpilot_core::{Error, Locator, Result, Strategy, VerifyOutcome};

use crate::cdp::CdpClient;
use crate::session::BrowserSession;

/// Condition an element must reach before an action proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Attached to the DOM.
    Present,
    /// Attached and rendered with a nonzero box.
    Visible,
    /// Visible and not disabled.
    Interactable,
}

/// Scroll directions accepted by the page-scroll primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(Error::Validation(format!(
                "Unknown scroll direction '{}'. Use up, down, top, or bottom.",
                other
            ))),
        }
    }
}

/// How to pick a dropdown option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSpec {
    Text(String),
    Value(String),
    Index(usize),
}

impl OptionSpec {
    /// Parse a (method, value) pair, e.g. ("visible_text", "Canada").
    pub fn parse(method: &str, value: &str) -> Result<Self> {
        match method.to_lowercase().as_str() {
            "visible_text" | "text" => Ok(Self::Text(value.to_string())),
            "value" => Ok(Self::Value(value.to_string())),
            "index" => {
                let idx: usize = value.parse().map_err(|_| {
                    Error::Validation(format!("Option index '{}' is not a number", value))
                })?;
                Ok(Self::Index(idx))
            }
            other => Err(Error::Validation(format!(
                "Unknown option selection method '{}'. Use visible_text, value, or index.",
                other
            ))),
        }
    }
}

/// JS expression evaluating to the located element, or null.
pub fn lookup_js(locator: &Locator) -> String {
    let v = json!(locator.value).to_string();
    match locator.strategy {
        Strategy::Css => format!("document.querySelector({})", v),
        Strategy::XPath => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            v
        ),
        Strategy::Id => format!("document.getElementById({})", v),
        Strategy::Name => format!("(document.getElementsByName({})[0] || null)", v),
        Strategy::ClassName => format!("(document.getElementsByClassName({})[0] || null)", v),
        Strategy::TagName => format!("(document.getElementsByTagName({})[0] || null)", v),
        Strategy::LinkText => format!(
            "(Array.from(document.querySelectorAll('a')).find(a => a.textContent.trim() === {}) || null)",
            v
        ),
        Strategy::PartialLinkText => format!(
            "(Array.from(document.querySelectorAll('a')).find(a => a.textContent.includes({})) || null)",
            v
        ),
    }
}

/// Probe the element's state: 'missing', 'hidden', 'disabled', or 'ready'.
fn probe_js(locator: &Locator) -> String {
    format!(
        r#"(() => {{
  const el = {};
  if (!el) return 'missing';
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  if (rect.width === 0 || rect.height === 0 || style.display === 'none' || style.visibility === 'hidden') return 'hidden';
  if (el.disabled) return 'disabled';
  return 'ready';
}})()"#,
        lookup_js(locator)
    )
}

/// Poll until the element reaches the condition, or time out.
pub async fn wait_for_element(
    cdp: &CdpClient,
    locator: &Locator,
    condition: WaitCondition,
    config: &BrowserConfig,
) -> Result<()> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(config.locate_timeout_ms);
    let poll = std::time::Duration::from_millis(config.poll_interval_ms);
    let probe = probe_js(locator);

    loop {
        let state = cdp
            .evaluate_string(&probe)
            .await?
            .unwrap_or_else(|| "missing".to_string());

        let satisfied = match condition {
            WaitCondition::Present => state != "missing",
            WaitCondition::Visible => state == "ready" || state == "disabled",
            WaitCondition::Interactable => state == "ready",
        };
        if satisfied {
            return Ok(());
        }

        if start.elapsed() >= timeout {
            debug!(locator = %locator, state = state, "Element wait timed out");
            return Err(Error::LocateTimeout(format!(
                "Element {} did not become {:?} within {}ms (last state: {})",
                locator, condition, config.locate_timeout_ms, state
            )));
        }
        tokio::time::sleep(poll).await;
    }
}

/// Click an element once it is interactable.
pub async fn click(session: &BrowserSession, locator: &Locator, config: &BrowserConfig) -> Result<()> {
    wait_for_element(&session.cdp, locator, WaitCondition::Interactable, config).await?;
    let js = format!(
        r#"(() => {{
  const el = {};
  el.scrollIntoView({{block: 'center'}});
  el.click();
  return 'clicked';
}})()"#,
        lookup_js(locator)
    );
    session.cdp.evaluate_js(&js).await?;
    Ok(())
}

/// Clear the element and type text into it.
pub async fn send_text(
    session: &BrowserSession,
    locator: &Locator,
    text: &str,
    config: &BrowserConfig,
) -> Result<()> {
    wait_for_element(&session.cdp, locator, WaitCondition::Interactable, config).await?;
    let js = format!(
        r#"(() => {{
  const el = {};
  el.scrollIntoView({{block: 'center'}});
  el.focus();
  if ('value' in el) {{
    el.value = '';
    el.dispatchEvent(new Event('input', {{bubbles: true}}));
  }}
  return 'focused';
}})()"#,
        lookup_js(locator)
    );
    session.cdp.evaluate_js(&js).await?;
    session.cdp.insert_text(text).await?;
    Ok(())
}

/// Map a caller-supplied key name to CDP (key, code) values.
pub fn normalize_key(key: &str) -> Result<(String, String)> {
    let normalized = key.trim();
    let pair = match normalized.to_uppercase().as_str() {
        "ENTER" | "RETURN" => ("Enter", "Enter"),
        "TAB" => ("Tab", "Tab"),
        "ESCAPE" | "ESC" => ("Escape", "Escape"),
        "BACKSPACE" => ("Backspace", "Backspace"),
        "DELETE" => ("Delete", "Delete"),
        "SPACE" => (" ", "Space"),
        "ARROW_UP" | "UP" => ("ArrowUp", "ArrowUp"),
        "ARROW_DOWN" | "DOWN" => ("ArrowDown", "ArrowDown"),
        "ARROW_LEFT" | "LEFT" => ("ArrowLeft", "ArrowLeft"),
        "ARROW_RIGHT" | "RIGHT" => ("ArrowRight", "ArrowRight"),
        "PAGE_UP" => ("PageUp", "PageUp"),
        "PAGE_DOWN" => ("PageDown", "PageDown"),
        "HOME" => ("Home", "Home"),
        "END" => ("End", "End"),
        _ => {
            if normalized.chars().count() == 1 {
                return Ok((normalized.to_string(), format!("Key{}", normalized.to_uppercase())));
            }
            return Err(Error::Validation(format!("Unknown key '{}'", key)));
        }
    };
    Ok((pair.0.to_string(), pair.1.to_string()))
}

/// Press a key, optionally focusing a target element first.
pub async fn press_key(
    session: &BrowserSession,
    key: &str,
    locator: Option<&Locator>,
    config: &BrowserConfig,
) -> Result<()> {
    let (key_name, code) = normalize_key(key)?;

    if let Some(loc) = locator {
        wait_for_element(&session.cdp, loc, WaitCondition::Interactable, config).await?;
        let js = format!("(() => {{ const el = {}; el.focus(); return 'ok'; }})()", lookup_js(loc));
        session.cdp.evaluate_js(&js).await?;
    }

    session.cdp.dispatch_key_event("keyDown", &key_name, &code).await?;
    session.cdp.dispatch_key_event("keyUp", &key_name, &code).await?;
    Ok(())
}

/// Select a dropdown option by text, value, or index, firing change events
/// so framework listeners observe the update.
pub async fn select_option(
    session: &BrowserSession,
    locator: &Locator,
    option: &OptionSpec,
    config: &BrowserConfig,
) -> Result<()> {
    wait_for_element(&session.cdp, locator, WaitCondition::Interactable, config).await?;
    let criterion = match option {
        OptionSpec::Text(t) => format!("o.textContent.trim() === {}", json!(t)),
        OptionSpec::Value(v) => format!("o.value === {}", json!(v)),
        OptionSpec::Index(i) => format!("idx === {}", i),
    };
    let js = format!(
        r#"(() => {{
  const el = {};
  const options = Array.from(el.options || []);
  let found = -1;
  options.forEach((o, idx) => {{ if (found < 0 && ({})) found = idx; }});
  if (found < 0) return 'option_not_found';
  el.selectedIndex = found;
  el.dispatchEvent(new Event('input', {{bubbles: true}}));
  el.dispatchEvent(new Event('change', {{bubbles: true}}));
  return 'selected';
}})()"#,
        lookup_js(locator),
        criterion
    );
    let result = session.cdp.evaluate_string(&js).await?;
    if result.as_deref() == Some("option_not_found") {
        return Err(Error::Validation(format!(
            "No matching option in dropdown {} for {:?}",
            locator, option
        )));
    }
    Ok(())
}

/// Read the rendered text of an element.
pub async fn read_text(
    session: &BrowserSession,
    locator: &Locator,
    config: &BrowserConfig,
) -> Result<String> {
    wait_for_element(&session.cdp, locator, WaitCondition::Visible, config).await?;
    let js = format!(
        "(() => {{ const el = {}; return (el.innerText || el.textContent || '').trim(); }})()",
        lookup_js(locator)
    );
    Ok(session.cdp.evaluate_string(&js).await?.unwrap_or_default())
}

/// Read an attribute (or matching property) of an element. A missing
/// attribute is a normal None, not an error.
pub async fn read_attribute(
    session: &BrowserSession,
    locator: &Locator,
    attribute: &str,
    config: &BrowserConfig,
) -> Result<Option<String>> {
    wait_for_element(&session.cdp, locator, WaitCondition::Present, config).await?;
    let attr = json!(attribute).to_string();
    let js = format!(
        r#"(() => {{
  const el = {};
  const a = el.getAttribute({});
  if (a !== null) return a;
  const p = el[{}];
  if (p === undefined || p === null) return null;
  return String(p);
}})()"#,
        lookup_js(locator),
        attr,
        attr
    );
    session.cdp.evaluate_string(&js).await
}

/// Check that an element's text contains the expected string
/// (case-insensitive). A mismatch is a negative outcome, not an error.
pub async fn verify_text(
    session: &BrowserSession,
    locator: &Locator,
    expected: &str,
    config: &BrowserConfig,
) -> Result<VerifyOutcome> {
    let actual = read_text(session, locator, config).await?;
    let success = actual.to_lowercase().contains(&expected.to_lowercase());
    let message = if success {
        format!("Verified: element {} contains '{}'", locator, expected)
    } else {
        format!(
            "Verification failed: element {} text is '{}', expected to contain '{}'",
            locator,
            webpilot_core::safe_truncate(&actual, 200),
            expected
        )
    };
    Ok(VerifyOutcome {
        success,
        message,
        locator: locator.clone(),
    })
}

/// Scroll an element into the center of the viewport.
pub async fn scroll_into_view(
    session: &BrowserSession,
    locator: &Locator,
    config: &BrowserConfig,
) -> Result<()> {
    wait_for_element(&session.cdp, locator, WaitCondition::Present, config).await?;
    let js = format!(
        "(() => {{ const el = {}; el.scrollIntoView({{block: 'center', behavior: 'instant'}}); return 'ok'; }})()",
        lookup_js(locator)
    );
    session.cdp.evaluate_js(&js).await?;
    Ok(())
}

/// Scroll the page by a viewport (up/down) or to an extreme (top/bottom).
pub async fn scroll_page(session: &BrowserSession, direction: ScrollDirection) -> Result<()> {
    let js = match direction {
        ScrollDirection::Up => "window.scrollBy(0, -window.innerHeight)".to_string(),
        ScrollDirection::Down => "window.scrollBy(0, window.innerHeight)".to_string(),
        ScrollDirection::Top => "window.scrollTo(0, 0)".to_string(),
        ScrollDirection::Bottom => "window.scrollTo(0, document.body.scrollHeight)".to_string(),
    };
    session.cdp.evaluate_js(&js).await?;
    Ok(())
}

/// Wait until the document reaches readyState 'complete'.
pub async fn wait_for_page_load(
    session: &BrowserSession,
    timeout_secs: u64,
    config: &BrowserConfig,
) -> Result<()> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let poll = std::time::Duration::from_millis(config.poll_interval_ms);

    loop {
        let state = session
            .cdp
            .evaluate_string("document.readyState")
            .await?
            .unwrap_or_default();
        if state == "complete" {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(Error::LocateTimeout(format!(
                "Page did not finish loading within {}s (readyState: {})",
                timeout_secs, state
            )));
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_js_css() {
        let js = lookup_js(&Locator::css("#main .btn"));
        assert_eq!(js, r##"document.querySelector("#main .btn")"##);
    }

    #[test]
    fn test_lookup_js_xpath_escapes_quotes() {
        let js = lookup_js(&Locator::xpath(r#"//*[@id="go"]"#));
        assert!(js.starts_with("document.evaluate(\"//*[@id=\\\"go\\\"]\""));
        assert!(js.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_lookup_js_id_and_name() {
        assert_eq!(
            lookup_js(&Locator::new(Strategy::Id, "go")),
            r#"document.getElementById("go")"#
        );
        assert!(lookup_js(&Locator::new(Strategy::Name, "q")).contains("getElementsByName"));
    }

    #[test]
    fn test_lookup_js_link_text() {
        let exact = lookup_js(&Locator::new(Strategy::LinkText, "Sign in"));
        assert!(exact.contains("textContent.trim() === \"Sign in\""));
        let partial = lookup_js(&Locator::new(Strategy::PartialLinkText, "Sign"));
        assert!(partial.contains("textContent.includes(\"Sign\")"));
    }

    #[test]
    fn test_normalize_key_named() {
        assert_eq!(normalize_key("ENTER").unwrap(), ("Enter".into(), "Enter".into()));
        assert_eq!(normalize_key("enter").unwrap(), ("Enter".into(), "Enter".into()));
        assert_eq!(normalize_key("Tab").unwrap(), ("Tab".into(), "Tab".into()));
        assert_eq!(normalize_key("esc").unwrap(), ("Escape".into(), "Escape".into()));
    }

    #[test]
    fn test_normalize_key_single_char() {
        assert_eq!(normalize_key("a").unwrap(), ("a".into(), "KeyA".into()));
    }

    #[test]
    fn test_normalize_key_unknown() {
        assert!(matches!(normalize_key("HYPERDRIVE"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_scroll_direction_parse() {
        assert_eq!(ScrollDirection::parse("Down").unwrap(), ScrollDirection::Down);
        assert_eq!(ScrollDirection::parse("TOP").unwrap(), ScrollDirection::Top);
        assert!(ScrollDirection::parse("sideways").is_err());
    }

    #[test]
    fn test_option_spec_parse() {
        assert_eq!(
            OptionSpec::parse("visible_text", "Canada").unwrap(),
            OptionSpec::Text("Canada".into())
        );
        assert_eq!(OptionSpec::parse("value", "ca").unwrap(), OptionSpec::Value("ca".into()));
        assert_eq!(OptionSpec::parse("index", "2").unwrap(), OptionSpec::Index(2));
        assert!(OptionSpec::parse("index", "two").is_err());
        assert!(OptionSpec::parse("color", "red").is_err());
    }
}
