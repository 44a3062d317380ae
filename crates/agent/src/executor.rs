//! Tool execution against a live browser.
//!
//! The executor owns the one browser session for the run. Everything except
//! start_browser and the pure waits requires it; operating without one is
//! the only operation error that aborts the run.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use webpilot_browser::{actions, resolve, BrowserSession, PageSnapshot};
use webpilot_core::{Candidate, Config, ContextEvent, Error, Result};

use crate::context::correlate;
use crate::tools::ToolCall;

/// Executes validated tool calls. The dispatch loop only sees this trait,
/// so tests can substitute a scripted executor.
#[async_trait]
pub trait ToolExecutor: Send {
    /// Run one operation, returning the text fed back to the oracle.
    async fn execute(&mut self, call: &ToolCall) -> Result<String>;

    /// Tear down any live session. Idempotent.
    async fn shutdown(&mut self);
}

/// Production executor backed by a CDP browser session.
pub struct BrowserExecutor {
    config: Config,
    context: Vec<ContextEvent>,
    session: Option<BrowserSession>,
}

impl BrowserExecutor {
    pub fn new(config: Config, context: Vec<ContextEvent>) -> Self {
        Self {
            config,
            context,
            session: None,
        }
    }

    fn session(&self) -> Result<&BrowserSession> {
        self.session.as_ref().ok_or(Error::SessionNotStarted)
    }

    /// Resolve an element query: recorded context first, then the scan
    /// pipeline against a fresh snapshot. Either path needs a live session;
    /// a context hit still points at a page that must exist.
    async fn resolve_element(&self, query: &str, container: Option<&str>) -> Result<String> {
        let session = self.session()?;

        // A recorded event that matches the query supplies its locator
        // directly, no scan.
        if container.is_none() {
            if let Some(locator) = correlate(query, &self.context) {
                info!(query = query, locator = %locator, "Query resolved from recorded context");
                let candidate = Candidate {
                    tag: String::new(),
                    name: query.to_string(),
                    selector: locator.value,
                    score: 1000,
                };
                return Ok(serde_json::to_string(&json!([candidate]))?);
            }
        }

        let snapshot = PageSnapshot::harvest(&session.cdp).await?;
        let candidates = resolve(&snapshot, query, container, &self.config.scoring)?;
        if candidates.is_empty() {
            return Ok(format!(
                "No matching elements found for '{}'. Try a different description, scroll the page, or fall back to a direct locator.",
                query
            ));
        }
        Ok(serde_json::to_string(&candidates)?)
    }
}

#[async_trait]
impl ToolExecutor for BrowserExecutor {
    async fn execute(&mut self, call: &ToolCall) -> Result<String> {
        let result = self.dispatch(call).await;
        // Fixed settle pause after every successful action so the page can
        // react before the next decision.
        if result.is_ok() && !matches!(call, ToolCall::CloseBrowser) {
            tokio::time::sleep(std::time::Duration::from_millis(
                self.config.browser.post_action_delay_ms,
            ))
            .await;
        }
        result
    }

    async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("Tearing down browser session");
            session.close().await;
        }
    }
}

impl BrowserExecutor {
    async fn dispatch(&mut self, call: &ToolCall) -> Result<String> {
        let browser_cfg = self.config.browser.clone();
        match call {
            ToolCall::StartBrowser { headed } => {
                if self.session.is_some() {
                    return Ok("Browser is already running.".to_string());
                }
                let mut cfg = browser_cfg;
                cfg.headed = cfg.headed || *headed;
                let session = BrowserSession::launch(&cfg).await?;
                self.session = Some(session);
                Ok("Browser started.".to_string())
            }
            ToolCall::MaximizeWindow => {
                let session = self.session()?;
                session.cdp.set_viewport(1920, 1080).await?;
                Ok("Window maximized.".to_string())
            }
            ToolCall::NavigateToUrl { url } => {
                let session = self.session()?;
                session.cdp.navigate(url).await?;
                actions::wait_for_page_load(session, 30, &browser_cfg).await?;
                if let Some(session) = self.session.as_mut() {
                    session.current_url = Some(url.clone());
                }
                Ok(format!("Navigated to {}", url))
            }
            ToolCall::ResolveElement { query, container } => {
                self.resolve_element(query, container.as_deref()).await
            }
            ToolCall::Click { locator } => {
                let session = self.session()?;
                actions::click(session, locator, &browser_cfg).await?;
                Ok(format!("Clicked element {}", locator))
            }
            ToolCall::SendKeys { locator, text } => {
                let session = self.session()?;
                actions::send_text(session, locator, text, &browser_cfg).await?;
                Ok(format!("Typed '{}' into element {}", text, locator))
            }
            ToolCall::PressKey { key, locator } => {
                let session = self.session()?;
                actions::press_key(session, key, locator.as_ref(), &browser_cfg).await?;
                Ok(format!("Pressed {}", key))
            }
            ToolCall::SelectOption { locator, option } => {
                let session = self.session()?;
                actions::select_option(session, locator, option, &browser_cfg).await?;
                Ok(format!("Selected {:?} in dropdown {}", option, locator))
            }
            ToolCall::VerifyText { locator, text } => {
                let session = self.session()?;
                let outcome = actions::verify_text(session, locator, text, &browser_cfg).await?;
                Ok(serde_json::to_string(&outcome)?)
            }
            ToolCall::GetAttribute { locator, attribute } => {
                let session = self.session()?;
                let value = actions::read_attribute(session, locator, attribute, &browser_cfg).await?;
                Ok(match value {
                    Some(v) => format!("Attribute '{}' = '{}'", attribute, v),
                    None => format!("Attribute '{}' is not present on element {}", attribute, locator),
                })
            }
            ToolCall::ReadText { locator } => {
                let session = self.session()?;
                let text = actions::read_text(session, locator, &browser_cfg).await?;
                Ok(format!("Element text: {}", text))
            }
            ToolCall::ScrollIntoView { locator } => {
                let session = self.session()?;
                actions::scroll_into_view(session, locator, &browser_cfg).await?;
                Ok(format!("Scrolled element {} into view", locator))
            }
            ToolCall::ScrollPage { direction } => {
                let session = self.session()?;
                actions::scroll_page(session, *direction).await?;
                Ok(format!("Scrolled page {:?}", direction))
            }
            ToolCall::WaitSeconds { seconds } => {
                let clamped = seconds.clamp(0.0, 60.0);
                tokio::time::sleep(std::time::Duration::from_secs_f64(clamped)).await;
                Ok(format!("Waited {} seconds", clamped))
            }
            ToolCall::WaitForPageLoad { timeout_secs } => {
                let session = self.session()?;
                actions::wait_for_page_load(session, *timeout_secs, &browser_cfg).await?;
                Ok("Page finished loading.".to_string())
            }
            ToolCall::CloseBrowser => {
                match self.session.take() {
                    Some(mut session) => {
                        session.close().await;
                        Ok("Browser closed.".to_string())
                    }
                    None => Ok("Browser was not running.".to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::EventTarget;

    fn recorded_click(description: &str, xpath: &str) -> ContextEvent {
        ContextEvent {
            id: "e1".to_string(),
            target: EventTarget {
                selector: String::new(),
                xpath: xpath.to_string(),
            },
            timestamp: 0,
            kind: "click".to_string(),
            url: String::new(),
            value: None,
            element_description: Some(description.to_string()),
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.browser.post_action_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_resolution_requires_session_even_with_context() {
        let events = vec![recorded_click(
            "Clicked the login button",
            "//*[@id=\"login\"]",
        )];
        let mut executor = BrowserExecutor::new(fast_config(), events);
        // A correlated query is not enough: the recorded locator targets a
        // page, so resolution without a session is the fatal ownership error.
        let err = executor
            .execute(&ToolCall::ResolveElement {
                query: "login button".to_string(),
                container: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotStarted));
    }

    #[tokio::test]
    async fn test_uncorrelated_query_needs_session() {
        let events = vec![recorded_click("Clicked the logout link", "//*[@id=\"out\"]")];
        let mut executor = BrowserExecutor::new(fast_config(), events);
        let err = executor
            .execute(&ToolCall::ResolveElement {
                query: "purchase history table".to_string(),
                container: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotStarted));
    }

    #[tokio::test]
    async fn test_scoped_resolution_ignores_context() {
        // A container scope forces a real scan even when context would match.
        let events = vec![recorded_click(
            "Clicked the login button",
            "//*[@id=\"login\"]",
        )];
        let mut executor = BrowserExecutor::new(fast_config(), events);
        let err = executor
            .execute(&ToolCall::ResolveElement {
                query: "login button".to_string(),
                container: Some("//*[@id=\"form\"]".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotStarted));
    }

    #[tokio::test]
    async fn test_operations_without_session_fail_typed() {
        let mut executor = BrowserExecutor::new(fast_config(), vec![]);
        let err = executor
            .execute(&ToolCall::MaximizeWindow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotStarted));
    }

    #[tokio::test]
    async fn test_close_without_session_is_harmless() {
        let mut executor = BrowserExecutor::new(fast_config(), vec![]);
        let msg = executor.execute(&ToolCall::CloseBrowser).await.unwrap();
        assert!(msg.contains("not running"));
    }
}
