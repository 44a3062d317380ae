use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Canonical locator strategies. Boundary tokens are normalized through
/// [`Strategy::parse`] before any use; nothing downstream ever sees a raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Css,
    #[serde(rename = "xpath")]
    XPath,
    Id,
    Name,
    ClassName,
    TagName,
    LinkText,
    PartialLinkText,
}

impl Strategy {
    /// Normalize a caller-supplied strategy token (case-insensitive).
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "css" | "css_selector" | "css selector" => Ok(Self::Css),
            "xpath" | "fullxpath" => Ok(Self::XPath),
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "class_name" => Ok(Self::ClassName),
            "tag_name" => Ok(Self::TagName),
            "link_text" => Ok(Self::LinkText),
            "partial_link_text" => Ok(Self::PartialLinkText),
            other => Err(Error::UnsupportedStrategy(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Id => "id",
            Self::Name => "name",
            Self::ClassName => "class_name",
            Self::TagName => "tag_name",
            Self::LinkText => "link_text",
            Self::PartialLinkText => "partial_link_text",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (strategy, value) pair sufficient to re-find an element without holding
/// a live reference. The only value that crosses the resolution/action
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

/// A scored, scanned element eligible as an action target. Transient:
/// recomputed on every resolution call, never cached across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub tag: String,
    pub name: String,
    pub selector: String,
    pub score: i64,
}

/// Target element of a recorded browser event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventTarget {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub xpath: String,
}

/// An externally recorded prior interaction, used to bias or shortcut
/// resolution. Events arrive as an ordered sequence; order matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEvent {
    pub id: String,
    pub target: EventTarget,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Natural-language description of the action's intent, added by the
    /// enrichment pass of the recorder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_description: Option<String>,
}

impl ContextEvent {
    /// The recorded locator for this event: xpath preferred, css fallback.
    pub fn locator(&self) -> Option<Locator> {
        if !self.target.xpath.is_empty() {
            Some(Locator::xpath(self.target.xpath.clone()))
        } else if !self.target.selector.is_empty() {
            Some(Locator::css(self.target.selector.clone()))
        } else {
            None
        }
    }
}

/// Structured result of a text verification. A failed check is a normal
/// negative outcome, not an error; the locator is carried so the next
/// operation can reuse it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub message: String,
    pub locator: Locator,
}

/// How a run ended. A ceiling-exceeded run is reported distinctly from one
/// that produced a terminal answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { answer: String, turns: u32 },
    CeilingExceeded { turns: u32 },
}

/// A tool call request that serializes to the OpenAI-compatible format:
/// `{id, type: "function", function: {name, arguments}}`
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl Serialize for ToolCallRequest {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry(
            "function",
            &serde_json::json!({
                "name": self.name,
                "arguments": self.arguments.to_string()
            }),
        )?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ToolCallRequest {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("expected object"))?;

        let id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // Wire format: {id, type, function: {name, arguments}}
        if let Some(func) = obj.get("function").and_then(|v| v.as_object()) {
            let name = func
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let arguments = match func.get("arguments") {
                Some(serde_json::Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
                    warn!(error = %e, raw = %s, "Failed to parse tool call arguments as JSON, using empty object");
                    serde_json::Value::Object(serde_json::Map::new())
                }),
                Some(v) => v.clone(),
                None => serde_json::Value::Object(serde_json::Map::new()),
            };
            return Ok(ToolCallRequest { id, name, arguments });
        }

        // Flat format: {id, name, arguments}
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let arguments = obj
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        Ok(ToolCallRequest { id, name, arguments })
    }
}

/// One decision-oracle output: a terminal answer, or one or more requested
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OracleResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: String,
    pub usage: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: serde_json::Value::String(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::Value::String(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: serde_json::Value::String(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: serde_json::Value::String(content.to_string()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
            name: None,
        }
    }
}
