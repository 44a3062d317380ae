use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Turn ceiling for the dispatch loop. Exceeding it forcibly terminates
    /// the run and tears down the session.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,
    #[serde(default = "default_llm_retry_delay_ms")]
    pub llm_retry_delay_ms: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_turns() -> u32 {
    40
}

fn default_llm_max_retries() -> u32 {
    3
}

fn default_llm_retry_delay_ms() -> u64 {
    2000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            api_base: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_turns: default_max_turns(),
            llm_max_retries: default_llm_max_retries(),
            llm_retry_delay_ms: default_llm_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default)]
    pub headed: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Upper bound for a locating primitive to reach its required condition.
    #[serde(default = "default_locate_timeout_ms")]
    pub locate_timeout_ms: u64,
    /// Poll interval while waiting for an element condition.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause after each successful action, giving the page time to settle.
    #[serde(default = "default_post_action_delay_ms")]
    pub post_action_delay_ms: u64,
}

fn default_window_width() -> u32 {
    1080
}

fn default_window_height() -> u32 {
    720
}

fn default_locate_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_post_action_delay_ms() -> u64 {
    2000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headed: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            locate_timeout_ms: default_locate_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            post_action_delay_ms: default_post_action_delay_ms(),
        }
    }
}

/// Scoring constants for the element resolution pipeline. Empirically chosen
/// in the original ranking script; kept as tunables rather than hard
/// invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringParams {
    #[serde(default = "default_exact_match_points")]
    pub exact_match_points: f64,
    #[serde(default = "default_token_match_points")]
    pub token_match_points: f64,
    #[serde(default = "default_near_miss_points")]
    pub near_miss_points: f64,
    /// Maximum edit distance for typo tolerance.
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_name_max_chars")]
    pub name_max_chars: usize,
    /// Weight of each text source, ordered by specificity.
    #[serde(default = "default_content_weight")]
    pub content_weight: f64,
    #[serde(default = "default_value_weight")]
    pub value_weight: f64,
    #[serde(default = "default_placeholder_weight")]
    pub placeholder_weight: f64,
    #[serde(default = "default_aria_label_weight")]
    pub aria_label_weight: f64,
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,
    #[serde(default = "default_id_weight")]
    pub id_weight: f64,
    #[serde(default = "default_test_id_weight")]
    pub test_id_weight: f64,
    /// Per-tag final multiplier. Tags not listed here multiply by 1.0.
    #[serde(default = "default_tag_multipliers")]
    pub tag_multipliers: std::collections::HashMap<String, f64>,
}

fn default_content_weight() -> f64 {
    1.0
}

fn default_value_weight() -> f64 {
    1.5
}

fn default_placeholder_weight() -> f64 {
    1.5
}

fn default_aria_label_weight() -> f64 {
    2.0
}

fn default_name_weight() -> f64 {
    2.0
}

fn default_id_weight() -> f64 {
    2.5
}

fn default_test_id_weight() -> f64 {
    3.0
}

fn default_tag_multipliers() -> std::collections::HashMap<String, f64> {
    [
        ("a", 1.5),
        ("button", 1.5),
        ("input", 1.4),
        ("select", 1.3),
        ("textarea", 1.3),
        ("div", 0.9),
        ("span", 0.95),
        ("body", 0.1),
        ("html", 0.1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_exact_match_points() -> f64 {
    100.0
}

fn default_token_match_points() -> f64 {
    20.0
}

fn default_near_miss_points() -> f64 {
    10.0
}

fn default_max_edit_distance() -> usize {
    2
}

fn default_max_results() -> usize {
    15
}

fn default_name_max_chars() -> usize {
    100
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            exact_match_points: default_exact_match_points(),
            token_match_points: default_token_match_points(),
            near_miss_points: default_near_miss_points(),
            max_edit_distance: default_max_edit_distance(),
            max_results: default_max_results(),
            name_max_chars: default_name_max_chars(),
            content_weight: default_content_weight(),
            value_weight: default_value_weight(),
            placeholder_weight: default_placeholder_weight(),
            aria_label_weight: default_aria_label_weight(),
            name_weight: default_name_weight(),
            id_weight: default_id_weight(),
            test_id_weight: default_test_id_weight(),
            tag_multipliers: default_tag_multipliers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scoring: ScoringParams,
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".webpilot"))
            .unwrap_or_else(|| PathBuf::from(".webpilot"))
            .join("config.json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// API key with environment fallback, matching how the original loads
    /// credentials from the process environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.agent.api_key.is_empty() {
            return Some(self.agent.api_key.clone());
        }
        std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
    }
}
