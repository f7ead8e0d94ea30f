//! [`LLMProviderConfig`] — provider descriptor parallel to
//! [`crate::connector::config::ConnectorConfig`] (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connector::config::defaults;

/// Recognised LLM provider names (spec §4.5's enum, spec §6's env loaders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LLMProviderName {
    Bedrock,
    Ollama,
    Openai,
    Anthropic,
}

impl LLMProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::str::FromStr for LLMProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bedrock" => Ok(Self::Bedrock),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unrecognised LLM provider `{other}`")),
        }
    }
}

/// Provider descriptor (spec §3 `LLMProviderConfig`). Listing callers sort
/// by `priority` DESC then `weight` DESC and drop disabled entries before
/// returning (spec §3, §4.7).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LLMProviderConfig {
    pub provider_name: LLMProviderName,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default, skip_serializing)]
    pub credentials: HashMap<String, String>,
    #[serde(default = "defaults::priority")]
    pub priority: i32,
    #[serde(default = "defaults::weight")]
    pub weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub cost_per_1k_input_tokens: Option<f64>,
    #[serde(default)]
    pub cost_per_1k_output_tokens: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

/// Sort providers by `priority` DESC, `weight` DESC and drop disabled
/// entries (spec §3, invoked wherever a list of providers is returned to a
/// caller).
pub fn sort_and_filter_enabled(mut providers: Vec<LLMProviderConfig>) -> Vec<LLMProviderConfig> {
    providers.retain(|p| p.enabled);
    providers.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal))
    });
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, priority: i32, weight: f64, enabled: bool) -> LLMProviderConfig {
        LLMProviderConfig {
            provider_name: name.parse().unwrap(),
            display_name: None,
            config: HashMap::new(),
            credentials: HashMap::new(),
            priority,
            weight,
            enabled,
            health_status: None,
            cost_per_1k_input_tokens: None,
            cost_per_1k_output_tokens: None,
        }
    }

    #[test]
    fn sorts_by_priority_desc_then_weight_desc() {
        let providers = vec![
            provider("openai", 5, 0.5, true),
            provider("anthropic", 10, 0.1, true),
            provider("bedrock", 10, 0.9, true),
        ];
        let sorted = sort_and_filter_enabled(providers);
        let names: Vec<&str> = sorted.iter().map(|p| p.provider_name.as_str()).collect();
        assert_eq!(names, vec!["bedrock", "anthropic", "openai"]);
    }

    #[test]
    fn drops_disabled_entries() {
        let providers = vec![provider("openai", 5, 0.5, false), provider("anthropic", 5, 0.5, true)];
        let sorted = sort_and_filter_enabled(providers);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].provider_name.as_str(), "anthropic");
    }

    #[test]
    fn provider_name_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LLMProviderName>().unwrap(), LLMProviderName::Openai);
    }

    #[test]
    fn unrecognised_provider_name_is_rejected() {
        assert!("made_up".parse::<LLMProviderName>().is_err());
    }
}
