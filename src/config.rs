use std::env;
use std::fmt;

use crate::documents::{DocumentLimit, OversizePolicy};

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";
const DEFAULT_MAX_TOKENS: u32 = 8024;
const DEFAULT_SITE_URL: &str = "https://yoursite.com";
const DEFAULT_SITE_NAME: &str = "Your Site Name";
const DEFAULT_DOCUMENT_MAX_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub site_url: String,
    pub site_name: String,
    pub system_prompt: Option<String>,
    pub model_timeout_secs: Option<u64>,
    pub context_max_messages: Option<usize>,
    pub document_limit: DocumentLimit,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let document_limit = DocumentLimit {
            max_bytes: parse_document_max_bytes(get_var("DOCUMENT_MAX_BYTES").as_deref()),
            on_oversize: parse_oversize_policy(get_var("DOCUMENT_OVERSIZE").as_deref()),
        };

        Self {
            api_key: non_empty(get_var("OPENROUTER_API_KEY")),
            api_url: non_empty(get_var("OPENROUTER_API_URL"))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: non_empty(get_var("MODEL")).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_max_tokens(get_var("MAX_TOKENS").as_deref()),
            site_url: non_empty(get_var("YOUR_SITE_URL"))
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            site_name: non_empty(get_var("YOUR_SITE_NAME"))
                .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
            system_prompt: non_empty(get_var("SYSTEM_PROMPT")),
            model_timeout_secs: parse_positive(get_var("MODEL_TIMEOUT_SECS").as_deref()),
            context_max_messages: parse_positive(get_var("CONTEXT_MAX_MESSAGES").as_deref()),
            document_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env_with(|_| None)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .field("system_prompt", &self.system_prompt)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("context_max_messages", &self.context_max_messages)
            .field("document_limit", &self.document_limit)
            .finish()
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn parse_positive<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

fn parse_max_tokens(raw: Option<&str>) -> u32 {
    parse_positive(raw).unwrap_or(DEFAULT_MAX_TOKENS)
}

fn parse_document_max_bytes(raw: Option<&str>) -> Option<usize> {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("0" | "none" | "unlimited") => None,
        Some(value) => Some(
            value
                .parse::<usize>()
                .unwrap_or(DEFAULT_DOCUMENT_MAX_BYTES),
        ),
        None => Some(DEFAULT_DOCUMENT_MAX_BYTES),
    }
}

fn parse_oversize_policy(raw: Option<&str>) -> OversizePolicy {
    match raw.unwrap_or("reject").trim().to_ascii_lowercase().as_str() {
        "truncate" => OversizePolicy::Truncate,
        _ => OversizePolicy::Reject,
    }
}
