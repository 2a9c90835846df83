use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            email: EmailConfig::default(),
            scheduler: SchedulerConfig::default(),
            data_dir: None,
            log_level: Some("info".to_string()),
        }
    }
}

impl AppConfig {
    /// Names of required keys that are unset. Callers that need the LLM and
    /// the mailer refuse to start while this is non-empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.llm.api_key.as_deref().unwrap_or("").is_empty() {
            missing.push("llm.api_key");
        }
        if self.email.from_address.is_empty() {
            missing.push("email.from_address");
        }
        if self.email.password.is_empty() {
            missing.push("email.password");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider id: "deepseek", "openai" (any chat-completions compatible
    /// endpoint) or "anthropic".
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_provider() -> String {
    "deepseek".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
        }
    }
}

fn default_search_provider() -> String {
    "brave".to_string()
}

fn default_max_results() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub from_address: String,

    #[serde(default)]
    pub password: String,

    /// STARTTLS on the submission port when true; implicit TLS otherwise.
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            from_address: String::new(),
            password: String::new(),
            use_tls: default_use_tls(),
        }
    }
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_use_tls() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_hours")]
    pub default_interval_hours: u32,

    /// Articles and reports older than this are eligible for cleanup.
    #[serde(default = "default_max_history_days")]
    pub max_history_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_hours: default_interval_hours(),
            max_history_days: default_max_history_days(),
        }
    }
}

fn default_interval_hours() -> u32 {
    6
}

fn default_max_history_days() -> u32 {
    30
}
