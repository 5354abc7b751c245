use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::ConfigError;

/// OpenAI-compatible API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Credential used when the signed-in user has not set their own key
const DEFAULT_API_KEY: &str = "parley-default-key";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, friendly and accurate virtual assistant. Answer concisely and clearly.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on a single completion request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_api_key")]
    pub default_api_key: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub debug: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("parley"))
        .unwrap_or_else(|| PathBuf::from(".parley"))
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.into()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            default_api_key: default_api_key(),
            system_prompt: default_system_prompt(),
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("parley.db")
    }
}

/// Load configuration: defaults, then the global config file, then `./parley.json`,
/// then environment overrides. `config_dir` replaces the platform config directory.
pub fn load_config(config_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    let global_dir = config_dir.or_else(|| dirs::config_dir().map(|d| d.join("parley")));
    if let Some(dir) = global_dir {
        let global_path = dir.join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    let local_path = PathBuf::from("parley.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    apply_env(&mut config);

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "request_timeout_secs must be greater than zero".into(),
        ));
    }

    Ok(config)
}

fn read_config_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.base_url != default_base_url() {
        base.base_url = overlay.base_url;
    }
    if overlay.model != default_model() {
        base.model = overlay.model;
    }
    if overlay.temperature != default_temperature() {
        base.temperature = overlay.temperature;
    }
    if overlay.max_tokens != default_max_tokens() {
        base.max_tokens = overlay.max_tokens;
    }
    if overlay.request_timeout_secs != default_request_timeout_secs() {
        base.request_timeout_secs = overlay.request_timeout_secs;
    }
    if overlay.default_api_key != default_api_key() {
        base.default_api_key = overlay.default_api_key;
    }
    if overlay.system_prompt != default_system_prompt() {
        base.system_prompt = overlay.system_prompt;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn apply_env(config: &mut AppConfig) {
    for env_var in ["PARLEY_API_KEY", "OPENAI_API_KEY"] {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                config.default_api_key = key;
                break;
            }
        }
    }

    if let Ok(url) = std::env::var("PARLEY_BASE_URL") {
        if !url.is_empty() {
            config.base_url = url;
        }
    }
}
