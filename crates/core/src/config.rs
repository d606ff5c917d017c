use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
    pub funnel: FunnelConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub base_url: String,
    pub api_token: SecretString,
    pub agent_sender_id: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct FunnelConfig {
    /// How many trailing turns are read when reconstructing state.
    pub history_window: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub whatsapp_base_url: Option<String>,
    pub whatsapp_api_token: Option<String>,
    pub llm_api_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub backend_base_url: Option<String>,
    pub backend_api_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://dirtybox.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                base_url: String::new(),
                api_token: String::new().into(),
                agent_sender_id: "dirtybox-agent".to_string(),
            },
            llm: LlmConfig {
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: String::new().into(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            backend: BackendConfig {
                base_url: String::new(),
                api_token: String::new().into(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            funnel: FunnelConfig { history_window: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsAppPatch>,
    llm: Option<LlmPatch>,
    backend: Option<BackendPatch>,
    server: Option<ServerPatch>,
    funnel: Option<FunnelPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    agent_sender_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FunnelPatch {
    history_window: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dirtybox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(base_url) = whatsapp.base_url {
                self.whatsapp.base_url = base_url;
            }
            if let Some(api_token_value) = whatsapp.api_token {
                self.whatsapp.api_token = api_token_value.into();
            }
            if let Some(agent_sender_id) = whatsapp.agent_sender_id {
                self.whatsapp.agent_sender_id = agent_sender_id;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_url) = llm.api_url {
                self.llm.api_url = api_url;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = api_key_value.into();
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(api_token_value) = backend.api_token {
                self.backend.api_token = api_token_value.into();
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(funnel) = patch.funnel {
            if let Some(history_window) = funnel.history_window {
                self.funnel.history_window = history_window;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DIRTYBOX_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DIRTYBOX_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("DIRTYBOX_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DIRTYBOX_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DIRTYBOX_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DIRTYBOX_WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = value;
        }
        if let Some(value) = read_env("DIRTYBOX_WHATSAPP_API_TOKEN") {
            self.whatsapp.api_token = value.into();
        }
        if let Some(value) = read_env("DIRTYBOX_WHATSAPP_AGENT_SENDER_ID") {
            self.whatsapp.agent_sender_id = value;
        }

        if let Some(value) = read_env("DIRTYBOX_LLM_API_URL") {
            self.llm.api_url = value;
        }
        if let Some(value) = read_env("DIRTYBOX_LLM_API_KEY") {
            self.llm.api_key = value.into();
        }
        if let Some(value) = read_env("DIRTYBOX_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DIRTYBOX_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DIRTYBOX_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DIRTYBOX_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("DIRTYBOX_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("DIRTYBOX_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("DIRTYBOX_BACKEND_API_TOKEN") {
            self.backend.api_token = value.into();
        }
        if let Some(value) = read_env("DIRTYBOX_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("DIRTYBOX_BACKEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DIRTYBOX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DIRTYBOX_SERVER_PORT") {
            self.server.port = parse_u16("DIRTYBOX_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DIRTYBOX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DIRTYBOX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("DIRTYBOX_FUNNEL_HISTORY_WINDOW") {
            self.funnel.history_window = parse_u32("DIRTYBOX_FUNNEL_HISTORY_WINDOW", &value)?;
        }

        if let Some(value) = read_env("DIRTYBOX_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("DIRTYBOX_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.whatsapp_base_url {
            self.whatsapp.base_url = base_url;
        }
        if let Some(api_token) = overrides.whatsapp_api_token {
            self.whatsapp.api_token = api_token.into();
        }
        if let Some(api_url) = overrides.llm_api_url {
            self.llm.api_url = api_url;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = api_key.into();
        }
        if let Some(base_url) = overrides.backend_base_url {
            self.backend.base_url = base_url;
        }
        if let Some(api_token) = overrides.backend_api_token {
            self.backend.api_token = api_token.into();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_owned()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_owned(),
            ));
        }
        if self.whatsapp.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("whatsapp.base_url must not be empty".to_owned()));
        }
        if self.whatsapp.api_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation("whatsapp.api_token must be set".to_owned()));
        }
        if self.llm.api_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.api_url must not be empty".to_owned()));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("backend.base_url must not be empty".to_owned()));
        }
        if self.funnel.history_window == 0 {
            return Err(ConfigError::Validation(
                "funnel.history_window must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dirtybox.toml"), PathBuf::from("config/dirtybox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}
