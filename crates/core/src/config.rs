use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkout::DEFAULT_SITE_URL;
use crate::domain::pitch::{default_pitches, Pitch};
use crate::domain::pitch_slot::PITCH_SLOT_SEPARATOR;
use crate::rules::{default_rule_specs, RuleSpec};

pub const DEFAULT_API_ENDPOINT: &str = "https://api-v2.mylocalpitch.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub provider: ProviderConfig,
    pub polling: PollingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pitches: Vec<Pitch>,
    pub rules: Vec<RuleSpec>,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub bot_user_id: Option<String>,
    pub notify_channel: Option<String>,
    pub bot_name: String,
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub api_endpoint: String,
    pub site_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub window_days: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_notify_channel: Option<String>,
    pub provider_api_endpoint: Option<String>,
    pub polling_interval_secs: Option<u64>,
    pub pitches: Option<Vec<Pitch>>,
    pub rules: Option<Vec<RuleSpec>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
    /// Accept missing or malformed Slack tokens. For commands that only
    /// talk to the booking provider.
    pub skip_slack_validation: bool,
}

impl LoadOptions {
    pub fn provider_only() -> Self {
        Self { skip_slack_validation: true, ..Self::default() }
    }
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
    #[error("required credential `{0}` is not set")]
    MissingCredential(&'static str),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                bot_user_id: None,
                notify_channel: None,
                bot_name: "roborooney".to_string(),
            },
            provider: ProviderConfig {
                api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
                site_url: DEFAULT_SITE_URL.to_string(),
                timeout_secs: 20,
            },
            polling: PollingConfig { interval_secs: 300, window_days: 14 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            pitches: default_pitches(),
            rules: default_rule_specs(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("pitchwatch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        if options.skip_slack_validation {
            config.validate_without_slack()?;
        } else {
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(bot_user_id) = slack.bot_user_id {
                self.slack.bot_user_id = Some(bot_user_id);
            }
            if let Some(notify_channel) = slack.notify_channel {
                self.slack.notify_channel = Some(notify_channel);
            }
            if let Some(bot_name) = slack.bot_name {
                self.slack.bot_name = bot_name;
            }
        }

        if let Some(provider) = patch.provider {
            if let Some(api_endpoint) = provider.api_endpoint {
                self.provider.api_endpoint = api_endpoint;
            }
            if let Some(site_url) = provider.site_url {
                self.provider.site_url = site_url;
            }
            if let Some(timeout_secs) = provider.timeout_secs {
                self.provider.timeout_secs = timeout_secs;
            }
        }

        if let Some(polling) = patch.polling {
            if let Some(interval_secs) = polling.interval_secs {
                self.polling.interval_secs = interval_secs;
            }
            if let Some(window_days) = polling.window_days {
                self.polling.window_days = window_days;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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

        if let Some(pitches) = patch.pitches {
            self.pitches = pitches;
        }
        if let Some(rules) = patch.rules {
            self.rules = rules;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PITCHWATCH_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("PITCHWATCH_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PITCHWATCH_SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = Some(value);
        }
        if let Some(value) = read_env("PITCHWATCH_SLACK_NOTIFY_CHANNEL") {
            self.slack.notify_channel = Some(value);
        }
        if let Some(value) = read_env("PITCHWATCH_SLACK_BOT_NAME") {
            self.slack.bot_name = value;
        }

        if let Some(value) = read_env("PITCHWATCH_PROVIDER_API_ENDPOINT") {
            self.provider.api_endpoint = value;
        }
        if let Some(value) = read_env("PITCHWATCH_PROVIDER_SITE_URL") {
            self.provider.site_url = value;
        }
        if let Some(value) = read_env("PITCHWATCH_PROVIDER_TIMEOUT_SECS") {
            self.provider.timeout_secs = parse_u64("PITCHWATCH_PROVIDER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PITCHWATCH_POLLING_INTERVAL_SECS") {
            self.polling.interval_secs = parse_u64("PITCHWATCH_POLLING_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("PITCHWATCH_POLLING_WINDOW_DAYS") {
            self.polling.window_days = parse_u32("PITCHWATCH_POLLING_WINDOW_DAYS", &value)?;
        }

        if let Some(value) = read_env("PITCHWATCH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PITCHWATCH_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("PITCHWATCH_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PITCHWATCH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PITCHWATCH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PITCHWATCH_LOGGING_LEVEL").or_else(|| read_env("PITCHWATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PITCHWATCH_LOGGING_FORMAT").or_else(|| read_env("PITCHWATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(notify_channel) = overrides.slack_notify_channel {
            self.slack.notify_channel = Some(notify_channel);
        }
        if let Some(api_endpoint) = overrides.provider_api_endpoint {
            self.provider.api_endpoint = api_endpoint;
        }
        if let Some(interval_secs) = overrides.polling_interval_secs {
            self.polling.interval_secs = interval_secs;
        }
        if let Some(pitches) = overrides.pitches {
            self.pitches = pitches;
        }
        if let Some(rules) = overrides.rules {
            self.rules = rules;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        self.validate_without_slack()
    }

    pub fn validate_without_slack(&self) -> Result<(), ConfigError> {
        validate_provider(&self.provider)?;
        validate_polling(&self.polling)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_pitches(&self.pitches)?;
        validate_rules(&self.rules)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pitchwatch.toml"), PathBuf::from("config/pitchwatch.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.trim().is_empty() {
        return Err(ConfigError::MissingCredential("slack.app_token"));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::MissingCredential("slack.bot_token"));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if slack.bot_name.trim().is_empty() {
        return Err(ConfigError::Validation("slack.bot_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("provider.api_endpoint", &provider.api_endpoint), ("provider.site_url", &provider.site_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if provider.timeout_secs == 0 || provider.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "provider.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> Result<(), ConfigError> {
    if polling.interval_secs < 10 {
        return Err(ConfigError::Validation(
            "polling.interval_secs must be at least 10".to_string(),
        ));
    }

    if polling.window_days == 0 || polling.window_days > 14 {
        return Err(ConfigError::Validation(
            "polling.window_days must be in range 1..=14".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_pitches(pitches: &[Pitch]) -> Result<(), ConfigError> {
    if pitches.is_empty() {
        return Err(ConfigError::Validation(
            "pitches must list at least one pitch to monitor".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for pitch in pitches {
        let id = pitch.id.0.trim();
        if id.is_empty() {
            return Err(ConfigError::Validation("pitches[].id must not be empty".to_string()));
        }
        if id.contains(PITCH_SLOT_SEPARATOR) {
            return Err(ConfigError::Validation(format!(
                "pitch id `{id}` must not contain `{PITCH_SLOT_SEPARATOR}`"
            )));
        }
        if !seen_ids.insert(id.to_owned()) {
            return Err(ConfigError::Validation(format!("duplicate pitch id `{id}`")));
        }
        if pitch.name.trim().is_empty() || pitch.path.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "pitch `{id}` requires a name and a path"
            )));
        }
    }

    Ok(())
}

fn validate_rules(rules: &[RuleSpec]) -> Result<(), ConfigError> {
    for rule in rules {
        rule.validate().map_err(ConfigError::Validation)?;
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    provider: Option<ProviderPatch>,
    polling: Option<PollingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    pitches: Option<Vec<Pitch>>,
    rules: Option<Vec<RuleSpec>>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    bot_user_id: Option<String>,
    notify_channel: Option<String>,
    bot_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderPatch {
    api_endpoint: Option<String>,
    site_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PollingPatch {
    interval_secs: Option<u64>,
    window_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
