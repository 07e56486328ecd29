use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pitchwatch_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".to_string());
    let pitches = config
        .pitches
        .iter()
        .map(|pitch| format!("{} ({})", pitch.id, pitch.name))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        Field {
            key: "slack.app_token",
            env_keys: &["PITCHWATCH_SLACK_APP_TOKEN"],
            value: redact_token(config.slack.app_token.expose_secret()),
        },
        Field {
            key: "slack.bot_token",
            env_keys: &["PITCHWATCH_SLACK_BOT_TOKEN"],
            value: redact_token(config.slack.bot_token.expose_secret()),
        },
        Field {
            key: "slack.bot_user_id",
            env_keys: &["PITCHWATCH_SLACK_BOT_USER_ID"],
            value: optional(&config.slack.bot_user_id),
        },
        Field {
            key: "slack.notify_channel",
            env_keys: &["PITCHWATCH_SLACK_NOTIFY_CHANNEL"],
            value: optional(&config.slack.notify_channel),
        },
        Field {
            key: "slack.bot_name",
            env_keys: &["PITCHWATCH_SLACK_BOT_NAME"],
            value: config.slack.bot_name.clone(),
        },
        Field {
            key: "provider.api_endpoint",
            env_keys: &["PITCHWATCH_PROVIDER_API_ENDPOINT"],
            value: config.provider.api_endpoint.clone(),
        },
        Field {
            key: "provider.site_url",
            env_keys: &["PITCHWATCH_PROVIDER_SITE_URL"],
            value: config.provider.site_url.clone(),
        },
        Field {
            key: "provider.timeout_secs",
            env_keys: &["PITCHWATCH_PROVIDER_TIMEOUT_SECS"],
            value: config.provider.timeout_secs.to_string(),
        },
        Field {
            key: "polling.interval_secs",
            env_keys: &["PITCHWATCH_POLLING_INTERVAL_SECS"],
            value: config.polling.interval_secs.to_string(),
        },
        Field {
            key: "polling.window_days",
            env_keys: &["PITCHWATCH_POLLING_WINDOW_DAYS"],
            value: config.polling.window_days.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["PITCHWATCH_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.health_check_port",
            env_keys: &["PITCHWATCH_SERVER_HEALTH_CHECK_PORT"],
            value: config.server.health_check_port.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["PITCHWATCH_LOGGING_LEVEL", "PITCHWATCH_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["PITCHWATCH_LOGGING_FORMAT", "PITCHWATCH_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
        Field { key: "pitches", env_keys: &[], value: pitches },
        Field { key: "rules", env_keys: &[], value: format!("{} rule(s)", config.rules.len()) },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["pitchwatch.toml", "config/pitchwatch.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
