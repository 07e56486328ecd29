use pitchwatch_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["slack_token_readiness", "pitch_catalog", "rule_set"];

/// Warnings do not fail the run; exit code 1 when any check fails.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_pitches(&config));
            checks.push(check_rules(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let app_ok = config.slack.app_token.expose_secret().starts_with("xapp-");
    let bot_ok = config.slack.bot_token.expose_secret().starts_with("xoxb-");
    if !(app_ok && bot_ok) {
        return DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: "expected an `xapp-` app token and an `xoxb-` bot token".to_string(),
        };
    }

    match &config.slack.notify_channel {
        Some(channel) => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: format!("tokens present; timer notifications go to {channel}"),
        },
        None => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Warn,
            details: "tokens present; slack.notify_channel unset so the timer stays silent"
                .to_string(),
        },
    }
}

fn check_pitches(config: &AppConfig) -> DoctorCheck {
    let names =
        config.pitches.iter().map(|pitch| pitch.name.as_str()).collect::<Vec<_>>().join(", ");
    DoctorCheck {
        name: "pitch_catalog",
        status: CheckStatus::Pass,
        details: format!("{} pitch(es): {names}", config.pitches.len()),
    }
}

fn check_rules(config: &AppConfig) -> DoctorCheck {
    if config.rules.is_empty() {
        return DoctorCheck {
            name: "rule_set",
            status: CheckStatus::Warn,
            details: "no rules configured; every slot qualifies".to_string(),
        };
    }

    let descriptions =
        config.rules.iter().map(|rule| rule.description()).collect::<Vec<_>>().join("; ");
    DoctorCheck {
        name: "rule_set",
        status: CheckStatus::Pass,
        details: format!("{} rule(s): {descriptions}", config.rules.len()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
