use std::sync::Arc;
use std::time::Duration;

use pitchwatch_core::config::{AppConfig, LoadOptions};
use pitchwatch_core::rules::build_rules;
use pitchwatch_core::{
    checkout_url, CycleReport, CycleTrigger, PitchSlot, Reconciler, ReconcilerSettings,
    SlotTracker,
};
use pitchwatch_mlp::MlpClient;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct CheckedSlot {
    pitch_slot_id: String,
    pitch: String,
    starts: String,
    ends: String,
    price: String,
    currency: String,
    checkout_url: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    command: &'static str,
    status: &'static str,
    cycle: CycleReport,
    slots: Vec<CheckedSlot>,
}

/// Exit code 5 when any pitch failed to fetch; slots from the pitches that
/// answered are still printed. Slack tokens are not needed.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::provider_only()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "check",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "check",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let provider = match MlpClient::from_config(&config.provider) {
        Ok(provider) => provider,
        Err(error) => {
            return CommandResult::failure("check", "provider_client", error.to_string(), 4);
        }
    };

    let reconciler = Reconciler::new(
        Arc::new(provider),
        Arc::new(SlotTracker::new()),
        config.pitches.clone(),
        build_rules(&config.rules),
        ReconcilerSettings {
            window_days: config.polling.window_days,
            fetch_timeout: Duration::from_secs(config.provider.timeout_secs),
        },
    );

    let (cycle, entries) = runtime.block_on(async {
        let cycle = reconciler.reconcile(CycleTrigger::Manual).await;
        (cycle, reconciler.tracker().retrieve_all().await)
    });

    let slots =
        entries.iter().map(|entry| checked_slot(&config.provider.site_url, entry)).collect();
    let degraded = cycle.is_degraded();
    let report = CheckReport {
        command: "check",
        status: if degraded { "degraded" } else { "ok" },
        cycle,
        slots,
    };

    CommandResult::report(if degraded { 5 } else { 0 }, &report)
}

fn checked_slot(site_url: &str, entry: &PitchSlot) -> CheckedSlot {
    CheckedSlot {
        pitch_slot_id: entry.id.to_string(),
        pitch: entry.pitch.name.clone(),
        starts: entry.slot.starts.to_rfc3339(),
        ends: entry.slot.ends.to_rfc3339(),
        price: entry.slot.price.clone(),
        currency: entry.slot.currency.clone(),
        checkout_url: checkout_url(site_url, &entry.pitch, &entry.slot),
    }
}
