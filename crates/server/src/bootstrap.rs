use std::sync::Arc;
use std::time::Duration;

use pitchwatch_core::config::AppConfig;
use pitchwatch_core::rules::build_rules;
use pitchwatch_core::{FetchError, Reconciler, ReconcilerSettings, SlotTracker};
use pitchwatch_mlp::MlpClient;
use pitchwatch_slack::events::command_dispatcher;
use pitchwatch_slack::socket::{ReconnectPolicy, SocketModeRunner};
use pitchwatch_slack::transport::SocketModeTransport;
use pitchwatch_slack::web::{SendError, SlackWebClient};
use thiserror::Error;
use tracing::{info, warn};

use crate::service::PitchService;
use crate::ticker::{Notifier, Ticker};

pub struct Application {
    pub config: AppConfig,
    pub reconciler: Arc<Reconciler>,
    pub web: Arc<SlackWebClient>,
    pub slack_runner: SocketModeRunner,
}

impl Application {
    pub fn ticker(&self) -> Ticker {
        let notifier = self.config.slack.notify_channel.clone().map(|channel_id| Notifier {
            sink: self.web.clone(),
            channel_id,
        });
        Ticker::new(
            self.reconciler.clone(),
            notifier,
            Duration::from_secs(self.config.polling.interval_secs),
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("booking provider client could not be built: {0}")]
    Provider(#[from] FetchError),
    #[error("slack client could not be built: {0}")]
    Slack(#[from] SendError),
}

/// Config is loaded by the caller so logging can be set up first.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let web = SlackWebClient::new(config.slack.bot_token.clone(), config.slack.app_token.clone())?;
    assemble(config, Arc::new(web)).await
}

async fn assemble(
    mut config: AppConfig,
    web: Arc<SlackWebClient>,
) -> Result<Application, BootstrapError> {
    let provider = MlpClient::from_config(&config.provider)?;
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(provider),
        Arc::new(SlotTracker::new()),
        config.pitches.clone(),
        build_rules(&config.rules),
        ReconcilerSettings {
            window_days: config.polling.window_days,
            fetch_timeout: Duration::from_secs(config.provider.timeout_secs),
        },
    ));
    info!(
        event_name = "system.bootstrap.reconciler_ready",
        correlation_id = "bootstrap",
        pitches = config.pitches.len(),
        rules = config.rules.len(),
        "reconciler assembled"
    );

    if config.slack.bot_user_id.is_none() {
        config.slack.bot_user_id = resolve_bot_user_id(&web).await;
    }

    let service = PitchService::new(reconciler.clone(), config.provider.site_url.clone());
    let dispatcher = command_dispatcher(
        service,
        &config.slack.bot_name,
        config.slack.bot_user_id.as_deref(),
    );
    let slack_runner = SocketModeRunner::new(
        Arc::new(SocketModeTransport::new(web.clone())),
        dispatcher,
        web.clone(),
        ReconnectPolicy::persistent(),
    );

    Ok(Application { config, reconciler, web, slack_runner })
}

/// Mentions by user id only work once the bot knows its own id. Startup
/// carries on with name-only detection when `auth.test` fails.
async fn resolve_bot_user_id(web: &SlackWebClient) -> Option<String> {
    match web.auth_test().await {
        Ok(identity) => {
            info!(
                event_name = "system.bootstrap.bot_identity",
                correlation_id = "bootstrap",
                bot_user_id = %identity.user_id,
                "resolved bot user id"
            );
            Some(identity.user_id)
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.bot_identity_failed",
                correlation_id = "bootstrap",
                error = %error,
                "could not resolve bot user id; mentions match on bot name only"
            );
            None
        }
    }
}
