//! Background polling. Each tick runs a reconciliation unless one is already
//! in flight and announces newly seen slots to the notify channel.

use std::sync::Arc;
use std::time::Duration;

use pitchwatch_core::{CycleTrigger, Reconciler};
use pitchwatch_slack::blocks::unseen_slots_message;
use pitchwatch_slack::commands::MessageOrigin;
use pitchwatch_slack::web::MessageSink;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where timer notifications go.
#[derive(Clone)]
pub struct Notifier {
    pub sink: Arc<dyn MessageSink>,
    pub channel_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Completed { announced: usize },
}

pub struct Ticker {
    reconciler: Arc<Reconciler>,
    notifier: Option<Notifier>,
    interval: Duration,
}

impl Ticker {
    pub fn new(reconciler: Arc<Reconciler>, notifier: Option<Notifier>, interval: Duration) -> Self {
        Self { reconciler, notifier, interval }
    }

    /// Ticks until `shutdown` flips to true or its sender is dropped. The
    /// first tick fires immediately so the tracker is populated at startup.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            event_name = "system.ticker.start",
            correlation_id = "bootstrap",
            interval_secs = self.interval.as_secs(),
            notify = self.notifier.is_some(),
            "polling timer started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            event_name = "system.ticker.stopped",
            correlation_id = "shutdown",
            "polling timer stopped"
        );
    }

    pub async fn tick(&self) -> TickOutcome {
        let Some(cycle) = self.reconciler.try_reconcile_and_hold(CycleTrigger::Timer).await else {
            return TickOutcome::Skipped;
        };

        let Some(notifier) = &self.notifier else {
            return TickOutcome::Completed { announced: 0 };
        };

        // Read before releasing the guard: a queued command cycle would mark
        // these entries seen and nobody would hear about them.
        let unseen = cycle.tracker().retrieve_unseen().await;
        let report = cycle.into_report();
        let Some(message) = unseen_slots_message(&unseen, MessageOrigin::Ticker) else {
            debug!(
                event_name = "system.ticker.nothing_new",
                correlation_id = %report.cycle_id,
                "no unseen slots to announce"
            );
            return TickOutcome::Completed { announced: 0 };
        };

        if let Err(error) = notifier.sink.send_message(&notifier.channel_id, &message).await {
            warn!(
                event_name = "system.ticker.notify_failed",
                correlation_id = %report.cycle_id,
                channel_id = %notifier.channel_id,
                error = %error,
                "failed to post unseen slots"
            );
            return TickOutcome::Completed { announced: 0 };
        }

        info!(
            event_name = "system.ticker.notified",
            correlation_id = %report.cycle_id,
            channel_id = %notifier.channel_id,
            announced = unseen.len(),
            "posted unseen slots"
        );
        TickOutcome::Completed { announced: unseen.len() }
    }
}
