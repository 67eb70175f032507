//! Periodic eviction of idle browser sessions.
//!
//! Sessions hold payment bundles, verdicts, shipping quotes and the
//! customer's bearer token. A session nobody touched for the configured
//! idle timeout is dropped whole.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use crate::state::AppState;

/// How often idle sessions are looked for.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct SessionSweeper {
    state: AppState,
    period: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionSweeper {
    pub fn new(state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            state,
            period: SWEEP_INTERVAL,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signalled.
    ///
    /// The idle timeout is read on every sweep so a reload applies to the
    /// next one.
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period = ?self.period, "Session sweeper started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let idle = self.state.config.checkout.read().await.session_idle_timeout;
                    let evicted = self.state.sessions.evict_idle(idle).await;
                    if evicted > 0 {
                        tracing::debug!(evicted, ?idle, "Evicted idle sessions");
                    }
                }
            }
        }

        tracing::info!("Session sweeper shutdown complete");
    }
}

/// Spawn the sweeper. Send `true` on the returned channel to stop it.
pub fn spawn_session_sweeper(state: AppState) -> watch::Sender<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(SessionSweeper::new(state, shutdown_rx).run());
    shutdown_tx
}
