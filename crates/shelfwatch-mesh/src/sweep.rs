//! Periodic broker maintenance.
//!
//! The sweep drops expired mailbox entries, trims aged history, and flags
//! agents that stopped heartbeating. Inactive agents are only warned about,
//! never evicted; eviction is an operator decision.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use shelfwatch_core::AgentId;

use crate::broker::MessageBroker;

/// Outcome of one sweep pass.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Expired messages dropped from mailboxes
    pub expired_messages: usize,
    /// History entries trimmed by age
    pub trimmed_history: usize,
    /// Agents whose last heartbeat exceeded the inactivity threshold
    pub inactive_agents: Vec<AgentId>,
}

/// Handle to a running background sweep task.
pub struct SweepHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

fn cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(window).ok()?;
    now.checked_sub_signed(delta)
}

impl MessageBroker {
    /// Run a single maintenance pass.
    ///
    /// Exposed separately from the background task so tests and operators
    /// can trigger a pass deterministically.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let mut expired_messages = 0;
        for queue in state.mailboxes.values_mut() {
            let before = queue.len();
            queue.retain(|message| !message.is_expired(now));
            expired_messages += before - queue.len();
        }

        let mut trimmed_history = 0;
        if let Some(history_cutoff) = cutoff(now, self.config.history_retention) {
            while state
                .history
                .front()
                .is_some_and(|message| message.timestamp < history_cutoff)
            {
                state.history.pop_front();
                trimmed_history += 1;
            }
        }

        let inactive_agents: Vec<AgentId> = match cutoff(now, self.config.inactive_threshold) {
            Some(inactive_cutoff) => state
                .agents
                .values()
                .filter(|record| record.last_heartbeat < inactive_cutoff)
                .map(|record| record.id.clone())
                .collect(),
            None => Vec::new(),
        };
        for id in &inactive_agents {
            warn!(agent_id = %id, "Agent appears inactive");
        }

        SweepReport {
            expired_messages,
            trimmed_history,
            inactive_agents,
        }
    }

    /// Spawn the recurring sweep task.
    ///
    /// Runs [`MessageBroker::sweep_once`] every `sweep_interval` until the
    /// returned handle is shut down.
    pub fn spawn_sweep(self: &Arc<Self>) -> SweepHandle {
        let broker = Arc::clone(self);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let interval = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately; consume the first tick so the
            // first real pass happens one full interval after startup
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = broker.sweep_once().await;
                        if report.expired_messages > 0 || report.trimmed_history > 0 {
                            debug!(
                                expired = report.expired_messages,
                                trimmed = report.trimmed_history,
                                "Sweep pass complete"
                            );
                        }
                    }
                }
            }
        });

        SweepHandle { token, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::message::{Message, MessageKind};
    use shelfwatch_core::AgentKind;
    use serde_json::json;

    #[tokio::test]
    async fn sweep_drops_only_expired_messages() {
        let broker = MessageBroker::default();
        broker
            .register(AgentId::from("a"), "A", AgentKind::from("worker"))
            .await;
        broker
            .register(AgentId::from("b"), "B", AgentKind::from("worker"))
            .await;

        let expired = Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({ "n": 1 }),
        )
        .with_expires_at(Utc::now() - chrono::Duration::seconds(5));
        let valid = Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({ "n": 2 }),
        );
        broker.send(expired).await.unwrap();
        broker.send(valid).await.unwrap();

        let report = broker.sweep_once().await;
        assert_eq!(report.expired_messages, 1);
        assert_eq!(broker.stats().await.total_queued_messages, 1);
    }

    #[tokio::test]
    async fn sweep_flags_inactive_agents_without_evicting() {
        let broker = MessageBroker::new(BrokerConfig {
            inactive_threshold: Duration::from_secs(0),
            ..BrokerConfig::default()
        });
        broker
            .register(AgentId::from("quiet"), "Quiet", AgentKind::from("worker"))
            .await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = broker.sweep_once().await;
        assert_eq!(report.inactive_agents, vec![AgentId::from("quiet")]);
        // flagged, not evicted
        assert_eq!(broker.stats().await.total_agents, 1);
    }

    #[tokio::test]
    async fn sweep_trims_aged_history() {
        let broker = MessageBroker::new(BrokerConfig {
            history_retention: Duration::from_secs(0),
            ..BrokerConfig::default()
        });
        broker
            .register(AgentId::from("a"), "A", AgentKind::from("worker"))
            .await;
        broker
            .register(AgentId::from("b"), "B", AgentKind::from("worker"))
            .await;
        broker
            .send(Message::new(
                AgentId::from("a"),
                AgentId::from("b"),
                MessageKind::Task,
                json!({}),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = broker.sweep_once().await;
        assert_eq!(report.trimmed_history, 1);
        assert_eq!(broker.stats().await.history_size, 0);
    }

    #[tokio::test]
    async fn spawned_sweep_shuts_down_cleanly() {
        let broker = Arc::new(MessageBroker::new(BrokerConfig {
            sweep_interval: Duration::from_millis(10),
            ..BrokerConfig::default()
        }));
        let handle = broker.spawn_sweep();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;
    }
}
