//! Sequential outreach dispatcher.
//!
//! Candidates are processed strictly in input order, one at a time, with a
//! fixed delay before every channel send and again between candidates.
//! That delay is the rate-limiting mechanism. Admission happens up front
//! through the store's atomic reservation, so the daily quota holds even
//! when start/retry requests race.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use prospector_core::error::{ProspectorError, Result};
use prospector_core::traits::{MessageComposer, OutreachChannel};
use prospector_core::types::{ConnectionStatus, FollowUpStatus, MessageRecord, MessageType};
use prospector_store::Store;

use crate::classifier::failure_reason;
use crate::runs::{RunKind, RunRegistry};

/// What the caller gets back from a start/retry request. Dispatch, if any,
/// continues in the background under `run_id`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchTicket {
    pub admitted: usize,
    pub used_today: u32,
    pub remaining: u32,
    pub limit_reached: bool,
    pub run_id: Option<String>,
}

/// Outcome of one follow-up dispatch pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FollowupReport {
    pub due: usize,
    pub sent: usize,
    pub cancelled: usize,
    pub failed: usize,
}

enum CandidateOutcome {
    Connected,
    Pending,
    Failed,
    Skipped,
}

/// The orchestration engine. All collaborators are injected; the engine
/// owns no global state beyond its run registry. Cloning is cheap and
/// shares the registry, which is how dispatch tasks are spawned.
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
    channel: Arc<dyn OutreachChannel>,
    composer: Arc<dyn MessageComposer>,
    daily_limit: u32,
    action_delay: Duration,
    followup_days: i64,
    runs: RunRegistry,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        channel: Arc<dyn OutreachChannel>,
        composer: Arc<dyn MessageComposer>,
        daily_limit: u32,
        action_delay: Duration,
        followup_days: i64,
    ) -> Self {
        Self {
            store,
            channel,
            composer,
            daily_limit,
            action_delay,
            followup_days,
            runs: RunRegistry::new(),
        }
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    // ─── Admission ─────────────────────────────────────────────

    /// Admit and launch outreach for the given profiles (default: every
    /// profile with no connection or a failed one). Returns immediately;
    /// the admitted batch is dispatched in the background.
    pub async fn start_connections(
        &self,
        profile_ids: Option<Vec<i64>>,
    ) -> Result<DispatchTicket> {
        let candidates = match profile_ids {
            Some(ids) => ids,
            None => self.store.eligible_profiles_for_start()?,
        };
        self.admit_and_spawn(candidates, false, RunKind::Start).await
    }

    /// Re-admit failed connections (default: all of them). Retries replay
    /// the normal transition path; the count basis also includes `pending`
    /// rows so retries cannot exceed the day's quota either.
    pub async fn retry_connections(
        &self,
        connection_ids: Option<Vec<i64>>,
    ) -> Result<DispatchTicket> {
        let candidates = self.store.retry_candidates(connection_ids.as_deref())?;
        self.admit_and_spawn(candidates, true, RunKind::Retry).await
    }

    async fn admit_and_spawn(
        &self,
        profile_ids: Vec<i64>,
        count_pending: bool,
        kind: RunKind,
    ) -> Result<DispatchTicket> {
        let admission =
            self.store
                .reserve_connections(&profile_ids, self.daily_limit, count_pending)?;
        if admission.limit_reached {
            tracing::warn!(
                "🚦 Daily limit reached ({} used today), batch rejected",
                admission.used_today
            );
        }

        let run_id = if admission.connection_ids.is_empty() {
            None
        } else {
            let run_id = self.runs.begin(kind);
            let engine = self.clone();
            let ids = admission.connection_ids.clone();
            let id = run_id.clone();
            tokio::spawn(async move {
                engine.run_batch(ids, &id).await;
            });
            Some(run_id)
        };

        Ok(DispatchTicket {
            admitted: admission.admitted,
            used_today: admission.used_today,
            remaining: admission.remaining,
            limit_reached: admission.limit_reached,
            run_id,
        })
    }

    // ─── Batch dispatch ────────────────────────────────────────

    /// Drive a batch of admitted connections through the channel, strictly
    /// in order. Errors in one candidate never abort the rest.
    pub async fn run_batch(&self, connection_ids: Vec<i64>, run_id: &str) {
        tracing::info!("🚀 Dispatch run {run_id}: {} candidate(s)", connection_ids.len());

        if let Err(e) = self.channel.open().await {
            let reason = failure_reason(&e.to_string());
            tracing::error!("❌ Channel open failed, failing batch: {e}");
            for id in &connection_ids {
                if let Err(e) = self.store.mark_connection_failed(*id, &reason) {
                    tracing::error!("Failed to record failure for connection {id}: {e}");
                }
                self.runs.update(run_id, |r| {
                    r.processed += 1;
                    r.failed += 1;
                });
            }
            self.runs.finish(run_id);
            return;
        }

        for connection_id in connection_ids {
            let outcome = match self.process_connection(connection_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // per-candidate isolation: record and move on
                    let reason = failure_reason(&e.to_string());
                    tracing::error!("❌ Connection {connection_id} failed: {e}");
                    if let Err(e) = self.store.mark_connection_failed(connection_id, &reason) {
                        tracing::error!(
                            "Failed to record failure for connection {connection_id}: {e}"
                        );
                    }
                    CandidateOutcome::Failed
                }
            };
            self.runs.update(run_id, |r| {
                r.processed += 1;
                match outcome {
                    CandidateOutcome::Connected => r.connected += 1,
                    CandidateOutcome::Pending => r.pending += 1,
                    CandidateOutcome::Failed => r.failed += 1,
                    CandidateOutcome::Skipped => r.skipped += 1,
                }
            });
            tokio::time::sleep(self.action_delay).await;
        }

        if let Err(e) = self.channel.close().await {
            tracing::warn!("Channel close failed: {e}");
        }
        self.runs.finish(run_id);
        tracing::info!("🏁 Dispatch run {run_id} complete");
    }

    /// One candidate: enrich, compose, delay, send, transition.
    async fn process_connection(&self, connection_id: i64) -> Result<CandidateOutcome> {
        let connection = self
            .store
            .get_connection(connection_id)?
            .ok_or_else(|| ProspectorError::NotFound(format!("connection {connection_id}")))?;

        // idempotent no-op for already-connected profiles
        if connection.status == ConnectionStatus::Connected {
            return Ok(CandidateOutcome::Skipped);
        }

        let profile = self
            .store
            .get_profile(connection.profile_id)?
            .ok_or_else(|| {
                ProspectorError::NotFound(format!("profile {}", connection.profile_id))
            })?;

        // best-effort enrichment, never fatal
        match self.channel.scrape_profile_details(&profile.profile_url).await {
            Ok(details) => {
                if let Err(e) = self.store.backfill_profile_details(profile.id, &details) {
                    tracing::warn!("Enrichment backfill failed for {}: {e}", profile.name);
                }
            }
            Err(e) => {
                tracing::debug!("Enrichment skipped for {}: {e}", profile.name);
            }
        }
        let profile = self
            .store
            .get_profile(profile.id)?
            .ok_or_else(|| ProspectorError::NotFound(format!("profile {}", profile.id)))?;

        let context = self.store.company_context()?;
        let text = self.composer.compose_initial(&profile, &context).await;

        tokio::time::sleep(self.action_delay).await;

        match self
            .channel
            .send_connection_request(&profile.profile_url, &text)
            .await
        {
            Ok(outcome) => {
                let message = self
                    .store
                    .insert_message(connection.id, &text, MessageType::Initial)?;
                let (status, connected_at, result) = match outcome.as_str() {
                    "already_connected" => (
                        ConnectionStatus::Connected,
                        Some(message.sent_at),
                        CandidateOutcome::Connected,
                    ),
                    "pending" => (ConnectionStatus::Pending, None, CandidateOutcome::Pending),
                    other => {
                        // fail open: the request went out, so track it
                        tracing::warn!(
                            "Unrecognized channel outcome '{other}' for {}, treating as pending",
                            profile.name
                        );
                        (ConnectionStatus::Pending, None, CandidateOutcome::Pending)
                    }
                };
                self.store
                    .mark_connection_sent(connection.id, message.id, status, connected_at)?;
                tracing::info!("✅ {} → {}", profile.name, status.as_str());
                Ok(result)
            }
            Err(e) => {
                let reason = failure_reason(&e.to_string());
                self.store.mark_connection_failed(connection.id, &reason)?;
                tracing::warn!("❌ {} failed: {reason}", profile.name);
                Ok(CandidateOutcome::Failed)
            }
        }
    }

    // ─── Follow-ups ────────────────────────────────────────────

    /// Create follow-ups for connected profiles whose initial message has
    /// none yet. Eventually consistent; safe to run repeatedly.
    pub fn schedule_followups(&self) -> Result<usize> {
        let eligible = self.store.connections_needing_followup()?;
        let when = Utc::now() + chrono::Duration::days(self.followup_days);
        let mut created = 0;
        for (connection_id, message_id) in eligible {
            if self.store.create_followup(message_id, when)?.is_some() {
                tracing::info!("📅 Follow-up scheduled for connection {connection_id}");
                created += 1;
            }
        }
        Ok(created)
    }

    /// Send every due follow-up. A follow-up whose connection is no longer
    /// connected is cancelled without touching the channel.
    pub async fn dispatch_due_followups(&self) -> Result<FollowupReport> {
        let due = self.store.due_followups(Utc::now())?;
        let mut report = FollowupReport {
            due: due.len(),
            ..FollowupReport::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        self.channel.open().await?;
        for followup in due {
            let connection = self.store.connection_for_followup(&followup)?;
            let connection = match connection {
                Some(c) if c.status == ConnectionStatus::Connected => c,
                _ => {
                    self.store
                        .mark_followup(followup.id, FollowUpStatus::Cancelled, None)?;
                    report.cancelled += 1;
                    continue;
                }
            };
            let profile = match self.store.get_profile(connection.profile_id)? {
                Some(p) => p,
                None => {
                    self.store
                        .mark_followup(followup.id, FollowUpStatus::Cancelled, None)?;
                    report.cancelled += 1;
                    continue;
                }
            };

            let history = self.store.messages_for_connection(connection.id)?;
            let context = self.store.company_context()?;
            let text = self
                .composer
                .compose_followup(&profile, &history, &context)
                .await;

            tokio::time::sleep(self.action_delay).await;

            match self.channel.send_message(&profile.profile_url, &text).await {
                Ok(()) => {
                    self.store
                        .insert_message(connection.id, &text, MessageType::Followup)?;
                    self.store
                        .mark_followup(followup.id, FollowUpStatus::Sent, Some(Utc::now()))?;
                    tracing::info!("📨 Follow-up sent to {}", profile.name);
                    report.sent += 1;
                }
                Err(e) => {
                    self.store
                        .mark_followup(followup.id, FollowUpStatus::Failed, None)?;
                    tracing::warn!("❌ Follow-up to {} failed: {e}", profile.name);
                    report.failed += 1;
                }
            }
        }
        if let Err(e) = self.channel.close().await {
            tracing::warn!("Channel close failed: {e}");
        }
        Ok(report)
    }

    /// Operator-triggered follow-up, outside the scheduled path. The
    /// connection must be connected. Any pending scheduled follow-up for
    /// its initial message is marked sent so it is not sent twice.
    pub async fn send_followup_now(&self, connection_id: i64) -> Result<MessageRecord> {
        let connection = self
            .store
            .get_connection(connection_id)?
            .ok_or_else(|| ProspectorError::NotFound(format!("connection {connection_id}")))?;
        if connection.status != ConnectionStatus::Connected {
            return Err(ProspectorError::InvalidInput(
                "connection is not in connected state".into(),
            ));
        }
        let profile = self
            .store
            .get_profile(connection.profile_id)?
            .ok_or_else(|| {
                ProspectorError::NotFound(format!("profile {}", connection.profile_id))
            })?;

        let history = self.store.messages_for_connection(connection.id)?;
        let context = self.store.company_context()?;
        let text = self
            .composer
            .compose_followup(&profile, &history, &context)
            .await;

        self.channel.open().await?;
        let send = self.channel.send_message(&profile.profile_url, &text).await;
        if let Err(e) = self.channel.close().await {
            tracing::warn!("Channel close failed: {e}");
        }
        send?;

        let message = self
            .store
            .insert_message(connection.id, &text, MessageType::Followup)?;
        if let Some(message_id) = connection.connection_message_id {
            if let Some(pending) = self.store.pending_followup_for_message(message_id)? {
                self.store
                    .mark_followup(pending.id, FollowUpStatus::Sent, Some(Utc::now()))?;
            }
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::RunStatus;
    use prospector_channels::mock::{MockChannel, MockOutcome};
    use prospector_composer::TemplateComposer;
    use prospector_store::NewProfile;

    fn setup(daily_limit: u32, delay: Duration) -> (Engine, Arc<MockChannel>, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let channel = Arc::new(MockChannel::new());
        let engine = Engine::new(
            Arc::clone(&store),
            channel.clone() as Arc<dyn OutreachChannel>,
            Arc::new(TemplateComposer),
            daily_limit,
            delay,
            7,
        );
        (engine, channel, store)
    }

    fn add_profile(store: &Store, name: &str) -> i64 {
        store
            .insert_profile(&NewProfile {
                name: name.into(),
                profile_url: format!("https://example.com/in/{name}"),
                ..Default::default()
            })
            .unwrap()
            .id
    }

    async fn wait_run(engine: &Engine, run_id: &str) {
        for _ in 0..500 {
            if engine
                .runs()
                .get(run_id)
                .map(|r| r.status == RunStatus::Completed)
                .unwrap_or(false)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("dispatch run never completed");
    }

    fn connect_calls(channel: &MockChannel) -> Vec<String> {
        channel
            .actions()
            .into_iter()
            .filter(|a| a.starts_with("connect:"))
            .collect()
    }

    #[tokio::test]
    async fn start_processes_candidates_in_order() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        add_profile(&store, "a");
        add_profile(&store, "b");
        add_profile(&store, "c");

        let ticket = engine.start_connections(None).await.unwrap();
        assert_eq!(ticket.admitted, 3);
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        assert_eq!(
            connect_calls(&channel),
            vec![
                "connect:https://example.com/in/a",
                "connect:https://example.com/in/b",
                "connect:https://example.com/in/c",
            ]
        );
        // unscripted outcome is "pending"
        for view in store.list_connections(None).unwrap() {
            assert_eq!(view.status, ConnectionStatus::Pending);
            assert!(view.connection_message.is_some());
        }
    }

    #[tokio::test]
    async fn already_connected_outcome_marks_connected_and_links_message() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("already_connected".into()),
        );

        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Connected);
        assert!(conn.connected_at.is_some());
        let msg_id = conn.connection_message_id.unwrap();
        let messages = store.messages_for_connection(conn.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, msg_id);
        assert_eq!(messages[0].message_type, MessageType::Initial);
    }

    #[tokio::test]
    async fn login_failure_is_classified_and_does_not_abort_the_batch() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let p1 = add_profile(&store, "first");
        let p2 = add_profile(&store, "second");
        channel.script(
            "https://example.com/in/first",
            MockOutcome::Fail("Login failed: bad credentials".into()),
        );

        let ticket = engine.start_connections(Some(vec![p1, p2])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let c1 = store.connection_by_profile(p1).unwrap().unwrap();
        assert_eq!(c1.status, ConnectionStatus::Failed);
        assert_eq!(c1.failure_reason.as_deref(), Some("Login/authentication failed"));

        // second candidate still processed
        let c2 = store.connection_by_profile(p2).unwrap().unwrap();
        assert_eq!(c2.status, ConnectionStatus::Pending);
    }

    #[tokio::test]
    async fn starting_a_connected_profile_never_resends() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("already_connected".into()),
        );

        let first = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, first.run_id.as_deref().unwrap()).await;
        assert_eq!(connect_calls(&channel).len(), 1);

        let second = engine.start_connections(Some(vec![pid])).await.unwrap();
        assert_eq!(second.admitted, 0);
        assert!(second.run_id.is_none());
        assert_eq!(connect_calls(&channel).len(), 1);
        // still exactly one connection row
        assert_eq!(store.list_connections(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_quota_rejects_batch_without_state_changes() {
        let (engine, channel, store) = setup(5, Duration::ZERO);
        // the start-path count basis is connected/connecting, so land the
        // first five in `connected` to use up the whole day's quota
        let first_batch: Vec<i64> = (0..5)
            .map(|i| {
                let name = format!("p{i}");
                channel.script(
                    &format!("https://example.com/in/{name}"),
                    MockOutcome::Succeed("already_connected".into()),
                );
                add_profile(&store, &name)
            })
            .collect();
        let ticket = engine.start_connections(Some(first_batch)).await.unwrap();
        assert_eq!(ticket.admitted, 5);
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let extra: Vec<i64> = (5..8).map(|i| add_profile(&store, &format!("p{i}"))).collect();
        let rejected = engine.start_connections(Some(extra.clone())).await.unwrap();
        assert_eq!(rejected.admitted, 0);
        assert!(rejected.limit_reached);
        assert!(rejected.run_id.is_none());
        for pid in extra {
            assert!(store.connection_by_profile(pid).unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn retry_replays_failed_connections() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Fail("Request timeout".into()),
        );
        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;
        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        assert_eq!(conn.failure_reason.as_deref(), Some("Network timeout"));

        // operator-gated retry, now succeeding
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("pending".into()),
        );
        let retry = engine.retry_connections(None).await.unwrap();
        assert_eq!(retry.admitted, 1);
        wait_run(&engine, retry.run_id.as_deref().unwrap()).await;

        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Pending);
        assert!(conn.failure_reason.is_none());
        assert_eq!(connect_calls(&channel).len(), 2);
    }

    #[tokio::test]
    async fn fixed_delay_separates_consecutive_sends() {
        let delay = Duration::from_millis(25);
        let (engine, channel, store) = setup(20, delay);
        add_profile(&store, "a");
        add_profile(&store, "b");

        let ticket = engine.start_connections(None).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let connects: Vec<_> = channel
            .calls()
            .into_iter()
            .filter(|c| c.action.starts_with("connect:"))
            .collect();
        assert_eq!(connects.len(), 2);
        let gap = connects[1].at - connects[0].at;
        assert!(gap >= chrono::Duration::milliseconds(25), "gap was {gap}");
    }

    #[tokio::test]
    async fn scheduling_followups_is_exactly_once() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("already_connected".into()),
        );
        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        assert_eq!(engine.schedule_followups().unwrap(), 1);
        assert_eq!(engine.schedule_followups().unwrap(), 0);
    }

    #[tokio::test]
    async fn due_followup_is_sent_and_marked() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("already_connected".into()),
        );
        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        let message_id = conn.connection_message_id.unwrap();
        store
            .create_followup(message_id, Utc::now() - chrono::Duration::hours(1))
            .unwrap()
            .unwrap();

        let report = engine.dispatch_due_followups().await.unwrap();
        assert_eq!(report.due, 1);
        assert_eq!(report.sent, 1);

        let followup = store.followup_for_message(message_id).unwrap().unwrap();
        assert_eq!(followup.status, FollowUpStatus::Sent);
        assert!(followup.sent_at.is_some());
        let messages = store.messages_for_connection(conn.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].message_type, MessageType::Followup);
    }

    #[tokio::test]
    async fn followup_for_non_connected_connection_is_cancelled_without_a_send() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        channel.script(
            "https://example.com/in/ada",
            MockOutcome::Succeed("already_connected".into()),
        );
        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        let message_id = conn.connection_message_id.unwrap();
        store
            .create_followup(message_id, Utc::now() - chrono::Duration::hours(1))
            .unwrap()
            .unwrap();
        store.mark_connection_failed(conn.id, "Network timeout").unwrap();

        let before = channel.actions().len();
        let report = engine.dispatch_due_followups().await.unwrap();
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.sent, 0);

        let followup = store.followup_for_message(message_id).unwrap().unwrap();
        assert_eq!(followup.status, FollowUpStatus::Cancelled);
        // no message:* call happened, only open/close bookkeeping
        let message_calls = channel.actions()[before..]
            .iter()
            .filter(|a| a.starts_with("message:"))
            .count();
        assert_eq!(message_calls, 0);
        assert_eq!(store.messages_for_connection(conn.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn manual_followup_requires_connected_state() {
        let (engine, channel, store) = setup(20, Duration::ZERO);
        let pid = add_profile(&store, "ada");
        let ticket = engine.start_connections(Some(vec![pid])).await.unwrap();
        wait_run(&engine, ticket.run_id.as_deref().unwrap()).await;

        // pending connection: manual follow-up refused
        let conn = store.connection_by_profile(pid).unwrap().unwrap();
        assert!(engine.send_followup_now(conn.id).await.is_err());

        let message_id = conn.connection_message_id.unwrap();
        store
            .mark_connection_sent(conn.id, message_id, ConnectionStatus::Connected, Some(Utc::now()))
            .unwrap();
        store
            .create_followup(message_id, Utc::now() + chrono::Duration::days(7))
            .unwrap()
            .unwrap();

        let message = engine.send_followup_now(conn.id).await.unwrap();
        assert_eq!(message.message_type, MessageType::Followup);
        // the scheduled follow-up is consumed by the manual send
        let followup = store.followup_for_message(message_id).unwrap().unwrap();
        assert_eq!(followup.status, FollowUpStatus::Sent);
        assert!(channel.actions().iter().any(|a| a.starts_with("message:")));
    }
}
