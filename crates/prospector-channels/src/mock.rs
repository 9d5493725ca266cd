//! Scripted in-memory channel for engine and scheduler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use prospector_core::error::{ProspectorError, Result};
use prospector_core::traits::OutreachChannel;
use prospector_core::types::ProfileDetails;

/// What the mock should do when asked to contact a given profile URL.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Connection request accepted; the given outcome string is returned
    /// ("pending", "already_connected", or anything else).
    Succeed(String),
    /// The attempt errors with this message.
    Fail(String),
}

/// One recorded channel call, with the instant it happened.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct MockState {
    outcomes: HashMap<String, MockOutcome>,
    scrapes: HashMap<String, ProfileDetails>,
    calls: Vec<RecordedCall>,
    open: bool,
}

/// Channel whose behavior is scripted per profile URL. Unscripted URLs
/// succeed with outcome "pending". Every call is recorded with a
/// timestamp so tests can assert ordering and pacing.
#[derive(Default)]
pub struct MockChannel {
    state: Mutex<MockState>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, profile_url: &str, outcome: MockOutcome) {
        self.lock().outcomes.insert(profile_url.to_string(), outcome);
    }

    pub fn script_scrape(&self, profile_url: &str, details: ProfileDetails) {
        self.lock().scrapes.insert(profile_url.to_string(), details);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Just the action strings, for order assertions.
    pub fn actions(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.action.clone()).collect()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, action: String) {
        self.lock().calls.push(RecordedCall { action, at: Utc::now() });
    }
}

#[async_trait]
impl OutreachChannel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self) -> Result<()> {
        self.lock().open = true;
        self.record("open".into());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lock().open = false;
        self.record("close".into());
        Ok(())
    }

    async fn send_connection_request(&self, profile_url: &str, _message: &str) -> Result<String> {
        self.record(format!("connect:{profile_url}"));
        match self.lock().outcomes.get(profile_url).cloned() {
            Some(MockOutcome::Succeed(outcome)) => Ok(outcome),
            Some(MockOutcome::Fail(msg)) => Err(ProspectorError::Channel(msg)),
            None => Ok("pending".into()),
        }
    }

    async fn send_message(&self, profile_url: &str, _message: &str) -> Result<()> {
        self.record(format!("message:{profile_url}"));
        match self.lock().outcomes.get(profile_url).cloned() {
            Some(MockOutcome::Fail(msg)) => Err(ProspectorError::Channel(msg)),
            _ => Ok(()),
        }
    }

    async fn scrape_profile_details(&self, profile_url: &str) -> Result<ProfileDetails> {
        self.record(format!("scrape:{profile_url}"));
        match self.lock().scrapes.get(profile_url) {
            Some(details) => Ok(details.clone()),
            None => Err(ProspectorError::Channel("scrape unavailable".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_urls_default_to_pending() {
        let mock = MockChannel::new();
        let outcome = mock
            .send_connection_request("https://example.com/in/x", "hi")
            .await
            .unwrap();
        assert_eq!(outcome, "pending");
        assert_eq!(mock.actions(), vec!["connect:https://example.com/in/x"]);
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_error_text() {
        let mock = MockChannel::new();
        mock.script(
            "https://example.com/in/x",
            MockOutcome::Fail("Request timeout after 120s".into()),
        );
        let err = mock
            .send_connection_request("https://example.com/in/x", "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
