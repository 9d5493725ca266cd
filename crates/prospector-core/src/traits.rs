//! Collaborator traits — the seams between the engine and the outside world.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CompanyContext, MessageRecord, ProfileDetails, ProfileRecord};

/// The external system that performs the actual network action to contact
/// a profile. Implementations own their session lifecycle: `open` before a
/// batch, `close` after.
///
/// `send_connection_request` distinguishes three results:
/// - `Ok("already_connected")` — the peer was already a connection;
/// - `Ok("pending")` — the request was sent and awaits acceptance;
/// - `Ok(other)` — the channel reported success with an outcome string the
///   engine does not recognize (the dispatcher fails open to pending);
/// - `Err(_)` — the attempt failed; the error text feeds the classifier.
#[async_trait]
pub trait OutreachChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn send_connection_request(&self, profile_url: &str, message: &str) -> Result<String>;

    async fn send_message(&self, profile_url: &str, message: &str) -> Result<()>;

    /// Best-effort enrichment scrape. Callers treat failures as non-fatal.
    async fn scrape_profile_details(&self, profile_url: &str) -> Result<ProfileDetails>;
}

/// Produces outreach message text. The contract requires an internal
/// fallback template on any error — composing never fails.
#[async_trait]
pub trait MessageComposer: Send + Sync {
    async fn compose_initial(&self, profile: &ProfileRecord, context: &CompanyContext) -> String;

    async fn compose_followup(
        &self,
        profile: &ProfileRecord,
        prior_messages: &[MessageRecord],
        context: &CompanyContext,
    ) -> String;
}
