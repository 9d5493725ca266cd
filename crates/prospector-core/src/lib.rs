//! # Prospector Core
//!
//! Shared foundation for the outreach orchestration engine: the data model
//! (profiles, connections, messages, follow-ups), the configuration system,
//! the error type, and the traits every external collaborator implements.
//!
//! The two collaborator seams are deliberate dependency-injection points:
//! the [`traits::OutreachChannel`] performs the actual network action to
//! contact a profile, and the [`traits::MessageComposer`] produces message
//! text. The engine crates only ever see these traits.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ProspectorConfig;
pub use error::{ProspectorError, Result};
pub use traits::{MessageComposer, OutreachChannel};
pub use types::{
    CompanyContext, ConnectionRecord, ConnectionStatus, FollowUpRecord, FollowUpStatus,
    MessageRecord, MessageType, ProfileDetails, ProfileRecord,
};
