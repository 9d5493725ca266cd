//! Outreach channel implementations.
//!
//! The engine only speaks `OutreachChannel`; everything network-shaped
//! lives here. `BridgeChannel` drives the browser-automation sidecar over
//! HTTP, `MockChannel` scripts outcomes for tests.

pub mod bridge;
pub mod mock;

pub use bridge::BridgeChannel;
pub use mock::MockChannel;
