//! Transport Collaborator
//!
//! The BLE stack the client drives. Implementations own the platform details
//! (scanning, GATT lookup, CCCD writes); the client only sequences calls.

use crate::domain::models::ScannedDevice;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Invoked with the raw payload of every notification, in arrival order.
/// May be called from a transport-owned thread and must not block.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Invoked when the link drops without the client asking for it.
pub type LinkLossHandler = Arc<dyn Fn() + Send + Sync>;

pub trait Transport {
    /// Live connection to one peripheral
    type Session;

    /// Scan for advertising peripherals for roughly `scan` and report them in
    /// the order they were first seen.
    fn discover(&self, scan: Duration) -> impl Future<Output = Result<Vec<ScannedDevice>>>;

    /// Open a session to `address`. `on_link_lost` fires on unsolicited link loss.
    fn open_session(
        &self,
        address: u64,
        on_link_lost: LinkLossHandler,
    ) -> impl Future<Output = Result<Self::Session>>;

    /// Enable notifications on `channel` and route them to `handler`.
    fn subscribe(
        &self,
        session: &mut Self::Session,
        channel: &str,
        handler: NotificationHandler,
    ) -> impl Future<Output = Result<()>>;

    fn unsubscribe(&self, session: &mut Self::Session, channel: &str)
        -> impl Future<Output = Result<()>>;

    /// Release the session. The peer handle is gone afterwards.
    fn close_session(&self, session: Self::Session) -> impl Future<Output = Result<()>>;
}
