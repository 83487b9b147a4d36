//! Capture Replay Transport
//!
//! Plays back a file of concatenated 28-byte frames as if a peripheral were
//! streaming them, then drops the link at end of file.

use crate::domain::models::ScannedDevice;
use crate::infrastructure::bluetooth::protocol::{self, FRAME_LEN};
use crate::infrastructure::bluetooth::transport::{
    LinkLossHandler, NotificationHandler, Transport,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Notification period of the firmware (100 Hz)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(10);

const REPLAY_ADDRESS: u64 = 0x00_00_00_00_00_01;

pub struct ReplaySession {
    on_link_lost: LinkLossHandler,
    player: Option<JoinHandle<()>>,
}

pub struct ReplayTransport {
    capture: Arc<Vec<u8>>,
    interval: Duration,
}

impl ReplayTransport {
    /// Load a capture file
    pub fn open(path: &Path) -> Result<Self> {
        let capture = std::fs::read(path)
            .with_context(|| format!("Failed to read capture {}", path.display()))?;
        if capture.is_empty() {
            anyhow::bail!("Capture {} is empty", path.display());
        }
        info!(
            "Loaded capture {} ({} frames)",
            path.display(),
            capture.len().div_ceil(FRAME_LEN)
        );
        Ok(Self::from_bytes(capture, FRAME_INTERVAL))
    }

    pub fn from_bytes(capture: Vec<u8>, interval: Duration) -> Self {
        Self {
            capture: Arc::new(capture),
            interval,
        }
    }

    pub fn device_name() -> String {
        format!("{} (replay)", protocol::DEVICE_NAME_FILTER)
    }

    fn stop(session: &mut ReplaySession) {
        if let Some(player) = session.player.take() {
            player.abort();
        }
    }
}

impl Transport for ReplayTransport {
    type Session = ReplaySession;

    async fn discover(&self, _scan: Duration) -> Result<Vec<ScannedDevice>> {
        Ok(vec![ScannedDevice {
            name: Self::device_name(),
            address: REPLAY_ADDRESS,
            signal_strength: 0,
        }])
    }

    async fn open_session(&self, address: u64, on_link_lost: LinkLossHandler) -> Result<ReplaySession> {
        if address != REPLAY_ADDRESS {
            anyhow::bail!(
                "Peripheral {} is unreachable",
                protocol::format_address(address)
            );
        }
        Ok(ReplaySession {
            on_link_lost,
            player: None,
        })
    }

    async fn subscribe(
        &self,
        session: &mut ReplaySession,
        channel: &str,
        handler: NotificationHandler,
    ) -> Result<()> {
        if !protocol::same_uuid(channel, protocol::IMU_CHAR_UUID) {
            anyhow::bail!("Characteristic {} not found", channel);
        }
        Self::stop(session);

        let capture = Arc::clone(&self.capture);
        let on_link_lost = Arc::clone(&session.on_link_lost);
        let interval = self.interval;
        session.player = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for frame in capture.chunks(FRAME_LEN) {
                ticker.tick().await;
                handler(frame);
            }
            debug!("Capture exhausted");
            on_link_lost();
        }));
        Ok(())
    }

    async fn unsubscribe(&self, session: &mut ReplaySession, _channel: &str) -> Result<()> {
        Self::stop(session);
        Ok(())
    }

    async fn close_session(&self, mut session: ReplaySession) -> Result<()> {
        Self::stop(&mut session);
        Ok(())
    }
}
