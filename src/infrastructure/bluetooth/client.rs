//! IMU Streaming Client
//!
//! Connection state machine and consumption loop. `connect()` owns the whole
//! session: it discovers, opens, subscribes, renders until the stream ends and
//! tears the session down again before returning.

use crate::domain::error::ClientError;
use crate::domain::models::{ConnectionState, ScannedDevice};
use crate::domain::sample_store::SampleStore;
use crate::domain::settings::{MatchPolicy, Settings};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::scanner::{self, ScanOutcome};
use crate::infrastructure::bluetooth::transport::{NotificationHandler, Transport};
use crate::presentation::render::SampleSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for one client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Substring the peripheral's advertised name must contain
    pub device_name_filter: String,
    /// Notification characteristic carrying telemetry frames
    pub channel_uuid: String,
    pub scan_timeout: Duration,
    pub match_policy: MatchPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_name_filter: protocol::DEVICE_NAME_FILTER.to_string(),
            channel_uuid: protocol::IMU_CHAR_UUID.to_string(),
            scan_timeout: Duration::from_secs(5),
            match_policy: MatchPolicy::First,
        }
    }
}

impl From<&Settings> for ClientConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            device_name_filter: settings.device_name_filter.clone(),
            channel_uuid: settings.imu_char_uuid.clone(),
            scan_timeout: settings.scan_timeout(),
            match_policy: settings.match_policy,
        }
    }
}

/// The session handle only exists in the states that own one.
enum Link<S> {
    Disconnected,
    Discovering,
    Connected(S),
    Streaming(S),
}

impl<S> Link<S> {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Discovering => ConnectionState::Discovering,
            Self::Connected(_) => ConnectionState::Connected,
            Self::Streaming(_) => ConnectionState::Streaming,
        }
    }
}

/// Streaming telemetry client for a single peripheral
pub struct ImuClient<T: Transport> {
    transport: T,
    config: ClientConfig,
    link: Link<T::Session>,
    peripheral: Option<ScannedDevice>,
    store: Arc<SampleStore>,
    link_lost: Arc<Notify>,
    shutdown: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
}

impl<T: Transport> ImuClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            config,
            link: Link::Disconnected,
            peripheral: None,
            store: Arc::new(SampleStore::new()),
            link_lost: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Observe state transitions from another task
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected(_) | Link::Streaming(_))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.link, Link::Streaming(_))
    }

    /// The peripheral picked by the last discovery
    pub fn peripheral(&self) -> Option<&ScannedDevice> {
        self.peripheral.as_ref()
    }

    pub fn channel_uuid(&self) -> &str {
        &self.config.channel_uuid
    }

    /// Token that stops a running `connect()` with an orderly teardown.
    ///
    /// A cancelled token is replaced once the client is back in
    /// `Disconnected`, so fetch it again before the next `connect()`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Discover, connect, subscribe and stream into `sink` until the session ends.
    ///
    /// Does nothing if a session is already active. Returns `Ok(())` when the
    /// shutdown token stops the stream.
    pub async fn connect<K: SampleSink>(&mut self, sink: &mut K) -> Result<(), ClientError> {
        if !matches!(self.link, Link::Disconnected) {
            debug!("connect() ignored while {}", self.state());
            return Ok(());
        }

        self.transition(|_| Link::Discovering);
        info!("Looking for peripheral device...");

        let device = match self.acquire_peripheral().await {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!("Discovery cancelled");
                self.finish_disconnect();
                return Ok(());
            }
            Err(e) => {
                self.finish_disconnect();
                return Err(e);
            }
        };
        info!(
            "Found peripheral device {} ({})",
            device.name,
            protocol::format_address(device.address)
        );

        // Fresh signal per session so a stale loss cannot end the next one,
        // and nothing published before this session counts as new.
        self.link_lost = Arc::new(Notify::new());
        self.store.reset();
        let lost = Arc::clone(&self.link_lost);
        let session = match self
            .transport
            .open_session(device.address, Arc::new(move || lost.notify_one()))
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.finish_disconnect();
                return Err(ClientError::Transport(e));
            }
        };
        self.peripheral = Some(device);
        self.transition(|_| Link::Connected(session));
        info!("Connected.");

        self.subscribe().await?;

        let outcome = self.consume(sink).await;
        let teardown = self.disconnect().await;
        outcome.and(teardown)
    }

    /// Unsubscribe if streaming, close the session and return to `Disconnected`.
    ///
    /// Unsubscribe failures are logged only; the link may already be gone.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let from = self.state();
        let session = match std::mem::replace(&mut self.link, Link::Disconnected) {
            Link::Streaming(mut session) => {
                if let Err(e) = self
                    .transport
                    .unsubscribe(&mut session, &self.config.channel_uuid)
                    .await
                {
                    warn!("Unsubscribe failed during disconnect: {:#}", e);
                }
                session
            }
            Link::Connected(session) => session,
            idle => {
                self.link = idle;
                debug!("disconnect() ignored while {}", self.state());
                return Ok(());
            }
        };

        let closed = self.transport.close_session(session).await;
        self.finish_disconnect();
        info!("Disconnected from device (was {})", from);
        closed.map_err(ClientError::Transport)
    }

    /// Route notifications on the IMU channel into the sample store.
    /// Moves `Connected` to `Streaming`; on rejection the state stays `Connected`.
    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        let state = self.state();
        let Link::Connected(session) = &mut self.link else {
            return Err(ClientError::InvalidState {
                operation: "subscribe",
                state,
            });
        };

        let store = Arc::clone(&self.store);
        let handler: NotificationHandler =
            Arc::new(move |bytes: &[u8]| match protocol::decode_frame(bytes) {
                Ok(sample) => store.publish(sample),
                Err(e) => debug!("Dropping frame: {}", e),
            });

        self.transport
            .subscribe(session, &self.config.channel_uuid, handler)
            .await
            .map_err(|source| ClientError::SubscriptionFailed {
                channel: self.config.channel_uuid.clone(),
                source,
            })?;

        self.transition(|link| match link {
            Link::Connected(session) => Link::Streaming(session),
            other => other,
        });
        info!("Streaming from {}", self.config.channel_uuid);
        Ok(())
    }

    /// Stop notifications but keep the session. Moves `Streaming` to `Connected`.
    pub async fn unsubscribe(&mut self) -> Result<(), ClientError> {
        let state = self.state();
        let Link::Streaming(session) = &mut self.link else {
            return Err(ClientError::InvalidState {
                operation: "unsubscribe",
                state,
            });
        };

        self.transport
            .unsubscribe(session, &self.config.channel_uuid)
            .await
            .map_err(ClientError::Transport)?;

        self.transition(|link| match link {
            Link::Streaming(session) => Link::Connected(session),
            other => other,
        });
        Ok(())
    }

    async fn acquire_peripheral(&self) -> Result<Option<ScannedDevice>, ClientError> {
        let outcome =
            scanner::discover_bounded(&self.transport, self.config.scan_timeout, &self.shutdown)
                .await
                .map_err(ClientError::Transport)?;

        let devices = match outcome {
            ScanOutcome::Completed(devices) => devices,
            ScanOutcome::TimedOut => Vec::new(),
            ScanOutcome::Cancelled => return Ok(None),
        };
        debug!("Discovery reported {} devices", devices.len());

        scanner::select_peripheral(
            &devices,
            &self.config.device_name_filter,
            self.config.match_policy,
        )
        .cloned()
        .map(Some)
        .ok_or_else(|| ClientError::PeripheralNotFound {
            filter: self.config.device_name_filter.clone(),
        })
    }

    /// Render each new sample while streaming. Waits on the store's wake-up,
    /// link loss and shutdown, so no receive path is ever blocked.
    async fn consume<K: SampleSink>(&self, sink: &mut K) -> Result<(), ClientError> {
        let shutdown = self.shutdown.clone();
        let link_lost = Arc::clone(&self.link_lost);

        while self.is_streaming() {
            if let Some(sample) = self.store.take_if_unread() {
                sink.render(&sample)?;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Stream stopped");
                    return Ok(());
                }
                _ = link_lost.notified() => {
                    warn!("Peripheral link lost");
                    // The last frame before the drop is still worth showing.
                    if let Some(sample) = self.store.take_if_unread() {
                        sink.render(&sample)?;
                    }
                    return Err(ClientError::TransportDisconnected);
                }
                _ = self.store.changed() => {}
            }
        }
        Ok(())
    }

    fn finish_disconnect(&mut self) {
        self.transition(|_| Link::Disconnected);
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }
    }

    fn transition(&mut self, next: impl FnOnce(Link<T::Session>) -> Link<T::Session>) {
        let current = std::mem::replace(&mut self.link, Link::Disconnected);
        let from = current.state();
        self.link = next(current);
        let to = self.link.state();
        if from != to {
            debug!("Connection state {} -> {}", from, to);
        }
        self.state_tx.send_replace(to);
    }
}
