//! Scripted transport for client tests.

use crate::domain::models::ScannedDevice;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{
    LinkLossHandler, NotificationHandler, Transport,
};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport call, in the order the client made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Discover,
    Open(u64),
    Subscribe(String),
    Unsubscribe(String),
    Close(u64),
}

pub struct MockSession {
    address: u64,
    on_link_lost: LinkLossHandler,
}

#[derive(Default)]
pub struct MockTransport {
    devices: Vec<ScannedDevice>,
    frames: Vec<Vec<u8>>,
    lose_link: bool,
    stall_discovery: bool,
    fail_open: bool,
    reject_subscribe: bool,
    fail_unsubscribe: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockTransport {
    pub fn with_devices(devices: Vec<ScannedDevice>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// One unrelated device followed by the IMU peripheral at `0xA1`
    pub fn with_nano() -> Self {
        Self::with_devices(vec![
            ScannedDevice {
                name: "Keyboard".to_string(),
                address: 0x01,
                signal_strength: -50,
            },
            ScannedDevice {
                name: protocol::DEVICE_NAME_FILTER.to_string(),
                address: 0xA1,
                signal_strength: -60,
            },
        ])
    }

    /// Deliver `frames` synchronously inside `subscribe`, before the client
    /// gets a scheduler turn.
    pub fn frames_on_subscribe(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    pub fn lose_link_after_frames(mut self) -> Self {
        self.lose_link = true;
        self
    }

    pub fn stall_discovery(mut self) -> Self {
        self.stall_discovery = true;
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn reject_subscribe(mut self) -> Self {
        self.reject_subscribe = true;
        self
    }

    pub fn fail_unsubscribe(mut self) -> Self {
        self.fail_unsubscribe = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for MockTransport {
    type Session = MockSession;

    async fn discover(&self, _scan: Duration) -> Result<Vec<ScannedDevice>> {
        self.record(Call::Discover);
        if self.stall_discovery {
            std::future::pending::<()>().await;
        }
        Ok(self.devices.clone())
    }

    async fn open_session(&self, address: u64, on_link_lost: LinkLossHandler) -> Result<MockSession> {
        self.record(Call::Open(address));
        if self.fail_open {
            anyhow::bail!("peripheral refused the connection");
        }
        Ok(MockSession {
            address,
            on_link_lost,
        })
    }

    async fn subscribe(
        &self,
        session: &mut MockSession,
        channel: &str,
        handler: NotificationHandler,
    ) -> Result<()> {
        self.record(Call::Subscribe(channel.to_string()));
        if self.reject_subscribe {
            anyhow::bail!("CCCD write rejected");
        }
        for frame in &self.frames {
            handler(frame.as_slice());
        }
        if self.lose_link {
            (session.on_link_lost)();
        }
        Ok(())
    }

    async fn unsubscribe(&self, _session: &mut MockSession, channel: &str) -> Result<()> {
        self.record(Call::Unsubscribe(channel.to_string()));
        if self.fail_unsubscribe {
            anyhow::bail!("link already gone");
        }
        Ok(())
    }

    async fn close_session(&self, session: MockSession) -> Result<()> {
        self.record(Call::Close(session.address));
        Ok(())
    }
}
