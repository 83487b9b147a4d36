//! Peripheral Acquisition
//!
//! Bounded, cancellable discovery and the match policy that picks one
//! peripheral out of a scan.

use crate::domain::models::ScannedDevice;
use crate::domain::settings::MatchPolicy;
use crate::infrastructure::bluetooth::transport::Transport;
use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Extra time the transport gets past the requested scan window
pub const DISCOVERY_GRACE: Duration = Duration::from_secs(2);

/// Outcome of a bounded scan
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(Vec<ScannedDevice>),
    TimedOut,
    Cancelled,
}

/// Run one discovery scan, giving up after `scan + DISCOVERY_GRACE` or when
/// `cancel` fires.
pub async fn discover_bounded<T: Transport>(
    transport: &T,
    scan: Duration,
    cancel: &CancellationToken,
) -> Result<ScanOutcome> {
    let bounded = tokio::time::timeout(scan + DISCOVERY_GRACE, transport.discover(scan));

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Discovery cancelled");
            Ok(ScanOutcome::Cancelled)
        }
        result = bounded => match result {
            Ok(devices) => Ok(ScanOutcome::Completed(devices?)),
            Err(_) => {
                warn!("Discovery did not finish within {:?}", scan + DISCOVERY_GRACE);
                Ok(ScanOutcome::TimedOut)
            }
        },
    }
}

/// Pick the peripheral to connect to.
///
/// Name matching is a substring test. For [`MatchPolicy::StrongestSignal`]
/// ties go to the device seen first.
pub fn select_peripheral<'a>(
    devices: &'a [ScannedDevice],
    name_filter: &str,
    policy: MatchPolicy,
) -> Option<&'a ScannedDevice> {
    let mut by_name = devices.iter().filter(|d| d.name.contains(name_filter));

    match policy {
        MatchPolicy::First => by_name.next(),
        MatchPolicy::StrongestSignal => by_name.fold(None::<&ScannedDevice>, |best, d| match best {
            Some(b) if b.signal_strength >= d.signal_strength => Some(b),
            _ => Some(d),
        }),
        MatchPolicy::Address(address) => devices.iter().find(|d| d.address == address),
    }
}
