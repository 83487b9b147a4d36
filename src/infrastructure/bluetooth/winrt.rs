//! WinRT BLE Transport
//!
//! Scanning, GATT lookup and notifications through the Windows Bluetooth LE
//! APIs.

use crate::domain::models::ScannedDevice;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{
    LinkLossHandler, NotificationHandler, Transport,
};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, IBuffer};

/// Open WinRT connection to one peripheral
pub struct WinRtSession {
    device: BluetoothLEDevice,
    status_token: i64,
    notifications: Option<(GattCharacteristic, i64)>,
}

/// Stops the advertisement watcher even if the scan future is dropped early
struct ScanGuard {
    watcher: BluetoothLEAdvertisementWatcher,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if let Err(e) = self.watcher.Stop() {
            warn!("Failed to stop BLE scan: {}", e);
        }
    }
}

#[derive(Debug, Default)]
pub struct WinRtTransport;

impl WinRtTransport {
    pub fn new() -> Self {
        Self
    }

    async fn find_characteristic(
        device: &BluetoothLEDevice,
        uuid: GUID,
    ) -> Result<Option<GattCharacteristic>> {
        let services_result = device.GetGattServicesAsync()?.await?;
        if services_result.Status()? != GattCommunicationStatus::Success {
            anyhow::bail!(
                "Failed to get GATT services: {:?}",
                services_result.Status()?
            );
        }

        let services = services_result.Services()?;
        debug!("Peripheral exposes {} services", services.Size()?);

        for i in 0..services.Size()? {
            let service = services.GetAt(i)?;
            let chars_result = service.GetCharacteristicsForUuidAsync(uuid)?.await?;
            if chars_result.Status()? != GattCommunicationStatus::Success {
                continue;
            }
            let characteristics = chars_result.Characteristics()?;
            if characteristics.Size()? > 0 {
                return Ok(Some(characteristics.GetAt(0)?));
            }
        }
        Ok(None)
    }

    async fn write_cccd(
        characteristic: &GattCharacteristic,
        value: GattClientCharacteristicConfigurationDescriptorValue,
    ) -> Result<()> {
        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(value)?
            .await?;
        if status != GattCommunicationStatus::Success {
            anyhow::bail!("CCCD write returned status {:?}", status);
        }
        Ok(())
    }
}

fn read_buffer(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}

impl Transport for WinRtTransport {
    type Session = WinRtSession;

    async fn discover(&self, scan: Duration) -> Result<Vec<ScannedDevice>> {
        info!("Starting BLE scan for {:?}", scan);

        let found: Arc<Mutex<Vec<ScannedDevice>>> = Arc::new(Mutex::new(Vec::new()));
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let sink = Arc::clone(&found);
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    // Nameless adverts cannot match the name filter.
                    if name.is_empty() {
                        return Ok(());
                    }
                    let device = ScannedDevice {
                        name,
                        address: args.BluetoothAddress()?,
                        signal_strength: args.RawSignalStrengthInDBm()?,
                    };
                    if let Ok(mut found) = sink.lock() {
                        if !found.iter().any(|d| d.address == device.address) {
                            found.push(device);
                        }
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;
        let guard = ScanGuard { watcher };

        tokio::time::sleep(scan).await;
        drop(guard);

        let devices = found
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?
            .clone();
        info!("BLE scan finished, {} named devices", devices.len());
        Ok(devices)
    }

    async fn open_session(&self, address: u64, on_link_lost: LinkLossHandler) -> Result<WinRtSession> {
        info!(
            "Connecting to Bluetooth device: {}",
            protocol::format_address(address)
        );
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)?.await?;

        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if dev.ConnectionStatus()? == BluetoothConnectionStatus::Disconnected {
                        on_link_lost();
                    }
                }
                Ok(())
            });
        let status_token = device.ConnectionStatusChanged(&status_handler)?;

        Ok(WinRtSession {
            device,
            status_token,
            notifications: None,
        })
    }

    async fn subscribe(
        &self,
        session: &mut WinRtSession,
        channel: &str,
        handler: NotificationHandler,
    ) -> Result<()> {
        let uuid = GUID::from_u128(protocol::parse_uuid(channel)?);
        let characteristic = Self::find_characteristic(&session.device, uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Characteristic {} not found", channel))?;

        Self::write_cccd(
            &characteristic,
            GattClientCharacteristicConfigurationDescriptorValue::Notify,
        )
        .await?;

        let value_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let bytes = read_buffer(&args.CharacteristicValue()?)?;
                    handler(bytes.as_slice());
                }
                Ok(())
            },
        );
        let token = characteristic.ValueChanged(&value_handler)?;
        session.notifications = Some((characteristic, token));

        info!("Notifications enabled on {}", channel);
        Ok(())
    }

    async fn unsubscribe(&self, session: &mut WinRtSession, channel: &str) -> Result<()> {
        let Some((characteristic, token)) = session.notifications.take() else {
            return Ok(());
        };

        characteristic.RemoveValueChanged(token)?;
        Self::write_cccd(
            &characteristic,
            GattClientCharacteristicConfigurationDescriptorValue::None,
        )
        .await?;

        info!("Notifications disabled on {}", channel);
        Ok(())
    }

    async fn close_session(&self, mut session: WinRtSession) -> Result<()> {
        if let Some((characteristic, token)) = session.notifications.take() {
            if let Err(e) = characteristic.RemoveValueChanged(token) {
                warn!("Failed to remove notification handler: {}", e);
            }
        }
        session
            .device
            .RemoveConnectionStatusChanged(session.status_token)?;
        session.device.Close()?;
        Ok(())
    }
}
