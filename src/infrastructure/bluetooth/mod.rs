//! Bluetooth Module
//!
//! Streams IMU telemetry from a BLE peripheral.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        ImuClient                         │
//! │   (state machine + consumption loop, owns the session)   │
//! └─────────────┬───────────────────┬───────────────┬────────┘
//!               │                   │               │
//!               ▼                   ▼               ▼
//!        ┌─────────────┐     ┌────────────┐   ┌──────────┐
//!        │   Scanner   │     │ Transport  │   │ Protocol │
//!        │             │     │            │   │          │
//!        │ - bounded   │     │ - WinRT    │   │ - UUIDs  │
//!        │   discovery │     │ - replay   │   │ - frame  │
//!        │ - matching  │     │            │   │   decode │
//!        └─────────────┘     └────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Wire constants and the 28-byte frame decoder
//! - [`transport`] - The transport collaborator trait
//! - [`scanner`] - Bounded discovery and peripheral selection
//! - [`client`] - Connection state machine and consumption loop
//! - [`replay`] - Transport that plays back a frame capture
//! - `winrt` - Windows BLE transport

pub mod client;
pub mod protocol;
pub mod replay;
pub mod scanner;
pub mod transport;
#[cfg(windows)]
pub mod winrt;

#[cfg(test)]
mod mock;

pub use client::{ClientConfig, ImuClient};
