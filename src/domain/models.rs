use std::fmt;

/// One decoded IMU frame.
///
/// Built in one piece by the frame decoder and never mutated afterwards, so a
/// reader can never observe a half-updated sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySample {
    /// Device clock in microseconds (wraps after ~71.5 minutes, uncorrected)
    pub timestamp_micros: u32,

    // Accelerometer data (x, y, z)
    pub accel: [f32; 3],

    // Gyroscope data (x, y, z)
    pub gyro: [f32; 3],
}

impl TelemetrySample {
    /// Device timestamp in seconds
    pub fn seconds(&self) -> f64 {
        self.timestamp_micros as f64 / 1_000_000.0
    }
}

/// A peripheral reported by a discovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub name: String,
    pub address: u64,
    pub signal_strength: i16,
}

/// Lifecycle of a connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Discovering,
    Connected,
    Streaming,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Discovering => "discovering",
            Self::Connected => "connected",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}
