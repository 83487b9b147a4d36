//! Sample rendering for the terminal or a log file.

use crate::domain::models::TelemetrySample;
use std::io::{self, Write};

/// Receives each new sample from the consumption loop
pub trait SampleSink {
    fn render(&mut self, sample: &TelemetrySample) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Single line, overwritten in place with a carriage return
    Human,
    /// One comma-separated line per sample
    Csv,
}

impl OutputMode {
    pub fn from_csv_flag(csv: bool) -> Self {
        if csv {
            Self::Csv
        } else {
            Self::Human
        }
    }
}

pub fn format_human(sample: &TelemetrySample) -> String {
    let [ax, ay, az] = sample.accel;
    let [gx, gy, gz] = sample.gyro;
    format!(
        "\r Time: {:+.3} | Accl: {:+.3}, {:+.3}, {:+.3} | Gyro: {:+.3}, {:+.3}, {:+.3}",
        sample.seconds(),
        ax,
        ay,
        az,
        gx,
        gy,
        gz
    )
}

pub fn format_csv(sample: &TelemetrySample) -> String {
    let [ax, ay, az] = sample.accel;
    let [gx, gy, gz] = sample.gyro;
    format!(
        "{:+.3}, {:+.3}, {:+.3}, {:+.3}, {:+.3}, {:+.3}, {:+.3}\n",
        sample.seconds(),
        ax,
        ay,
        az,
        gx,
        gy,
        gz
    )
}

/// Writes samples to a terminal or redirected stdout
pub struct ConsoleRenderer<W: Write> {
    writer: W,
    mode: OutputMode,
    enabled: bool,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(writer: W, mode: OutputMode, enabled: bool) -> Self {
        Self {
            writer,
            mode,
            enabled,
        }
    }

    /// Finish an in-place line so later output starts on a fresh one
    pub fn finish(&mut self) -> io::Result<()> {
        if self.enabled && self.mode == OutputMode::Human {
            self.writer.write_all(b"\n")?;
            self.writer.flush()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for ConsoleRenderer<W> {
    fn render(&mut self, sample: &TelemetrySample) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let line = match self.mode {
            OutputMode::Human => format_human(sample),
            OutputMode::Csv => format_csv(sample),
        };
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            timestamp_micros: 1_500_000,
            accel: [0.0123, -0.98, 1.0],
            gyro: [12.5, -0.25, 300.0],
        }
    }

    #[test]
    fn test_human_format() {
        assert_eq!(
            format_human(&sample()),
            "\r Time: +1.500 | Accl: +0.012, -0.980, +1.000 | Gyro: +12.500, -0.250, +300.000"
        );
    }

    #[test]
    fn test_csv_format() {
        assert_eq!(
            format_csv(&sample()),
            "+1.500, +0.012, -0.980, +1.000, +12.500, -0.250, +300.000\n"
        );
    }

    #[test]
    fn test_renderer_writes_selected_mode() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), OutputMode::Csv, true);
        renderer.render(&sample()).unwrap();
        renderer.render(&sample()).unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("+1.500, "));
    }

    #[test]
    fn test_disabled_renderer_writes_nothing() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), OutputMode::Human, false);
        renderer.render(&sample()).unwrap();
        renderer.finish().unwrap();
        assert!(renderer.into_inner().is_empty());
    }

    #[test]
    fn test_human_finish_ends_line() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), OutputMode::Human, true);
        renderer.render(&sample()).unwrap();
        renderer.finish().unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(out.starts_with("\r Time:"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(OutputMode::from_csv_flag(true), OutputMode::Csv);
        assert_eq!(OutputMode::from_csv_flag(false), OutputMode::Human);
    }
}
