//! Configuration.
//!
//! [`PadConfig`] is read from TOML (or JSON, by file extension). Every field
//! has a default, so an empty file describes the stock pad:
//!
//! ```toml
//! [device]
//! vendor_id = 0x0079
//! product_id = 0x0011
//! report_id_prefix = true
//! read_timeout_ms = 100
//!
//! [device.fallback_capabilities]
//! input_report_length = 9
//! output_report_length = 0
//!
//! [poller]
//! period = 3
//!
//! [watcher]
//! enabled = true
//! interval_ms = 1000
//!
//! [keyboard]
//! left = [0x804B]
//! a = [0x2C, 0x39]
//! ```

use crate::channel::{ChannelOptions, DEFAULT_READ_TIMEOUT};
use crate::device::{DeviceCapabilities, DeviceIdentity};
use crate::error::DeviceError;
use crate::keyboard::KeyMap;
use crate::notify::DEFAULT_WATCH_INTERVAL;
use crate::poller::DEFAULT_PERIOD;
use crate::report::ReportLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    pub device: DeviceSection,
    pub poller: PollerSection,
    pub watcher: WatcherSection,
    pub keyboard: KeyMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Re-insert the report-ID byte that the HID layer strips from unnumbered reports.
    pub report_id_prefix: bool,
    pub read_timeout_ms: u64,
    /// Used where the platform cannot report capabilities itself.
    pub fallback_capabilities: DeviceCapabilities,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vendor_id: DeviceIdentity::SNES_PAD.vendor_id,
            product_id: DeviceIdentity::SNES_PAD.product_id,
            report_id_prefix: true,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            fallback_capabilities: DeviceCapabilities::default(),
        }
    }
}

impl DeviceSection {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vendor_id, self.product_id)
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            layout: ReportLayout::V1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    /// A real device query runs on every `period`-th call.
    pub period: u32,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Run the polling presence watcher as the notification source.
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_WATCH_INTERVAL.as_millis() as u64,
        }
    }
}

impl WatcherSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl PadConfig {
    /// Load from a file. `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DeviceError> {
        let config: Self = toml::from_str(text).map_err(|e| DeviceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DeviceError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| DeviceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, DeviceError> {
        toml::to_string_pretty(self).map_err(|e| DeviceError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.poller.period == 0 {
            return Err(DeviceError::Config("poller.period must be at least 1".into()));
        }
        if self.device.read_timeout_ms == 0 {
            // A zero timeout polls without waiting for the pad's answer.
            return Err(DeviceError::Config(
                "device.read_timeout_ms must be at least 1".into(),
            ));
        }
        if self.watcher.enabled && self.watcher.interval_ms == 0 {
            return Err(DeviceError::Config(
                "watcher.interval_ms must be non-zero when the watcher is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyCode;
    use std::io::Write;

    #[test]
    fn empty_toml_is_the_stock_pad() {
        let config = PadConfig::from_toml_str("").expect("parse");
        assert_eq!(config, PadConfig::default());
        assert_eq!(config.device.identity(), DeviceIdentity::SNES_PAD);
        assert_eq!(config.poller.period, 3);
        assert!(config.device.report_id_prefix);
    }

    #[test]
    fn hex_identity_and_partial_sections() {
        let text = r#"
            [device]
            vendor_id = 0x12BA
            product_id = 0x0100
            read_timeout_ms = 40

            [device.fallback_capabilities]
            input_report_length = 28
            output_report_length = 8

            [poller]
            period = 5

            [keyboard]
            a = [0x1E]
        "#;
        let config = PadConfig::from_toml_str(text).expect("parse");
        assert_eq!(config.device.identity(), DeviceIdentity::new(0x12BA, 0x0100));
        assert_eq!(
            config.device.channel_options().read_timeout,
            Duration::from_millis(40)
        );
        assert_eq!(config.device.fallback_capabilities.input_report_length, 28);
        assert_eq!(config.poller.period, 5);
        assert_eq!(config.keyboard.a, vec![KeyCode(0x1E)]);
        assert!(config.watcher.enabled);
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = PadConfig::from_toml_str("[poller]\nperiod = 0\n").unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let err = PadConfig::from_toml_str("[device]\nread_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(&err, DeviceError::Config(msg) if msg.contains("read_timeout_ms")));
        assert!(PadConfig::from_toml_str("[device]\nread_timeout_ms = 1\n").is_ok());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = PadConfig::from_toml_str("[device\nvendor_id = 1").unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");

        let json_path = dir.path().join("pad.json");
        let mut f = std::fs::File::create(&json_path).unwrap();
        write!(f, r#"{{ "poller": {{ "period": 4 }}, "watcher": {{ "enabled": false }} }}"#)
            .unwrap();
        let config = PadConfig::load(&json_path).expect("json");
        assert_eq!(config.poller.period, 4);
        assert!(!config.watcher.enabled);

        let toml_path = dir.path().join("pad.toml");
        std::fs::write(&toml_path, PadConfig::default().to_toml_string().unwrap()).unwrap();
        assert_eq!(PadConfig::load(&toml_path).expect("toml"), PadConfig::default());

        assert!(matches!(
            PadConfig::load(dir.path().join("missing.toml")),
            Err(DeviceError::Io(_))
        ));
    }
}
