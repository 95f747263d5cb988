use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeError};

pub const DEFAULT_RESOURCE_FILTER:&str = "USB";
pub const DEFAULT_CHANNEL:&str = "CHAN1";
pub const DEFAULT_STOP_POINT:u64 = 1_000_000;
pub const DEFAULT_POLL_INTERVAL_MS:u64 = 100;
pub const DEFAULT_TRIGGER_TIMEOUT_MS:u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub transport: TransportConfig,
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    // Substring a discovered resource must contain to be picked
    pub resource_filter: String,
    // Skips discovery entirely when set
    pub resource: Option<String>,
    pub vxi11_hosts: Vec<String>,
    pub discovery_broadcast: bool,
    pub open_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub chunk_size: usize,
    pub write_termination: String,
    pub read_termination: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            resource_filter: DEFAULT_RESOURCE_FILTER.to_owned(),
            resource: None,
            vxi11_hosts: vec![],
            discovery_broadcast: true,
            open_timeout_ms: 20_000,
            io_timeout_ms: 5_000,
            chunk_size: 1_024_000,
            write_termination: "\n".to_owned(),
            read_termination: "\n".to_owned(),
        }
    }
}

impl TransportConfig {
    pub fn open_timeout(&self) -> Duration { Duration::from_millis(self.open_timeout_ms) }
    pub fn io_timeout(&self) -> Duration { Duration::from_millis(self.io_timeout_ms) }

    // Single-byte terminations can be handed to the instrument as a term char
    pub fn read_term_char(&self) -> Option<u8> {
        match self.read_termination.as_bytes() {
            [c] => Some(*c),
            _   => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub channel: String,
    pub stop_point: u64,
    pub poll_interval_ms: u64,
    pub trigger_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_owned(),
            stop_point: DEFAULT_STOP_POINT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            trigger_timeout_ms: DEFAULT_TRIGGER_TIMEOUT_MS,
        }
    }
}

impl AcquisitionConfig {
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
    pub fn trigger_timeout(&self) -> Duration { Duration::from_millis(self.trigger_timeout_ms) }
}

impl ScopeConfig {

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ScopeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("Unable to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
            .map_err(|e| ScopeError::Config(format!("{}: {}", path.display(), e)))
    }

    // Falls back to defaults when no path is given; a path that can't be read is still an error
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None    => Ok(Self::default()),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = ScopeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ScopeConfig::default());
        assert_eq!(cfg.transport.resource_filter, "USB");
        assert_eq!(cfg.acquisition.channel, "CHAN1");
        assert_eq!(cfg.acquisition.stop_point, 1_000_000);
        assert_eq!(cfg.acquisition.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.acquisition.trigger_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.transport.read_term_char(), Some(b'\n'));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ScopeConfig::from_toml_str(
            r#"
            [transport]
            resource = "TCPIP0::192.168.1.101::inst0::INSTR"
            io_timeout_ms = 2500

            [acquisition]
            channel = "CHAN2"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.transport.resource.as_deref(), Some("TCPIP0::192.168.1.101::inst0::INSTR"));
        assert_eq!(cfg.transport.io_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.transport.open_timeout_ms, 20_000);
        assert_eq!(cfg.acquisition.channel, "CHAN2");
        assert_eq!(cfg.acquisition.stop_point, 1_000_000);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let e = ScopeConfig::from_toml_str("[acquisition]\nstop_point = \"lots\"").unwrap_err();
        assert!(matches!(e, ScopeError::Config(_)));
    }

    #[test]
    fn multi_byte_termination_has_no_term_char() {
        let t = TransportConfig { read_termination: "\r\n".to_owned(), ..TransportConfig::default() };
        assert_eq!(t.read_term_char(), None);
    }
}
