//! Device configuration
//!
//! The firmware builds a [`Config`] from values baked in at compile time; the
//! simulator deserializes one from a JSON file. Strings are borrowed so the
//! same type works without an allocator-backed copy.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::http::{HttpUrl, Scheme};

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub api: ApiConfig<'a>,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub timing: CaptureTiming,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Remote endpoints for the two report flows
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ApiConfig<'a> {
    pub enroll_url: &'a str,
    pub match_url: &'a str,
}

/// Serial sensor parameters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SensorConfig {
    pub baud_rate: u32,
    /// Module address used in every packet header
    pub address: u32,
    /// Handshake password checked at startup
    pub password: u32,
    /// Raw template size emitted by `UpChar`; 512 on the R307/AS608 modules
    pub template_len: usize,
    /// Highest model id the sensor library accepts
    pub capacity: u16,
    pub reply_timeout_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            baud_rate: 57_600,
            address: 0xFFFF_FFFF,
            password: 0,
            template_len: 512,
            capacity: 127,
            reply_timeout_ms: 1000,
        }
    }
}

/// Delays, retry bounds and deadlines of one capture cycle
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureTiming {
    /// Settle time between the two enrollment scans
    pub removal_delay_ms: u32,
    /// Yield between image polls while waiting for a finger
    pub image_poll_interval_ms: u32,
    /// Upper bound for the enrollment finger wait; `None` waits for the operator
    pub enroll_scan_timeout_ms: Option<u32>,
    /// Total capture attempts in the verification flow
    pub verify_attempts: u8,
    pub retry_backoff_ms: u32,
    pub enroll_deadline_ms: u32,
    pub match_deadline_ms: u32,
    pub drain_poll_interval_ms: u32,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            removal_delay_ms: 2000,
            image_poll_interval_ms: 50,
            enroll_scan_timeout_ms: None,
            verify_attempts: 3,
            retry_backoff_ms: 1000,
            enroll_deadline_ms: 3000,
            match_deadline_ms: 5000,
            drain_poll_interval_ms: 5,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Malformed(heapless::String<64>),
    #[error("WiFi SSID must not be empty")]
    MissingSsid,
    #[error("Invalid {field} URL")]
    InvalidUrl { field: &'static str },
    #[error("Template length must be non-zero")]
    ZeroTemplateLength,
    #[error("Verification needs at least one capture attempt")]
    ZeroAttempts,
}

impl<'a> Config<'a> {
    /// Parse a JSON document; missing `sensor`/`timing` sections take defaults.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            let mut details = heapless::String::new();
            // Truncated messages are still useful
            let _ = core::fmt::write(&mut details, format_args!("{}", e));
            ConfigError::Malformed(details)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the rest of the terminal relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.internet.ssid.is_empty() {
            return Err(ConfigError::MissingSsid);
        }
        HttpUrl::parse(self.api.enroll_url)
            .map_err(|_| ConfigError::InvalidUrl { field: "enroll" })?;
        HttpUrl::parse(self.api.match_url).map_err(|_| ConfigError::InvalidUrl { field: "match" })?;
        if self.sensor.template_len == 0 {
            return Err(ConfigError::ZeroTemplateLength);
        }
        if self.timing.verify_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// True when either endpoint is an `https://` URL.
    pub fn uses_tls(&self) -> bool {
        [self.api.enroll_url, self.api.match_url]
            .into_iter()
            .filter_map(|url| HttpUrl::parse(url).ok())
            .any(|url| url.scheme == Scheme::Https)
    }
}
