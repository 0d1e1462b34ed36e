//! Device configuration baked in by `build.rs` from `.env`

use attend_core::config::{ApiConfig, CaptureTiming, Config, InternetConfig, SensorConfig};

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const ENROLL_URL: &str = env!("ENROLL_URL");
pub const MATCH_URL: &str = env!("MATCH_URL");

/// Build the runtime configuration; sensor and timing use their defaults.
pub fn device_config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        api: ApiConfig {
            enroll_url: ENROLL_URL,
            match_url: MATCH_URL,
        },
        sensor: SensorConfig::default(),
        timing: CaptureTiming::default(),
    }
}
