//! Bakes the device configuration from `.env` into the firmware.
//!
//! Values already present in the environment win over the file, so CI can
//! build without one.

const KEYS: [&str; 4] = ["WIFI_SSID", "WIFI_PASSWORD", "ENROLL_URL", "MATCH_URL"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // A missing .env is fine; the variables may come from the environment
    let _ = dotenvy::dotenv();

    for key in KEYS {
        let value = std::env::var(key).unwrap_or_default();
        if value.is_empty() {
            println!("cargo:warning={key} is not set; the terminal will not be able to report");
        }
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
