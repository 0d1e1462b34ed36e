//! ESP32-S3 firmware-specific modules for attend-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the UART links to the fingerprint sensor and the operator
//! console, the WiFi station task, the embassy-net HTTP uplink, and the
//! configuration baked in at build time.

#![no_std]

extern crate alloc;

pub mod console;
pub mod net;
pub mod serial_port;
pub mod wifi;
pub mod wifi_secrets;
