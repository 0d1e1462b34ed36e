//! Hardware-independent core library for attend-rs
//!
//! This crate contains all platform-agnostic logic for the fingerprint
//! attendance terminal: the R30x sensor packet driver, the capture state
//! machine, deadline-bounded template extraction, result reporting over HTTP,
//! the operator console, configuration, and status display rendering.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod capture;
pub mod config;
pub mod console;
pub mod display;
pub mod feedback;
pub mod http;
pub mod report;
pub mod sensor;
pub mod template;
pub mod terminal;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureController, CaptureFailure, CaptureMode, CaptureState};
pub use config::Config;
pub use feedback::{Feedback, Status};
pub use report::{ReportOutcome, ResultReporter, Uplink};
pub use sensor::{ByteSource, FingerprintSensor, SensorError, SensorSession};
pub use template::{ExtractError, FingerprintTemplate, TemplateExtractor};
pub use terminal::{AttendanceTerminal, CycleOutcome};
pub use time::Clock;
