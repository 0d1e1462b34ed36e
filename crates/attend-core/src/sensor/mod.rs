//! Fingerprint sensor abstraction
//!
//! [`FingerprintSensor`] is the contract the capture state machine needs from
//! an optical sensor module. [`R30xSensor`] implements it over a serial port
//! using the R30x/AS608 packet protocol, and [`SensorSession`] wraps any
//! implementation with the per-run session state (baud rate, handshake result,
//! last outcome).

mod packet;
mod r30x;

pub use packet::{Packet, PacketError, PacketKind};
pub use r30x::{R30xSensor, SerialError, SerialPort};

use core::fmt;
use core::future::Future;

use log::{error, info};
use thiserror_no_std::Error;

/// Non-blocking access to bytes the sensor has already sent.
///
/// The receive side of the serial link is single owner: the driver reads
/// acknowledgements through it, the template extractor drains model data
/// through it, and the reporter flushes it at the end of every cycle.
pub trait ByteSource {
    /// Copy up to `buf.len()` already-received bytes into `buf` without
    /// waiting. Returns the number of bytes copied (0 when nothing is pending).
    fn try_read(&mut self, buf: &mut [u8]) -> usize;

    /// Drop everything currently buffered on the receive side.
    fn discard_pending(&mut self);
}

/// Sensor-side feature buffer that a scan is converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBuffer {
    One = 1,
    Two = 2,
}

impl CharBuffer {
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// Operations the capture controller drives on the sensor.
pub trait FingerprintSensor: ByteSource {
    /// Handshake with the module; `false` makes the device inert.
    fn verify_connection(&mut self) -> impl Future<Output = bool>;

    /// Take one image. `Err` means no usable finger image this time.
    fn capture_image(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Convert the last image into a feature set in `slot`.
    fn image_to_features(
        &mut self,
        slot: CharBuffer,
    ) -> impl Future<Output = Result<(), SensorError>>;

    /// Fuse both feature buffers into a model.
    fn build_model(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Persist the fused model in the sensor library at `id`.
    fn store_model(&mut self, id: u16) -> impl Future<Output = Result<(), SensorError>>;

    /// Load the model stored at `id` back into the active buffer.
    fn load_model(&mut self, id: u16) -> impl Future<Output = Result<(), SensorError>>;

    /// Ask the sensor to stream the active model's template bytes.
    ///
    /// On success only the acknowledgement has been consumed; the template
    /// itself is left in the [`ByteSource`] for the extractor.
    fn request_model_dump(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Number of models stored in the sensor library.
    fn template_count(&mut self) -> impl Future<Output = Result<u16, SensorError>>;
}

/// Acknowledgement confirmation codes of the R30x command set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Ok,
    PacketReceiveError,
    NoFinger,
    ImageFail,
    ImageMess,
    FeatureFail,
    NoMatch,
    NotFound,
    EnrollMismatch,
    BadLocation,
    DbReadFail,
    UploadFeatureFail,
    PacketResponseFail,
    UploadFail,
    DeleteFail,
    DbClearFail,
    PasswordFail,
    InvalidImage,
    FlashError,
    InvalidRegister,
    Other(u8),
}

impl From<u8> for Confirmation {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Ok,
            0x01 => Self::PacketReceiveError,
            0x02 => Self::NoFinger,
            0x03 => Self::ImageFail,
            0x06 => Self::ImageMess,
            0x07 => Self::FeatureFail,
            0x08 => Self::NoMatch,
            0x09 => Self::NotFound,
            0x0A => Self::EnrollMismatch,
            0x0B => Self::BadLocation,
            0x0C => Self::DbReadFail,
            0x0D => Self::UploadFeatureFail,
            0x0E => Self::PacketResponseFail,
            0x0F => Self::UploadFail,
            0x10 => Self::DeleteFail,
            0x11 => Self::DbClearFail,
            0x13 => Self::PasswordFail,
            0x15 => Self::InvalidImage,
            0x18 => Self::FlashError,
            0x1A => Self::InvalidRegister,
            other => Self::Other(other),
        }
    }
}

impl Confirmation {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::PacketReceiveError => "packet receive error",
            Self::NoFinger => "no finger detected",
            Self::ImageFail => "imaging error",
            Self::ImageMess => "image too messy",
            Self::FeatureFail => "could not find fingerprint features",
            Self::NoMatch => "fingers do not match",
            Self::NotFound => "no match found",
            Self::EnrollMismatch => "scans do not belong to one finger",
            Self::BadLocation => "id outside of library",
            Self::DbReadFail => "error reading template from library",
            Self::UploadFeatureFail => "error uploading template",
            Self::PacketResponseFail => "module cannot receive data packets",
            Self::UploadFail => "error uploading image",
            Self::DeleteFail => "error deleting template",
            Self::DbClearFail => "error clearing library",
            Self::PasswordFail => "wrong password",
            Self::InvalidImage => "no valid primary image",
            Self::FlashError => "error writing flash",
            Self::InvalidRegister => "invalid register number",
            Self::Other(_) => "unknown confirmation code",
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{} (0x{:02X})", self.description(), code),
            _ => f.write_str(self.description()),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("Sensor rejected {operation}: {code}")]
    Rejected {
        operation: &'static str,
        code: Confirmation,
    },
    #[error("No reply to {operation} within {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u32,
    },
    #[error("Malformed reply to {operation}: {error}")]
    Packet {
        operation: &'static str,
        error: PacketError,
    },
    #[error("Serial write failed during {operation}")]
    Serial { operation: &'static str },
}

impl SensorError {
    /// Confirmation code reported by the sensor, if it answered at all.
    pub fn confirmation(&self) -> Option<Confirmation> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupError {
    #[error("Fingerprint sensor did not answer the handshake at {baud_rate} baud")]
    SensorUnverified { baud_rate: u32 },
}

/// Live connection to the sensor for the whole power-on period.
///
/// The handshake runs once in [`SensorSession::open`]; every operation that
/// passes through the session records its outcome so the last result can be
/// inspected (and logged) after a failed cycle.
pub struct SensorSession<S> {
    sensor: S,
    baud_rate: u32,
    verified: bool,
    last_outcome: Result<(), SensorError>,
}

impl<S: FingerprintSensor> SensorSession<S> {
    /// Verify the sensor; a sensor that does not answer is fatal at startup.
    pub async fn open(mut sensor: S, baud_rate: u32) -> Result<Self, StartupError> {
        if !sensor.verify_connection().await {
            error!("Failed to initialize fingerprint sensor at {} baud", baud_rate);
            return Err(StartupError::SensorUnverified { baud_rate });
        }
        info!("Fingerprint sensor initialized successfully");

        Ok(Self {
            sensor,
            baud_rate,
            verified: true,
            last_outcome: Ok(()),
        })
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Outcome of the most recent sensor operation.
    pub fn last_outcome(&self) -> Result<(), SensorError> {
        self.last_outcome
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    fn record<T>(&mut self, outcome: Result<T, SensorError>) -> Result<T, SensorError> {
        self.last_outcome = outcome.as_ref().map(|_| ()).map_err(|e| *e);
        outcome
    }
}

impl<S: FingerprintSensor> ByteSource for SensorSession<S> {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.sensor.try_read(buf)
    }

    fn discard_pending(&mut self) {
        self.sensor.discard_pending()
    }
}

impl<S: FingerprintSensor> FingerprintSensor for SensorSession<S> {
    async fn verify_connection(&mut self) -> bool {
        self.sensor.verify_connection().await
    }

    async fn capture_image(&mut self) -> Result<(), SensorError> {
        let outcome = self.sensor.capture_image().await;
        self.record(outcome)
    }

    async fn image_to_features(&mut self, slot: CharBuffer) -> Result<(), SensorError> {
        let outcome = self.sensor.image_to_features(slot).await;
        self.record(outcome)
    }

    async fn build_model(&mut self) -> Result<(), SensorError> {
        let outcome = self.sensor.build_model().await;
        self.record(outcome)
    }

    async fn store_model(&mut self, id: u16) -> Result<(), SensorError> {
        let outcome = self.sensor.store_model(id).await;
        self.record(outcome)
    }

    async fn load_model(&mut self, id: u16) -> Result<(), SensorError> {
        let outcome = self.sensor.load_model(id).await;
        self.record(outcome)
    }

    async fn request_model_dump(&mut self) -> Result<(), SensorError> {
        let outcome = self.sensor.request_model_dump().await;
        self.record(outcome)
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        let outcome = self.sensor.template_count().await;
        self.record(outcome)
    }
}
