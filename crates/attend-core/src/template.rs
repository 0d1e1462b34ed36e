//! Template extraction
//!
//! After the sensor has been asked to dump its active model, the template
//! bytes arrive on the serial link. [`TemplateExtractor`] drains exactly the
//! expected number of bytes under a wall-clock deadline. A
//! [`FingerprintTemplate`] only exists when the full length arrived in time,
//! so a partial buffer can never reach the reporter.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::sensor::ByteSource;
use crate::time::{Clock, Deadline};

/// Number of leading bytes shown in the debug preview
const PREVIEW_LEN: usize = 20;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Incomplete template data received: {read} of {expected} bytes")]
    Shortfall { read: usize, expected: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateDecodeError {
    #[error("Template is not valid base64")]
    InvalidEncoding,
    #[error("Decoded template has {actual} bytes, expected {expected}")]
    WrongLength { actual: usize, expected: usize },
}

/// Complete fixed-length template as emitted by the sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintTemplate {
    bytes: Vec<u8>,
}

impl FingerprintTemplate {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard (padded) base64 text used in the JSON payloads.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Decode a template received as text, enforcing the sensor's length.
    pub fn from_base64(text: &str, expected_len: usize) -> Result<Self, TemplateDecodeError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|_| TemplateDecodeError::InvalidEncoding)?;
        if bytes.len() != expected_len {
            return Err(TemplateDecodeError::WrongLength {
                actual: bytes.len(),
                expected: expected_len,
            });
        }
        Ok(Self { bytes })
    }

    /// Hex dump of the first bytes, for logs.
    pub fn preview(&self) -> heapless::String<64> {
        let mut out = heapless::String::new();
        for byte in self.bytes.iter().take(PREVIEW_LEN) {
            let _ = write!(out, "{:02X} ", byte);
        }
        out
    }
}

/// Copy bytes from `source` into `buf` until it is full or `deadline` expires.
///
/// Yields `poll_interval_ms` whenever nothing is pending instead of spinning.
/// Returns the number of bytes written, in arrival order.
pub async fn drain_into<B, C>(
    source: &mut B,
    clock: &C,
    buf: &mut [u8],
    deadline: &Deadline,
    poll_interval_ms: u32,
) -> usize
where
    B: ByteSource + ?Sized,
    C: Clock,
{
    let mut filled = 0;
    while filled < buf.len() && !deadline.expired(clock) {
        match source.try_read(&mut buf[filled..]) {
            0 => clock.sleep_ms(poll_interval_ms).await,
            read => filled += read,
        }
    }
    filled
}

/// Deadline-bounded drain of one template from the sensor's byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateExtractor {
    expected_len: usize,
    poll_interval_ms: u32,
}

impl TemplateExtractor {
    pub fn new(expected_len: usize, poll_interval_ms: u32) -> Self {
        Self {
            expected_len,
            poll_interval_ms,
        }
    }

    /// Drain `expected_len` bytes within `deadline_ms`.
    ///
    /// A shortfall drops the partial buffer and reports how many bytes came.
    pub async fn extract<B, C>(
        &self,
        source: &mut B,
        clock: &C,
        deadline_ms: u32,
    ) -> Result<FingerprintTemplate, ExtractError>
    where
        B: ByteSource + ?Sized,
        C: Clock,
    {
        let mut bytes = vec![0u8; self.expected_len];
        let deadline = Deadline::after(clock, deadline_ms);
        let read = drain_into(source, clock, &mut bytes, &deadline, self.poll_interval_ms).await;

        if read < self.expected_len {
            warn!(
                "Incomplete template data received. Bytes read: {} of {} after {} ms",
                read,
                self.expected_len,
                deadline.elapsed_ms(clock)
            );
            return Err(ExtractError::Shortfall {
                read,
                expected: self.expected_len,
            });
        }

        let template = FingerprintTemplate { bytes };
        info!(
            "Template downloaded successfully ({} bytes in {} ms)",
            template.len(),
            deadline.elapsed_ms(clock)
        );
        debug!("Raw template data (first {} bytes): {}", PREVIEW_LEN, template.preview());
        Ok(template)
    }
}
