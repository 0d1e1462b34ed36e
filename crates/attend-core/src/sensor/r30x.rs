//! R30x / AS608 optical sensor driver over a serial port

use core::future::Future;

use log::{debug, warn};
use thiserror_no_std::Error;

use super::packet::{HEADER_LEN, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, Packet, PacketError, PacketKind};
use super::{ByteSource, CharBuffer, Confirmation, FingerprintSensor, SensorError};
use crate::config::SensorConfig;
use crate::template::drain_into;
use crate::time::{Clock, Deadline};

/// Yield between polls while waiting for an acknowledgement
const REPLY_POLL_INTERVAL_MS: u32 = 2;

mod opcode {
    pub const GEN_IMAGE: u8 = 0x01;
    pub const IMAGE_TO_TZ: u8 = 0x02;
    pub const REG_MODEL: u8 = 0x05;
    pub const STORE: u8 = 0x06;
    pub const LOAD_CHAR: u8 = 0x07;
    pub const UP_CHAR: u8 = 0x08;
    pub const VERIFY_PASSWORD: u8 = 0x13;
    pub const TEMPLATE_COUNT: u8 = 0x1D;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    #[error("Serial transmit failed")]
    Transmit,
}

/// Serial link to the sensor module.
pub trait SerialPort: ByteSource {
    /// Transmit `bytes` completely.
    fn write_all(&mut self, bytes: &[u8]) -> impl Future<Output = Result<(), SerialError>>;
}

pub struct R30xSensor<P, C> {
    port: P,
    clock: C,
    address: u32,
    password: u32,
    reply_timeout_ms: u32,
}

impl<P, C> R30xSensor<P, C>
where
    P: SerialPort,
    C: Clock,
{
    pub fn new(port: P, clock: C, config: &SensorConfig) -> Self {
        Self {
            port,
            clock,
            address: config.address,
            password: config.password,
            reply_timeout_ms: config.reply_timeout_ms,
        }
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Send one command and wait for its acknowledgement.
    ///
    /// Returns the acknowledgement payload (confirmation code first) when the
    /// sensor confirmed the command.
    async fn command(
        &mut self,
        operation: &'static str,
        payload: &[u8],
    ) -> Result<heapless::Vec<u8, MAX_PAYLOAD_LEN>, SensorError> {
        // Stale bytes would desynchronise the acknowledgement framing
        self.port.discard_pending();

        let frame = Packet::command(self.address, payload).encode();
        self.port.write_all(&frame).await.map_err(|e| {
            warn!("Failed to send {} to sensor: {}", operation, e);
            SensorError::Serial { operation }
        })?;

        let ack = self.read_ack(operation).await?;
        let code = ack
            .payload
            .first()
            .copied()
            .map(Confirmation::from)
            .ok_or(SensorError::Packet {
                operation,
                error: PacketError::EmptyAck,
            })?;

        if code != Confirmation::Ok {
            debug!("Sensor rejected {}: {}", operation, code);
            return Err(SensorError::Rejected { operation, code });
        }
        Ok(ack.payload)
    }

    /// Read exactly one acknowledgement frame, leaving anything after it
    /// (such as template data packets) in the port.
    async fn read_ack(&mut self, operation: &'static str) -> Result<Packet, SensorError> {
        let timeout = SensorError::Timeout {
            operation,
            timeout_ms: self.reply_timeout_ms,
        };
        let packet_error = |error| SensorError::Packet { operation, error };

        let deadline = Deadline::after(&self.clock, self.reply_timeout_ms);
        let mut frame = [0u8; MAX_FRAME_LEN];

        let read = drain_into(
            &mut self.port,
            &self.clock,
            &mut frame[..HEADER_LEN],
            &deadline,
            REPLY_POLL_INTERVAL_MS,
        )
        .await;
        if read < HEADER_LEN {
            warn!("No reply to {} within {} ms", operation, self.reply_timeout_ms);
            return Err(timeout);
        }

        let total = match Packet::frame_len(&frame[..HEADER_LEN]).map_err(packet_error)? {
            Some(total) => total,
            None => return Err(timeout),
        };

        let read = drain_into(
            &mut self.port,
            &self.clock,
            &mut frame[HEADER_LEN..total],
            &deadline,
            REPLY_POLL_INTERVAL_MS,
        )
        .await;
        if read < total - HEADER_LEN {
            warn!("Truncated reply to {} ({} of {} bytes)", operation, HEADER_LEN + read, total);
            return Err(timeout);
        }

        let (packet, _) = Packet::decode(&frame[..total])
            .map_err(packet_error)?
            .ok_or(timeout)?;
        if packet.kind != PacketKind::Ack {
            return Err(packet_error(PacketError::UnexpectedKind(packet.kind)));
        }
        Ok(packet)
    }
}

impl<P: SerialPort, C> ByteSource for R30xSensor<P, C> {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.port.try_read(buf)
    }

    fn discard_pending(&mut self) {
        self.port.discard_pending()
    }
}

impl<P, C> FingerprintSensor for R30xSensor<P, C>
where
    P: SerialPort,
    C: Clock,
{
    async fn verify_connection(&mut self) -> bool {
        let [a, b, c, d] = self.password.to_be_bytes();
        match self
            .command("verify password", &[opcode::VERIFY_PASSWORD, a, b, c, d])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Sensor handshake failed: {}", e);
                false
            }
        }
    }

    async fn capture_image(&mut self) -> Result<(), SensorError> {
        self.command("get image", &[opcode::GEN_IMAGE]).await?;
        Ok(())
    }

    async fn image_to_features(&mut self, slot: CharBuffer) -> Result<(), SensorError> {
        self.command("image to features", &[opcode::IMAGE_TO_TZ, slot.id()])
            .await?;
        Ok(())
    }

    async fn build_model(&mut self) -> Result<(), SensorError> {
        self.command("create model", &[opcode::REG_MODEL]).await?;
        Ok(())
    }

    async fn store_model(&mut self, id: u16) -> Result<(), SensorError> {
        let [hi, lo] = id.to_be_bytes();
        self.command(
            "store model",
            &[opcode::STORE, CharBuffer::One.id(), hi, lo],
        )
        .await?;
        Ok(())
    }

    async fn load_model(&mut self, id: u16) -> Result<(), SensorError> {
        let [hi, lo] = id.to_be_bytes();
        self.command(
            "load model",
            &[opcode::LOAD_CHAR, CharBuffer::One.id(), hi, lo],
        )
        .await?;
        Ok(())
    }

    async fn request_model_dump(&mut self) -> Result<(), SensorError> {
        self.command("upload model", &[opcode::UP_CHAR, CharBuffer::One.id()])
            .await?;
        Ok(())
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        let payload = self
            .command("template count", &[opcode::TEMPLATE_COUNT])
            .await?;
        match payload.as_slice() {
            [_, hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
            _ => Err(SensorError::Packet {
                operation: "template count",
                error: PacketError::InvalidLength(payload.len() as u16),
            }),
        }
    }
}
