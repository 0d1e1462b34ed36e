//! UART link to the fingerprint sensor

use attend_core::sensor::{ByteSource, SerialError, SerialPort};
use esp_hal::Async;
use esp_hal::uart::Uart;
use log::warn;

/// Sensor UART (UART2 on GPIO16/17).
///
/// Reads are served from the UART's receive FIFO without waiting, which is
/// what the acknowledgement reader and the template drain expect.
pub struct UartSensorPort {
    uart: Uart<'static, Async>,
}

impl UartSensorPort {
    pub fn new(uart: Uart<'static, Async>) -> Self {
        Self { uart }
    }
}

impl ByteSource for UartSensorPort {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        match self.uart.read_buffered(buf) {
            Ok(read) => read,
            Err(e) => {
                warn!("Sensor UART read error: {:?}", e);
                0
            }
        }
    }

    fn discard_pending(&mut self) {
        let mut scratch = [0u8; 64];
        while self.try_read(&mut scratch) > 0 {}
    }
}

impl SerialPort for UartSensorPort {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        embedded_io_async::Write::write_all(&mut self.uart, bytes)
            .await
            .map_err(|e| {
                warn!("Sensor UART write error: {:?}", e);
                SerialError::Transmit
            })?;
        embedded_io_async::Write::flush(&mut self.uart)
            .await
            .map_err(|_| SerialError::Transmit)
    }
}
