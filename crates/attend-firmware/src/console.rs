//! Operator console on UART0

use attend_core::console::OperatorConsole;
use esp_hal::Async;
use esp_hal::uart::UartRx;
use log::warn;

pub struct UartConsole {
    rx: UartRx<'static, Async>,
}

impl UartConsole {
    pub fn new(rx: UartRx<'static, Async>) -> Self {
        Self { rx }
    }
}

impl OperatorConsole for UartConsole {
    /// UART0 never closes; errors are logged and the read is retried.
    async fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        loop {
            match embedded_io_async::Read::read(&mut self.rx, &mut byte).await {
                Ok(1) => return Some(byte[0]),
                Ok(_) => {}
                Err(e) => warn!("Console read error: {:?}", e),
            }
        }
    }
}
