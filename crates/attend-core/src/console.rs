//! Operator console
//!
//! Single-byte commands (`e` enroll, `m` match) and the decimal enrollment id
//! arrive on a byte console: UART0 on the device, stdin on the simulator.

use core::future::Future;

use log::{debug, warn};
use thiserror_no_std::Error;

/// Longest id line kept; anything longer is not a valid id anyway
const MAX_ID_LINE: usize = 8;

/// Byte-at-a-time operator input.
pub trait OperatorConsole {
    /// Wait for the next byte. `None` means the console was closed.
    fn read_byte(&mut self) -> impl Future<Output = Option<u8>>;
}

impl<T: OperatorConsole + ?Sized> OperatorConsole for &mut T {
    fn read_byte(&mut self) -> impl Future<Output = Option<u8>> {
        (**self).read_byte()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Enroll,
    Match,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'e' | b'E' => Some(Self::Enroll),
            b'm' | b'M' => Some(Self::Match),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    #[error("No id entered")]
    Empty,
    #[error("Id is not a decimal number")]
    NotNumeric,
    #[error("Id {id} outside 1..={capacity}")]
    OutOfRange { id: u32, capacity: u16 },
    #[error("Console closed")]
    Closed,
}

/// Wait for the next recognised command.
///
/// Whitespace is skipped silently and unknown bytes are logged. Returns
/// `None` once the console is closed.
pub async fn next_command<T: OperatorConsole + ?Sized>(console: &mut T) -> Option<Command> {
    loop {
        let byte = console.read_byte().await?;
        if byte.is_ascii_whitespace() {
            continue;
        }
        match Command::from_byte(byte) {
            Some(command) => {
                debug!("Console command {:?}", command);
                return Some(command);
            }
            None => warn!("Ignoring unknown command byte 0x{:02X}", byte),
        }
    }
}

/// Read one id line and check it against the library `capacity`.
///
/// Line endings left over from the command are skipped first.
pub async fn read_enroll_id<T: OperatorConsole + ?Sized>(
    console: &mut T,
    capacity: u16,
) -> Result<u16, IdError> {
    let mut line = heapless::String::<MAX_ID_LINE>::new();
    let mut overflow = false;
    let mut started = false;

    loop {
        let byte = console.read_byte().await.ok_or(IdError::Closed)?;
        if byte == b'\r' || byte == b'\n' {
            if started {
                break;
            }
            continue;
        }
        started = true;
        if line.push(char::from(byte)).is_err() {
            overflow = true;
        }
    }

    if overflow {
        return Err(IdError::NotNumeric);
    }
    parse_enroll_id(&line, capacity)
}

/// Parse a decimal id in `1..=capacity`.
pub fn parse_enroll_id(text: &str, capacity: u16) -> Result<u16, IdError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(IdError::Empty);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::NotNumeric);
    }
    let id: u32 = text.parse().map_err(|_| IdError::NotNumeric)?;
    if id == 0 || id > u32::from(capacity) {
        return Err(IdError::OutOfRange { id, capacity });
    }
    Ok(id as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConsole;
    use embassy_futures::block_on;

    #[test]
    fn test_parse_enroll_id_range() {
        assert_eq!(parse_enroll_id("1", 127), Ok(1));
        assert_eq!(parse_enroll_id(" 127 ", 127), Ok(127));
        assert_eq!(
            parse_enroll_id("0", 127),
            Err(IdError::OutOfRange {
                id: 0,
                capacity: 127
            })
        );
        assert_eq!(
            parse_enroll_id("128", 127),
            Err(IdError::OutOfRange {
                id: 128,
                capacity: 127
            })
        );
        assert_eq!(parse_enroll_id("", 127), Err(IdError::Empty));
        assert_eq!(parse_enroll_id("4a", 127), Err(IdError::NotNumeric));
        assert_eq!(parse_enroll_id("-3", 127), Err(IdError::NotNumeric));
    }

    #[test]
    fn test_commands_skip_noise() {
        let mut console = ScriptedConsole::new(" \r\nx?m\ne");

        assert_eq!(block_on(next_command(&mut console)), Some(Command::Match));
        assert_eq!(block_on(next_command(&mut console)), Some(Command::Enroll));
        assert_eq!(block_on(next_command(&mut console)), None);
    }

    #[test]
    fn test_read_id_after_command_line() {
        let mut console = ScriptedConsole::new("e\r\n42\r\nm");

        assert_eq!(block_on(next_command(&mut console)), Some(Command::Enroll));
        assert_eq!(block_on(read_enroll_id(&mut console, 127)), Ok(42));
        assert_eq!(block_on(next_command(&mut console)), Some(Command::Match));
    }

    #[test]
    fn test_read_id_rejects_long_line() {
        let mut console = ScriptedConsole::new("1234567890123\n");

        assert_eq!(
            block_on(read_enroll_id(&mut console, 127)),
            Err(IdError::NotNumeric)
        );
    }

    #[test]
    fn test_read_id_closed_console() {
        let mut console = ScriptedConsole::new("4");

        assert_eq!(
            block_on(read_enroll_id(&mut console, 127)),
            Err(IdError::Closed)
        );
    }
}
