use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use callscreen_core::{CommandChannel, ModemError, Result};
use serialport::SerialPort;
use tracing::debug;

use crate::error::CliError;

const READ_CHUNK: usize = 256;
/// Initial port timeout; every read sets its own
const OPEN_TIMEOUT: Duration = Duration::from_millis(100);

/// Splits a byte stream into lines on `\r` or `\n`, dropping blank lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let end = self.pending.iter().position(|&b| b == b'\r' || b == b'\n')?;
            let mut line: Vec<u8> = self.pending.drain(..=end).collect();
            line.pop();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }
}

/// Modem attached over a serial port
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    lines: LineSplitter,
}

impl SerialChannel {
    pub fn open(path: &str, baud: u32) -> std::result::Result<Self, CliError> {
        let port = serialport::new(path, baud)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|source| CliError::Serial {
                path: path.to_string(),
                source,
            })?;
        debug!(path, baud, "Serial port opened");
        Ok(Self {
            port,
            lines: LineSplitter::default(),
        })
    }
}

impl CommandChannel for SerialChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.port.set_timeout(deadline - now).map_err(std::io::Error::from)?;

            match self.port.read(&mut buffer) {
                Ok(0) => return Err(ModemError::ChannelClosed),
                Ok(n) => self.lines.push(&buffer[..n]),
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}
