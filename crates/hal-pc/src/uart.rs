//! `UartPort` over a real serial device via `serialport` (§4.H / §6
//! "UART 31250 8N1, parity none, 1 stop").

use async_trait::async_trait;
use serialport::SerialPort;
use std::time::Duration;
use tonex_core::ControllerError;
use tonex_protocol::serial_midi::{UartPort, MIDI_SERIAL_BAUD};

pub struct SerialMidiPort {
    port: Box<dyn SerialPort>,
}

impl SerialMidiPort {
    pub fn open(device: &str) -> Result<Self, ControllerError> {
        let port = serialport::new(device, MIDI_SERIAL_BAUD)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(20))
            .open()
            .map_err(|e| ControllerError::Other(format!("opening {device}: {e}")))?;
        Ok(Self { port })
    }
}

#[async_trait]
impl UartPort for SerialMidiPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(ControllerError::Other(format!("uart read: {e}"))),
        }
    }
}
