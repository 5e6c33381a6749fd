//! Board-side serial-MIDI ingest over `esp-idf-hal::uart` (§4.H).
//!
//! `tonex_protocol::serial_midi::UartPort` is documented as a desktop-only
//! seam (the pack's example repos never route ESP32 UART through a trait
//! object — every onboard peripheral is driven concretely), so this reads
//! the board's UART directly and feeds the same
//! `serial_midi::scan_program_changes` decoder `hal-pc` uses.

use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config::Config as UartConfig, Uart, UartDriver};
use esp_idf_hal::units::Hertz;
use tonex_core::ControllerError;
use tonex_protocol::serial_midi::{scan_program_changes, MIDI_SERIAL_BAUD};

/// Onboard TRS-MIDI UART reader: owns the driver, decodes Program Change.
pub struct MidiUart<'d> {
    driver: UartDriver<'d>,
    channel: u8,
}

impl<'d> MidiUart<'d> {
    pub fn new(
        uart: impl Peripheral<P = impl Uart> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        channel: u8,
    ) -> Result<Self, ControllerError> {
        let config = UartConfig::new().baudrate(Hertz(MIDI_SERIAL_BAUD));
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )
        .map_err(|e| ControllerError::Other(format!("uart init: {e}")))?;
        Ok(Self { driver, channel })
    }

    /// Reads whatever bytes are currently buffered and decodes any Program
    /// Change messages found on `channel` (`Config::midi_channel`, passed in
    /// at construction). Call on a timer tick; returns an empty `Vec` when
    /// nothing new has arrived.
    pub fn poll_program_changes(&mut self, scratch: &mut [u8]) -> Result<Vec<u8>, ControllerError> {
        let n = self
            .driver
            .read(scratch, 0)
            .map_err(|e| ControllerError::Other(format!("uart read: {e}")))?;
        Ok(scan_program_changes(&scratch[..n], self.channel))
    }
}
