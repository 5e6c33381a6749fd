//! Onboard footswitch reader over the CH422G I2C IO expander (
//! §4.F), transliterated from `CH422G.c`'s `CH422G_read_input`/
//! `CH422G_enableAllIO_Input`.

use esp_idf_hal::i2c::I2cDriver;
use tonex_core::{MultiSwitchReader, SwitchReader};

/// `CH422G_REG_RD_IO` (`0x4D >> 1`).
const REG_RD_IO: u8 = 0x4D >> 1;

/// `I2C_TIMEOUT_MS`.
const I2C_TIMEOUT_MS: u32 = 10;

/// Reads all eight IO-expander pins through a shared `I2cDriver`. The
/// original firmware guards every transaction with a FreeRTOS mutex
/// (`I2CMutexHandle`) since the same expander also drives the board's
/// display backlight/reset lines; a `Mutex<I2cDriver>` plays the same role
/// here so [`SwitchReader`]/[`MultiSwitchReader`] can take `&self`.
pub struct Ch422gSwitches<'d> {
    i2c: std::sync::Mutex<I2cDriver<'d>>,
}

impl<'d> Ch422gSwitches<'d> {
    pub fn new(i2c: I2cDriver<'d>) -> Self {
        Self {
            i2c: std::sync::Mutex::new(i2c),
        }
    }

    fn read_all_bits(&self) -> u8 {
        let mut buf = [0u8; 1];
        let mut i2c = self.i2c.lock().expect("i2c mutex poisoned");
        match i2c.read(REG_RD_IO, &mut buf, I2C_TIMEOUT_MS) {
            Ok(()) => buf[0],
            Err(_) => 0,
        }
    }
}

impl SwitchReader for Ch422gSwitches<'_> {
    fn read_single(&self, pin: u8) -> bool {
        self.read_all_bits() & (1 << pin) == 0
    }
}

impl MultiSwitchReader for Ch422gSwitches<'_> {
    fn read_all(&self) -> u16 {
        // Switches are active-low on the expander (`CH422G_read_input`
        // returns the raw pin level; pressed pulls the pin low), so invert
        // before exposing the bitmask the footswitch engines expect
        // (1 == pressed).
        !(self.read_all_bits() as u16) & 0x00FF
    }
}

