//! Desktop dev/test footswitch reader: an in-memory bitmask you can poke
//! from the web UI, a CLI, or a test harness, standing in for the board's
//! onboard GPIO / I²C-expander switches (§4.F: `read_single`/
//! `read_all` are abstract interfaces).

use std::sync::atomic::{AtomicU16, Ordering};
use tonex_core::{MultiSwitchReader, SwitchReader};

#[derive(Default)]
pub struct MockSwitches {
    bitmask: AtomicU16,
}

impl MockSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets switch `pin`'s pressed state, e.g. from a web-UI button handler.
    pub fn set_pressed(&self, pin: u8, pressed: bool) {
        let bit = 1u16 << pin;
        if pressed {
            self.bitmask.fetch_or(bit, Ordering::SeqCst);
        } else {
            self.bitmask.fetch_and(!bit, Ordering::SeqCst);
        }
    }
}

impl SwitchReader for MockSwitches {
    fn read_single(&self, pin: u8) -> bool {
        self.bitmask.load(Ordering::SeqCst) & (1 << pin) != 0
    }
}

impl MultiSwitchReader for MockSwitches {
    fn read_all(&self) -> u16 {
        self.bitmask.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pressed_round_trips_through_both_reader_traits() {
        let switches = MockSwitches::new();
        switches.set_pressed(2, true);
        assert!(SwitchReader::read_single(&switches, 2));
        assert_eq!(MultiSwitchReader::read_all(&switches), 0b0100);
        switches.set_pressed(2, false);
        assert!(!SwitchReader::read_single(&switches, 2));
    }
}
