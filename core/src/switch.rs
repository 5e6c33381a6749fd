//! Footswitch reader seams (§4.F). Kept in `tonex-core` rather than
//! the root crate so both the footswitch engine (root crate) and every HAL
//! crate that implements a concrete reader can depend on one shared
//! definition without a crate cycle (`hal-pc`/`hal-esp32` implement these
//! traits; the root binary crate consumes both the traits and the HALs).

/// Reads one physical switch by its board-specific pin/index number
/// (`footswitch_read_single_onboard`/`_offboard`).
pub trait SwitchReader: Send + Sync {
    fn read_single(&self, pin: u8) -> bool;
}

/// Reads every switch on a bus as one bitmask, least-significant bit first
/// (`footswitch_read_multiple_onboard`/`_offboard`).
pub trait MultiSwitchReader: Send + Sync {
    fn read_all(&self) -> u16;
}
