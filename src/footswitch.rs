//! Debounced multi-layout footswitch decoder (§4.F).
//!
//! Translated from the original firmware's `footswitch_task`/
//! `footswitch_handle_*` state machines (`footswitches.c`): the 20 ms
//! sample-rate loop itself lives in `main.rs` (a `tokio::time::interval`);
//! everything here is the pure decision logic each tick feeds through.

use tonex_core::config::{EffectToggleConfig, FootswitchLayout, MAX_EXTERNAL_EFFECT_FOOTSWITCHES};
use tonex_core::controller::MAX_PRESETS;
use tonex_core::{Cmd, MultiSwitchReader, ParamTable, SwitchReader};
use tonex_protocol::cc_mapping;

/// A released state must be observed for this many consecutive 20 ms samples
/// before a debounced switch is considered released (`FOOTSWITCH_SAMPLE_COUNT`).
pub const DEBOUNCE_SAMPLE_COUNT: u32 = 5;

/// Switch 1 held this many samples (~10 s at 20 ms/sample) triggers a
/// factory-config reset (`BUTTON_FACTORY_RESET_TIME`).
pub const FACTORY_RESET_SAMPLE_COUNT: u32 = 500;

/// Quad-binary mode's hold-off after a bitmask change, to avoid chatter while
/// multiple pins settle (`vTaskDelay(pdMS_TO_TICKS(180))`).
pub const QUAD_BINARY_HOLD_SAMPLES: u32 = 9;

/// One row of `FootswitchLayouts[]`: how many physical switches a layout
/// uses, how many presets live in a bank, and which simultaneous-press
/// bitmasks mean "bank down"/"bank up".
#[derive(Debug, Clone, Copy)]
pub struct LayoutEntry {
    pub total_switches: u8,
    pub presets_per_bank: u8,
    pub bank_down_mask: u16,
    pub bank_up_mask: u16,
}

/// The generalised 1×3 .. 2×6b layout table (§4.F mode 4),
/// transcribed byte-for-byte from `FootswitchLayouts[FOOTSWITCH_LAYOUT_LAST]`.
pub const LAYOUT_1X4: LayoutEntry = LayoutEntry { total_switches: 4, presets_per_bank: 4, bank_down_mask: 0x03, bank_up_mask: 0x0C };

pub fn layout_entry(layout: FootswitchLayout) -> LayoutEntry {
    match layout {
        FootswitchLayout::OneByThree => LayoutEntry { total_switches: 3, presets_per_bank: 3, bank_down_mask: 0x03, bank_up_mask: 0x06 },
        FootswitchLayout::OneByFour => LAYOUT_1X4,
        FootswitchLayout::OneByFive => LayoutEntry { total_switches: 5, presets_per_bank: 5, bank_down_mask: 0x03, bank_up_mask: 0x18 },
        FootswitchLayout::TwoByThree => LayoutEntry { total_switches: 6, presets_per_bank: 6, bank_down_mask: 0x03, bank_up_mask: 0x06 },
        FootswitchLayout::TwoByFour => LayoutEntry { total_switches: 8, presets_per_bank: 8, bank_down_mask: 0x03, bank_up_mask: 0x0C },
        FootswitchLayout::TwoByFiveA => LayoutEntry { total_switches: 10, presets_per_bank: 10, bank_down_mask: 0x03, bank_up_mask: 0x18 },
        FootswitchLayout::TwoByFiveB => LayoutEntry { total_switches: 10, presets_per_bank: 8, bank_down_mask: 0x10, bank_up_mask: 0x200 },
        FootswitchLayout::TwoBySixA => LayoutEntry { total_switches: 12, presets_per_bank: 12, bank_down_mask: 0x03, bank_up_mask: 0x30 },
        FootswitchLayout::TwoBySixB => LayoutEntry { total_switches: 12, presets_per_bank: 10, bank_down_mask: 0x20, bank_up_mask: 0x800 },
    }
}

/// Fixed pin numbers the onboard dual/quad-binary modes address, mirroring
/// `FOOTSWITCH_1`..`FOOTSWITCH_4` in the board header.
pub const FOOTSWITCH_1: u8 = 0;
pub const FOOTSWITCH_2: u8 = 1;
pub const FOOTSWITCH_3: u8 = 2;
pub const FOOTSWITCH_4: u8 = 3;

/// Dual up/down mode's per-switch state (`FOOTSWITCH_IDLE`/
/// `_WAIT_RELEASE_1`/`_WAIT_RELEASE_2`, §4.F mode 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DualState {
    Idle,
    WaitRelease1,
    WaitRelease2,
}

pub struct DualModeEngine {
    state: DualState,
    sample_counter: u32,
}

impl Default for DualModeEngine {
    fn default() -> Self {
        Self { state: DualState::Idle, sample_counter: 0 }
    }
}

impl DualModeEngine {
    /// One 20 ms tick. Returns the command produced, if any, on this sample.
    pub fn tick(&mut self, reader: &dyn SwitchReader) -> Option<Cmd> {
        match self.state {
            DualState::Idle => {
                if reader.read_single(FOOTSWITCH_1) {
                    self.sample_counter = 0;
                    self.state = DualState::WaitRelease1;
                    return Some(Cmd::PrevPreset);
                }
                if reader.read_single(FOOTSWITCH_2) {
                    self.sample_counter = 0;
                    self.state = DualState::WaitRelease2;
                    return Some(Cmd::NextPreset);
                }
                None
            }
            DualState::WaitRelease1 => {
                self.await_release(reader.read_single(FOOTSWITCH_1));
                None
            }
            DualState::WaitRelease2 => {
                self.await_release(reader.read_single(FOOTSWITCH_2));
                None
            }
        }
    }

    fn await_release(&mut self, still_pressed: bool) {
        if still_pressed {
            self.sample_counter = 0;
        } else {
            self.sample_counter += 1;
            if self.sample_counter >= DEBOUNCE_SAMPLE_COUNT {
                self.state = DualState::Idle;
            }
        }
    }
}

/// Shared banked-mode state, used both for "Quad banked" (mode 2, hardcoded
/// 1×4 layout) and the generalised layout table (mode 4) — the original
/// firmware runs both onboard and external switches through the same
/// `footswitch_handle_banked` function, parameterized only by `LayoutEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BankedState {
    Idle,
    WaitAllReleased,
}

pub struct BankedModeEngine {
    state: BankedState,
    current_bank: u8,
    index_pending: u16,
}

impl Default for BankedModeEngine {
    fn default() -> Self {
        Self { state: BankedState::Idle, current_bank: 0, index_pending: 0 }
    }
}

impl BankedModeEngine {
    pub fn current_bank(&self) -> u8 {
        self.current_bank
    }

    /// One 20 ms tick, given the bitmask read from every switch in this
    /// layout. A single-switch press only fires its preset command on
    /// *release*, so bank-change combos (two or more switches) can be
    /// distinguished from a plain preset selection.
    pub fn tick(&mut self, layout: &LayoutEntry, bitmask: u16) -> Option<Cmd> {
        match self.state {
            BankedState::Idle => {
                if bitmask != 0 {
                    if bitmask == layout.bank_down_mask {
                        self.current_bank = self.current_bank.saturating_sub(1);
                        self.state = BankedState::WaitAllReleased;
                    } else if bitmask == layout.bank_up_mask {
                        let max_bank = (MAX_PRESETS as u8 / layout.presets_per_bank).max(1) - 1;
                        if self.current_bank < max_bank {
                            self.current_bank += 1;
                        }
                        self.state = BankedState::WaitAllReleased;
                    } else {
                        self.index_pending = bitmask;
                    }
                    None
                } else if self.index_pending != 0 {
                    let mut preset = self.current_bank as usize * layout.presets_per_bank as usize;
                    for bit in 0..layout.presets_per_bank {
                        if self.index_pending & (1 << bit) != 0 {
                            preset += bit as usize;
                            break;
                        }
                    }
                    self.index_pending = 0;
                    Some(Cmd::SetPreset(preset.min(MAX_PRESETS - 1) as u8))
                } else {
                    None
                }
            }
            BankedState::WaitAllReleased => {
                if bitmask == 0 {
                    self.state = BankedState::Idle;
                    self.index_pending = 0;
                }
                None
            }
        }
    }
}

/// Quad-binary mode: the raw 4-bit mask *is* the preset index (§4.F
/// mode 3). A 180 ms hold after any change suppresses chatter while multiple
/// pins settle.
pub struct QuadBinaryEngine {
    last_value: u8,
    hold_remaining: u32,
}

impl Default for QuadBinaryEngine {
    fn default() -> Self {
        Self { last_value: 0xFF, hold_remaining: 0 }
    }
}

impl QuadBinaryEngine {
    pub fn tick(&mut self, reader: &dyn SwitchReader) -> Option<Cmd> {
        if self.hold_remaining > 0 {
            self.hold_remaining -= 1;
            return None;
        }

        let mut value = 0u8;
        if reader.read_single(FOOTSWITCH_1) {
            value |= 1;
        }
        if reader.read_single(FOOTSWITCH_2) {
            value |= 2;
        }
        if reader.read_single(FOOTSWITCH_3) {
            value |= 4;
        }
        if reader.read_single(FOOTSWITCH_4) {
            value |= 8;
        }

        if value != self.last_value {
            self.last_value = value;
            self.hold_remaining = QUAD_BINARY_HOLD_SAMPLES;
            return Some(Cmd::SetPreset(value));
        }
        None
    }
}

/// One switch of the independent effect-toggle channel (§4.F mode 5):
/// each press alternates between `value_a`/`value_b` and is routed through
/// the same CC-to-parameter table MIDI ingest uses
/// (`midi_helper_adjust_param_via_midi`).
struct EffectToggleChannel {
    config: EffectToggleConfig,
    toggled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectsState {
    Idle,
    WaitRelease(u8),
}

pub struct EffectToggleEngine {
    channels: Vec<EffectToggleChannel>,
    state: EffectsState,
}

impl EffectToggleEngine {
    pub fn new(configs: Vec<EffectToggleConfig>) -> Self {
        assert!(configs.len() <= MAX_EXTERNAL_EFFECT_FOOTSWITCHES);
        Self {
            channels: configs.into_iter().map(|config| EffectToggleChannel { config, toggled: false }).collect(),
            state: EffectsState::Idle,
        }
    }

    pub fn tick(&mut self, reader: &dyn SwitchReader, params: &ParamTable) -> Option<Cmd> {
        match self.state {
            EffectsState::Idle => {
                for channel in &mut self.channels {
                    if reader.read_single(channel.config.switch) {
                        let value = if channel.toggled { channel.config.value_b } else { channel.config.value_a };
                        channel.toggled = !channel.toggled;
                        self.state = EffectsState::WaitRelease(channel.config.switch);
                        return cc_mapping::cc_to_cmd(params, channel.config.cc, value);
                    }
                }
                None
            }
            EffectsState::WaitRelease(switch) => {
                if !reader.read_single(switch) {
                    self.state = EffectsState::Idle;
                }
                None
            }
        }
    }
}

/// Switch 1 held continuously past [`FACTORY_RESET_SAMPLE_COUNT`] samples
/// emits [`Cmd::FactoryReset`] exactly once per hold (§4.F "Special
/// input").
#[derive(Default)]
pub struct FactoryResetWatcher {
    hold_samples: u32,
    fired: bool,
}

impl FactoryResetWatcher {
    pub fn tick(&mut self, reader: &dyn SwitchReader) -> Option<Cmd> {
        if reader.read_single(FOOTSWITCH_1) {
            self.hold_samples += 1;
            if self.hold_samples > FACTORY_RESET_SAMPLE_COUNT && !self.fired {
                self.fired = true;
                return Some(Cmd::FactoryReset);
            }
        } else {
            self.hold_samples = 0;
            self.fired = false;
        }
        None
    }
}
