pub mod config;
pub mod controller;
pub mod error;
pub mod event_bus;
pub mod midi;
pub mod param_table;
pub mod preset_blob;
pub mod state_blob;
pub mod switch;

pub use config::Config;
pub use controller::{Cmd, CommsState, Controller, CoreState, Slot, UserData, UserDataStore};
pub use error::ControllerError;
pub use event_bus::{Event, EventBus};
pub use midi::MidiCommand;
pub use param_table::{Param, ParamTable};
pub use preset_blob::PresetBlob;
pub use state_blob::StateBlob;
pub use switch::{MultiSwitchReader, SwitchReader};
