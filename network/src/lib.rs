pub mod ble_midi;
pub mod cc_mapping;
pub mod frame_codec;
pub mod message_parser;
pub mod pedal_session;
pub mod serial_midi;

pub use ble_midi::{BleCentral, BlePeripheral};
pub use message_parser::{Header, MessageType, ParsedMessage};
pub use pedal_session::{PedalSession, PedalTransport, SessionState};
pub use serial_midi::UartPort;
