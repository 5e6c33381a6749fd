use std::fmt;

/// Error kinds raised by the controller core and wire-protocol layers.
///
/// Each variant maps to exactly one named error kind (`InvalidFrame`,
/// `CrcMismatch`, ...) and the caller applies the matching recovery policy
/// (drop buffer, degrade, retry).
#[derive(Debug)]
pub enum ControllerError {
    /// Frame did not start/end with the sentinel, or was too short after
    /// stripping the CRC.
    InvalidFrame,
    /// A `0x7D` escape was followed by end-of-buffer, or stuffing was
    /// otherwise malformed.
    InvalidEscape,
    /// Decoded CRC did not match the recomputed CRC.
    CrcMismatch,
    /// I2C/USB bus call exceeded its timeout.
    BusTimeout(String),
    /// A bounded command/event queue was full; the newest item was dropped.
    QueueFull,
    /// The USB class task lost the pedal (unplugged, reset, enumeration
    /// failure).
    PedalDisconnected,
    /// A BLE central/peripheral link dropped.
    BtDisconnected,
    /// `modify_param`/`get_min_max` was called with an index outside
    /// `[0, N_PARAMS)`.
    InvalidParamIndex(usize),
    /// Any other failure that does not have a dedicated policy — carries
    /// context for the caller's log line.
    Other(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::InvalidFrame => write!(f, "invalid frame"),
            ControllerError::InvalidEscape => write!(f, "invalid escape sequence"),
            ControllerError::CrcMismatch => write!(f, "CRC mismatch"),
            ControllerError::BusTimeout(site) => write!(f, "bus timeout at {site}"),
            ControllerError::QueueFull => write!(f, "queue full, command dropped"),
            ControllerError::PedalDisconnected => write!(f, "pedal disconnected"),
            ControllerError::BtDisconnected => write!(f, "BLE link disconnected"),
            ControllerError::InvalidParamIndex(i) => write!(f, "invalid parameter index {i}"),
            ControllerError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ControllerError {}
