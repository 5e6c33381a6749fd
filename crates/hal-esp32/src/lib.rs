//! ESP32 HAL: the board-side counterpart to `hal-pc`, built on
//! `esp-idf-hal`/`esp-idf-sys` instead of host USB/serial/BLE stacks
//! (§1 / §2). BLE goes through the raw `esp_ble_gatts_*`/`esp_ble_gap_*`
//! FFI in `esp-idf-sys` rather than `esp-idf-svc`'s `bt` module — see
//! `ble.rs` for why.

pub mod ble;
pub mod footswitch;
pub mod uart;
pub mod usb;
