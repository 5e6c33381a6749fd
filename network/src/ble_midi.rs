use crate::cc_mapping::cc_to_cmd;
use async_trait::async_trait;
use tonex_core::{Cmd, ControllerError, ParamTable};

/// 128-bit GATT service UUID for the BLE-MIDI profile the pedal's companion
/// app and the big-Tonex MIDI footswitches both use.
pub const MIDI_SERVICE_UUID: [u8; 16] = [
    0x03, 0xB8, 0x0E, 0x5A, 0xED, 0xE8, 0x4B, 0x33, 0xA7, 0x51, 0x6C, 0xE3, 0x4E, 0xC4, 0xC7, 0x00,
];

/// Characteristic UUID carrying MIDI I/O, transcribed (byte order corrected)
/// from `MidiCharacteristicUUIDByteReversed` in `midi_control.c`.
pub const MIDI_CHARACTERISTIC_UUID: [u8; 16] = [
    0x77, 0x72, 0xE5, 0xDB, 0x38, 0x68, 0x41, 0x12, 0xA1, 0xA9, 0xF2, 0x66, 0x9D, 0x10, 0x6B, 0xF3,
];

/// Client Characteristic Configuration Descriptor, standard BLE UUID, used
/// to enable notify/indicate on the MIDI characteristic.
pub const CCCD_UUID: u16 = 0x2902;

/// Transport seam for the side that connects outward and scans for a
/// peripheral (desk/phone acting as central). Implemented per-HAL.
#[async_trait]
pub trait BleCentral: Send + Sync {
    async fn connect(&mut self, name_filter: Option<&str>) -> Result<(), ControllerError>;
    async fn write_midi(&mut self, payload: &[u8]) -> Result<(), ControllerError>;
    async fn read_notify(&mut self) -> Result<Vec<u8>, ControllerError>;
}

/// Transport seam for the side that advertises and accepts GATT writes
/// (the pedal acting as peripheral for an external MIDI footswitch).
#[async_trait]
pub trait BlePeripheral: Send + Sync {
    async fn advertise(&mut self, local_name: &str) -> Result<(), ControllerError>;
    async fn notify(&mut self, payload: &[u8]) -> Result<(), ControllerError>;
    async fn next_write(&mut self) -> Result<Vec<u8>, ControllerError>;
}

/// Decodes one BLE-MIDI GATT payload (`[header, timestamp, status, data...]`)
/// into a controller [`Cmd`], mirroring the `ESP_GATTS_WRITE_EVT` handler's
/// `switch (param->write.value[2] & 0xF0)`. Program Change selects a preset
/// directly; Control Change goes through the same CC table MIDI/serial
/// ingest uses, gated behind `enable_cc` (`Config::enable_bt_midi_cc`) —
/// some BLE pedals (e.g. MVave Chocolate) emit spurious CC traffic, so
/// `midi_control.c` only routes BLE-MIDI CC into the parameter table when
/// this workaround flag is set.
pub fn decode_ble_midi_payload(params: &ParamTable, payload: &[u8], enable_cc: bool) -> Option<Cmd> {
    if payload.len() < 3 {
        return None;
    }
    let status = payload[2];
    match status & 0xF0 {
        0xC0 => payload.get(3).map(|&program| Cmd::SetPreset(program)),
        0xB0 if enable_cc => {
            let control = *payload.get(3)?;
            let value = *payload.get(4)?;
            cc_to_cmd(params, control, value)
        }
        _ => None,
    }
}

/// Builds a `[header, timestamp, status, data...]` payload for an outbound
/// notification, e.g. echoing a preset change to a connected BLE-MIDI
/// footswitch. Header/timestamp bytes are zeroed — the pedal firmware does
/// not require monotonic BLE-MIDI timestamps from this side.
pub fn encode_program_change(channel: u8, program: u8) -> Vec<u8> {
    vec![0x80, 0x80, 0xC0 | (channel & 0x0F), program]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_change_selects_preset() {
        let params = ParamTable::new();
        let payload = [0x00, 0x00, 0xC0, 0x0A];
        let cmd = decode_ble_midi_payload(&params, &payload, false).unwrap();
        assert!(matches!(cmd, Cmd::SetPreset(10)));
    }

    #[test]
    fn control_change_routes_through_cc_table_when_enabled() {
        let params = ParamTable::new();
        let payload = [0x00, 0x00, 0xB0, 14, 127];
        let cmd = decode_ble_midi_payload(&params, &payload, true).unwrap();
        match cmd {
            Cmd::ModifyParam { value, .. } => assert_eq!(value, 1.0),
            other => panic!("expected ModifyParam, got {other:?}"),
        }
    }

    #[test]
    fn control_change_is_ignored_when_disabled() {
        let params = ParamTable::new();
        let payload = [0x00, 0x00, 0xB0, 14, 127];
        assert!(decode_ble_midi_payload(&params, &payload, false).is_none());
    }

    #[test]
    fn short_payload_is_ignored() {
        let params = ParamTable::new();
        assert!(decode_ble_midi_payload(&params, &[0x00, 0x00], true).is_none());
    }

    #[test]
    fn encode_program_change_shape() {
        let payload = encode_program_change(0, 5);
        assert_eq!(payload, vec![0x80, 0x80, 0xC0, 5]);
    }
}
