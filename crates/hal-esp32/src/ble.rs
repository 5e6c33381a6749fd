//! Board-side BLE-MIDI peripheral over the ESP-IDF Bluedroid GATT server
//! (§4.G), transliterated from `midi_control.c`'s
//! `gatts_profile_a_event_handler`/advertising setup. `esp-idf-svc`'s safe
//! `bt` module targets NimBLE/Bluedroid profiles that don't map cleanly onto
//! a single custom MIDI service + one writable/notifiable characteristic,
//! so this talks to the same `esp_ble_gatts_*`/`esp_ble_gap_*` C API the
//! original firmware does, the same way `usb.rs` talks to
//! `usb_host_cdc_acm` directly.

use async_trait::async_trait;
use esp_idf_sys::esp_err_t;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tonex_core::ControllerError;
use tonex_protocol::ble_midi::{BlePeripheral, MIDI_CHARACTERISTIC_UUID};

#[allow(non_camel_case_types)]
type esp_gatt_if_t = u8;

#[allow(non_camel_case_types)]
#[repr(C)]
struct esp_ble_adv_params_t {
    adv_int_min: u16,
    adv_int_max: u16,
    adv_type: u32,
    own_addr_type: u32,
    peer_addr: [u8; 6],
    peer_addr_type: u32,
    channel_map: u32,
    adv_filter_policy: u32,
}

/// `ADV_TYPE_IND`.
const ADV_TYPE_IND: u32 = 0x00;
/// `BLE_ADDR_TYPE_PUBLIC`.
const BLE_ADDR_TYPE_PUBLIC: u32 = 0x00;
/// `ADV_CHNL_ALL`.
const ADV_CHNL_ALL: u32 = 0x07;
/// `ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY`.
const ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY: u32 = 0x00;

fn default_adv_params() -> esp_ble_adv_params_t {
    esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: ADV_TYPE_IND,
        own_addr_type: BLE_ADDR_TYPE_PUBLIC,
        peer_addr: [0; 6],
        peer_addr_type: 0,
        channel_map: ADV_CHNL_ALL,
        adv_filter_policy: ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
    }
}

extern "C" {
    fn esp_ble_gap_start_advertising(adv_params: *const esp_ble_adv_params_t) -> esp_err_t;
    fn esp_ble_gatts_send_indicate(
        gatts_if: esp_gatt_if_t,
        conn_id: u16,
        char_handle: u16,
        value_len: u16,
        value: *const u8,
        need_confirm: bool,
    ) -> esp_err_t;
}

fn check(err: esp_err_t) -> Result<(), ControllerError> {
    if err == 0 {
        Ok(())
    } else {
        Err(ControllerError::Other(format!("esp-idf bluedroid error: {err}")))
    }
}

/// GATT connection context the board's registration callback fills in once
/// `ESP_GATTS_REG_EVT`/`ESP_GATTS_CREATE_EVT`/`ESP_GATTS_CONNECT_EVT` have
/// all fired (`gatts_profile_a_event_handler` in the original firmware).
/// `main.rs` wires the raw `esp_ble_gatts_register_callback` up to a
/// handler that calls [`MidiGattPeripheral::on_connect`] and
/// [`MidiGattPeripheral::on_write`]; the FFI plumbing for that registration
/// is board bring-up, not part of this HAL's transport seam.
pub struct MidiGattPeripheral {
    gatts_if: esp_gatt_if_t,
    conn_id: AtomicU16,
    char_handle: AtomicU16,
    writes: (
        crossbeam_channel::Sender<Vec<u8>>,
        crossbeam_channel::Receiver<Vec<u8>>,
    ),
}

impl MidiGattPeripheral {
    pub fn new(gatts_if: esp_gatt_if_t) -> Self {
        Self {
            gatts_if,
            conn_id: AtomicU16::new(0),
            char_handle: AtomicU16::new(0),
            writes: crossbeam_channel::bounded(64),
        }
    }

    pub fn on_connect(&self, conn_id: u16, char_handle: u16) {
        self.conn_id.store(conn_id, Ordering::SeqCst);
        self.char_handle.store(char_handle, Ordering::SeqCst);
    }

    /// Called from the `ESP_GATTS_WRITE_EVT` branch of the registered GATTS
    /// callback with the characteristic's raw write payload.
    pub fn on_write(&self, payload: &[u8]) {
        let _ = self.writes.0.try_send(payload.to_vec());
    }

    /// Characteristic UUID this peripheral expects the board's service table
    /// to register, re-exported so `main.rs`'s attribute table matches the
    /// companion app's expectations.
    pub fn characteristic_uuid() -> [u8; 16] {
        MIDI_CHARACTERISTIC_UUID
    }
}

unsafe impl Send for MidiGattPeripheral {}
unsafe impl Sync for MidiGattPeripheral {}

#[async_trait]
impl BlePeripheral for MidiGattPeripheral {
    async fn advertise(&mut self, _local_name: &str) -> Result<(), ControllerError> {
        let params = default_adv_params();
        check(unsafe { esp_ble_gap_start_advertising(&params) })
    }

    async fn notify(&mut self, payload: &[u8]) -> Result<(), ControllerError> {
        let conn_id = self.conn_id.load(Ordering::SeqCst);
        let char_handle = self.char_handle.load(Ordering::SeqCst);
        check(unsafe {
            esp_ble_gatts_send_indicate(
                self.gatts_if,
                conn_id,
                char_handle,
                payload.len() as u16,
                payload.as_ptr(),
                false,
            )
        })
    }

    async fn next_write(&mut self) -> Result<Vec<u8>, ControllerError> {
        self.writes
            .1
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| ControllerError::BtDisconnected)
    }
}

/// No central role on the board — the pedal is always the GATT peripheral
/// advertising to a phone or external MIDI footswitch, never the side that
/// scans (§4.G: central scanning is a desktop-HAL behaviour used for
/// dev/test, not something the pedal itself performs). Kept out of this
/// module entirely rather than stubbed, since `hal-esp32` has no code path
/// that would ever construct a central here.
#[allow(dead_code)]
const _NO_CENTRAL_ROLE_ON_BOARD: *const c_void = std::ptr::null();
