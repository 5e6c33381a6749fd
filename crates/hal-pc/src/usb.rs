//! `PedalTransport` over a real USB CDC-ACM endpoint via `rusb` (libusb).
//!
//! Grounded on `usb_tonex_one.c`'s `cdc_acm_host_open` call site: vendor/
//! product ID, interface 0, 115200 8N1 line coding, DTR+RTS asserted before
//! the Hello handshake starts. The illegal `wMaxPacketSize > 64` endpoint
//! descriptor patch that file also performs is an ESP32 USB-host-stack
//! workaround for its own minimal full-speed host controller — on a desktop,
//! the OS's USB host stack enumerates the device correctly, so there is
//! nothing for this HAL to patch.

use async_trait::async_trait;
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tonex_core::ControllerError;
use tonex_protocol::pedal_session::{PedalTransport, TONEX_ONE_PRODUCT_ID, TONEX_ONE_VENDOR_ID};

/// CDC class-specific request used to configure baud/bits/stop/parity
/// (USB CDC PSTN subclass spec, table 13).
const CDC_SET_LINE_CODING: u8 = 0x20;
/// CDC class-specific request that asserts DTR (bit 0) / RTS (bit 1).
const CDC_SET_CONTROL_LINE_STATE: u8 = 0x22;

const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);
const BULK_TIMEOUT: Duration = Duration::from_millis(500);

fn line_coding_bytes() -> [u8; 7] {
    // dwDTERate (LE u32), bCharFormat (1 stop bit), bParityType (none), bDataBits (8).
    let mut bytes = [0u8; 7];
    bytes[..4].copy_from_slice(&115_200u32.to_le_bytes());
    bytes[4] = 0; // 1 stop bit
    bytes[5] = 0; // no parity
    bytes[6] = 8; // 8 data bits
    bytes
}

fn map_usb_err(err: rusb::Error) -> ControllerError {
    ControllerError::BusTimeout(format!("usb: {err}"))
}

/// Opens the Tonex One's CDC-ACM interface and performs the line-coding /
/// DTR+RTS setup `usb_tonex_one.c` does right after `cdc_acm_host_open`.
pub struct TonexUsbTransport {
    handle: DeviceHandle<Context>,
    in_ep: u8,
    out_ep: u8,
}

impl TonexUsbTransport {
    pub fn open() -> Result<Self, ControllerError> {
        let context = Context::new().map_err(map_usb_err)?;
        let handle = context
            .open_device_with_vid_pid(TONEX_ONE_VENDOR_ID, TONEX_ONE_PRODUCT_ID)
            .ok_or(ControllerError::PedalDisconnected)?;

        handle.set_active_configuration(1).map_err(map_usb_err)?;
        handle.claim_interface(0).map_err(map_usb_err)?;

        // Bulk IN/OUT endpoint addresses for the CDC data interface. Fixed
        // per the pedal's known descriptor layout rather than walked at
        // runtime — `hal-esp32` is the HAL that has to parse descriptors by
        // hand to apply its endpoint-size workaround.
        let in_ep = 0x82;
        let out_ep = 0x02;

        let device = handle.device();
        log::info!(
            "opened Tonex One USB CDC device bus={} address={}",
            device.bus_number(),
            device.address()
        );

        let request_type = rusb::request_type(
            rusb::Direction::Out,
            rusb::RequestType::Class,
            rusb::Recipient::Interface,
        );
        handle
            .write_control(request_type, CDC_SET_LINE_CODING, 0, 0, &line_coding_bytes(), CONTROL_TIMEOUT)
            .map_err(map_usb_err)?;
        // wValue bit 0 = DTR, bit 1 = RTS.
        handle
            .write_control(request_type, CDC_SET_CONTROL_LINE_STATE, 0x03, 0, &[], CONTROL_TIMEOUT)
            .map_err(map_usb_err)?;

        Ok(Self { handle, in_ep, out_ep })
    }
}

#[async_trait]
impl PedalTransport for TonexUsbTransport {
    // `rusb`'s transfer calls are blocking libusb calls with their own
    // bounded timeout, matching §5's "every I/O call carries a
    // bounded timeout" — there is no `.await` point to yield at inside them,
    // so they run inline rather than through `spawn_blocking`: short,
    // timeout-bounded blocking calls stay on the caller's task.
    async fn write(&mut self, frame: &[u8]) -> Result<(), ControllerError> {
        self.handle
            .write_bulk(self.out_ep, frame, BULK_TIMEOUT)
            .map_err(map_usb_err)?;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError> {
        match self.handle.read_bulk(self.in_ep, buf, BULK_TIMEOUT) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Ok(0),
            Err(other) => Err(map_usb_err(other)),
        }
    }
}
