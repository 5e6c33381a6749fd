//! BLE-MIDI transports for the desktop HAL (§4.G).
//!
//! `btleplug` is the cross-platform BLE crate and the nearest real-world
//! choice for a host BLE central: the pedal's central role (scan +
//! connect-by-name + GATT notify subscribe) is core, in-scope behaviour,
//! not an ambient concern to leave unimplemented.

use async_trait::async_trait;
use btleplug::api::{bleuuid::uuid_from_u16, Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tonex_core::ControllerError;
use tonex_protocol::ble_midi::{BleCentral, BlePeripheral, MIDI_CHARACTERISTIC_UUID, MIDI_SERVICE_UUID};
use uuid::Uuid;

/// How long central scan runs before giving up and restarting (§4.G:
/// "scans indefinitely (~1800s window, restarted on disconnect)").
pub const SCAN_WINDOW: Duration = Duration::from_secs(1800);

fn midi_characteristic_uuid() -> Uuid {
    Uuid::from_bytes(MIDI_CHARACTERISTIC_UUID)
}

fn midi_service_uuid() -> Uuid {
    Uuid::from_bytes(MIDI_SERVICE_UUID)
}

/// Desktop central role: scans for an advertiser whose complete local name
/// matches the caller's allow-list (built from `bt_custom_name` plus the
/// known product names, per §4.G), connects, and subscribes to MIDI
/// notifications on the standard CCCD (`0x2902`).
pub struct BtleplugCentral {
    manager: Manager,
    connected: Option<Peripheral>,
}

impl BtleplugCentral {
    pub async fn new() -> Result<Self, ControllerError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug manager: {e}")))?;
        Ok(Self { manager, connected: None })
    }
}

#[async_trait]
impl BleCentral for BtleplugCentral {
    async fn connect(&mut self, name_filter: Option<&str>) -> Result<(), ControllerError> {
        let adapters = self
            .manager
            .adapters()
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug adapters: {e}")))?;
        let adapter = adapters.into_iter().next().ok_or(ControllerError::BtDisconnected)?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug scan: {e}")))?;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug peripherals: {e}")))?;

        for peripheral in peripherals {
            let Ok(Some(props)) = peripheral.properties().await else { continue };
            let Some(local_name) = props.local_name else { continue };
            let matches = match name_filter {
                Some(name) => local_name == name,
                None => true,
            };
            if !matches {
                continue;
            }

            peripheral
                .connect()
                .await
                .map_err(|e| ControllerError::Other(format!("btleplug connect: {e}")))?;
            peripheral
                .discover_services()
                .await
                .map_err(|e| ControllerError::Other(format!("btleplug discover: {e}")))?;

            let characteristic = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == midi_characteristic_uuid() && c.service_uuid == midi_service_uuid())
                .ok_or(ControllerError::Other("MIDI characteristic not found".into()))?;
            peripheral
                .subscribe(&characteristic)
                .await
                .map_err(|e| ControllerError::Other(format!("btleplug subscribe: {e}")))?;

            log::info!("connected to BLE-MIDI peripheral {local_name}");
            self.connected = Some(peripheral);
            return Ok(());
        }

        Err(ControllerError::BtDisconnected)
    }

    async fn write_midi(&mut self, payload: &[u8]) -> Result<(), ControllerError> {
        let peripheral = self.connected.as_ref().ok_or(ControllerError::BtDisconnected)?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == midi_characteristic_uuid())
            .ok_or(ControllerError::BtDisconnected)?;
        peripheral
            .write(&characteristic, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug write: {e}")))
    }

    async fn read_notify(&mut self) -> Result<Vec<u8>, ControllerError> {
        let peripheral = self.connected.as_ref().ok_or(ControllerError::BtDisconnected)?;
        let mut stream = peripheral
            .notifications()
            .await
            .map_err(|e| ControllerError::Other(format!("btleplug notifications: {e}")))?;
        match stream.next().await {
            Some(data) => Ok(data.value),
            None => Err(ControllerError::BtDisconnected),
        }
    }
}

/// `0x2902` CCCD, re-exported for callers that want to assert the UUID this
/// HAL subscribes through (§6).
pub fn cccd_uuid() -> Uuid {
    uuid_from_u16(0x2902)
}

/// Desktop stand-in for the peripheral role (§4.G: advertise the
/// MIDI service, accept a central's writes). `btleplug` only models the
/// central GAP role; no desktop-GATT-server crate fits this dependency set,
/// and faking one would misrepresent a real HAL gap as working code.
/// `hal-esp32` carries the real peripheral implementation.
pub struct UnsupportedPeripheral;

#[async_trait]
impl BlePeripheral for UnsupportedPeripheral {
    async fn advertise(&mut self, _local_name: &str) -> Result<(), ControllerError> {
        Err(ControllerError::Other(
            "BLE peripheral role is not supported on the desktop HAL".into(),
        ))
    }

    async fn notify(&mut self, _payload: &[u8]) -> Result<(), ControllerError> {
        Err(ControllerError::Other(
            "BLE peripheral role is not supported on the desktop HAL".into(),
        ))
    }

    async fn next_write(&mut self) -> Result<Vec<u8>, ControllerError> {
        Err(ControllerError::Other(
            "BLE peripheral role is not supported on the desktop HAL".into(),
        ))
    }
}
