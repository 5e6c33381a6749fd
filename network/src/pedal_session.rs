use crate::frame_codec;
use crate::message_parser::{self, ParsedMessage};
use async_trait::async_trait;
use tonex_core::{Controller, ControllerError, CoreState, PresetBlob, Slot, StateBlob};

/// Vendor/product ID of the pedal's USB CDC-ACM interface (`usb_tonex_one.c`
/// header comment: `idVendor = 0x1963`, `idProduct = 0x00D1`).
pub const TONEX_ONE_VENDOR_ID: u16 = 0x1963;
pub const TONEX_ONE_PRODUCT_ID: u16 = 0x00D1;

/// CDC-ACM line coding the pedal expects.
pub const LINE_CODING_BAUD: u32 = 115_200;

/// Largest single read the pedal can produce (`RX_TEMP_BUFFER_SIZE`).
pub const RX_BUFFER_SIZE: usize = 3072;

/// Session handshake state (§4.D), transcribed from `COMMS_STATE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Hello,
    GetState,
    Ready,
}

/// Byte-stream transport seam the pedal session runs over. `hal-pc`
/// implements this with `rusb` against the real CDC-ACM endpoint; test code
/// implements it in memory.
#[async_trait]
pub trait PedalTransport: Send + Sync {
    async fn write(&mut self, frame: &[u8]) -> Result<(), ControllerError>;
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError>;
}

fn build_hello_request() -> Vec<u8> {
    frame_codec::encode(&[0xB9, 0x03, 0x02, 0x00, 0x00])
}

fn build_get_state_request() -> Vec<u8> {
    frame_codec::encode(&[0xB9, 0x03, 0x81, 0x06, 0x03, 0x00, 0x00])
}

/// Builds the "Set-state" message body: preamble, length-prefixed verbatim
/// [`StateBlob`] bytes (§4.D message table).
fn build_set_state_payload(blob: &StateBlob) -> Vec<u8> {
    let bytes = blob.as_bytes();
    let len = bytes.len() as u16;
    let mut payload = vec![0xB9, 0x03, 0x81, 0x06, 0x03, 0x82];
    payload.extend_from_slice(&len.to_le_bytes());
    payload.extend_from_slice(&[0x80, 0x0B, 0x03]);
    payload.extend_from_slice(bytes);
    payload
}

/// Builds the "Set-params" message body: preamble, length-prefixed verbatim
/// [`PresetBlob`] bytes (§4.D message table).
fn build_set_params_payload(blob: &PresetBlob) -> Vec<u8> {
    let bytes = blob.as_bytes();
    let len = bytes.len() as u16;
    let mut payload = vec![0xB9, 0x03, 0x81, 0x03, 0x03, 0x82];
    payload.extend_from_slice(&len.to_le_bytes());
    payload.extend_from_slice(&[0x80, 0x0B, 0x03]);
    payload.extend_from_slice(bytes);
    payload
}

/// Runs the CDC-ACM handshake and request/response loop against a pedal,
/// feeding parsed state into a shared [`Controller`] (§4.D).
///
/// The first state update after Hello never carries a preset name — the
/// firmware works around this by nudging slot A to an adjacent preset right
/// after boot so the pedal replies with the full preset-details response
/// that does include one (`boot_init_needed` in `usb_tonex_one.c`). This
/// struct reproduces that nudge rather than leaving the preset name blank
/// until the user next changes it.
pub struct PedalSession<T: PedalTransport> {
    transport: T,
    state: SessionState,
    boot_nudge_pending: bool,
    rx_accum: Vec<u8>,
    /// Most recent state-update payload, kept so a locally-originated
    /// preset change can echo it verbatim except for the documented fields
    /// it touches (§3 `StateBlob` invariant).
    cached_state: Option<StateBlob>,
    /// Most recent preset-details payload, kept so `modify_param` can
    /// perform its blind 4-byte overwrite and re-send the rest verbatim.
    cached_preset: Option<PresetBlob>,
}

impl<T: PedalTransport> PedalSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Idle,
            boot_nudge_pending: false,
            rx_accum: Vec::with_capacity(RX_BUFFER_SIZE),
            cached_state: None,
            cached_preset: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends the Hello request and transitions to [`SessionState::Hello`].
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        self.transport.write(&build_hello_request()).await?;
        self.state = SessionState::Hello;
        Ok(())
    }

    /// Reads from the transport, appends to the reassembly buffer, and
    /// processes every complete frame found. Returns once no more complete
    /// frames remain in the buffer.
    pub async fn poll(&mut self, controller: &Controller) -> Result<(), ControllerError> {
        let mut chunk = [0u8; RX_BUFFER_SIZE];
        let n = self.transport.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        self.rx_accum.extend_from_slice(&chunk[..n]);

        let mut cursor = 0;
        while let Some(start) = self.rx_accum[cursor..].iter().position(|&b| b == 0x7E) {
            let frame_start = cursor + start;
            if let Some(frame_end) = message_parser::find_frame_end(&self.rx_accum, frame_start) {
                let frame = self.rx_accum[frame_start..frame_end].to_vec();
                self.handle_frame(&frame, controller).await?;
                cursor = frame_end;
            } else {
                break;
            }
        }
        self.rx_accum.drain(0..cursor);
        Ok(())
    }

    async fn handle_frame(
        &mut self,
        frame: &[u8],
        controller: &Controller,
    ) -> Result<(), ControllerError> {
        let body = frame_codec::decode(frame)?;
        let parsed = message_parser::parse_message(&body)?;

        match parsed {
            ParsedMessage::Hello => {
                self.transport.write(&build_get_state_request()).await?;
                self.state = SessionState::GetState;
                self.boot_nudge_pending = true;
            }
            ParsedMessage::StateUpdate(blob) => {
                self.state = SessionState::Ready;
                let current_slot = Slot::from_wire(blob.current_slot()?);
                controller.apply_pedal_state(
                    current_slot,
                    blob.slot_a_preset()?,
                    blob.slot_b_preset()?,
                    blob.slot_c_preset()?,
                    blob.bypass_enabled()?,
                );
                self.cached_state = Some(blob);

                if self.boot_nudge_pending {
                    self.boot_nudge_pending = false;
                    let previous = controller.snapshot();
                    let slot_a = previous.slot_a_preset;
                    let nudged = if slot_a < 19 { slot_a + 1 } else { slot_a - 1 };
                    self.set_preset_in_slot(controller, nudged, Slot::A, false, previous).await?;
                }
            }
            ParsedMessage::PresetDetails { preset_name, blob } => {
                self.state = SessionState::Ready;
                let values = blob.parameter_values(tonex_core::param_table::N_PARAMS)?;
                controller.params().with_locked(|params| {
                    for (index, value) in values.into_iter().enumerate() {
                        if let Some(slot) = params.get_mut(index) {
                            slot.value = value;
                        }
                    }
                });
                log::info!("preset details received: {preset_name}");
                self.cached_preset = Some(blob);
            }
            ParsedMessage::Unknown(_) => {}
        }
        Ok(())
    }

    /// Requests a preset change in the pedal's stomp-mode slot C, the slot
    /// the firmware always uses for footswitch/MIDI-driven preset selection
    /// (`usb_tonex_one_set_preset_in_slot(..., C, 1)`).
    ///
    /// `previous` is the controller's [`CoreState`] snapshot taken *before*
    /// the command that produced `preset` was dispatched: `Controller::
    /// dispatch` already writes the new slot/preset into `CoreState` before
    /// returning (§4.E), so re-reading `controller.snapshot()` here would
    /// always see the new value and the reselect/bypass check below would
    /// never see the prior one. The caller (`apply_cmd`) is responsible for
    /// snapshotting before calling `dispatch`.
    pub async fn set_preset(
        &mut self,
        controller: &Controller,
        preset: u8,
        previous: CoreState,
    ) -> Result<(), ControllerError> {
        self.set_preset_in_slot(controller, preset, Slot::C, true, previous).await
    }

    /// Implements the full `set_preset(p, slot, select)` algorithm (
    /// §4.D): force stomp mode, conditionally flip bypass, write the new
    /// preset into `slot`'s trailer position, optionally select `slot` as
    /// active, then emit the edited blob verbatim as a Set-state message.
    async fn set_preset_in_slot(
        &mut self,
        controller: &Controller,
        preset: u8,
        slot: Slot,
        select: bool,
        previous: CoreState,
    ) -> Result<(), ControllerError> {
        let mut blob = self
            .cached_state
            .clone()
            .ok_or_else(|| ControllerError::Other("no cached state blob to echo".into()))?;

        blob.set_mode_flag_stomp()?;

        if controller.toggle_bypass_enabled() {
            let is_reselect = previous.current_slot == slot && previous.active_preset() == preset;
            if is_reselect {
                blob.toggle_bypass()?;
            }
        }

        blob.set_slot_preset(slot, preset)?;
        if select {
            blob.set_current_slot(slot.to_wire())?;
        }

        self.cached_state = Some(blob.clone());
        self.transport
            .write(&frame_codec::encode(&build_set_state_payload(&blob)))
            .await
    }

    /// Mutates the cached [`PresetBlob`] at `param_region_offset + index*5 +
    /// 1` and emits a Set-params message if the caller's config has enabled
    /// wire transmission (§9 / §4.D note on the
    /// `#if 0`-guarded send path) — otherwise this is a local-only change
    /// already applied to the controller's [`tonex_core::ParamTable`].
    pub async fn modify_param(
        &mut self,
        controller: &Controller,
        index: usize,
        value: f32,
    ) -> Result<(), ControllerError> {
        let clamped = controller.params().set_value(index, value)?;

        let blob = self
            .cached_preset
            .as_mut()
            .ok_or_else(|| ControllerError::Other("no cached preset blob to mutate".into()))?;
        blob.set_param_value(index, clamped)?;

        if controller.param_mutation_tx_enabled() {
            self.transport
                .write(&frame_codec::encode(&build_set_params_payload(blob)))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tonex_core::{Config, EventBus};

    #[derive(Clone)]
    struct FakeTransport {
        inbound: Arc<Mutex<VecDeque<u8>>>,
        outbound: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                inbound: Arc::new(Mutex::new(VecDeque::new())),
                outbound: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn push_inbound_frame(&self, frame: &[u8]) {
            self.inbound.lock().unwrap().extend(frame.iter().copied());
        }

        fn outbound_frames(&self) -> Vec<Vec<u8>> {
            self.outbound.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PedalTransport for FakeTransport {
        async fn write(&mut self, frame: &[u8]) -> Result<(), ControllerError> {
            self.outbound.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError> {
            let mut guard = self.inbound.lock().unwrap();
            let n = guard.len().min(buf.len());
            for slot in buf.iter_mut().take(n) {
                *slot = guard.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    fn test_config() -> Config {
        toml::from_str(
            r#"
                bt_mode = "disabled"
                footswitch_mode = "dual"
            "#,
        )
        .unwrap()
    }

    fn build_hello_response() -> Vec<u8> {
        frame_codec::encode(&[0xB9, 0x03, 0x02, 0x00, 0x00])
    }

    #[tokio::test]
    async fn hello_response_triggers_get_state_request() {
        let transport = FakeTransport::new();
        transport.push_inbound_frame(&build_hello_response());
        let controller = Controller::new(test_config(), EventBus::new(4));
        let mut session = PedalSession::new(transport);

        session.start().await.unwrap();
        session.poll(&controller).await.unwrap();

        assert_eq!(session.state(), SessionState::GetState);
    }

    #[tokio::test]
    async fn state_update_applies_to_controller_and_toggles_bypass_flag() {
        let mut state_body = vec![0xB9, 0x03, 0x81, 0x06, 0x03];
        let mut tail = vec![0xAAu8; 10];
        tail.extend_from_slice(&[3, 0, 5, 0, 7, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        state_body.push(0x80);
        state_body.push(tail.len() as u8);
        state_body.push(0x00);
        state_body.extend_from_slice(&tail);
        let frame = frame_codec::encode(&state_body);

        let transport = FakeTransport::new();
        transport.push_inbound_frame(&frame);
        let controller = Controller::new(test_config(), EventBus::new(4));
        let mut session = PedalSession::new(transport);
        session.poll(&controller).await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.slot_b_preset, 5);
        assert!(!snapshot.bypass_enabled);
    }

    fn build_state_update_frame(slot_a: u8, slot_b: u8, slot_c: u8, current_slot: u8, bypass: u8) -> Vec<u8> {
        let mut state_body = vec![0xB9, 0x03, 0x81, 0x06, 0x03];
        let mut tail = vec![0xAAu8; 10];
        tail.extend_from_slice(&[
            slot_a, 0, slot_b, 0, slot_c, 0, bypass, current_slot, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        state_body.push(0x80);
        state_body.push(tail.len() as u8);
        state_body.push(0x00);
        state_body.extend_from_slice(&tail);
        frame_codec::encode(&state_body)
    }

    #[tokio::test]
    async fn set_preset_echoes_cached_blob_with_only_slot_c_and_mode_changed() {
        let transport = FakeTransport::new();
        transport.push_inbound_frame(&build_state_update_frame(3, 5, 7, 1, 0));
        let controller = Controller::new(test_config(), EventBus::new(4));
        let mut session = PedalSession::new(transport.clone());
        session.poll(&controller).await.unwrap();

        let previous = controller.snapshot();
        session.set_preset(&controller, 9, previous).await.unwrap();

        let frames = transport.outbound_frames();
        let last = frames.last().unwrap();
        let body = frame_codec::decode(last).unwrap();
        // Echoed StateBlob starts right after the 9-byte set-state preamble.
        let blob = StateBlob::new(body[11..].to_vec());
        assert_eq!(blob.slot_c_preset().unwrap(), 9);
        assert_eq!(blob.slot_a_preset().unwrap(), 3);
        assert_eq!(blob.slot_b_preset().unwrap(), 5);
        assert_eq!(blob.current_slot().unwrap(), Slot::C.to_wire());
        assert!(!blob.bypass_enabled().unwrap());
    }

    #[tokio::test]
    async fn set_preset_toggles_bypass_only_on_exact_reselect() {
        let toggle_config: Config = toml::from_str(
            r#"
                bt_mode = "disabled"
                footswitch_mode = "dual"
                toggle_bypass = true
            "#,
        )
        .unwrap();

        let transport = FakeTransport::new();
        transport.push_inbound_frame(&build_state_update_frame(3, 5, 7, 2, 0));
        let controller = Controller::new(toggle_config, EventBus::new(4));
        let mut session = PedalSession::new(transport.clone());
        session.poll(&controller).await.unwrap();

        // Reselecting the same (slot C, preset 7) flips bypass. `previous`
        // is taken before the (here, no-op) dispatch, matching how
        // `apply_cmd` snapshots prior to `Controller::dispatch`.
        let previous = controller.snapshot();
        session.set_preset(&controller, 7, previous).await.unwrap();
        let frames = transport.outbound_frames();
        let body = frame_codec::decode(frames.last().unwrap()).unwrap();
        let blob = StateBlob::new(body[11..].to_vec());
        assert!(blob.bypass_enabled().unwrap());
    }

    #[tokio::test]
    async fn set_preset_does_not_toggle_bypass_when_dispatch_already_advanced_slot_c() {
        // Reproduces the real production call order from `apply_cmd` in
        // `src/main.rs`: `Controller::dispatch` writes the *new* slot C
        // preset into `CoreState` before `set_preset` ever runs, so the
        // reselect/bypass check must compare against a snapshot taken
        // *before* dispatch, not `controller.snapshot()` taken after.
        let toggle_config: Config = toml::from_str(
            r#"
                bt_mode = "disabled"
                footswitch_mode = "dual"
                toggle_bypass = true
            "#,
        )
        .unwrap();

        let transport = FakeTransport::new();
        transport.push_inbound_frame(&build_state_update_frame(3, 5, 7, 2, 0));
        let controller = Controller::new(toggle_config, EventBus::new(4));
        let mut session = PedalSession::new(transport.clone());
        session.poll(&controller).await.unwrap();

        // Current active preset is (slot C, 7). NextPreset moves slot C to
        // 8 before `set_preset` is ever called.
        let previous = controller.snapshot();
        let owed = controller.dispatch(tonex_core::Cmd::NextPreset).unwrap();
        assert!(owed);
        let new_preset = controller.snapshot().slot_c_preset;
        assert_eq!(new_preset, 8);

        session.set_preset(&controller, new_preset, previous).await.unwrap();

        let frames = transport.outbound_frames();
        let body = frame_codec::decode(frames.last().unwrap()).unwrap();
        let blob = StateBlob::new(body[11..].to_vec());
        assert!(
            !blob.bypass_enabled().unwrap(),
            "moving from preset 7 to 8 is not a reselect and must not toggle bypass"
        );
    }

    #[tokio::test]
    async fn modify_param_mutates_cached_preset_blob_and_respects_tx_gate() {
        let transport = FakeTransport::new();
        let mut preset_body = vec![0xB9, 0x03, 0x81, 0x04, 0x03];
        let mut tail = Vec::new();
        tail.extend_from_slice(&tonex_core::preset_blob::PARAM_REGION_MARKER);
        for value in [1.0_f32, 2.0, 3.0] {
            tail.push(0x88);
            tail.extend_from_slice(&value.to_le_bytes());
        }
        preset_body.push(0x80);
        preset_body.push(tail.len() as u8);
        preset_body.push(0x00);
        preset_body.extend_from_slice(&tail);
        transport.push_inbound_frame(&frame_codec::encode(&preset_body));

        let controller = Controller::new(test_config(), EventBus::new(4));
        let mut session = PedalSession::new(transport.clone());
        session.poll(&controller).await.unwrap();

        session.modify_param(&controller, 1, 42.0).await.unwrap();

        assert_eq!(controller.params().get_value(1).unwrap(), 42.0);
        // enable_param_mutation_tx defaults to false: no frame is sent.
        assert!(transport.outbound_frames().is_empty());
    }
}
