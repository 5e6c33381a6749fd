use crate::config::{Config, FootswitchLayout, FootswitchMode};
use crate::error::ControllerError;
use crate::event_bus::{Event, EventBus};
use crate::param_table::ParamTable;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Largest preset index the pedal firmware supports (`MAX_PRESETS_DEFAULT`).
pub const MAX_PRESETS: usize = 20;

/// One of the pedal's three recallable slots (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
    C,
}

impl Slot {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Slot::A,
            1 => Slot::B,
            _ => Slot::C,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Slot::A => 0,
            Slot::B => 1,
            Slot::C => 2,
        }
    }
}

/// Commands the footswitch engine, MIDI ingest, and BLE-MIDI bridge all
/// funnel into the controller through a single queue (§4.C `Cmd`).
#[derive(Debug, Clone)]
pub enum Cmd {
    SetPreset(u8),
    NextPreset,
    PrevPreset,
    ModifyParam { index: usize, value: f32 },
    ToggleBypass,
    /// Switch 1 held past the footswitch engine's long-press threshold
    /// (§4.F). Persistence and reboot are board-specific
    /// non-goals (§1); the controller only republishes this as
    /// [`Event::FactoryResetRequested`] for whatever owns NVS/reboot to act on.
    FactoryReset,
}

/// Connectivity state the controller tracks for both transports, published
/// as [`Event::UsbStatus`]/[`Event::BtStatus`] on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsState {
    Disconnected,
    Connected,
}

/// Per-preset metadata the pedal itself does not retain (display name,
/// user-assigned "skin"), mirroring the firmware's `tUserData` array.
#[derive(Debug, Clone, Default)]
pub struct UserData {
    pub skin_index: u16,
    pub description: String,
}

/// Storage seam for [`UserData`]. The in-memory default is what PC/dev
/// builds use; an ESP32 build backs this with NVS instead.
pub trait UserDataStore: Send + Sync {
    fn load(&self, preset_index: usize) -> UserData;
    fn save(&self, preset_index: usize, data: UserData);
}

pub struct InMemoryUserDataStore {
    entries: Mutex<Vec<UserData>>,
}

impl Default for InMemoryUserDataStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(vec![UserData::default(); MAX_PRESETS]),
        }
    }
}

impl UserDataStore for InMemoryUserDataStore {
    fn load(&self, preset_index: usize) -> UserData {
        self.entries
            .lock()
            .expect("user data mutex poisoned")
            .get(preset_index)
            .cloned()
            .unwrap_or_default()
    }

    fn save(&self, preset_index: usize, data: UserData) {
        let mut guard = self.entries.lock().expect("user data mutex poisoned");
        if let Some(slot) = guard.get_mut(preset_index) {
            *slot = data;
        }
    }
}

/// The controller's live view of pedal state, independent of the transport
/// that produced it (USB state-update frame, or a locally-applied command
/// awaiting pedal confirmation).
#[derive(Debug, Clone)]
pub struct CoreState {
    pub current_slot: Slot,
    pub slot_a_preset: u8,
    pub slot_b_preset: u8,
    pub slot_c_preset: u8,
    pub bypass_enabled: bool,
    pub usb_comms: CommsState,
    pub bt_comms: CommsState,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            current_slot: Slot::A,
            slot_a_preset: 0,
            slot_b_preset: 0,
            slot_c_preset: 0,
            bypass_enabled: false,
            usb_comms: CommsState::Disconnected,
            bt_comms: CommsState::Disconnected,
        }
    }
}

impl CoreState {
    pub fn active_preset(&self) -> u8 {
        match self.current_slot {
            Slot::A => self.slot_a_preset,
            Slot::B => self.slot_b_preset,
            Slot::C => self.slot_c_preset,
        }
    }
}

/// Central in-process authority over pedal state (§4.C `Controller`).
/// Receives [`Cmd`]s from footswitches/MIDI/BLE over an mpsc queue, applies
/// them to [`CoreState`] and the shared [`ParamTable`], and republishes the
/// result as [`Event`]s. It does not talk to the pedal itself — that is the
/// USB-session layer's job, reached through whatever channel the caller
/// wires in via [`Controller::apply`]'s return value.
pub struct Controller {
    state: Mutex<CoreState>,
    params: ParamTable,
    events: EventBus,
    config: Config,
}

impl Controller {
    pub fn new(config: Config, events: EventBus) -> Self {
        Self {
            state: Mutex::new(CoreState::default()),
            params: ParamTable::new(),
            events,
            config,
        }
    }

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    /// The observer fan-out every input task and UI subscribes to
    /// independently (§4.E "Observers are notified... no observer
    /// may block the consumer").
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Configured footswitch decoding mode (§6 `FOOTSWITCH_MODE`).
    pub fn footswitch_mode(&self) -> FootswitchMode {
        self.config.footswitch_mode
    }

    /// Configured external layout table selector, if the board uses the
    /// generalised banked mode (§4.F mode 4, §6
    /// `EXT_FOOTSW_PRESET_LAYOUT`).
    pub fn footswitch_layout(&self) -> Option<FootswitchLayout> {
        self.config.ext_footsw_preset_layout
    }

    /// Configured external effect-toggle footswitch channels (§4.F
    /// mode 5, §6: up to [`crate::config::MAX_EXTERNAL_EFFECT_FOOTSWITCHES`]
    /// entries).
    pub fn effect_toggles(&self) -> Vec<crate::config::EffectToggleConfig> {
        self.config.effect_toggles.clone()
    }

    /// User-configured custom BLE-MIDI peer name, if any (§4.G
    /// central allow-list, §6 `BT_CUSTOM_BT_NAME`). `None` means connect to
    /// the first advertiser seen, matching the HAL's filter semantics.
    pub fn bt_name_filter(&self) -> Option<String> {
        self.config.bt_custom_name.clone()
    }

    /// Whether the "toggle bypass on reselecting the current preset" config
    /// flag is set (§4.D `set_preset` step 2).
    pub fn toggle_bypass_enabled(&self) -> bool {
        self.config.toggle_bypass
    }

    /// Whether `modify_param`'s wire emission is enabled (§9 /
    /// §4.D — disabled by default pending protocol validation).
    pub fn param_mutation_tx_enabled(&self) -> bool {
        self.config.enable_param_mutation_tx
    }

    pub fn snapshot(&self) -> CoreState {
        self.state.lock().expect("controller state mutex poisoned").clone()
    }

    pub fn set_usb_status(&self, connected: bool) {
        let mut guard = self.state.lock().expect("controller state mutex poisoned");
        guard.usb_comms = if connected {
            CommsState::Connected
        } else {
            CommsState::Disconnected
        };
        drop(guard);
        self.events.publish(Event::UsbStatus(connected));
    }

    pub fn set_bt_status(&self, connected: bool) {
        let mut guard = self.state.lock().expect("controller state mutex poisoned");
        guard.bt_comms = if connected {
            CommsState::Connected
        } else {
            CommsState::Disconnected
        };
        drop(guard);
        self.events.publish(Event::BtStatus(connected));
    }

    /// Records a state-update frame received from the pedal. This does not
    /// go through [`Cmd`] dispatch because it originates from the pedal,
    /// not from a local input source.
    pub fn apply_pedal_state(
        &self,
        current_slot: Slot,
        slot_a: u8,
        slot_b: u8,
        slot_c: u8,
        bypass_enabled: bool,
    ) {
        {
            let mut guard = self.state.lock().expect("controller state mutex poisoned");
            guard.current_slot = current_slot;
            guard.slot_a_preset = slot_a;
            guard.slot_b_preset = slot_b;
            guard.slot_c_preset = slot_c;
            guard.bypass_enabled = bypass_enabled;
        }
        self.events.publish(Event::StateUpdated);
    }

    /// Applies one locally-originated command, mutating [`CoreState`] and/or
    /// [`ParamTable`] and returning whether a USB write is now owed to the
    /// pedal (the caller's session layer performs the actual write).
    ///
    /// `SetPreset`/`NextPreset`/`PrevPreset` always target slot C: it is the
    /// scratch slot every external preset-selection source writes through,
    /// so slots A/B keep whatever identity the guitarist assigned them on
    /// the pedal itself (§4.E).
    pub fn dispatch(&self, cmd: Cmd) -> Result<bool, ControllerError> {
        match cmd {
            Cmd::SetPreset(preset) => {
                let usb_connected = {
                    let mut guard = self.state.lock().expect("controller state mutex poisoned");
                    guard.current_slot = Slot::C;
                    guard.slot_c_preset = preset;
                    guard.usb_comms == CommsState::Connected
                };
                self.events.publish(Event::PresetChanged {
                    index: preset,
                    name: String::new(),
                });
                Ok(usb_connected)
            }
            Cmd::NextPreset => {
                let (preset, usb_connected) = {
                    let mut guard = self.state.lock().expect("controller state mutex poisoned");
                    let next = (guard.slot_c_preset as usize + 1).min(MAX_PRESETS - 1) as u8;
                    guard.current_slot = Slot::C;
                    guard.slot_c_preset = next;
                    (next, guard.usb_comms == CommsState::Connected)
                };
                self.events.publish(Event::PresetChanged {
                    index: preset,
                    name: String::new(),
                });
                Ok(usb_connected)
            }
            Cmd::PrevPreset => {
                let (preset, usb_connected) = {
                    let mut guard = self.state.lock().expect("controller state mutex poisoned");
                    let prev = guard.slot_c_preset.saturating_sub(1);
                    guard.current_slot = Slot::C;
                    guard.slot_c_preset = prev;
                    (prev, guard.usb_comms == CommsState::Connected)
                };
                self.events.publish(Event::PresetChanged {
                    index: preset,
                    name: String::new(),
                });
                Ok(usb_connected)
            }
            Cmd::ModifyParam { index, value } => {
                let clamped = self.params.set_value(index, value)?;
                self.events.publish(Event::ParamChanged {
                    index,
                    value: clamped,
                });
                Ok(self.config.enable_param_mutation_tx)
            }
            Cmd::ToggleBypass => {
                let (enabled, usb_connected) = {
                    let mut guard = self.state.lock().expect("controller state mutex poisoned");
                    guard.bypass_enabled = !guard.bypass_enabled;
                    (guard.bypass_enabled, guard.usb_comms == CommsState::Connected)
                };
                self.events.publish(Event::BypassChanged(enabled));
                Ok(usb_connected)
            }
            Cmd::FactoryReset => {
                self.events.publish(Event::FactoryResetRequested);
                Ok(false)
            }
        }
    }

    /// Consumes commands from `rx` until the channel closes, applying each
    /// via [`Controller::dispatch`]. Errors are logged and do not stop the
    /// loop (§7: a bad command must not take down the controller).
    pub async fn run(&self, mut rx: mpsc::Receiver<Cmd>) {
        while let Some(cmd) = rx.recv().await {
            if let Err(err) = self.dispatch(cmd) {
                log::warn!("dropping command: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        toml::from_str(
            r#"
                bt_mode = "disabled"
                footswitch_mode = "dual"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn set_preset_updates_active_slot() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        controller.dispatch(Cmd::SetPreset(5)).unwrap();
        assert_eq!(controller.snapshot().active_preset(), 5);
    }

    #[test]
    fn next_preset_saturates_at_max() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        controller.dispatch(Cmd::SetPreset(19)).unwrap();
        controller.dispatch(Cmd::NextPreset).unwrap();
        assert_eq!(controller.snapshot().active_preset(), 19);
    }

    #[test]
    fn prev_preset_saturates_at_zero() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        controller.dispatch(Cmd::PrevPreset).unwrap();
        assert_eq!(controller.snapshot().active_preset(), 0);
    }

    #[test]
    fn set_preset_always_targets_slot_c_leaving_a_and_b_untouched() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        controller.apply_pedal_state(Slot::A, 2, 9, 4, false);
        controller.dispatch(Cmd::SetPreset(11)).unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_slot, Slot::C);
        assert_eq!(snapshot.slot_c_preset, 11);
        assert_eq!(snapshot.slot_a_preset, 2);
        assert_eq!(snapshot.slot_b_preset, 9);
    }

    #[test]
    fn toggle_bypass_flips_state_each_call() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        controller.dispatch(Cmd::ToggleBypass).unwrap();
        assert!(controller.snapshot().bypass_enabled);
        controller.dispatch(Cmd::ToggleBypass).unwrap();
        assert!(!controller.snapshot().bypass_enabled);
    }

    #[test]
    fn modify_param_clamps_and_reports_tx_gate() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        let owed = controller
            .dispatch(Cmd::ModifyParam {
                index: 2,
                value: 999.0,
            })
            .unwrap();
        assert!(!owed, "enable_param_mutation_tx defaults to false");
        assert_eq!(controller.params().get_value(2).unwrap(), 0.0);
    }

    #[test]
    fn invalid_param_index_is_rejected() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        let result = controller.dispatch(Cmd::ModifyParam {
            index: 9999,
            value: 1.0,
        });
        assert!(matches!(result, Err(ControllerError::InvalidParamIndex(_))));
    }

    #[test]
    fn factory_reset_publishes_event_and_never_owes_a_usb_write() {
        let controller = Controller::new(test_config(), EventBus::new(4));
        let mut rx = controller.events.sender.subscribe();
        let owed = controller.dispatch(Cmd::FactoryReset).unwrap();
        assert!(!owed);
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, Event::FactoryResetRequested));
    }

    #[test]
    fn in_memory_user_data_store_round_trips() {
        let store = InMemoryUserDataStore::default();
        store.save(
            3,
            UserData {
                skin_index: 7,
                description: "Lead".into(),
            },
        );
        let loaded = store.load(3);
        assert_eq!(loaded.skin_index, 7);
        assert_eq!(loaded.description, "Lead");
    }
}
