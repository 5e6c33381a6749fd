//! Task wiring for the desktop build: spawns one `tokio` task per row of
//! §5's task table (USB/pedal session, footswitches, serial-MIDI,
//! BLE bridge) and joins them, mirroring a thread-spawn-and-join `main`
//! translated onto async tasks the way each core module's `run(&mut self)`
//! loop convention already does per-task.
//!
//! Only the `cfg(not(target_os = "espidf"))` path is wired here: board
//! bring-up (GPIO/I2C pinouts, NVS, display, Wi-Fi/HTTP) is an explicit
//! §1 non-goal, so the ESP32 target's `main` is firmware-specific
//! glue this crate does not attempt to stand in for.

#[cfg(not(target_os = "espidf"))]
use std::sync::Arc;
#[cfg(not(target_os = "espidf"))]
use std::time::Duration;

#[cfg(not(target_os = "espidf"))]
use tonex_core::config::{BtMode, FootswitchMode};
#[cfg(not(target_os = "espidf"))]
use tonex_core::{Cmd, Config, Controller, ControllerError, Event, EventBus};
#[cfg(not(target_os = "espidf"))]
use tonex_controller::footswitch::{
    layout_entry, BankedModeEngine, DualModeEngine, EffectToggleEngine, FactoryResetWatcher,
    QuadBinaryEngine, LAYOUT_1X4,
};
#[cfg(not(target_os = "espidf"))]
use tonex_protocol::pedal_session::PedalSession;

#[cfg(not(target_os = "espidf"))]
use hal_pc::ble::BtleplugCentral;
#[cfg(not(target_os = "espidf"))]
use hal_pc::footswitch::MockSwitches;
#[cfg(not(target_os = "espidf"))]
use hal_pc::uart::SerialMidiPort;
#[cfg(not(target_os = "espidf"))]
use hal_pc::usb::TonexUsbTransport;
#[cfg(not(target_os = "espidf"))]
use tonex_protocol::ble_midi::{decode_ble_midi_payload, BleCentral};
#[cfg(not(target_os = "espidf"))]
use tonex_protocol::serial_midi::scan_program_changes;

/// 20 ms sample period the footswitch engine ticks at (`FOOTSWITCH_SAMPLE_COUNT`
/// debounce window is expressed in units of this, §4.F).
#[cfg(not(target_os = "espidf"))]
const FOOTSWITCH_TICK: Duration = Duration::from_millis(20);

/// How long to wait before retrying a dropped USB/BLE link (§7
/// `PedalDisconnected`/`BTDisconnected`: "restart scanning for device").
#[cfg(not(target_os = "espidf"))]
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match Config::load_from_file("config.toml") {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load config.toml: {e}");
            std::process::exit(1);
        }
    };
    log::info!("loaded config: {config:?}");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

#[cfg(not(target_os = "espidf"))]
async fn run(config: Config) -> anyhow::Result<()> {
    let events = EventBus::new(32);
    let controller = Arc::new(Controller::new(config.clone(), events));

    // Bounded per §4.E ("capacity ~10"); every input source shares
    // this single producer-side queue, the USB/pedal task is its only
    // consumer.
    let service_bus::ServiceBus { sender: cmd_tx, receiver: cmd_rx } = service_bus::ServiceBus::<Cmd>::new(10);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let ctrlc_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Ctrl+C received, shutting down");
        let _ = ctrlc_tx.send(true);
    })?;

    let mut observer_rx = controller.events().sender.subscribe();
    let mut observer_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = observer_shutdown.changed() => break,
                event = observer_rx.recv() => match event {
                    Ok(event) => log_observer_event(&event),
                    Err(_) => break,
                },
            }
        }
    });

    let footswitch_handle = tokio::spawn(footswitch_task(controller.clone(), cmd_tx.clone(), shutdown_rx.clone()));
    let pedal_handle = tokio::spawn(pedal_task(controller.clone(), cmd_rx, shutdown_rx.clone()));

    let serial_handle = if config.midi_enable {
        Some(tokio::spawn(serial_midi_task(
            cmd_tx.clone(),
            config.midi_channel,
            shutdown_rx.clone(),
        )))
    } else {
        None
    };

    let ble_handle = match config.bt_mode {
        BtMode::Disabled => None,
        BtMode::Central => Some(tokio::spawn(ble_central_task(
            controller.clone(),
            cmd_tx.clone(),
            config.enable_bt_midi_cc,
            shutdown_rx.clone(),
        ))),
        BtMode::Peripheral => {
            log::warn!("BLE peripheral role has no desktop HAL implementation (hal-pc::ble::UnsupportedPeripheral); skipping");
            None
        }
    };

    drop(cmd_tx);

    let _ = footswitch_handle.await;
    let _ = pedal_handle.await;
    if let Some(h) = serial_handle {
        let _ = h.await;
    }
    if let Some(h) = ble_handle {
        let _ = h.await;
    }

    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn log_observer_event(event: &Event) {
    match event {
        Event::UsbStatus(connected) => log::info!("usb: {}", if *connected { "connected" } else { "disconnected" }),
        Event::BtStatus(connected) => log::info!("bt: {}", if *connected { "connected" } else { "disconnected" }),
        Event::PresetChanged { index, name } => log::info!("preset changed: {index} {name}"),
        Event::ParamChanged { index, value } => log::debug!("param {index} = {value}"),
        Event::BypassChanged(enabled) => log::info!("bypass: {enabled}"),
        Event::StateUpdated => log::debug!("pedal state updated"),
        Event::FactoryResetRequested => log::warn!("factory reset requested (switch 1 long-press)"),
    }
}

/// USB/pedal task (§5 "USB daemon"/"USB class" rows, collapsed into
/// one task since `hal-pc::usb::TonexUsbTransport` has no separate daemon
/// layer to enumerate devices the way the ESP32 USB host stack does). Owns
/// the only handle to `cdc_dev` (§5 "Shared resources"): it both polls for
/// RX frames and is the sole consumer of the `Cmd` queue, translating each
/// dispatched command into at most one wire write.
#[cfg(not(target_os = "espidf"))]
async fn pedal_task(
    controller: Arc<Controller>,
    mut cmd_rx: tokio::sync::mpsc::Receiver<Cmd>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        let transport = match TonexUsbTransport::open() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("pedal USB open failed: {e}, retrying in {:?}", RECONNECT_BACKOFF);
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
                continue;
            }
        };

        let mut session = PedalSession::new(transport);
        if let Err(e) = session.start().await {
            log::warn!("pedal hello failed: {e}");
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                _ = shutdown.changed() => break,
            }
            continue;
        }
        controller.set_usb_status(true);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    controller.set_usb_status(false);
                    return;
                }

                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            if let Err(e) = apply_cmd(&controller, &mut session, cmd).await {
                                log::warn!("pedal write failed: {e}");
                                break;
                            }
                        }
                        None => return,
                    }
                }

                poll_result = session.poll(&controller) => {
                    if let Err(e) = poll_result {
                        log::warn!("pedal session lost: {e}");
                        break;
                    }
                }
            }
        }

        controller.set_usb_status(false);
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            _ = shutdown.changed() => break,
        }
    }
}

/// Dispatches `cmd` into [`Controller`] state/`ParamTable`, then — if the
/// dispatch says a wire write is owed and the link is up — performs it
/// against the live [`PedalSession`] (§4.D/§4.E split: the
/// controller decides *whether* to write, the session decides *how*).
#[cfg(not(target_os = "espidf"))]
async fn apply_cmd<T: tonex_protocol::pedal_session::PedalTransport>(
    controller: &Arc<Controller>,
    session: &mut PedalSession<T>,
    cmd: Cmd,
) -> Result<(), ControllerError> {
    // Taken *before* dispatch: `Controller::dispatch` already writes the
    // new slot/preset into `CoreState` before returning, so this is the
    // only point at which the prior state is still observable — needed by
    // `set_preset`'s exact-reselect bypass check (§4.D step 2).
    let previous = controller.snapshot();
    let owed = controller.dispatch(cmd.clone())?;
    if !owed {
        return Ok(());
    }

    match cmd {
        Cmd::SetPreset(_) | Cmd::NextPreset | Cmd::PrevPreset => {
            let preset = controller.snapshot().slot_c_preset;
            session.set_preset(controller, preset, previous).await
        }
        Cmd::ModifyParam { index, value } => session.modify_param(controller, index, value).await,
        Cmd::ToggleBypass | Cmd::FactoryReset => Ok(()),
    }
}

/// Footswitch engine task (§4.F, §5 "Footswitches" row: 20 ms
/// periodic, low priority). Desktop builds read from `hal_pc::MockSwitches`
/// in place of the onboard GPIO/I2C-expander bus treats as a
/// board-specific non-goal.
#[cfg(not(target_os = "espidf"))]
async fn footswitch_task(
    controller: Arc<Controller>,
    cmd_tx: tokio::sync::mpsc::Sender<Cmd>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let switches = MockSwitches::new();
    let mut dual = DualModeEngine::default();
    let mut banked = BankedModeEngine::default();
    let mut binary = QuadBinaryEngine::default();
    let mut effects = EffectToggleEngine::new(controller.effect_toggles());
    let mut reset_watcher = FactoryResetWatcher::default();

    let mode = controller.footswitch_mode();
    let layout = controller
        .footswitch_layout()
        .map(layout_entry)
        .unwrap_or(LAYOUT_1X4);

    let mut ticker = tokio::time::interval(FOOTSWITCH_TICK);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }

        let cmd = match mode {
            FootswitchMode::Dual => dual.tick(&switches),
            FootswitchMode::QuadBanked => banked.tick(&layout, tonex_core::MultiSwitchReader::read_all(&switches)),
            FootswitchMode::QuadBinary => binary.tick(&switches),
        };

        let effect_cmd = effects.tick(&switches, controller.params());
        let reset_cmd = reset_watcher.tick(&switches);

        for produced in [cmd, effect_cmd, reset_cmd].into_iter().flatten() {
            if cmd_tx.try_send(produced).is_err() {
                log::warn!("command queue full, dropping footswitch command");
            }
        }
    }
}

/// Serial-MIDI ingest task (§4.H, §6: UART 31250 8N1, Program Change
/// only, on the configured channel).
#[cfg(not(target_os = "espidf"))]
async fn serial_midi_task(
    cmd_tx: tokio::sync::mpsc::Sender<Cmd>,
    channel: u8,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let device = std::env::var("TONEX_MIDI_SERIAL_DEVICE").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    while !*shutdown.borrow() {
        let mut port = match SerialMidiPort::open(&device) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("serial-MIDI port {device} unavailable: {e}, retrying in {:?}", RECONNECT_BACKOFF);
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
                continue;
            }
        };

        let mut buf = [0u8; 64];
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => return,

                result = tonex_protocol::serial_midi::UartPort::read(&mut port, &mut buf) => {
                    match result {
                        Ok(0) => continue,
                        Ok(n) => {
                            for preset in scan_program_changes(&buf[..n], channel) {
                                if cmd_tx.try_send(Cmd::SetPreset(preset)).is_err() {
                                    log::warn!("command queue full, dropping serial-MIDI command");
                                }
                            }
                        }
                        Err(e) => {
                            log::warn!("serial-MIDI read failed: {e}");
                            break;
                        }
                    }
                }
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            _ = shutdown.changed() => break,
        }
    }
}

/// BLE-MIDI central task (§4.G central role, §7 `BTDisconnected`:
/// "restart scanning"). Connects by name from the configured allow-list,
/// then decodes every notification into a [`Cmd`] via the shared CC table.
#[cfg(not(target_os = "espidf"))]
async fn ble_central_task(
    controller: Arc<Controller>,
    cmd_tx: tokio::sync::mpsc::Sender<Cmd>,
    enable_cc: bool,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        let mut central = match BtleplugCentral::new().await {
            Ok(c) => c,
            Err(e) => {
                log::warn!("BLE adapter unavailable: {e}");
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
                continue;
            }
        };

        let name_filter = controller.bt_name_filter();
        if let Err(e) = central.connect(name_filter.as_deref()).await {
            log::warn!("BLE-MIDI connect failed: {e}, retrying in {:?}", RECONNECT_BACKOFF);
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                _ = shutdown.changed() => break,
            }
            continue;
        }
        controller.set_bt_status(true);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    controller.set_bt_status(false);
                    return;
                }

                result = central.read_notify() => {
                    match result {
                        Ok(payload) => {
                            if let Some(cmd) = decode_ble_midi_payload(controller.params(), &payload, enable_cc) {
                                if cmd_tx.try_send(cmd).is_err() {
                                    log::warn!("command queue full, dropping BLE-MIDI command");
                                }
                            }
                        }
                        Err(e) => {
                            log::warn!("BLE-MIDI link lost: {e}");
                            break;
                        }
                    }
                }
            }
        }

        controller.set_bt_status(false);
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    panic!("ESP32 target requires board-specific bring-up (I2C/GPIO pinouts, NVS, display, Wi-Fi) which is outside this crate's scope (§1 non-goals); see hal-esp32 for the HAL traits a board app wires up itself.");
}
