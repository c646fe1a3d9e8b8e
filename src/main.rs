//! Garage controller firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      FileLogSink   NvsAdapter   Esp32Time     │
//! │  (doors, relays,      (EventSink)   (Config)     (ClockPort)   │
//! │   indicators, env)                                             │
//! │  WifiAdapter          MqttAdapter   AioFeedLookup              │
//! │  (Connectivity)       (Messaging)   (FeedLookup)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            GarageController (pure logic)               │    │
//! │  │  Router · Supervisor · Telemetry · Auto-close          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

mod pins;

use core::ops::ControlFlow;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::reset::restart;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};

use garagectl::adapters::feed_lookup::AioFeedLookup;
use garagectl::adapters::hardware::HardwareAdapter;
use garagectl::adapters::log_sink::FileLogSink;
use garagectl::adapters::mqtt::MqttAdapter;
use garagectl::adapters::nvs::{NvsAdapter, load_or_init};
use garagectl::adapters::time::Esp32TimeAdapter;
use garagectl::adapters::wifi::WifiAdapter;
use garagectl::app::controller::GarageController;
use garagectl::app::ports::ConnectivityPort;
use garagectl::config::{FeedTopics, GarageConfig, Secrets};
use garagectl::drivers::door_switch::DoorSwitch;
use garagectl::drivers::indicator::IndicatorPanel;
use garagectl::drivers::relay::RelayBoard;
use garagectl::sensors::SensorShield;
use pins::BoardPins;

/// FAT partition holding the event log.
const DATA_PARTITION: &core::ffi::CStr = c"storage";
const DATA_MOUNT_POINT: &core::ffi::CStr = c"/data";

const I2C_BAUDRATE: Hertz = Hertz(100_000);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Garage controller v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config from NVS (defaults persisted on first boot) ──
    let config = match NvsAdapter::new() {
        Ok(nvs) => load_or_init(&nvs),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            GarageConfig::default()
        }
    };
    let secrets = Secrets::from_build_env();
    let topics = FeedTopics::derive(secrets.aio_username)?;

    // ── 3. Durable log (before any hardware can fail) ─────────
    if let Err(e) = mount_data_volume() {
        warn!("Data volume unavailable ({}), event log goes to the console only", e);
    }
    let mut sink = FileLogSink::new(config.log_path.as_str());
    let mut clock = Esp32TimeAdapter::new();

    // ── 4. Board ──────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let board = BoardPins::take(peripherals.pins);

    let mut door1 = PinDriver::input(board.door1)?;
    door1.set_pull(Pull::Up)?;
    let mut door2 = PinDriver::input(board.door2)?;
    door2.set_pull(Pull::Up)?;

    let [r1, r2, r3, r4] = board.relays;
    let relays = RelayBoard::new(
        [PinDriver::output(r1)?, PinDriver::output(r2)?, PinDriver::output(r3)?, PinDriver::output(r4)?],
        FreeRtos,
    )?;
    let panel = IndicatorPanel::new(
        PinDriver::output(board.red)?,
        PinDriver::output(board.yellow)?,
        PinDriver::output(board.green)?,
        PinDriver::output(board.buzzer)?,
        FreeRtos,
    );

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        board.sda,
        board.scl,
        &I2cConfig::new().baudrate(I2C_BAUDRATE),
    )?;
    let shield = match SensorShield::new_logged(i2c, FreeRtos, &clock, &mut sink) {
        Ok(shield) => shield,
        Err(_) => {
            FreeRtos::delay_ms(config.connect_backoff_secs * 1000);
            restart();
        }
    };

    let mut hw = HardwareAdapter::new([DoorSwitch::new(door1), DoorSwitch::new(door2)], relays, panel, shield);

    // ── 5. Wall clock from the battery-backed RTC ─────────────
    match hw.shield_mut().read_clock() {
        Ok(now) => match clock.seed_wall_clock(&now) {
            Ok(()) => info!("Clock set from RTC: {}", now),
            Err(e) => warn!("Could not set system clock: {}", e),
        },
        Err(e) => warn!("RTC unreadable ({}), auto-close disabled until it is set", e),
    }

    // ── 6. Connectivity ───────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?);
    if let Err(e) = wifi.set_credentials(secrets.wifi_ssid, secrets.wifi_password) {
        error!("WiFi credentials rejected: {}", e);
    }
    let mqtt = MqttAdapter::new(&secrets);
    let mut lookup = AioFeedLookup::new(secrets.aio_key);

    // ── 7. Controller ─────────────────────────────────────────
    let mut controller = GarageController::new(&config, &topics, wifi, mqtt);
    if let Err(request) = controller.start(&mut hw, &mut clock, &mut sink, &mut lookup) {
        warn!("Restarting: {}", request.reason);
        restart();
    }

    info!("System ready. Entering control loop.");

    // ── 8. Control loop ───────────────────────────────────────
    loop {
        if let ControlFlow::Break(request) = controller.tick(&mut hw, &mut clock, &mut sink) {
            warn!("Restarting: {}", request.reason);
            restart();
        }
        FreeRtos::delay_ms(config.loop_interval_ms);
    }
}

/// Mount the wear-levelled FAT partition at `/data`.
fn mount_data_volume() -> Result<(), esp_idf_svc::sys::EspError> {
    use esp_idf_svc::sys::{esp, esp_vfs_fat_mount_config_t, esp_vfs_fat_spiflash_mount_rw_wl, wl_handle_t};

    let mount_config = esp_vfs_fat_mount_config_t {
        format_if_mount_failed: true,
        max_files: 2,
        allocation_unit_size: 4096,
        ..Default::default()
    };
    let mut handle: wl_handle_t = 0;
    // SAFETY: both strings are NUL-terminated statics and the handle
    // outlives the call; the volume stays mounted for the process lifetime.
    esp!(unsafe {
        esp_vfs_fat_spiflash_mount_rw_wl(
            DATA_MOUNT_POINT.as_ptr(),
            DATA_PARTITION.as_ptr(),
            &mount_config,
            &mut handle,
        )
    })?;
    info!("Mounted data volume at /data");
    Ok(())
}
