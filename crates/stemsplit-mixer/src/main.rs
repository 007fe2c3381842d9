//! stemsplit mixer - one clip, six gain-controlled channels
//!
//! Entry point for the GUI application. It:
//! 1. Loads the YAML config (writing the defaults on first run)
//! 2. Opens the audio output and creates the playback controller
//! 3. Launches the iced GUI, optionally loading a file given on the command line
//!
//! ## Usage
//!
//! `stemsplit-mixer [FILE]`

mod config;
mod ui;

use std::cell::RefCell;
use std::path::PathBuf;

use iced::Size;

use stemsplit_core::audio::{get_output_devices, start_audio_system, DEFAULT_SAMPLE_RATE};
use stemsplit_core::controller::PlaybackController;
use ui::MixerApp;

fn main() -> iced::Result {
    let args: Vec<String> = std::env::args().collect();
    let initial_file = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with('-'))
        .map(PathBuf::from);

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("stemsplit-mixer starting up");

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);
    if !config_path.exists() {
        if let Err(e) = config::save_config(&config, &config_path) {
            log::warn!("Could not write default config: {:#}", e);
        }
    }

    match get_output_devices() {
        Ok(devices) => {
            for device in &devices {
                log::info!("Output device: {} ({})", device, device.capabilities());
            }
        }
        Err(e) => log::warn!("Could not enumerate audio devices: {}", e),
    }

    let channels = config.channel_specs();
    let (audio_handle, controller) = match start_audio_system(&config.audio) {
        Ok(audio) => {
            log::info!("Decoding clips to {} Hz", audio.sample_rate);
            let controller = PlaybackController::new(
                channels,
                audio.command_sender,
                audio.atomics,
                audio.sample_rate,
            );
            (Some(audio.handle), controller)
        }
        Err(e) => {
            log::error!("Could not start audio output: {}", e);
            log::error!("Running in UI-only mode (no audio output)");
            (None, PlaybackController::disconnected(channels, DEFAULT_SAMPLE_RATE))
        }
    };

    // The boot closure must be Fn; it only runs once
    let controller_cell = RefCell::new(Some(controller));

    let result = iced::application(
        move || {
            let controller = controller_cell
                .borrow_mut()
                .take()
                .expect("controller already taken");
            MixerApp::new(controller, initial_file.clone())
        },
        MixerApp::update,
        MixerApp::view,
    )
    .subscription(MixerApp::subscription)
    .theme(MixerApp::theme)
    .title("stemsplit")
    .window_size(Size::new(760.0, 520.0))
    .run();

    // Keep the output stream alive until the window closes
    drop(audio_handle);
    log::info!("stemsplit-mixer stopped");

    result
}
