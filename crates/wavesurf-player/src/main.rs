//! Wavesurf Player - demo host for the waveform renderer
//!
//! Opens a WAV file, shows it in a scrollable waveform and simulates
//! playback so auto-scroll, drag-to-seek and zoom can be tried out.
//!
//! ## Usage
//!
//! `wavesurf-player [FILE.wav]`
//!
//! Render options are read from `options.yaml` in the user config directory
//! (written with defaults on first start).

mod app;
mod audio;
mod transport;

use std::path::PathBuf;

use iced::Size;
use wavesurf_core::config::default_config_path;
use wavesurf_core::RenderOptions;

use app::{Message, PlayerApp};

fn main() -> iced::Result {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("wavesurf-player starting up");

    let path = std::env::args().nth(1).map(PathBuf::from);

    let config_path = default_config_path();
    let options = RenderOptions::load(&config_path);
    if !config_path.exists() {
        if let Err(e) = options.save(&config_path) {
            log::warn!("Could not write default options to {:?}: {:#}", config_path, e);
        }
    }

    // The boot closure must be Fn; hand the inputs over through a cell
    let boot_inputs = std::cell::RefCell::new(Some((options, path)));

    iced::application(
        move || {
            let (options, path) = boot_inputs.borrow_mut().take().unwrap_or_default();
            PlayerApp::new(options, path)
        },
        update,
        view,
    )
    .subscription(subscription)
    .theme(theme)
    .title("Wavesurf Player")
    .window_size(Size::new(1000.0, 320.0))
    .run()
}

fn update(app: &mut PlayerApp, message: Message) -> iced::Task<Message> {
    app.update(message)
}

fn view(app: &PlayerApp) -> iced::Element<'_, Message> {
    app.view()
}

fn subscription(app: &PlayerApp) -> iced::Subscription<Message> {
    app.subscription()
}

fn theme(app: &PlayerApp) -> iced::Theme {
    app.theme()
}
