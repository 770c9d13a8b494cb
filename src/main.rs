mod app;
mod config;
mod filter;
mod geo;
mod logging;
mod map;
mod model;
mod net;
mod platform;
mod runtime;
mod settings;
mod ui;
mod viewport;

use anyhow::Result;
use std::path::Path;
use std::sync::mpsc;

use app::{App, LayoutMode, ThemeMode};
use config::parse_args;
use geo::LatLng;
use logging::init as init_logging;
use net::spawn_fetcher;
use platform::ShellPlatform;
use runtime::{init_terminal, restore_terminal, run_app};
use settings::Settings;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("raceday-tui starting");
    debug!("config path: {}", config.config_path.display());

    let api_key = if config.api_key.trim().is_empty() {
        None
    } else {
        Some(config.api_key.clone())
    };
    let api_key_header = if config.api_key_header.trim().is_empty() {
        None
    } else {
        Some(config.api_key_header.clone())
    };

    let (req_tx, req_rx) = mpsc::channel();
    let (msg_tx, msg_rx) = mpsc::channel();
    spawn_fetcher(
        config.base_url.clone(),
        config.insecure,
        config.timeout(),
        api_key,
        api_key_header,
        req_rx,
        msg_tx,
    );

    let settings = Settings::load(Path::new(&config.settings_file));
    let device_location = match (config.site_lat, config.site_lon) {
        (Some(lat), Some(lon)) => Some(LatLng::new(lat, lon)),
        _ => None,
    };
    let layout_mode = LayoutMode::from_str(&config.layout);
    let theme_mode = ThemeMode::from_str(&config.theme);

    let mut terminal = init_terminal()?;
    let res = run_app(
        &mut terminal,
        App::new(
            settings,
            device_location,
            layout_mode,
            theme_mode,
            config.map_aspect,
            Box::new(ShellPlatform),
        ),
        msg_rx,
        req_tx,
    );
    restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        warn!("runtime error: {err}");
        eprintln!("{err}");
    }

    info!("raceday-tui exited");
    Ok(())
}
