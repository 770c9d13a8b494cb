use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::geo::LatLng;

/// Capability provider for actions that leave the terminal: opening the
/// track website, composing an email, and launching directions. Injected
/// into the runtime so tests and headless environments can use the null
/// variant.
pub trait Platform {
    fn open_url(&self, url: &str) -> bool;
    fn open_email(&self, address: &str) -> bool;
    fn navigate_to(&self, position: LatLng) -> bool;
}

/// Desktop shell variant: hands URLs to the system opener.
pub struct ShellPlatform;

impl Platform for ShellPlatform {
    fn open_url(&self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() {
            return false;
        }
        spawn_opener(url)
    }

    fn open_email(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        spawn_opener(&format!("mailto:{address}"))
    }

    fn navigate_to(&self, position: LatLng) -> bool {
        spawn_opener(&format!("geo:{},{}", position.lat, position.lon))
    }
}

/// No-op variant for tests and terminals without a desktop session.
#[derive(Default)]
pub struct NullPlatform;

impl Platform for NullPlatform {
    fn open_url(&self, _url: &str) -> bool {
        false
    }

    fn open_email(&self, _address: &str) -> bool {
        false
    }

    fn navigate_to(&self, _position: LatLng) -> bool {
        false
    }
}

#[cfg(target_os = "macos")]
const OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const OPENER: &str = "xdg-open";

fn spawn_opener(target: &str) -> bool {
    match Command::new(OPENER)
        .arg(target)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => {
            debug!("opened {target}");
            true
        }
        Err(err) => {
            warn!("failed to open {target}: {err}");
            false
        }
    }
}
