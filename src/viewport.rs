use tracing::debug;

use crate::geo::{LatLng, LatLngBounds};

pub const DEFAULT_MIN_ZOOM: u8 = 2;
pub const DEFAULT_MAX_ZOOM: u8 = 16;

const MAX_LAT: f64 = 85.0;
const FIT_PADDING: f64 = 1.15;

/// Owned stand-in for the embeddable map widget. The controller only reads
/// bounds/zoom from it and issues view commands; the runtime drains the moved
/// flag into the viewport-changed handler.
#[derive(Clone, Debug)]
pub struct Viewport {
    center: LatLng,
    zoom: u8,
    min_zoom: u8,
    max_zoom: u8,
    /// Width/height ratio of the visible window, longitude span over
    /// latitude span. Terminal cells are tall, so this is usually > 1.
    aspect: f64,
    moved: bool,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            center,
            zoom: zoom.clamp(DEFAULT_MIN_ZOOM, DEFAULT_MAX_ZOOM),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            aspect: 2.0,
            moved: false,
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect.max(0.2);
    }

    /// Latitude degrees visible at the current zoom. Halves per zoom step.
    pub fn lat_span(&self) -> f64 {
        180.0 / (1u64 << self.zoom) as f64 * 2.0
    }

    pub fn bounds(&self) -> LatLngBounds {
        let half_lat = self.lat_span() / 2.0;
        let half_lon = half_lat * self.aspect;
        LatLngBounds::new(
            self.center.lat - half_lat,
            self.center.lon - half_lon,
            self.center.lat + half_lat,
            self.center.lon + half_lon,
        )
    }

    pub fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.center = clamp_center(center);
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.moved = true;
        debug!(
            "viewport set_view {:.4},{:.4} z{}",
            self.center.lat, self.center.lon, self.zoom
        );
    }

    /// Centers on the given bounds at the highest zoom that still shows all
    /// of it, with a small margin.
    pub fn fit_bounds(&mut self, bounds: LatLngBounds) {
        let lat_span = (bounds.lat_span() * FIT_PADDING).max(1e-6);
        let lon_span = (bounds.lon_span() * FIT_PADDING).max(1e-6);
        let mut zoom = self.max_zoom;
        while zoom > self.min_zoom {
            let half_lat = 180.0 / (1u64 << zoom) as f64;
            if half_lat * 2.0 >= lat_span && half_lat * 2.0 * self.aspect >= lon_span {
                break;
            }
            zoom -= 1;
        }
        self.center = clamp_center(bounds.center());
        self.zoom = zoom;
        self.moved = true;
        debug!("viewport fit_bounds -> z{}", self.zoom);
    }

    /// Pans by a fraction of the visible span along each axis.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let half_lat = self.lat_span() / 2.0;
        self.center = clamp_center(LatLng::new(
            self.center.lat + dy * half_lat,
            self.center.lon + dx * half_lat * self.aspect,
        ));
        self.moved = true;
    }

    pub fn zoom_in(&mut self) {
        if self.zoom < self.max_zoom {
            self.zoom += 1;
            self.moved = true;
            debug!("viewport zoom -> {}", self.zoom);
        }
    }

    pub fn zoom_out(&mut self) {
        if self.zoom > self.min_zoom {
            self.zoom -= 1;
            self.moved = true;
            debug!("viewport zoom -> {}", self.zoom);
        }
    }

    /// Returns and clears the moved flag; the runtime forwards it to the
    /// controller as a viewport-changed event.
    pub fn take_moved(&mut self) -> bool {
        std::mem::take(&mut self.moved)
    }
}

fn clamp_center(center: LatLng) -> LatLng {
    let mut lon = center.lon;
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    LatLng::new(center.lat.clamp(-MAX_LAT, MAX_LAT), lon)
}
