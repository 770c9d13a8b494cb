use crate::filter::{self, filter_races};
use crate::geo::{LatLng, LatLngBounds};
use crate::model::{Category, Race, Region, Track, CATEGORY_OPTIONS, REGION_OPTIONS};
use crate::net::{DataMessage, DataRequest};
use crate::platform::Platform;
use crate::settings::{Settings, KEY_CATEGORY_FILTERS, KEY_REGION_FILTERS, KEY_SEARCH_MODE};
use crate::viewport::Viewport;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Location,
    CurrentLocation,
    Track,
}

impl SearchMode {
    pub fn label(self) -> &'static str {
        match self {
            SearchMode::Location => "Location",
            SearchMode::CurrentLocation => "Near Me",
            SearchMode::Track => "Track",
        }
    }

    /// Stable storage token, shared with the persisted settings file.
    pub fn as_key(self) -> &'static str {
        match self {
            SearchMode::Location => "location",
            SearchMode::CurrentLocation => "currentLocation",
            SearchMode::Track => "track",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "currentLocation" => SearchMode::CurrentLocation,
            "track" => SearchMode::Track,
            _ => SearchMode::Location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    FilterMenu,
    TrackSearch,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Full,
    Compact,
}

impl LayoutMode {
    pub fn toggle(self) -> Self {
        match self {
            LayoutMode::Full => LayoutMode::Compact,
            LayoutMode::Compact => LayoutMode::Full,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LayoutMode::Full => "Full",
            LayoutMode::Compact => "Compact",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "compact" | "mobile" => LayoutMode::Compact,
            _ => LayoutMode::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Default,
    Amber,
    Mono,
}

impl ThemeMode {
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Default => ThemeMode::Amber,
            ThemeMode::Amber => ThemeMode::Mono,
            ThemeMode::Mono => ThemeMode::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::Default => "Default",
            ThemeMode::Amber => "Amber",
            ThemeMode::Mono => "Mono",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "amber" => ThemeMode::Amber,
            "mono" | "monochrome" => ThemeMode::Mono,
            _ => ThemeMode::Default,
        }
    }
}

/// What to re-issue when the user asks for a retry after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTarget {
    TrackList,
    CurrentQuery,
}

/// One row in the filter popup, flattened over both filter groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEntry {
    Category(Category),
    Region(Region),
}

pub struct App {
    pub(crate) settings: Settings,
    pub(crate) search_mode: SearchMode,
    pub(crate) categories: Vec<Category>,
    pub(crate) regions: Vec<Region>,
    pub(crate) tracks: Vec<Track>,
    pub(crate) raw_races: Vec<Race>,
    pub(crate) active_track: Option<usize>,
    pub(crate) track_cursor: usize,
    pub(crate) race_cursor: usize,
    pub(crate) track_query: String,
    pub(crate) track_query_edit: String,
    pub(crate) viewport: Viewport,
    pub(crate) device_location: Option<LatLng>,
    pub(crate) current_location_zoom: u8,
    pub(crate) loaded: bool,
    pub(crate) loading_tracks: bool,
    pub(crate) race_seq: u64,
    pub(crate) pending_seq: Option<u64>,
    pub(crate) last_error: Option<String>,
    pub(crate) retry_target: Option<RetryTarget>,
    pub(crate) notice: Option<(String, SystemTime)>,
    pub(crate) show_race_list: bool,
    pub(crate) input_mode: InputMode,
    pub(crate) layout_mode: LayoutMode,
    pub(crate) theme_mode: ThemeMode,
    pub(crate) filter_cursor: usize,
    pub(crate) platform: Box<dyn Platform>,
    outbox: Vec<DataRequest>,
}

impl App {
    pub fn new(
        settings: Settings,
        device_location: Option<LatLng>,
        layout_mode: LayoutMode,
        theme_mode: ThemeMode,
        map_aspect: f64,
        platform: Box<dyn Platform>,
    ) -> Self {
        let search_mode =
            SearchMode::from_str(&settings.get(KEY_SEARCH_MODE, SearchMode::Location.as_key()));
        let categories = restore_categories(&settings);
        let regions = restore_regions(&settings);
        let mut viewport = Viewport::new(LatLng::new(39.0, -96.0), 3);
        viewport.set_aspect(map_aspect);
        Self {
            settings,
            search_mode,
            categories,
            regions,
            tracks: Vec::new(),
            raw_races: Vec::new(),
            active_track: None,
            track_cursor: 0,
            race_cursor: 0,
            track_query: String::new(),
            track_query_edit: String::new(),
            viewport,
            device_location,
            current_location_zoom: crate::config::DEFAULT_CURRENT_LOCATION_ZOOM,
            loaded: false,
            loading_tracks: true,
            race_seq: 0,
            pending_seq: None,
            last_error: None,
            retry_target: None,
            notice: None,
            show_race_list: true,
            input_mode: InputMode::Normal,
            layout_mode,
            theme_mode,
            filter_cursor: 0,
            platform,
            outbox: vec![DataRequest::TrackList],
        }
    }

    /// Requests queued since the last drain, in submission order.
    pub fn take_requests(&mut self) -> Vec<DataRequest> {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_loading(&self) -> bool {
        self.loading_tracks || self.pending_seq.is_some()
    }

    pub fn current_notice(&self, now: SystemTime) -> Option<&str> {
        let (message, at) = self.notice.as_ref()?;
        match now.duration_since(*at) {
            Ok(age) if age > NOTICE_TTL => None,
            _ => Some(message.as_str()),
        }
    }

    fn push_notice(&mut self, message: impl Into<String>) {
        self.notice = Some((message.into(), SystemTime::now()));
    }

    fn next_seq(&mut self) -> u64 {
        self.race_seq += 1;
        self.race_seq
    }

    pub fn apply_message(&mut self, message: DataMessage) {
        match message {
            DataMessage::Tracks(tracks) => self.on_tracks_loaded(tracks),
            DataMessage::Races { seq, races } => self.on_races_loaded(seq, races),
            DataMessage::TrackListError(message) => {
                warn!(error = %message, "track list fetch failed");
                self.loading_tracks = false;
                self.last_error = Some(message);
                self.retry_target = Some(RetryTarget::TrackList);
            }
            DataMessage::RaceError { seq, message } => {
                if self.pending_seq == Some(seq) {
                    warn!(seq, error = %message, "race query failed");
                    self.pending_seq = None;
                    self.last_error = Some(message);
                    self.retry_target = Some(RetryTarget::CurrentQuery);
                } else {
                    debug!(seq, "ignoring error for superseded race query");
                }
            }
        }
    }

    pub fn on_tracks_loaded(&mut self, tracks: Vec<Track>) {
        info!(count = tracks.len(), "track list loaded");
        self.tracks = tracks;
        self.loading_tracks = false;
        self.loaded = true;
        self.last_error = None;
        self.retry_target = None;
        self.enter_mode(self.search_mode);
    }

    fn on_races_loaded(&mut self, seq: u64, races: Vec<Race>) {
        if self.pending_seq != Some(seq) {
            debug!(seq, "discarding stale race response");
            return;
        }
        debug!(seq, count = races.len(), "race query completed");
        self.pending_seq = None;
        self.last_error = None;
        self.retry_target = None;
        self.raw_races = races;
        self.race_cursor = 0;
    }

    /// Switches search mode, persists the choice, and runs the mode's
    /// entry transition. Selecting the already-active mode re-runs it.
    /// The active track survives the switch so track mode can pick it up.
    pub fn on_mode_selected(&mut self, mode: SearchMode) {
        info!(mode = mode.as_key(), "search mode selected");
        self.search_mode = mode;
        self.settings.set(KEY_SEARCH_MODE, mode.as_key());
        self.raw_races.clear();
        self.race_cursor = 0;
        self.track_cursor = 0;
        self.show_race_list = true;
        if self.loaded {
            self.enter_mode(mode);
        }
    }

    fn enter_mode(&mut self, mode: SearchMode) {
        match mode {
            SearchMode::Location => {
                if let Some(bounds) = self.all_tracks_bounds() {
                    self.viewport.fit_bounds(bounds);
                }
                let _ = self.viewport.take_moved();
                self.search_by_location();
            }
            SearchMode::CurrentLocation => {
                match self.device_location {
                    Some(here) => {
                        self.viewport.set_view(here, self.current_location_zoom);
                    }
                    None => {
                        self.push_notice("Device location unavailable, showing all tracks");
                        if let Some(bounds) = self.all_tracks_bounds() {
                            self.viewport.fit_bounds(bounds);
                        }
                    }
                }
                let _ = self.viewport.take_moved();
                self.search_by_location();
            }
            SearchMode::Track => {
                self.pending_seq = None;
                // A selection carried over from another mode is queried
                // right away; otherwise nothing until a track is picked.
                if let Some(idx) = self.active_track {
                    self.search_by_track(idx);
                }
            }
        }
    }

    fn all_tracks_bounds(&self) -> Option<LatLngBounds> {
        let points: Vec<LatLng> = self.tracks.iter().filter_map(|t| t.position()).collect();
        LatLngBounds::from_points(&points)
    }

    /// Tracks whose position falls inside the current viewport.
    pub fn visible_track_indices(&self) -> Vec<usize> {
        let bounds = self.viewport.bounds();
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.position().is_some_and(|p| bounds.contains(p)))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Track indices currently listed in the side panel. Map modes list
    /// what the viewport shows, track mode lists the searchable roster.
    pub fn listed_track_indices(&self) -> Vec<usize> {
        match self.search_mode {
            SearchMode::Location | SearchMode::CurrentLocation => self.visible_track_indices(),
            SearchMode::Track => {
                let needle = self.track_query.to_ascii_lowercase();
                self.tracks
                    .iter()
                    .enumerate()
                    .filter(|(_, track)| {
                        needle.is_empty() || track.name.to_ascii_lowercase().contains(&needle)
                    })
                    .map(|(idx, _)| idx)
                    .collect()
            }
        }
    }

    /// Queries races for every track the viewport currently shows.
    pub fn search_by_location(&mut self) {
        let names: Vec<String> = self
            .visible_track_indices()
            .into_iter()
            .map(|idx| self.tracks[idx].name.clone())
            .collect();
        let seq = self.next_seq();
        debug!(seq, tracks = names.len(), "querying races by location");
        self.pending_seq = Some(seq);
        self.outbox.push(DataRequest::RacesByTracks { seq, names });
    }

    pub fn search_by_track(&mut self, idx: usize) {
        let Some(track) = self.tracks.get(idx) else {
            return;
        };
        let name = track.name.clone();
        let seq = self.next_seq();
        debug!(seq, track = %name, "querying races by track");
        self.pending_seq = Some(seq);
        self.outbox.push(DataRequest::RacesByTrack { seq, name });
    }

    /// Viewport settled after a pan or zoom. Map modes re-query for the
    /// new extent; track mode keeps its explicit selection.
    pub fn on_viewport_moved(&mut self) {
        match self.search_mode {
            SearchMode::Location | SearchMode::CurrentLocation => self.search_by_location(),
            SearchMode::Track => {}
        }
    }

    /// Outside track mode, selecting a track only opens the info panel;
    /// the viewport and the bounds-keyed race list stay put.
    pub fn set_active_track(&mut self, idx: usize) {
        if idx >= self.tracks.len() {
            return;
        }
        self.active_track = Some(idx);
        self.show_race_list = true;
        if self.search_mode == SearchMode::Track {
            if let Some(position) = self.tracks[idx].position() {
                self.viewport
                    .set_view(position, self.viewport.zoom().max(self.current_location_zoom));
                let _ = self.viewport.take_moved();
            }
            self.search_by_track(idx);
        }
    }

    /// Jump to a track by its exact name, switching into track mode if
    /// needed so the selection has a home.
    pub fn show_track_with_name(&mut self, name: &str) -> bool {
        let Some(idx) = self.tracks.iter().position(|t| t.name == name) else {
            return false;
        };
        if self.search_mode != SearchMode::Track {
            self.on_mode_selected(SearchMode::Track);
        }
        self.set_active_track(idx);
        true
    }

    pub fn clear_active_track(&mut self) {
        self.active_track = None;
        if self.search_mode == SearchMode::Track {
            self.raw_races.clear();
            self.race_cursor = 0;
            self.pending_seq = None;
        }
    }

    pub fn toggle_race_list(&mut self) {
        self.show_race_list = !self.show_race_list;
    }

    /// Races surviving the active category and region filters, in
    /// server order.
    pub fn races(&self) -> Vec<Race> {
        filter_races(&self.raw_races, &self.categories, &self.regions)
    }

    pub fn filter_entries(&self) -> Vec<FilterEntry> {
        let mut entries: Vec<FilterEntry> = CATEGORY_OPTIONS
            .iter()
            .copied()
            .map(FilterEntry::Category)
            .collect();
        entries.extend(REGION_OPTIONS.iter().copied().map(FilterEntry::Region));
        entries
    }

    pub fn filter_entry_enabled(&self, entry: FilterEntry) -> bool {
        match entry {
            FilterEntry::Category(category) => self.categories.contains(&category),
            FilterEntry::Region(region) => self.regions.contains(&region),
        }
    }

    /// Toggles one filter, persists both filter arrays, and re-runs the
    /// current search so the server answers for the new selection. The
    /// in-memory race list re-filters immediately either way.
    pub fn toggle_filter_entry(&mut self, entry: FilterEntry) {
        match entry {
            FilterEntry::Category(category) => {
                filter::toggle(&mut self.categories, category);
                info!(category = category.label(), "category filter toggled");
            }
            FilterEntry::Region(region) => {
                filter::toggle(&mut self.regions, region);
                info!(region = region.label(), "region filter toggled");
            }
        }
        self.persist_filters();
        self.requery_current();
    }

    fn persist_filters(&mut self) {
        let categories: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.label().to_string())
            .collect();
        let regions: Vec<String> = self.regions.iter().map(|r| r.label().to_string()).collect();
        self.settings.set_array(KEY_CATEGORY_FILTERS, &categories);
        self.settings.set_array(KEY_REGION_FILTERS, &regions);
    }

    fn requery_current(&mut self) {
        if !self.loaded {
            return;
        }
        match self.search_mode {
            SearchMode::Location | SearchMode::CurrentLocation => self.search_by_location(),
            SearchMode::Track => {
                if let Some(idx) = self.active_track {
                    self.search_by_track(idx);
                }
            }
        }
    }

    /// Re-issues whatever last failed.
    pub fn retry(&mut self) {
        match self.retry_target.take() {
            Some(RetryTarget::TrackList) => {
                info!("retrying track list fetch");
                self.last_error = None;
                self.loading_tracks = true;
                self.outbox.push(DataRequest::TrackList);
            }
            Some(RetryTarget::CurrentQuery) => {
                info!("retrying race query");
                self.last_error = None;
                self.requery_current();
            }
            None => {}
        }
    }

    pub fn next_track(&mut self) {
        let listed = self.listed_track_indices();
        if listed.is_empty() {
            return;
        }
        self.track_cursor = (self.track_cursor + 1) % listed.len();
    }

    pub fn prev_track(&mut self) {
        let listed = self.listed_track_indices();
        if listed.is_empty() {
            return;
        }
        self.track_cursor = (self.track_cursor + listed.len() - 1) % listed.len();
    }

    pub fn select_cursor_track(&mut self) {
        let listed = self.listed_track_indices();
        if let Some(&idx) = listed.get(self.track_cursor.min(listed.len().saturating_sub(1))) {
            self.set_active_track(idx);
        }
    }

    pub fn next_race(&mut self) {
        let count = self.races().len();
        if count == 0 {
            return;
        }
        self.race_cursor = (self.race_cursor + 1) % count;
    }

    pub fn prev_race(&mut self) {
        let count = self.races().len();
        if count == 0 {
            return;
        }
        self.race_cursor = (self.race_cursor + count - 1) % count;
    }

    pub fn begin_track_search(&mut self) {
        self.track_query_edit = self.track_query.clone();
        self.input_mode = InputMode::TrackSearch;
    }

    pub fn commit_track_search(&mut self) {
        self.track_query = self.track_query_edit.clone();
        self.track_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    pub fn cancel_track_search(&mut self) {
        self.track_query_edit.clear();
        self.input_mode = InputMode::Normal;
    }

    pub fn active_track_ref(&self) -> Option<&Track> {
        self.active_track.and_then(|idx| self.tracks.get(idx))
    }

    pub fn open_active_website(&mut self) {
        let Some(url) = self
            .active_track_ref()
            .and_then(|t| t.website_url.clone())
            .filter(|u| !u.trim().is_empty())
        else {
            self.push_notice("No website for this track");
            return;
        };
        if !self.platform.open_url(&url) {
            self.push_notice("Opening links is not supported here");
        }
    }

    pub fn email_active_track(&mut self) {
        let Some(addr) = self
            .active_track_ref()
            .and_then(|t| t.email.clone())
            .filter(|a| !a.trim().is_empty())
        else {
            self.push_notice("No email for this track");
            return;
        };
        if !self.platform.open_email(&addr) {
            self.push_notice("Email is not supported here");
        }
    }

    pub fn navigate_to_active_track(&mut self) {
        let Some(position) = self.active_track_ref().and_then(|t| t.position()) else {
            self.push_notice("No coordinates for this track");
            return;
        };
        if !self.platform.navigate_to(position) {
            self.push_notice("Navigation is not supported here");
        }
    }
}

fn restore_categories(settings: &Settings) -> Vec<Category> {
    let defaults: Vec<String> = CATEGORY_OPTIONS
        .iter()
        .filter(|c| **c != Category::Practice)
        .map(|c| c.label().to_string())
        .collect();
    settings
        .get_array(KEY_CATEGORY_FILTERS, &defaults)
        .iter()
        .filter_map(|label| Category::from_str(label))
        .collect()
}

fn restore_regions(settings: &Settings) -> Vec<Region> {
    let defaults: Vec<String> = REGION_OPTIONS.iter().map(|r| r.label().to_string()).collect();
    settings
        .get_array(KEY_REGION_FILTERS, &defaults)
        .iter()
        .filter_map(|label| Region::from_str(label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullPlatform;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_settings(name: &str) -> (Settings, PathBuf) {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("raceday-tui-app-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join(name);
        (Settings::load(&path), path)
    }

    fn new_app(settings: Settings) -> App {
        App::new(
            settings,
            None,
            LayoutMode::Full,
            ThemeMode::Default,
            2.0,
            Box::new(NullPlatform),
        )
    }

    fn track(name: &str, lat: f64, lon: f64) -> Track {
        Track {
            name: name.to_string(),
            lat: Some(lat),
            lon: Some(lon),
            district: None,
            state: None,
            primary_contact_name: None,
            primary_contact_phone: None,
            phone_number: None,
            email: None,
            website_url: None,
        }
    }

    fn race(name: &str, track_name: &str, category: &str) -> Race {
        Race {
            name: Some(name.to_string()),
            track_name: Some(track_name.to_string()),
            category: Some(category.to_string()),
            region: None,
            date: None,
        }
    }

    #[test]
    fn startup_queues_track_list_request() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        assert_eq!(app.take_requests(), vec![DataRequest::TrackList]);
        assert!(app.is_loading());
    }

    #[test]
    fn restores_persisted_search_mode() {
        let (mut settings, path) = temp_settings("s.json");
        settings.set(KEY_SEARCH_MODE, "track");
        let app = new_app(Settings::load(&path));
        assert_eq!(app.search_mode, SearchMode::Track);
    }

    #[test]
    fn unknown_persisted_mode_falls_back_to_location() {
        let (mut settings, path) = temp_settings("s.json");
        settings.set(KEY_SEARCH_MODE, "teleport");
        let app = new_app(Settings::load(&path));
        assert_eq!(app.search_mode, SearchMode::Location);
    }

    #[test]
    fn default_categories_exclude_practice() {
        let (settings, _) = temp_settings("s.json");
        let app = new_app(settings);
        assert_eq!(app.categories.len(), CATEGORY_OPTIONS.len() - 1);
        assert!(!app.categories.contains(&Category::Practice));
        assert_eq!(app.regions.len(), REGION_OPTIONS.len());
    }

    #[test]
    fn tracks_loaded_in_location_mode_queries_visible() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        let _ = app.take_requests();
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let requests = app.take_requests();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            DataRequest::RacesByTracks { names, .. } => {
                assert_eq!(names.len(), 2);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(app.pending_seq.is_some());
    }

    #[test]
    fn stale_race_response_is_discarded() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let first_seq = app.pending_seq.unwrap();
        app.search_by_location();
        let second_seq = app.pending_seq.unwrap();
        assert_ne!(first_seq, second_seq);

        app.apply_message(DataMessage::Races {
            seq: first_seq,
            races: vec![race("Stale", "Sunrise", "State")],
        });
        assert!(app.raw_races.is_empty());
        assert_eq!(app.pending_seq, Some(second_seq));

        app.apply_message(DataMessage::Races {
            seq: second_seq,
            races: vec![race("Fresh", "Sunrise", "State")],
        });
        assert_eq!(app.raw_races.len(), 1);
        assert_eq!(app.raw_races[0].name.as_deref(), Some("Fresh"));
        assert!(app.pending_seq.is_none());
    }

    #[test]
    fn mode_selection_persists_and_requeries() {
        let (settings, path) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let _ = app.take_requests();

        app.on_mode_selected(SearchMode::Track);
        assert!(app.take_requests().is_empty());
        assert_eq!(
            Settings::load(&path).get(KEY_SEARCH_MODE, "location"),
            "track"
        );

        app.set_active_track(0);
        let _ = app.take_requests();
        let seq = app.pending_seq.unwrap();
        app.apply_message(DataMessage::Races {
            seq,
            races: vec![race("Gate Night", "Sunrise", "State")],
        });
        assert_eq!(app.races().len(), 1);

        // Switching back issues exactly one bounds query and the old
        // track-keyed races are gone immediately.
        app.on_mode_selected(SearchMode::Location);
        assert!(app.races().is_empty());
        let requests = app.take_requests();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], DataRequest::RacesByTracks { .. }));
    }

    #[test]
    fn entering_track_mode_queries_existing_selection() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();

        app.set_active_track(1);
        assert!(app.take_requests().is_empty());

        app.on_mode_selected(SearchMode::Track);
        assert_eq!(app.active_track, Some(1));
        let requests = app.take_requests();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            DataRequest::RacesByTrack { name, .. } => assert_eq!(name, "Dacono"),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn selection_outside_track_mode_leaves_viewport_alone() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();
        let before = app.viewport.center();
        let zoom_before = app.viewport.zoom();

        app.set_active_track(0);
        let after = app.viewport.center();
        assert!((before.lat - after.lat).abs() < 1e-12);
        assert!((before.lon - after.lon).abs() < 1e-12);
        assert_eq!(app.viewport.zoom(), zoom_before);
        assert!(!app.viewport.take_moved());
        assert!(app.take_requests().is_empty());
    }

    #[test]
    fn current_location_without_device_falls_back_with_notice() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();
        app.on_mode_selected(SearchMode::CurrentLocation);
        assert!(app.current_notice(SystemTime::now()).is_some());
        let bounds = app.viewport.bounds();
        assert!(bounds.contains(LatLng::new(26.7, -80.2)));
        assert!(bounds.contains(LatLng::new(40.1, -104.9)));
    }

    #[test]
    fn current_location_with_device_centers_there() {
        let (settings, _) = temp_settings("s.json");
        let mut app = App::new(
            settings,
            Some(LatLng::new(33.4, -112.0)),
            LayoutMode::Full,
            ThemeMode::Default,
            2.0,
            Box::new(NullPlatform),
        );
        app.on_tracks_loaded(vec![track("Chandler", 33.3, -111.9)]);
        let _ = app.take_requests();
        app.on_mode_selected(SearchMode::CurrentLocation);
        assert!(app.current_notice(SystemTime::now()).is_none());
        let center = app.viewport.center();
        assert!((center.lat - 33.4).abs() < 1e-9);
        assert!((center.lon + 112.0).abs() < 1e-9);
    }

    #[test]
    fn filter_toggle_persists_and_requeries() {
        let (settings, path) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let _ = app.take_requests();

        app.toggle_filter_entry(FilterEntry::Category(Category::State));
        assert!(!app.categories.contains(&Category::State));
        let requests = app.take_requests();
        assert!(matches!(requests[0], DataRequest::RacesByTracks { .. }));

        let stored = Settings::load(&path).get_array(KEY_CATEGORY_FILTERS, &[]);
        assert!(!stored.contains(&"State".to_string()));
        assert!(stored.contains(&"National".to_string()));
    }

    #[test]
    fn races_are_filtered_immediately_without_waiting_for_requery() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let seq = app.pending_seq.unwrap();
        app.apply_message(DataMessage::Races {
            seq,
            races: vec![
                race("States Qualifier", "Sunrise", "State"),
                race("Nationals", "Sunrise", "National"),
            ],
        });
        assert_eq!(app.races().len(), 2);
        app.toggle_filter_entry(FilterEntry::Category(Category::State));
        let shown = app.races();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].name.as_deref(), Some("Nationals"));
    }

    #[test]
    fn track_mode_selection_queries_that_track() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();
        app.on_mode_selected(SearchMode::Track);
        let _ = app.take_requests();

        app.set_active_track(1);
        let requests = app.take_requests();
        match &requests[0] {
            DataRequest::RacesByTrack { name, .. } => assert_eq!(name, "Dacono"),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn show_track_with_name_switches_mode_and_selects() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();

        assert!(app.show_track_with_name("Dacono"));
        assert_eq!(app.search_mode, SearchMode::Track);
        assert_eq!(app.active_track, Some(1));
        assert!(!app.show_track_with_name("Nowhere"));
    }

    #[test]
    fn clearing_active_track_in_track_mode_drops_races() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let _ = app.take_requests();
        app.on_mode_selected(SearchMode::Track);
        app.set_active_track(0);
        let seq = app.pending_seq.unwrap();
        app.apply_message(DataMessage::Races {
            seq,
            races: vec![race("Gold Cup Finals", "Sunrise", "Gold Cup")],
        });
        assert_eq!(app.raw_races.len(), 1);
        app.clear_active_track();
        assert!(app.raw_races.is_empty());
        assert!(app.active_track.is_none());
    }

    #[test]
    fn retry_reissues_failed_track_list() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        let _ = app.take_requests();
        app.apply_message(DataMessage::TrackListError("connection refused".to_string()));
        assert!(app.last_error.is_some());
        app.retry();
        assert_eq!(app.take_requests(), vec![DataRequest::TrackList]);
        assert!(app.last_error.is_none());
    }

    #[test]
    fn retry_reissues_failed_race_query() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let seq = app.pending_seq.unwrap();
        let _ = app.take_requests();
        app.apply_message(DataMessage::RaceError {
            seq,
            message: "timeout".to_string(),
        });
        assert!(app.pending_seq.is_none());
        app.retry();
        let requests = app.take_requests();
        assert!(matches!(requests[0], DataRequest::RacesByTracks { .. }));
    }

    #[test]
    fn track_search_narrows_listing() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2), track("Dacono", 40.1, -104.9)]);
        let _ = app.take_requests();
        app.on_mode_selected(SearchMode::Track);
        assert_eq!(app.listed_track_indices().len(), 2);

        app.begin_track_search();
        app.track_query_edit.push_str("sun");
        app.commit_track_search();
        assert_eq!(app.listed_track_indices(), vec![0]);
    }

    #[test]
    fn notice_expires() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.push_notice("hello");
        assert!(app.current_notice(SystemTime::now()).is_some());
        let later = SystemTime::now() + Duration::from_secs(30);
        assert!(app.current_notice(later).is_none());
    }

    #[test]
    fn platform_actions_notice_when_unavailable() {
        let (settings, _) = temp_settings("s.json");
        let mut app = new_app(settings);
        app.on_tracks_loaded(vec![track("Sunrise", 26.7, -80.2)]);
        let _ = app.take_requests();
        app.set_active_track(0);
        app.open_active_website();
        assert_eq!(
            app.current_notice(SystemTime::now()),
            Some("No website for this track")
        );
    }
}
