use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geo::LatLng;

pub const CATEGORY_OPTIONS: [Category; 5] = [
    Category::National,
    Category::GoldCup,
    Category::State,
    Category::Multi,
    Category::Practice,
];

pub const REGION_OPTIONS: [Region; 6] = [
    Region::NorthWest,
    Region::SouthWest,
    Region::NorthCentral,
    Region::SouthCentral,
    Region::NorthEast,
    Region::SouthEast,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    National,
    GoldCup,
    State,
    Multi,
    Practice,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::National => "National",
            Category::GoldCup => "Gold Cup",
            Category::State => "State",
            Category::Multi => "Multi",
            Category::Practice => "Practice",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "national" => Some(Category::National),
            "gold cup" | "goldcup" | "gold-cup" => Some(Category::GoldCup),
            "state" => Some(Category::State),
            "multi" => Some(Category::Multi),
            "practice" => Some(Category::Practice),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    NorthWest,
    SouthWest,
    NorthCentral,
    SouthCentral,
    NorthEast,
    SouthEast,
}

impl Region {
    pub fn label(self) -> &'static str {
        match self {
            Region::NorthWest => "North West",
            Region::SouthWest => "South West",
            Region::NorthCentral => "North Central",
            Region::SouthCentral => "South Central",
            Region::NorthEast => "North East",
            Region::SouthEast => "South East",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "north west" | "northwest" | "nw" => Some(Region::NorthWest),
            "south west" | "southwest" | "sw" => Some(Region::SouthWest),
            "north central" | "northcentral" | "nc" => Some(Region::NorthCentral),
            "south central" | "southcentral" | "sc" => Some(Region::SouthCentral),
            "north east" | "northeast" | "ne" => Some(Region::NorthEast),
            "south east" | "southeast" | "se" => Some(Region::SouthEast),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrackListResponse {
    #[serde(default, alias = "data")]
    pub tracks: Vec<Track>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_f64_from_any")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lng", deserialize_with = "de_opt_f64_from_any")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub primary_contact_name: Option<String>,
    #[serde(default)]
    pub primary_contact_phone: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
}

impl Track {
    pub fn position(&self) -> Option<LatLng> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLng::new(lat, lon)),
            _ => None,
        }
    }

    /// The primary contact phone wins over the general track number.
    pub fn contact_phone(&self) -> Option<&str> {
        self.primary_contact_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| {
                self.phone_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
            })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RaceListResponse {
    #[serde(default, alias = "data")]
    pub races: Vec<Race>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Race {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "track")]
    pub track_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl Race {
    pub fn category(&self) -> Option<Category> {
        self.category.as_deref().and_then(Category::from_str)
    }

    pub fn region(&self) -> Option<Region> {
        self.region.as_deref().and_then(Region::from_str)
    }
}

fn de_opt_f64_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected float-compatible number")),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<i64>() {
                Ok(Some(value as f64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Race, RaceListResponse, Region, Track, TrackListResponse};

    const MOCK_TRACKS: &str = r#"{
        "tracks": [
            {
                "name": "Sunshine State BMX",
                "lat": 26.853891,
                "lon": -80.544627,
                "district": "FL1",
                "state": "FL",
                "primary_contact_name": "Pat Rider",
                "primary_contact_phone": "555-0100",
                "phone_number": "555-0199",
                "email": "info@sunshinebmx.test",
                "website_url": "https://sunshinebmx.test"
            },
            { "name": "Bare Minimum BMX", "lat": "33.5", "lng": "-112.1" },
            { "name": "No Position BMX" }
        ]
    }"#;

    #[test]
    fn parse_mock_tracks() {
        let data: TrackListResponse = serde_json::from_str(MOCK_TRACKS).unwrap();
        assert_eq!(data.tracks.len(), 3);

        let first = &data.tracks[0];
        assert_eq!(first.name, "Sunshine State BMX");
        assert_eq!(first.district.as_deref(), Some("FL1"));
        assert_eq!(first.contact_phone(), Some("555-0100"));
        let pos = first.position().unwrap();
        assert!((pos.lat - 26.853891).abs() < 1e-9);

        // String coordinates and the lng alias are tolerated.
        let second = &data.tracks[1];
        let pos = second.position().unwrap();
        assert!((pos.lon + 112.1).abs() < 1e-9);

        assert!(data.tracks[2].position().is_none());
    }

    #[test]
    fn parse_races_and_enums() {
        let body = r#"{
            "races": [
                { "name": "Stars and Stripes", "track": "Sunshine State BMX",
                  "category": "Gold Cup", "region": "South East", "date": "2026-09-12" },
                { "name": "Weekly Gate Night", "category": "Practice" }
            ]
        }"#;
        let data: RaceListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(data.races.len(), 2);
        assert_eq!(data.races[0].category(), Some(Category::GoldCup));
        assert_eq!(data.races[0].region(), Some(Region::SouthEast));
        assert_eq!(data.races[1].category(), Some(Category::Practice));
        assert_eq!(data.races[1].region(), None);
    }

    #[test]
    fn category_labels_roundtrip() {
        for category in super::CATEGORY_OPTIONS {
            assert_eq!(Category::from_str(category.label()), Some(category));
        }
        for region in super::REGION_OPTIONS {
            assert_eq!(Region::from_str(region.label()), Some(region));
        }
        assert_eq!(Category::from_str("garbage"), None);
    }

    #[test]
    fn contact_phone_fallback() {
        let race = Race::default();
        assert!(race.category().is_none());

        let track = Track {
            primary_contact_phone: Some("  ".to_string()),
            phone_number: Some("555-0011".to_string()),
            ..Default::default()
        };
        assert_eq!(track.contact_phone(), Some("555-0011"));
    }
}
