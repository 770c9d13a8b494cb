use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info};

use crate::model::{Race, RaceListResponse, Track, TrackListResponse};

const TRACK_LIST_ATTEMPTS: u32 = 3;

/// Queries issued by the controller. Race queries carry the sequence number
/// the controller uses to discard superseded responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataRequest {
    TrackList,
    RacesByTracks { seq: u64, names: Vec<String> },
    RacesByTrack { seq: u64, name: String },
}

#[derive(Debug)]
pub enum DataMessage {
    Tracks(Vec<Track>),
    Races { seq: u64, races: Vec<Race> },
    TrackListError(String),
    RaceError { seq: u64, message: String },
}

pub fn spawn_fetcher(
    base_url: String,
    insecure: bool,
    timeout: Duration,
    api_key: Option<String>,
    api_key_header: Option<String>,
    rx: Receiver<DataRequest>,
    tx: Sender<DataMessage>,
) {
    thread::spawn(move || {
        info!("data fetcher started");
        let client = match reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                error!("client error: {err}");
                let _ = tx.send(DataMessage::TrackListError(format!("Client error: {err}")));
                return;
            }
        };

        let base = base_url.trim_end_matches('/').to_string();
        let auth = match (api_key, api_key_header) {
            (Some(key), Some(header))
                if !key.trim().is_empty() && !header.trim().is_empty() =>
            {
                Some((header, key))
            }
            _ => None,
        };

        while let Ok(request) = rx.recv() {
            match request {
                DataRequest::TrackList => {
                    let message = match fetch_track_list(&client, &base, auth.as_ref()) {
                        Ok(tracks) => {
                            debug!("track list ok: {} tracks", tracks.len());
                            DataMessage::Tracks(tracks)
                        }
                        Err(err) => {
                            error!("track list fetch failed: {err}");
                            DataMessage::TrackListError(err)
                        }
                    };
                    if tx.send(message).is_err() {
                        debug!("receiver dropped, exiting fetcher");
                        return;
                    }
                }
                DataRequest::RacesByTracks { seq, names } => {
                    let result = if names.is_empty() {
                        Ok(Vec::new())
                    } else {
                        fetch_races_by_tracks(&client, &base, auth.as_ref(), &names)
                    };
                    if send_race_result(&tx, seq, result).is_err() {
                        return;
                    }
                }
                DataRequest::RacesByTrack { seq, name } => {
                    let result = fetch_races_by_track(&client, &base, auth.as_ref(), &name);
                    if send_race_result(&tx, seq, result).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

fn send_race_result(
    tx: &Sender<DataMessage>,
    seq: u64,
    result: Result<Vec<Race>, String>,
) -> Result<(), ()> {
    let message = match result {
        Ok(races) => {
            debug!("race query {seq} ok: {} races", races.len());
            DataMessage::Races { seq, races }
        }
        Err(message) => {
            error!("race query {seq} failed: {message}");
            DataMessage::RaceError { seq, message }
        }
    };
    tx.send(message).map_err(|_| ())
}

fn fetch_track_list(
    client: &reqwest::blocking::Client,
    base: &str,
    auth: Option<&(String, String)>,
) -> Result<Vec<Track>, String> {
    let url = format!("{base}/tracks");
    let mut last_err = String::new();
    for attempt in 1..=TRACK_LIST_ATTEMPTS {
        match get_json::<TrackListResponse>(client, &url, auth) {
            Ok(body) => return Ok(body.tracks),
            Err(err) => {
                debug!("track list attempt {attempt} failed: {err}");
                last_err = err;
                if attempt < TRACK_LIST_ATTEMPTS {
                    thread::sleep(backoff_duration(attempt));
                }
            }
        }
    }
    Err(last_err)
}

fn fetch_races_by_tracks(
    client: &reqwest::blocking::Client,
    base: &str,
    auth: Option<&(String, String)>,
    names: &[String],
) -> Result<Vec<Race>, String> {
    let url = format!("{base}/races/search");
    let payload = json!({ "tracks": names });
    let mut req = client.post(&url).json(&payload);
    if let Some((header, key)) = auth {
        req = req.header(header.as_str(), key.as_str());
    }
    let resp = req.send().map_err(|err| err.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    let body: RaceListResponse = resp.json().map_err(|err| err.to_string())?;
    Ok(body.races)
}

fn fetch_races_by_track(
    client: &reqwest::blocking::Client,
    base: &str,
    auth: Option<&(String, String)>,
    name: &str,
) -> Result<Vec<Race>, String> {
    let url = format!("{base}/tracks/{}/races", encode_segment(name));
    let body: RaceListResponse = get_json(client, &url, auth)?;
    Ok(body.races)
}

fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
    auth: Option<&(String, String)>,
) -> Result<T, String> {
    let mut req = client.get(url);
    if let Some((header, key)) = auth {
        req = req.header(header.as_str(), key.as_str());
    }
    let resp = req.send().map_err(|err| err.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    resp.json::<T>().map_err(|err| err.to_string())
}

/// Minimal percent-encoding for a path segment; track names contain spaces
/// and the occasional punctuation.
fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn backoff_duration(attempts: u32) -> Duration {
    if attempts == 0 {
        return Duration::from_secs(0);
    }
    let shift = attempts.saturating_sub(1).min(6);
    let base_secs = 1u64 << shift;
    // Simple deterministic jitter without extra deps.
    let jitter_ms = (attempts as u64 * 173) % 1000;
    Duration::from_secs(base_secs.min(60)).saturating_add(Duration::from_millis(jitter_ms))
}


#[cfg(all(test, feature = "net-tests"))]
mod net_tests {
    use super::{fetch_races_by_track, fetch_track_list};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/json\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn track_list_fetch_parses() {
        let client = reqwest::blocking::Client::builder().build().unwrap();
        let base = serve_once(r#"{"tracks":[{"name":"A","lat":10.0,"lon":10.0}]}"#);
        let tracks = fetch_track_list(&client, &base, None).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "A");
    }

    #[test]
    fn races_by_track_fetch_parses() {
        let client = reqwest::blocking::Client::builder().build().unwrap();
        let base = serve_once(r#"{"races":[{"name":"Race","category":"State"}]}"#);
        let races = fetch_races_by_track(&client, &base, None, "A").unwrap();
        assert_eq!(races.len(), 1);
        assert_eq!(races[0].category.as_deref(), Some("State"));
    }
}
