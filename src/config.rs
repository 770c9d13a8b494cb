use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://raceday.local/api";
pub const DEFAULT_SETTINGS_FILE: &str = "raceday-settings.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_ALLOW_HTTP: bool = true;
pub const DEFAULT_API_KEY_HEADER: &str = "api-auth";
pub const DEFAULT_MAP_ASPECT: f64 = 2.0;
pub const DEFAULT_CURRENT_LOCATION_ZOOM: u8 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub insecure: bool,
    pub allow_http: bool,
    pub allow_insecure: bool,
    pub config_path: PathBuf,
    pub settings_file: String,
    pub timeout_secs: u64,
    pub api_key: String,
    pub api_key_header: String,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
    pub theme: String,
    pub layout: String,
    pub map_aspect: f64,
    pub site_lat: Option<f64>,
    pub site_lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    insecure: Option<bool>,
    allow_http: Option<bool>,
    allow_insecure: Option<bool>,
    settings_file: Option<String>,
    timeout_secs: Option<u64>,
    api_key: Option<String>,
    api_key_header: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
    theme: Option<String>,
    layout: Option<String>,
    map_aspect: Option<f64>,
    site_lat: Option<f64>,
    site_lon: Option<f64>,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(2))
    }
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env::var("RACEDAY_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit_config
        .clone()
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from("raceday-tui.toml"));

    let mut config = Config {
        base_url: DEFAULT_BASE_URL.to_string(),
        insecure: false,
        allow_http: DEFAULT_ALLOW_HTTP,
        allow_insecure: false,
        config_path: config_path.clone(),
        settings_file: DEFAULT_SETTINGS_FILE.to_string(),
        timeout_secs: DEFAULT_TIMEOUT_SECS,
        api_key: String::new(),
        api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
        log_enabled: false,
        log_level: "info".to_string(),
        log_file: "raceday-tui.log".to_string(),
        theme: "default".to_string(),
        layout: "full".to_string(),
        map_aspect: DEFAULT_MAP_ASPECT,
        site_lat: None,
        site_lon: None,
    };

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config);
        }
    } else if explicit_config.is_some() {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    config.config_path = config_path;

    if let Ok(value) = env::var("RACEDAY_URL") {
        config.base_url = value;
    }
    if let Ok(value) = env::var("RACEDAY_INSECURE") {
        config.insecure = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("RACEDAY_ALLOW_HTTP") {
        config.allow_http = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("RACEDAY_ALLOW_INSECURE") {
        config.allow_insecure = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("RACEDAY_SETTINGS_FILE") {
        config.settings_file = value;
    }
    if let Ok(value) = env::var("RACEDAY_TIMEOUT") {
        if let Ok(secs) = value.parse::<u64>() {
            config.timeout_secs = secs.max(2);
        }
    }
    if let Ok(value) = env::var("RACEDAY_API_KEY") {
        config.api_key = value;
    }
    if let Ok(value) = env::var("RACEDAY_API_KEY_HEADER") {
        config.api_key_header = value;
    }
    if let Ok(value) = env::var("RACEDAY_LOG_ENABLED") {
        config.log_enabled = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("RACEDAY_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = env::var("RACEDAY_LOG_FILE") {
        config.log_file = value;
    }
    if let Ok(value) = env::var("RACEDAY_THEME") {
        config.theme = value;
    }
    if let Ok(value) = env::var("RACEDAY_LAYOUT") {
        config.layout = value;
    }
    if let Ok(value) = env::var("RACEDAY_MAP_ASPECT") {
        if let Ok(val) = value.parse::<f64>() {
            config.map_aspect = val.max(0.2);
        }
    }
    if let Ok(value) = env::var("RACEDAY_SITE_LAT") {
        if let Ok(val) = value.parse::<f64>() {
            config.site_lat = Some(val);
        }
    }
    if let Ok(value) = env::var("RACEDAY_SITE_LON") {
        if let Ok(val) = value.parse::<f64>() {
            config.site_lon = Some(val);
        }
    }

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                iter.next();
            }
            "--url" => {
                config.base_url = iter
                    .next()
                    .ok_or_else(|| anyhow!("--url needs a value"))?
                    .to_string();
            }
            "--insecure" => {
                config.insecure = true;
            }
            "--allow-http" => {
                config.allow_http = true;
            }
            "--allow-insecure" => {
                config.allow_insecure = true;
            }
            "--settings-file" => {
                config.settings_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--settings-file needs a value"))?
                    .to_string();
            }
            "--timeout" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--timeout needs a value"))?;
                config.timeout_secs = value.parse::<u64>()?.max(2);
            }
            "--api-key" => {
                config.api_key = iter
                    .next()
                    .ok_or_else(|| anyhow!("--api-key needs a value"))?
                    .to_string();
            }
            "--api-key-header" => {
                config.api_key_header = iter
                    .next()
                    .ok_or_else(|| anyhow!("--api-key-header needs a value"))?
                    .to_string();
            }
            "--log" => {
                config.log_enabled = true;
            }
            "--no-log" => {
                config.log_enabled = false;
            }
            "--log-level" => {
                config.log_level = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-level needs a value"))?
                    .to_string();
            }
            "--log-file" => {
                config.log_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-file needs a value"))?
                    .to_string();
            }
            "--theme" => {
                config.theme = iter
                    .next()
                    .ok_or_else(|| anyhow!("--theme needs a value"))?
                    .to_string();
            }
            "--layout" => {
                config.layout = iter
                    .next()
                    .ok_or_else(|| anyhow!("--layout needs a value"))?
                    .to_string();
            }
            "--map-aspect" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--map-aspect needs a value"))?;
                config.map_aspect = value.parse::<f64>()?.max(0.2);
            }
            "--site-lat" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--site-lat needs a value"))?;
                config.site_lat = Some(value.parse()?);
            }
            "--site-lon" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--site-lon needs a value"))?;
                config.site_lon = Some(value.parse()?);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    validate_security(&config)?;
    Ok(config)
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) {
    if let Some(base_url) = file.base_url {
        target.base_url = base_url;
    }
    if let Some(insecure) = file.insecure {
        target.insecure = insecure;
    }
    if let Some(allow_http) = file.allow_http {
        target.allow_http = allow_http;
    }
    if let Some(allow_insecure) = file.allow_insecure {
        target.allow_insecure = allow_insecure;
    }
    if let Some(settings_file) = file.settings_file {
        target.settings_file = settings_file;
    }
    if let Some(timeout_secs) = file.timeout_secs {
        target.timeout_secs = timeout_secs.max(2);
    }
    if let Some(api_key) = file.api_key {
        target.api_key = api_key;
    }
    if let Some(api_key_header) = file.api_key_header {
        target.api_key_header = api_key_header;
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
    if let Some(theme) = file.theme {
        target.theme = theme;
    }
    if let Some(layout) = file.layout {
        target.layout = layout;
    }
    if let Some(map_aspect) = file.map_aspect {
        target.map_aspect = map_aspect.max(0.2);
    }
    if let Some(site_lat) = file.site_lat {
        target.site_lat = Some(site_lat);
    }
    if let Some(site_lon) = file.site_lon {
        target.site_lon = Some(site_lon);
    }
}

fn print_help() {
    println!("raceday-tui");
    println!("Usage: raceday-tui [--url URL] [--config PATH] [--settings-file PATH]");
    println!("       [--insecure] [--allow-http] [--allow-insecure] [--timeout SECONDS]");
    println!("       [--api-key KEY] [--api-key-header NAME]");
    println!("       [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("       [--theme default|amber|mono] [--layout full|compact]");
    println!("       [--map-aspect RATIO] [--site-lat LAT] [--site-lon LON]");
    println!("Environment: RACEDAY_URL overrides the API base URL");
    println!("Environment: RACEDAY_CONFIG overrides config path");
    println!("Environment: RACEDAY_SETTINGS_FILE sets the persisted settings path");
    println!("Environment: RACEDAY_INSECURE=1 enables invalid TLS certs");
    println!("Environment: RACEDAY_ALLOW_HTTP=1 allows http:// URLs");
    println!("Environment: RACEDAY_ALLOW_INSECURE=1 allows --insecure");
    println!("Environment: RACEDAY_API_KEY/RACEDAY_API_KEY_HEADER configure API auth");
    println!("Environment: RACEDAY_LOG_ENABLED/LEVEL/FILE configure logging");
    println!("Environment: RACEDAY_SITE_LAT/LON set the device location");
    println!("Environment: RACEDAY_THEME/LAYOUT/MAP_ASPECT control the display");
    println!("Keys: q quit | 1/2/3 search mode | arrows pan | +/- zoom | tab cycle tracks");
    println!("      enter select track | x close info | f filters | r retry | ? help");
}

fn validate_security(config: &Config) -> Result<()> {
    let trimmed = config.base_url.trim();
    if trimmed.to_ascii_lowercase().starts_with("http://") && !config.allow_http {
        return Err(anyhow!(
            "Refusing insecure http URL (set allow_http=true or RACEDAY_ALLOW_HTTP=1 to override)"
        ));
    }
    if config.insecure && !config.allow_insecure {
        return Err(anyhow!(
            "Refusing --insecure without explicit allow_insecure=true or RACEDAY_ALLOW_INSECURE=1"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("raceday-tui-config-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        dir.push(name);
        dir
    }

    fn base_config() -> Config {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            insecure: false,
            allow_http: DEFAULT_ALLOW_HTTP,
            allow_insecure: false,
            config_path: PathBuf::from("raceday-tui.toml"),
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: "raceday-tui.log".to_string(),
            theme: "default".to_string(),
            layout: "full".to_string(),
            map_aspect: DEFAULT_MAP_ASPECT,
            site_lat: None,
            site_lon: None,
        }
    }

    #[test]
    fn default_allows_http_url() {
        let cfg = base_config();
        assert!(validate_security(&cfg).is_ok());
    }

    #[test]
    fn http_url_rejected_when_disabled() {
        let mut cfg = base_config();
        cfg.allow_http = false;
        let err = validate_security(&cfg).unwrap_err();
        assert!(err.to_string().contains("Refusing insecure http URL"));
    }

    #[test]
    fn insecure_requires_explicit_allow() {
        let mut cfg = base_config();
        cfg.insecure = true;
        assert!(validate_security(&cfg).is_err());
        cfg.allow_insecure = true;
        assert!(validate_security(&cfg).is_ok());
    }

    #[test]
    fn load_file_config_parses_values() {
        let path = temp_file("config.toml");
        let content = r#"
base_url = "https://example.test/api"
settings_file = "custom-settings.json"
timeout_secs = 9
api_key = "abc123"
api_key_header = "api-auth"
log_enabled = true
log_level = "debug"
theme = "amber"
layout = "compact"
map_aspect = 1.4
site_lat = 26.8
site_lon = -80.5
"#;
        fs::write(&path, content).unwrap();
        let cfg = load_file_config(&path).unwrap().unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("https://example.test/api"));
        assert_eq!(cfg.settings_file.as_deref(), Some("custom-settings.json"));
        assert_eq!(cfg.timeout_secs, Some(9));
        assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
        assert_eq!(cfg.log_enabled, Some(true));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.theme.as_deref(), Some("amber"));
        assert_eq!(cfg.layout.as_deref(), Some("compact"));
        assert_eq!(cfg.map_aspect, Some(1.4));
        assert_eq!(cfg.site_lat, Some(26.8));
        assert_eq!(cfg.site_lon, Some(-80.5));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn apply_file_config_overrides_and_clamps() {
        let mut cfg = base_config();
        let file = FileConfig {
            base_url: Some("https://other.test".to_string()),
            timeout_secs: Some(0),
            map_aspect: Some(0.05),
            log_enabled: Some(true),
            theme: Some("mono".to_string()),
            ..Default::default()
        };
        apply_file_config(&mut cfg, file);
        assert_eq!(cfg.base_url, "https://other.test");
        assert_eq!(cfg.timeout_secs, 2);
        assert_eq!(cfg.map_aspect, 0.2);
        assert!(cfg.log_enabled);
        assert_eq!(cfg.theme, "mono");
    }
}
