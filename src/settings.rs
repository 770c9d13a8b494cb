use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const KEY_SEARCH_MODE: &str = "searchMode";
pub const KEY_CATEGORY_FILTERS: &str = "categoryFilters";
pub const KEY_REGION_FILTERS: &str = "regionFilters";

/// Durable key/value store for session settings. Every value is a string;
/// array values round-trip through JSON-array encoding. A missing or
/// malformed entry yields the caller-supplied default instead of an error.
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        let values = match read_values(path) {
            Ok(values) => values,
            Err(err) => {
                warn!("settings load failed, starting empty: {err}");
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.persist();
    }

    pub fn get_array(&self, key: &str, default: &[String]) -> Vec<String> {
        let Some(raw) = self.values.get(key) else {
            return default.to_vec();
        };
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(values) => values,
            Err(err) => {
                warn!("settings key {key} holds malformed array ({err}), using default");
                default.to_vec()
            }
        }
    }

    pub fn set_array(&mut self, key: &str, values: &[String]) {
        match serde_json::to_string(values) {
            Ok(encoded) => {
                self.values.insert(key.to_string(), encoded);
                self.persist();
            }
            Err(err) => warn!("settings key {key} array encode failed: {err}"),
        }
    }

    fn persist(&self) {
        if let Err(err) = write_values(&self.path, &self.values) {
            warn!("settings save failed: {err}");
        } else {
            debug!("settings saved {}", self.path.display());
        }
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings: {}", path.display()))
}

fn write_values(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let content = serde_json::to_string_pretty(values)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write settings: {}", path.display()))?;
    Ok(())
}
