use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use shared::protocol::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use tracing::warn;
use url::Url;

use crate::error::ClientError;

pub const SETTINGS_FILE: &str = "dashboard.toml";
/// Checked in order; the first non-empty value wins.
pub const BACKEND_URL_VARS: [&str; 2] = ["DASHBOARD_BACKEND_URL", "APP__BACKEND_URL"];
const DATA_DIR_VAR: &str = "APP__DATA_DIR";
const PAGE_SIZE_VAR: &str = "APP__PAGE_SIZE";
const APP_DIR_NAME: &str = "admin_dashboard";
const DATABASE_FILE: &str = "client.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub backend_url: Option<String>,
    pub page_size: u32,
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            data_dir: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend_url: Option<String>,
    page_size: Option<u32>,
    data_dir: Option<PathBuf>,
}

impl ClientSettings {
    /// Parsed backend base URL. Absence is fatal and reported before any request.
    pub fn require_backend_url(&self) -> Result<Url, ClientError> {
        let raw = self
            .backend_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ClientError::ConfigurationMissing(format!(
                    "backend URL not configured; set {} or {} (or backend_url in {SETTINGS_FILE})",
                    BACKEND_URL_VARS[0], BACKEND_URL_VARS[1]
                ))
            })?;
        let url = Url::parse(raw).map_err(|err| {
            ClientError::InvalidConfiguration(format!("backend URL '{raw}' is invalid: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfiguration(format!(
                "backend URL '{raw}' must use http or https"
            )));
        }
        Ok(url)
    }

    pub fn data_root(&self) -> Result<PathBuf, ClientError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|base| base.join(APP_DIR_NAME))
            .ok_or_else(|| {
                ClientError::ConfigurationMissing(format!(
                    "unable to resolve local app data dir; set {DATA_DIR_VAR}"
                ))
            })
    }

    pub fn database_path(&self) -> Result<PathBuf, ClientError> {
        Ok(self.data_root()?.join(DATABASE_FILE))
    }
}

pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

fn apply_file(settings: &mut ClientSettings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => {
            if file_cfg.backend_url.is_some() {
                settings.backend_url = file_cfg.backend_url;
            }
            if let Some(size) = file_cfg.page_size {
                set_page_size(settings, size);
            }
            if file_cfg.data_dir.is_some() {
                settings.data_dir = file_cfg.data_dir;
            }
        }
        Err(err) => warn!(path = %path.display(), %err, "ignoring unreadable settings file"),
    }
}

fn apply_env(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    let env: HashMap<&str, String> = BACKEND_URL_VARS
        .iter()
        .chain([DATA_DIR_VAR, PAGE_SIZE_VAR].iter())
        .filter_map(|name| {
            var(name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (*name, v))
        })
        .collect();

    if let Some(url) = BACKEND_URL_VARS.iter().find_map(|name| env.get(name)) {
        settings.backend_url = Some(url.clone());
    }
    if let Some(dir) = env.get(DATA_DIR_VAR) {
        settings.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(raw) = env.get(PAGE_SIZE_VAR) {
        match raw.parse::<u32>() {
            Ok(size) => set_page_size(settings, size),
            Err(_) => warn!(value = %raw, "{PAGE_SIZE_VAR} is not a number"),
        }
    }
}

fn set_page_size(settings: &mut ClientSettings, size: u32) {
    if (1..=MAX_PAGE_SIZE).contains(&size) {
        settings.page_size = size;
    } else {
        warn!(size, max = MAX_PAGE_SIZE, "ignoring out-of-range page size");
    }
}

/// Joins a route onto the backend base URL without doubling slashes.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, ClientError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|err| ClientError::InvalidConfiguration(format!("bad endpoint '{joined}': {err}")))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
