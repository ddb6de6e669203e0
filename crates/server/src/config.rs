use std::{collections::HashMap, fs, path::Path};

use server_api::DatasetConfig;
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub dataset: DatasetConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            dataset: DatasetConfig::default(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
                settings.server_bind = v.to_string();
            }
            if let Some(v) = file_cfg.get("dataset_seed").and_then(toml::Value::as_integer) {
                settings.dataset.seed = v as u64;
            }
            if let Some(v) = file_cfg
                .get("rows_per_collection")
                .and_then(toml::Value::as_integer)
            {
                settings.dataset.rows_per_collection = v.max(0) as usize;
            }
        }
        Err(err) => warn!(path = %path.display(), %err, "ignoring unreadable settings file"),
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__DATASET_SEED") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.dataset.seed = parsed,
            Err(_) => warn!(value = %v, "APP__DATASET_SEED is not a number"),
        }
    }
    if let Some(v) = var("APP__ROWS_PER_COLLECTION") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.dataset.rows_per_collection = parsed,
            Err(_) => warn!(value = %v, "APP__ROWS_PER_COLLECTION is not a number"),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
