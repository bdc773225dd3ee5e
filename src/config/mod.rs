use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::api::DEFAULT_ENDPOINT;

pub const ENDPOINT_ENV: &str = "MEDHISTORY_ENDPOINT";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    #[serde(alias = "api_endpoint")]
    pub endpoint: Option<String>,
    pub storage_path: Option<String>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub page_url: Option<String>,
    pub entities: Option<Vec<String>>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

fn app_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".medhistory"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(app_dir()?.join("config.yml"))
}

pub fn default_storage_path() -> Option<PathBuf> {
    Some(app_dir()?.join("storage.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

/// Picks the API endpoint: command line, then `MEDHISTORY_ENDPOINT`, then the
/// config file, then the local development server.
pub fn resolve_endpoint(cli: Option<&str>, env_value: Option<&str>, cfg: &ConfigFile) -> String {
    [cli, env_value, cfg.endpoint.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ENDPOINT)
        .trim_end_matches('/')
        .to_string()
}

pub fn endpoint_from_env() -> Option<String> {
    env::var(ENDPOINT_ENV).ok()
}

fn default_config_yaml() -> String {
    r#"# medhistory config
#
# Location (default):
#   ~/.medhistory/config.yml

# Backend
endpoint: http://127.0.0.1:8000
timeout: 10
# proxy: http://127.0.0.1:8080

# Page the lists are embedded in (the patient id is added as ?id=)
# page_url: http://127.0.0.1:8000/patient/view

# Persistent storage holding the auth token
# storage_path: ~/.medhistory/storage.json

# Lists to load (medication, surgical, social, vaccination)
entities:
  - medication
  - surgical
  - social
  - vaccination

# Output (optional)
# output: ./history.html
# output_format: html

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
