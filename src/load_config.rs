//! Loads the static YAML config (no secrets) and merges the deploy target
//! and credentials from the environment.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::{AppConfig, DeployCredentials, PublishSettings};

pub const ENV_SURGE_DOMAIN: &str = "SURGE_DOMAIN";
pub const ENV_SURGE_EMAIL: &str = "SURGE_EMAIL";
pub const ENV_SURGE_PASSWORD: &str = "SURGE_PASSWORD";

/// Loads the application options. A missing file yields the defaults; a file
/// that exists but does not parse is an error the operator must fix.
pub fn load_app_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        warn!(config_path = ?path_ref, "Config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: AppConfig = match serde_yaml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };
    config.trace_loaded();
    Ok(config)
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => {
            error!(var = name, "Environment variable is set but empty");
            Err(anyhow::anyhow!("{name} environment variable is empty"))
        }
        Err(e) => {
            error!(error = ?e, var = name, "Environment variable not set");
            Err(anyhow::anyhow!("{name} environment variable not set: {e}"))
        }
    }
}

/// Full settings for a publishing run: file options plus the deploy target
/// taken from `SURGE_DOMAIN` / `SURGE_EMAIL` / `SURGE_PASSWORD`.
pub fn load_publish_settings<P: AsRef<Path>>(path: P) -> Result<PublishSettings> {
    let app = load_app_config(path)?;

    let creds = DeployCredentials {
        domain: required_env(ENV_SURGE_DOMAIN)?,
        email: required_env(ENV_SURGE_EMAIL)?,
        password: required_env(ENV_SURGE_PASSWORD)?,
    };
    creds.trace_loaded();

    Ok(PublishSettings { app, creds })
}
