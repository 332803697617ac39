use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Non-secret application options persisted in the YAML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Informational only: shown to the operator, never used as the write
    /// target. The publish directory is fixed under the application root.
    #[serde(default)]
    pub dashboard_dir: String,
    /// Selects the offline chart-library mode of the renderer.
    #[serde(default)]
    pub chart_offline: bool,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            dashboard_dir = %self.dashboard_dir,
            chart_offline = self.chart_offline,
            "Loaded AppConfig"
        );
    }
}

/// Target host and account for the deployment tool, taken from the
/// environment at load time and handed to the dispatcher per call.
#[derive(Clone)]
pub struct DeployCredentials {
    pub domain: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for DeployCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployCredentials")
            .field("domain", &self.domain)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DeployCredentials {
    pub fn trace_loaded(&self) {
        info!(
            domain = %self.domain,
            email = %self.email,
            password_len = self.password.len(),
            "Loaded deploy credentials"
        );
    }
}

/// Everything a full publish cycle needs: options plus deploy target.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub app: AppConfig,
    pub creds: DeployCredentials,
}
