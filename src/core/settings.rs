use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "kimsufi-watch";

const DEFAULT_ENDPOINT: &str = "https://ws.ovh.com/dedicated/r2/ws.dispatcher/getAvailability2";
const DEFAULT_SMS_API_BASE: &str = "https://api.twilio.com";

// XDG notifications block until acknowledged; elsewhere `show` returns at once
// and the gate has to stay closed for a while instead.
#[cfg(all(unix, not(target_os = "macos")))]
const DEFAULT_COOLDOWN_MS: u64 = 0;
#[cfg(not(all(unix, not(target_os = "macos"))))]
const DEFAULT_COOLDOWN_MS: u64 = 300_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub notifications: NotificationSettings,
    pub diagnostics: DiagnosticsSettings,
    pub daemon: DaemonSettings,
    pub debug: bool,
    /// File the settings were read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub endpoint: String,
    pub timeout_ms: Option<u64>,
    pub period_ms: u64,
    pub sku: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: Some(10_000),
            period_ms: 60_000,
            sku: String::new(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub desktop: bool,
    /// How long the gate stays closed after a dispatch finishes.
    pub cooldown_ms: u64,
    pub sms: SmsSettings,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            desktop: true,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            sms: SmsSettings::default(),
        }
    }
}

impl NotificationSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
    pub api_base: String,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: String::new(),
            api_base: DEFAULT_SMS_API_BASE.to_string(),
        }
    }
}

impl SmsSettings {
    /// All four credentials must be present; any blank one disables SMS.
    pub fn is_configured(&self) -> bool {
        [&self.account_sid, &self.auth_token, &self.from, &self.to]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub capture_payloads: bool,
    pub dir: Option<PathBuf>,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            capture_payloads: true,
            dir: None,
        }
    }
}

impl DiagnosticsSettings {
    pub fn capture_dir(&self) -> Option<PathBuf> {
        if !self.capture_payloads {
            return None;
        }

        self.dir.clone().or_else(|| {
            dirs::data_local_dir().map(|p| p.join(APP_NAME).join("failures"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub shutdown_grace_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 5_000,
        }
    }
}

impl DaemonSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path().context("Could not determine config directory")?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.source = Some(path);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            anyhow::bail!("api.endpoint must not be empty");
        }

        reqwest::Url::parse(&self.api.endpoint)
            .with_context(|| format!("api.endpoint is not a valid URL: {}", self.api.endpoint))?;

        if self.api.sku.trim().is_empty() {
            anyhow::bail!("api.sku must name the server SKU to watch");
        }

        if self.api.period_ms == 0 {
            anyhow::bail!("api.period_ms must be positive");
        }

        if self.api.timeout_ms == Some(0) {
            anyhow::bail!("api.timeout_ms must be positive; omit it to disable the timeout");
        }

        if let Some(timeout) = self.api.timeout_ms {
            if timeout >= self.api.period_ms {
                tracing::warn!(
                    timeout_ms = timeout,
                    period_ms = self.api.period_ms,
                    "API timeout is not shorter than the poll period; passes may overlap"
                );
            }
        }

        Ok(())
    }
}
