use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub schema: u8,
    pub timezone: String,
    pub calendar_id: String,
    pub done_color_id: String,
    pub page_size: u32,
    pub client_secret_path: String,
    pub credential_backend: CredentialBackend,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            timezone: "America/New_York".to_string(),
            calendar_id: "primary".to_string(),
            done_color_id: "8".to_string(),
            page_size: 50,
            client_secret_path: "credentials.json".to_string(),
            credential_backend: CredentialBackend::File,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn time_zone(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("unknown timezone '{}': {error}", self.timezone))
        })
    }

    /// Client secret location; relative paths resolve against the workspace root.
    pub fn client_secret_path(&self, workspace_root: &Path) -> PathBuf {
        let path = Path::new(self.client_secret_path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace_root.join(path)
        }
    }

    fn validate(self, path: &Path) -> Result<Self, InfraError> {
        if self.calendar_id.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!(
                "calendarId must not be empty in {}",
                path.display()
            )));
        }
        if self.done_color_id.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!(
                "doneColorId must not be empty in {}",
                path.display()
            )));
        }
        if !(1..=2500).contains(&self.page_size) {
            return Err(InfraError::InvalidConfig(format!(
                "pageSize must be between 1 and 2500 in {}",
                path.display()
            )));
        }
        self.time_zone()?;
        Ok(self)
    }
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    serde_json::from_value::<AppConfig>(parsed)?.validate(&path)
}

/// OAuth client registration as downloaded from the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

pub fn read_client_secret(path: &Path) -> Result<Option<ClientSecret>, InfraError> {
    let raw = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let parsed: ClientSecretFile = serde_json::from_str(&raw)?;
    parsed.installed.or(parsed.web).map(Some).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "{} has neither an \"installed\" nor a \"web\" client section",
            path.display()
        ))
    })
}
