use crate::models::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] basic_toml::Error),
    #[error("failed to initialize logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NewsgateSettings {
    pub application: ApplicationSettings,
    pub backend: BackendSettings,
    pub identity: IdentitySettings,
    pub payments: PaymentSettings,
    pub credentials: CredentialSettings,
    pub logging: LoggingSettings,
    /// Route table override; the built-in table is used when empty
    pub routes: Vec<RouteSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    /// Where a successful upgrade lands the user
    pub post_upgrade_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub base_url: String,
    // Direct value (can be overridden by the environment variable named below)
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    pub api_base: String,
    pub publishable_key: Option<String>,
    pub publishable_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// File holding the persisted backend bearer token
    pub token_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

/// One route definition as written in `Settings.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouteSettings {
    pub path: String,
    pub page: String,
    pub requires_auth: bool,
    pub allowed_roles: Vec<Role>,
    pub guest_only: bool,
    /// Index route that only forwards to another path
    pub redirect_to: Option<String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:5173,http://localhost:8080".to_string(),
            post_upgrade_path: "/all-articles".to_string(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/web/api".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            api_key: None,
            api_key_env: Some("IDENTITY_API_KEY".to_string()),
        }
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com/v1".to_string(),
            publishable_key: None,
            publishable_key_env: Some("PAYMENT_PUBLISHABLE_KEY".to_string()),
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            token_path: ".newsgate/token".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NewsgateSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, SettingsError> {
        // Initialize environment and logging
        Self::initialize_environment()?;

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Initialize environment and logging
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), SettingsError> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `NEWSGATE_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            log::info!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("NEWSGATE_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                log::info!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                log::info!(
                    "ℹ NEWSGATE_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, SettingsError> {
        let toml_content = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_content)
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid settings TOML
    pub fn from_toml_str(toml_content: &str) -> Result<Self, SettingsError> {
        Ok(basic_toml::from_str(toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_backend_env_overrides(&mut settings.backend);
        Self::apply_identity_env_overrides(&mut settings.identity);
        Self::apply_payment_env_overrides(&mut settings.payments);
        Self::apply_credential_env_overrides(&mut settings.credentials);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for backend settings
    pub fn apply_backend_env_overrides(backend_settings: &mut BackendSettings) {
        if let Ok(base_url) = std::env::var("BACKEND_BASE_URL") {
            backend_settings.base_url = base_url;
        }
        Self::apply_numeric_env_override(
            "BACKEND_TIMEOUT_SECONDS",
            &mut backend_settings.timeout_seconds,
        );
    }

    fn apply_identity_env_overrides(identity_settings: &mut IdentitySettings) {
        if let Ok(base_url) = std::env::var("IDENTITY_BASE_URL") {
            identity_settings.base_url = base_url;
        }
    }

    fn apply_payment_env_overrides(payment_settings: &mut PaymentSettings) {
        if let Ok(api_base) = std::env::var("PAYMENT_API_BASE") {
            payment_settings.api_base = api_base;
        }
    }

    fn apply_credential_env_overrides(credential_settings: &mut CredentialSettings) {
        if let Ok(token_path) = std::env::var("CREDENTIAL_PATH") {
            credential_settings.token_path = token_path;
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if line.trim_start().starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Resolve a secret: the named environment variable wins over the direct value
fn resolve_secret(env_name: Option<&String>, direct: Option<&String>) -> Option<String> {
    if let Some(env_var) = env_name {
        if let Ok(value) = std::env::var(env_var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    direct.filter(|value| !value.is_empty()).cloned()
}

impl IdentitySettings {
    /// Get the API key, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_api_key(&self) -> Option<String> {
        resolve_secret(self.api_key_env.as_ref(), self.api_key.as_ref())
    }
}

impl PaymentSettings {
    /// Get the publishable key, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_publishable_key(&self) -> Option<String> {
        resolve_secret(
            self.publishable_key_env.as_ref(),
            self.publishable_key.as_ref(),
        )
    }
}
