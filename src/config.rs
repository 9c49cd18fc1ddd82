use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Closed list of administrative regions. Admin and agent accounts, and
    /// every case, must reference one of these.
    pub regions: Vec<String>,

    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub session: SessionConfig,

    pub audit: AuditConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/vbg-tracker.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, `X-Forwarded-For` is ignored and the socket peer address
    /// is recorded in audit entries.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    pub min_password_length: usize,

    /// Username of the super-admin created on first start.
    pub bootstrap_username: String,

    /// Password of the super-admin created on first start. No account is
    /// created while this is unset.
    #[serde(skip_serializing)]
    pub bootstrap_password: Option<String>,

    pub lockout: LockoutConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
            bootstrap_username: "superadmin".to_string(),
            bootstrap_password: None,
            lockout: LockoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failed logins that lock the account.
    pub max_failed_attempts: u32,

    /// How long a locked account stays locked.
    pub lock_minutes: i64,

    /// Warn the caller about the remaining attempts once this many or fewer
    /// are left.
    pub warn_when_remaining: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_minutes: 30,
            warn_when_remaining: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret used to sign session tokens. Must be at least 32 bytes.
    #[serde(skip_serializing)]
    pub secret: String,

    pub issuer: String,

    /// Token validity window (default: 240 = 4 hours).
    pub ttl_minutes: i64,

    /// Reload the user on every request and reject tokens whose role, region
    /// or status no longer match the stored account.
    pub revalidate_claims: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "vbg-tracker".to_string(),
            ttl_minutes: 4 * 60,
            revalidate_claims: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "vbg-tracker".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

pub const DEFAULT_REGIONS: [&str; 14] = [
    "Dakar",
    "Diourbel",
    "Fatick",
    "Kaffrine",
    "Kaolack",
    "Kédougou",
    "Kolda",
    "Louga",
    "Matam",
    "Saint-Louis",
    "Sédhiou",
    "Tambacounda",
    "Thiès",
    "Ziguinchor",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: DEFAULT_REGIONS.iter().map(ToString::to_string).collect(),
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            session: SessionConfig::default(),
            audit: AuditConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets and deployment-specific values may come from the environment
    /// instead of the TOML file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VBG_DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Ok(secret) = std::env::var("VBG_SESSION_SECRET") {
            self.session.secret = secret;
        }
        if let Ok(password) = std::env::var("VBG_BOOTSTRAP_PASSWORD") {
            self.security.bootstrap_password = Some(password);
        }
        if let Ok(level) = std::env::var("VBG_LOG_LEVEL") {
            self.general.log_level = level;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vbg-tracker").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".vbg-tracker").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.secret.len() < 32 {
            anyhow::bail!(
                "Session secret must be at least 32 bytes (set session.secret or VBG_SESSION_SECRET)"
            );
        }

        if self.session.ttl_minutes <= 0 {
            anyhow::bail!("session.ttl_minutes must be > 0");
        }

        let lockout = &self.security.lockout;
        if lockout.max_failed_attempts == 0 || lockout.lock_minutes <= 0 {
            anyhow::bail!("Lockout threshold and duration must be > 0");
        }

        if self.regions.is_empty() {
            anyhow::bail!("At least one region must be configured");
        }

        Ok(())
    }

    #[must_use]
    pub fn is_known_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }
}
