use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the gym workflow client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GymWorkflowConfig {
    /// Backend API settings
    pub api: ApiConfig,
    /// Workflow engine tuning
    pub workflow: WorkflowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://api.example-gym.vn`
    pub base_url: String,
    /// Path prefix of the package workflow routes
    pub workflow_path: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Retries for transport failures only
    pub max_retries: u32,
    /// First retry delay; later retries back off from here
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Wait after schedule creation before re-reading the status
    pub schedule_settle_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default filter directive when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            workflow_path: "/api/package-workflow".to_string(),
            token: None,
            timeout_seconds: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            schedule_settle_ms: 800,
        }
    }
}

impl WorkflowConfig {
    pub fn schedule_settle_delay(&self) -> Duration {
        Duration::from_millis(self.schedule_settle_ms)
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for GymWorkflowConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            workflow: WorkflowConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GymWorkflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (gym-workflow.toml, .gym-workflow-rc)
    /// 3. Environment variables (prefixed with GYM_WORKFLOW_, nested keys split by `__`)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`GymWorkflowConfig::load`] but looks for the files in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("gym-workflow.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".gym-workflow-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("GYM_WORKFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: GymWorkflowConfig = builder.build()?.try_deserialize()?;

        if loaded.api.token.is_none() {
            if let Ok(token) = std::env::var("GYM_API_TOKEN") {
                loaded.api.token = Some(token);
            }
        }

        Ok(loaded)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<GymWorkflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = GymWorkflowConfig::load_env_file();
        GymWorkflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static GymWorkflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
