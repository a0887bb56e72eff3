use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// UI server configuration
    pub ui: UiConfig,

    /// Obihai device probe configuration
    pub device: DeviceConfig,

    /// Path configuration
    pub paths: PathConfig,
}

#[derive(Clone, Debug)]
pub struct UiConfig {
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub probe_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub data_dir: PathBuf,
    pub entries_file: PathBuf,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it loads
    /// and validates all configuration from environment variables. Subsequent
    /// calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. This is intentional as the
    /// application cannot function without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    fn load_internal() -> Result<Self> {
        let ui = UiConfig::load()?;
        let device = DeviceConfig::load()?;
        let paths = PathConfig::load()?;

        Ok(Self { ui, device, paths })
    }
}

impl UiConfig {
    fn load() -> Result<Self> {
        let port = env::var("UI_PORT")
            .unwrap_or_else(|_| "8015".to_string())
            .parse::<u16>()
            .context("failed to parse UI_PORT: invalid format")?;

        Ok(Self { port })
    }
}

impl DeviceConfig {
    fn load() -> Result<Self> {
        let probe_timeout_secs = env::var("PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("failed to parse PROBE_TIMEOUT_SECS: invalid format")?;

        Ok(Self {
            probe_timeout: Duration::from_secs(probe_timeout_secs),
        })
    }
}

impl PathConfig {
    fn load() -> Result<Self> {
        let data_dir = Self::data_dir();
        let config_dir = data_dir.join("config");

        std::fs::create_dir_all(&config_dir).context("failed to create config directory")?;

        let entries_file = config_dir.join("entries.json");

        Ok(Self {
            data_dir,
            entries_file,
        })
    }

    #[cfg(not(any(test, feature = "mock")))]
    fn data_dir() -> PathBuf {
        PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "/data/".to_string()))
    }

    // In test mode, use temp directory as default to avoid /data requirement
    #[cfg(any(test, feature = "mock"))]
    fn data_dir() -> PathBuf {
        let data_dir = std::env::temp_dir().join("obihai-setup-ui-test");

        std::fs::create_dir_all(&data_dir)
            .context("failed to create data directory")
            .unwrap();
        data_dir
    }
}
