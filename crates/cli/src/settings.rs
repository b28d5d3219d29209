use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile, FileFormat};
use namereg_types::{Amount, Identity, RegistryPriceSchedule, UNITS_PER_TOKEN};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "NAMEREG";
pub const CONFIG_FILE_NAME: &str = "namereg.toml";
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Shape of the log lines written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human readable
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be \"pretty\" or \"json\", got {:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Registry instance the derived keys are scoped to
    pub registry_id: [u8; 32],
    /// Account that receives registry fees
    pub treasury_account: Identity,
    pub price_schedule: RegistryPriceSchedule,
    /// Starting balance granted to the fee payer of each command
    pub faucet_balance: Amount,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            registry_id: [0u8; 32],
            treasury_account: Identity::from_label("treasury"),
            price_schedule: RegistryPriceSchedule::default(),
            faucet_balance: 10 * UNITS_PER_TOKEN,
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file and `NAMEREG_*` environment variables.
    ///
    /// Without an explicit path, `namereg.toml` inside `data_dir` is used if
    /// present.
    pub fn load(config_path_override: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let dir = data_dir
                    .map(Path::to_path_buf)
                    .or_else(|| std::env::var_os("NAMEREG_DATA_DIR").map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
                let path = dir.join(CONFIG_FILE_NAME);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()).format(FileFormat::Toml));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        let mut config = Self::from_config(&builder.build()?)?;
        config.config_path = resolved_path;
        Ok(config)
    }

    /// Read settings from an already-built source stack; missing keys keep
    /// their defaults.
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let registry_id = match get_string(config, "registry_id") {
            Some(value) => parse_hex32(&value).context("invalid registry_id")?,
            None => defaults.registry_id,
        };
        let treasury_account = match get_string(config, "treasury_account") {
            Some(value) => Identity::from_str(&value).context("invalid treasury_account")?,
            None => defaults.treasury_account,
        };

        let log_format = match get_string(config, "log_format") {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        let price_schedule = RegistryPriceSchedule {
            domain_register_fee: get_u64(config, "domain_register_fee")?
                .unwrap_or(defaults.price_schedule.domain_register_fee),
            domain_renew_fee_per_year: get_u64(config, "domain_renew_fee_per_year")?
                .unwrap_or(defaults.price_schedule.domain_renew_fee_per_year),
            ..defaults.price_schedule
        };

        Ok(Self {
            config_path: None,
            data_dir: get_string(config, "data_dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_level: get_string(config, "log_level").unwrap_or(defaults.log_level),
            log_format,
            registry_id,
            treasury_account,
            price_schedule,
            faucet_balance: get_u64(config, "faucet_balance")?.unwrap_or(defaults.faucet_balance),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("DATA_DIR must not be empty");
        }
        self.price_schedule
            .validate()
            .context("invalid registry price schedule")?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("registry.db")
    }
}

pub fn parse_hex32(value: &str) -> Result<[u8; 32]> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(value.trim(), &mut bytes)
        .with_context(|| format!("expected 64 hex characters, got {:?}", value))?;
    Ok(bytes)
}

fn get_string(config: &Config, key: &str) -> Option<String> {
    config
        .get_string(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_u64(config: &Config, key: &str) -> Result<Option<u64>> {
    match get_string(config, key) {
        Some(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, value)),
        None => Ok(None),
    }
}
