//! Configuration parser for loading deployment definitions.
//!
//! This module handles loading configuration from YAML files, the `.env`
//! file, and environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, HalldyllError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeployConfig;

/// Overrides the funding address.
pub const ENV_FUNDING_ADDRESS: &str = "HALLDYLL_FUNDING_ADDRESS";

/// Overrides the ledger endpoint.
pub const ENV_LEDGER_ENDPOINT: &str = "HALLDYLL_LEDGER_ENDPOINT";

/// Overrides the wallet bridge URL.
pub const ENV_WALLET_BRIDGE: &str = "HALLDYLL_WALLET_BRIDGE";

/// Supplies the ledger API key when the file has none.
pub const ENV_LEDGER_API_KEY: &str = "LEDGER_API_KEY";

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(HalldyllError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            HalldyllError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML configuration");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            HalldyllError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration for project {} with {} contracts",
            config.project.name,
            config.contracts.len()
        );
        Ok(config)
    }

    /// Loads configuration and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let mut config = self.load_file(path)?;
        apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                HalldyllError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Applies environment overrides using `lookup` to read variables.
pub fn apply_overrides(config: &mut DeployConfig, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(address) = read(ENV_FUNDING_ADDRESS) {
        debug!("Overriding wallet.funding_address from environment");
        config.wallet.funding_address = address;
    }

    if let Some(endpoint) = read(ENV_LEDGER_ENDPOINT) {
        debug!("Overriding network.endpoint from environment");
        config.network.endpoint = endpoint;
    }

    if let Some(bridge) = read(ENV_WALLET_BRIDGE) {
        debug!("Overriding wallet.bridge_url from environment");
        config.wallet.bridge_url = Some(bridge);
    }

    if config.network.api_key.is_none() {
        config.network.api_key = read(ENV_LEDGER_API_KEY);
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "halldyll.contracts.yaml",
    "halldyll.contracts.yml",
    "contracts.yaml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(HalldyllError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalanceCheckPolicy;
    use crate::planner::Priority;
    use std::collections::HashMap;

    const MINIMAL: &str = r"
project:
  name: music-catalogue
network:
  endpoint: https://testnet.example.org/api/v2
contracts:
  - name: registry
    code: b5ee9c72
    amount: '0.05'
";

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("minimal config parses");

        assert_eq!(config.project.name, "music-catalogue");
        assert_eq!(config.project.environment, "testnet");
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.contracts[0].workchain, 0);
        assert_eq!(config.contracts[0].priority, Priority::Critical);
        assert_eq!(config.confirmation.max_attempts, 60);
        assert_eq!(config.policy.balance_check, BalanceCheckPolicy::Blocking);
        assert_eq!(config.policy.fee_reserve, "0.05");
        assert!(config.policy.verify_after_deploy);
        assert!(config.phases.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
project:
  name: music-catalogue
  environment: mainnet
network:
  endpoint: https://ledger.example.org/api/v2
  api_key: secret
  timeout_secs: 10
wallet:
  funding_address: '0:0101010101010101010101010101010101010101010101010101010101010101'
  bridge_url: http://127.0.0.1:8787
contracts:
  - name: registry
    code: b5ee9c72
    data: '00'
    amount: '0.1'
    description: Track registry
  - name: royalties
    code: b5ee9c73
    workchain: -1
    amount: '0.2'
    priority: high
confirmation:
  max_attempts: 30
  poll_interval_secs: 3
  timeout_secs: 90
policy:
  balance_check: advisory
  fee_reserve: '0.1'
  verify_after_deploy: false
  pacing_ms: 500
state:
  path: /var/lib/halldyll
phases:
  - id: deployment
    name: Deployment
    steps:
      - id: deploy:registry
        estimated_secs: 30
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parses");

        assert_eq!(config.contract_names(), vec!["registry", "royalties"]);
        assert_eq!(config.contracts[1].priority, Priority::High);
        assert_eq!(config.policy.balance_check, BalanceCheckPolicy::Advisory);
        assert_eq!(config.report_dir(), PathBuf::from("/var/lib/halldyll"));
        assert_eq!(config.funding_address().expect("address").workchain(), 0);

        let phases = config.phases.expect("explicit plan");
        assert_eq!(phases[0].steps[0].id, "deploy:registry");
        assert_eq!(phases[0].steps[0].priority, Priority::Critical);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ConfigParser::new()
            .parse_yaml("project: [", None)
            .expect_err("invalid");
        assert!(matches!(err, HalldyllError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).expect("parses");
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_FUNDING_ADDRESS, "0:abc"),
            (ENV_WALLET_BRIDGE, "http://bridge"),
            (ENV_LEDGER_API_KEY, "k"),
            (ENV_LEDGER_ENDPOINT, "  "),
        ]);

        apply_overrides(&mut config, |name| vars.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.wallet.funding_address, "0:abc");
        assert_eq!(config.wallet.bridge_url.as_deref(), Some("http://bridge"));
        assert_eq!(config.network.api_key.as_deref(), Some("k"));
        assert_eq!(config.network.endpoint, "https://testnet.example.org/api/v2");
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(temp.path().join("contracts.yaml"), MINIMAL).expect("write");

        let found = find_config_file(&nested).expect("found");
        assert_eq!(found, temp.path().join("contracts.yaml"));
    }
}
