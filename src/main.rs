//! Halldyll contracts CLI entrypoint.
//!
//! This is the main entrypoint for the halldyll-contracts command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use halldyll_deploy_contracts::cli::{Cli, Commands, OutputFormat, OutputFormatter, StateCommands};
use halldyll_deploy_contracts::config::{
    find_config_file, ConfigParser, ConfigValidator, DeployConfig,
};
use halldyll_deploy_contracts::error::{HalldyllError, Result};
use halldyll_deploy_contracts::ledger::{Address, BalanceOracle, LedgerClient, SystemClock};
use halldyll_deploy_contracts::orchestrator::{DeploymentOrchestrator, RunSettings, TracingObserver};
use halldyll_deploy_contracts::planner::{ContractDefinition, PlanBuilder};
use halldyll_deploy_contracts::state::{generate_holder_id, LocalReportStore, ReportStore};
use halldyll_deploy_contracts::wallet::{HttpWalletSigner, Signer};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: OutputFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Plan => cmd_plan(config_path, &formatter),
        Commands::Address { contract } => cmd_address(config_path, contract.as_deref(), &formatter),
        Commands::Balance => cmd_balance(config_path, &formatter).await,
        Commands::Apply { yes } => cmd_apply(config_path, yes, &formatter).await,
        Commands::State { command } => cmd_state(config_path, command, &formatter).await,
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new Halldyll contracts project in: {}", path.display());

    let config_path = path.join("halldyll.contracts.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/halldyll.contracts.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    let gitignore_content = ".env\n.halldyll/\n";
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") || !existing.contains(".halldyll") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Halldyll")?;
            if !existing.contains(".env") {
                writeln!(file, ".env")?;
            }
            if !existing.contains(".halldyll") {
                writeln!(file, ".halldyll/")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, gitignore_content)?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and set the funding wallet and bridge");
    eprintln!("  2. Put your compiled contracts in halldyll.contracts.yaml");
    eprintln!("  3. Run 'halldyll-contracts validate' to check your configuration");
    eprintln!("  4. Run 'halldyll-contracts plan' to review phases, addresses, and cost");
    eprintln!("  5. Run 'halldyll-contracts apply' to deploy");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().check(&config);
    println!("{}", formatter.format_validation(&config, &result, show_warnings));

    if result.is_valid() {
        Ok(())
    } else {
        Err(HalldyllError::internal(format!(
            "Configuration has {} error(s)",
            result.error_count()
        )))
    }
}

/// Show the deployment plan.
fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _config_file) = load_config(config_path)?;
    let contracts = config.contract_definitions()?;
    let settings = RunSettings::from_config(&config)?;

    let plan = PlanBuilder::for_config(&config, &contracts);
    let addresses = derive_addresses(&contracts)?;
    let estimate = settings.estimate(&contracts);

    println!("{}", formatter.format_plan(&plan, &addresses, &estimate));
    Ok(())
}

/// Show derived contract addresses.
fn cmd_address(
    config_path: Option<&PathBuf>,
    contract: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _config_file) = load_config(config_path)?;
    let mut contracts = config.contract_definitions()?;

    if let Some(name) = contract {
        contracts.retain(|c| c.name == name);
        if contracts.is_empty() {
            return Err(HalldyllError::internal(format!("Unknown contract: {name}")));
        }
    }

    let addresses = derive_addresses(&contracts)?;
    println!("{}", formatter.format_addresses(&addresses));
    Ok(())
}

/// Check the funding balance against the estimated cost.
async fn cmd_balance(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _config_file) = load_config(config_path)?;
    let contracts = config.contract_definitions()?;
    let settings = RunSettings::from_config(&config)?;
    let funding = config.funding_address()?;

    let client = create_ledger_client(&config)?;
    let estimate = settings.estimate(&contracts);
    let check = BalanceOracle::new(&client)
        .validate_balance(&funding, estimate.total())
        .await?;

    println!("{}", formatter.format_balance(&funding, &check, &estimate));
    Ok(())
}

/// Run the deployment plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let contracts = config.contract_definitions()?;
    let settings = RunSettings::from_config(&config)?;
    let funding = config.funding_address()?;

    let plan = PlanBuilder::for_config(&config, &contracts);
    let addresses = derive_addresses(&contracts)?;
    let estimate = settings.estimate(&contracts);

    println!("{}", formatter.format_plan(&plan, &addresses, &estimate));

    // Confirm
    if !auto_approve {
        eprint!("Do you want to run this deployment? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(());
        }
    }

    let client = create_ledger_client(&config)?;
    let signer = match config.wallet.bridge_url.as_deref() {
        Some(url) => Some(HttpWalletSigner::with_timeout(
            url,
            funding,
            config.wallet.request_timeout_secs,
        )?),
        None => {
            warn!("No wallet bridge configured; the wallet check will fail");
            None
        }
    };

    let store = report_store(&config, &config_file);
    let lock = store.acquire_lock(&funding, &generate_holder_id()).await?;
    debug!("Acquired run lock {}", lock.lock_id);

    let clock = SystemClock::new();
    let orchestrator = DeploymentOrchestrator::new(plan, &client, &clock, contracts, settings);
    let outcome = orchestrator
        .execute(
            funding,
            signer.as_ref().map(|s| s as &dyn Signer),
            &TracingObserver,
        )
        .await;

    let (report, failure) = match outcome {
        Ok(report) => (report, None),
        Err(failure) => (*failure.report, Some(failure.error)),
    };

    let saved = store.save(&report).await;
    store.release_lock(&funding, &lock.lock_id).await?;
    saved?;
    info!("Report saved as {}", report.deployment_id);

    println!("{}", formatter.format_report(&report));

    match failure {
        Some(error) => Err(HalldyllError::Deploy(error)),
        None => Ok(()),
    }
}

/// Report and lock commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let store = report_store(&config, &config_file);

    match command {
        StateCommands::List => {
            let reports = store.list().await?;
            println!("{}", formatter.format_report_list(&reports));
        }
        StateCommands::Show { id } => {
            let report = match id {
                Some(id) => Some(store.load(&id).await?),
                None => store.latest().await?,
            };
            match report {
                Some(report) => println!("{}", formatter.format_report(&report)),
                None => eprintln!("No deployments recorded."),
            }
        }
        StateCommands::Unlock { force } => {
            let funding = config.funding_address()?;
            match store.get_lock_info(&funding).await? {
                None => eprintln!("Funding wallet is not locked."),
                Some(lock) if force || lock.is_expired() => {
                    store.force_unlock(&funding).await?;
                    eprintln!("Removed lock held by {}.", lock.holder);
                }
                Some(lock) => {
                    eprintln!(
                        "Lock held by {} expires in {}s. Use --force to remove it anyway.",
                        lock.holder,
                        lock.remaining_secs()
                    );
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Returns the directory holding the configuration file.
fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new("."))
}

/// Loads and validates the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<(DeployConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, config_file))
}

/// Opens the report store next to the configuration file.
fn report_store(config: &DeployConfig, config_file: &Path) -> LocalReportStore {
    LocalReportStore::with_base_dir(config_dir(config_file).join(config.report_dir()))
}

/// Creates a ledger client from the network section.
fn create_ledger_client(config: &DeployConfig) -> Result<LedgerClient> {
    LedgerClient::with_timeout(
        &config.network.endpoint,
        config.network.api_key.clone(),
        config.network.timeout_secs,
    )
}

/// Derives the address of every contract.
fn derive_addresses(contracts: &[ContractDefinition]) -> Result<Vec<(String, Address)>> {
    contracts
        .iter()
        .map(|c| Ok((c.name.clone(), c.address()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use halldyll_deploy_contracts::ledger::{Amount, Clock, StateInit};

    fn contract(name: &str) -> ContractDefinition {
        let state_init = StateInit {
            code: format!("code:{name}").into_bytes(),
            data: b"init".to_vec(),
        };
        ContractDefinition::new(name, state_init, Amount::from_nano(1))
    }

    #[test]
    fn test_derive_addresses_keeps_contract_order() {
        let contracts = vec![contract("registry"), contract("vault")];
        let addresses = derive_addresses(&contracts).expect("addresses");

        let names: Vec<&str> = addresses.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["registry", "vault"]);
        assert_ne!(addresses[0].1, addresses[1].1);
    }

    #[test]
    fn test_report_store_lives_next_to_config() {
        let config = ConfigParser::new()
            .parse_yaml(
                "project:\n  name: demo\nnetwork:\n  endpoint: http://localhost\ncontracts: []\n",
                None,
            )
            .expect("config");

        let store = report_store(&config, Path::new("/srv/app/halldyll.contracts.yaml"));
        assert_eq!(store.base_dir(), Path::new("/srv/app/.halldyll/deployments"));
    }

    #[tokio::test]
    async fn test_apply_clock_is_anchored_now() {
        let before = chrono::Utc::now();
        let clock = SystemClock::new();
        assert!(clock.now() >= before);
    }
}
