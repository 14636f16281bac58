//! Work functions behind the step registry.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::BalanceCheckPolicy;
use crate::error::{DeployError, PreconditionError};
use crate::ledger::{Address, BalanceOracle, Clock, ConfirmationPoller, LedgerApi};
use crate::planner::{ContractDefinition, StepAction, StepHandler};
use crate::wallet::{Signer, TransactionSubmitter};

use super::context::RunContext;
use super::settings::RunSettings;

/// Services borrowed by one run.
pub struct RunActions<'a> {
    ledger: &'a dyn LedgerApi,
    clock: &'a dyn Clock,
    signer: Option<&'a dyn Signer>,
    contracts: &'a [ContractDefinition],
    settings: &'a RunSettings,
}

impl<'a> RunActions<'a> {
    /// Creates the action set for one run.
    #[must_use]
    pub const fn new(
        ledger: &'a dyn LedgerApi,
        clock: &'a dyn Clock,
        signer: Option<&'a dyn Signer>,
        contracts: &'a [ContractDefinition],
        settings: &'a RunSettings,
    ) -> Self {
        Self {
            ledger,
            clock,
            signer,
            contracts,
            settings,
        }
    }

    fn contract(&self, name: &str) -> Result<&'a ContractDefinition, DeployError> {
        self.contracts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DeployError::invalid_resource(name, "no contract with this name"))
    }

    fn signer(&self) -> Result<&'a dyn Signer, DeployError> {
        self.signer
            .ok_or(DeployError::PreconditionFailed(PreconditionError::WalletNotConnected))
    }

    fn check_wallet(&self, ctx: &mut RunContext) -> Result<String, DeployError> {
        let signer = self.signer()?;
        match signer.wallet_address() {
            Some(address) if address != *ctx.funding_address() => {
                ctx.warn(format!(
                    "Connected wallet {} differs from funding address {}",
                    address.short(),
                    ctx.funding_address().short()
                ));
                Ok(format!("connected as {address}"))
            }
            Some(address) => Ok(format!("connected as {address}")),
            None => Ok(String::from("connected")),
        }
    }

    async fn check_balance(&self, ctx: &mut RunContext) -> Result<String, DeployError> {
        let estimate = self.settings.estimate(self.contracts);
        let required = estimate.total();
        let funding = *ctx.funding_address();

        let check = match BalanceOracle::new(self.ledger)
            .validate_balance(&funding, required)
            .await
        {
            Ok(check) => check,
            Err(e @ DeployError::LedgerUnreachable { .. })
                if self.settings.balance_policy == BalanceCheckPolicy::Advisory =>
            {
                ctx.warn(format!("Balance check skipped: {e}"));
                return Ok(format!("skipped (required {required})"));
            }
            Err(e) => return Err(e),
        };

        match check.shortfall {
            Some(shortfall) => Err(PreconditionError::InsufficientBalance {
                required,
                available: check.available,
                shortfall,
            }
            .into()),
            None => Ok(format!("available {}, required {required}", check.available)),
        }
    }

    fn validate_definitions(&self, ctx: &mut RunContext) -> Result<String, DeployError> {
        for contract in self.contracts {
            let address = contract.address()?;
            debug!("'{}' will deploy to {address}", contract.name);
            ctx.expect_address(contract.name.clone(), address);
        }
        Ok(format!("{} definitions valid", self.contracts.len()))
    }

    async fn deploy(&self, name: &str, ctx: &mut RunContext) -> Result<String, DeployError> {
        let contract = self.contract(name)?;
        let signer = self.signer()?;
        let address = match ctx.expected_address(name) {
            Some(address) => *address,
            None => contract.address()?,
        };

        if self.already_deployed(&address).await {
            info!("'{name}' is already deployed at {address}; skipping submission");
            ctx.record_address(name, address);
            return Ok(format!("{address} (already deployed)"));
        }

        TransactionSubmitter::new(signer, self.clock, self.settings.valid_for)
            .submit(
                name,
                address,
                contract.amount,
                &contract.state_init,
                contract.payload.as_deref(),
            )
            .await?;

        let outcome = ConfirmationPoller::new(self.ledger, self.clock, self.settings.poll)
            .await_confirmation(&address)
            .await;
        if !outcome.confirmed {
            return Err(DeployError::ConfirmationTimeout {
                address,
                attempts: outcome.attempts,
            });
        }

        ctx.record_address(name, address);

        if !self.settings.pacing.is_zero() {
            debug!("Pacing for {:?}", self.settings.pacing);
            self.clock.sleep(self.settings.pacing).await;
        }

        Ok(address.to_string())
    }

    async fn already_deployed(&self, address: &Address) -> bool {
        match self.ledger.account_state(address).await {
            Ok(state) => state.is_deployed(),
            Err(e) => {
                warn!("Could not check {} before deploying: {e}", address.short());
                false
            }
        }
    }

    async fn verify(&self, name: &str, ctx: &RunContext) -> Result<String, DeployError> {
        let address = ctx.address_of(name).copied().ok_or_else(|| {
            DeployError::VerificationFailed {
                resource: name.to_string(),
                message: String::from("no confirmed address recorded"),
            }
        })?;

        let state = self
            .ledger
            .account_state(&address)
            .await
            .map_err(DeployError::ledger_unreachable)?;

        if state.is_deployed() {
            Ok(format!("{} with balance {}", state.status, state.balance))
        } else {
            Err(DeployError::VerificationFailed {
                resource: name.to_string(),
                message: format!(
                    "account at {address} is {} with balance {}",
                    state.status, state.balance
                ),
            })
        }
    }

    fn finalize(ctx: &RunContext) -> String {
        let addresses = ctx.resource_addresses();
        if addresses.is_empty() {
            return String::from("no contracts deployed");
        }
        let names: Vec<&str> = addresses.keys().map(String::as_str).collect();
        format!("{} contract(s) deployed: {}", addresses.len(), names.join(", "))
    }
}

#[async_trait]
impl<'a> StepHandler for RunActions<'a> {
    async fn perform(
        &self,
        action: &StepAction,
        ctx: &mut RunContext,
    ) -> Result<String, DeployError> {
        match action {
            StepAction::CheckWallet => self.check_wallet(ctx),
            StepAction::CheckBalance => self.check_balance(ctx).await,
            StepAction::ValidateDefinitions => self.validate_definitions(ctx),
            StepAction::Deploy(name) => self.deploy(name, ctx).await,
            StepAction::Verify(name) => self.verify(name, ctx).await,
            StepAction::Finalize => Ok(Self::finalize(ctx)),
        }
    }
}
