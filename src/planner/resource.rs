//! Decoded contract definitions.

use serde::Serialize;

use crate::error::DeployError;
use crate::ledger::{Address, AddressDeriver, Amount, StateInit};

use super::plan::Priority;

/// A contract ready to be deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDefinition {
    /// Logical name, unique within a deployment.
    pub name: String,
    /// Code and initial data.
    pub state_init: StateInit,
    /// Target workchain.
    pub workchain: i32,
    /// Value attached to the deployment message.
    pub amount: Amount,
    /// Priority of the deploy step.
    pub priority: Priority,
    /// Optional message body.
    pub payload: Option<String>,
    /// Display description.
    pub description: String,
}

impl ContractDefinition {
    /// Creates a definition with defaults for the optional fields.
    #[must_use]
    pub fn new(name: impl Into<String>, state_init: StateInit, amount: Amount) -> Self {
        Self {
            name: name.into(),
            state_init,
            workchain: 0,
            amount,
            priority: Priority::Critical,
            payload: None,
            description: String::new(),
        }
    }

    /// Derives the address this contract will occupy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResourceDefinition` for empty code or an unsupported workchain.
    pub fn address(&self) -> Result<Address, DeployError> {
        AddressDeriver::new().derive_for(&self.name, &self.state_init, self.workchain)
    }

    /// Id of the step deploying this contract.
    #[must_use]
    pub fn deploy_step_id(&self) -> String {
        format!("{DEPLOY_PREFIX}{}", self.name)
    }

    /// Id of the step verifying this contract.
    #[must_use]
    pub fn verify_step_id(&self) -> String {
        format!("{VERIFY_PREFIX}{}", self.name)
    }
}

/// Step id prefix of deployment steps.
pub const DEPLOY_PREFIX: &str = "deploy:";

/// Step id prefix of verification steps.
pub const VERIFY_PREFIX: &str = "verify:";
