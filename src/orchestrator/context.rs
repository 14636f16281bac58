//! Per-run accumulating state.

use std::collections::BTreeMap;

use tracing::warn;

use crate::ledger::Address;

/// State accumulated by one run and threaded through every step.
///
/// Each run owns its own context, so concurrent runs never share results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    funding_address: Address,
    resource_addresses: BTreeMap<String, Address>,
    expected_addresses: BTreeMap<String, Address>,
    warnings: Vec<String>,
}

impl RunContext {
    /// Creates an empty context for a funding account.
    #[must_use]
    pub const fn new(funding_address: Address) -> Self {
        Self {
            funding_address,
            resource_addresses: BTreeMap::new(),
            expected_addresses: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns the funding account.
    #[must_use]
    pub const fn funding_address(&self) -> &Address {
        &self.funding_address
    }

    /// Records a confirmed contract address.
    pub fn record_address(&mut self, resource: impl Into<String>, address: Address) {
        self.resource_addresses.insert(resource.into(), address);
    }

    /// Returns the confirmed address of a contract.
    #[must_use]
    pub fn address_of(&self, resource: &str) -> Option<&Address> {
        self.resource_addresses.get(resource)
    }

    /// Returns every confirmed address.
    #[must_use]
    pub const fn resource_addresses(&self) -> &BTreeMap<String, Address> {
        &self.resource_addresses
    }

    /// Records the derived address of a contract before deployment.
    pub fn expect_address(&mut self, resource: impl Into<String>, address: Address) {
        self.expected_addresses.insert(resource.into(), address);
    }

    /// Returns the derived address of a contract, if validated.
    #[must_use]
    pub fn expected_address(&self, resource: &str) -> Option<&Address> {
        self.expected_addresses.get(resource)
    }

    /// Appends a run warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Returns the run warnings.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consumes the context into its confirmed addresses and warnings.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, Address>, Vec<String>) {
        (self.resource_addresses, self.warnings)
    }
}
