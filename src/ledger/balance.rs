//! Funding balance checks.
//!
//! The oracle compares the spendable balance of the funding account with the
//! estimated cost of a deployment. Every call queries the ledger; nothing is
//! cached between calls.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DeployError;

use super::client::LedgerApi;
use super::types::{Address, Amount};

/// Outcome of a balance validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    /// Whether the balance covers the requirement.
    pub sufficient: bool,
    /// Balance observed on the ledger.
    pub available: Amount,
    /// Amount that was required.
    pub required: Amount,
    /// Missing amount, present only when insufficient.
    pub shortfall: Option<Amount>,
}

/// One line of a cost estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostLine {
    /// Logical contract name.
    pub resource: String,
    /// Value attached to the deployment message.
    pub amount: Amount,
    /// Fee reserved for the deployment.
    pub fee: Amount,
}

/// Estimated cost of deploying a set of contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CostEstimate {
    /// Per-contract breakdown in plan order.
    pub lines: Vec<CostLine>,
}

/// Queries balances and validates them against requirements.
pub struct BalanceOracle<'a> {
    ledger: &'a dyn LedgerApi,
}

impl<'a> BalanceOracle<'a> {
    /// Creates a balance oracle over a ledger.
    #[must_use]
    pub const fn new(ledger: &'a dyn LedgerApi) -> Self {
        Self { ledger }
    }

    /// Checks whether `account` holds at least `required`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnreachable` if the balance cannot be queried.
    pub async fn validate_balance(
        &self,
        account: &Address,
        required: Amount,
    ) -> Result<BalanceCheck, DeployError> {
        let available = self.ledger.balance(account).await.map_err(|e| {
            warn!("Balance query for {account} failed: {e}");
            DeployError::ledger_unreachable(e)
        })?;

        let check = BalanceCheck::evaluate(available, required);
        debug!(
            "Balance of {}: available {}, required {}, sufficient {}",
            account.short(),
            check.available,
            check.required,
            check.sufficient
        );
        Ok(check)
    }
}

impl BalanceCheck {
    /// Compares an observed balance with a requirement.
    #[must_use]
    pub fn evaluate(available: Amount, required: Amount) -> Self {
        let sufficient = available >= required;
        Self {
            sufficient,
            available,
            required,
            shortfall: (!sufficient).then(|| required.saturating_sub(available)),
        }
    }
}

impl CostEstimate {
    /// Creates an empty estimate.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Adds one contract to the estimate.
    pub fn add(&mut self, resource: impl Into<String>, amount: Amount, fee: Amount) {
        self.lines.push(CostLine {
            resource: resource.into(),
            amount,
            fee,
        });
    }

    /// Returns the total of attached values and fees.
    #[must_use]
    pub fn total(&self) -> Amount {
        self.lines.iter().fold(Amount::ZERO, |acc, line| {
            acc.saturating_add(line.amount).saturating_add(line.fee)
        })
    }

    /// Returns the total of reserved fees.
    #[must_use]
    pub fn total_fees(&self) -> Amount {
        self.lines
            .iter()
            .fold(Amount::ZERO, |acc, line| acc.saturating_add(line.fee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::FakeLedger;

    fn funding() -> Address {
        Address::new(0, [1u8; 32])
    }

    #[tokio::test]
    async fn test_sufficient_balance() {
        let ledger = FakeLedger::new();
        ledger.set_balance(funding(), Amount::from_nano(5_000));

        let oracle = BalanceOracle::new(&ledger);
        let check = oracle
            .validate_balance(&funding(), Amount::from_nano(4_000))
            .await
            .expect("check");

        assert!(check.sufficient);
        assert_eq!(check.shortfall, None);
    }

    #[tokio::test]
    async fn test_insufficient_balance_reports_shortfall() {
        let ledger = FakeLedger::new();
        ledger.set_balance(funding(), Amount::from_nano(1_000));

        let oracle = BalanceOracle::new(&ledger);
        let check = oracle
            .validate_balance(&funding(), Amount::from_nano(4_000))
            .await
            .expect("check");

        assert!(!check.sufficient);
        assert_eq!(check.available, Amount::from_nano(1_000));
        assert_eq!(check.shortfall, Some(Amount::from_nano(3_000)));
    }

    #[tokio::test]
    async fn test_unreachable_ledger() {
        let ledger = FakeLedger::new();
        ledger.fail_all_queries();

        let oracle = BalanceOracle::new(&ledger);
        let err = oracle
            .validate_balance(&funding(), Amount::from_nano(1))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), ErrorKind::LedgerUnreachable);
    }

    #[tokio::test]
    async fn test_each_call_queries_the_ledger() {
        let ledger = FakeLedger::new();
        ledger.set_balance(funding(), Amount::from_nano(10));
        let oracle = BalanceOracle::new(&ledger);

        oracle.validate_balance(&funding(), Amount::ZERO).await.expect("first");
        oracle.validate_balance(&funding(), Amount::ZERO).await.expect("second");

        assert_eq!(ledger.query_count(&funding()), 2);
    }

    #[test]
    fn test_cost_estimate_totals() {
        let mut estimate = CostEstimate::new();
        estimate.add("a", Amount::from_nano(100), Amount::from_nano(10));
        estimate.add("b", Amount::from_nano(200), Amount::from_nano(10));

        assert_eq!(estimate.total(), Amount::from_nano(320));
        assert_eq!(estimate.total_fees(), Amount::from_nano(20));
    }
}
