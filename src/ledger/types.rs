//! Ledger data types.
//!
//! Addresses, coin amounts, and account states as observed through the
//! ledger API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Number of decimal places of one coin.
pub const COIN_DECIMALS: u32 = 9;

/// Nano-units in one coin.
pub const NANO_PER_COIN: u64 = 1_000_000_000;

/// A raw on-chain account address (`workchain:hash`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    workchain: i32,
    hash: [u8; 32],
}

impl Address {
    /// Creates an address from its parts.
    #[must_use]
    pub const fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Returns the workchain id.
    #[must_use]
    pub const fn workchain(&self) -> i32 {
        self.workchain
    }

    /// Returns the 32-byte account hash.
    #[must_use]
    pub const fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Returns the raw `workchain:hex` form.
    #[must_use]
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Returns a shortened form for display (`0:abcd…wxyz`).
    #[must_use]
    pub fn short(&self) -> String {
        let hash = hex::encode(self.hash);
        format!("{}:{}…{}", self.workchain, &hash[..4], &hash[hash.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| LedgerError::InvalidAddress {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (workchain, hash) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected 'workchain:hex' form"))?;

        let workchain: i32 = workchain
            .parse()
            .map_err(|_| invalid("workchain is not an integer"))?;

        let bytes = hex::decode(hash).map_err(|_| invalid("hash is not hex"))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| invalid("hash must be 32 bytes"))?;

        Ok(Self { workchain, hash })
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_raw()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

/// An amount of coins, stored as nano-units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from nano-units.
    #[must_use]
    pub const fn from_nano(nano: u64) -> Self {
        Self(nano)
    }

    /// Returns the amount in nano-units.
    #[must_use]
    pub const fn as_nano(self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at the maximum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts two amounts, saturating at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a count, saturating at the maximum.
    #[must_use]
    pub const fn saturating_mul(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count))
    }

    /// Parses a decimal coin string such as `"1.25"` or `"0.05"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a non-negative decimal with at
    /// most nine fractional digits, or overflows.
    pub fn parse_coins(s: &str) -> Result<Self, LedgerError> {
        let invalid = |reason: &str| LedgerError::InvalidAmount {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        if s.is_empty() {
            return Err(invalid("empty amount"));
        }

        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("only digits and a single '.' are allowed"));
        }
        if fraction.len() > COIN_DECIMALS as usize {
            return Err(invalid("more than 9 fractional digits"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };
        let padded = format!("{fraction:0<9}");
        let fraction: u64 = padded.parse().map_err(|_| invalid("bad fraction"))?;

        whole
            .checked_mul(NANO_PER_COIN)
            .and_then(|n| n.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| invalid("amount too large"))
    }
}

impl TryFrom<String> for Amount {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_coins(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANO_PER_COIN;
        let fraction = self.0 % NANO_PER_COIN;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let fraction = format!("{fraction:09}");
        write!(f, "{whole}.{}", fraction.trim_end_matches('0'))
    }
}

/// Lifecycle status of an account as reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Account holds code and data.
    Active,
    /// Account exists (or not) without code.
    #[default]
    Uninitialized,
    /// Account was frozen for unpaid storage.
    Frozen,
    /// Any state this client does not model.
    #[serde(other)]
    Unknown,
}

/// Observed state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Spendable balance.
    pub balance: Amount,
    /// Encoded account code, empty when none.
    #[serde(default)]
    pub code: String,
    /// Encoded account data, empty when none.
    #[serde(default)]
    pub data: String,
}

impl AccountState {
    /// Creates the state of an account that was never touched.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            status: AccountStatus::Uninitialized,
            balance: Amount::ZERO,
            code: String::new(),
            data: String::new(),
        }
    }

    /// Returns true if the account is active, carries code, and is funded.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.status == AccountStatus::Active && !self.code.is_empty() && !self.balance.is_zero()
    }

    /// Returns true if the account looks like a deployment that bounced.
    #[must_use]
    pub const fn looks_bounced(&self) -> bool {
        matches!(self.status, AccountStatus::Uninitialized) && self.balance.is_zero()
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Uninitialized => "uninitialized",
            Self::Frozen => "frozen",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let raw = format!("0:{}", "ab".repeat(32));
        let address: Address = raw.parse().expect("valid address");
        assert_eq!(address.workchain(), 0);
        assert_eq!(address.to_raw(), raw);

        let master: Address = format!("-1:{}", "00".repeat(32)).parse().expect("valid address");
        assert_eq!(master.workchain(), -1);
    }

    #[test]
    fn test_address_rejects_malformed() {
        assert!("abc".parse::<Address>().is_err());
        assert!("0:zz".parse::<Address>().is_err());
        assert!(format!("0:{}", "ab".repeat(31)).parse::<Address>().is_err());
        assert!(format!("x:{}", "ab".repeat(32)).parse::<Address>().is_err());
    }

    #[test]
    fn test_amount_parse() {
        assert_eq!(Amount::parse_coins("1").expect("ok").as_nano(), NANO_PER_COIN);
        assert_eq!(Amount::parse_coins("0.05").expect("ok").as_nano(), 50_000_000);
        assert_eq!(Amount::parse_coins(".5").expect("ok").as_nano(), 500_000_000);
        assert_eq!(Amount::parse_coins("0.000000001").expect("ok").as_nano(), 1);
        assert!(Amount::parse_coins("0.0000000001").is_err());
        assert!(Amount::parse_coins("-1").is_err());
        assert!(Amount::parse_coins("").is_err());
        assert!(Amount::parse_coins("1.2.3").is_err());
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_nano(1_500_000_000).to_string(), "1.5");
        assert_eq!(Amount::from_nano(2 * NANO_PER_COIN).to_string(), "2");
        assert_eq!(Amount::from_nano(50_000_000).to_string(), "0.05");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_account_state_predicates() {
        let mut state = AccountState::empty();
        assert!(state.looks_bounced());
        assert!(!state.is_deployed());

        state.status = AccountStatus::Active;
        state.balance = Amount::from_nano(10);
        assert!(!state.is_deployed(), "no code yet");

        state.code = String::from("te6cck");
        assert!(state.is_deployed());
    }

    #[test]
    fn test_account_status_unknown_variant() {
        let status: AccountStatus = serde_json::from_str("\"nonexist\"").expect("parse");
        assert_eq!(status, AccountStatus::Unknown);
    }
}
