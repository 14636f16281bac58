//! Deterministic contract address derivation.
//!
//! A contract's address is fixed by its code, its initial data, and the
//! workchain it lives in, so it is known before any transaction is sent.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DeployError;

use super::types::Address;

/// Domain separator mixed into every derivation.
const DERIVATION_TAG: &[u8] = b"halldyll/state-init/v1";

/// Workchains a contract may be deployed to.
pub const SUPPORTED_WORKCHAINS: &[i32] = &[0, -1];

/// Code and initial data of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInit {
    /// Hex-encoded contract code.
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
    /// Hex-encoded initial data.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// Derives contract addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressDeriver;

impl AddressDeriver {
    /// Creates a new address deriver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the address a contract will occupy once deployed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResourceDefinition` if the code is empty or the
    /// workchain is not supported.
    pub fn derive_address(
        &self,
        resource: &str,
        code: &[u8],
        initial_state: &[u8],
        workchain: i32,
    ) -> Result<Address, DeployError> {
        if code.is_empty() {
            return Err(DeployError::invalid_resource(resource, "contract code is empty"));
        }
        if !SUPPORTED_WORKCHAINS.contains(&workchain) {
            return Err(DeployError::invalid_resource(
                resource,
                format!("unsupported workchain {workchain}"),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_TAG);
        hasher.update(workchain.to_be_bytes());
        hasher.update((code.len() as u64).to_be_bytes());
        hasher.update(code);
        hasher.update((initial_state.len() as u64).to_be_bytes());
        hasher.update(initial_state);

        Ok(Address::new(workchain, hasher.finalize().into()))
    }

    /// Computes the address for a state init.
    ///
    /// # Errors
    ///
    /// See [`AddressDeriver::derive_address`].
    pub fn derive_for(
        &self,
        resource: &str,
        state_init: &StateInit,
        workchain: i32,
    ) -> Result<Address, DeployError> {
        self.derive_address(resource, &state_init.code, &state_init.data, workchain)
    }
}

/// Serde helpers for hex-encoded byte vectors.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = AddressDeriver::new();
        let a = deriver.derive_address("c", b"code", b"data", 0).expect("derive");
        let b = deriver.derive_address("c", b"code", b"data", 0).expect("derive");
        assert_eq!(a, b);
        assert_eq!(a.workchain(), 0);
    }

    #[test]
    fn test_every_input_changes_the_address() {
        let deriver = AddressDeriver::new();
        let base = deriver.derive_address("c", b"code", b"data", 0).expect("derive");

        assert_ne!(base, deriver.derive_address("c", b"code2", b"data", 0).expect("derive"));
        assert_ne!(base, deriver.derive_address("c", b"code", b"data2", 0).expect("derive"));
        assert_ne!(base, deriver.derive_address("c", b"code", b"data", -1).expect("derive"));
    }

    #[test]
    fn test_length_prefix_prevents_boundary_collisions() {
        let deriver = AddressDeriver::new();
        let a = deriver.derive_address("c", b"ab", b"c", 0).expect("derive");
        let b = deriver.derive_address("c", b"a", b"bc", 0).expect("derive");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_inputs() {
        let deriver = AddressDeriver::new();

        let err = deriver.derive_address("c", b"", b"data", 0).expect_err("empty code");
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let err = deriver.derive_address("c", b"code", b"", 7).expect_err("bad workchain");
        assert!(err.to_string().contains("workchain 7"));
    }

    #[test]
    fn test_state_init_hex_serde() {
        let init = StateInit {
            code: vec![0xde, 0xad],
            data: vec![],
        };
        let json = serde_json::to_string(&init).expect("serialize");
        assert_eq!(json, r#"{"code":"dead","data":""}"#);

        let back: StateInit = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, init);
    }
}
