//! Shared test doubles.
//!
//! A scripted in-memory ledger, a recording signer and observer, and a step
//! handler whose outcomes are set per step id.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{DeployError, HalldyllError, LedgerError, Result, WalletError};
use crate::ledger::{AccountState, AccountStatus, Address, Amount, Clock, LedgerApi, StateInit};
use crate::orchestrator::{ProgressObserver, RunContext};
use crate::planner::{ContractDefinition, Phase, Status, Step, StepAction, StepHandler};
use crate::wallet::{DeploymentMessage, Signer, SubmissionReceipt};

/// Builds a valid contract whose code is unique to its name.
pub fn contract(name: &str) -> ContractDefinition {
    let state_init = StateInit {
        code: format!("code:{name}").into_bytes(),
        data: b"init".to_vec(),
    };
    ContractDefinition::new(name, state_init, Amount::from_nano(100_000_000))
}

#[derive(Debug, Default)]
struct Script {
    states: HashMap<Address, AccountState>,
    pending: HashMap<Address, VecDeque<AccountState>>,
    failures: HashMap<Address, u32>,
    queries: HashMap<Address, u32>,
    later: HashMap<Address, (u32, AccountState)>,
    fail_all: bool,
}

/// In-memory ledger with scripted account states.
///
/// Unknown addresses read as never-touched accounts.
#[derive(Debug, Default)]
pub struct FakeLedger {
    script: Mutex<Script>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, address: Address, state: AccountState) {
        self.with_script(|s| {
            s.states.insert(address, state);
        });
    }

    /// Sets an active wallet account with the given balance.
    pub fn set_balance(&self, address: Address, balance: Amount) {
        self.set_state(
            address,
            AccountState {
                status: AccountStatus::Active,
                balance,
                code: String::from("wallet"),
                data: String::new(),
            },
        );
    }

    /// Answers `unconfirmed` empty states, then a deployed one for good.
    pub fn confirm_after(&self, address: Address, unconfirmed: usize, balance: Amount) {
        self.with_script(|s| {
            s.pending
                .insert(address, std::iter::repeat_n(AccountState::empty(), unconfirmed).collect());
            s.states.insert(
                address,
                AccountState {
                    status: AccountStatus::Active,
                    balance,
                    code: String::from("code"),
                    data: String::from("data"),
                },
            );
        });
    }

    /// Answers `state` for every query of `address` after the first `after`.
    pub fn set_state_after(&self, address: Address, after: u32, state: AccountState) {
        self.with_script(|s| {
            s.later.insert(address, (after, state));
        });
    }

    /// Makes the next `count` queries of an address fail.
    pub fn fail_next_queries(&self, address: Address, count: u32) {
        self.with_script(|s| {
            s.failures.insert(address, count);
        });
    }

    pub fn fail_all_queries(&self) {
        self.with_script(|s| s.fail_all = true);
    }

    pub fn query_count(&self, address: &Address) -> u32 {
        self.with_script(|s| s.queries.get(address).copied().unwrap_or_default())
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().expect("ledger script poisoned");
        f(&mut script)
    }
}

#[async_trait]
impl LedgerApi for FakeLedger {
    async fn account_state(&self, address: &Address) -> Result<AccountState> {
        self.with_script(|s| {
            let count = s.queries.entry(*address).or_default();
            *count += 1;
            let count = *count;

            let scripted_failure = s.failures.get_mut(address).is_some_and(|left| {
                if *left == 0 {
                    return false;
                }
                *left -= 1;
                true
            });
            if s.fail_all || scripted_failure {
                return Err(HalldyllError::Ledger(LedgerError::network("connection refused")));
            }

            if let Some((_, state)) = s.later.get(address).filter(|(after, _)| count > *after) {
                return Ok(state.clone());
            }
            if let Some(state) = s.pending.get_mut(address).and_then(VecDeque::pop_front) {
                return Ok(state);
            }
            Ok(s.states.get(address).cloned().unwrap_or_else(AccountState::empty))
        })
    }
}

/// Ledger whose queries never return.
#[derive(Debug, Default, Clone, Copy)]
pub struct HangingLedger;

#[async_trait]
impl LedgerApi for HangingLedger {
    async fn account_state(&self, _address: &Address) -> Result<AccountState> {
        std::future::pending().await
    }
}

/// Signer that records every message it is handed.
#[derive(Debug, Default)]
pub struct FakeSigner {
    address: Option<Address>,
    failure: Option<WalletError>,
    messages: Mutex<Vec<DeploymentMessage>>,
}

impl FakeSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(address: Address) -> Self {
        Self {
            address: Some(address),
            ..Self::default()
        }
    }

    /// Signer that fails every submission with `error`.
    pub fn failing(error: WalletError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<DeploymentMessage> {
        self.messages.lock().expect("signer poisoned").clone()
    }
}

#[async_trait]
impl Signer for FakeSigner {
    fn wallet_address(&self) -> Option<Address> {
        self.address
    }

    async fn sign_and_submit(
        &self,
        message: &DeploymentMessage,
    ) -> std::result::Result<SubmissionReceipt, WalletError> {
        let mut messages = self.messages.lock().expect("signer poisoned");
        messages.push(message.clone());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(SubmissionReceipt {
                message_hash: format!("hash-{}", messages.len()),
                submitted_at: Utc::now(),
            }),
        }
    }
}

/// Observer that records every transition.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    phases: Mutex<Vec<(String, Status)>>,
    steps: Mutex<Vec<(String, Status)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase_events(&self) -> Vec<(String, Status)> {
        self.phases.lock().expect("observer poisoned").clone()
    }

    pub fn step_events(&self) -> Vec<(String, Status)> {
        self.steps.lock().expect("observer poisoned").clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_phase_update(&self, phase: &Phase) {
        self.phases
            .lock()
            .expect("observer poisoned")
            .push((phase.id.clone(), phase.status));
    }

    fn on_step_update(&self, step: &Step) {
        self.steps
            .lock()
            .expect("observer poisoned")
            .push((step.id.clone(), step.status));
    }
}

/// Step handler with per-id scripted outcomes.
///
/// Steps succeed with `"<id> done"` unless scripted to fail.
pub struct ScriptedHandler<'a> {
    delay: Option<(&'a dyn Clock, Duration)>,
    failures: HashMap<String, DeployError>,
    performed: Mutex<Vec<String>>,
}

impl<'a> ScriptedHandler<'a> {
    pub fn new() -> Self {
        Self {
            delay: None,
            failures: HashMap::new(),
            performed: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps on `clock` for `delay` inside every step.
    pub fn with_delay(mut self, clock: &'a dyn Clock, delay: Duration) -> Self {
        self.delay = Some((clock, delay));
        self
    }

    pub fn failing(mut self, id: &str, error: DeployError) -> Self {
        self.failures.insert(id.to_string(), error);
        self
    }

    /// Ids of the actions performed, in order.
    pub fn performed(&self) -> Vec<String> {
        self.performed.lock().expect("handler poisoned").clone()
    }
}

#[async_trait]
impl StepHandler for ScriptedHandler<'_> {
    async fn perform(
        &self,
        action: &StepAction,
        _ctx: &mut RunContext,
    ) -> std::result::Result<String, DeployError> {
        let id = action.id();
        self.performed
            .lock()
            .expect("handler poisoned")
            .push(id.clone());

        if let Some((clock, delay)) = self.delay {
            clock.sleep(delay).await;
        }

        match self.failures.get(&id) {
            Some(error) => Err(error.clone()),
            None => Ok(format!("{id} done")),
        }
    }
}
