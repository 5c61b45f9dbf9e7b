//! Scriptable in-process wallet for exercising the session controller.

use crate::errors::{ProviderError, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE};
use crate::provider::{ProviderEvent, WalletProvider};
use crate::registry::{AddChainParameters, ChainId, parse_hex_chain_id};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{broadcast, oneshot};

/// A provider call, as recorded by [`MockWallet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    RequestAccounts,
    GetAccounts,
    GetBalance,
    GetChainId,
    SwitchChain(String),
    AddChain(String),
    Disconnect,
    Reset,
}

#[derive(Debug)]
struct MockState {
    installed: bool,
    reject_requests: bool,
    authorized: bool,
    accounts: Vec<Address>,
    chain_id: ChainId,
    known_chains: BTreeSet<ChainId>,
    balances: HashMap<ChainId, U256>,
    reject_switch: bool,
    reject_add: bool,
    fail_reads: bool,
    fail_disconnect: bool,
    gate_balance_reads: bool,
    pending_balance_reads: Vec<Option<oneshot::Sender<()>>>,
    gate_account_requests: bool,
    pending_account_requests: Vec<Option<oneshot::Sender<()>>>,
    calls: Vec<MockCall>,
}

/// In-memory wallet whose answers are set by the test.
///
/// The wallet starts on `chain_id`, knows only that chain, and exposes
/// `account` once a connection request is approved. Every knob takes `&self`
/// so it can be turned while the wallet is shared with a controller.
#[derive(Debug)]
pub struct MockWallet {
    state: Mutex<MockState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockWallet {
    pub fn new(account: Address, chain_id: ChainId) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(MockState {
                installed: true,
                reject_requests: false,
                authorized: false,
                accounts: vec![account],
                chain_id,
                known_chains: BTreeSet::from([chain_id]),
                balances: HashMap::new(),
                reject_switch: false,
                reject_add: false,
                fail_reads: false,
                fail_disconnect: false,
                gate_balance_reads: false,
                pending_balance_reads: Vec::new(),
                gate_account_requests: false,
                pending_account_requests: Vec::new(),
                calls: Vec::new(),
            }),
            events,
        }
    }

    /// A wallet that is not there: every call fails with [`ProviderError::NotAvailable`]
    pub fn not_installed() -> Self {
        let wallet = Self::new(Address::ZERO, 1);
        wallet.state.lock().installed = false;
        wallet
    }

    pub fn set_balance(&self, chain_id: ChainId, balance: U256) {
        self.state.lock().balances.insert(chain_id, balance);
    }

    /// Moves the wallet to `chain_id` without emitting an event
    pub fn set_chain(&self, chain_id: ChainId) {
        let mut state = self.state.lock();
        state.chain_id = chain_id;
        state.known_chains.insert(chain_id);
    }

    pub fn know_chain(&self, chain_id: ChainId) {
        self.state.lock().known_chains.insert(chain_id);
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().accounts = accounts;
    }

    /// Exposes accounts without a prompt, as after an earlier approval
    pub fn authorize(&self, authorized: bool) {
        self.state.lock().authorized = authorized;
    }

    pub fn reject_requests(&self, reject: bool) {
        self.state.lock().reject_requests = reject;
    }

    pub fn reject_switch(&self, reject: bool) {
        self.state.lock().reject_switch = reject;
    }

    pub fn reject_add(&self, reject: bool) {
        self.state.lock().reject_add = reject;
    }

    /// Makes balance reads time out
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.state.lock().fail_disconnect = fail;
    }

    /// Holds every following balance read until released with [`MockWallet::release_balance_read`]
    pub fn gate_balance_reads(&self, gate: bool) {
        self.state.lock().gate_balance_reads = gate;
    }

    /// Number of balance reads issued while gated, released or not
    pub fn gated_balance_reads(&self) -> usize {
        self.state.lock().pending_balance_reads.len()
    }

    /// Lets the `index`-th gated balance read complete
    pub fn release_balance_read(&self, index: usize) {
        let sender = self
            .state
            .lock()
            .pending_balance_reads
            .get_mut(index)
            .and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    /// Holds every following connection request, as if the approval prompt stayed open
    pub fn gate_account_requests(&self, gate: bool) {
        self.state.lock().gate_account_requests = gate;
    }

    pub fn gated_account_requests(&self) -> usize {
        self.state.lock().pending_account_requests.len()
    }

    /// Lets the `index`-th gated connection request complete
    pub fn release_account_request(&self, index: usize) {
        let sender = self
            .state
            .lock()
            .pending_account_requests
            .get_mut(index)
            .and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn chain_id(&self) -> ChainId {
        self.state.lock().chain_id
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, call: &MockCall) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: MockCall) -> Result<parking_lot::MutexGuard<'_, MockState>, ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.installed {
            Ok(state)
        } else {
            Err(ProviderError::NotAvailable)
        }
    }
}

fn user_rejected() -> ProviderError {
    ProviderError::rpc(USER_REJECTED_CODE, "User rejected the request.")
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn kind(&self) -> &str {
        "mock"
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let gate = {
            let mut state = self.record(MockCall::RequestAccounts)?;
            if state.gate_account_requests {
                let (tx, rx) = oneshot::channel();
                state.pending_account_requests.push(Some(tx));
                Some(rx)
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut state = self.state.lock();
        if state.reject_requests {
            return Err(user_rejected());
        }
        state.authorized = true;
        Ok(state.accounts.clone())
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let state = self.record(MockCall::GetAccounts)?;
        if state.authorized {
            Ok(state.accounts.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ProviderError> {
        let (balance, gate) = {
            let mut state = self.record(MockCall::GetBalance)?;
            if state.fail_reads {
                return Err(ProviderError::Transport("request timed out".to_string()));
            }
            let balance = state
                .balances
                .get(&state.chain_id)
                .copied()
                .unwrap_or(U256::ZERO);
            let gate = if state.gate_balance_reads {
                let (tx, rx) = oneshot::channel();
                state.pending_balance_reads.push(Some(tx));
                Some(rx)
            } else {
                None
            };
            (balance, gate)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(balance)
    }

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        let state = self.record(MockCall::GetChainId)?;
        Ok(state.chain_id)
    }

    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError> {
        let chain_id = {
            let mut state = self.record(MockCall::SwitchChain(hex_chain_id.to_string()))?;
            let chain_id = parse_hex_chain_id(hex_chain_id)
                .ok_or_else(|| ProviderError::rpc(-32602, "Invalid chain ID"))?;
            if !state.known_chains.contains(&chain_id) {
                return Err(ProviderError::rpc(
                    UNRECOGNIZED_CHAIN_CODE,
                    format!("Unrecognized chain ID \"{hex_chain_id}\""),
                ));
            }
            if state.reject_switch {
                return Err(user_rejected());
            }
            state.chain_id = chain_id;
            chain_id
        };
        self.emit(ProviderEvent::ChainChanged(chain_id));
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParameters) -> Result<(), ProviderError> {
        let mut state = self.record(MockCall::AddChain(params.chain_id.clone()))?;
        if state.reject_add {
            return Err(user_rejected());
        }
        let chain_id = parse_hex_chain_id(&params.chain_id)
            .ok_or_else(|| ProviderError::rpc(-32602, "Invalid chain ID"))?;
        state.known_chains.insert(chain_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        let state = self.record(MockCall::Disconnect)?;
        if state.fail_disconnect {
            return Err(ProviderError::rpc(-32603, "Internal error"));
        }
        Ok(())
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Reset);
        state.authorized = false;
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}
