use crate::config::SessionConfig;
use crate::errors::{ProviderError, SessionError};
use crate::marker::{MarkerStore, MemoryMarkerStore};
use crate::provider::{ProviderEvent, WalletProvider};
use crate::registry::{ChainDescriptor, ChainId, ChainRegistry};
use crate::state::{Balance, ConnectionPhase, SessionState};
use crate::units::format_native_amount;
use alloy_primitives::{Address, U256};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What happened to the result of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A later refresh or a session reset made this result stale; it was dropped
    Superseded,
}

/// Arguments for creating a new SessionController
pub struct SessionControllerParams {
    pub provider: Arc<dyn WalletProvider>,
    pub registry: ChainRegistry,
    pub markers: Arc<dyn MarkerStore>,
    pub config: SessionConfig,
}

#[derive(Default)]
struct Tasks {
    poller: Option<JoinHandle<()>>,
    events: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [self.poller.take(), self.events.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

struct Inner {
    provider: Arc<dyn WalletProvider>,
    registry: ChainRegistry,
    markers: Arc<dyn MarkerStore>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    /// Issued to every refresh; only the latest issued may apply its result
    refresh_seq: AtomicU64,
    /// Bumped every time the session ends, invalidating in-flight work
    epoch: AtomicU64,
    connect_in_flight: AtomicBool,
    tasks: Mutex<Tasks>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

struct WalletReading {
    account: Address,
    chain_id: ChainId,
    balance: U256,
}

/// Owns the wallet session and the only way to mutate it.
///
/// Cloning is cheap and every clone drives the same session. Observers read
/// [`SessionController::snapshot`] or follow changes through
/// [`SessionController::subscribe`]. Background work (balance polling and
/// provider events) only holds weak references and stops when the last
/// handle is dropped.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(params: SessionControllerParams) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: params.provider,
                registry: params.registry,
                markers: params.markers,
                config: params.config,
                state: watch::Sender::new(SessionState::default()),
                refresh_seq: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                connect_in_flight: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Controller over the builtin chains with an in-memory marker store
    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        Self::new(SessionControllerParams {
            provider,
            registry: ChainRegistry::builtin(),
            markers: Arc::new(MemoryMarkerStore::new()),
            config: SessionConfig::default(),
        })
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Asks the wallet for account access and attaches the first account.
    ///
    /// Only one connection request is ever outstanding: a call made while
    /// another is waiting on the wallet fails with [`SessionError::Busy`], and
    /// a call made while connected returns the current account without
    /// touching the provider.
    pub async fn connect(&self) -> Result<Address, SessionError> {
        let Some(_flight) = ConnectFlight::acquire(&self.inner.connect_in_flight) else {
            return Err(SessionError::Busy);
        };
        let epoch = match self.begin_connecting() {
            Ok(epoch) => epoch,
            Err(existing) => return existing.ok_or(SessionError::Busy),
        };

        info!(wallet = self.inner.provider.kind(), "requesting wallet accounts");
        let accounts = match self.inner.provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                self.abandon_connecting(epoch);
                let err = SessionError::from(err);
                warn!(error = %err, "wallet connection failed");
                return Err(err);
            }
        };
        let Some(account) = accounts.first().copied() else {
            self.abandon_connecting(epoch);
            return Err(SessionError::ProviderFault(
                "wallet approved the request but returned no accounts".to_string(),
            ));
        };

        self.complete_connection(account, epoch).await
    }

    /// Silently resumes a previous session if the persisted marker names this wallet.
    ///
    /// Never prompts and never reports an error: on any failure the marker is
    /// cleared and the session stays disconnected.
    pub async fn restore(&self) -> Option<Address> {
        let inner = &self.inner;
        if !inner.config.auto_reconnect {
            return None;
        }

        let marker = match inner.markers.load(&inner.config.marker_key) {
            Ok(marker) => marker?,
            Err(err) => {
                warn!(error = %err, "failed to read last wallet marker");
                self.forget_wallet();
                return None;
            }
        };
        if marker != inner.provider.kind() {
            debug!(%marker, wallet = inner.provider.kind(), "last wallet marker is for another wallet");
            self.forget_wallet();
            return None;
        }

        let _flight = ConnectFlight::acquire(&inner.connect_in_flight)?;
        let epoch = match self.begin_connecting() {
            Ok(epoch) => epoch,
            Err(existing) => return existing,
        };

        let account = match inner.provider.get_accounts().await {
            Ok(accounts) => accounts.first().copied(),
            Err(err) => {
                debug!(error = %err, "silent reconnect failed");
                None
            }
        };
        let Some(account) = account else {
            self.abandon_connecting(epoch);
            self.forget_wallet();
            return None;
        };

        self.complete_connection(account, epoch).await.ok()
    }

    /// Ends the session. Always succeeds locally, whatever the provider does.
    pub async fn disconnect(&self) {
        self.end_session("disconnected by user");
        self.forget_wallet();

        if let Err(err) = self.inner.provider.disconnect().await {
            warn!(error = %err, "provider disconnect failed, clearing provider state");
            self.inner.provider.reset();
        }
    }

    /// Re-reads account, chain and balance and applies them in one update.
    ///
    /// Refreshes are ordered by issue, not by completion: if another refresh
    /// was issued after this one, or the session ended meanwhile, this result
    /// is dropped and [`RefreshOutcome::Superseded`] is returned. Provider
    /// failures leave the last known values in place.
    pub async fn refresh_state(&self) -> Result<RefreshOutcome, SessionError> {
        let inner = &self.inner;
        let seq = inner.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let connected = inner.state.borrow().phase.has_account();
        if !connected {
            return Err(SessionError::NotConnected);
        }

        let reading = match self.read_wallet().await {
            Ok(reading) => reading,
            Err(err) => {
                let err = SessionError::from(err);
                warn!(seq, error = %err, "wallet refresh failed, keeping last known state");
                return Err(err);
            }
        };

        let Some(reading) = reading else {
            let current = self.is_current(seq, epoch, &inner.state.borrow());
            if !current {
                debug!(seq, "dropping superseded refresh");
                return Ok(RefreshOutcome::Superseded);
            }
            self.end_session("wallet reported no accounts");
            return Ok(RefreshOutcome::Applied);
        };

        let info = inner.registry.resolve(reading.chain_id);
        let balance = Balance {
            amount: format_native_amount(reading.balance, info.native_decimals()),
            symbol: info.coin_symbol().to_string(),
        };

        let mut applied = false;
        inner.state.send_if_modified(|state| {
            if !self.is_current(seq, epoch, state) {
                return false;
            }
            applied = true;
            let changed = state.account != Some(reading.account)
                || state.active_chain_id != Some(reading.chain_id)
                || state.balance.as_ref() != Some(&balance);
            state.account = Some(reading.account);
            state.active_chain_id = Some(reading.chain_id);
            state.balance = Some(balance);
            changed
        });

        if applied {
            debug!(seq, chain_id = reading.chain_id, "wallet state refreshed");
            Ok(RefreshOutcome::Applied)
        } else {
            debug!(seq, "dropping superseded refresh");
            Ok(RefreshOutcome::Superseded)
        }
    }

    /// Moves the wallet to `target`, registering the chain first if the wallet
    /// does not know it and the registry can describe it.
    ///
    /// The phase is back to `Connected` when this returns, on every path.
    pub async fn switch_network(&self, target: ChainId) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut phase = ConnectionPhase::Disconnected;
        let mut epoch = 0;
        let claimed = inner.state.send_if_modified(|state| {
            phase = state.phase;
            if state.phase != ConnectionPhase::Connected {
                return false;
            }
            epoch = inner.epoch.load(Ordering::SeqCst);
            state.phase = ConnectionPhase::SwitchingNetwork;
            true
        });
        if !claimed {
            return Err(match phase {
                ConnectionPhase::Connecting | ConnectionPhase::SwitchingNetwork => SessionError::Busy,
                _ => SessionError::NotConnected,
            });
        }
        let _switching = SwitchGuard { inner, epoch };

        info!(chain_id = target, "switching network");
        match self.request_switch(target).await {
            Ok(()) => {
                if let Err(err) = self.refresh_state().await {
                    warn!(chain_id = target, error = %err, "refresh after network switch failed");
                }
                info!(chain_id = target, "network switched");
                Ok(())
            }
            Err(err) => {
                warn!(chain_id = target, error = %err, "network switch failed");
                Err(err)
            }
        }
    }

    /// Routes a provider notification into the session
    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                self.end_session("wallet reported no accounts");
            }
            ProviderEvent::Disconnected => self.end_session("wallet disconnected"),
            ProviderEvent::ChainChanged(chain_id) => {
                debug!(chain_id, "wallet chain changed");
                self.refresh_if_connected().await;
            }
            ProviderEvent::AccountsChanged(_) => self.refresh_if_connected().await,
        }
    }

    /// Subscribes to provider push events. Repeated calls keep a single subscription.
    pub fn start(&self) {
        let mut tasks = self.inner.tasks.lock();
        if tasks.events.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let Some(events) = self.inner.provider.subscribe() else {
            debug!(wallet = self.inner.provider.kind(), "wallet has no push events");
            return;
        };
        tasks.events = Some(tokio::spawn(event_loop(Arc::downgrade(&self.inner), events)));
    }

    /// Stops the event subscription and the balance poller
    pub fn shutdown(&self) {
        self.inner.tasks.lock().abort_all();
    }

    fn begin_connecting(&self) -> Result<u64, Option<Address>> {
        let inner = &self.inner;
        let mut epoch = 0;
        let mut existing = None;
        let claimed = inner.state.send_if_modified(|state| {
            if state.phase != ConnectionPhase::Disconnected {
                existing = state.account;
                return false;
            }
            epoch = inner.epoch.load(Ordering::SeqCst);
            state.phase = ConnectionPhase::Connecting;
            true
        });
        if claimed { Ok(epoch) } else { Err(existing) }
    }

    fn abandon_connecting(&self, epoch: u64) {
        let inner = &self.inner;
        inner.state.send_if_modified(|state| {
            if inner.epoch.load(Ordering::SeqCst) != epoch
                || state.phase != ConnectionPhase::Connecting
            {
                return false;
            }
            state.phase = ConnectionPhase::Disconnected;
            true
        });
    }

    async fn complete_connection(
        &self,
        account: Address,
        epoch: u64,
    ) -> Result<Address, SessionError> {
        let inner = &self.inner;
        let attached = inner.state.send_if_modified(|state| {
            if inner.epoch.load(Ordering::SeqCst) != epoch
                || state.phase != ConnectionPhase::Connecting
            {
                return false;
            }
            state.phase = ConnectionPhase::Connected;
            state.account = Some(account);
            true
        });
        if !attached {
            return Err(SessionError::Superseded);
        }

        info!(%account, wallet = inner.provider.kind(), "wallet connected");
        self.remember_wallet();
        self.ensure_poller();

        if let Err(err) = self.refresh_state().await {
            warn!(error = %err, "initial wallet refresh failed");
        }
        let connected = inner.state.borrow().is_connected();
        if connected {
            Ok(account)
        } else {
            Err(SessionError::Superseded)
        }
    }

    fn end_session(&self, reason: &'static str) {
        let inner = &self.inner;
        let changed = inner.state.send_if_modified(|state| {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            let changed = *state != SessionState::default();
            *state = SessionState::default();
            changed
        });
        if let Some(poller) = inner.tasks.lock().poller.take() {
            poller.abort();
        }
        if changed {
            info!(reason, "wallet session ended");
        }
    }

    fn is_current(&self, seq: u64, epoch: u64, state: &SessionState) -> bool {
        self.inner.refresh_seq.load(Ordering::SeqCst) == seq
            && self.inner.epoch.load(Ordering::SeqCst) == epoch
            && state.phase.has_account()
    }

    async fn read_wallet(&self) -> Result<Option<WalletReading>, ProviderError> {
        let provider = &self.inner.provider;
        let accounts = provider.get_accounts().await?;
        let Some(account) = accounts.first().copied() else {
            return Ok(None);
        };
        let chain_id = provider.get_chain_id().await?;
        let balance = provider.get_balance(account).await?;
        Ok(Some(WalletReading {
            account,
            chain_id,
            balance,
        }))
    }

    async fn request_switch(&self, target: ChainId) -> Result<(), SessionError> {
        let inner = &self.inner;
        let hex_chain_id = inner.registry.hex_chain_id(target);

        match inner.provider.switch_chain(&hex_chain_id).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_unrecognized_chain() => {
                debug!(chain_id = target, "wallet does not know chain, trying to add it");
            }
            Err(err) => return Err(err.into()),
        }

        let Some(params) = inner
            .registry
            .get(target)
            .and_then(ChainDescriptor::add_chain_params)
        else {
            return Err(SessionError::UnknownChain(target));
        };
        if let Err(err) = inner.provider.add_chain(&params).await {
            warn!(chain_id = target, error = %err, "wallet refused to add chain");
            return Err(SessionError::UnknownChain(target));
        }

        inner
            .provider
            .switch_chain(&hex_chain_id)
            .await
            .map_err(|err| {
                if err.is_unrecognized_chain() {
                    SessionError::UnknownChain(target)
                } else {
                    err.into()
                }
            })
    }

    async fn refresh_if_connected(&self) {
        let connected = self.inner.state.borrow().phase.has_account();
        if !connected {
            return;
        }
        if let Err(err) = self.refresh_state().await {
            debug!(error = %err, "event-triggered refresh failed");
        }
    }

    fn remember_wallet(&self) {
        let inner = &self.inner;
        if !inner.config.auto_reconnect {
            return;
        }
        if let Err(err) = inner
            .markers
            .store(&inner.config.marker_key, inner.provider.kind())
        {
            warn!(error = %err, "failed to persist last wallet marker");
        }
    }

    fn forget_wallet(&self) {
        let inner = &self.inner;
        if let Err(err) = inner.markers.remove(&inner.config.marker_key) {
            warn!(error = %err, "failed to clear last wallet marker");
        }
    }

    fn ensure_poller(&self) {
        let period = self.inner.config.poll_interval;
        if period.is_zero() {
            return;
        }
        let mut tasks = self.inner.tasks.lock();
        if tasks.poller.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        tasks.poller = Some(tokio::spawn(poll_loop(Arc::downgrade(&self.inner), period)));
    }
}

/// Held while a connection request is outstanding
struct ConnectFlight<'a>(&'a AtomicBool);

impl<'a> ConnectFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ConnectFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Puts the phase back to `Connected` when a switch ends, however it ends
struct SwitchGuard<'a> {
    inner: &'a Inner,
    epoch: u64,
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        let inner = self.inner;
        let epoch = self.epoch;
        inner.state.send_if_modified(|state| {
            if inner.epoch.load(Ordering::SeqCst) != epoch
                || state.phase != ConnectionPhase::SwitchingNetwork
            {
                return false;
            }
            state.phase = ConnectionPhase::Connected;
            true
        });
    }
}

async fn poll_loop(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let controller = SessionController { inner };
        let connected = controller.inner.state.borrow().phase.has_account();
        if !connected {
            break;
        }
        match controller.refresh_state().await {
            Ok(outcome) => debug!(?outcome, "balance poll"),
            Err(err) => debug!(error = %err, "balance poll failed"),
        }
    }
}

async fn event_loop(inner: Weak<Inner>, mut events: broadcast::Receiver<ProviderEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed wallet events, refreshing");
                None
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let controller = SessionController { inner };
        match event {
            Some(event) => controller.handle_event(event).await,
            None => controller.refresh_if_connected().await,
        }
    }
}
