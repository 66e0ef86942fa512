//! Session manager: the only place session state is mutated.
//!
//! Every mutation happens inside a single `watch` update, so a view holding a
//! receiver only ever observes complete sessions. Provider responses are tagged
//! with the epoch and ticket they were issued under and dropped if the session
//! moved on while they were in flight.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::balance;
use crate::domain::{
    ProviderEvent, ProviderEventKind, Session, SessionSnapshot, SubscriptionId,
    BALANCE_FALLBACK_MESSAGE, CONNECT_FALLBACK_MESSAGE, NO_PROVIDER_MESSAGE,
};
use crate::ports::{get_balance, request_accounts, PortError, ProviderPort};
use crate::state_machine::{session_transition, SessionAction};

pub struct SessionManager<P>
where
    P: ProviderPort,
{
    provider: Option<P>,
    state: watch::Sender<Session>,
    events: AsyncMutex<UnboundedReceiver<ProviderEvent>>,
    subscriptions: Mutex<Vec<(ProviderEventKind, SubscriptionId)>>,
}

impl<P> SessionManager<P>
where
    P: ProviderPort,
{
    /// Creates an empty session and subscribes to provider notifications.
    ///
    /// A failed subscription is logged and skipped; whatever was acquired is
    /// still released by [`SessionManager::unmount`] or on drop.
    pub fn mount(provider: Option<P>) -> Self {
        let (sink, events) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::new();
        match provider.as_ref() {
            Some(p) => {
                for kind in ProviderEventKind::ALL {
                    match p.subscribe(kind, sink.clone()) {
                        Ok(id) => subscriptions.push((kind, id)),
                        Err(e) => warn!(event = kind.event_name(), error = %e, "provider subscription failed"),
                    }
                }
            }
            None => debug!("no provider present; skipping subscriptions"),
        }
        let (state, _) = watch::channel(Session::default());
        Self {
            provider,
            state,
            events: AsyncMutex::new(events),
            subscriptions: Mutex::new(subscriptions),
        }
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn address(&self) -> String {
        self.state.borrow().address().to_owned()
    }

    pub fn balance_display(&self) -> String {
        self.state.borrow().balance_display().to_owned()
    }

    pub fn error(&self) -> String {
        self.state.borrow().error().to_owned()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().snapshot()
    }

    /// Receiver for views that redraw on change.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub async fn connect(&self) {
        let Some(provider) = self.provider.as_ref() else {
            self.state.send_modify(|s| s.error = NO_PROVIDER_MESSAGE.to_owned());
            info!("connect requested without a provider");
            return;
        };

        let mut issued = (0, 0);
        self.state.send_modify(|s| {
            s.error.clear();
            apply_transition(s, SessionAction::ConnectRequested);
            s.connect_ticket = s.connect_ticket.wrapping_add(1);
            issued = (s.epoch, s.connect_ticket);
        });
        let (epoch, ticket) = issued;

        let result = request_accounts(provider).await;

        let mut granted = None;
        self.state.send_if_modified(|s| {
            if s.epoch != epoch || s.connect_ticket != ticket {
                debug!(epoch, ticket, "discarding stale eth_requestAccounts response");
                return false;
            }
            match result {
                Ok(accounts) => match accounts.first() {
                    Some(first) => {
                        let address = normalize_address(first);
                        set_address(s, &address);
                        apply_transition(s, SessionAction::AccountsGranted);
                        info!(address = %address, "wallet connected");
                        granted = Some(address);
                    }
                    None => {
                        s.address.clear();
                        s.balance_display.clear();
                        apply_transition(s, SessionAction::AccountsEmpty);
                        info!("provider granted access but returned no accounts");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "eth_requestAccounts failed");
                    s.error = user_message(&e, CONNECT_FALLBACK_MESSAGE);
                    apply_transition(s, SessionAction::ConnectFailed);
                }
            }
            true
        });

        if let Some(address) = granted {
            self.refresh_balance(&address).await;
        }
    }

    /// Local only; wallets have no programmatic revocation.
    pub fn disconnect(&self) {
        self.state.send_modify(|s| {
            apply_transition(s, SessionAction::Disconnect);
            s.clear();
        });
        info!("wallet session cleared");
    }

    /// Fetches the balance of `address` as of the latest block.
    ///
    /// Only the session address is fetched. The result is stored while that
    /// address is still current and no newer fetch has been issued; a failure
    /// keeps the previous balance.
    pub async fn refresh_balance(&self, address: &str) {
        let address = normalize_address(address);
        if address.is_empty() {
            debug!("refresh_balance called without an address");
            return;
        }
        let Some(provider) = self.provider.as_ref() else {
            return;
        };

        let mut issued = None;
        self.state.send_if_modified(|s| {
            if s.address == address {
                s.balance_ticket = s.balance_ticket.wrapping_add(1);
                issued = Some((s.epoch, s.balance_ticket));
            }
            false
        });
        let Some((epoch, ticket)) = issued else {
            debug!(address = %address, "balance requested for an address outside the session");
            return;
        };

        let result = get_balance(provider, &address).await;

        self.state.send_if_modified(|s| {
            if s.epoch != epoch || s.balance_ticket != ticket || s.address != address {
                debug!(address = %address, ticket, "discarding stale eth_getBalance response");
                return false;
            }
            match result {
                Ok(value) => {
                    s.balance_display = balance::display_from_value(&value);
                    if s.balance_display.is_empty() {
                        debug!(raw = %value, "unparseable balance payload");
                    }
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "eth_getBalance failed");
                    s.error = user_message(&e, BALANCE_FALLBACK_MESSAGE);
                }
            }
            true
        });
    }

    /// Reacts to one provider notification using the session as it is now.
    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged { accounts } => match accounts.first() {
                Some(first) => {
                    let address = normalize_address(first);
                    self.state.send_modify(|s| {
                        set_address(s, &address);
                        apply_transition(s, SessionAction::AccountsChanged);
                    });
                    info!(address = %address, "wallet account changed");
                    self.refresh_balance(&address).await;
                }
                None => self.disconnect(),
            },
            ProviderEvent::ChainChanged { chain_id } => {
                let mut current = String::new();
                self.state.send_modify(|s| {
                    s.chain_id = Some(chain_id.clone());
                    current = s.address.clone();
                });
                info!(chain_id = %chain_id, "wallet chain changed");
                if !current.is_empty() {
                    self.refresh_balance(&current).await;
                }
            }
        }
    }

    /// Handles every notification already queued, returning how many ran.
    pub async fn process_pending_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = self.events.lock().await.try_recv().ok();
            let Some(event) = next else {
                break;
            };
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Handles notifications as they arrive.
    ///
    /// Returns only once every sink the provider holds has been dropped, which
    /// for a mounted provider means never; race it against a shutdown signal
    /// with `tokio::select!` and drop it to stop.
    pub async fn run_event_loop(&self) {
        loop {
            let next = self.events.lock().await.recv().await;
            match next {
                Some(event) => self.handle_event(event).await,
                None => break,
            }
        }
        debug!("provider event stream closed");
    }

    pub fn unmount(self) {
        self.release_subscriptions();
    }

    fn release_subscriptions(&self) {
        let taken = match self.subscriptions.lock() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let Some(provider) = self.provider.as_ref() else {
            return;
        };
        for (kind, id) in taken {
            if let Err(e) = provider.unsubscribe(id) {
                warn!(event = kind.event_name(), error = %e, "provider unsubscribe failed");
            }
        }
    }
}

impl<P> Drop for SessionManager<P>
where
    P: ProviderPort,
{
    fn drop(&mut self) {
        self.release_subscriptions();
    }
}

/// Account identifiers are kept in lowercase hex.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn set_address(session: &mut Session, address: &str) {
    if session.address != address {
        session.balance_display.clear();
        session.address = address.to_owned();
    }
}

fn user_message(error: &PortError, fallback: &str) -> String {
    error.provider_message().unwrap_or(fallback).to_owned()
}

fn apply_transition(session: &mut Session, action: SessionAction) {
    let settled = session.settled_phase();
    match session_transition(session.phase, action, settled) {
        Ok((to, transition)) => {
            debug!(from = ?transition.from, to = ?transition.to, reason = transition.reason, "session transition");
            session.phase = to;
        }
        Err(e) => {
            warn!(error = %e, "rejected session transition");
            session.phase = settled;
        }
    }
}
