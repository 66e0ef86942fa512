use serde::{Deserialize, Serialize};

pub const NO_PROVIDER_MESSAGE: &str = "No Ethereum provider found. Please install MetaMask.";
pub const CONNECT_FALLBACK_MESSAGE: &str = "User rejected the connection request";
pub const BALANCE_FALLBACK_MESSAGE: &str = "Failed to fetch balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 2] =
        [ProviderEventKind::AccountsChanged, ProviderEventKind::ChainChanged];

    /// Event name used by `on` / `removeListener`.
    pub fn event_name(self) -> &'static str {
        match self {
            ProviderEventKind::AccountsChanged => "accountsChanged",
            ProviderEventKind::ChainChanged => "chainChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountsChanged { accounts: Vec<String> },
    ChainChanged { chain_id: String },
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::AccountsChanged { .. } => ProviderEventKind::AccountsChanged,
            ProviderEvent::ChainChanged { .. } => ProviderEventKind::ChainChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Live session record owned by the manager.
///
/// `epoch` and the tickets never leave the crate; they let the manager
/// recognise provider responses that no longer match the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) address: String,
    pub(crate) balance_display: String,
    pub(crate) error: String,
    pub(crate) phase: SessionPhase,
    pub(crate) chain_id: Option<String>,
    pub(crate) epoch: u64,
    pub(crate) connect_ticket: u64,
    pub(crate) balance_ticket: u64,
}

impl Session {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn balance_display(&self) -> &str {
        &self.balance_display
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        !self.address.is_empty()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            address: self.address.clone(),
            balance_display: self.balance_display.clone(),
            error: self.error.clone(),
            phase: self.phase,
            chain_id: self.chain_id.clone(),
        }
    }

    /// Drops everything the user sees and invalidates in-flight responses.
    pub(crate) fn clear(&mut self) {
        self.address.clear();
        self.balance_display.clear();
        self.error.clear();
        self.phase = SessionPhase::Disconnected;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub(crate) fn settled_phase(&self) -> SessionPhase {
        if self.address.is_empty() {
            SessionPhase::Disconnected
        } else {
            SessionPhase::Connected
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub address: String,
    pub balance_display: String,
    pub error: String,
    pub phase: SessionPhase,
    pub chain_id: Option<String>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        !self.address.is_empty()
    }

    pub fn short_address(&self) -> String {
        crate::display::short_address(&self.address)
    }
}
