//! Bridge between the CLI shell and the session workspace crates.
//! This must remain the only shell-facing boundary for wallet operations.

use tokio::sync::watch;
use tracing::{info, warn};

use wallet_session_adapters::{Eip1193Adapter, SessionAdapterConfig};
use wallet_session_core::{Session, SessionManager, SessionSnapshot};

type WalletSession = SessionManager<Eip1193Adapter>;

pub struct SessionBridge {
    session: WalletSession,
}

impl SessionBridge {
    pub fn mount(config: &SessionAdapterConfig) -> Self {
        let provider = Eip1193Adapter::detect(config);
        match provider.as_ref() {
            Some(adapter) => info!(mode = adapter.mode_name(), "wallet provider detected"),
            None => warn!("no wallet provider available"),
        }
        Self {
            session: SessionManager::mount(provider),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.session.has_provider()
    }

    pub async fn connect(&self) -> SessionSnapshot {
        self.session.connect().await;
        self.session.snapshot()
    }

    pub fn disconnect(&self) -> SessionSnapshot {
        self.session.disconnect();
        self.session.snapshot()
    }

    /// Pulls wallet changes the runtime cannot push and applies every queued
    /// notification.
    pub async fn sync(&self) -> usize {
        if let Some(provider) = self.session.provider() {
            if let Err(e) = provider.poll_changes().await {
                warn!(error = %e, "wallet poll failed");
            }
        }
        self.session.process_pending_events().await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.session.watch()
    }

    pub fn unmount(self) {
        self.session.unmount();
    }
}
