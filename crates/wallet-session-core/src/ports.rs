use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{ProviderEvent, ProviderEventKind, SubscriptionId};

/// Channel the provider pushes change notifications into.
pub type EventSink = UnboundedSender<ProviderEvent>;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Rejection raised by the wallet without a numeric code.
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl PortError {
    /// Message the wallet itself attached to the failure, if any.
    ///
    /// Only wallet-originated failures carry a user-facing message; transport
    /// and decoding problems yield `None` so the caller falls back to its own text.
    pub fn provider_message(&self) -> Option<&str> {
        let message = match self {
            PortError::Rpc { message, .. } | PortError::Wallet(message) => message.as_str(),
            PortError::NotImplemented(_)
            | PortError::NotFound(_)
            | PortError::Transport(_)
            | PortError::Validation(_) => return None,
        };
        let trimmed = message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// The EIP-1193 surface the session manager depends on.
///
/// Implementations are driven from a single task; futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait ProviderPort {
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError>;
    fn subscribe(
        &self,
        kind: ProviderEventKind,
        sink: EventSink,
    ) -> Result<SubscriptionId, PortError>;
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError>;
}

pub async fn request_accounts<P: ProviderPort>(provider: &P) -> Result<Vec<String>, PortError> {
    let result = provider
        .request("eth_requestAccounts", serde_json::json!([]))
        .await?;
    accounts_from_value(&result)
}

/// Returns the raw `eth_getBalance` result; shape checks belong to [`crate::balance`].
pub async fn get_balance<P: ProviderPort>(provider: &P, address: &str) -> Result<Value, PortError> {
    provider
        .request("eth_getBalance", serde_json::json!([address, "latest"]))
        .await
}

pub fn accounts_from_value(value: &Value) -> Result<Vec<String>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Validation("accounts result must be array".to_owned()))?;
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| PortError::Validation("account item must be string".to_owned()))
        })
        .collect()
}
