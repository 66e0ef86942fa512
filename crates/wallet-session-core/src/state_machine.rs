use thiserror::Error;

use crate::domain::SessionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    ConnectRequested,
    AccountsGranted,
    AccountsEmpty,
    ConnectFailed,
    AccountsChanged,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal session transition: {action:?} while {from:?}")]
pub struct TransitionError {
    pub from: SessionPhase,
    pub action: SessionAction,
}

/// Applies `action` to `from`.
///
/// `settled` is the phase implied by the current address; a failed connect
/// attempt falls back to it because the address is left untouched.
pub fn session_transition(
    from: SessionPhase,
    action: SessionAction,
    settled: SessionPhase,
) -> Result<(SessionPhase, SessionTransition), TransitionError> {
    use SessionAction as A;
    use SessionPhase as P;

    let (to, reason) = match (from, action) {
        (_, A::ConnectRequested) => (P::Connecting, "connect_requested"),
        // A wallet-side accountsChanged can land before the prompt resolves.
        (P::Connecting | P::Connected, A::AccountsGranted) => (P::Connected, "accounts_granted"),
        (P::Connecting | P::Connected, A::AccountsEmpty) => (P::Disconnected, "accounts_empty"),
        (P::Connecting | P::Connected, A::ConnectFailed) => {
            if settled == P::Connecting {
                return Err(TransitionError { from, action });
            }
            (settled, "connect_failed")
        }
        (_, A::AccountsChanged) => (P::Connected, "accounts_changed"),
        (_, A::Disconnect) => (P::Disconnected, "disconnect"),
        (P::Disconnected, A::AccountsGranted | A::AccountsEmpty | A::ConnectFailed) => {
            return Err(TransitionError { from, action })
        }
    };
    Ok((to, SessionTransition { from, to, reason }))
}
