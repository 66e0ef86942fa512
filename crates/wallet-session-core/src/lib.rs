pub mod balance;
pub mod display;
pub mod domain;
pub mod manager;
pub mod ports;
pub mod state_machine;

pub use balance::{display_from_hex, format_wei, parse_wei};
pub use display::short_address;
pub use domain::{
    ProviderEvent, ProviderEventKind, Session, SessionPhase, SessionSnapshot, SubscriptionId,
    BALANCE_FALLBACK_MESSAGE, CONNECT_FALLBACK_MESSAGE, NO_PROVIDER_MESSAGE,
};
pub use manager::{normalize_address, SessionManager};
pub use ports::{accounts_from_value, get_balance, request_accounts, EventSink, PortError, ProviderPort};
pub use state_machine::{session_transition, SessionAction, SessionTransition, TransitionError};
