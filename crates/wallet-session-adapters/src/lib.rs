pub mod config;
pub mod eip1193;

pub use config::{RuntimeProfile, SessionAdapterConfig};
pub use eip1193::{Eip1193Adapter, DETERMINISTIC_ACCOUNT, DETERMINISTIC_BALANCE};
