use wallet_session_core::{SessionPhase, SessionSnapshot};

/// Text view of the wallet widget: a connect prompt while disconnected,
/// the shortened account and its balance once connected.
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut lines = Vec::new();
    match snapshot.phase {
        SessionPhase::Connecting => lines.push("Connecting...".to_owned()),
        _ if snapshot.is_connected() => {
            lines.push(format!("Account: {}", snapshot.short_address()));
            if !snapshot.balance_display.is_empty() {
                lines.push(format!("Balance: {} ETH", snapshot.balance_display));
            }
            if let Some(chain_id) = snapshot.chain_id.as_deref() {
                lines.push(format!("Chain: {chain_id}"));
            }
        }
        _ => lines.push("Not connected".to_owned()),
    }
    if !snapshot.error.is_empty() {
        lines.push(format!("Error: {}", snapshot.error));
    }
    lines.join("\n")
}
