use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::U256;
use serde_json::Value;
use tracing::{debug, warn};

use wallet_session_core::{
    EventSink, PortError, ProviderEvent, ProviderEventKind, ProviderPort, SubscriptionId,
};

use crate::SessionAdapterConfig;

pub const DETERMINISTIC_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
/// 1.5 ether
pub const DETERMINISTIC_BALANCE: &str = "0x14d1120d7b160000";

const USER_REJECTED_CODE: i64 = 4001;
const UNSUPPORTED_METHOD_CODE: i64 = 4200;
const INVALID_PARAMS_CODE: i64 = -32602;
#[cfg(not(target_arch = "wasm32"))]
const INTERNAL_ERROR_CODE: i64 = -32603;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

#[derive(Debug)]
struct Listener {
    id: SubscriptionId,
    kind: ProviderEventKind,
    sink: EventSink,
    #[cfg(target_arch = "wasm32")]
    callback: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
}

#[derive(Debug)]
struct ProviderState {
    accounts: Vec<String>,
    chain_id: String,
    balances: HashMap<String, String>,
    failures: HashMap<String, PortError>,
    /// Set once a remote snapshot has been taken; changes are only reported
    /// relative to an earlier snapshot.
    #[cfg(not(target_arch = "wasm32"))]
    observed: bool,
    next_subscription: u64,
    listeners: Vec<Listener>,
}

impl ProviderState {
    fn seeded() -> Self {
        let mut balances = HashMap::new();
        balances.insert(
            DETERMINISTIC_ACCOUNT.to_owned(),
            DETERMINISTIC_BALANCE.to_owned(),
        );
        Self {
            accounts: vec![DETERMINISTIC_ACCOUNT.to_owned()],
            chain_id: "0x1".to_owned(),
            balances,
            failures: HashMap::new(),
            #[cfg(not(target_arch = "wasm32"))]
            observed: true,
            next_subscription: 0,
            listeners: Vec::new(),
        }
    }

    fn remote() -> Self {
        Self {
            accounts: Vec::new(),
            chain_id: String::new(),
            balances: HashMap::new(),
            failures: HashMap::new(),
            #[cfg(not(target_arch = "wasm32"))]
            observed: false,
            next_subscription: 0,
            listeners: Vec::new(),
        }
    }
}

impl Eip1193Adapter {
    /// Picks the runtime for the current target, or `None` when no wallet is
    /// reachable.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn detect(config: &SessionAdapterConfig) -> Option<Self> {
        if let Some(url) = config.eip1193_proxy_url.as_deref() {
            return match Self::proxy(url, config.request_timeout_ms) {
                Ok(adapter) => Some(adapter),
                Err(e) => {
                    warn!(error = %e, "failed to initialize EIP-1193 proxy client");
                    None
                }
            };
        }
        if config.strict_runtime_required() {
            warn!("EIP-1193 proxy URL not configured in production runtime profile");
            return None;
        }
        debug!("using deterministic EIP-1193 provider");
        Some(Self::deterministic())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn detect(config: &SessionAdapterConfig) -> Option<Self> {
        if browser_provider_available() {
            return Some(Self::browser());
        }
        debug!(
            strict = config.strict_runtime_required(),
            "window.ethereum not found"
        );
        None
    }

    pub fn deterministic() -> Self {
        Self {
            mode: ProviderMode::Deterministic,
            state: Arc::new(Mutex::new(ProviderState::seeded())),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn proxy(base_url: &str, timeout_ms: u64) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("eip1193 proxy client: {e}")))?;
        Ok(Self {
            mode: ProviderMode::Proxy(ProxyRuntime {
                base_url: base_url.to_owned(),
                client,
                next_id: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            }),
            state: Arc::new(Mutex::new(ProviderState::remote())),
        })
    }

    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        Self {
            mode: ProviderMode::Browser,
            state: Arc::new(Mutex::new(ProviderState::remote())),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProviderMode::Deterministic => "deterministic",
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(_) => "proxy",
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => "browser",
        }
    }

    pub fn listener_count(&self) -> Result<usize, PortError> {
        Ok(self.state()?.listeners.len())
    }

    fn state(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    fn dispatch(&self, event: ProviderEvent) -> Result<usize, PortError> {
        let g = self.state()?;
        let delivered = g
            .listeners
            .iter()
            .filter(|l| l.kind == event.kind())
            .filter(|l| l.sink.send(event.clone()).is_ok())
            .count();
        debug!(event = event.kind().event_name(), delivered, "provider event dispatched");
        Ok(delivered)
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<String>) -> Result<usize, PortError> {
        self.state()?.accounts = accounts.clone();
        self.dispatch(ProviderEvent::AccountsChanged { accounts })
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<usize, PortError> {
        let chain_id = format!("0x{chain_id:x}");
        self.state()?.chain_id = chain_id.clone();
        self.dispatch(ProviderEvent::ChainChanged { chain_id })
    }

    pub fn debug_set_balance(&self, address: &str, wei: U256) -> Result<(), PortError> {
        self.state()?
            .balances
            .insert(address.to_ascii_lowercase(), format!("0x{wei:x}"));
        Ok(())
    }

    /// Fails the next `method` request with `error`.
    pub fn debug_fail_next(&self, method: &str, error: PortError) -> Result<(), PortError> {
        self.state()?.failures.insert(method.to_owned(), error);
        Ok(())
    }

    /// Behaves as if the user dismissed the next connection prompt.
    pub fn debug_reject_next_connect(&self) -> Result<(), PortError> {
        self.debug_fail_next(
            "eth_requestAccounts",
            PortError::Rpc {
                code: USER_REJECTED_CODE,
                message: "User rejected the request.".to_owned(),
            },
        )
    }

    fn deterministic_request(&self, method: &str, params: &Value) -> Result<Value, PortError> {
        let mut g = self.state()?;
        if let Some(err) = g.failures.remove(method) {
            return Err(err);
        }
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(serde_json::json!(g.accounts)),
            "eth_chainId" => Ok(Value::String(g.chain_id.clone())),
            "eth_getBalance" => {
                let address = params
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| PortError::Rpc {
                        code: INVALID_PARAMS_CODE,
                        message: "eth_getBalance expects an address".to_owned(),
                    })?;
                let balance = g
                    .balances
                    .get(&address.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| "0x0".to_owned());
                Ok(Value::String(balance))
            }
            other => Err(PortError::Rpc {
                code: UNSUPPORTED_METHOD_CODE,
                message: format!("Unsupported method: {other}"),
            }),
        }
    }

    /// Compares the wallet's current accounts and chain with the previous poll
    /// and notifies subscribers of whatever changed. Returns the number of
    /// changes seen; the first poll only records a baseline.
    ///
    /// Only the proxy runtime needs this; the browser and deterministic
    /// runtimes push notifications themselves.
    pub async fn poll_changes(&self) -> Result<usize, PortError> {
        #[cfg(not(target_arch = "wasm32"))]
        if let ProviderMode::Proxy(proxy) = &self.mode {
            let accounts = wallet_session_core::accounts_from_value(
                &proxy.call("eth_accounts", serde_json::json!([])).await?,
            )?;
            let chain_id = format_chain_id(json_chain_id_to_u64(
                &proxy.call("eth_chainId", serde_json::json!([])).await?,
            )?);

            let mut changes = Vec::new();
            {
                let mut g = self.state()?;
                if g.observed {
                    if g.accounts != accounts {
                        changes.push(ProviderEvent::AccountsChanged {
                            accounts: accounts.clone(),
                        });
                    }
                    if g.chain_id != chain_id {
                        changes.push(ProviderEvent::ChainChanged {
                            chain_id: chain_id.clone(),
                        });
                    }
                }
                g.observed = true;
                g.accounts = accounts;
                g.chain_id = chain_id;
            }
            let count = changes.len();
            for event in changes {
                self.dispatch(event)?;
            }
            return Ok(count);
        }
        Ok(0)
    }
}

impl ProviderPort for Eip1193Adapter {
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        debug!(method, mode = self.mode_name(), "eip1193 request");
        match &self.mode {
            ProviderMode::Deterministic => self.deterministic_request(method, &params),
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(proxy) => proxy.call(method, params).await,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => wasm_request(method, params).await,
        }
    }

    fn subscribe(
        &self,
        kind: ProviderEventKind,
        sink: EventSink,
    ) -> Result<SubscriptionId, PortError> {
        #[cfg(target_arch = "wasm32")]
        let callback = match self.mode {
            ProviderMode::Browser => Some(register_browser_listener(kind, sink.clone())?),
            _ => None,
        };

        let mut g = self.state()?;
        g.next_subscription = g.next_subscription.saturating_add(1);
        let id = SubscriptionId(g.next_subscription);
        g.listeners.push(Listener {
            id,
            kind,
            sink,
            #[cfg(target_arch = "wasm32")]
            callback,
        });
        debug!(event = kind.event_name(), id = id.0, "provider subscription added");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError> {
        let listener = {
            let mut g = self.state()?;
            let pos = g
                .listeners
                .iter()
                .position(|l| l.id == id)
                .ok_or_else(|| PortError::NotFound(format!("subscription {}", id.0)))?;
            g.listeners.remove(pos)
        };

        #[cfg(target_arch = "wasm32")]
        if let Some(callback) = listener.callback.as_ref() {
            remove_browser_listener(listener.kind, callback)?;
        }

        debug!(event = listener.kind.event_name(), id = id.0, "provider subscription removed");
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ProxyRuntime {
    async fn call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            .saturating_add(1);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(rpc_error_from_json(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn rpc_error_from_json(err: &Value) -> PortError {
    PortError::Rpc {
        code: err
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(INTERNAL_ERROR_CODE),
        message: err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
    }
}

fn format_chain_id(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

#[cfg(not(target_arch = "wasm32"))]
fn json_chain_id_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

fn parse_chain_id_str(raw: &str) -> Result<u64, PortError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id: {e}")))
    }
}

#[cfg(target_arch = "wasm32")]
async fn wasm_request(method: &str, params: Value) -> Result<Value, PortError> {
    use serde::Serialize;
    use wasm_bindgen::JsCast;

    let provider = browser_provider()?;
    let request_fn = get_fn(&provider, "request").ok_or(PortError::NotImplemented(
        "window.ethereum.request is unavailable",
    ))?;

    let request = serde_json::json!({
        "method": method,
        "params": params,
    });
    let request_js = request
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| PortError::Transport(format!("failed to encode wasm request: {e}")))?;
    let promise_js = request_fn
        .call1(&provider, &request_js)
        .map_err(js_error_to_port)?;
    let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
        PortError::Transport("provider request did not return Promise".to_owned())
    })?;
    let result_js = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(js_error_to_port)?;
    serde_wasm_bindgen::from_value(result_js)
        .map_err(|e| PortError::Transport(format!("failed to decode wasm response: {e}")))
}

#[cfg(target_arch = "wasm32")]
fn register_browser_listener(
    kind: ProviderEventKind,
    sink: EventSink,
) -> Result<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>, PortError> {
    use wasm_bindgen::{closure::Closure, JsCast, JsValue};

    let provider = browser_provider()?;
    let on_fn = get_fn(&provider, "on")
        .or_else(|| get_fn(&provider, "addListener"))
        .ok_or(PortError::NotImplemented(
            "provider does not expose on/addListener",
        ))?;

    let callback = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
        let event = match kind {
            ProviderEventKind::AccountsChanged => ProviderEvent::AccountsChanged {
                accounts: js_accounts(&value),
            },
            ProviderEventKind::ChainChanged => match js_chain_id(&value) {
                Ok(chain_id) => ProviderEvent::ChainChanged { chain_id },
                Err(e) => {
                    warn!(error = %e, "ignoring chainChanged with unreadable payload");
                    return;
                }
            },
        };
        if sink.send(event).is_err() {
            debug!(event = kind.event_name(), "session gone; dropping provider event");
        }
    });

    on_fn
        .call2(
            &provider,
            &JsValue::from_str(kind.event_name()),
            callback.as_ref().unchecked_ref(),
        )
        .map_err(|e| {
            PortError::Transport(format!("register {} failed: {e:?}", kind.event_name()))
        })?;
    Ok(callback)
}

#[cfg(target_arch = "wasm32")]
fn remove_browser_listener(
    kind: ProviderEventKind,
    callback: &wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>,
) -> Result<(), PortError> {
    use wasm_bindgen::{JsCast, JsValue};

    let provider = browser_provider()?;
    let Some(remove_fn) =
        get_fn(&provider, "removeListener").or_else(|| get_fn(&provider, "off"))
    else {
        warn!(
            event = kind.event_name(),
            "provider does not expose removeListener/off"
        );
        return Ok(());
    };
    remove_fn
        .call2(
            &provider,
            &JsValue::from_str(kind.event_name()),
            callback.as_ref().unchecked_ref(),
        )
        .map_err(|e| {
            PortError::Transport(format!("remove {} listener failed: {e:?}", kind.event_name()))
        })?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn browser_provider_available() -> bool {
    browser_provider().is_ok()
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
fn get_prop(target: &wasm_bindgen::JsValue, key: &str) -> Result<wasm_bindgen::JsValue, PortError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}

#[cfg(target_arch = "wasm32")]
fn get_fn(target: &wasm_bindgen::JsValue, key: &str) -> Option<js_sys::Function> {
    use wasm_bindgen::JsCast;

    get_prop(target, key)
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
}

/// Wallet rejections are `{ code, message }` objects; keep both.
#[cfg(target_arch = "wasm32")]
fn js_error_to_port(err: wasm_bindgen::JsValue) -> PortError {
    let code = get_prop(&err, "code").ok().and_then(|v| v.as_f64());
    let message = get_prop(&err, "message").ok().and_then(|v| v.as_string());
    match (code, message) {
        (Some(code), Some(message)) => PortError::Rpc {
            code: code as i64,
            message,
        },
        (None, Some(message)) => PortError::Wallet(message),
        _ => PortError::Transport(format!("provider request rejected: {err:?}")),
    }
}

#[cfg(target_arch = "wasm32")]
fn js_accounts(value: &wasm_bindgen::JsValue) -> Vec<String> {
    if !js_sys::Array::is_array(value) {
        return Vec::new();
    }
    js_sys::Array::from(value)
        .iter()
        .filter_map(|item| item.as_string())
        .collect()
}

#[cfg(target_arch = "wasm32")]
fn js_chain_id(value: &wasm_bindgen::JsValue) -> Result<String, PortError> {
    if let Some(s) = value.as_string() {
        return parse_chain_id_str(&s).map(format_chain_id);
    }
    if let Some(num) = value.as_f64() {
        return Ok(format_chain_id(num as u64));
    }
    Err(PortError::Validation("invalid JS chain id".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_normalize_to_hex() {
        assert_eq!(parse_chain_id_str("0x2105").expect("hex"), 8453);
        assert_eq!(parse_chain_id_str("8453").expect("decimal"), 8453);
        assert!(parse_chain_id_str("base").is_err());
        assert_eq!(format_chain_id(8453), "0x2105");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn rpc_error_objects_keep_code_and_message() {
        let err = rpc_error_from_json(&serde_json::json!({
            "code": 4001,
            "message": "User rejected the request."
        }));
        assert!(matches!(
            err,
            PortError::Rpc { code: 4001, ref message } if message == "User rejected the request."
        ));

        let bare = rpc_error_from_json(&serde_json::json!({}));
        assert!(matches!(bare, PortError::Rpc { code: INTERNAL_ERROR_CODE, ref message } if message.is_empty()));
    }
}
