#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;

use wallet_session_core::{
    EventSink, PortError, ProviderEvent, ProviderEventKind, ProviderPort, SubscriptionId,
};

pub const ACCOUNT_A: &str = "0xAbCdEf0000000000000000000000000000000001";
pub const ACCOUNT_B: &str = "0x2000000000000000000000000000000000000002";
/// 1.5 ether
pub const ONE_AND_A_HALF_ETH: &str = "0x14d1120d7b160000";
/// 2 ether
pub const TWO_ETH: &str = "0x1bc16d674ec80000";

enum Scripted {
    Ready(Result<Value, PortError>),
    Deferred(oneshot::Receiver<Result<Value, PortError>>),
}

#[derive(Default)]
struct Inner {
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<(String, Value)>,
    next_subscription: u64,
    sinks: Vec<(SubscriptionId, ProviderEventKind, EventSink)>,
    subscribe_failures: Vec<ProviderEventKind>,
    subscribed: HashMap<ProviderEventKind, usize>,
    unsubscribed: HashMap<ProviderEventKind, usize>,
}

/// Provider double with scripted responses and call recording.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedProvider {
    pub fn respond(&self, method: &str, result: Result<Value, PortError>) -> &Self {
        self.lock()
            .responses
            .entry(method.to_owned())
            .or_default()
            .push_back(Scripted::Ready(result));
        self
    }

    /// Queues a response that only resolves once the returned sender fires.
    pub fn defer(&self, method: &str) -> oneshot::Sender<Result<Value, PortError>> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .responses
            .entry(method.to_owned())
            .or_default()
            .push_back(Scripted::Deferred(rx));
        tx
    }

    pub fn fail_subscribe(&self, kind: ProviderEventKind) {
        self.lock().subscribe_failures.push(kind);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn subscribed(&self, kind: ProviderEventKind) -> usize {
        self.lock().subscribed.get(&kind).copied().unwrap_or(0)
    }

    pub fn unsubscribed(&self, kind: ProviderEventKind) -> usize {
        self.lock().unsubscribed.get(&kind).copied().unwrap_or(0)
    }

    pub fn live_subscriptions(&self) -> usize {
        self.lock().sinks.len()
    }

    /// Delivers `event` to every live subscription of its kind.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        let g = self.lock();
        g.sinks
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .filter(|(_, _, sink)| sink.send(event.clone()).is_ok())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("scripted provider lock")
    }
}

impl ProviderPort for ScriptedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let scripted = {
            let mut g = self.lock();
            g.calls.push((method.to_owned(), params));
            g.responses.get_mut(method).and_then(VecDeque::pop_front)
        };
        match scripted {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(PortError::Transport("deferred response dropped".to_owned()))),
            None => Err(PortError::NotFound(format!("unscripted method {method}"))),
        }
    }

    fn subscribe(
        &self,
        kind: ProviderEventKind,
        sink: EventSink,
    ) -> Result<SubscriptionId, PortError> {
        let mut g = self.lock();
        if g.subscribe_failures.contains(&kind) {
            return Err(PortError::Transport(format!(
                "register {} failed",
                kind.event_name()
            )));
        }
        g.next_subscription += 1;
        let id = SubscriptionId(g.next_subscription);
        g.sinks.push((id, kind, sink));
        *g.subscribed.entry(kind).or_default() += 1;
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError> {
        let mut g = self.lock();
        let pos = g
            .sinks
            .iter()
            .position(|(sid, _, _)| *sid == id)
            .ok_or_else(|| PortError::NotFound(format!("subscription {}", id.0)))?;
        let (_, kind, _) = g.sinks.remove(pos);
        *g.unsubscribed.entry(kind).or_default() += 1;
        Ok(())
    }
}

/// Yields until `method` has been requested at least `count` times.
pub async fn wait_for_calls(provider: &ScriptedProvider, method: &str, count: usize) {
    while provider.call_count(method) < count {
        tokio::task::yield_now().await;
    }
}

pub fn rpc_error(code: i64, message: &str) -> PortError {
    PortError::Rpc {
        code,
        message: message.to_owned(),
    }
}
