#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Method, Response, Server, StatusCode};

pub const ACCOUNT_B: &str = "0x2000000000000000000000000000000000000002";

/// Outcome the mock wallet returns for one JSON-RPC method call.
pub enum Reply {
    Result(Value),
    Error { code: i64, message: &'static str },
    Status(u16),
}

/// Serves JSON-RPC 2.0 over HTTP, answering each call with `handler(method, params)`
/// and recording the methods it saw.
pub fn spawn_rpc_server<F>(handler: F) -> (String, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str, &Value) -> Reply + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = Arc::clone(&calls);

    thread::spawn(move || {
        for _ in 0..64 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            if *req.method() != Method::Post {
                let _ = req.respond(Response::from_string("").with_status_code(StatusCode(405)));
                continue;
            }

            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = request
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let id = request.get("id").cloned().unwrap_or(Value::Null);
            let params = request.get("params").cloned().unwrap_or(Value::Null);
            if let Ok(mut g) = seen.lock() {
                g.push(method.clone());
            }

            let (code, payload) = match handler(&method, &params) {
                Reply::Result(result) => (200, json!({"jsonrpc": "2.0", "id": id, "result": result})),
                Reply::Error { code, message } => (
                    200,
                    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}),
                ),
                Reply::Status(status) => (status, json!({"detail": "unavailable"})),
            };
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, calls)
}

pub fn recorded(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    calls.lock().expect("calls lock").clone()
}
