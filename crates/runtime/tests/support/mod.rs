//! In-process stand-in for a browser's debugging endpoint.
//!
//! Serves the `/json/*` discovery surface and a per-target WebSocket that
//! answers every command with `{"method", "params"}` echoed back as the
//! result. A few method names trigger special replies:
//!
//! - `Test.fail` answers with a protocol error
//! - `Test.emit` sends a `Test.emitted` notification before the result
//! - `Test.ignore` never answers

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{Json, Router};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, RawQuery, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use cdp_protocol::TargetInfo;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct FakeBrowser {
	pub addr: SocketAddr,
	state: Arc<FakeState>,
	server: JoinHandle<()>,
}

struct FakeState {
	addr: SocketAddr,
	targets: Mutex<Vec<TargetInfo>>,
	next_id: AtomicU32,
}

impl FakeBrowser {
	/// Starts a fake endpoint with one `about:blank` tab.
	pub async fn start() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let state = Arc::new(FakeState {
			addr,
			targets: Mutex::new(Vec::new()),
			next_id: AtomicU32::new(1),
		});
		state.create_target("about:blank");

		let app = Router::new()
			.route("/json/version", get(version))
			.route("/json/list", get(list))
			.route("/json", get(list))
			.route("/json/new", put(new_target))
			.route("/json/activate/{id}", get(activate))
			.route("/json/close/{id}", get(close))
			.route("/devtools/page/{id}", get(socket))
			.with_state(Arc::clone(&state));

		let server = tokio::spawn(async move {
			let _ = axum::serve(listener, app.into_make_service()).await;
		});

		Self { addr, state, server }
	}

	pub fn endpoint(&self) -> String {
		format!("http://{}", self.addr)
	}

	pub fn port(&self) -> u16 {
		self.addr.port()
	}

	pub fn target_ids(&self) -> Vec<String> {
		self.state.targets.lock().iter().map(|t| t.id.clone()).collect()
	}

	pub fn first_socket_url(&self) -> String {
		self.state.targets.lock()[0]
			.web_socket_debugger_url
			.clone()
			.unwrap()
	}
}

impl Drop for FakeBrowser {
	fn drop(&mut self) {
		self.server.abort();
	}
}

impl FakeState {
	fn create_target(&self, url: &str) -> TargetInfo {
		let id = format!("T{}", self.next_id.fetch_add(1, Ordering::SeqCst));
		let target = TargetInfo {
			id: id.clone(),
			title: url.to_string(),
			url: url.to_string(),
			target_type: "page".into(),
			description: Some(String::new()),
			web_socket_debugger_url: Some(format!("ws://{}/devtools/page/{id}", self.addr)),
			devtools_frontend_url: None,
			favicon_url: None,
		};
		self.targets.lock().push(target.clone());
		target
	}
}

async fn version(State(state): State<Arc<FakeState>>) -> Json<Value> {
	Json(json!({
		"Browser": "FakeChrome/126.0.0.0",
		"Protocol-Version": "1.3",
		"User-Agent": "Mozilla/5.0 FakeChrome",
		"V8-Version": "12.6",
		"webSocketDebuggerUrl": format!("ws://{}/devtools/browser/fake", state.addr),
	}))
}

async fn list(State(state): State<Arc<FakeState>>) -> Json<Vec<TargetInfo>> {
	Json(state.targets.lock().clone())
}

async fn new_target(State(state): State<Arc<FakeState>>, RawQuery(query): RawQuery) -> Json<TargetInfo> {
	let url = query.unwrap_or_else(|| "about:blank".to_string());
	Json(state.create_target(&url))
}

async fn activate(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
	if state.targets.lock().iter().any(|t| t.id == id) {
		"Target activated".into_response()
	} else {
		(StatusCode::NOT_FOUND, format!("No such target id: {id}")).into_response()
	}
}

async fn close(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
	let mut targets = state.targets.lock();
	match targets.iter().position(|t| t.id == id) {
		Some(index) => {
			targets.remove(index);
			"Target is closing".into_response()
		}
		None => (StatusCode::NOT_FOUND, format!("No such target id: {id}")).into_response(),
	}
}

async fn socket(ws: WebSocketUpgrade) -> Response {
	ws.on_upgrade(echo_commands)
}

async fn echo_commands(mut socket: WebSocket) {
	while let Some(Ok(message)) = socket.recv().await {
		let Message::Text(text) = message else {
			continue;
		};
		let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
			continue;
		};
		let id = request["id"].clone();
		let method = request["method"].as_str().unwrap_or_default().to_string();
		let params = request["params"].clone();

		let reply = match method.as_str() {
			"Test.ignore" => continue,
			"Test.fail" => json!({"id": id, "error": {"code": -32601, "message": "'Test.fail' wasn't found"}}),
			"Test.emit" => {
				let event = json!({"method": "Test.emitted", "params": params});
				if socket.send(Message::Text(event.to_string().into())).await.is_err() {
					return;
				}
				json!({"id": id, "result": {}})
			}
			_ => json!({"id": id, "result": {"method": method, "params": params}}),
		};
		if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
			return;
		}
	}
}

/// Serves a single fixed response for every path.
pub async fn serve_fixed(status: StatusCode, body: &'static str) -> (SocketAddr, JoinHandle<()>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let app = Router::new().fallback(move || async move { (status, body) });
	let server = tokio::spawn(async move {
		let _ = axum::serve(listener, app.into_make_service()).await;
	});
	(addr, server)
}
