//! Connections over a real WebSocket.

mod support;

use std::time::Duration;

use cdp_runtime::{Connection, ConnectionOptions, ConnectionState, Error, EventHandler, TargetRegistry};
use serde_json::{Value, json};
use support::FakeBrowser;
use tokio::sync::mpsc;

async fn open_first_tab(browser: &FakeBrowser) -> Connection {
	let registry = TargetRegistry::new(&browser.endpoint()).unwrap();
	let targets = registry.list_targets().await.unwrap();
	let url = targets[0].web_socket_debugger_url.as_deref().unwrap();
	Connection::open(url).await.unwrap()
}

#[tokio::test]
async fn command_round_trip() {
	let browser = FakeBrowser::start().await;
	let connection = open_first_tab(&browser).await;

	let result = connection
		.send("Page.navigate", json!({"url": "https://example.com"}))
		.await
		.unwrap();
	assert_eq!(
		result,
		json!({"method": "Page.navigate", "params": {"url": "https://example.com"}})
	);
	assert_eq!(connection.endpoint(), browser.first_socket_url());
}

#[tokio::test]
async fn concurrent_commands_share_one_socket() {
	let browser = FakeBrowser::start().await;
	let connection = open_first_tab(&browser).await;

	let calls: Vec<_> = (0..16)
		.map(|n| {
			let connection = connection.clone();
			tokio::spawn(async move { (n, connection.send("Test.echo", json!({"n": n})).await) })
		})
		.collect();

	for call in calls {
		let (n, result) = call.await.unwrap();
		assert_eq!(result.unwrap()["params"]["n"], n);
	}
}

#[tokio::test]
async fn remote_error_is_typed() {
	let browser = FakeBrowser::start().await;
	let connection = open_first_tab(&browser).await;

	let err = connection.send("Test.fail", json!({})).await.unwrap_err();
	assert_eq!(err.remote_code(), Some(-32601));
}

#[tokio::test]
async fn notification_precedes_its_response() {
	let browser = FakeBrowser::start().await;
	let connection = open_first_tab(&browser).await;
	let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

	connection.events().subscribe(
		"Test.emitted",
		EventHandler::raw(move |params| {
			let tx = tx.clone();
			async move {
				let _ = tx.send(params);
				Ok(())
			}
		}),
	);

	connection.send("Test.emit", json!({"requestId": "R1"})).await.unwrap();
	let params = tokio::time::timeout(Duration::from_secs(2), rx.recv())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(params["requestId"], "R1");
}

#[tokio::test]
async fn unanswered_command_times_out_then_close_drains() {
	let browser = FakeBrowser::start().await;
	let registry = TargetRegistry::new(&browser.endpoint()).unwrap();
	let url = registry.list_targets().await.unwrap()[0]
		.web_socket_debugger_url
		.clone()
		.unwrap();
	let options = ConnectionOptions::default().with_command_timeout(Some(Duration::from_millis(100)));
	let connection = Connection::open_with(&url, options).await.unwrap();

	let err = connection.send("Test.ignore", json!({})).await.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(connection.pending_count(), 0);

	let stuck = {
		let connection = connection.clone();
		tokio::spawn(async move { connection.send_with_timeout("Test.ignore", json!({}), None).await })
	};
	while connection.pending_count() == 0 {
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	connection.close().await;

	let result = tokio::time::timeout(Duration::from_secs(2), stuck).await.unwrap().unwrap();
	assert!(matches!(result, Err(Error::ConnectionClosed)));
	assert_eq!(connection.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn dial_failure_is_reported() {
	let port = {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap().port()
	};
	let err = Connection::open(&format!("ws://127.0.0.1:{port}/devtools/page/X"))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::DialFailed { .. }), "got {err:?}");
}
