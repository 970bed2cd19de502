//! Notification fan-out.
//!
//! An [`EventRouter`] keeps, per notification name, an ordered set of
//! [`EventHandler`]s. The read loop hands every ordinary notification to
//! [`EventRouter::dispatch`], which snapshots the matching handlers and runs
//! them on a separate task so the socket keeps being drained.
//!
//! Handler identity is the shared allocation behind an [`EventHandler`]:
//! clones compare equal, two handlers built from the same closure do not.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdp_protocol::Event;
use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::Result;

/// Identifier returned by [`EventRouter::subscribe`].
pub type HandlerId = u64;

/// Boxed async handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

type Callback = dyn Fn(&Value) -> serde_json::Result<HandlerFuture> + Send + Sync;

/// A subscriber callback.
///
/// The callback decodes the notification parameters into its own expected
/// shape before it runs; a decode failure skips only this handler.
#[derive(Clone)]
pub struct EventHandler {
	callback: Arc<Callback>,
}

impl EventHandler {
	/// Handler receiving parameters decoded as `T`.
	pub fn new<T, F, Fut>(handler: F) -> Self
	where
		T: DeserializeOwned + Send + 'static,
		F: Fn(T) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		let callback = move |params: &Value| -> serde_json::Result<HandlerFuture> {
			let decoded = <T as Deserialize>::deserialize(params)?;
			Ok(Box::pin(handler(decoded)))
		};
		Self {
			callback: Arc::new(callback),
		}
	}

	/// Handler receiving the raw parameter object.
	pub fn raw<F, Fut>(handler: F) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		let callback = move |params: &Value| -> serde_json::Result<HandlerFuture> { Ok(Box::pin(handler(params.clone()))) };
		Self {
			callback: Arc::new(callback),
		}
	}

	/// Returns `true` if both values refer to the same registered callback.
	pub fn same(&self, other: &EventHandler) -> bool {
		Arc::ptr_eq(&self.callback, &other.callback)
	}

	fn prepare(&self, params: &Value) -> serde_json::Result<HandlerFuture> {
		(self.callback)(params)
	}
}

impl std::fmt::Debug for EventHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventHandler")
			.field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
			.finish()
	}
}

type SubscriptionTable = HashMap<String, IndexMap<HandlerId, EventHandler>>;

struct RouterInner {
	table: Mutex<SubscriptionTable>,
	next_id: AtomicU64,
	/// One permit per notification occurrence whose handlers are running.
	limit: Arc<Semaphore>,
}

/// Per-name subscriber sets with bounded concurrent dispatch.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct EventRouter {
	inner: Arc<RouterInner>,
}

impl EventRouter {
	/// Creates a router letting at most `concurrency` occurrences run at once.
	pub fn new(concurrency: usize) -> Self {
		Self {
			inner: Arc::new(RouterInner {
				table: Mutex::new(HashMap::new()),
				next_id: AtomicU64::new(1),
				limit: Arc::new(Semaphore::new(concurrency.max(1))),
			}),
		}
	}

	/// Registers `handler` for `name`.
	///
	/// Registering the same handler twice for one name is a no-op and returns
	/// the id of the existing registration.
	pub fn subscribe(&self, name: impl Into<String>, handler: EventHandler) -> HandlerId {
		let name = name.into();
		let mut table = self.inner.table.lock();
		let handlers = table.entry(name).or_default();
		if let Some((id, _)) = handlers.iter().find(|(_, existing)| existing.same(&handler)) {
			return *id;
		}
		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		handlers.insert(id, handler);
		id
	}

	/// Removes `handler` from `name`. Returns `false` if it was not registered.
	pub fn unsubscribe(&self, name: &str, handler: &EventHandler) -> bool {
		let mut table = self.inner.table.lock();
		let Some(handlers) = table.get_mut(name) else {
			return false;
		};
		let Some(index) = handlers.values().position(|existing| existing.same(handler)) else {
			return false;
		};
		handlers.shift_remove_index(index);
		if handlers.is_empty() {
			table.remove(name);
		}
		true
	}

	/// Removes the registration with `id`, whatever its name.
	pub fn remove(&self, id: HandlerId) -> bool {
		let mut table = self.inner.table.lock();
		let mut emptied = None;
		let mut removed = false;
		for (name, handlers) in table.iter_mut() {
			if handlers.shift_remove(&id).is_some() {
				removed = true;
				if handlers.is_empty() {
					emptied = Some(name.clone());
				}
				break;
			}
		}
		if let Some(name) = emptied {
			table.remove(&name);
		}
		removed
	}

	/// Number of handlers registered for `name`.
	pub fn handler_count(&self, name: &str) -> usize {
		self.inner.table.lock().get(name).map_or(0, IndexMap::len)
	}

	/// Drops every registration.
	pub fn clear(&self) {
		self.inner.table.lock().clear();
	}

	/// Hands one notification occurrence to its subscribers.
	///
	/// Never waits: the occurrence gets its own task, which takes a
	/// concurrency permit and then runs the handlers one after another in
	/// registration order. Handlers may send commands on the connection whose
	/// read loop called this.
	pub(crate) fn dispatch(&self, event: Event) {
		let handlers: Vec<(HandlerId, EventHandler)> = {
			let table = self.inner.table.lock();
			match table.get(&event.method) {
				Some(handlers) => handlers.iter().map(|(id, h)| (*id, h.clone())).collect(),
				None => return,
			}
		};

		let limit = Arc::clone(&self.inner.limit);
		tokio::spawn(async move {
			let Ok(_permit) = limit.acquire_owned().await else {
				return;
			};
			let Event { method, params, .. } = event;
			for (id, handler) in handlers {
				let future = match handler.prepare(&params) {
					Ok(future) => future,
					Err(error) => {
						tracing::warn!(%method, handler = id, %error, "event parameters did not decode for handler");
						continue;
					}
				};
				match AssertUnwindSafe(future).catch_unwind().await {
					Ok(Ok(())) => {}
					Ok(Err(error)) => tracing::warn!(%method, handler = id, %error, "event handler failed"),
					Err(_) => tracing::error!(%method, handler = id, "event handler panicked"),
				}
			}
		});
	}
}

impl Default for EventRouter {
	fn default() -> Self {
		Self::new(crate::config::ConnectionOptions::default().event_concurrency)
	}
}

impl std::fmt::Debug for EventRouter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let table = self.inner.table.lock();
		f.debug_struct("EventRouter")
			.field("names", &table.len())
			.field("available_permits", &self.inner.limit.available_permits())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;
	use std::time::Duration;

	use serde::Deserialize;
	use serde_json::json;
	use tokio::sync::mpsc;

	use super::*;

	fn event(method: &str, params: Value) -> Event {
		Event {
			method: method.into(),
			params,
			session_id: None,
		}
	}

	fn counting(counter: Arc<AtomicUsize>) -> EventHandler {
		EventHandler::raw(move |_| {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}
		})
	}

	async fn settle() {
		tokio::time::sleep(Duration::from_millis(50)).await;
	}

	#[tokio::test]
	async fn duplicate_subscribe_invokes_once() {
		let router = EventRouter::new(4);
		let counter = Arc::new(AtomicUsize::new(0));
		let handler = counting(Arc::clone(&counter));

		let first = router.subscribe("Page.loadEventFired", handler.clone());
		let second = router.subscribe("Page.loadEventFired", handler);
		assert_eq!(first, second);
		assert_eq!(router.handler_count("Page.loadEventFired"), 1);

		router.dispatch(event("Page.loadEventFired", json!({})));
		settle().await;
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn distinct_handlers_both_receive_params() {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct RequestWillBeSent {
			request_id: String,
		}

		let router = EventRouter::new(4);
		let (tx, mut rx) = mpsc::unbounded_channel();

		for tag in ["a", "b"] {
			let tx = tx.clone();
			router.subscribe(
				"Network.requestWillBeSent",
				EventHandler::new(move |params: RequestWillBeSent| {
					let tx = tx.clone();
					async move {
						let _ = tx.send((tag, params.request_id));
						Ok(())
					}
				}),
			);
		}

		router.dispatch(event("Network.requestWillBeSent", json!({"requestId": "R1"})));

		let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
		seen.sort();
		assert_eq!(seen, vec![("a", "R1".to_string()), ("b", "R1".to_string())]);
	}

	#[tokio::test]
	async fn same_name_handlers_run_in_registration_order() {
		let router = EventRouter::new(4);
		let (tx, mut rx) = mpsc::unbounded_channel();

		for n in 0..5u32 {
			let tx = tx.clone();
			router.subscribe(
				"Runtime.consoleAPICalled",
				EventHandler::raw(move |_| {
					let tx = tx.clone();
					async move {
						// earlier handlers sleep longer; order must still hold
						tokio::time::sleep(Duration::from_millis(u64::from(5 - n) * 5)).await;
						let _ = tx.send(n);
						Ok(())
					}
				}),
			);
		}

		router.dispatch(event("Runtime.consoleAPICalled", json!({})));
		let mut order = Vec::new();
		for _ in 0..5 {
			order.push(rx.recv().await.unwrap());
		}
		assert_eq!(order, vec![0, 1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn decode_failure_skips_only_that_handler() {
		#[derive(Deserialize)]
		struct Strict {
			#[allow(dead_code)]
			required: u32,
		}

		let router = EventRouter::new(4);
		let counter = Arc::new(AtomicUsize::new(0));
		router.subscribe("Page.frameNavigated", EventHandler::new(|_: Strict| async { Ok(()) }));
		router.subscribe("Page.frameNavigated", counting(Arc::clone(&counter)));

		router.dispatch(event("Page.frameNavigated", json!({"frame": {}})));
		settle().await;
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn unsubscribe_during_dispatch_is_safe() {
		let router = EventRouter::new(4);
		let counter = Arc::new(AtomicUsize::new(0));
		let self_slot: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

		let handler = {
			let router = router.clone();
			let slot = Arc::clone(&self_slot);
			let counter = Arc::clone(&counter);
			EventHandler::raw(move |_| {
				let router = router.clone();
				let slot = Arc::clone(&slot);
				let counter = Arc::clone(&counter);
				async move {
					counter.fetch_add(1, Ordering::SeqCst);
					if let Some(me) = slot.lock().take() {
						router.unsubscribe("Target.targetCreated", &me);
					}
					Ok(())
				}
			})
		};
		*self_slot.lock() = Some(handler.clone());
		router.subscribe("Target.targetCreated", handler);

		router.dispatch(event("Target.targetCreated", json!({})));
		settle().await;
		assert_eq!(router.handler_count("Target.targetCreated"), 0);

		router.dispatch(event("Target.targetCreated", json!({})));
		settle().await;
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn subscribe_from_within_handler_does_not_deadlock() {
		let router = EventRouter::new(4);
		let counter = Arc::new(AtomicUsize::new(0));
		let late = counting(Arc::clone(&counter));

		let router_clone = router.clone();
		router.subscribe(
			"Page.domContentEventFired",
			EventHandler::raw(move |_| {
				let router = router_clone.clone();
				let late = late.clone();
				async move {
					router.subscribe("Page.domContentEventFired", late);
					Ok(())
				}
			}),
		);

		router.dispatch(event("Page.domContentEventFired", json!({})));
		settle().await;
		assert_eq!(router.handler_count("Page.domContentEventFired"), 2);
		// the late subscriber was not part of the first snapshot
		assert_eq!(counter.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn remove_by_id_and_clear() {
		let router = EventRouter::new(4);
		let a = router.subscribe("A.a", EventHandler::raw(|_| async { Ok(()) }));
		router.subscribe("B.b", EventHandler::raw(|_| async { Ok(()) }));

		assert!(router.remove(a));
		assert!(!router.remove(a));
		assert_eq!(router.handler_count("A.a"), 0);
		assert!(!router.unsubscribe("A.a", &EventHandler::raw(|_| async { Ok(()) })));

		router.clear();
		assert_eq!(router.handler_count("B.b"), 0);
	}

	#[tokio::test]
	async fn failing_and_panicking_handlers_do_not_stop_later_ones() {
		let router = EventRouter::new(4);
		let counter = Arc::new(AtomicUsize::new(0));
		router.subscribe(
			"Log.entryAdded",
			EventHandler::raw(|_| async { Err(crate::Error::Protocol("boom".into())) }),
		);
		router.subscribe(
			"Log.entryAdded",
			EventHandler::raw(|_| async {
				if true {
					panic!("handler bug");
				}
				Ok(())
			}),
		);
		router.subscribe("Log.entryAdded", counting(Arc::clone(&counter)));

		router.dispatch(event("Log.entryAdded", json!({})));
		settle().await;
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn occurrences_beyond_the_limit_queue_without_blocking_dispatch() {
		let router = EventRouter::new(1);
		let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
		let release_rx = Arc::new(Mutex::new(Some(release_rx)));
		let (started_tx, mut started_rx) = mpsc::unbounded_channel::<u64>();

		router.subscribe(
			"Slow.event",
			EventHandler::raw(move |params| {
				let release_rx = release_rx.lock().take();
				let started_tx = started_tx.clone();
				async move {
					let _ = started_tx.send(params["n"].as_u64().unwrap_or_default());
					if let Some(rx) = release_rx {
						let _ = rx.await;
					}
					Ok(())
				}
			}),
		);

		router.dispatch(event("Slow.event", json!({"n": 1})));
		assert_eq!(started_rx.recv().await, Some(1));

		// Returns at once even though the only permit is held.
		router.dispatch(event("Slow.event", json!({"n": 2})));
		let queued = tokio::time::timeout(Duration::from_millis(50), started_rx.recv()).await;
		assert!(queued.is_err(), "second occurrence ran while the permit was held");

		release_tx.send(()).unwrap();
		let second = tokio::time::timeout(Duration::from_secs(1), started_rx.recv()).await.unwrap();
		assert_eq!(second, Some(2));
	}
}
