//! Table of commands awaiting a response.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Reply = oneshot::Sender<Result<Value>>;

#[derive(Default)]
struct PendingState {
	entries: HashMap<u64, Reply>,
	/// Set once the connection is gone; later inserts fail with this reason.
	closed: Option<Error>,
}

/// Pending commands keyed by request id.
///
/// Every entry is removed exactly once: by its response, by the caller giving
/// up (timeout or cancellation), or by [`PendingTable::close`].
#[derive(Clone, Default)]
pub(crate) struct PendingTable {
	state: Arc<Mutex<PendingState>>,
}

impl PendingTable {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Registers a waiter for `id`.
	///
	/// Fails with the close reason if the table has already been drained.
	pub(crate) fn insert(&self, id: u64) -> Result<oneshot::Receiver<Result<Value>>> {
		let mut state = self.state.lock();
		if let Some(reason) = &state.closed {
			return Err(reason.duplicate());
		}
		let (tx, rx) = oneshot::channel();
		state.entries.insert(id, tx);
		Ok(rx)
	}

	/// Resolves the waiter for `id`. Returns `false` if no such entry exists.
	pub(crate) fn complete(&self, id: u64, reply: Result<Value>) -> bool {
		let Some(tx) = self.state.lock().entries.remove(&id) else {
			return false;
		};
		// A dropped receiver means the caller already gave up.
		let _ = tx.send(reply);
		true
	}

	pub(crate) fn remove(&self, id: u64) -> bool {
		self.state.lock().entries.remove(&id).is_some()
	}

	/// Fails every outstanding waiter with `reason` and rejects future inserts.
	///
	/// Returns the number of waiters that were resolved.
	pub(crate) fn close(&self, reason: &Error) -> usize {
		let drained: Vec<Reply> = {
			let mut state = self.state.lock();
			if state.closed.is_none() {
				state.closed = Some(reason.duplicate());
			}
			state.entries.drain().map(|(_, tx)| tx).collect()
		};
		let count = drained.len();
		for tx in drained {
			let _ = tx.send(Err(reason.duplicate()));
		}
		count
	}

	pub(crate) fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub(crate) fn guard(&self, id: u64) -> PendingGuard {
		PendingGuard {
			id,
			table: self.clone(),
			armed: true,
		}
	}
}

/// Removes its entry from the table when dropped, unless disarmed.
///
/// Held by the sending future so that a timed-out or cancelled caller never
/// leaves an orphaned waiter behind.
pub(crate) struct PendingGuard {
	id: u64,
	table: PendingTable,
	armed: bool,
}

impl PendingGuard {
	pub(crate) fn disarm(&mut self) {
		self.armed = false;
	}
}

impl Drop for PendingGuard {
	fn drop(&mut self) {
		if self.armed && self.table.remove(self.id) {
			tracing::debug!(id = self.id, "removed abandoned pending command");
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[tokio::test]
	async fn complete_resolves_matching_waiter() {
		let table = PendingTable::new();
		let rx1 = table.insert(1).unwrap();
		let rx2 = table.insert(2).unwrap();

		assert!(table.complete(2, Ok(json!({"b": 2}))));
		assert!(table.complete(1, Ok(json!({"a": 1}))));

		assert_eq!(rx1.await.unwrap().unwrap(), json!({"a": 1}));
		assert_eq!(rx2.await.unwrap().unwrap(), json!({"b": 2}));
		assert_eq!(table.len(), 0);
	}

	#[test]
	fn complete_unknown_id_is_noop() {
		let table = PendingTable::new();
		let _rx = table.insert(1).unwrap();
		assert!(!table.complete(99, Ok(Value::Null)));
		assert_eq!(table.len(), 1);
	}

	#[tokio::test]
	async fn close_fails_all_waiters_and_later_inserts() {
		let table = PendingTable::new();
		let receivers: Vec<_> = (1..=3).map(|id| table.insert(id).unwrap()).collect();

		assert_eq!(table.close(&Error::ConnectionClosed), 3);
		assert_eq!(table.len(), 0);

		for rx in receivers {
			assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionClosed)));
		}
		assert!(matches!(table.insert(4), Err(Error::ConnectionClosed)));
	}

	#[test]
	fn first_close_reason_sticks() {
		let table = PendingTable::new();
		table.close(&Error::TargetCrashed);
		table.close(&Error::ConnectionClosed);
		assert!(matches!(table.insert(1), Err(Error::TargetCrashed)));
	}

	#[test]
	fn guard_removes_entry_unless_disarmed() {
		let table = PendingTable::new();
		let _rx1 = table.insert(1).unwrap();
		let _rx2 = table.insert(2).unwrap();

		drop(table.guard(1));
		let mut kept = table.guard(2);
		kept.disarm();
		drop(kept);

		assert_eq!(table.len(), 1);
		assert!(table.complete(2, Ok(Value::Null)));
	}
}
