//! `Network.*` commands.

use cdp_runtime::{Connection, Result};
use serde_json::json;

/// Network-domain adapter over one connection.
#[derive(Debug, Clone)]
pub struct Network {
	connection: Connection,
}

impl Network {
	pub fn new(connection: Connection) -> Self {
		Self { connection }
	}

	/// `Network.enable`: start receiving `Network.*` notifications.
	pub async fn enable(&self) -> Result<()> {
		self.connection.send("Network.enable", json!({})).await.map(drop)
	}

	/// `Network.disable`.
	pub async fn disable(&self) -> Result<()> {
		self.connection.send("Network.disable", json!({})).await.map(drop)
	}
}
