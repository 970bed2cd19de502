//! Target management over the HTTP discovery surface.

use cdp_protocol::TargetInfo;
use cdp_runtime::{Result, TargetRegistry};

/// Target adapter. Unlike the socket domains it talks to `/json/*`.
#[derive(Debug, Clone)]
pub struct Target {
	registry: TargetRegistry,
}

impl Target {
	pub fn new(registry: TargetRegistry) -> Self {
		Self { registry }
	}

	/// Opens a new tab at `url`.
	pub async fn create(&self, url: &str) -> Result<TargetInfo> {
		self.registry.new_target(url).await
	}

	/// Brings `id` to the foreground.
	pub async fn activate(&self, id: &str) -> Result<()> {
		self.registry.activate_target(id).await
	}

	/// Closes `id`.
	pub async fn close(&self, id: &str) -> Result<()> {
		self.registry.close_target(id).await
	}
}
