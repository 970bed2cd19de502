//! `Page.*` commands.

use base64::Engine;
use cdp_runtime::{Connection, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Page-domain adapter over one connection.
#[derive(Debug, Clone)]
pub struct Page {
	connection: Connection,
}

/// Result of `Page.navigate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	pub frame_id: String,
	#[serde(default)]
	pub loader_id: Option<String>,
	/// Set when the navigation itself failed (e.g. DNS error).
	#[serde(default)]
	pub error_text: Option<String>,
}

/// Image encoding for `Page.captureScreenshot`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
	#[default]
	Png,
	Jpeg,
	Webp,
}

#[derive(Deserialize)]
struct ScreenshotResponse {
	data: String,
}

impl Page {
	pub fn new(connection: Connection) -> Self {
		Self { connection }
	}

	/// `Page.enable`: start receiving page lifecycle notifications.
	pub async fn enable(&self) -> Result<()> {
		self.connection.send("Page.enable", json!({})).await.map(drop)
	}

	/// `Page.navigate`.
	pub async fn navigate(&self, url: &str) -> Result<NavigateResult> {
		self.connection.call("Page.navigate", &json!({ "url": url })).await
	}

	/// `Page.reload`.
	pub async fn reload(&self, ignore_cache: bool) -> Result<()> {
		self.connection
			.send("Page.reload", json!({ "ignoreCache": ignore_cache }))
			.await
			.map(drop)
	}

	/// `Page.captureScreenshot`, returning the decoded image bytes.
	///
	/// `quality` only applies to lossy formats.
	pub async fn capture_screenshot(&self, format: ScreenshotFormat, quality: Option<u8>) -> Result<Vec<u8>> {
		let mut params = json!({ "format": format });
		if let Some(quality) = quality.filter(|_| format != ScreenshotFormat::Png) {
			params["quality"] = json!(quality);
		}

		let response: ScreenshotResponse = self.connection.call("Page.captureScreenshot", &params).await?;

		base64::prelude::BASE64_STANDARD
			.decode(&response.data)
			.map_err(|e| Error::Protocol(format!("decode screenshot: {e}")))
	}
}
