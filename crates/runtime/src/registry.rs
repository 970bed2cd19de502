//! Target discovery over the browser's HTTP control surface.
//!
//! Every operation is a single request whose JSON body is decoded into a
//! [`cdp_protocol`] descriptor. There is no retry here: steady-state queries
//! either succeed or return [`Error::Query`] / [`Error::Http`]. Retrying belongs
//! to the supervisor's readiness polling.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use cdp_protocol::{TargetInfo, VersionInfo};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Something that can answer "is the debugging endpoint up yet?".
///
/// Implemented by [`TargetRegistry`]; tests substitute scripted probes.
pub trait ReadinessProbe: Send + Sync {
	fn probe(&self) -> Pin<Box<dyn Future<Output = Result<VersionInfo>> + Send + '_>>;
}

/// HTTP client for `/json/*` on one browser.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
	base: Url,
	client: Client,
}

impl TargetRegistry {
	/// Creates a registry for `endpoint` (`http://host:port`; a bare `host:port` is accepted).
	pub fn new(endpoint: &str) -> Result<Self> {
		Self::with_client(endpoint, Client::new())
	}

	/// Creates a registry whose requests time out after `timeout`.
	pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
		let client = Client::builder().timeout(timeout).build()?;
		Self::with_client(endpoint, client)
	}

	fn with_client(endpoint: &str, client: Client) -> Result<Self> {
		let raw = if endpoint.contains("://") {
			endpoint.to_string()
		} else {
			format!("http://{endpoint}")
		};
		let base = Url::parse(raw.trim_end_matches('/'))
			.map_err(|e| Error::InvalidArgument(format!("invalid endpoint '{endpoint}': {e}")))?;
		if !matches!(base.scheme(), "http" | "https") {
			return Err(Error::InvalidArgument(format!(
				"endpoint '{endpoint}' must use http or https"
			)));
		}
		Ok(Self { base, client })
	}

	/// Base URL of the control surface.
	pub fn endpoint(&self) -> &Url {
		&self.base
	}

	/// `GET /json/version`.
	pub async fn version(&self) -> Result<VersionInfo> {
		let url = self.url("/json/version")?;
		self.fetch_json(self.client.get(url)).await
	}

	/// `GET /json/list`.
	pub async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
		let url = self.url("/json/list")?;
		self.fetch_json(self.client.get(url)).await
	}

	/// `PUT /json/new?<url>`: opens a new tab navigated to `target_url`.
	pub async fn new_target(&self, target_url: &str) -> Result<TargetInfo> {
		let mut url = self.url("/json/new")?;
		if !target_url.is_empty() {
			url.set_query(Some(target_url));
		}
		self.fetch_json(self.client.put(url)).await
	}

	/// `GET /json/activate/<id>`: brings a target to the foreground.
	pub async fn activate_target(&self, id: &str) -> Result<()> {
		let url = self.url(&format!("/json/activate/{}", encode_segment(id)?))?;
		self.fetch_text(self.client.get(url)).await.map(drop)
	}

	/// `GET /json/close/<id>`.
	pub async fn close_target(&self, id: &str) -> Result<()> {
		let url = self.url(&format!("/json/close/{}", encode_segment(id)?))?;
		self.fetch_text(self.client.get(url)).await.map(drop)
	}

	fn url(&self, path: &str) -> Result<Url> {
		self.base
			.join(path)
			.map_err(|e| Error::InvalidArgument(format!("invalid discovery path '{path}': {e}")))
	}

	async fn fetch_text(&self, request: reqwest::RequestBuilder) -> Result<(u16, String)> {
		let response = request.send().await?;
		let status = response.status();
		let url = response.url().clone();
		let body = response.text().await?;
		debug!(url = %url, status = status.as_u16(), "discovery response");

		if !status.is_success() {
			return Err(Error::Query {
				status: status.as_u16(),
				body,
			});
		}
		Ok((status.as_u16(), body))
	}

	async fn fetch_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
		let (status, body) = self.fetch_text(request).await?;
		serde_json::from_str(&body).map_err(|e| Error::Query {
			status,
			body: format!("undecodable body ({e}): {body}"),
		})
	}
}

impl ReadinessProbe for TargetRegistry {
	fn probe(&self) -> Pin<Box<dyn Future<Output = Result<VersionInfo>> + Send + '_>> {
		Box::pin(self.version())
	}
}

fn encode_segment(id: &str) -> Result<String> {
	if id.is_empty() || id.contains('/') {
		return Err(Error::InvalidArgument(format!("invalid target id '{id}'")));
	}
	Ok(id.to_string())
}
