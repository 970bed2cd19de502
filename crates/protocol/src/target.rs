//! Descriptors returned by the browser's HTTP discovery surface (`/json/*`).

use serde::{Deserialize, Serialize};

/// One debuggable target, as listed by `/json/list` or created by `/json/new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	/// Opaque identifier issued by the browser.
	pub id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	/// Target kind (`page`, `iframe`, `service_worker`, `browser`, ...).
	#[serde(rename = "type", default)]
	pub target_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Control-socket address. Absent while another client is attached.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub devtools_frontend_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub favicon_url: Option<String>,
}

impl TargetInfo {
	/// Returns `true` for top-level tabs.
	pub fn is_page(&self) -> bool {
		self.target_type == "page"
	}
}

/// `/json/version` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
	/// Product string, e.g. `Chrome/126.0.6478.126`.
	#[serde(rename = "Browser")]
	pub browser: String,
	/// Protocol version, e.g. `1.3`.
	#[serde(rename = "Protocol-Version")]
	pub protocol_version: String,
	#[serde(rename = "User-Agent", default)]
	pub user_agent: String,
	#[serde(rename = "V8-Version", default, skip_serializing_if = "Option::is_none")]
	pub v8_version: Option<String>,
	#[serde(rename = "WebKit-Version", default, skip_serializing_if = "Option::is_none")]
	pub webkit_version: Option<String>,
	/// Browser-level control socket.
	#[serde(rename = "webSocketDebuggerUrl", default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_list_entry() {
		let json = r#"{
			"description": "",
			"devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9222/devtools/page/ABC",
			"id": "ABC",
			"title": "Example Domain",
			"type": "page",
			"url": "https://example.com/",
			"webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/ABC"
		}"#;
		let target: TargetInfo = serde_json::from_str(json).unwrap();
		assert_eq!(target.id, "ABC");
		assert_eq!(target.title, "Example Domain");
		assert!(target.is_page());
		assert_eq!(
			target.web_socket_debugger_url.as_deref(),
			Some("ws://127.0.0.1:9222/devtools/page/ABC")
		);
	}

	#[test]
	fn attached_target_has_no_socket_address() {
		let target: TargetInfo = serde_json::from_str(r#"{"id": "X", "type": "page"}"#).unwrap();
		assert!(target.web_socket_debugger_url.is_none());
		assert_eq!(target.title, "");
	}

	#[test]
	fn decodes_version_metadata() {
		let json = r#"{
			"Browser": "Chrome/126.0.6478.126",
			"Protocol-Version": "1.3",
			"User-Agent": "Mozilla/5.0",
			"V8-Version": "12.6.228.21",
			"WebKit-Version": "537.36",
			"webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/0b1c"
		}"#;
		let info: VersionInfo = serde_json::from_str(json).unwrap();
		assert_eq!(info.protocol_version, "1.3");
		assert_eq!(info.browser, "Chrome/126.0.6478.126");
		assert!(info.web_socket_debugger_url.is_some());
	}

	#[test]
	fn version_without_protocol_is_rejected() {
		assert!(serde_json::from_str::<VersionInfo>(r#"{"Browser": "Chrome"}"#).is_err());
	}
}
