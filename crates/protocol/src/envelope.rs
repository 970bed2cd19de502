//! Socket-level envelopes exchanged with a debugging target.
//!
//! Every frame on the socket is a single JSON object. Outbound frames are
//! always [`Request`]s. Inbound frames are either a [`Response`] (carries the
//! `id` of the request it answers) or an [`Event`] (carries a `method` and no
//! `id`). [`Message`] is the discriminated union the read loop decodes into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification emitted by a target whose renderer has crashed.
pub const TARGET_CRASHED: &str = "Inspector.targetCrashed";

/// Outbound command frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Connection-unique, strictly increasing identifier.
	pub id: u64,
	/// Fully qualified method name, e.g. `Page.navigate`.
	pub method: String,
	/// Method parameters. Serialized as `{}` when the caller passes nothing.
	#[serde(default = "empty_object")]
	pub params: Value,
	/// Flattened session the command is addressed to, if any.
	#[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

impl Request {
	pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
		Self {
			id,
			method: method.into(),
			params: normalize_params(params),
			session_id: None,
		}
	}
}

/// Inbound reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Identifier of the request this answers.
	pub id: u64,
	/// Success payload (mutually exclusive with `error` on a well-behaved peer).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Remote-reported command failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// JSON-RPC style error code (e.g. `-32601` for an unknown method).
	pub code: i64,
	pub message: String,
	/// Optional free-form detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Inbound notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// Notification name, e.g. `Network.requestWillBeSent`.
	pub method: String,
	/// Notification payload; `null` when the peer omits it.
	#[serde(default)]
	pub params: Value,
	#[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

impl Event {
	/// Returns `true` for the crash notification that ends a connection.
	pub fn is_target_crashed(&self) -> bool {
		self.method == TARGET_CRASHED
	}
}

/// Discriminated union of inbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Response message (has `id` field)
	Response(Response),
	/// Event message (has `method`, no `id`)
	Event(Event),
	/// JSON object matching neither shape (forward-compatible catch-all).
	/// Anything that is not an object fails to parse.
	Unknown(serde_json::Map<String, Value>),
}

impl Message {
	/// Decodes one text frame.
	pub fn parse(text: &str) -> serde_json::Result<Self> {
		serde_json::from_str(text)
	}
}

fn empty_object() -> Value {
	Value::Object(serde_json::Map::new())
}

/// Maps a missing (`null`) parameter payload to `{}`; browsers reject `null` params.
pub fn normalize_params(params: Value) -> Value {
	if params.is_null() { empty_object() } else { params }
}
