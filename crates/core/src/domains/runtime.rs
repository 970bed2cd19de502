//! `Runtime.*` commands.

use cdp_runtime::{Connection, Result};
use serde::Deserialize;
use serde_json::{Value, json};

/// Runtime-domain adapter over one connection.
#[derive(Debug, Clone)]
pub struct Runtime {
	connection: Connection,
}

/// Mirror of a JavaScript value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub subtype: Option<String>,
	#[serde(default)]
	pub class_name: Option<String>,
	/// Present for primitives and for objects returned by value.
	#[serde(default)]
	pub value: Option<Value>,
	#[serde(default)]
	pub description: Option<String>,
}

/// Details of an exception thrown by evaluated code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
	#[serde(default)]
	pub column_number: i64,
	#[serde(default)]
	pub exception: Option<RemoteObject>,
}

/// Result of `Runtime.evaluate`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

impl Runtime {
	pub fn new(connection: Connection) -> Self {
		Self { connection }
	}

	/// `Runtime.evaluate`, awaiting promises and returning the value by value.
	pub async fn evaluate(&self, expression: &str) -> Result<EvaluateResult> {
		let params = json!({
			"expression": expression,
			"returnByValue": true,
			"awaitPromise": true,
		});
		self.connection.call("Runtime.evaluate", &params).await
	}
}
