//! Thin per-domain adapters.
//!
//! Each method builds one `{method, params}` payload, sends it through
//! [`Connection::send`](cdp_runtime::Connection::send) and decodes the typed
//! result. No state is kept between calls.

mod network;
mod page;
mod runtime;
mod target;

pub use network::Network;
pub use page::{NavigateResult, Page, ScreenshotFormat};
pub use runtime::{EvaluateResult, ExceptionDetails, RemoteObject, Runtime};
pub use target::Target;
