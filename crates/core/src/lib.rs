//! Remote control for Chromium-based browsers.
//!
//! ```ignore
//! use cdp::{Browser, LaunchOptions};
//!
//! let browser = Browser::launch(&LaunchOptions::new("/tmp/cdp").headless(true)).await?;
//! let tab = browser.new_tab("https://example.com").await?;
//! let navigated = tab.page().navigate("https://example.org").await?;
//! let title = tab.runtime().evaluate("document.title").await?;
//! browser.close().await?;
//! ```
//!
//! [`Browser`] is an ordinary value: launch or attach as many as needed and
//! pass them where they are used. Everything below it (process supervision,
//! discovery, the connection and its event router) lives in `cdp-runtime` and
//! is re-exported here.

mod browser;
pub mod domains;

pub use browser::{Browser, Tab, Termination};
pub use cdp_protocol::{Event, Message, TargetInfo, VersionInfo};
pub use cdp_runtime::{
	BROWSER_PATH_ENV, BrowserProcess, Connection, ConnectionOptions, ConnectionState, DEFAULT_DEBUGGING_ADDRESS,
	DEFAULT_DEBUGGING_PORT, Error, EventHandler, EventRouter, Flags, HandlerId, LaunchOptions, OutputCapture,
	ReadinessPolicy, Result, TargetRegistry, http_endpoint,
};
pub use domains::{EvaluateResult, NavigateResult, Network, Page, RemoteObject, Runtime, ScreenshotFormat, Target};
