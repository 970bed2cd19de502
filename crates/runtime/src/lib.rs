//! Browser runtime - process supervision, target discovery, and the protocol
//! connection
//!
//! This crate is the part of the workspace that does I/O:
//!
//! - **Supervisor**: launching the browser, polling it until its debugging
//!   endpoint answers, and shutting it down
//! - **Registry**: the HTTP `/json/*` discovery surface
//! - **Transport**: WebSocket or NUL-delimited pipe framing
//! - **Connection**: id correlation for commands and notification fan-out
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  BrowserProcess  │  spawn, readiness, shutdown
//! └────────┬─────────┘
//!          │ http://address:port
//! ┌────────▼─────────┐
//! │  TargetRegistry  │  /json/version, /json/list, ...
//! └────────┬─────────┘
//!          │ webSocketDebuggerUrl
//! ┌────────▼─────────┐
//! │    Connection    │  write lock + pending table
//! │  ┌────────────┐  │
//! │  │ read loop  │──┼──▶ EventRouter
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod locate;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use config::{
	ConnectionOptions, DEFAULT_DEBUGGING_ADDRESS, DEFAULT_DEBUGGING_PORT, Flags, LaunchOptions, OutputCapture,
	ReadinessPolicy, http_endpoint,
};
pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use events::{EventHandler, EventRouter, HandlerFuture, HandlerId};
pub use locate::{BROWSER_PATH_ENV, find_browser_executable};
pub use registry::{ReadinessProbe, TargetRegistry};
pub use supervisor::BrowserProcess;
pub use transport::{PipeTransport, TransportParts, TransportReceiver, TransportSender, WebSocketTransport};
