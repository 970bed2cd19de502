//! Caller-owned handle to one browser.

use std::sync::Arc;

use cdp_protocol::{TargetInfo, VersionInfo};
use cdp_runtime::{
	BrowserProcess, Connection, ConnectionOptions, ConnectionState, Error, LaunchOptions, Result, TargetRegistry,
};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

use crate::domains::{Network, Page, Runtime, Target};

/// Why a connection stopped being usable, passed to the termination hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
	/// Socket address of the connection that ended.
	pub endpoint: String,
	/// Target the connection belonged to, when known.
	pub target_id: Option<String>,
	pub state: ConnectionState,
}

type TerminationHook = Arc<dyn Fn(Termination) + Send + Sync>;

/// A launched or attached browser.
///
/// Owns the supervised process (when launched), the discovery client and
/// every connection opened through it. Nothing here is global: create as many
/// handles as there are browsers.
pub struct Browser {
	process: AsyncMutex<Option<BrowserProcess>>,
	registry: TargetRegistry,
	version: VersionInfo,
	connection_options: ConnectionOptions,
	connections: Mutex<Vec<Connection>>,
	on_terminated: Arc<Mutex<Option<TerminationHook>>>,
}

impl Browser {
	/// Starts a browser and waits for its debugging endpoint.
	///
	/// # Errors
	///
	/// Returns any launch error from [`BrowserProcess::launch`].
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let process = BrowserProcess::launch(options).await?;
		let registry = process.registry()?;
		let version = process.version().clone();
		Ok(Self::from_parts(Some(process), registry, version))
	}

	/// Attaches to a browser that is already running at `endpoint`.
	///
	/// The process is not owned: [`Browser::close`] only closes connections.
	pub async fn attach(endpoint: &str) -> Result<Self> {
		let registry = TargetRegistry::new(endpoint)?;
		let version = registry.version().await?;
		info!(endpoint, browser = %version.browser, "attached to browser");
		Ok(Self::from_parts(None, registry, version))
	}

	fn from_parts(process: Option<BrowserProcess>, registry: TargetRegistry, version: VersionInfo) -> Self {
		Self {
			process: AsyncMutex::new(process),
			registry,
			version,
			connection_options: ConnectionOptions::default(),
			connections: Mutex::new(Vec::new()),
			on_terminated: Arc::new(Mutex::new(None)),
		}
	}

	/// Options applied to connections opened after this call.
	pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
		self.connection_options = options;
		self
	}

	/// Registers the hook invoked when a connection reports a target crash.
	///
	/// Replaces any previously registered hook.
	pub fn on_terminated<F>(&self, hook: F)
	where
		F: Fn(Termination) + Send + Sync + 'static,
	{
		*self.on_terminated.lock() = Some(Arc::new(hook));
	}

	pub fn registry(&self) -> &TargetRegistry {
		&self.registry
	}

	/// Target adapter bound to this browser's discovery endpoint.
	pub fn target(&self) -> Target {
		Target::new(self.registry.clone())
	}

	/// Version metadata captured at launch or attach time.
	pub fn version(&self) -> &VersionInfo {
		&self.version
	}

	/// Lists debuggable targets.
	pub async fn targets(&self) -> Result<Vec<TargetInfo>> {
		self.registry.list_targets().await
	}

	/// Lists top-level tabs only.
	pub async fn pages(&self) -> Result<Vec<TargetInfo>> {
		let targets = self.targets().await?;
		Ok(targets.into_iter().filter(TargetInfo::is_page).collect())
	}

	/// Opens a connection to `target`.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] if the target exposes no socket
	/// (typically because another client is attached), or a dial error.
	pub async fn connect(&self, target: &TargetInfo) -> Result<Connection> {
		let url = target.web_socket_debugger_url.as_deref().ok_or_else(|| {
			Error::InvalidArgument(format!("target {} has no webSocketDebuggerUrl", target.id))
		})?;
		let connection = Connection::open_with(url, self.connection_options).await?;
		self.track(&connection, Some(target.id.clone()));
		Ok(connection)
	}

	/// Opens a new tab at `url` and connects to it.
	pub async fn new_tab(&self, url: &str) -> Result<Tab> {
		let info = self.registry.new_target(url).await?;
		let connection = self.connect(&info).await?;
		Ok(Tab { info, connection })
	}

	/// Connects to the first existing tab, opening one if there is none.
	pub async fn first_tab(&self) -> Result<Tab> {
		match self.pages().await?.into_iter().next() {
			Some(info) => {
				let connection = self.connect(&info).await?;
				Ok(Tab { info, connection })
			}
			None => self.new_tab("about:blank").await,
		}
	}

	/// Closes every connection opened through this handle, then the browser
	/// process if it was launched here. Safe to call more than once.
	pub async fn close(&self) -> Result<()> {
		let connections = std::mem::take(&mut *self.connections.lock());
		for connection in connections {
			connection.close().await;
		}
		if let Some(mut process) = self.process.lock().await.take() {
			process.close().await?;
		}
		Ok(())
	}

	/// Returns `true` if this handle owns the browser process.
	pub async fn owns_process(&self) -> bool {
		self.process.lock().await.is_some()
	}

	fn track(&self, connection: &Connection, target_id: Option<String>) {
		{
			let mut connections = self.connections.lock();
			connections.retain(|c| c.state().is_open());
			connections.push(connection.clone());
		}

		let mut state = connection.watch_state();
		let endpoint = connection.endpoint().to_string();
		let hook = Arc::clone(&self.on_terminated);
		tokio::spawn(async move {
			let final_state = match state.wait_for(|s| !s.is_open()).await {
				Ok(s) => *s,
				Err(_) => ConnectionState::Closed,
			};
			if final_state != ConnectionState::Crashed {
				debug!(%endpoint, "connection closed");
				return;
			}
			error!(%endpoint, target = ?target_id, "target crashed");
			let hook = hook.lock().clone();
			if let Some(hook) = hook {
				hook(Termination {
					endpoint,
					target_id,
					state: final_state,
				});
			}
		});
	}
}

impl std::fmt::Debug for Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Browser")
			.field("endpoint", &self.registry.endpoint().as_str())
			.field("browser", &self.version.browser)
			.field("connections", &self.connections.lock().len())
			.finish_non_exhaustive()
	}
}

/// A target together with an open connection to it.
#[derive(Debug, Clone)]
pub struct Tab {
	pub info: TargetInfo,
	connection: Connection,
}

impl Tab {
	pub fn connection(&self) -> &Connection {
		&self.connection
	}

	pub fn page(&self) -> Page {
		Page::new(self.connection.clone())
	}

	pub fn runtime(&self) -> Runtime {
		Runtime::new(self.connection.clone())
	}

	pub fn network(&self) -> Network {
		Network::new(self.connection.clone())
	}
}
