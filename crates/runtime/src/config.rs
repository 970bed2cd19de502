//! Launch and connection configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Default port for the browser's debugging HTTP endpoint.
pub const DEFAULT_DEBUGGING_PORT: u16 = 9222;
/// Default bind address for the debugging endpoint.
pub const DEFAULT_DEBUGGING_ADDRESS: &str = "127.0.0.1";

pub(crate) const PORT_FLAG: &str = "remote-debugging-port";
pub(crate) const ADDRESS_FLAG: &str = "remote-debugging-address";

/// Ordered set of command-line switches.
///
/// A flag with a value renders as `--name=value`, one without as `--name`.
/// Setting a name twice keeps its original position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
	entries: IndexMap<String, Option<String>>,
}

impl Flags {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a valued flag.
	pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
		self.entries.insert(normalize_flag(name.as_ref()), Some(value.into()));
		self
	}

	/// Sets a boolean flag.
	pub fn switch(&mut self, name: impl AsRef<str>) -> &mut Self {
		self.entries.insert(normalize_flag(name.as_ref()), None);
		self
	}

	pub fn remove(&mut self, name: &str) -> Option<Option<String>> {
		self.entries.shift_remove(&normalize_flag(name))
	}

	pub fn get(&self, name: &str) -> Option<Option<&str>> {
		self.entries.get(&normalize_flag(name)).map(|v| v.as_deref())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(&normalize_flag(name))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Overlays `other` on top of `self`; values in `other` win.
	pub fn merge(&mut self, other: &Flags) {
		for (name, value) in &other.entries {
			self.entries.insert(name.clone(), value.clone());
		}
	}

	/// Renders the command-line arguments in insertion order.
	pub fn to_args(&self) -> Vec<String> {
		self.entries
			.iter()
			.map(|(name, value)| match value {
				Some(v) => format!("--{name}={v}"),
				None => format!("--{name}"),
			})
			.collect()
	}
}

impl<K, V> FromIterator<(K, Option<V>)> for Flags
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
		let mut flags = Flags::new();
		for (name, value) in iter {
			match value {
				Some(v) => flags.set(name, v),
				None => flags.switch(name),
			};
		}
		flags
	}
}

fn normalize_flag(name: &str) -> String {
	name.trim_start_matches('-').to_string()
}

/// Where the browser's stdout/stderr go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputCapture {
	/// Share the parent's standard streams.
	Inherit,
	/// Discard output.
	#[default]
	Null,
	/// Append both streams to one file, created if missing.
	File(PathBuf),
}

/// Bounded polling of the version endpoint after spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
	/// Delay before each attempt.
	pub interval: Duration,
	/// Maximum number of attempts before giving up.
	pub max_attempts: u32,
	/// Per-attempt HTTP timeout.
	pub attempt_timeout: Duration,
}

impl Default for ReadinessPolicy {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(250),
			max_attempts: 20,
			attempt_timeout: Duration::from_secs(1),
		}
	}
}

/// Everything needed to start a supervised browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Browser binary. `None` means discover one, see [`find_browser_executable`](crate::find_browser_executable).
	pub executable: Option<PathBuf>,
	/// Working directory; created if absent.
	pub workdir: PathBuf,
	/// Caller flags, overlaid on the injected defaults.
	pub flags: Flags,
	pub output: OutputCapture,
	pub readiness: ReadinessPolicy,
	pub address: String,
	pub port: u16,
	pub headless: bool,
	/// Profile directory; defaults to `<workdir>/profile`.
	pub user_data_dir: Option<PathBuf>,
	/// How long `close` waits after the interrupt before force-killing.
	pub shutdown_grace: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self::new(std::env::temp_dir().join("cdp-rs"))
	}
}

impl LaunchOptions {
	pub fn new(workdir: impl Into<PathBuf>) -> Self {
		Self {
			executable: None,
			workdir: workdir.into(),
			flags: Flags::new(),
			output: OutputCapture::default(),
			readiness: ReadinessPolicy::default(),
			address: DEFAULT_DEBUGGING_ADDRESS.to_string(),
			port: DEFAULT_DEBUGGING_PORT,
			headless: false,
			user_data_dir: None,
			shutdown_grace: Duration::from_secs(5),
		}
	}

	pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
		self.executable = Some(path.into());
		self
	}

	pub fn with_flags(mut self, flags: Flags) -> Self {
		self.flags = flags;
		self
	}

	pub fn with_output(mut self, output: OutputCapture) -> Self {
		self.output = output;
		self
	}

	pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
		self.readiness = readiness;
		self
	}

	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	pub fn with_address(mut self, address: impl Into<String>) -> Self {
		self.address = address.into();
		self
	}

	pub fn headless(mut self, headless: bool) -> Self {
		self.headless = headless;
		self
	}

	pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.user_data_dir = Some(dir.into());
		self
	}

	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	fn profile_dir(&self) -> PathBuf {
		self.user_data_dir.clone().unwrap_or_else(|| self.workdir.join("profile"))
	}

	/// Injected defaults overlaid with the caller's flags.
	pub fn effective_flags(&self) -> Flags {
		let mut flags = Flags::new();
		flags
			.set(PORT_FLAG, self.port.to_string())
			.set(ADDRESS_FLAG, &self.address)
			.set("user-data-dir", self.profile_dir().display().to_string())
			.switch("no-first-run")
			.switch("no-default-browser-check");
		if self.headless {
			flags.set("headless", "new");
		}
		flags.merge(&self.flags);
		flags
	}

	/// HTTP base URL the launched browser will serve, honouring flag overrides.
	pub fn endpoint(&self) -> Result<String> {
		let flags = self.effective_flags();
		let port = match flags.get(PORT_FLAG) {
			Some(Some(raw)) => raw
				.parse::<u16>()
				.map_err(|_| Error::InvalidArgument(format!("invalid {PORT_FLAG} value '{raw}'")))?,
			_ => self.port,
		};
		if port == 0 {
			return Err(Error::InvalidArgument(format!("{PORT_FLAG} must be a fixed, non-zero port")));
		}
		let address = match flags.get(ADDRESS_FLAG) {
			Some(Some(addr)) => addr.to_string(),
			_ => self.address.clone(),
		};
		Ok(http_endpoint(&address, port))
	}

	pub fn workdir(&self) -> &Path {
		&self.workdir
	}
}

/// Builds `http://host:port`, bracketing bare IPv6 addresses.
pub fn http_endpoint(address: &str, port: u16) -> String {
	if address.contains(':') && !address.starts_with('[') {
		format!("http://[{address}]:{port}")
	} else {
		format!("http://{address}:{port}")
	}
}

/// Per-connection behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
	/// Applied by [`Connection::send`](crate::Connection::send). `None` waits forever.
	pub command_timeout: Option<Duration>,
	/// Consecutive undecodable frames that close the connection. `0` never closes.
	pub max_malformed_frames: u32,
	/// Notification occurrences whose handlers may run at once.
	pub event_concurrency: usize,
}

impl Default for ConnectionOptions {
	fn default() -> Self {
		Self {
			command_timeout: Some(Duration::from_secs(30)),
			max_malformed_frames: 16,
			event_concurrency: 64,
		}
	}
}

impl ConnectionOptions {
	pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.command_timeout = timeout;
		self
	}

	pub fn with_max_malformed_frames(mut self, max: u32) -> Self {
		self.max_malformed_frames = max;
		self
	}

	pub fn with_event_concurrency(mut self, limit: usize) -> Self {
		self.event_concurrency = limit.max(1);
		self
	}
}
