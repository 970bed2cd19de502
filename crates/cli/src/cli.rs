use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "cdpctl")]
#[command(about = "Drive a Chromium-based browser over its remote debugging endpoint")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Debugging endpoint host
	#[arg(long, global = true, default_value = cdp::DEFAULT_DEBUGGING_ADDRESS)]
	pub host: String,

	/// Debugging endpoint port
	#[arg(long, global = true, default_value_t = cdp::DEFAULT_DEBUGGING_PORT)]
	pub port: u16,

	#[command(subcommand)]
	pub command: Commands,
}

impl Cli {
	/// `http://host:port` of the endpoint the global flags point at.
	pub fn endpoint(&self) -> String {
		cdp::http_endpoint(&self.host, self.port)
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Print browser and protocol version
	Version,

	/// List debuggable targets
	#[command(alias = "ls")]
	Tabs {
		/// Include non-page targets (workers, iframes, extensions)
		#[arg(long)]
		all: bool,
	},

	/// Open a new tab
	Open {
		/// URL to load in the new tab
		#[arg(default_value = "about:blank")]
		url: String,
	},

	/// Close a target
	Close {
		/// Target id as printed by `tabs`
		id: String,
	},

	/// Bring a target to the foreground
	Activate {
		/// Target id as printed by `tabs`
		id: String,
	},

	/// Send one protocol command and print its result
	Send {
		/// Fully qualified method, e.g. Page.navigate
		method: String,
		/// Parameters as a JSON object
		params: Option<String>,
		/// Target id (defaults to the first page)
		#[arg(short, long, value_name = "ID")]
		target: Option<String>,
		/// Give up after this many milliseconds
		#[arg(long, value_name = "MS", default_value_t = 30_000)]
		timeout: u64,
	},

	/// Print notifications as they arrive
	Watch {
		/// Notification names, e.g. Network.requestWillBeSent
		#[arg(required = true)]
		events: Vec<String>,
		/// Target id (defaults to the first page)
		#[arg(short, long, value_name = "ID")]
		target: Option<String>,
		/// Exit after this many notifications
		#[arg(short = 'n', long)]
		count: Option<usize>,
		/// Do not send `<Domain>.enable` for the watched domains
		#[arg(long)]
		no_enable: bool,
	},

	/// Launch a browser and keep it running until interrupted
	Launch {
		/// Browser binary (defaults to discovery, see CDP_BROWSER_PATH)
		#[arg(long, value_name = "PATH")]
		executable: Option<PathBuf>,
		/// Working directory for the profile and logs
		#[arg(long, value_name = "DIR")]
		workdir: Option<PathBuf>,
		/// Run without a visible window
		#[arg(long)]
		headless: bool,
		/// Extra browser flag, `name` or `name=value` (repeatable)
		#[arg(long = "flag", value_name = "FLAG", action = clap::ArgAction::Append)]
		flags: Vec<String>,
		/// Append browser stdout/stderr to this file
		#[arg(long, value_name = "FILE")]
		log_file: Option<PathBuf>,
	},
}

impl Commands {
	/// Name reported in the output envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Version => "version",
			Commands::Tabs { .. } => "tabs",
			Commands::Open { .. } => "open",
			Commands::Close { .. } => "close",
			Commands::Activate { .. } => "activate",
			Commands::Send { .. } => "send",
			Commands::Watch { .. } => "watch",
			Commands::Launch { .. } => "launch",
		}
	}
}
