use std::path::PathBuf;

use anyhow::Context;
use cdp::{Browser, Flags, LaunchOptions, OutputCapture};
use serde_json::json;
use tracing::info;

use super::emit;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

pub struct LaunchArgs {
	pub host: String,
	pub port: u16,
	pub executable: Option<PathBuf>,
	pub workdir: Option<PathBuf>,
	pub headless: bool,
	pub flags: Vec<String>,
	pub log_file: Option<PathBuf>,
}

impl LaunchArgs {
	fn to_options(&self) -> Result<LaunchOptions> {
		let workdir = self
			.workdir
			.clone()
			.unwrap_or_else(|| std::env::temp_dir().join(format!("cdpctl-{}", self.port)));
		let mut options = LaunchOptions::new(workdir)
			.with_address(self.host.clone())
			.with_port(self.port)
			.headless(self.headless)
			.with_flags(parse_flags(&self.flags)?);
		if let Some(executable) = &self.executable {
			options = options.with_executable(executable.clone());
		}
		if let Some(log_file) = &self.log_file {
			options = options.with_output(OutputCapture::File(log_file.clone()));
		}
		Ok(options)
	}
}

pub async fn execute(args: LaunchArgs, format: OutputFormat) -> Result<()> {
	let options = args.to_options()?;
	let browser = Browser::launch(&options).await?;
	let endpoint = browser.registry().endpoint().to_string();
	info!(%endpoint, browser = %browser.version().browser, "browser ready");

	emit(
		"launch",
		json!({
			"endpoint": endpoint,
			"browser": browser.version().browser,
			"protocolVersion": browser.version().protocol_version,
			"webSocketDebuggerUrl": browser.version().web_socket_debugger_url,
		}),
		format,
	);

	let waited = tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c");
	info!("shutting down browser");
	browser.close().await?;
	waited.map_err(CliError::from)
}

/// Parses `name` and `name=value` pairs; leading dashes are optional.
fn parse_flags(raw: &[String]) -> Result<Flags> {
	let mut flags = Flags::new();
	for entry in raw {
		match entry.split_once('=') {
			Some((name, _)) if name.trim_start_matches('-').is_empty() => {
				return Err(CliError::InvalidInput(format!("flag without a name: {entry}")));
			}
			Some((name, value)) => {
				flags.set(name, value);
			}
			None if entry.trim_start_matches('-').is_empty() => {
				return Err(CliError::InvalidInput("empty flag".into()));
			}
			None => {
				flags.switch(entry);
			}
		}
	}
	Ok(flags)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_accept_switches_and_values() {
		let flags = parse_flags(&["--disable-gpu".into(), "window-size=800,600".into()]).unwrap();
		assert_eq!(flags.to_args(), vec!["--disable-gpu", "--window-size=800,600"]);
	}

	#[test]
	fn nameless_flags_are_rejected() {
		assert!(matches!(parse_flags(&["=1".into()]), Err(CliError::InvalidInput(_))));
		assert!(matches!(parse_flags(&["--".into()]), Err(CliError::InvalidInput(_))));
	}

	#[test]
	fn options_follow_global_endpoint() {
		let args = LaunchArgs {
			host: "127.0.0.1".into(),
			port: 9333,
			executable: Some("/opt/chrome".into()),
			workdir: Some("/tmp/profile".into()),
			headless: true,
			flags: vec!["mute-audio".into()],
			log_file: None,
		};
		let options = args.to_options().unwrap();
		assert_eq!(options.endpoint().unwrap(), "http://127.0.0.1:9333");
		assert_eq!(options.workdir(), std::path::Path::new("/tmp/profile"));
		assert!(options.effective_flags().contains("mute-audio"));
	}
}
