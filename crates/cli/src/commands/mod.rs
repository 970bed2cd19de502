mod discovery;
mod launch;
mod send;
mod watch;

use cdp::{Browser, Connection, ConnectionOptions, TargetInfo};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use crate::output::{self, CommandResult, OutputFormat};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let endpoint = cli.endpoint();
	let format = cli.format;
	let name = cli.command.name();

	match cli.command {
		Commands::Version => discovery::version(&endpoint, format).await,
		Commands::Tabs { all } => discovery::tabs(&endpoint, all, format).await,
		Commands::Open { url } => discovery::open(&endpoint, &url, format).await,
		Commands::Close { id } => discovery::close(&endpoint, &id, name, format).await,
		Commands::Activate { id } => discovery::activate(&endpoint, &id, name, format).await,
		Commands::Send {
			method,
			params,
			target,
			timeout,
		} => send::execute(&endpoint, &method, params.as_deref(), target.as_deref(), timeout, format).await,
		Commands::Watch {
			events,
			target,
			count,
			no_enable,
		} => watch::execute(&endpoint, &events, target.as_deref(), count, !no_enable, format).await,
		Commands::Launch {
			executable,
			workdir,
			headless,
			flags,
			log_file,
		} => {
			let args = launch::LaunchArgs {
				host: cli.host,
				port: cli.port,
				executable,
				workdir,
				headless,
				flags,
				log_file,
			};
			launch::execute(args, format).await
		}
	}
}

fn emit<T: Serialize>(command: &str, data: T, format: OutputFormat) {
	output::print_result(&CommandResult::success(command, data), format);
}

/// Attaches to `endpoint` and connects to `target`, or to the first page
/// when no id is given.
async fn connect(
	endpoint: &str,
	target: Option<&str>,
	options: ConnectionOptions,
) -> Result<(Browser, TargetInfo, Connection)> {
	let browser = Browser::attach(endpoint).await?.with_connection_options(options);
	let (info, connection) = match target {
		Some(id) => {
			let info = browser
				.targets()
				.await?
				.into_iter()
				.find(|t| t.id == id)
				.ok_or_else(|| CliError::TargetNotFound(id.to_string()))?;
			let connection = browser.connect(&info).await?;
			(info, connection)
		}
		None => {
			let tab = browser.first_tab().await?;
			let connection = tab.connection().clone();
			(tab.info, connection)
		}
	};
	debug!(target = %info.id, url = %info.url, "connected");
	Ok((browser, info, connection))
}
