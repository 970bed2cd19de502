//! Browser process supervision.
//!
//! Spawns the browser with its debugging endpoint enabled, polls `/json/version`
//! until it answers, and tears the process down again. A failed launch never
//! leaves a running child behind.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use cdp_protocol::VersionInfo;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::{LaunchOptions, OutputCapture, ReadinessPolicy};
use crate::error::{Error, Result};
use crate::locate::find_browser_executable;
use crate::registry::{ReadinessProbe, TargetRegistry};

/// A running, supervised browser.
///
/// Dropping an unclosed handle kills the process; call [`close`](Self::close)
/// for a graceful shutdown.
#[derive(Debug)]
pub struct BrowserProcess {
	child: Option<Child>,
	pid: Option<u32>,
	executable: PathBuf,
	workdir: PathBuf,
	endpoint: String,
	version: VersionInfo,
	attempts: u32,
	shutdown_grace: Duration,
}

impl BrowserProcess {
	/// Launches a browser and waits until its debugging endpoint is ready.
	///
	/// # Errors
	///
	/// Returns a launch error ([`Error::is_launch_error`]) if the binary is
	/// missing, the working directory or output file cannot be prepared, the
	/// process fails to start or exits early, or readiness polling runs out of
	/// attempts.
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let endpoint = options.endpoint()?;
		let probe = TargetRegistry::with_timeout(&endpoint, options.readiness.attempt_timeout)?;
		Self::launch_with_probe(options, &probe).await
	}

	/// Like [`launch`](Self::launch), polling `probe` instead of the HTTP endpoint.
	pub async fn launch_with_probe<P: ReadinessProbe>(options: &LaunchOptions, probe: &P) -> Result<Self> {
		let endpoint = options.endpoint()?;
		let executable = resolve_executable(options)?;

		std::fs::create_dir_all(&options.workdir).map_err(|source| Error::Workdir {
			path: options.workdir.clone(),
			source,
		})?;
		let (stdout, stderr) = output_streams(&options.output)?;

		let args = options.effective_flags().to_args();
		debug!(executable = %executable.display(), ?args, "spawning browser");

		let mut cmd = Command::new(&executable);
		cmd.args(&args)
			.current_dir(&options.workdir)
			.stdin(Stdio::null())
			.stdout(stdout)
			.stderr(stderr)
			.kill_on_drop(true);

		#[cfg(unix)]
		cmd.process_group(0);

		let mut child = cmd
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("failed to spawn {}: {e}", executable.display())))?;
		let pid = child.id();
		info!(pid, executable = %executable.display(), "browser process started");

		match poll_until_ready(&mut child, probe, &options.readiness).await {
			Ok((version, attempts)) => {
				info!(pid, attempts, browser = %version.browser, protocol = %version.protocol_version, "browser ready");
				Ok(Self {
					child: Some(child),
					pid,
					executable,
					workdir: options.workdir.clone(),
					endpoint,
					version,
					attempts,
					shutdown_grace: options.shutdown_grace,
				})
			}
			Err(e) => {
				warn!(pid, error = %e, "browser did not become ready, terminating");
				terminate(&mut child, pid, Duration::ZERO).await;
				Err(e)
			}
		}
	}

	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	pub fn executable(&self) -> &Path {
		&self.executable
	}

	pub fn workdir(&self) -> &Path {
		&self.workdir
	}

	/// HTTP base URL of the debugging endpoint.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Version metadata captured by the successful readiness probe.
	pub fn version(&self) -> &VersionInfo {
		&self.version
	}

	/// Number of readiness attempts the launch took.
	pub fn readiness_attempts(&self) -> u32 {
		self.attempts
	}

	/// Discovery client for this browser.
	pub fn registry(&self) -> Result<TargetRegistry> {
		TargetRegistry::new(&self.endpoint)
	}

	/// Returns `true` while the child has not exited (and has not been closed).
	pub fn is_running(&mut self) -> bool {
		match self.child.as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(None)),
			None => false,
		}
	}

	/// Interrupts the browser, waits up to the configured grace period, then
	/// force-kills. Calling it again after it returned is a no-op.
	pub async fn close(&mut self) -> Result<()> {
		let Some(mut child) = self.child.take() else {
			return Ok(());
		};
		terminate(&mut child, self.pid, self.shutdown_grace).await;
		Ok(())
	}

	/// Force-kills the browser without the interrupt step.
	pub async fn kill(&mut self) -> Result<()> {
		let Some(mut child) = self.child.take() else {
			return Ok(());
		};
		terminate(&mut child, self.pid, Duration::ZERO).await;
		Ok(())
	}
}

impl Drop for BrowserProcess {
	fn drop(&mut self) {
		// `kill_on_drop` only reaches the leader.
		if self.child.is_some() {
			signal_group(self.pid, Signal::Kill);
		}
	}
}

fn resolve_executable(options: &LaunchOptions) -> Result<PathBuf> {
	match &options.executable {
		Some(path) if path.exists() => Ok(path.clone()),
		Some(path) => Err(Error::LaunchFailed(format!(
			"browser executable not found at {}",
			path.display()
		))),
		None => find_browser_executable(),
	}
}

fn output_streams(output: &OutputCapture) -> Result<(Stdio, Stdio)> {
	match output {
		OutputCapture::Inherit => Ok((Stdio::inherit(), Stdio::inherit())),
		OutputCapture::Null => Ok((Stdio::null(), Stdio::null())),
		OutputCapture::File(path) => {
			let open_error = |source| Error::OutputCapture {
				path: path.clone(),
				source,
			};
			if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
				std::fs::create_dir_all(parent).map_err(open_error)?;
			}
			let file: File = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.map_err(open_error)?;
			let stderr = file.try_clone().map_err(open_error)?;
			Ok((Stdio::from(file), Stdio::from(stderr)))
		}
	}
}

/// Polls `probe` at `policy.interval` until it answers or attempts run out.
///
/// Returns the version metadata and the 1-based attempt that succeeded.
async fn poll_until_ready<P: ReadinessProbe>(
	child: &mut Child,
	probe: &P,
	policy: &ReadinessPolicy,
) -> Result<(VersionInfo, u32)> {
	let mut last_error = "endpoint not reachable".to_string();

	for attempt in 1..=policy.max_attempts {
		tokio::time::sleep(policy.interval).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(Error::LaunchFailed(format!(
				"browser exited before its debugging endpoint became available (status: {status})"
			)));
		}

		match probe.probe().await {
			Ok(version) => return Ok((version, attempt)),
			Err(e) => {
				debug!(attempt, max_attempts = policy.max_attempts, error = %e, "readiness probe failed");
				last_error = e.to_string();
			}
		}
	}

	Err(Error::NotReady {
		attempts: policy.max_attempts,
		last_error,
	})
}

/// Stops `child` and everything in its process group, giving it `grace` to
/// exit after an interrupt.
///
/// `pid` is the id recorded at spawn; `child.id()` is gone once the leader
/// has been reaped, but its helpers may still be running.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
	if !grace.is_zero() && signal_group(pid, Signal::Interrupt) {
		match tokio::time::timeout(grace, child.wait()).await {
			Ok(Ok(status)) => {
				info!(pid, %status, "browser exited");
				signal_group(pid, Signal::Kill);
				return;
			}
			Ok(Err(e)) => warn!(pid, error = %e, "failed waiting for browser exit"),
			Err(_) => warn!(pid, grace_ms = grace.as_millis() as u64, "browser ignored interrupt, killing"),
		}
	}

	signal_group(pid, Signal::Kill);
	if let Err(e) = child.kill().await {
		debug!(pid, error = %e, "kill failed (process already gone?)");
	}
	info!(pid, "browser killed");
}

#[derive(Debug, Clone, Copy)]
enum Signal {
	Interrupt,
	Kill,
}

/// Signals the browser's process group. The child leads its own group, so
/// this also reaches renderer and helper processes.
#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: Signal) -> bool {
	let Some(pid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
		return false;
	};
	let signal = match signal {
		Signal::Interrupt => libc::SIGINT,
		Signal::Kill => libc::SIGKILL,
	};
	unsafe { libc::kill(-pid, signal) == 0 }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _signal: Signal) -> bool {
	false
}
