//! Browser executable discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable that overrides discovery.
pub const BROWSER_PATH_ENV: &str = "CDP_BROWSER_PATH";

/// Locates a Chromium-family browser.
///
/// Checks in order:
/// 1. `CDP_BROWSER_PATH` (must point at an existing file)
/// 2. Well-known executable names on `PATH`
/// 3. Well-known absolute install locations for the current OS
///
/// # Errors
///
/// Returns [`Error::BrowserNotFound`] if nothing matches.
pub fn find_browser_executable() -> Result<PathBuf> {
	if let Ok(path) = std::env::var(BROWSER_PATH_ENV) {
		let path = PathBuf::from(path);
		if path.exists() {
			debug!(path = %path.display(), "using browser from {BROWSER_PATH_ENV}");
			return Ok(path);
		}
		debug!(path = %path.display(), "{BROWSER_PATH_ENV} points at a missing file, falling back to discovery");
	}

	for candidate in candidates() {
		if let Some(path) = resolve_candidate(&candidate) {
			debug!(path = %path.display(), "discovered browser executable");
			return Ok(path);
		}
	}

	Err(Error::BrowserNotFound)
}

fn resolve_candidate(candidate: &str) -> Option<PathBuf> {
	if is_absolute_candidate(candidate) {
		let path = Path::new(candidate);
		path.exists().then(|| path.to_path_buf())
	} else {
		which::which(candidate).ok()
	}
}

fn is_absolute_candidate(candidate: &str) -> bool {
	candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':')
}

fn candidates() -> Vec<String> {
	if cfg!(target_os = "macos") {
		[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"microsoft-edge",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	}
}

fn windows_candidates() -> Vec<String> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| std::env::var(key).ok())
		.map(PathBuf::from)
		.collect();
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates = Vec::new();
	for root in roots {
		for suffix in suffixes {
			let path = suffix.iter().fold(root.clone(), |path, part| path.join(part));
			candidates.push(path.to_string_lossy().to_string());
		}
	}
	candidates.extend(["chrome.exe", "msedge.exe", "chromium.exe"].map(str::to_string));
	candidates
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn absolute_candidates_are_detected() {
		assert!(is_absolute_candidate("/usr/bin/chromium"));
		assert!(is_absolute_candidate(r"C:\Program Files\Google\Chrome\Application\chrome.exe"));
		assert!(!is_absolute_candidate("chromium"));
	}

	#[test]
	fn missing_absolute_candidate_resolves_to_none() {
		assert!(resolve_candidate("/definitely/not/a/browser").is_none());
	}

	#[test]
	fn candidate_list_is_never_empty() {
		assert!(!candidates().is_empty());
	}

	#[test]
	fn discovery_returns_existing_path_or_not_found() {
		match find_browser_executable() {
			Ok(path) => assert!(path.exists()),
			Err(Error::BrowserNotFound) => {}
			Err(e) => panic!("unexpected error: {e:?}"),
		}
	}
}
