//! Runtime detection for the environment-ready precondition.

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::EngineCommand;

/// Compares dotted version strings segment by segment, numerically.
///
/// A version that is a strict prefix of another is the smaller one, so `1.2.3 < 1.2.3.1`.
/// Non-numeric segments count by their leading digits (`5-preview` is `5`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
	let mut left = a.trim().split('.').map(segment_value);
	let mut right = b.trim().split('.').map(segment_value);
	loop {
		match (left.next(), right.next()) {
			(Some(x), Some(y)) => match x.cmp(&y) {
				Ordering::Equal => continue,
				other => return other,
			},
			(Some(_), None) => return Ordering::Greater,
			(None, Some(_)) => return Ordering::Less,
			(None, None) => return Ordering::Equal,
		}
	}
}

fn segment_value(segment: &str) -> u64 {
	let digits: String = segment.trim().chars().take_while(char::is_ascii_digit).collect();
	digits.parse().unwrap_or(0)
}

/// Extracts the first version-looking token from `--version` output.
///
/// Handles both `8.0.404` and `Mono JIT compiler version 6.12.0.199 (...)`.
pub fn parse_runtime_version(output: &str) -> Option<String> {
	output.lines().next()?.split_whitespace().find_map(|token| {
		let token = token.trim_start_matches('v');
		let looks_like_version = token.starts_with(|c: char| c.is_ascii_digit()) && token.contains('.');
		looks_like_version.then(|| token.to_string())
	})
}

/// A runtime host found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
	/// Resolved executable.
	pub path: PathBuf,
	/// Reported version, if it could be read.
	pub version: Option<String>,
}

/// Resolves `runtime` on `PATH` and asks it for its version.
pub async fn query_runtime(runtime: &str) -> Option<RuntimeInfo> {
	let path = match which::which(runtime) {
		Ok(path) => path,
		Err(e) => {
			tracing::warn!(runtime, error = %e, "Runtime host not found");
			return None;
		}
	};
	let version = match EngineCommand::new(&path).arg("--version").output().await {
		Ok(out) => parse_runtime_version(&out.text),
		Err(e) => {
			tracing::debug!(runtime, error = %e, "Runtime version query failed");
			None
		}
	};
	tracing::debug!(path = %path.display(), ?version, "Runtime host detected");
	Some(RuntimeInfo { path, version })
}

/// Returns true if `runtime` exists and satisfies `min_version`.
///
/// A runtime whose version cannot be read only passes when no minimum is required.
pub async fn check_environment(runtime: &str, min_version: Option<&str>) -> bool {
	let Some(info) = query_runtime(runtime).await else {
		return false;
	};
	match (min_version, info.version.as_deref()) {
		(None, _) => true,
		(Some(min), Some(found)) => {
			let ok = compare_versions(found, min) != Ordering::Less;
			if !ok {
				tracing::warn!(runtime, found, min, "Runtime host is older than required");
			}
			ok
		}
		(Some(min), None) => {
			tracing::warn!(runtime, min, "Cannot detect runtime version");
			false
		}
	}
}
