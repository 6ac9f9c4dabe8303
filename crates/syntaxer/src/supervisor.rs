//! Analysis server process supervision.
//!
//! The server is detached from the editor: it outlives individual requests and shuts itself
//! down after an idle timeout. The supervisor therefore never tracks a child handle for
//! liveness. Reachability is judged by the client, which calls [`Supervisor::ensure_running`]
//! whenever a connection is refused and [`Supervisor::record_success`] once one succeeds.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Error, Result};

/// Everything needed to start one analysis server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
	/// Path of the server executable or assembly.
	pub server_path: PathBuf,
	/// Optional runtime host the server is launched through (`dotnet`, `mono`).
	pub host: Option<PathBuf>,
	/// Localhost port the server listens on.
	pub port: u16,
	/// Identity of the editor process, forwarded as `-client:`.
	pub client: u32,
	/// Idle period after which the server exits on its own.
	pub idle_timeout: Duration,
	/// Path of the script engine the server uses to resolve references.
	pub engine_path: PathBuf,
}

impl ServerSpec {
	/// Returns the program to execute followed by its arguments.
	///
	/// With a host configured the server path becomes the host's first argument.
	pub fn command(&self) -> (OsString, Vec<OsString>) {
		let mut args = Vec::with_capacity(6);
		let program = match &self.host {
			Some(host) => {
				args.push(self.server_path.clone().into_os_string());
				host.clone().into_os_string()
			}
			None => self.server_path.clone().into_os_string(),
		};
		args.push(format!("-port:{}", self.port).into());
		args.push("-listen".into());
		args.push(format!("-client:{}", self.client).into());
		args.push(format!("-timeout:{}", self.idle_timeout.as_millis()).into());
		let mut engine = OsString::from("-cscs_path:");
		engine.push(&self.engine_path);
		args.push(engine);
		(program, args)
	}
}

/// Starts analysis server processes.
///
/// Production code spawns a detached OS process; tests substitute a launcher that only
/// records calls or binds an in-process listener.
#[async_trait]
pub trait ServerLauncher: Send + Sync + 'static {
	/// Starts one server instance. Returns once the launch has been issued, not once the
	/// server is ready.
	async fn launch(&self, spec: &ServerSpec) -> std::io::Result<()>;
}

/// Launcher that spawns the real server executable.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
	/// Create a new process launcher.
	#[must_use]
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl ServerLauncher for ProcessLauncher {
	async fn launch(&self, spec: &ServerSpec) -> std::io::Result<()> {
		let (program, args) = spec.command();
		let mut child = tokio::process::Command::new(&program)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.inspect_err(|e| tracing::error!(error = %e, program = ?program, "Failed to spawn analysis server"))?;

		let port = spec.port;
		tracing::info!(pid = ?child.id(), port, "Analysis server spawned");
		tokio::spawn(async move {
			match child.wait().await {
				Ok(status) => tracing::info!(port, ?status, "Analysis server exited"),
				Err(e) => tracing::warn!(port, error = %e, "Failed to wait on analysis server"),
			}
		});
		Ok(())
	}
}

/// Bounds how often an unreachable server is respawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Respawns allowed between two successful connections.
	pub max_attempts: u32,
	/// Minimum wait after the first respawn; doubles with every further attempt.
	pub backoff: Duration,
}

impl RetryPolicy {
	/// Minimum time that must pass after respawn number `attempt` before the next one.
	pub fn delay(&self, attempt: u32) -> Duration {
		let shift = attempt.saturating_sub(1).min(16);
		self.backoff.saturating_mul(1 << shift)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			backoff: Duration::from_millis(500),
		}
	}
}

/// Outcome of [`Supervisor::ensure_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Respawn {
	/// A launch was issued.
	Spawned,
	/// A previous launch is still inside its backoff window.
	Throttled,
	/// The server executable does not exist; nothing was launched.
	Unavailable,
}

#[derive(Debug, Default)]
struct RespawnState {
	attempts: u32,
	last_spawn: Option<Instant>,
}

/// Owns the analysis server lifecycle for one editor process.
pub struct Supervisor {
	spec: ServerSpec,
	launcher: Arc<dyn ServerLauncher>,
	policy: RetryPolicy,
	state: Mutex<RespawnState>,
}

impl Supervisor {
	/// Creates a supervisor; nothing is launched until asked.
	pub fn new(spec: ServerSpec, launcher: Arc<dyn ServerLauncher>, policy: RetryPolicy) -> Self {
		Self {
			spec,
			launcher,
			policy,
			state: Mutex::new(RespawnState::default()),
		}
	}

	/// Returns the server specification.
	pub fn spec(&self) -> &ServerSpec {
		&self.spec
	}

	/// Respawns issued since the last successful connection.
	pub fn attempts(&self) -> u32 {
		self.state.lock().attempts
	}

	/// Launches the server eagerly at startup. Not counted against the retry budget.
	pub async fn start(&self) -> Result<Respawn> {
		if !self.spec.server_path.exists() {
			tracing::warn!(path = %self.spec.server_path.display(), "Analysis server executable not found");
			return Ok(Respawn::Unavailable);
		}
		self.state.lock().last_spawn = Some(Instant::now());
		self.launcher.launch(&self.spec).await?;
		Ok(Respawn::Spawned)
	}

	/// Called after a refused connection. Launches a new server instance unless the backoff
	/// window of the previous launch is still open.
	///
	/// Fails with [`Error::RetriesExhausted`] once the policy's attempt budget is used up;
	/// the budget is restored by [`Supervisor::record_success`].
	pub async fn ensure_running(&self) -> Result<Respawn> {
		if !self.spec.server_path.exists() {
			tracing::debug!(path = %self.spec.server_path.display(), "Analysis server executable not found");
			return Ok(Respawn::Unavailable);
		}

		let attempt = {
			let mut state = self.state.lock();
			if state.attempts >= self.policy.max_attempts {
				return Err(Error::RetriesExhausted { attempts: state.attempts });
			}
			if let Some(last) = state.last_spawn
				&& last.elapsed() < self.policy.delay(state.attempts)
			{
				tracing::trace!(attempts = state.attempts, "Analysis server respawn throttled");
				return Ok(Respawn::Throttled);
			}
			state.attempts += 1;
			state.last_spawn = Some(Instant::now());
			state.attempts
		};

		tracing::info!(attempt, port = self.spec.port, "Respawning analysis server");
		if let Err(e) = self.launcher.launch(&self.spec).await {
			tracing::warn!(attempt, error = %e, "Analysis server respawn failed");
		}
		Ok(Respawn::Spawned)
	}

	/// Resets the retry budget after a successful connection.
	pub fn record_success(&self) {
		let mut state = self.state.lock();
		if state.attempts > 0 {
			tracing::debug!(attempts = state.attempts, "Analysis server reachable again");
		}
		state.attempts = 0;
		state.last_spawn = None;
	}
}

impl std::fmt::Debug for Supervisor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Supervisor")
			.field("spec", &self.spec)
			.field("policy", &self.policy)
			.field("attempts", &self.attempts())
			.finish_non_exhaustive()
	}
}

/// Test helpers for supervising fake servers.
#[doc(hidden)]
pub mod test_helpers {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	/// Launcher that only counts launches.
	#[derive(Debug, Default)]
	pub struct CountingLauncher {
		launches: AtomicUsize,
	}

	impl CountingLauncher {
		/// Number of launches issued so far.
		pub fn launches(&self) -> usize {
			self.launches.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl ServerLauncher for CountingLauncher {
		async fn launch(&self, _spec: &ServerSpec) -> std::io::Result<()> {
			self.launches.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::test_helpers::CountingLauncher;
	use super::*;

	fn spec(server_path: PathBuf) -> ServerSpec {
		ServerSpec {
			server_path,
			host: None,
			port: 18003,
			client: 4242,
			idle_timeout: Duration::from_millis(60000),
			engine_path: PathBuf::from("/opt/cs-script/cscs.dll"),
		}
	}

	fn existing_server() -> (tempfile::TempDir, PathBuf) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("syntaxer.dll");
		std::fs::write(&path, b"").unwrap();
		(dir, path)
	}

	#[test]
	fn command_line_layout() {
		let (program, args) = spec(PathBuf::from("/s/syntaxer")).command();
		assert_eq!(program, OsString::from("/s/syntaxer"));
		assert_eq!(
			args,
			vec![
				OsString::from("-port:18003"),
				"-listen".into(),
				"-client:4242".into(),
				"-timeout:60000".into(),
				"-cscs_path:/opt/cs-script/cscs.dll".into(),
			]
		);
	}

	#[test]
	fn hosted_command_puts_server_first() {
		let mut spec = spec(PathBuf::from("/s/syntaxer.dll"));
		spec.host = Some(PathBuf::from("dotnet"));
		let (program, args) = spec.command();
		assert_eq!(program, OsString::from("dotnet"));
		assert_eq!(args[0], OsString::from("/s/syntaxer.dll"));
		assert_eq!(args[1], OsString::from("-port:18003"));
	}

	#[test]
	fn backoff_doubles() {
		let policy = RetryPolicy {
			max_attempts: 4,
			backoff: Duration::from_millis(100),
		};
		assert_eq!(policy.delay(1), Duration::from_millis(100));
		assert_eq!(policy.delay(2), Duration::from_millis(200));
		assert_eq!(policy.delay(3), Duration::from_millis(400));
	}

	#[tokio::test]
	async fn missing_executable_is_not_launched() {
		let launcher = Arc::new(CountingLauncher::default());
		let sup = Supervisor::new(spec(PathBuf::from("/nonexistent/syntaxer")), launcher.clone(), RetryPolicy::default());
		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Unavailable);
		assert_eq!(sup.start().await.unwrap(), Respawn::Unavailable);
		assert_eq!(launcher.launches(), 0);
	}

	#[tokio::test]
	async fn retries_are_capped_until_success() {
		let (_dir, path) = existing_server();
		let launcher = Arc::new(CountingLauncher::default());
		let policy = RetryPolicy {
			max_attempts: 2,
			backoff: Duration::ZERO,
		};
		let sup = Supervisor::new(spec(path), launcher.clone(), policy);

		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Spawned);
		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Spawned);
		assert!(matches!(sup.ensure_running().await, Err(Error::RetriesExhausted { attempts: 2 })));
		assert_eq!(launcher.launches(), 2);

		sup.record_success();
		assert_eq!(sup.attempts(), 0);
		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Spawned);
		assert_eq!(launcher.launches(), 3);
	}

	#[tokio::test]
	async fn respawn_inside_backoff_window_is_throttled() {
		let (_dir, path) = existing_server();
		let launcher = Arc::new(CountingLauncher::default());
		let policy = RetryPolicy {
			max_attempts: 5,
			backoff: Duration::from_secs(60),
		};
		let sup = Supervisor::new(spec(path), launcher.clone(), policy);

		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Spawned);
		assert_eq!(sup.ensure_running().await.unwrap(), Respawn::Throttled);
		assert_eq!(launcher.launches(), 1);
		assert_eq!(sup.attempts(), 1);
	}

	#[tokio::test]
	async fn eager_start_does_not_consume_budget() {
		let (_dir, path) = existing_server();
		let launcher = Arc::new(CountingLauncher::default());
		let sup = Supervisor::new(spec(path), launcher.clone(), RetryPolicy::default());
		assert_eq!(sup.start().await.unwrap(), Respawn::Spawned);
		assert_eq!(sup.attempts(), 0);
		assert_eq!(launcher.launches(), 1);
	}
}
