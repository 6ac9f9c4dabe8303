//! User-facing engine commands.
//!
//! Every command follows the same shape: take the session lock, build the engine argv,
//! invoke the engine, interpret its output and release the lock when the guard drops. A
//! refused lock or a failed invocation is reported through the [`Notifier`] before the error
//! is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cside_config::Settings;
use cside_config::paths;
use cside_syntaxer::{SourceBuffer, Syntaxer};
use parking_lot::Mutex;

use crate::diagnostics::{self, DiagnosticRecord, Location};
use crate::directives;
use crate::project::{self, ProjectDescriptor, is_script};
use crate::{
	DebugLaunch, DirectiveHelp, EditorHost, EngineCommand, EngineOutput, Error, LockError, MessageKind, NotifyAction,
	Notifier, OutputSink, Result, SessionGuard, SessionLock, environment,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RULE: &str = "-------------------------------------------------------";
const LOAD_PROJECT_INFO: &str = "In order to activate intellisense a project will be initialized and the current script \
                                 file will be loaded in its context.";

/// Files the orchestrator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
	/// Directory receiving the generated project file.
	pub project_dir: PathBuf,
	/// Scratch script of the new-script command.
	pub new_script: PathBuf,
	/// Cached `-help` output.
	pub engine_help: PathBuf,
	/// Cached `-syntax` output.
	pub syntax_help: PathBuf,
}

impl Default for EnginePaths {
	fn default() -> Self {
		Self {
			project_dir: paths::project_dir(),
			new_script: paths::new_script_file(),
			engine_help: paths::engine_help_file(),
			syntax_help: paths::syntax_help_file(),
		}
	}
}

/// Runs engine commands on behalf of one editor instance.
pub struct Orchestrator {
	settings: Settings,
	paths: EnginePaths,
	lock: SessionLock,
	host: Arc<dyn EditorHost>,
	notifier: Arc<dyn Notifier>,
	output: Arc<dyn OutputSink>,
	syntaxer: Option<Arc<Syntaxer>>,
	directives: Mutex<Option<Arc<DirectiveHelp>>>,
}

impl Orchestrator {
	/// Creates an orchestrator with an idle, not yet ready lock.
	pub fn new(
		settings: Settings,
		paths: EnginePaths,
		host: Arc<dyn EditorHost>,
		notifier: Arc<dyn Notifier>,
		output: Arc<dyn OutputSink>,
	) -> Self {
		Self {
			settings,
			paths,
			lock: SessionLock::new(),
			host,
			notifier,
			output,
			syntaxer: None,
			directives: Mutex::new(None),
		}
	}

	/// Attaches the analysis facade used by reference searches.
	#[must_use]
	pub fn with_syntaxer(mut self, syntaxer: Arc<Syntaxer>) -> Self {
		self.syntaxer = Some(syntaxer);
		self
	}

	/// The session lock guarding engine commands.
	pub fn lock(&self) -> &SessionLock {
		&self.lock
	}

	/// Active settings.
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// File locations.
	pub fn paths(&self) -> &EnginePaths {
		&self.paths
	}

	/// Checks the runtime and the engine, then opens the lock for business.
	pub async fn initialize(&self) -> bool {
		let min = self.settings.min_runtime_version.as_deref();
		let env_ready = environment::check_environment(&self.settings.runtime, min).await;
		self.lock.set_environment_ready(env_ready);

		let engine_found = self.settings.engine_path.as_deref().is_some_and(Path::exists);
		if !engine_found {
			tracing::warn!(engine = ?self.settings.engine_path, "Script engine not found");
		}
		self.lock.set_initialized(engine_found);
		tracing::info!(env_ready, engine_found, "Engine environment checked");
		self.lock.is_ready()
	}

	/// Resolves the script a command applies to: `file` when given, otherwise the primary
	/// source of the generated project.
	pub fn resolve_script(&self, file: Option<&Path>) -> Result<PathBuf> {
		if let Some(file) = file {
			return Ok(file.to_path_buf());
		}
		project::parse_proj_dir(&self.paths.project_dir)
			.ok()
			.flatten()
			.ok_or_else(|| Error::FileNotFound(self.paths.project_dir.join(paths::PROJECT_FILE_NAME)))
	}

	/// Runs the script, streaming its output.
	pub async fn run(&self, file: &Path) -> Result<EngineOutput> {
		let _guard = self.acquire()?;
		self.output.clear();
		if let Err(e) = self.save_script_project(file, false).await {
			tracing::warn!(file = %file.display(), error = %e, "Failed to save script dependencies");
		}

		let cmd = if self.settings.use_global_css {
			EngineCommand::new("css")
		} else {
			self.engine()?
		}
		.args(&self.settings.extra_args)
		.arg(file);

		self.output.append_line(&format!("[Running] {}", cmd.display()));
		let started = Instant::now();
		let out = self.streamed(&cmd).await?;
		let secs = started.elapsed().as_millis() as f64 / 1000.0;
		let code = out.code.map_or_else(|| "null".to_string(), |c| c.to_string());

		self.output.append_line("");
		self.output.append_line(&format!("[Done] exited with code={code} in {secs} seconds"));
		self.output.append_line("");
		Ok(out)
	}

	/// Saves the script and every open dependency with unsaved changes.
	///
	/// With `dependencies_only` the script itself is left alone.
	pub async fn save_script_project(&self, file: &Path, dependencies_only: bool) -> Result<ProjectDescriptor> {
		if !dependencies_only {
			self.host.save(file).await;
		}
		let out = self.engine()?.arg("-proj:dbg").arg(file).output().await?;
		let project = ProjectDescriptor::parse(&out.text);

		for doc in self.host.unsaved_documents() {
			if doc != file && project.contains(&doc) {
				tracing::debug!(file = %doc.display(), "Saving script dependency");
				self.host.save(&doc).await;
			}
		}
		Ok(project)
	}

	/// Builds the debug launch description and hands it to the editor.
	pub async fn debug(&self, file: &Path) -> Result<DebugLaunch> {
		self.host.save(file).await;
		if !file.exists() {
			self.notifier
				.notify(MessageKind::Info, &format!("Cannot find file \"{}\"", file.display()), &[]);
			return Err(Error::FileNotFound(file.to_path_buf()));
		}

		let _guard = self.acquire()?;
		let launch = self.debug_launch(file)?;
		if let Err(e) = self.host.start_debugging(&launch).await {
			self.notifier.notify(MessageKind::Info, &format!("Error: {e}"), &[]);
			return Err(Error::Debug(e));
		}
		Ok(launch)
	}

	/// Debug launch description for `file`.
	pub fn debug_launch(&self, file: &Path) -> Result<DebugLaunch> {
		let engine = self.settings.engine_path.as_ref().ok_or(Error::EngineNotConfigured)?;
		let mut args = vec![engine.to_string_lossy().into_owned(), "-d".to_string()];
		args.extend(self.settings.debug_args());
		args.extend(self.settings.extra_args.iter().cloned());
		args.extend(["-l".to_string(), "-ac:2".to_string(), file.to_string_lossy().into_owned()]);

		Ok(DebugLaunch {
			name: ".NET Core Launch (console)".to_string(),
			kind: "coreclr".to_string(),
			request: "launch".to_string(),
			program: PathBuf::from(&self.settings.runtime),
			args,
			cwd: file.parent().map(Path::to_path_buf).unwrap_or_default(),
			console: "internalConsole".to_string(),
			stop_at_entry: false,
		})
	}

	/// Compiles without running and publishes errors and warnings.
	pub async fn check(&self, file: &Path) -> Result<Vec<DiagnosticRecord>> {
		let _guard = self.acquire()?;
		self.host.save(file).await;
		self.output.clear();
		self.output.append_line("Checking...");

		let cmd = self.engine()?.args(&self.settings.extra_args).arg("-check").arg(file);
		let sink = ClearOnFirstChunk::new(self.output.as_ref());
		let out = cmd.stream(&sink).await.inspect_err(|e| self.report_failure(e))?;

		let records: Vec<_> = out
			.lines()
			.filter_map(diagnostics::parse)
			.filter(DiagnosticRecord::is_reportable)
			.collect();
		tracing::debug!(file = %file.display(), count = records.len(), "Check finished");
		self.host.publish_diagnostics(&records);
		Ok(records)
	}

	/// Prints the full project listing of the script, debug helpers included.
	pub async fn print_project(&self, file: &Path) -> Result<ProjectDescriptor> {
		self.require_script(file)?;
		self.host.save(file).await;
		let _guard = self.acquire()?;
		self.output.clear();
		self.output.append_line("Analyzing...");

		let out = self.buffered(&self.engine()?.arg("-l").arg("-proj:dbg").arg(file)).await?;
		self.output.clear();
		for line in out.lines() {
			self.output.append_line(line);
		}
		Ok(ProjectDescriptor::parse(&out.text))
	}

	/// Project listing for a tree view. Empty while another command is running.
	pub async fn project_tree(&self, file: &Path) -> Result<Vec<String>> {
		if self.lock.is_busy() {
			return Ok(Vec::new());
		}
		let _guard = self.acquire()?;
		let out = self.buffered(&self.engine()?.arg("-l").arg("-proj").arg(file)).await?;
		Ok(out.lines().map(str::to_string).collect())
	}

	/// Compiles the script into an executable.
	pub async fn build_exe(&self, file: &Path) -> Result<EngineOutput> {
		let _guard = self.acquire()?;
		self.output.clear();
		self.output
			.append_line(&format!("Building executable from the script \"{}\"", file.display()));
		self.output.append_line("---------------------");

		let out = self.buffered(&self.engine()?.arg("-e").arg(file)).await?;
		self.output.append_line(&out.text);
		self.output.append_line("\n[Done]");
		Ok(out)
	}

	/// Generates the project file for `file` and opens the project folder.
	///
	/// The lock is released before the folder is opened, since opening it may reload the
	/// workspace.
	pub async fn load_project(&self, file: &Path) -> Result<PathBuf> {
		let guard = self.acquire()?;
		self.require_script(file)?;
		self.host.save(file).await;
		self.output.clear();
		self.output.append_line("Loading project...");

		let proj = match self.generate_project(file).await {
			Ok(proj) => proj,
			Err(e) => {
				tracing::warn!(file = %file.display(), error = %e, "Project generation failed");
				self.notifier
					.notify(MessageKind::Error, &Error::ProjectGeneration.to_string(), &[]);
				return Err(e);
			}
		};
		self.output.clear();
		guard.release();

		if self.settings.show_load_proj_info {
			self.notifier.notify(MessageKind::Info, LOAD_PROJECT_INFO, &[]);
		}
		self.host.open_folder(&self.paths.project_dir);
		Ok(proj)
	}

	async fn generate_project(&self, file: &Path) -> Result<PathBuf> {
		let out = self.buffered(&self.engine()?.arg("-proj:csproj").arg(file)).await?;
		if let Some(source) = project::announced_project_file(&out.text)
			&& source.exists()
		{
			let contents = std::fs::read_to_string(&source)?;
			return Ok(project::write_project_file(&self.paths.project_dir, &contents)?);
		}

		let listing = self.buffered(&self.engine()?.arg("-proj:dbg").arg(file)).await?;
		let descriptor = ProjectDescriptor::parse(&listing.text);
		if descriptor.files.is_empty() {
			return Err(Error::ProjectGeneration);
		}
		Ok(project::write_project_file(&self.paths.project_dir, &descriptor.render_csproj())?)
	}

	/// Creates a fresh scratch script from the engine template.
	///
	/// A previous scratch script is kept as `new_script.cs.bak` and the new file starts with
	/// a comment pointing at it.
	pub async fn new_script(&self) -> Result<PathBuf> {
		let _guard = self.acquire()?;
		let path = self.paths.new_script.clone();
		if let Some(dir) = path.parent() {
			std::fs::create_dir_all(dir)?;
		}

		let backup = if path.exists() {
			let backup = path.with_extension("cs.bak");
			if backup.exists() {
				std::fs::remove_file(&backup)?;
			}
			std::fs::rename(&path, &backup)?;
			Some(backup)
		} else {
			None
		};

		self.buffered(&self.engine()?.arg("-new:toplevel").arg(&path)).await?;
		if !path.exists() {
			return Err(Error::FileNotFound(path));
		}

		if let Some(backup) = &backup {
			let content = std::fs::read_to_string(&path)?;
			let header = format!(
				"// The previous content of this file has been saved into \n// {} \n\n",
				backup.display()
			);
			std::fs::write(&path, header + &content)?;
		}
		self.host.open(&path, None);
		Ok(path)
	}

	/// Releases a lock left behind by a stuck command.
	pub fn reset_busy(&self) {
		self.lock.force_reset();
	}

	/// Version information about the engine and the analysis server.
	pub async fn about(&self) -> Result<String> {
		let _guard = self.acquire()?;
		self.output.clear();
		self.output.append_line("Analyzing...");

		let out = self.buffered(&self.engine()?.arg("-ver")).await?;
		let display = |p: &Option<PathBuf>| p.as_ref().map_or_else(|| "<not configured>".to_string(), |p| p.display().to_string());
		let text = format!(
			"cside - v{VERSION}\n{RULE}\nScript engine: v{}\n{RULE}\nSyntaxer\n   {}\nScript engine\n   {}\n",
			out.text.trim(),
			display(&self.settings.syntaxer_path),
			display(&self.settings.engine_path),
		);
		self.output.clear();
		self.output.append(&text);
		Ok(text)
	}

	/// Writes the engine's command-line help to a file and opens it.
	pub async fn engine_help(&self) -> Result<PathBuf> {
		let _guard = self.acquire()?;
		let out = self.buffered(&self.engine()?.arg("-help")).await?;
		write_creating_dir(&self.paths.engine_help, &out.text)?;
		self.host.open(&self.paths.engine_help, None);
		Ok(self.paths.engine_help.clone())
	}

	/// Regenerates the directive syntax help file and returns its text.
	pub async fn syntax_help(&self) -> Result<String> {
		let out = self.buffered(&self.engine()?.arg("-syntax")).await?;
		write_creating_dir(&self.paths.syntax_help, &out.text)?;
		*self.directives.lock() = Some(Arc::new(DirectiveHelp::parse(&out.text)));
		Ok(out.text)
	}

	/// Directive help, generated on first use.
	pub async fn directive_help(&self) -> Result<Arc<DirectiveHelp>> {
		let cached = self.directives.lock().clone();
		if let Some(help) = cached {
			return Ok(help);
		}
		let text = self.syntax_help().await?;
		Ok(self
			.directives
			.lock()
			.get_or_insert_with(|| Arc::new(DirectiveHelp::parse(&text)))
			.clone())
	}

	/// Location of a directive's documentation in the syntax help file.
	pub async fn directive_definition(&self, directive: &str) -> Result<Option<(PathBuf, u32)>> {
		let help = self.directive_help().await?;
		Ok(help.get(directive).map(|entry| (self.paths.syntax_help.clone(), entry.line)))
	}

	/// Documentation location of the `//css_*` directive under byte `offset` of `text`.
	pub async fn directive_definition_at(&self, text: &str, offset: usize) -> Result<Option<(PathBuf, u32)>> {
		let Some(before) = text.get(..offset) else {
			return Ok(None);
		};
		let start = before.rfind('\n').map_or(0, |n| n + 1);
		let end = text[offset..].find('\n').map_or(text.len(), |n| offset + n);
		match directives::directive_at(&text[start..end], offset - start) {
			Some(directive) => self.directive_definition(directive).await,
			None => Ok(None),
		}
	}

	/// Lists references to the symbol at `offset` through the analysis server.
	pub async fn find_references(&self, text: &str, file: &Path, offset: usize) -> Result<Vec<Location>> {
		let syntaxer = self.syntaxer.as_ref().ok_or(Error::SyntaxerUnavailable)?;
		let _guard = self.acquire()?;
		self.output.clear();
		self.output.append_line("Resolving references...");

		let lines = syntaxer.references(SourceBuffer::new(text, file, offset)).await;
		self.output.clear();
		let lines = lines?.unwrap_or_default();
		self.output.append_line(&format!("{} references:", lines.len()));
		for line in &lines {
			self.output.append_line(line);
		}
		Ok(lines.iter().filter_map(|l| diagnostics::parse_location(l)).collect())
	}

	/// Starts the engine's build server; returns immediately.
	pub fn start_build_server(&self) -> Result<()> {
		self.engine()?.arg("-speed").spawn_detached()
	}

	/// Opens the engine configuration, creating the default one first if needed.
	pub async fn css_config(&self) -> Result<PathBuf> {
		let engine = self.settings.engine_path.as_ref().ok_or(Error::EngineNotConfigured)?;
		let config = engine.parent().unwrap_or(Path::new(".")).join("css_config.xml");
		if !config.exists() {
			let out = self.buffered(&self.engine()?.arg("-config:default")).await?;
			std::fs::write(&config, out.text)?;
		}
		self.host.open(&config, None);
		Ok(config)
	}

	fn acquire(&self) -> Result<SessionGuard> {
		self.lock.try_acquire().map_err(|e| {
			match e {
				LockError::Busy => {
					self.notifier
						.notify(MessageKind::Info, "CS-Script is busy.", &[NotifyAction::ResetBusy]);
				}
				LockError::Initializing => {
					self.notifier
						.notify(MessageKind::Info, "CS-Script initialization is in progress.", &[]);
				}
				LockError::EnvironmentNotReady => {
					let required = self.settings.min_runtime_version.as_deref().unwrap_or("any");
					let message = format!(
						"Cannot detect required {} version ({required}).",
						self.settings.runtime
					);
					self.notifier.notify(MessageKind::Error, &message, &[]);
				}
			}
			Error::Lock(e)
		})
	}

	fn require_script(&self, file: &Path) -> Result<()> {
		if is_script(file) {
			return Ok(());
		}
		let err = Error::NotAScript(file.to_path_buf());
		self.notifier.notify(
			MessageKind::Error,
			&format!("{err}. Ensure that the active document is a C# script file."),
			&[],
		);
		Err(err)
	}

	fn engine(&self) -> Result<EngineCommand> {
		let engine = self.settings.engine_path.as_ref().ok_or(Error::EngineNotConfigured)?;
		Ok(if self.settings.runtime.is_empty() {
			EngineCommand::new(engine)
		} else {
			EngineCommand::new(&self.settings.runtime).arg(engine)
		})
	}

	async fn buffered(&self, cmd: &EngineCommand) -> Result<EngineOutput> {
		cmd.output().await.inspect_err(|e| self.report_failure(e))
	}

	async fn streamed(&self, cmd: &EngineCommand) -> Result<EngineOutput> {
		cmd.stream(self.output.as_ref()).await.inspect_err(|e| self.report_failure(e))
	}

	fn report_failure(&self, e: &Error) {
		self.notifier
			.notify(MessageKind::Error, &format!("Cannot run the script engine: {e}"), &[]);
	}
}

impl std::fmt::Debug for Orchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Orchestrator")
			.field("settings", &self.settings)
			.field("paths", &self.paths)
			.field("lock", &self.lock)
			.finish_non_exhaustive()
	}
}

/// Clears the wrapped sink when the first chunk arrives, replacing any progress text.
struct ClearOnFirstChunk<'a> {
	inner: &'a dyn OutputSink,
	cleared: AtomicBool,
}

impl<'a> ClearOnFirstChunk<'a> {
	fn new(inner: &'a dyn OutputSink) -> Self {
		Self {
			inner,
			cleared: AtomicBool::new(false),
		}
	}
}

impl OutputSink for ClearOnFirstChunk<'_> {
	fn append(&self, text: &str) {
		if !self.cleared.swap(true, Ordering::AcqRel) {
			self.inner.clear();
		}
		self.inner.append(text);
	}
}

fn write_creating_dir(path: &Path, contents: &str) -> std::io::Result<()> {
	if let Some(dir) = path.parent() {
		std::fs::create_dir_all(dir)?;
	}
	std::fs::write(path, contents)
}
