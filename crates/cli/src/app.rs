use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use cside_config::{Settings, paths};
use cside_engine::{EnginePaths, Orchestrator};
use cside_syntaxer::{
	AnalysisClient, ProcessLauncher, RetryPolicy, ServerSpec, SourceBuffer, Stager, Supervisor, Syntaxer,
};
use serde_json::json;

use crate::cli::{Caret, Command};
use crate::console::{ConsoleHost, ConsoleNotifier, StdoutSink};

/// How long a one-shot query waits for a freshly started analysis server.
const SERVER_STARTUP: Duration = Duration::from_secs(10);

/// Console application state shared by every command.
pub struct App {
	orchestrator: Orchestrator,
	syntaxer: Option<Arc<Syntaxer>>,
}

impl App {
	/// Wires the orchestrator and, when a server path is configured, the analysis client.
	pub fn new(settings: Settings) -> Self {
		let syntaxer = build_syntaxer(&settings).map(Arc::new);
		let mut orchestrator = Orchestrator::new(
			settings,
			EnginePaths::default(),
			Arc::new(ConsoleHost),
			Arc::new(ConsoleNotifier),
			Arc::new(StdoutSink),
		);
		if let Some(syntaxer) = &syntaxer {
			orchestrator = orchestrator.with_syntaxer(syntaxer.clone());
		}
		Self { orchestrator, syntaxer }
	}

	/// Checks the environment. Returns true if engine commands can run.
	pub async fn initialize(&self) -> bool {
		self.orchestrator.initialize().await
	}

	/// Starts the analysis server ahead of the first query.
	pub async fn start_syntaxer(&self) {
		let Some(syntaxer) = &self.syntaxer else {
			return;
		};
		if let Err(e) = syntaxer.client().supervisor().start().await {
			tracing::warn!(error = %e, "Failed to start the analysis server");
		}
	}

	/// Asks the analysis server to exit, if one is configured.
	pub async fn stop_syntaxer(&self) {
		if let Some(syntaxer) = &self.syntaxer {
			syntaxer.stop().await;
		}
	}

	/// Runs one command.
	pub async fn execute(&self, command: Command) -> anyhow::Result<()> {
		let orc = &self.orchestrator;
		match command {
			Command::Run { file } => {
				let out = orc.run(&file).await?;
				if !out.success() {
					tracing::debug!(code = ?out.code, "Script exited with failure");
				}
			}
			Command::Debug { file } => {
				orc.debug(&file).await?;
			}
			Command::Check { file } => {
				let records = orc.check(&file).await?;
				if records.is_empty() {
					println!("No errors or warnings.");
				}
			}
			Command::PrintProject { file } => {
				let file = orc.resolve_script(file.as_deref())?;
				orc.print_project(&file).await?;
			}
			Command::ProjectTree { file } => {
				for line in orc.project_tree(&file).await? {
					println!("{line}");
				}
			}
			Command::BuildExe { file } => {
				orc.build_exe(&file).await?;
			}
			Command::LoadProject { file } => {
				orc.load_project(&file).await?;
			}
			Command::NewScript => {
				orc.new_script().await?;
			}
			Command::ResetBusy => orc.reset_busy(),
			Command::About => {
				orc.about().await?;
			}
			Command::EngineHelp => {
				orc.engine_help().await?;
			}
			Command::SyntaxHelp { directive: None } => {
				orc.syntax_help().await?;
				println!("{}", orc.paths().syntax_help.display());
				for name in orc.directive_help().await?.names() {
					println!("  {name}");
				}
			}
			Command::SyntaxHelp {
				directive: Some(directive),
			} => match orc.directive_definition(&directive).await? {
				Some((file, line)) => println!("{}:{}", file.display(), line + 1),
				None => bail!("unknown directive {directive}"),
			},
			Command::BuildServer => orc.start_build_server()?,
			Command::CssConfig => {
				orc.css_config().await?;
			}
			Command::References(at) => {
				let text = read_script(&at.file)?;
				let offset = char_offset(&text, at.offset)?;
				orc.find_references(&text, &at.file, offset).await?;
			}
			Command::Directive(at) => {
				let text = read_script(&at.file)?;
				match orc.directive_definition_at(&text, at.offset).await? {
					Some((file, line)) => println!("{}:{}", file.display(), line + 1),
					None => bail!("no directive at offset {}", at.offset),
				}
			}
			Command::Ping => {
				let status = self.syntaxer()?.ping().await;
				println!("{}", status.as_str());
			}
			Command::StopSyntaxer => self.syntaxer()?.stop().await,
			Command::Settings { init } => {
				let file = paths::settings_file();
				if init && !file.exists() {
					orc.settings().save(&file)?;
					tracing::info!(path = %file.display(), "Default settings written");
				}
				println!("{}", serde_json::to_string_pretty(orc.settings())?);
			}
			Command::Serve => bail!("serve cannot be nested"),
			query => self.query(query).await?,
		}
		Ok(())
	}

	/// Runs one analysis query and prints its result as JSON.
	async fn query(&self, command: Command) -> anyhow::Result<()> {
		let syntaxer = self.syntaxer()?;
		if !syntaxer.ping().await.is_ready() {
			self.start_syntaxer().await;
			if !syntaxer.wait_until_ready(SERVER_STARTUP).await {
				bail!("the analysis server is not ready");
			}
		}

		let caret = |at: &Caret| -> anyhow::Result<(String, usize)> {
			let text = read_script(&at.file)?;
			let offset = char_offset(&text, at.offset)?;
			Ok((text, offset))
		};
		let value = match &command {
			Command::Complete(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.completions(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			Command::Tooltip { at, hint } => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.tooltip(SourceBuffer::new(&text, &at.file, offset), hint).await?)
			}
			Command::Definition(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.definition(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			Command::Rename(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.rename_context(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			Command::Signature(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.signature_help(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			Command::Format(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.format(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			Command::Usings { at, word } => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.suggest_usings(SourceBuffer::new(&text, &at.file, offset), word).await?)
			}
			Command::MemberInfo(at) => {
				let (text, offset) = caret(at)?;
				json!(syntaxer.member_info(SourceBuffer::new(&text, &at.file, offset)).await?)
			}
			other => bail!("{other:?} is not an analysis query"),
		};
		println!("{}", serde_json::to_string_pretty(&value)?);
		Ok(())
	}

	fn syntaxer(&self) -> anyhow::Result<&Syntaxer> {
		self.syntaxer
			.as_deref()
			.context("syntaxer_path is not configured")
	}
}

/// Converts a byte offset into `text` to the character offset the analysis server expects.
fn char_offset(text: &str, byte: usize) -> anyhow::Result<usize> {
	let before = text
		.get(..byte)
		.with_context(|| format!("offset {byte} is not on a character boundary"))?;
	Ok(before.chars().count())
}

fn read_script(file: &Path) -> anyhow::Result<String> {
	std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))
}

fn build_syntaxer(settings: &Settings) -> Option<Syntaxer> {
	let server_path = settings.syntaxer_path.clone()?;
	let spec = ServerSpec {
		server_path,
		host: settings.syntaxer_host.as_ref().map(Into::into),
		port: settings.syntaxer_port,
		client: std::process::id(),
		idle_timeout: Duration::from_millis(settings.syntaxer_timeout_ms),
		engine_path: settings.engine_path.clone().unwrap_or_default(),
	};
	let policy = RetryPolicy {
		max_attempts: settings.retry.max_attempts,
		backoff: Duration::from_millis(settings.retry.backoff_ms),
	};
	let supervisor = Arc::new(Supervisor::new(spec, Arc::new(ProcessLauncher::new()), policy));
	Some(Syntaxer::new(AnalysisClient::new(supervisor), Stager::new(paths::scratch_dir())))
}
