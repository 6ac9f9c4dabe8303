//! cside binary.
//!
//! Runs CS-Script engine commands and Syntaxer queries from the terminal, either one per
//! invocation or as a long-lived `serve` loop for editor integrations.

mod app;
mod cli;
mod console;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use app::App;
use clap::Parser;
use cli::{Cli, Command};
use cside_config::{Settings, paths};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let settings_file = cli.settings.unwrap_or_else(paths::settings_file);
	let settings = Settings::load(&settings_file);
	info!(settings = %settings_file.display(), engine = ?settings.engine_path, "Starting cside");

	let app = Arc::new(App::new(settings));
	if !app.initialize().await {
		tracing::warn!("Engine environment is not ready");
	}

	match cli.command {
		Command::Serve => serve::serve(app).await,
		command => app.execute(command).await,
	}
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	if let Some(log_dir) = std::env::var("CSIDE_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("cside.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("cside=trace,debug")
				} else {
					EnvFilter::new("cside=debug,info")
				}
			});
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);
			tracing_subscriber::registry().with(filter).with(file_layer).init();
			info!(path = ?log_path, "Tracing initialized");
			return;
		}
	}

	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
