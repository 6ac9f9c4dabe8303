//! Line-oriented command loop for editor integrations.
//!
//! Each stdin line is one command in the usual subcommand syntax. Commands run concurrently,
//! so a second engine command issued while one is running is refused by the session lock
//! exactly as it would be inside an editor. `exit` or end of input stops the loop and the
//! analysis server.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use crate::app::App;
use crate::cli::{Command, parse_line};

/// Serves commands from stdin until `exit` or end of input.
pub async fn serve(app: Arc<App>) -> anyhow::Result<()> {
	app.start_syntaxer().await;
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut tasks = JoinSet::new();

	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		match line {
			"" => continue,
			"exit" | "quit" => break,
			_ => {}
		}
		let command = match parse_line(line) {
			Ok(Command::Serve) => {
				eprintln!("error: already serving");
				continue;
			}
			Ok(command) => command,
			Err(e) => {
				eprintln!("{e}");
				continue;
			}
		};

		tracing::debug!(?command, "Dispatching");
		let app = app.clone();
		tasks.spawn(async move {
			if let Err(e) = app.execute(command).await {
				eprintln!("error: {e:#}");
			}
		});
		while tasks.try_join_next().is_some() {}
	}

	while tasks.join_next().await.is_some() {}
	app.stop_syntaxer().await;
	Ok(())
}
