use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cside")]
#[command(about = "Run, check and analyse CS-Script scripts")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Settings file (defaults to the one in the user directory)
	#[arg(long, value_name = "PATH", global = true)]
	pub settings: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// A caret inside a script on disk.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Caret {
	/// Script file
	pub file: PathBuf,
	/// Byte offset of the caret in the file
	pub offset: usize,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Run a script
	Run {
		/// Script file
		file: PathBuf,
	},
	/// Print the debug launch configuration for a script
	Debug {
		/// Script file
		file: PathBuf,
	},
	/// Compile a script without running it
	Check {
		/// Script file
		file: PathBuf,
	},
	/// Print every file and assembly a script uses
	PrintProject {
		/// Script file (defaults to the loaded project's script)
		file: Option<PathBuf>,
	},
	/// Print the project tree of a script
	ProjectTree {
		/// Script file
		file: PathBuf,
	},
	/// Build an executable from a script
	BuildExe {
		/// Script file
		file: PathBuf,
	},
	/// Generate the project for a script
	LoadProject {
		/// Script file
		file: PathBuf,
	},
	/// Create a new scratch script
	NewScript,
	/// Release a stuck session lock
	ResetBusy,
	/// Show engine and analysis server versions
	About,
	/// Write the engine's command-line help to a file
	EngineHelp,
	/// Regenerate the directive help, or locate one directive in it
	SyntaxHelp {
		/// Directive such as //css_ref
		directive: Option<String>,
	},
	/// Start the engine's build server
	BuildServer,
	/// Open the engine configuration
	CssConfig,
	/// Find references through the analysis server
	References(Caret),
	/// Locate the directive under the caret in the directive help
	Directive(Caret),
	/// List completions
	Complete(Caret),
	/// Show the tooltip of the symbol under the caret
	Tooltip {
		/// Caret position.
		#[command(flatten)]
		at: Caret,
		/// Overload hint
		#[arg(long, default_value = "")]
		hint: String,
	},
	/// Go to the definition of the symbol under the caret
	Definition(Caret),
	/// List the locations a rename would touch
	Rename(Caret),
	/// Show signature help
	Signature(Caret),
	/// Format a script
	Format(Caret),
	/// Suggest namespaces declaring a type
	Usings {
		/// Caret position.
		#[command(flatten)]
		at: Caret,
		/// Unresolved type name
		word: String,
	},
	/// Show member documentation
	MemberInfo(Caret),
	/// Ask whether the analysis server is ready
	Ping,
	/// Ask the analysis server to exit
	StopSyntaxer,
	/// Print the effective settings
	Settings {
		/// Write the defaults if no settings file exists yet
		#[arg(long)]
		init: bool,
	},
	/// Read commands from stdin, one per line, and run them concurrently
	Serve,
}

/// A single command read by `serve`.
#[derive(Parser, Debug)]
#[command(name = "cside", no_binary_name = true)]
struct Line {
	#[command(subcommand)]
	command: Command,
}

/// Parses one `serve` input line, such as `check /w/script.cs`.
pub fn parse_line(line: &str) -> Result<Command, clap::Error> {
	Line::try_parse_from(line.split_whitespace()).map(|l| l.command)
}
