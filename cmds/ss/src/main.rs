use anyhow::Result;
use clap::{Parser, Subcommand};
use ss::{commands, commands::util::BrokenPipeGuard, telemetry};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "ss")]
#[command(about = "SyncSet/SelectorSyncSet generator.", long_about = None)]
#[command(version = env!("SS_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Parses a manifest directory and prints a SyncSet/SelectorSyncSet representation of the objects it contains.
	View(commands::view::ViewArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let log_level = match &cli.command {
		Commands::View(args) => args.log_level,
	};
	telemetry::init(log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::View(args) => commands::view::run(args, stdout),
	}
}
