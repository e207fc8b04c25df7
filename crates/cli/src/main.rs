//! `toolcache` binary entry point.

// Command output goes to stdout; errors and the panic hook write to stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod logging;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use logging::{TracingConfig, TracingFormat};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("toolcache panicked: {panic_info}");
        eprintln!("This is a bug; please report it with the command you ran.");
    }));

    let cli = Cli::parse();

    let tracing_config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level: cli.level.into(),
        ..Default::default()
    };

    if let Err(report) = logging::init_tracing(tracing_config) {
        eprintln!("{report:?}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Install(args) => commands::run_install(args).await,
        Commands::List(args) => commands::run_list(&args),
    };

    if let Err(report) = result {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}
