mod cli;
mod cmd;
mod error;
mod format;
mod io;
mod matcher;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Command, OutputFormat, PathOrStdin};
use error::CliError;

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--quiet` logs errors only and each
/// `-v` raises the level one step from `warn`.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let mut config = io::read_config(cli.config.as_ref(), cli.max_file_size)?;
    let max = cli.max_file_size;
    let output = cli.format;

    match &cli.command {
        Command::Plan { track, strategy } => cmd::plan::run(track, strategy, &config, max, output),
        Command::Orders { track } => cmd::orders::run(track, &config, max, output),
        Command::Resolve { track, resolver } => {
            resolver.apply(&mut config);
            cmd::resolve::run(track, &config, max, output)
        }
        Command::Evaluate {
            track,
            alignment,
            resolver,
            evaluation,
        } => {
            resolver.apply(&mut config);
            evaluation.apply(&mut config);
            cmd::evaluate::run(track, alignment, &config, max, output)
        }
        Command::Run {
            track,
            strategy,
            dispatch,
            resolver,
            evaluation,
        } => {
            config.strategy = strategy.resolve(config.strategy);
            dispatch.apply(&mut config);
            resolver.apply(&mut config);
            evaluation.apply(&mut config);
            cmd::run::run(track, dispatch, &config, max, output)
        }
        Command::Compare {
            track,
            similarity,
            no_baselines,
            dispatch,
            resolver,
            evaluation,
        } => {
            dispatch.apply(&mut config);
            resolver.apply(&mut config);
            evaluation.apply(&mut config);
            cmd::compare::run(
                track,
                *similarity,
                !*no_baselines,
                dispatch,
                &config,
                max,
                output,
            )
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    if let Err(err) = dispatch(&cli) {
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}
