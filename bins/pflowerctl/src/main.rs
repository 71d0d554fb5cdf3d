//! pflowerctl: CLI front-end over the `pflower` library.
//!
//! A thin wrapper, mirroring the teacher's `bins/*` binaries: it owns
//! process exit-code mapping and structured logging initialization and
//! contains no filter or codegen logic of its own -- every subcommand
//! maps directly onto one of `pflower`'s public operations.

use clap::{Parser, Subcommand};

mod commands;

use commands::cprog::CprogCmd;
use commands::filter::FilterCmd;
use commands::rule::RuleCmd;

#[derive(Parser)]
#[command(name = "pflowerctl")]
#[command(about = "Compile packet-filter rules into an in-kernel classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Backup file backing the filter this invocation operates on.
    #[arg(short = 'f', long, global = true, default_value = "pflower.rules")]
    file: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add, load, or delete rules.
    Rule(RuleCmd),

    /// Inspect or persist the filter itself.
    Filter(FilterCmd),

    /// Lower the filter to a cprog: emit, compile, load, attach, fill.
    Cprog(CprogCmd),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Rule(cmd) => cmd.run(&cli.file),
        Command::Filter(cmd) => cmd.run(&cli.file),
        Command::Cprog(cmd) => cmd.run(&cli.file),
    };

    if let Err(err) = result {
        eprintln!("pflowerctl: {err}");
        eprint!("{}", pflower::last_error());
        std::process::exit(1);
    }
}
