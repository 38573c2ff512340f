use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for the wheelie course")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and the frame-rate determinism check
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates with warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Run the streaming benchmark in release mode
    Bench,
    /// Ride the autopilot at two frame rates and compare
    Determinism {
        #[arg(short, long, default_value = "20")]
        seconds: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt check", &["fmt", "--all", "--", "--check"])?;
            cargo(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            )?;
            cargo("tests", &["test", "--workspace"])?;
            determinism(20)?;
        }
        Commands::Fmt => cargo("fmt check", &["fmt", "--all", "--", "--check"])?,
        Commands::Clippy => cargo(
            "clippy",
            &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        )?,
        Commands::Test => cargo("tests", &["test", "--workspace"])?,
        Commands::Bench => cargo(
            "stream bench",
            &["bench", "-p", "wheelie-stream", "--bench", "bench_stream_advance"],
        )?,
        Commands::Determinism { seconds } => determinism(seconds)?,
    }

    Ok(())
}

fn determinism(seconds: u32) -> Result<()> {
    let seconds = seconds.to_string();
    cargo(
        "determinism",
        &[
            "run",
            "--release",
            "-p",
            "wheelie-cli",
            "--",
            "determinism",
            "--seconds",
            &seconds,
        ],
    )
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> Running {label}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("{label} failed");
    }
    Ok(())
}
