use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for hinacloth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and the CLI smoke run
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Run the bake throughput benchmark
    Bench,
    /// Bake and run a small grid through the CLI
    Smoke,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test()?;
            smoke()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test => test()?,
        Commands::Bench => cargo("bench", &["bench", "-p", "hinacloth-playback"])?,
        Commands::Smoke => smoke()?,
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("{label} failed ({status})");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn test() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn smoke() -> Result<()> {
    let cli = ["run", "-q", "-p", "hinacloth-cli", "--"];
    let bake = [&cli[..], &["bake", "--start", "1", "--end", "24", "--json"]].concat();
    cargo("smoke bake", &bake)?;
    for backend in ["native", "tbb", "avx2"] {
        let args = [&cli[..], &["bake", "--end", "8", "--backend", backend]].concat();
        cargo("smoke bake backend", &args)?;
    }
    let run = [&cli[..], &["run", "--ticks", "30"]].concat();
    cargo("smoke run", &run)
}
