use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use harness::common::config::HarnessConfig;
use harness::common::logging;
use harness::scenario;

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Expect-style process orchestration for end-to-end tests")]
#[command(version)]
struct Cli {
    /// Path to a harness.toml (default: the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one or more scenario files
    Run {
        /// Scenario YAML files, executed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Echo matched output while running
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate scenario files without spawning anything
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HarnessConfig::load_from(path),
        None => HarnessConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run { files, verbose } => {
            let mut passed = 0usize;
            let mut failed = 0usize;
            for path in &files {
                match scenario::run_file(path, &config, verbose).await {
                    Ok(result) if result.passed => passed += 1,
                    Ok(_) => failed += 1,
                    Err(e) => {
                        eprintln!("{} {}: {}", "error:".red().bold(), path.display(), e);
                        failed += 1;
                    }
                }
            }
            if files.len() > 1 {
                println!();
                println!(
                    "{} {} passed, {} failed",
                    "Results:".bold(),
                    passed.to_string().green(),
                    failed.to_string().red()
                );
            }
            if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Check { files } => {
            let mut ok = true;
            for path in &files {
                if let Err(e) = scenario::check_file(path, &config) {
                    eprintln!("{} {}: {}", "error:".red().bold(), path.display(), e);
                    ok = false;
                }
            }
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
