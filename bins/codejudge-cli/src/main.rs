mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codejudge-cli")]
#[command(about = "codejudge CLI - Judge submissions locally and inspect problem files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and run it against a problem's test cases
    Judge {
        /// Problem id
        #[arg(short, long)]
        problem: String,

        /// Source file to judge
        #[arg(short, long)]
        source: PathBuf,

        /// Language tag (c, c++; anything else is judged as C++)
        #[arg(short, long, default_value = "c++")]
        language: String,

        /// Problems file (JSON array of problem documents)
        #[arg(long, default_value = "data/problems.json")]
        problems: PathBuf,

        /// Toolchain configuration (built-in gcc/g++ when absent)
        #[arg(long, default_value = "config/toolchains.json")]
        toolchains: PathBuf,

        /// Directory for per-submission workspaces
        #[arg(long, default_value = "submissions")]
        workspace: PathBuf,

        /// Per-test wall-clock limit in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,

        /// Maximum number of test processes running at once
        #[arg(long, default_value = "4")]
        parallel: usize,
    },

    /// List the problems in a problems file
    Problems {
        /// Problems file (JSON array of problem documents)
        #[arg(long, default_value = "data/problems.json")]
        problems: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Judge {
            problem,
            source,
            language,
            problems,
            toolchains,
            workspace,
            timeout_ms,
            parallel,
        } => {
            commands::judge(commands::JudgeOptions {
                problem_id: problem,
                source,
                language,
                problems,
                toolchains,
                workspace,
                timeout_ms,
                parallel,
            })
            .await?;
        }
        Commands::Problems { problems } => {
            commands::list_problems(&problems).await?;
        }
    }

    Ok(())
}
