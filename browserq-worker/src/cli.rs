use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "browserq-worker", version, about = "SQLite-backed job queue worker")]
pub struct Cli {
    /// Path to configuration file (overrides BROWSERQ_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite job store
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a worker and process jobs until interrupted
    Run(RunArgs),
    /// Create the job store and apply migrations
    Init,
    /// Add a pending job and print its id
    Enqueue(EnqueueArgs),
    /// Print a job and its output size as JSON
    Show {
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Worker name recorded on claimed jobs (random when omitted)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Job definitions file restricting and aliasing the built-in jobs
    #[arg(short, long)]
    pub jobs: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Registered job name
    pub name: String,

    /// Job input as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "browserq-worker",
            "run",
            "--name",
            "w1",
            "--database",
            "q.sqlite",
        ]);
        assert_eq!(cli.database, Some(PathBuf::from("q.sqlite")));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.name.as_deref(), Some("w1"));
                assert!(args.jobs.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_enqueue_defaults_input() {
        let cli = Cli::parse_from(["browserq-worker", "enqueue", "noop"]);
        match cli.command {
            Command::Enqueue(args) => {
                assert_eq!(args.name, "noop");
                assert_eq!(args.input, "{}");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
