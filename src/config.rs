use std::time::Duration;

use clap::Parser;

use crate::cli::SearchArgs;
use crate::sources::hh::DEFAULT_USER_AGENT;

#[derive(Parser, Debug, Clone)]
#[command(name = "vacancyhub", about = "Job vacancy aggregator")]
pub struct Config {
    /// Database connection URL (required by `serve` and `search --save`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// SuperJob application key
    #[arg(long, env = "SUPERJOB_API_KEY", hide_env_values = true)]
    pub superjob_api_key: Option<String>,

    /// User-Agent sent to the HH API
    #[arg(long, env = "HH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub hh_user_agent: String,

    /// Per-request timeout towards job boards, in seconds
    #[arg(long, env = "SOURCE_TIMEOUT_SECS", default_value = "10")]
    pub source_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
    /// Search job boards from the command line
    Search(SearchArgs),
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }
}
