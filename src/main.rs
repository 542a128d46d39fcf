use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use journal::config::JournalConfig;
use journal::logging::{self, LogOptions};

mod cmd;

#[derive(Parser)]
#[command(name = "journal")]
#[command(version, about = "Personal journaling server with autosaving drafts")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .journal/, a default journal.toml and the database
    Init,
    /// Run the HTTP and WebSocket server
    Serve {
        /// Port to listen on (overrides JOURNAL_PORT and journal.toml)
        #[arg(long)]
        port: Option<u16>,

        /// Path to the SQLite database (overrides JOURNAL_DB and journal.toml)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable permissive CORS for a separately served frontend
        #[arg(long)]
        dev: bool,
    },
    /// Export a user's entries as Markdown
    Export {
        /// User whose entries are exported
        #[arg(long)]
        user: String,

        /// Output directory (defaults to [export] out_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Include entries marked private
        #[arg(long)]
        include_private: bool,

        /// Omit the metadata block
        #[arg(long)]
        no_metadata: bool,

        /// Write a single archive file instead of one file per entry
        #[arg(long)]
        bundle: bool,
    },
    /// View or manage journal.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default journal.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Only the long-running server writes a log file.
    let log_dir = match &cli.command {
        Commands::Serve { .. } => JournalConfig::new(project_dir.clone())
            .ok()
            .map(|config| config.log_dir()),
        _ => None,
    };
    if let Some(dir) = &log_dir {
        std::fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    let _guard = logging::init(&LogOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
        file_dir: log_dir.as_deref(),
    });

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&project_dir, cli.verbose, *port, db_path.clone(), *dev).await?;
        }
        Commands::Export {
            user,
            out,
            include_private,
            no_metadata,
            bundle,
        } => {
            cmd::cmd_export(
                &project_dir,
                cmd::ExportArgs {
                    user: user.clone(),
                    out: out.clone(),
                    include_private: *include_private,
                    no_metadata: *no_metadata,
                    bundle: *bundle,
                },
            )
            .await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
