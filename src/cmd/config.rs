//! Configuration view and validation commands: `journal config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use journal::config::{CONFIG_DIR, CONFIG_FILE, JournalConfig, JournalToml};

    let journal_dir = project_dir.join(CONFIG_DIR);
    let config_path = journal_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Journal Configuration");
            println!("=====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                JournalToml::load(&config_path)?
            } else {
                println!("No journal.toml found at {}", config_path.display());
                println!("Using default configuration.");
                JournalToml::default()
            };
            println!();

            println!("[server]");
            println!("  host = \"{}\"", toml.server.host);
            println!("  port = {}", toml.server.port);
            println!("  db_path = \"{}\"", toml.server.db_path);
            println!("  dev_mode = {}", toml.server.dev_mode);
            println!();

            println!("[autosave]");
            println!("  interval_secs = {}", toml.autosave.interval_secs);
            println!("  enabled = {}", toml.autosave.enabled);
            println!();

            println!("[export]");
            println!("  include_private = {}", toml.export.include_private);
            println!("  include_metadata = {}", toml.export.include_metadata);
            println!("  out_dir = \"{}\"", toml.export.out_dir);
            println!();

            // Tokens stay out of the terminal.
            println!("[auth]");
            println!("  users = {}", toml.auth.users.len());
            for user in &toml.auth.users {
                println!("    - {}", user.user_id);
            }
            println!();

            if project_dir.exists() {
                println!("Effective values (with env/CLI overrides):");
                let config = JournalConfig::new(project_dir.to_path_buf())?;
                println!("  port = {}", config.port());
                println!("  db_path = \"{}\"", config.db_path().display());
                println!();
            }

            if !config_path.exists() {
                println!("Run 'journal config init' to create a journal.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No journal.toml found. Using defaults.");
            }

            let toml = JournalToml::load_or_default(&journal_dir)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("journal.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !journal_dir.exists() {
                std::fs::create_dir_all(&journal_dir)?;
            }

            let toml = JournalToml::default();
            toml.save(&config_path)?;

            println!("Created journal.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path");
            println!("  - [autosave] interval_secs (5, 10, 30 or 60), enabled");
            println!("  - [[auth.users]] token, user_id for each account");
            println!();
        }
    }

    Ok(())
}
