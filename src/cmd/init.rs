//! Project bootstrap command: `journal init`.

use anyhow::{Context, Result};
use std::path::Path;

use journal::config::{CONFIG_DIR, CONFIG_FILE, JournalConfig, JournalToml, UserAccount};
use journal::web::server::open_database;

/// Create `.journal/` with a starter `journal.toml` (one local user with a
/// random token) and an empty database. Existing files are left alone.
pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let journal_dir = project_dir.join(CONFIG_DIR);
    std::fs::create_dir_all(&journal_dir)
        .with_context(|| format!("Failed to create {}", journal_dir.display()))?;

    let config_path = journal_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let mut toml = JournalToml::default();
        toml.auth.users.push(UserAccount {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user_id: "me".to_string(),
            email: None,
            name: None,
        });
        toml.save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let config = JournalConfig::new(project_dir.to_path_buf())?;
    let db_path = config.db_path();
    open_database(&db_path)?;
    println!("Database ready at {}", db_path.display());

    if let Some(user) = config.toml.auth.users.first() {
        println!();
        println!("Sign in as '{}' with:", user.user_id);
        println!("  Authorization: Bearer {}", user.token);
    }
    println!();
    println!("Run 'journal serve' to start the server.");
    Ok(())
}
