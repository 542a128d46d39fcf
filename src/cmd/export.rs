//! Markdown export command: `journal export`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use journal::config::JournalConfig;
use journal::export::{self, ExportOptions};
use journal::settings::{self, UserSettings};
use journal::store::EntryStore;
use journal::web::server::open_database;

pub struct ExportArgs {
    pub user: String,
    pub out: Option<PathBuf>,
    pub include_private: bool,
    pub no_metadata: bool,
    pub bundle: bool,
}

pub async fn cmd_export(project_dir: &Path, args: ExportArgs) -> Result<()> {
    let config = JournalConfig::new(project_dir.to_path_buf())?;
    let db = open_database(&config.db_path())?;

    let defaults = UserSettings::from_server_defaults(&config.toml.autosave);
    let user_settings = settings::load(&db, &args.user, &defaults).await?;
    let opts = ExportOptions {
        include_metadata: !args.no_metadata
            && config.toml.export.include_metadata
            && user_settings.export_include_metadata,
        include_private: args.include_private || config.toml.export.include_private,
    };

    let entries = db.all(&args.user, false).await?;
    let files = export::export_all(&entries, &opts);
    let out_dir = args.out.unwrap_or_else(|| config.export_dir());

    if files.is_empty() {
        println!("No entries to export for '{}'.", args.user);
        return Ok(());
    }

    if args.bundle {
        let now = chrono::Utc::now();
        let archive = export::ExportFile {
            filename: format!("journal-export-{}.md", now.format("%Y-%m-%d")),
            content: export::bundle(&files, now),
        };
        let written = export::write_files(&out_dir, std::slice::from_ref(&archive))?;
        for path in written {
            println!("Wrote {} entries to {}", files.len(), path.display());
        }
    } else {
        let written = export::write_files(&out_dir, &files)?;
        println!("Exported {} entries to {}", written.len(), out_dir.display());
        for path in written {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
