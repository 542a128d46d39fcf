//! HTTP server command: `journal serve`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use journal::config::JournalConfig;

pub async fn cmd_serve(
    project_dir: &Path,
    verbose: bool,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let config =
        JournalConfig::with_cli_args(project_dir.to_path_buf(), verbose, port, db_path, dev)?;

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    journal::web::server::start_server(&config).await
}
