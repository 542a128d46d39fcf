//! Server configuration read from `.journal/journal.toml`.
//!
//! Settings are layered file → environment → CLI:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3141
//! db_path = "journal.db"   # relative to .journal/
//! dev_mode = false
//!
//! [autosave]
//! interval_secs = 10
//! enabled = true
//!
//! [export]
//! include_private = false
//! include_metadata = true
//! out_dir = "exports"
//!
//! [[auth.users]]
//! token = "dev-token"
//! user_id = "u1"
//! email = "me@example.com"
//! name = "Me"
//! ```
//!
//! `JOURNAL_PORT` and `JOURNAL_DB` override the file (a `.env` file in the
//! working directory is honoured). CLI flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".journal";
pub const CONFIG_FILE: &str = "journal.toml";

/// Autosave delays a user may choose, in seconds.
pub const ALLOWED_AUTOSAVE_INTERVALS: [u64; 4] = [5, 10, 30, 60];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Enables permissive CORS for a separately served frontend.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> String {
    "journal.db".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

/// Server-wide autosave defaults. Users may pick their own interval in
/// their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for AutosaveSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default)]
    pub include_private: bool,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

fn default_out_dir() -> String {
    "exports".to_string()
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            include_private: false,
            include_metadata: true,
            out_dir: default_out_dir(),
        }
    }
}

/// One account accepted by the bearer-token session provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub users: Vec<UserAccount>,
}

/// The complete journal.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub autosave: AutosaveSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub auth: AuthSection,
}

impl JournalToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse journal.toml")
    }

    /// Load `journal.toml` from `journal_dir`, or defaults if it is missing.
    pub fn load_or_default(journal_dir: &Path) -> Result<Self> {
        let config_path = journal_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize journal.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.server.db_path.trim().is_empty() {
            warnings.push("server.db_path is empty".to_string());
        }
        if !ALLOWED_AUTOSAVE_INTERVALS.contains(&self.autosave.interval_secs) {
            warnings.push(format!(
                "Invalid autosave.interval_secs {}: expected one of {:?}",
                self.autosave.interval_secs, ALLOWED_AUTOSAVE_INTERVALS
            ));
        }
        if self.auth.users.is_empty() {
            warnings.push("No [[auth.users]] configured: every API request will be rejected".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.auth.users {
            if user.token.trim().is_empty() {
                warnings.push(format!("User '{}' has an empty token", user.user_id));
            } else if !seen.insert(user.token.as_str()) {
                warnings.push(format!("Duplicate token for user '{}'", user.user_id));
            }
        }

        warnings
    }
}

/// Resolved configuration: journal.toml merged with environment and CLI.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub project_dir: PathBuf,
    pub journal_dir: PathBuf,
    pub toml: JournalToml,
    pub verbose: bool,
    cli_port: Option<u16>,
    cli_db_path: Option<PathBuf>,
    cli_dev: bool,
}

impl JournalConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let journal_dir = project_dir.join(CONFIG_DIR);
        let toml = JournalToml::load_or_default(&journal_dir)?;

        Ok(Self {
            project_dir,
            journal_dir,
            toml,
            verbose: false,
            cli_port: None,
            cli_db_path: None,
            cli_dev: false,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        port: Option<u16>,
        db_path: Option<PathBuf>,
        dev: bool,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_port = port;
        config.cli_db_path = db_path;
        config.cli_dev = dev;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.journal_dir.join(CONFIG_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.journal_dir.join("logs")
    }

    pub fn host(&self) -> &str {
        &self.toml.server.host
    }

    /// Port (CLI → `JOURNAL_PORT` → file).
    pub fn port(&self) -> u16 {
        self.cli_port
            .or_else(|| {
                std::env::var("JOURNAL_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
            })
            .unwrap_or(self.toml.server.port)
    }

    /// Database path (CLI → `JOURNAL_DB` → file). Relative file paths
    /// resolve against `.journal/`.
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.cli_db_path {
            return path.clone();
        }
        if let Ok(path) = std::env::var("JOURNAL_DB") {
            return PathBuf::from(path);
        }
        let configured = PathBuf::from(&self.toml.server.db_path);
        if configured.is_absolute() {
            configured
        } else {
            self.journal_dir.join(configured)
        }
    }

    pub fn dev_mode(&self) -> bool {
        self.cli_dev || self.toml.server.dev_mode
    }

    pub fn export_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.export.out_dir)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_journal_toml_parse_empty() {
        let toml = JournalToml::parse("").unwrap();
        assert_eq!(toml.server.port, 3141);
        assert_eq!(toml.server.db_path, "journal.db");
        assert_eq!(toml.autosave.interval_secs, 10);
        assert!(toml.autosave.enabled);
        assert!(toml.export.include_metadata);
        assert!(!toml.export.include_private);
        assert!(toml.auth.users.is_empty());
    }

    #[test]
    fn test_journal_toml_parse_full() {
        let content = r#"
[server]
host = "0.0.0.0"
port = 8080
dev_mode = true

[autosave]
interval_secs = 30
enabled = false

[[auth.users]]
token = "t1"
user_id = "u1"
email = "one@example.com"

[[auth.users]]
token = "t2"
user_id = "u2"
"#;
        let toml = JournalToml::parse(content).unwrap();
        assert_eq!(toml.server.host, "0.0.0.0");
        assert_eq!(toml.server.port, 8080);
        assert!(toml.server.dev_mode);
        assert_eq!(toml.autosave.interval_secs, 30);
        assert!(!toml.autosave.enabled);
        assert_eq!(toml.auth.users.len(), 2);
        assert_eq!(toml.auth.users[0].email.as_deref(), Some("one@example.com"));
        assert!(toml.auth.users[1].name.is_none());
    }

    #[test]
    fn test_journal_toml_parse_invalid() {
        assert!(JournalToml::parse("[server]\nport = \"high\"").is_err());
    }

    #[test]
    fn test_journal_toml_validate() {
        let mut toml = JournalToml::default();
        toml.auth.users.push(UserAccount {
            token: "t".into(),
            user_id: "u1".into(),
            email: None,
            name: None,
        });
        assert!(toml.validate().is_empty());

        toml.autosave.interval_secs = 7;
        toml.auth.users.push(UserAccount {
            token: "t".into(),
            user_id: "u2".into(),
            email: None,
            name: None,
        });
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("interval_secs 7"));
        assert!(warnings[1].contains("Duplicate token"));
    }

    #[test]
    fn test_journal_toml_warns_without_users() {
        let warnings = JournalToml::default().validate();
        assert!(warnings.iter().any(|w| w.contains("auth.users")));
    }

    #[test]
    fn test_journal_toml_load_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut toml = JournalToml::default();
        toml.server.port = 9000;
        toml.autosave.interval_secs = 60;
        toml.save(&path).unwrap();

        let loaded = JournalToml::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.autosave.interval_secs, 60);
    }

    #[test]
    fn test_journal_toml_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = JournalToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.server.port, 3141);
    }

    #[test]
    fn test_journal_config_paths() {
        let dir = tempdir().unwrap();
        let config = JournalConfig::new(dir.path().to_path_buf()).unwrap();

        assert!(config.config_file().ends_with(".journal/journal.toml"));
        assert!(config.log_dir().ends_with(".journal/logs"));
        assert!(config.export_dir().ends_with("exports"));
    }

    #[test]
    fn test_journal_config_cli_overrides() {
        let dir = tempdir().unwrap();
        let journal_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&journal_dir).unwrap();
        std::fs::write(
            journal_dir.join(CONFIG_FILE),
            "[server]\nport = 4000\ndb_path = \"data/j.db\"\n",
        )
        .unwrap();

        let config = JournalConfig::new(dir.path().to_path_buf()).unwrap();
        assert!(config.db_path().ends_with(".journal/data/j.db"));
        assert!(!config.dev_mode());

        let config = JournalConfig::with_cli_args(
            dir.path().to_path_buf(),
            true,
            Some(5000),
            Some(PathBuf::from("/tmp/other.db")),
            true,
        )
        .unwrap();
        assert_eq!(config.port(), 5000);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/other.db"));
        assert!(config.dev_mode());
        assert!(config.verbose);
    }
}
