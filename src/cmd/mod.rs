//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `init`    | `Init`           |
//! | `serve`   | `Serve`          |
//! | `export`  | `Export`         |
//! | `config`  | `Config`         |

pub mod config;
pub mod export;
pub mod init;
pub mod serve;

pub use config::cmd_config;
pub use export::{ExportArgs, cmd_export};
pub use init::cmd_init;
pub use serve::cmd_serve;
