//! CLI command implementations

pub mod error;
pub mod fetch;
pub mod validate;

pub use error::CliError;
pub use fetch::{exit_code, Cli, Commands, FetchArgs, OutputFormat};
pub use validate::ValidateCommand;
