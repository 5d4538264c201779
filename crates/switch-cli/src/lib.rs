pub mod commands;
pub mod error;
pub mod output;

pub use commands::{AskCommand, ConfigCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, truncate_string};
