pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, GenerateArgs, GenerateFormat, ReportFormat, WorkspacesArgs};
pub use output::{OutputFormatter, WorkspaceReport};
