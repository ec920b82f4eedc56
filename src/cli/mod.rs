pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CheckArgs, CliArgs, Commands, NameArgs, ProjectArgs};
pub use output::{OutputFormat, OutputFormatter};
