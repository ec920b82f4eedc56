use scrgen::cli::commands::{CliArgs, Commands};
use scrgen::cli::handlers::{handle_build, handle_check, handle_name};
use scrgen::util::logging::{init_logging, parse_level, LoggingConfig};
use scrgen::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("scrgen v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args).await,
        Commands::Check(check_args) => handle_check(check_args),
        Commands::Name(name_args) => handle_name(name_args),
    };

    std::process::exit(exit_code);
}

/// `--log-level` wins over `-v`/`-q`, which win over the environment
fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    } else if env::var("SCRGEN_LOG_LEVEL").is_err() {
        config.level = Level::WARN;
    }
    init_logging(config);
}
