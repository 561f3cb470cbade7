use llb_yarn::cli::commands::{CliArgs, Commands};
use llb_yarn::cli::handlers::{handle_generate, handle_workspaces};
use llb_yarn::util::logging::{init_logging, parse_level, LoggingConfig};
use llb_yarn::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(logging_config(&args));

    debug!("llb-yarn v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Generate(generate_args) => handle_generate(generate_args).await,
        Commands::Workspaces(workspaces_args) => handle_workspaces(workspaces_args).await,
    };

    std::process::exit(exit_code);
}

fn logging_config(args: &CliArgs) -> LoggingConfig {
    let mut config = LoggingConfig::from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    config
}
