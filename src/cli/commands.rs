use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// BuildKit frontend that installs yarn dependencies
#[derive(Parser, Debug)]
#[command(
    name = "llb-yarn",
    about = "BuildKit frontend that installs yarn dependencies",
    version,
    long_about = "llb-yarn composes a BuildKit LLB graph that installs a package's \
                  dependencies with yarn and exports only the resulting node_modules tree. \
                  Workspace member manifests are discovered from package.json before the \
                  graph is finished."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Generate the install definition for a build context",
        long_about = "Discovers workspaces in the build context, composes the install graph \
                      and writes the marshaled LLB definition.\n\n\
                      Examples:\n  \
                      llb-yarn generate . | buildctl build --local context=. --output type=local,dest=out\n  \
                      llb-yarn generate ./app --opt yarn=node:20-alpine\n  \
                      llb-yarn generate --no-cache --format summary"
    )]
    Generate(GenerateArgs),

    #[command(
        about = "List the workspace manifest patterns of a build context",
        long_about = "Reads package.json from the build context and prints the manifest \
                      patterns of its declared workspaces.\n\n\
                      Examples:\n  \
                      llb-yarn workspaces\n  \
                      llb-yarn workspaces ./monorepo --format json"
    )]
    Workspaces(WorkspacesArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(
        value_name = "CONTEXT",
        help = "Path to the build context (defaults to current directory)"
    )]
    pub context: Option<PathBuf>,

    #[arg(
        long = "opt",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Frontend option, as passed with buildctl --opt (repeatable)"
    )]
    pub opts: Vec<(String, String)>,

    #[arg(long, help = "Ignore the cache for the install step")]
    pub no_cache: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "llb",
        help = "Output format"
    )]
    pub format: GenerateFormat,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct WorkspacesArgs {
    #[arg(
        value_name = "CONTEXT",
        help = "Path to the build context (defaults to current directory)"
    )]
    pub context: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: ReportFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateFormat {
    /// Protobuf-encoded definition for `buildctl build`
    Llb,
    /// Readable dump of the graph
    Summary,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// `KEY=VALUE`, or a bare `KEY` for presence-only options such as `no-cache`
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').unwrap_or((s, ""));
    if key.is_empty() {
        return Err(format!("Invalid option '{}': missing key", s));
    }
    Ok((key.to_string(), value.to_string()))
}
