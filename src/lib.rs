//! llb-yarn - BuildKit frontend that installs yarn dependencies
//!
//! The frontend never runs anything itself. It describes a pipeline as a
//! BuildKit LLB graph and hands it to the engine:
//!
//! 1. pull `package.json`, the lockfile, `.npmrc` and `.yarnrc` from the context
//! 2. solve those once and read `package.json` back to find workspace manifests
//! 3. copy everything into a node image and run `yarn install` with a shared cache
//! 4. export only `node_modules`
//!
//! # Example
//!
//! ```no_run
//! use llb_yarn::gateway::{BuildOpts, LocalClient};
//! use llb_yarn::llb::CapSet;
//! use llb_yarn::{new_state, InstallConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = LocalClient::new("./app", BuildOpts::new(CapSet::all()));
//! let state = new_state(&client, &InstallConfig::default(), &CancellationToken::new()).await?;
//! let definition = state.marshal(&CapSet::all())?;
//! println!("{}", definition.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`llb`]: graph states, capabilities and marshaling
//! - [`gateway`]: the engine contract plus local and scripted clients
//! - [`yarn`]: source selection, workspace discovery, cache policy and the pipeline
//! - [`cli`]: the `llb-yarn` command line

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod llb;
pub mod util;
pub mod yarn;

pub use config::{ConfigError, InstallConfig, Lockfile};
pub use error::{InstallError, Stage};
pub use gateway::{Client, GatewayError, Reference, SolveResult};
pub use util::{init_from_env, init_logging, LoggingConfig};
pub use yarn::{install, new_state};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
