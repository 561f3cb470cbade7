//! Yarn dependency install frontend
//!
//! Builds the LLB graph that installs a package's dependencies with yarn and
//! exports only the resulting `node_modules` tree:
//!
//! ```text
//! image ── copy context ── [copy workspaces] ── yarn install ── node_modules ─> scratch
//! ```
//!
//! Workspace member manifests are found by solving the context once and
//! reading `package.json` back before the graph is finished.

mod cache;
mod install;
mod pipeline;
mod sources;
mod workspace;

use crate::error::{InstallError, Stage};
use crate::llb::CopyInfo;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub use cache::control_cache;
pub use install::{install, new_state};
pub use pipeline::compose;
pub use sources::{context_source, input_files, workspace_source};
pub use workspace::{discover_patterns, parse_workspace_patterns};

/// Name of the local source holding the build context
pub const CONTEXT_NAME: &str = "context";

pub const MANIFEST: &str = "package.json";

/// Working directory the install runs in
pub const INSTALL_PATH: &str = "/opt/output";

pub const INSTALL_COMMAND: &str = "yarn install --non-interactive --pure-lockfile";

pub const CACHE_ID: &str = "openllb/llb-yarn";

pub const CACHE_PATH: &str = "/usr/local/share/.cache/yarn/v6";

pub const DEPENDENCY_DIR: &str = "node_modules";

/// Options shared by every copy in the pipeline
pub const COPY_INFO: CopyInfo = CopyInfo {
    follow_symlinks: true,
    copy_dir_contents_only: true,
    attempt_unpack: false,
    create_dest_path: true,
    allow_wildcard: true,
    allow_empty_wildcard: true,
};

/// Races `fut` against `cancel`; the in-flight future is dropped on cancel.
async fn cancellable<F, T>(
    stage: Stage,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, InstallError>
where
    F: Future<Output = Result<T, InstallError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InstallError::Cancelled { stage }),
        result = fut => result,
    }
}
