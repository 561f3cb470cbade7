use super::{
    workspace_source, CACHE_ID, CACHE_PATH, COPY_INFO, DEPENDENCY_DIR, INSTALL_COMMAND,
    INSTALL_PATH,
};
use crate::llb::{copy, CacheSharing, ConstraintsOpt, LlbError, Mount, RunOptions, State};
use std::path::Path;
use tracing::debug;

/// Builds the install graph:
///
/// 1. `image`
/// 2. copy `context` into the install path
/// 3. copy the workspace manifests matched by `patterns` on top, if any
/// 4. run the install with the shared yarn cache mounted and `cache_opt` applied
/// 5. copy `node_modules` alone into an empty filesystem
pub fn compose(
    context: &State,
    patterns: &[String],
    image: &str,
    cache_opt: impl ConstraintsOpt,
) -> Result<State, LlbError> {
    let mut yarn = State::image(image).file(copy(context, "/", INSTALL_PATH, &COPY_INFO));

    if !patterns.is_empty() {
        debug!(?patterns, "Layering workspace manifests");
        let workspaces = workspace_source(patterns);
        yarn = yarn.file(copy(&workspaces, "/", INSTALL_PATH, &COPY_INFO));
    }

    let installed = yarn
        .dir(INSTALL_PATH)
        .run(
            RunOptions::shlex(INSTALL_COMMAND)?
                .mount(Mount::cache(CACHE_PATH, CACHE_ID, CacheSharing::Shared))
                .with(cache_opt),
        )
        .root();

    let dependencies = Path::new(INSTALL_PATH).join(DEPENDENCY_DIR);
    Ok(State::scratch().file(copy(
        &installed,
        dependencies.to_string_lossy(),
        "/",
        &COPY_INFO,
    )))
}
