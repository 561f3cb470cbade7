use super::{cancellable, MANIFEST};
use crate::error::{InstallError, Stage};
use crate::gateway::{Client, ReadRequest, SolveRequest};
use crate::llb::State;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Solves `context` and returns the manifest globs of its declared
/// workspaces, in declaration order.
pub async fn discover_patterns(
    client: &dyn Client,
    context: &State,
    cancel: &CancellationToken,
) -> Result<Vec<String>, InstallError> {
    let definition = context
        .marshal(&client.build_opts().llb_caps)
        .map_err(|source| InstallError::Compose {
            stage: Stage::Discovery,
            source,
        })?;

    debug!(ops = definition.len(), "Resolving context for workspace discovery");

    let manifest = cancellable(Stage::Discovery, cancel, async {
        let result = client
            .solve(SolveRequest { definition })
            .await
            .map_err(|source| InstallError::Resolve {
                stage: Stage::Discovery,
                source,
            })?;

        let reference = result
            .single_ref()
            .map_err(|source| InstallError::AmbiguousResult {
                stage: Stage::Discovery,
                source,
            })?;

        reference
            .read_file(ReadRequest::new(MANIFEST))
            .await
            .map_err(|source| InstallError::Read {
                path: MANIFEST.to_string(),
                source,
            })
    })
    .await?;

    let patterns =
        parse_workspace_patterns(&manifest).map_err(|source| InstallError::MalformedManifest {
            path: MANIFEST.to_string(),
            source,
        })?;

    info!(count = patterns.len(), "Discovered workspace patterns");
    Ok(patterns)
}

/// Extracts `<entry>/package.json` for every string in the manifest's
/// `workspaces` array.
///
/// Only a document that is not a JSON object fails. A missing `workspaces`
/// key, a non-array value (including yarn's `{ "packages": [...] }` form)
/// and non-string entries all yield no patterns. Invalid UTF-8 is replaced
/// with U+FFFD rather than rejected.
pub fn parse_workspace_patterns(manifest: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let manifest = String::from_utf8_lossy(manifest);
    let pkg: Option<Map<String, Value>> = serde_json::from_str(&manifest)?;

    let patterns = match pkg.as_ref().and_then(|pkg| pkg.get("workspaces")) {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(entry) => Some(manifest_path(entry)),
                _ => None,
            })
            .collect(),
        Some(_) | None => Vec::new(),
    };

    Ok(patterns)
}

fn manifest_path(entry: &str) -> String {
    let mut path = PathBuf::new();
    for component in Path::new(entry).join(MANIFEST).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match path.components().next_back() {
                Some(Component::Normal(_)) => {
                    path.pop();
                }
                // `..` never climbs above the root
                Some(Component::RootDir) => {}
                _ => path.push(".."),
            },
            other => path.push(other.as_os_str()),
        }
    }
    path.to_string_lossy().into_owned()
}
