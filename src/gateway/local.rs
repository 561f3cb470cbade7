use super::{BuildOpts, Client, GatewayError, ReadRequest, Reference, SolveRequest, SolveResult};
use crate::llb::{pb, ATTR_FOLLOW_PATHS};
use crate::yarn::CONTEXT_NAME;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Serves a local directory as the `context` source.
///
/// Only definitions whose output is a `local://` source can be solved; the
/// result exposes the directory (restricted to the followed paths, like the
/// BuildKit file sync does). Anything that needs execution is rejected.
pub struct LocalClient {
    root: PathBuf,
    opts: BuildOpts,
}

impl LocalClient {
    pub fn new(root: impl Into<PathBuf>, opts: BuildOpts) -> Self {
        Self {
            root: root.into(),
            opts,
        }
    }
}

#[async_trait]
impl Client for LocalClient {
    fn build_opts(&self) -> &BuildOpts {
        &self.opts
    }

    async fn solve(&self, req: SolveRequest) -> Result<SolveResult, GatewayError> {
        let head = req
            .definition
            .head()?
            .ok_or_else(|| GatewayError::Unsupported("empty definition".to_string()))?;

        let Some(pb::op::Op::Source(source)) = head.op else {
            return Err(GatewayError::Unsupported(
                "only local sources can be solved without a BuildKit daemon".to_string(),
            ));
        };

        let name = source
            .identifier
            .strip_prefix("local://")
            .ok_or_else(|| GatewayError::Unsupported(format!("source {}", source.identifier)))?;
        if name != CONTEXT_NAME {
            return Err(GatewayError::Unsupported(format!(
                "unknown local context '{}'",
                name
            )));
        }

        let follow_paths = source
            .attrs
            .get(ATTR_FOLLOW_PATHS)
            .map(|raw| serde_json::from_str::<Vec<String>>(raw))
            .transpose()
            .map_err(|e| GatewayError::Unsupported(format!("invalid follow paths: {}", e)))?;

        debug!(root = %self.root.display(), ?follow_paths, "Solved local context");

        Ok(SolveResult::with_ref(Arc::new(DirectoryRef {
            root: self.root.clone(),
            follow_paths,
        })))
    }
}

#[derive(Debug)]
pub struct DirectoryRef {
    root: PathBuf,
    follow_paths: Option<Vec<String>>,
}

#[async_trait]
impl Reference for DirectoryRef {
    async fn read_file(&self, req: ReadRequest) -> Result<Bytes, GatewayError> {
        let rel = req.filename.trim_start_matches('/');

        if let Some(paths) = &self.follow_paths {
            if !paths.iter().any(|p| p.trim_start_matches('/') == rel) {
                return Err(GatewayError::NotFound(req.filename));
            }
        }

        match tokio::fs::read(self.root.join(rel)).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(GatewayError::NotFound(req.filename)),
            Err(e) => Err(GatewayError::Io(e)),
        }
    }
}
