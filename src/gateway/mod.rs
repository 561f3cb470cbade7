//! Execution engine contract
//!
//! The frontend never runs anything itself. It hands definitions to a
//! [`Client`] (a BuildKit gateway in production) and reads files back from
//! the [`Reference`]s the engine returns.

mod local;
mod mock;

use crate::llb::{CapSet, Definition};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use local::{DirectoryRef, LocalClient};
pub use mock::{MemoryRef, MockClient};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("solve failed: {0}")]
    Solve(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported definition: {0}")]
    Unsupported(String),

    #[error("invalid definition")]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A solve succeeded but did not produce exactly one reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResultShapeError {
    #[error("result has no reference")]
    Empty,

    #[error("result has {0} named references instead of a single one")]
    Multiple(usize),
}

/// Options the engine passes to the frontend for one build
#[derive(Debug, Clone, Default)]
pub struct BuildOpts {
    pub opts: BTreeMap<String, String>,
    pub llb_caps: CapSet,
}

impl BuildOpts {
    pub fn new(llb_caps: CapSet) -> Self {
        Self {
            opts: BTreeMap::new(),
            llb_caps,
        }
    }

    pub fn with_opt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.opts.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.opts.contains_key(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolveRequest {
    pub definition: Definition,
}

#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub filename: String,
}

impl ReadRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

/// Output of a solve: a single reference, or named references for
/// multi-platform builds.
#[derive(Debug, Clone, Default)]
pub struct SolveResult {
    reference: Option<Arc<dyn Reference>>,
    refs: BTreeMap<String, Arc<dyn Reference>>,
}

impl SolveResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ref(reference: Arc<dyn Reference>) -> Self {
        Self {
            reference: Some(reference),
            ..Default::default()
        }
    }

    pub fn add_ref(&mut self, key: impl Into<String>, reference: Arc<dyn Reference>) {
        self.refs.insert(key.into(), reference);
    }

    pub fn single_ref(&self) -> Result<Arc<dyn Reference>, ResultShapeError> {
        if !self.refs.is_empty() {
            return Err(ResultShapeError::Multiple(self.refs.len()));
        }
        self.reference.clone().ok_or(ResultShapeError::Empty)
    }
}

#[async_trait]
pub trait Reference: Send + Sync + fmt::Debug {
    async fn read_file(&self, req: ReadRequest) -> Result<Bytes, GatewayError>;
}

#[async_trait]
pub trait Client: Send + Sync {
    fn build_opts(&self) -> &BuildOpts;

    async fn solve(&self, req: SolveRequest) -> Result<SolveResult, GatewayError>;
}
