//! Install errors
//!
//! Every failure names the stage that produced it so callers can tell a
//! broken discovery solve from a broken final solve.

use crate::config::ConfigError;
use crate::gateway::{GatewayError, ResultShapeError};
use crate::llb::LlbError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Solve of the manifest files used to find workspaces
    Discovery,
    /// Solve of the complete install pipeline
    Final,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovery => write!(f, "discovery"),
            Stage::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid build options")]
    Config(#[from] ConfigError),

    #[error("failed to generate llb for {stage} stage")]
    Compose {
        stage: Stage,
        #[source]
        source: LlbError,
    },

    #[error("failed to resolve {stage} definition")]
    Resolve {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("{stage} solve returned an unexpected result")]
    AmbiguousResult {
        stage: Stage,
        #[source]
        source: ResultShapeError,
    },

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to parse {path}")]
    MalformedManifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{stage} stage was cancelled")]
    Cancelled { stage: Stage },
}

impl InstallError {
    /// Stage the error belongs to, if it happened around a solve
    pub fn stage(&self) -> Option<Stage> {
        match self {
            InstallError::Compose { stage, .. }
            | InstallError::Resolve { stage, .. }
            | InstallError::AmbiguousResult { stage, .. }
            | InstallError::Cancelled { stage } => Some(*stage),
            InstallError::Read { .. } | InstallError::MalformedManifest { .. } => {
                Some(Stage::Discovery)
            }
            InstallError::Config(_) => None,
        }
    }
}
