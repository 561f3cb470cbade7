//! BuildKit LLB graph construction
//!
//! States are immutable values linked by `Arc`; composing an operation on a
//! state yields a new state. [`State::marshal`] walks the graph and produces
//! a [`Definition`] in the wire format BuildKit solves.

pub mod caps;
pub mod constraints;
mod marshal;
pub mod pb;
mod state;

use thiserror::Error;

pub use caps::CapSet;
pub use constraints::{custom_name, ignore_cache, Constraints, ConstraintsOpt};
pub use marshal::{digest_of, Definition};
pub use state::{
    copy, normalize_image_ref, CacheMount, CacheSharing, CopyInfo, ExecMount, ExecOp, ExecState,
    FileAction, FileOp, LocalOptions, Mount, Op, Output, RunOptions, SourceOp, State, Vertex,
    ATTR_FOLLOW_PATHS, ATTR_INCLUDE_PATTERNS,
};

#[derive(Debug, Error)]
pub enum LlbError {
    #[error("invalid command line: {0:?}")]
    InvalidCommand(String),

    #[error("capability {cap} required by '{op}' is not supported by the engine")]
    UnsupportedCapability { cap: String, op: String },
}
