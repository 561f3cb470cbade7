use super::caps::*;
use super::constraints::{Constraints, ConstraintsOpt};
use super::LlbError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_PATH_ENV: &str = "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

pub const ATTR_FOLLOW_PATHS: &str = "local.followpaths";
pub const ATTR_INCLUDE_PATTERNS: &str = "local.includepattern";

/// One filesystem in the build graph.
///
/// A state is either scratch (no output) or a single output of a vertex.
/// States never change: every composition step returns a new state that
/// holds its predecessors by `Arc`, so cloning is cheap and states can be
/// shared freely between graphs.
#[derive(Debug, Clone, Default)]
pub struct State {
    output: Option<Output>,
    dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Output {
    vertex: Arc<Vertex>,
    index: i64,
}

impl Output {
    pub fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub(crate) fn vertex_arc(&self) -> &Arc<Vertex> {
        &self.vertex
    }
}

#[derive(Debug)]
pub struct Vertex {
    op: Op,
    inputs: Vec<Output>,
    constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Source(SourceOp),
    File(FileOp),
    Exec(ExecOp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOp {
    pub identifier: String,
    pub attrs: BTreeMap<String, String>,
}

/// A single copy action. `base` and `source` index into the vertex inputs;
/// `None` stands for scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOp {
    pub base: Option<usize>,
    pub source: Option<usize>,
    pub src_path: String,
    pub dest_path: String,
    pub info: CopyInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOp {
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub mounts: Vec<ExecMount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecMount {
    pub dest: String,
    pub input: Option<usize>,
    pub output: Option<i64>,
    pub cache: Option<CacheMount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMount {
    pub id: String,
    pub sharing: CacheSharing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSharing {
    Shared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyInfo {
    pub follow_symlinks: bool,
    pub copy_dir_contents_only: bool,
    pub attempt_unpack: bool,
    pub create_dest_path: bool,
    pub allow_wildcard: bool,
    pub allow_empty_wildcard: bool,
}

impl Vertex {
    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub(crate) fn required_caps(&self) -> Vec<&'static str> {
        let mut caps = match &self.op {
            Op::Source(source) if source.identifier.starts_with("docker-image://") => {
                vec![CAP_SOURCE_IMAGE]
            }
            Op::Source(source) => {
                let mut caps = vec![CAP_SOURCE_LOCAL];
                if source.attrs.contains_key(ATTR_FOLLOW_PATHS) {
                    caps.push(CAP_SOURCE_LOCAL_FOLLOW_PATHS);
                }
                if source.attrs.contains_key(ATTR_INCLUDE_PATTERNS) {
                    caps.push(CAP_SOURCE_LOCAL_INCLUDE_PATTERNS);
                }
                caps
            }
            Op::File(_) => vec![CAP_FILE_BASE],
            Op::Exec(exec) => {
                let mut caps = vec![CAP_EXEC_META_BASE];
                if exec.mounts.iter().any(|m| m.cache.is_some()) {
                    caps.push(CAP_EXEC_MOUNT_CACHE);
                    caps.push(CAP_EXEC_MOUNT_CACHE_SHARING);
                }
                caps
            }
        };

        if self.constraints.ignore_cache {
            caps.push(CAP_META_IGNORE_CACHE);
        }
        if !self.constraints.description.is_empty() {
            caps.push(CAP_META_DESCRIPTION);
        }
        caps
    }

    /// Short label used in errors and graph dumps
    pub fn describe(&self) -> String {
        if let Some(name) = self.constraints.custom_name() {
            return name.to_string();
        }
        match &self.op {
            Op::Source(source) => source.identifier.clone(),
            Op::File(file) => format!("copy {} -> {}", file.src_path, file.dest_path),
            Op::Exec(exec) => exec.args.join(" "),
        }
    }
}

/// Options for a `local://` context source
#[derive(Default)]
pub struct LocalOptions {
    follow_paths: Vec<String>,
    include_patterns: Vec<String>,
    constraints: Constraints,
}

impl LocalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.follow_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn include_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with(mut self, opt: impl ConstraintsOpt) -> Self {
        opt.set_constraints_option(&mut self.constraints);
        self
    }
}

/// An additional mount for a run; the root filesystem is always mounted at `/`.
pub struct Mount {
    target: String,
    cache: CacheMount,
}

impl Mount {
    /// Persistent cache directory identified by `id`, kept by the engine
    /// across builds.
    pub fn cache(target: impl Into<String>, id: impl Into<String>, sharing: CacheSharing) -> Self {
        Self {
            target: target.into(),
            cache: CacheMount {
                id: id.into(),
                sharing,
            },
        }
    }
}

pub struct RunOptions {
    args: Vec<String>,
    mounts: Vec<Mount>,
    constraints: Constraints,
}

impl RunOptions {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            mounts: Vec::new(),
            constraints: Constraints::default(),
        }
    }

    /// Split `command` with POSIX shell quoting rules
    pub fn shlex(command: &str) -> Result<Self, LlbError> {
        match shlex::split(command) {
            Some(args) if !args.is_empty() => Ok(Self::new(args)),
            _ => Err(LlbError::InvalidCommand(command.to_string())),
        }
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn with(mut self, opt: impl ConstraintsOpt) -> Self {
        opt.set_constraints_option(&mut self.constraints);
        self
    }
}

pub struct FileAction {
    source: State,
    src_path: String,
    dest_path: String,
    info: CopyInfo,
}

/// Copy `src_path` from `source` to `dest_path` of the state the action is
/// applied to.
pub fn copy(
    source: &State,
    src_path: impl Into<String>,
    dest_path: impl Into<String>,
    info: &CopyInfo,
) -> FileAction {
    FileAction {
        source: source.clone(),
        src_path: src_path.into(),
        dest_path: dest_path.into(),
        info: *info,
    }
}

/// Result of [`State::run`]
#[derive(Debug, Clone)]
pub struct ExecState {
    vertex: Arc<Vertex>,
    dir: Option<String>,
}

impl ExecState {
    /// Root filesystem after the command ran
    pub fn root(&self) -> State {
        State {
            output: Some(Output {
                vertex: Arc::clone(&self.vertex),
                index: 0,
            }),
            dir: self.dir.clone(),
        }
    }
}

impl State {
    pub fn scratch() -> Self {
        Self::default()
    }

    pub fn image(reference: &str) -> Self {
        Self::source(
            SourceOp {
                identifier: format!("docker-image://{}", normalize_image_ref(reference)),
                attrs: BTreeMap::new(),
            },
            Constraints::default(),
        )
    }

    pub fn local(name: &str, opts: LocalOptions) -> Self {
        let mut attrs = BTreeMap::new();
        if !opts.follow_paths.is_empty() {
            attrs.insert(ATTR_FOLLOW_PATHS.to_string(), json_array(&opts.follow_paths));
        }
        if !opts.include_patterns.is_empty() {
            attrs.insert(
                ATTR_INCLUDE_PATTERNS.to_string(),
                json_array(&opts.include_patterns),
            );
        }

        Self::source(
            SourceOp {
                identifier: format!("local://{}", name),
                attrs,
            },
            opts.constraints,
        )
    }

    fn source(op: SourceOp, constraints: Constraints) -> Self {
        Self {
            output: Some(Output {
                vertex: Arc::new(Vertex {
                    op: Op::Source(op),
                    inputs: Vec::new(),
                    constraints,
                }),
                index: 0,
            }),
            dir: None,
        }
    }

    pub fn is_scratch(&self) -> bool {
        self.output.is_none()
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// The vertex producing this state, `None` for scratch
    pub fn vertex(&self) -> Option<&Vertex> {
        self.output.as_ref().map(Output::vertex)
    }

    pub fn get_dir(&self) -> &str {
        self.dir.as_deref().unwrap_or("/")
    }

    /// Working directory for later runs; relative paths resolve against the
    /// current one.
    pub fn dir(&self, path: &str) -> Self {
        Self {
            output: self.output.clone(),
            dir: Some(resolve_path(self.get_dir(), path)),
        }
    }

    pub fn file(&self, action: FileAction) -> Self {
        let mut inputs = Vec::new();

        let base = self.output.clone().map(|output| {
            inputs.push(output);
            inputs.len() - 1
        });
        let source = action.source.output.clone().map(|output| {
            inputs.push(output);
            inputs.len() - 1
        });

        let op = FileOp {
            base,
            source,
            src_path: resolve_path(action.source.get_dir(), &action.src_path),
            dest_path: resolve_path(self.get_dir(), &action.dest_path),
            info: action.info,
        };

        Self {
            output: Some(Output {
                vertex: Arc::new(Vertex {
                    op: Op::File(op),
                    inputs,
                    constraints: Constraints::default(),
                }),
                index: 0,
            }),
            dir: self.dir.clone(),
        }
    }

    pub fn run(&self, opts: RunOptions) -> ExecState {
        let mut inputs = Vec::new();
        let mut mounts = Vec::with_capacity(opts.mounts.len() + 1);

        let root_input = self.output.clone().map(|output| {
            inputs.push(output);
            inputs.len() - 1
        });
        mounts.push(ExecMount {
            dest: "/".to_string(),
            input: root_input,
            output: Some(0),
            cache: None,
        });
        mounts.extend(opts.mounts.into_iter().map(|mount| ExecMount {
            dest: mount.target,
            input: None,
            output: None,
            cache: Some(mount.cache),
        }));

        let op = ExecOp {
            args: opts.args,
            env: vec![DEFAULT_PATH_ENV.to_string()],
            cwd: self.get_dir().to_string(),
            mounts,
        };

        ExecState {
            vertex: Arc::new(Vertex {
                op: Op::Exec(op),
                inputs,
                constraints: opts.constraints,
            }),
            dir: self.dir.clone(),
        }
    }
}

fn resolve_path(dir: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        Path::new(dir).join(path).to_string_lossy().into_owned()
    }
}

fn json_array(values: &[String]) -> String {
    serde_json::Value::from(values.to_vec()).to_string()
}

/// Expand a short image reference the way the Docker CLI does:
/// `node:alpine` -> `docker.io/library/node:alpine`.
pub fn normalize_image_ref(reference: &str) -> String {
    let (name, suffix) = match reference.find('@') {
        Some(at) => (&reference[..at], &reference[at..]),
        None => {
            let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
            match reference[last_slash..].rfind(':') {
                Some(colon) => reference.split_at(last_slash + colon),
                None => (reference, ""),
            }
        }
    };

    let name = match name.split_once('/') {
        None => format!("docker.io/library/{}", name),
        Some((host, _)) if host.contains('.') || host.contains(':') || host == "localhost" => {
            name.to_string()
        }
        Some(_) => format!("docker.io/{}", name),
    };

    if suffix.is_empty() {
        format!("{}:latest", name)
    } else {
        format!("{}{}", name, suffix)
    }
}
