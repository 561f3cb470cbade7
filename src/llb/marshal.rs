use super::caps::CapSet;
use super::pb;
use super::state::{CacheSharing, ExecMount, Op, State, Vertex};
use super::LlbError;
use prost::Message as ProstMessage;
use sha2::{Digest, Sha256};
use std::collections::{btree_map, BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Marshaled LLB: op bytes in dependency order, terminal op last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Definition {
    inner: pb::Definition,
}

impl Definition {
    pub fn from_pb(inner: pb::Definition) -> Self {
        Self { inner }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Ok(Self {
            inner: pb::Definition::decode(bytes)?,
        })
    }

    pub fn to_pb(&self) -> &pb::Definition {
        &self.inner
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.encode_to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.def.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.def.is_empty()
    }

    pub fn digests(&self) -> Vec<String> {
        self.inner.def.iter().map(|dt| digest_of(dt)).collect()
    }

    pub fn metadata(&self, digest: &str) -> Option<&pb::OpMetadata> {
        self.inner.metadata.get(digest)
    }

    pub fn ops(&self) -> Result<Vec<pb::Op>, prost::DecodeError> {
        self.inner
            .def
            .iter()
            .map(|dt| pb::Op::decode(dt.as_slice()))
            .collect()
    }

    /// The op the terminal points at, i.e. the definition's output
    pub fn head(&self) -> Result<Option<pb::Op>, prost::DecodeError> {
        let ops = self.ops()?;
        let Some(input) = ops.last().and_then(|terminal| terminal.inputs.first()) else {
            return Ok(None);
        };
        Ok(self
            .digests()
            .iter()
            .position(|d| *d == input.digest)
            .map(|i| ops[i].clone()))
    }

    pub fn summary(&self) -> String {
        let mut output = String::from("\n=== LLB Graph Structure ===\n\n");
        let digests = self.digests();

        for (idx, dt) in self.inner.def.iter().enumerate() {
            output.push_str(&format!("{} ({}) -> ", idx, digests[idx]));

            let op = match pb::Op::decode(dt.as_slice()) {
                Ok(op) => op,
                Err(e) => {
                    output.push_str(&format!("INVALID ({})\n", e));
                    continue;
                }
            };

            match &op.op {
                Some(pb::op::Op::Source(source)) => {
                    if let Some(image) = source.identifier.strip_prefix("docker-image://") {
                        output.push_str(&format!("FROM {}\n", image));
                    } else {
                        output.push_str(&format!("SOURCE {}\n", source.identifier));
                    }
                    for (key, value) in &source.attrs {
                        output.push_str(&format!("          {}={}\n", key, value));
                    }
                }
                Some(pb::op::Op::Exec(exec)) => {
                    if let Some(meta) = &exec.meta {
                        output.push_str(&format!("EXEC {} (cwd {})\n", meta.args.join(" "), meta.cwd));
                    } else {
                        output.push_str("EXEC\n");
                    }

                    for mount in &exec.mounts {
                        let mount_type = pb::MountType::try_from(mount.mount_type)
                            .map(|t| t.as_str_name())
                            .unwrap_or("UNKNOWN");
                        output.push_str(&format!(
                            "          {} ({}) -> {} -> {}",
                            mount.input, mount_type, mount.dest, mount.output
                        ));
                        if let Some(cache) = &mount.cache_opt {
                            output.push_str(&format!(" [cache id={}]", cache.id));
                        }
                        output.push('\n');
                    }
                }
                Some(pb::op::Op::File(file)) => {
                    for action in &file.actions {
                        if let Some(pb::file_action::Action::Copy(copy)) = &action.action {
                            output.push_str(&format!(
                                "COPY {}:{} -> {}:{}\n",
                                action.secondary_input, copy.src, action.input, copy.dest
                            ));
                        }
                    }
                }
                None => {
                    output.push_str("OUTPUT\n");
                }
            }

            for (i, input) in op.inputs.iter().enumerate() {
                output.push_str(&format!(
                    "          input[{}]: digest={}, index={}\n",
                    i, input.digest, input.index
                ));
            }

            if let Some(md) = digests.get(idx).and_then(|d| self.inner.metadata.get(d)) {
                if md.ignore_cache {
                    output.push_str("          ignore-cache\n");
                }
            }
        }

        output.push_str("\n=== End of Graph ===\n");
        output
    }
}

pub fn digest_of(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

impl State {
    /// Serialize the graph ending at this state.
    ///
    /// Every op is checked against `caps`; the first capability the engine
    /// does not advertise aborts marshaling.
    pub fn marshal(&self, caps: &CapSet) -> Result<Definition, LlbError> {
        let Some(output) = self.output() else {
            return Ok(Definition::default());
        };

        let mut marshaler = Marshaler::new(caps);
        let digest = marshaler.visit(output.vertex_arc())?;

        let terminal = pb::Op {
            inputs: vec![pb::Input {
                digest,
                index: output.index(),
            }],
            op: None,
            platform: None,
        };
        marshaler.def.push(terminal.encode_to_vec());

        let definition = Definition::from_pb(pb::Definition {
            def: marshaler.def,
            metadata: marshaler.metadata,
        });
        debug!("{}", definition.summary());
        Ok(definition)
    }
}

struct Marshaler<'a> {
    caps: &'a CapSet,
    visited: HashMap<*const Vertex, String>,
    def: Vec<Vec<u8>>,
    metadata: BTreeMap<String, pb::OpMetadata>,
}

impl<'a> Marshaler<'a> {
    fn new(caps: &'a CapSet) -> Self {
        Self {
            caps,
            visited: HashMap::new(),
            def: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn visit(&mut self, vertex: &Arc<Vertex>) -> Result<String, LlbError> {
        let key = Arc::as_ptr(vertex);
        if let Some(digest) = self.visited.get(&key) {
            return Ok(digest.clone());
        }

        let mut inputs = Vec::with_capacity(vertex.inputs().len());
        for input in vertex.inputs() {
            let digest = self.visit(input.vertex_arc())?;
            inputs.push(pb::Input {
                digest,
                index: input.index(),
            });
        }

        let caps = vertex.required_caps();
        if let Some(cap) = caps.iter().find(|cap| !self.caps.supports(cap)) {
            return Err(LlbError::UnsupportedCapability {
                cap: cap.to_string(),
                op: vertex.describe(),
            });
        }

        let op = to_pb(vertex, inputs);
        let bytes = op.encode_to_vec();
        let digest = digest_of(&bytes);

        // Structurally identical vertices share a digest and are emitted
        // once; their metadata is merged.
        let metadata = op_metadata(vertex, &caps);
        match self.metadata.entry(digest.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(metadata);
                self.def.push(bytes);
            }
            btree_map::Entry::Occupied(mut entry) => merge_metadata(entry.get_mut(), metadata),
        }
        self.visited.insert(key, digest.clone());

        Ok(digest)
    }
}

fn to_pb(vertex: &Vertex, inputs: Vec<pb::Input>) -> pb::Op {
    let op = match vertex.op() {
        Op::Source(source) => pb::op::Op::Source(pb::SourceOp {
            identifier: source.identifier.clone(),
            attrs: source.attrs.clone(),
        }),
        Op::File(file) => pb::op::Op::File(pb::FileOp {
            actions: vec![pb::FileAction {
                input: input_index(file.base),
                secondary_input: input_index(file.source),
                output: 0,
                action: Some(pb::file_action::Action::Copy(pb::FileActionCopy {
                    src: file.src_path.clone(),
                    dest: file.dest_path.clone(),
                    mode: -1,
                    follow_symlink: file.info.follow_symlinks,
                    dir_copy_contents: file.info.copy_dir_contents_only,
                    attempt_unpack_docker_compatibility: file.info.attempt_unpack,
                    create_dest_path: file.info.create_dest_path,
                    allow_wildcard: file.info.allow_wildcard,
                    allow_empty_wildcard: file.info.allow_empty_wildcard,
                    timestamp: -1,
                    include_patterns: vec![],
                    exclude_patterns: vec![],
                })),
            }],
        }),
        Op::Exec(exec) => pb::op::Op::Exec(pb::ExecOp {
            meta: Some(pb::Meta {
                args: exec.args.clone(),
                env: exec.env.clone(),
                cwd: exec.cwd.clone(),
                user: String::new(),
            }),
            mounts: exec.mounts.iter().map(mount_to_pb).collect(),
            network: pb::NetMode::Unset as i32,
            security: pb::SecurityMode::Sandbox as i32,
        }),
    };

    pb::Op {
        inputs,
        op: Some(op),
        platform: None,
    }
}

fn mount_to_pb(mount: &ExecMount) -> pb::Mount {
    let (mount_type, cache_opt) = match &mount.cache {
        Some(cache) => (
            pb::MountType::Cache,
            Some(pb::CacheOpt {
                id: cache.id.clone(),
                sharing: sharing_to_pb(cache.sharing) as i32,
            }),
        ),
        None => (pb::MountType::Bind, None),
    };

    pb::Mount {
        input: input_index(mount.input),
        selector: String::new(),
        dest: mount.dest.clone(),
        output: mount.output.unwrap_or(-1),
        readonly: false,
        mount_type: mount_type as i32,
        cache_opt,
    }
}

fn sharing_to_pb(sharing: CacheSharing) -> pb::CacheSharingOpt {
    match sharing {
        CacheSharing::Shared => pb::CacheSharingOpt::Shared,
    }
}

fn op_metadata(vertex: &Vertex, caps: &[&'static str]) -> pb::OpMetadata {
    pb::OpMetadata {
        ignore_cache: vertex.constraints().ignore_cache,
        description: vertex.constraints().description.clone(),
        caps: caps.iter().map(|cap| (cap.to_string(), true)).collect(),
    }
}

fn merge_metadata(existing: &mut pb::OpMetadata, other: pb::OpMetadata) {
    existing.ignore_cache |= other.ignore_cache;
    for (key, value) in other.description {
        existing.description.entry(key).or_insert(value);
    }
    existing.caps.extend(other.caps);
}

fn input_index(index: Option<usize>) -> i64 {
    index.map(|i| i as i64).unwrap_or(-1)
}
