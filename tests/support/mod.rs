use llb_yarn::gateway::{MemoryRef, SolveRequest, SolveResult};
use llb_yarn::llb::{pb, Definition};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[allow(dead_code)]
pub fn get_llb_yarn_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.join("llb-yarn")
}

/// Solve result exposing a single `package.json`
#[allow(dead_code)]
pub fn manifest_result(manifest: &str) -> SolveResult {
    SolveResult::with_ref(Arc::new(
        MemoryRef::new().with_file("package.json", manifest.to_string()),
    ))
}

#[allow(dead_code)]
pub fn empty_result() -> SolveResult {
    SolveResult::with_ref(Arc::new(MemoryRef::new()))
}

#[allow(dead_code)]
pub fn image_identifiers(request: &SolveRequest) -> Vec<String> {
    request
        .definition
        .ops()
        .unwrap()
        .into_iter()
        .filter_map(|op| match op.op {
            Some(pb::op::Op::Source(source)) if source.identifier.starts_with("docker-image://") => {
                Some(source.identifier)
            }
            _ => None,
        })
        .collect()
}

/// The install run and its metadata
#[allow(dead_code)]
pub fn install_op(definition: &Definition) -> (pb::ExecOp, pb::OpMetadata) {
    let digests = definition.digests();
    let ops = definition.ops().unwrap();
    for (digest, op) in digests.iter().zip(ops) {
        if let Some(pb::op::Op::Exec(exec)) = op.op {
            let metadata = definition.metadata(digest).cloned().unwrap_or_default();
            return (exec, metadata);
        }
    }
    panic!("definition has no exec op");
}

/// Copy actions in definition order
#[allow(dead_code)]
pub fn copies(definition: &Definition) -> Vec<pb::FileActionCopy> {
    definition
        .ops()
        .unwrap()
        .into_iter()
        .filter_map(|op| match op.op {
            Some(pb::op::Op::File(file)) => Some(file.actions),
            _ => None,
        })
        .flatten()
        .filter_map(|action| match action.action {
            Some(pb::file_action::Action::Copy(copy)) => Some(copy),
            None => None,
        })
        .collect()
}

/// Yarn monorepo with two workspaces
#[allow(dead_code)]
pub fn write_monorepo(root: &Path) {
    fs::write(
        root.join("package.json"),
        r#"{"private": true, "workspaces": ["packages/api", "packages/web"]}"#,
    )
    .unwrap();
    fs::write(root.join("yarn.lock"), "# yarn lockfile v1\n").unwrap();
    for member in ["api", "web"] {
        let dir = root.join("packages").join(member);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name": "{}"}}"#, member),
        )
        .unwrap();
    }
}
