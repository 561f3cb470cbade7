use super::{CONTEXT_NAME, MANIFEST};
use crate::config::Lockfile;
use crate::llb::{custom_name, LocalOptions, State};

/// Files pulled from the context before anything else
pub fn input_files(lockfile: Lockfile) -> [&'static str; 4] {
    [MANIFEST, lockfile.filename(), ".npmrc", ".yarnrc"]
}

/// Manifest, lockfile and package manager configuration from the context
pub fn context_source(lockfile: Lockfile) -> State {
    let inputs = input_files(lockfile);
    let name = format!("load {}", quoted_list(&inputs));

    State::local(
        CONTEXT_NAME,
        LocalOptions::new()
            .follow_paths(inputs)
            .with(custom_name(name)),
    )
}

/// Workspace member manifests matched by `patterns`
pub fn workspace_source(patterns: &[String]) -> State {
    State::local(
        CONTEXT_NAME,
        LocalOptions::new()
            .include_patterns(patterns.iter().cloned())
            .with(custom_name(format!(
                "load workspaces {}",
                quoted_list(patterns)
            ))),
    )
}

/// `["a" "b"]`, the form BuildKit progress output uses for path lists
fn quoted_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("{:?}", item.as_ref()))
        .collect();
    format!("[{}]", quoted.join(" "))
}
