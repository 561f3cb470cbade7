use crate::config::OPT_NO_CACHE;
use crate::gateway::BuildOpts;
use crate::llb::{Constraints, ConstraintsOpt};

/// Forces the install step to miss the cache when `--opt no-cache` was
/// passed to `buildctl`. Only the presence of the key matters.
pub fn control_cache(opts: &BuildOpts) -> impl ConstraintsOpt {
    let no_cache = opts.contains(OPT_NO_CACHE);
    move |c: &mut Constraints| {
        if no_cache {
            c.ignore_cache = true;
        }
    }
}
