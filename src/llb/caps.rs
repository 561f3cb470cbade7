use std::collections::BTreeSet;

pub const CAP_SOURCE_IMAGE: &str = "source.image";
pub const CAP_SOURCE_LOCAL: &str = "source.local";
pub const CAP_SOURCE_LOCAL_FOLLOW_PATHS: &str = "source.local.followpaths";
pub const CAP_SOURCE_LOCAL_INCLUDE_PATTERNS: &str = "source.local.includepatterns";
pub const CAP_EXEC_META_BASE: &str = "exec.meta.base";
pub const CAP_EXEC_MOUNT_CACHE: &str = "exec.mount.cache";
pub const CAP_EXEC_MOUNT_CACHE_SHARING: &str = "exec.mount.cache.sharing";
pub const CAP_FILE_BASE: &str = "file.base";
pub const CAP_META_IGNORE_CACHE: &str = "meta.ignorecache";
pub const CAP_META_DESCRIPTION: &str = "meta.description";

const KNOWN_CAPS: &[&str] = &[
    CAP_SOURCE_IMAGE,
    CAP_SOURCE_LOCAL,
    CAP_SOURCE_LOCAL_FOLLOW_PATHS,
    CAP_SOURCE_LOCAL_INCLUDE_PATTERNS,
    CAP_EXEC_META_BASE,
    CAP_EXEC_MOUNT_CACHE,
    CAP_EXEC_MOUNT_CACHE_SHARING,
    CAP_FILE_BASE,
    CAP_META_IGNORE_CACHE,
    CAP_META_DESCRIPTION,
];

/// LLB capabilities advertised by the engine for a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapSet {
    caps: BTreeSet<String>,
}

impl CapSet {
    /// Every capability this crate can emit
    pub fn all() -> Self {
        KNOWN_CAPS.iter().copied().collect()
    }

    pub fn supports(&self, cap: &str) -> bool {
        self.caps.contains(cap)
    }

    pub fn without(mut self, cap: &str) -> Self {
        self.caps.remove(cap);
        self
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CapSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            caps: iter.into_iter().map(Into::into).collect(),
        }
    }
}
