//! Install configuration
//!
//! The engine hands the frontend a flat `string -> string` option map (the
//! `--opt` flags of `buildctl`). This module turns the keys we understand into
//! a typed [`InstallConfig`].
//!
//! # Options
//!
//! - `yarn`: base image reference - default: `docker.io/library/node:alpine`
//! - `no-cache`: presence disables the cache for the install step (read by
//!   [`crate::yarn::control_cache`])
//! - `workspaces`: discover workspace manifests (true|false) - default: `true`
//! - `lockfile`: `yarn.lock` or `package-lock.json` - default: `yarn.lock`

use crate::gateway::BuildOpts;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const OPT_IMAGE: &str = "yarn";
pub const OPT_NO_CACHE: &str = "no-cache";
pub const OPT_WORKSPACES: &str = "workspaces";
pub const OPT_LOCKFILE: &str = "lockfile";

pub const DEFAULT_IMAGE: &str = "docker.io/library/node:alpine";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for option '{key}': {value:?} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lockfile {
    #[default]
    Yarn,
    Npm,
}

impl Lockfile {
    pub fn filename(&self) -> &'static str {
        match self {
            Lockfile::Yarn => "yarn.lock",
            Lockfile::Npm => "package-lock.json",
        }
    }
}

impl fmt::Display for Lockfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.filename())
    }
}

impl FromStr for Lockfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yarn.lock" => Ok(Lockfile::Yarn),
            "package-lock.json" => Ok(Lockfile::Npm),
            _ => Err(ConfigError::InvalidValue {
                key: OPT_LOCKFILE.to_string(),
                value: s.to_string(),
                expected: "yarn.lock or package-lock.json",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    /// Image the install runs in
    pub image: String,

    /// Whether to solve the manifest first to pull in workspace manifests
    pub workspaces: bool,

    pub lockfile: Lockfile,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            workspaces: true,
            lockfile: Lockfile::default(),
        }
    }
}

impl InstallConfig {
    pub fn from_build_opts(opts: &BuildOpts) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(image) = opts.get(OPT_IMAGE).filter(|v| !v.is_empty()) {
            config.image = image.to_string();
        }

        if let Some(value) = opts.get(OPT_WORKSPACES) {
            config.workspaces = parse_bool(OPT_WORKSPACES, value)?;
        }

        if let Some(value) = opts.get(OPT_LOCKFILE) {
            config.lockfile = value.parse()?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llb::CapSet;
    use yare::parameterized;

    fn opts() -> BuildOpts {
        BuildOpts::new(CapSet::all())
    }

    #[test]
    fn test_defaults() {
        let config = InstallConfig::from_build_opts(&opts()).unwrap();
        assert_eq!(config, InstallConfig::default());
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert!(config.workspaces);
        assert_eq!(config.lockfile, Lockfile::Yarn);
    }

    #[test]
    fn test_image_override() {
        let config =
            InstallConfig::from_build_opts(&opts().with_opt(OPT_IMAGE, "custom/image:tag")).unwrap();
        assert_eq!(config.image, "custom/image:tag");
    }

    #[test]
    fn test_empty_image_falls_back_to_default() {
        let config = InstallConfig::from_build_opts(&opts().with_opt(OPT_IMAGE, "")).unwrap();
        assert_eq!(config.image, DEFAULT_IMAGE);
    }

    #[parameterized(
        lower_false = { "false", false },
        upper_true = { "TRUE", true },
        zero = { "0", false },
        one = { "1", true },
        off = { "off", false },
        yes = { "yes", true },
    )]
    fn test_workspaces_flag(value: &str, expected: bool) {
        let config =
            InstallConfig::from_build_opts(&opts().with_opt(OPT_WORKSPACES, value)).unwrap();
        assert_eq!(config.workspaces, expected);
    }

    #[test]
    fn test_invalid_workspaces_flag() {
        let err = InstallConfig::from_build_opts(&opts().with_opt(OPT_WORKSPACES, "maybe"))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: OPT_WORKSPACES.to_string(),
                value: "maybe".to_string(),
                expected: "true or false",
            }
        );
    }

    #[test]
    fn test_lockfile_option() {
        let config =
            InstallConfig::from_build_opts(&opts().with_opt(OPT_LOCKFILE, "package-lock.json"))
                .unwrap();
        assert_eq!(config.lockfile, Lockfile::Npm);
        assert_eq!(config.lockfile.filename(), "package-lock.json");

        assert!(InstallConfig::from_build_opts(&opts().with_opt(OPT_LOCKFILE, "pnpm-lock.yaml"))
            .is_err());
    }
}
