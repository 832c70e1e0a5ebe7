//! Global LTO policy.
//!
//! The process-wide toggles are collected once into an [`LtoPolicy`] value
//! and threaded into both passes as a parameter.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable that disables LTO for every module.
pub const ENV_DISABLE_LTO: &str = "DISABLE_LTO";
/// Environment variable that turns the default-thin policy off when false-ish.
pub const ENV_GLOBAL_THINLTO: &str = "GLOBAL_THINLTO";
/// Environment variable that enables the ThinLTO link cache.
pub const ENV_USE_THINLTO_CACHE: &str = "USE_THINLTO_CACHE";
/// Environment variable naming the build output directory.
pub const ENV_OUT_DIR: &str = "OUT_DIR";

/// Global policy read once per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtoPolicy {
    /// Kill switch: every module resolves to no LTO.
    pub disable_lto: bool,

    /// Thin LTO is auto-enabled for eligible modules without an explicit setting.
    pub global_thin_default: bool,

    /// Emit ThinLTO cache directory/policy linker flags.
    pub thin_cache: bool,

    /// Build output directory (the ThinLTO cache lives below it).
    pub output_dir: PathBuf,
}

impl Default for LtoPolicy {
    fn default() -> Self {
        Self {
            disable_lto: false,
            global_thin_default: true,
            thin_cache: false,
            output_dir: PathBuf::from("out"),
        }
    }
}

impl LtoPolicy {
    /// Read the policy from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the policy from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let is_true = |key: &str| lookup(key).as_deref().and_then(parse_env_flag) == Some(true);
        let is_false = |key: &str| lookup(key).as_deref().and_then(parse_env_flag) == Some(false);

        Self {
            disable_lto: is_true(ENV_DISABLE_LTO),
            global_thin_default: !is_false(ENV_GLOBAL_THINLTO),
            thin_cache: is_true(ENV_USE_THINLTO_CACHE),
            output_dir: lookup(ENV_OUT_DIR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }

    /// Policy with the kill switch on.
    pub fn disabled() -> Self {
        Self {
            disable_lto: true,
            ..Self::default()
        }
    }

    /// Policy where thin LTO is only applied when explicitly requested.
    pub fn explicit_only() -> Self {
        Self {
            global_thin_default: false,
            ..Self::default()
        }
    }

    /// Directory used for the ThinLTO link cache.
    pub fn thin_lto_cache_dir(&self) -> PathBuf {
        self.output_dir.join("thinlto-cache")
    }
}

/// Interpret an environment value as a boolean.
///
/// Returns `None` for values that are neither true-ish nor false-ish.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}
