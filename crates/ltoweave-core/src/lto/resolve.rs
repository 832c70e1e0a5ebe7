//! Per-module LTO mode resolution.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::ConfigError;
use crate::graph::{LtoMode, Module, ModuleGraph, ModuleId};
use crate::policy::LtoPolicy;

/// Effective LTO decision for a single module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Mode the module is built in.
    pub mode: LtoMode,
    /// The mode comes from declared properties, a variant pin or the kill
    /// switch rather than the default-thin policy.
    pub explicit: bool,
    /// No-LTO is in effect for this module.
    pub never: bool,
}

impl Resolution {
    pub fn is_full(&self) -> bool {
        self.mode == LtoMode::Full
    }

    /// Thin because the module (or its pin) asked for it.
    pub fn is_explicit_thin(&self) -> bool {
        self.mode == LtoMode::Thin && self.explicit
    }

    /// Thin only because of the default-thin policy.
    pub fn is_default_thin(&self) -> bool {
        self.mode == LtoMode::Thin && !self.explicit
    }

    /// Any form of LTO is active.
    pub fn is_lto(&self) -> bool {
        self.mode != LtoMode::None
    }
}

/// Reject modules that declare both full and thin LTO.
///
/// Variants are exempt: their pinned mode supersedes the declared properties.
pub fn validate(module: &Module) -> Result<(), ConfigError> {
    if module.variant.is_none() && module.lto.full && module.lto.thin {
        return Err(ConfigError::new(
            &module.name,
            "full and thin LTO are mutually exclusive",
        ));
    }
    Ok(())
}

/// Resolve the LTO mode of a module under the given policy.
pub fn resolve(module: &Module, policy: &LtoPolicy) -> Result<Resolution, ConfigError> {
    validate(module)?;

    if policy.disable_lto {
        return Ok(Resolution {
            mode: LtoMode::None,
            explicit: true,
            never: true,
        });
    }

    // A pinned variant keeps the base's declared `never`.
    if let Some(pinned) = module.variant {
        return Ok(Resolution {
            mode: pinned,
            explicit: true,
            never: pinned == LtoMode::None || module.lto.never,
        });
    }

    let lto = &module.lto;
    let resolution = if lto.full {
        Resolution {
            mode: LtoMode::Full,
            explicit: true,
            never: lto.never,
        }
    } else if lto.thin {
        Resolution {
            mode: LtoMode::Thin,
            explicit: true,
            never: lto.never,
        }
    } else if default_thin_eligible(module, policy) {
        Resolution {
            mode: LtoMode::Thin,
            explicit: false,
            never: false,
        }
    } else {
        Resolution {
            mode: LtoMode::None,
            explicit: lto.never,
            never: lto.never,
        }
    };

    Ok(resolution)
}

/// Whether the default-thin policy applies to this module.
///
/// Auto-LTO stays off for 32-bit multilib, CFI, host, test and
/// privileged-boundary modules.
pub fn default_thin_eligible(module: &Module, policy: &LtoPolicy) -> bool {
    let traits = &module.traits;
    policy.global_thin_default
        && !module.lto.never
        && !traits.lib32
        && !traits.cfi
        && !traits.host
        && !traits.test
        && !traits.privileged_boundary
}

/// Resolutions of every module in a graph, computed once per pass.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    resolutions: FxHashMap<ModuleId, Resolution>,
    errors: Vec<ConfigError>,
}

impl ResolvedGraph {
    /// Resolve every module; modules are independent so this runs in parallel.
    pub fn compute(graph: &ModuleGraph, policy: &LtoPolicy) -> Self {
        let results: Vec<_> = graph
            .module_ids()
            .into_par_iter()
            .filter_map(|id| graph.module(id).map(|module| (id, resolve(module, policy))))
            .collect();

        let mut resolved = Self::default();
        for (id, result) in results {
            match result {
                Ok(resolution) => {
                    resolved.resolutions.insert(id, resolution);
                }
                Err(err) => resolved.errors.push(err),
            }
        }
        resolved
    }

    /// Resolution of a module; `None` when it failed validation.
    pub fn get(&self, id: ModuleId) -> Option<&Resolution> {
        self.resolutions.get(&id)
    }

    /// Configuration errors, in arena order.
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }
}
