//! Module graph for LTO planning.
//!
//! This module provides:
//! - An arena of modules addressed by stable [`ModuleId`]s
//! - Typed dependency edges ([`DepKind`])
//! - The mutation primitives used by the LTO passes (clone, retarget)
//! - JSON manifest loading

mod manifest;
mod types;

pub use manifest::{DepSpec, GraphManifest, ModuleSpec};
pub use types::{
    DepKind, Dependency, EdgeId, LTO_TRANSPARENT_KINDS, LtoMode, LtoProperties, LtoRequests, Module,
    ModuleGraph, ModuleId, ModuleTraits, VARIANT_SEPARATOR,
};
