//! Core engine for ltoweave.
//!
//! This crate provides:
//! - An arena-backed build graph with typed dependency edges
//! - LTO mode resolution per module under a global policy
//! - Top-down propagation of LTO requirements to static dependencies
//! - Bottom-up synthesis of per-mode module variants
//! - Compiler/linker flag sets for each resolved variant

pub mod error;
pub mod graph;
pub mod lto;
pub mod policy;

pub use error::{ConfigError, Error, Result};
pub use graph::{DepKind, GraphManifest, LtoMode, LtoProperties, Module, ModuleGraph, ModuleId};
pub use lto::{LtoFlags, LtoPlan, Resolution, check_graph, propagate, resolve, run_lto_passes, synthesize};
pub use policy::LtoPolicy;
