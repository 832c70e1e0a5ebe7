//! Link-time optimization planning.
//!
//! Two passes run over a [`ModuleGraph`](crate::graph::ModuleGraph):
//!
//! ```text
//! declared properties + LtoPolicy
//!     │
//!     ├── resolve ──► per-module Resolution
//!     │
//!     ├── propagate (top-down) ──► LtoRequests on static dependencies
//!     │
//!     └── synthesize (bottom-up) ──► lto-full / lto-thin / lto-none variants,
//!                                    dependents rewired to them
//! ```
//!
//! Propagation must finish for the entire graph before synthesis starts;
//! [`run_lto_passes`] enforces that ordering.

mod flags;
mod passes;
mod propagate;
mod resolve;
mod synthesize;

pub use flags::{LtoFlags, lto_flags};
pub use passes::{LtoPlan, PlannedModule, check_graph, run_lto_passes};
pub use propagate::{PropagationReport, propagate};
pub use resolve::{Resolution, ResolvedGraph, default_thin_eligible, resolve, validate};
pub use synthesize::{SynthesisReport, dependency_variation, needed_modes, synthesize};
