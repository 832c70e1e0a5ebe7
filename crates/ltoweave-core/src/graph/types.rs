//! Types for the module graph.

use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separates a base module name from its variation in variant names.
pub const VARIANT_SEPARATOR: char = '#';

/// Stable identifier of a module in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) NodeIndex);

impl ModuleId {
    pub fn as_usize(&self) -> usize {
        self.0.index()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "module_{}", self.0.index())
    }
}

/// Stable identifier of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) EdgeIndex);

impl EdgeId {
    pub fn as_usize(&self) -> usize {
        self.0.index()
    }
}

/// Classification of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepKind {
    /// Library linked directly into the dependent's output.
    #[default]
    StaticLink,
    /// Object file fed directly to the dependent's link.
    ObjectInput,
    /// Object file reused from another module's compilation.
    ReuseObjectInput,
    /// Anything else (shared libraries, headers, tools, data).
    Other,
}

/// Edge kinds that LTO requirements flow across.
pub const LTO_TRANSPARENT_KINDS: [DepKind; 3] = [
    DepKind::StaticLink,
    DepKind::ObjectInput,
    DepKind::ReuseObjectInput,
];

impl DepKind {
    /// Whether propagation and retargeting traverse this edge.
    pub fn is_lto_transparent(self) -> bool {
        LTO_TRANSPARENT_KINDS.contains(&self)
    }
}

/// Resolved link-time optimization mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LtoMode {
    #[default]
    None,
    Thin,
    Full,
}

impl LtoMode {
    /// Name of the graph variation that carries this mode.
    pub fn variation_name(self) -> &'static str {
        match self {
            LtoMode::None => "lto-none",
            LtoMode::Thin => "lto-thin",
            LtoMode::Full => "lto-full",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LtoMode::None => "none",
            LtoMode::Thin => "thin",
            LtoMode::Full => "full",
        }
    }
}

impl std::fmt::Display for LtoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared LTO properties of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtoProperties {
    /// Never build with LTO.
    pub never: bool,
    /// Build with full LTO.
    pub full: bool,
    /// Build with thin LTO.
    pub thin: bool,
    /// Link with lld (defaults to true when unset).
    pub use_clang_lld: Option<bool>,
    /// Add `-fwhole-program-vtables`.
    pub whole_program_vtables: bool,
}

impl LtoProperties {
    pub fn full() -> Self {
        Self {
            full: true,
            ..Self::default()
        }
    }

    pub fn thin() -> Self {
        Self {
            thin: true,
            ..Self::default()
        }
    }

    pub fn never() -> Self {
        Self {
            never: true,
            ..Self::default()
        }
    }

    pub fn use_clang_lld(&self) -> bool {
        self.use_clang_lld.unwrap_or(true)
    }
}

/// Architecture and context predicates supplied by the host build system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleTraits {
    /// 32-bit multilib target.
    pub lib32: bool,
    /// Built with control-flow-integrity checks.
    pub cfi: bool,
    /// Host-side build.
    pub host: bool,
    /// Test binary or test library.
    pub test: bool,
    /// Library behind a stable vendor/system ABI boundary.
    pub privileged_boundary: bool,
    /// Profile-guided (PGO or AFDO) data is available.
    pub profile_guided: bool,
    /// Fuzzer instrumentation is enabled.
    pub fuzzer: bool,
    /// Target architecture name (e.g. `arm64`, `riscv64`).
    pub arch: String,
}

/// Propagation requests recorded against a module by its LTO consumers.
///
/// Set-only during propagation; consumed and cleared during synthesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtoRequests {
    pub full: bool,
    pub thin: bool,
    pub no_lto: bool,
}

impl LtoRequests {
    pub fn is_empty(&self) -> bool {
        !(self.full || self.thin || self.no_lto)
    }

    /// OR another request set into this one.
    pub fn merge(&mut self, other: LtoRequests) {
        self.full |= other.full;
        self.thin |= other.thin;
        self.no_lto |= other.no_lto;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A compiled module (node) in the build graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Unique module name
    pub name: String,
    /// Declared LTO properties
    pub lto: LtoProperties,
    /// Context predicates
    pub traits: ModuleTraits,
    /// Requests recorded by the propagation pass
    pub requests: LtoRequests,
    /// Mode pinned on an LTO variant; `None` for default modules
    pub variant: Option<LtoMode>,
    /// Never installed on its own
    pub prevent_install: bool,
    /// Excluded from packaging
    pub hide_from_packaging: bool,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lto: LtoProperties::default(),
            traits: ModuleTraits::default(),
            requests: LtoRequests::default(),
            variant: None,
            prevent_install: false,
            hide_from_packaging: false,
        }
    }

    pub fn with_lto(mut self, lto: LtoProperties) -> Self {
        self.lto = lto;
        self
    }

    pub fn with_traits(mut self, traits: ModuleTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Whether this module is an LTO variant created by synthesis.
    pub fn is_variant(&self) -> bool {
        self.variant.is_some()
    }
}

/// A dependency edge as seen from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub edge: EdgeId,
    pub source: ModuleId,
    pub target: ModuleId,
    pub kind: DepKind,
}

/// Arena-backed build graph: edges go from dependent to dependency.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    /// The directed graph; node weights own the modules
    graph: StableDiGraph<Module, DepKind>,
    /// Module name to id mapping
    names: FxHashMap<String, ModuleId>,
    /// (base, mode) to variant mapping
    variants: FxHashMap<(ModuleId, LtoMode), ModuleId>,
    /// Variant to base mapping
    bases: FxHashMap<ModuleId, ModuleId>,
}

impl ModuleGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph.
    ///
    /// Names containing [`VARIANT_SEPARATOR`] and pre-pinned modules are
    /// rejected; variants only come from [`clone_variant`](Self::clone_variant).
    pub fn add_module(&mut self, module: Module) -> Result<ModuleId> {
        if module.name.contains(VARIANT_SEPARATOR) || module.is_variant() {
            return Err(Error::InvalidModuleName(module.name));
        }
        self.insert_module(module)
    }

    fn insert_module(&mut self, module: Module) -> Result<ModuleId> {
        if self.names.contains_key(&module.name) {
            return Err(Error::DuplicateModule(module.name));
        }
        let name = module.name.clone();
        let id = ModuleId(self.graph.add_node(module));
        self.names.insert(name, id);
        Ok(id)
    }

    /// Record that `from` depends on `to`.
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId, kind: DepKind) -> Result<EdgeId> {
        self.check(from)?;
        self.check(to)?;
        Ok(EdgeId(self.graph.add_edge(from.0, to.0, kind)))
    }

    fn check(&self, id: ModuleId) -> Result<()> {
        if self.graph.contains_node(id.0) {
            Ok(())
        } else {
            Err(Error::ModuleNotFound(id.to_string()))
        }
    }

    /// Get a module by id.
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.graph.node_weight(id.0)
    }

    /// Get a mutable reference to a module by id.
    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.graph.node_weight_mut(id.0)
    }

    /// Find a module by name.
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.names.get(name).copied()
    }

    /// Name of a module, or its id when it is missing.
    pub fn name_of(&self, id: ModuleId) -> String {
        self.module(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Get the number of modules (variants included).
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All module ids in ascending arena order.
    pub fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<_> = self.graph.node_indices().map(ModuleId).collect();
        ids.sort();
        ids
    }

    /// Outgoing dependencies of a module, in edge creation order.
    pub fn dependencies(&self, id: ModuleId) -> Vec<Dependency> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|edge| Dependency {
                edge: EdgeId(edge.id()),
                source: id,
                target: ModuleId(edge.target()),
                kind: *edge.weight(),
            })
            .collect();
        deps.sort_by_key(|dep| dep.edge);
        deps
    }

    /// Modules that depend directly on `id`.
    pub fn dependents(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut sources: Vec<_> = self
            .graph
            .neighbors_directed(id.0, Direction::Incoming)
            .map(ModuleId)
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Look up a single edge.
    pub fn edge(&self, edge: EdgeId) -> Option<Dependency> {
        let (source, target) = self.graph.edge_endpoints(edge.0)?;
        let kind = *self.graph.edge_weight(edge.0)?;
        Some(Dependency {
            edge,
            source: ModuleId(source),
            target: ModuleId(target),
            kind,
        })
    }

    /// Modules ordered so that dependencies come before their dependents.
    ///
    /// Deterministic for a given graph; members of a cycle appear in
    /// depth-first finishing order.
    pub fn bottom_up_order(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.len());
        let mut dfs = DfsPostOrder::empty(&self.graph);
        for id in self.module_ids() {
            dfs.move_to(id.0);
            while let Some(node) = dfs.next(&self.graph) {
                order.push(ModuleId(node));
            }
        }
        order
    }

    /// Point an existing edge at a different module, keeping source and kind.
    pub fn retarget(&mut self, edge: EdgeId, new_target: ModuleId) -> Result<EdgeId> {
        self.check(new_target)?;
        let dep = self
            .edge(edge)
            .ok_or_else(|| {
                Error::InvalidOperation(format!("edge {} does not exist", edge.as_usize()))
            })?;
        self.graph.remove_edge(edge.0);
        Ok(EdgeId(self.graph.add_edge(dep.source.0, new_target.0, dep.kind)))
    }

    /// The variant of `base` pinned to `mode`, if one exists.
    pub fn variant_of(&self, base: ModuleId, mode: LtoMode) -> Option<ModuleId> {
        self.variants.get(&(base, mode)).copied()
    }

    /// The default module a variant was cloned from (itself for default modules).
    pub fn base_of(&self, id: ModuleId) -> ModuleId {
        self.bases.get(&id).copied().unwrap_or(id)
    }

    /// All variants of `base`, ordered by mode.
    pub fn variants(&self, base: ModuleId) -> Vec<(LtoMode, ModuleId)> {
        let mut found: Vec<_> = [LtoMode::None, LtoMode::Thin, LtoMode::Full]
            .into_iter()
            .filter_map(|mode| self.variant_of(base, mode).map(|id| (mode, id)))
            .collect();
        found.sort();
        found
    }

    /// Clone `base` into a variant pinned to `mode`.
    ///
    /// The clone copies the base's declared properties, traits and outgoing
    /// edges, is hidden from install and packaging, and starts with an empty
    /// request set. An existing `(base, mode)` variant is returned unchanged.
    pub fn clone_variant(&mut self, base: ModuleId, mode: LtoMode) -> Result<ModuleId> {
        if let Some(existing) = self.variant_of(base, mode) {
            return Ok(existing);
        }

        let source = self
            .module(base)
            .ok_or_else(|| Error::ModuleNotFound(base.to_string()))?;
        if source.is_variant() {
            return Err(Error::InvalidOperation(format!(
                "cannot create a variant of LTO variant '{}'",
                source.name
            )));
        }

        let clone = Module {
            name: format!("{}{VARIANT_SEPARATOR}{}", source.name, mode.variation_name()),
            lto: source.lto.clone(),
            traits: source.traits.clone(),
            requests: LtoRequests::default(),
            variant: Some(mode),
            prevent_install: true,
            hide_from_packaging: true,
        };
        let deps = self.dependencies(base);
        let id = self.insert_module(clone)?;

        for dep in deps {
            self.graph.add_edge(id.0, dep.target.0, dep.kind);
        }
        self.variants.insert((base, mode), id);
        self.bases.insert(id, base);

        Ok(id)
    }
}
