//! Compiler and linker flags for a resolved variant.

use serde::Serialize;

use super::resolve::Resolution;
use crate::graph::{LtoMode, Module};
use crate::policy::LtoPolicy;

const THIN_LTO_CFLAGS: [&str; 2] = ["-flto=thin", "-fsplit-lto-unit"];
const FULL_LTO_CFLAGS: [&str; 1] = ["-flto"];

/// Cap the ThinLTO cache at 10% of free disk space or 10 GB.
const THIN_LTO_CACHE_POLICY: &str = "cache_size=10%:cache_size_bytes=10g";

/// Conservative cross-TU inlining limits for modules without profile data.
const INLINE_LIMIT_LDFLAGS: [&str; 4] = [
    "-Wl,-plugin-opt,-import-instr-limit=40",
    "-Wl,-mllvm,-inline-threshold=600",
    "-Wl,-mllvm,-inlinehint-threshold=750",
    "-Wl,-mllvm,-unroll-threshold=600",
];

/// Flags a module contributes to its compile and link steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LtoFlags {
    pub cflags: Vec<String>,
    pub asflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl LtoFlags {
    pub fn is_empty(&self) -> bool {
        self.cflags.is_empty() && self.asflags.is_empty() && self.ldflags.is_empty()
    }
}

/// Compute the LTO flags of a module given its resolution.
pub fn lto_flags(module: &Module, resolution: &Resolution, policy: &LtoPolicy) -> LtoFlags {
    let mut flags = LtoFlags::default();

    // LTO breaks fuzzer builds and is not supported on riscv64 yet.
    if module.traits.fuzzer || module.traits.arch == "riscv64" || !resolution.is_lto() {
        return flags;
    }

    let lto_cflags: &[&str] = match resolution.mode {
        LtoMode::Full => &FULL_LTO_CFLAGS,
        _ => &THIN_LTO_CFLAGS,
    };
    for flag in lto_cflags {
        flags.cflags.push(flag.to_string());
        flags.asflags.push(flag.to_string());
        flags.ldflags.push(flag.to_string());
    }
    if resolution.is_default_thin() {
        flags.ldflags.push("-Wl,--lto-O0".to_string());
    }

    if module.lto.whole_program_vtables {
        flags.cflags.push("-fwhole-program-vtables".to_string());
    }

    if resolution.mode == LtoMode::Thin && policy.thin_cache && module.lto.use_clang_lld() {
        flags.ldflags.push(format!(
            "-Wl,--thinlto-cache-dir={}",
            policy.thin_lto_cache_dir().display()
        ));
        flags
            .ldflags
            .push(format!("-Wl,--thinlto-cache-policy={THIN_LTO_CACHE_POLICY}"));
    }

    if !module.traits.profile_guided {
        flags
            .ldflags
            .extend(INLINE_LIMIT_LDFLAGS.iter().map(|flag| flag.to_string()));
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LtoProperties, ModuleTraits};
    use crate::lto::resolve;

    fn flags_for(module: &Module, policy: &LtoPolicy) -> LtoFlags {
        let res = resolve(module, policy).unwrap();
        lto_flags(module, &res, policy)
    }

    #[test]
    fn test_no_flags_without_lto() {
        let module = Module::new("m");
        assert!(flags_for(&module, &LtoPolicy::explicit_only()).is_empty());
        assert!(flags_for(&Module::new("m").with_lto(LtoProperties::full()), &LtoPolicy::disabled())
            .is_empty());
    }

    #[test]
    fn test_full_flags() {
        let module = Module::new("m").with_lto(LtoProperties::full());
        let flags = flags_for(&module, &LtoPolicy::default());
        assert_eq!(flags.cflags, vec!["-flto"]);
        assert_eq!(flags.asflags, vec!["-flto"]);
        assert_eq!(flags.ldflags[0], "-flto");
        assert!(flags.ldflags.contains(&"-Wl,-mllvm,-inline-threshold=600".to_string()));
        assert!(!flags.ldflags.iter().any(|f| f.contains("thinlto-cache")));
    }

    #[test]
    fn test_explicit_thin_flags() {
        let module = Module::new("m").with_lto(LtoProperties::thin());
        let flags = flags_for(&module, &LtoPolicy::explicit_only());
        assert_eq!(flags.cflags, vec!["-flto=thin", "-fsplit-lto-unit"]);
        assert!(!flags.ldflags.contains(&"-Wl,--lto-O0".to_string()));
    }

    #[test]
    fn test_default_thin_links_at_o0() {
        let flags = flags_for(&Module::new("m"), &LtoPolicy::default());
        assert_eq!(flags.cflags, vec!["-flto=thin", "-fsplit-lto-unit"]);
        assert!(flags.ldflags.contains(&"-Wl,--lto-O0".to_string()));
    }

    #[test]
    fn test_thin_cache_flags() {
        let policy = LtoPolicy {
            thin_cache: true,
            ..LtoPolicy::default()
        };
        let flags = flags_for(&Module::new("m"), &policy);
        assert!(flags.ldflags.contains(&"-Wl,--thinlto-cache-dir=out/thinlto-cache".to_string()));
        assert!(flags.ldflags.contains(
            &"-Wl,--thinlto-cache-policy=cache_size=10%:cache_size_bytes=10g".to_string()
        ));

        let gnu_ld = Module::new("m").with_lto(LtoProperties {
            use_clang_lld: Some(false),
            ..LtoProperties::default()
        });
        assert!(!flags_for(&gnu_ld, &policy)
            .ldflags
            .iter()
            .any(|f| f.contains("thinlto-cache")));
    }

    #[test]
    fn test_profile_data_drops_inline_limits() {
        let module = Module::new("m")
            .with_lto(LtoProperties::full())
            .with_traits(ModuleTraits {
                profile_guided: true,
                ..Default::default()
            });
        let flags = flags_for(&module, &LtoPolicy::default());
        assert_eq!(flags.ldflags, vec!["-flto"]);
    }

    #[test]
    fn test_whole_program_vtables() {
        let module = Module::new("m").with_lto(LtoProperties {
            full: true,
            whole_program_vtables: true,
            ..LtoProperties::default()
        });
        let flags = flags_for(&module, &LtoPolicy::default());
        assert!(flags.cflags.contains(&"-fwhole-program-vtables".to_string()));
    }

    #[test]
    fn test_fuzzer_and_riscv64_skip_lto() {
        let fuzzer = Module::new("m")
            .with_lto(LtoProperties::full())
            .with_traits(ModuleTraits {
                fuzzer: true,
                ..Default::default()
            });
        assert!(flags_for(&fuzzer, &LtoPolicy::default()).is_empty());

        let riscv = Module::new("m")
            .with_lto(LtoProperties::full())
            .with_traits(ModuleTraits {
                arch: "riscv64".to_string(),
                ..Default::default()
            });
        assert!(flags_for(&riscv, &LtoPolicy::default()).is_empty());
    }
}
