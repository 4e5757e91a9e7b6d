//! The language registry
//!
//! A process-wide mapping from normalized language name to [`Language`],
//! built once at startup. Registration validates that every required binary
//! is present and executable on the host; a language with a missing binary is
//! logged and skipped rather than failing startup.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{info, warn};

use crate::lang::{Language, builtin};
use crate::program::ProgramInfo;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("language '{0}' not found in registry")]
    UnknownLanguage(String),
}

/// Mapping from normalized language name to its descriptor and executor kind.
#[derive(Debug, Default)]
pub struct Registry {
    languages: HashMap<String, Language>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the predeclared built-in catalog.
    ///
    /// Languages whose binaries are missing on this host are skipped, so the
    /// resulting registry reflects what the machine can actually run.
    pub fn discover() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin::all() {
            registry.register(descriptor);
        }
        registry
    }

    /// Register a language under its normalized name.
    ///
    /// Returns `(registered, replaced)`. Registration is refused (with an
    /// info-level log, not an error) when any required program is
    /// inaccessible. Re-registering an existing key replaces the previous
    /// entry and emits one warning.
    pub fn register(&mut self, language: impl Into<Language>) -> (bool, bool) {
        let language = language.into();
        let key = language.registry_key();

        for program in language.required_programs() {
            if !program.is_available() {
                info!(
                    language = language.name(),
                    cmd = program.cmd_name(),
                    "cannot access binary, language not loaded"
                );
                return (false, false);
            }
        }

        let replaced = self.languages.contains_key(&key);
        if replaced {
            warn!(
                language = language.name(),
                key, "language replaces a previously registered definition"
            );
        } else {
            info!(language = language.name(), key, "language registered");
        }

        self.languages.insert(key, language);
        (true, replaced)
    }

    /// Look up a language by name (case-insensitive).
    pub fn resolve(&self, key: &str) -> Result<&Language, RegistryError> {
        let normalized = key.to_lowercase();
        self.languages
            .get(&normalized)
            .ok_or(RegistryError::UnknownLanguage(normalized))
    }

    /// Registered languages, sorted by key for stable iteration.
    pub fn languages(&self) -> Vec<(&str, &Language)> {
        let mut entries: Vec<_> = self
            .languages
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    /// Introspection snapshot `{cmd_name -> {version, opts}}` for a language.
    ///
    /// Version probes run lazily on first access and are memoized per
    /// program, so repeated snapshots are cheap.
    pub fn programs(&self, language: &Language) -> BTreeMap<String, ProgramInfo> {
        language
            .required_programs()
            .into_iter()
            .map(|p| (p.cmd_name().to_owned(), p.info()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lang::{LanguageDescriptor, PipelineDescriptor};
    use crate::program::Program;

    fn echo_lang(name: &str) -> LanguageDescriptor {
        LanguageDescriptor::new(name)
            .source_ext(".txt")
            .interpreter(Program::new("echo").no_probe())
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = Registry::new();
        let (registered, replaced) = registry.register(echo_lang("Echo"));
        assert!(registered);
        assert!(!replaced);

        let lang = registry.resolve("echo").unwrap();
        assert_eq!(lang.name(), "Echo");
    }

    #[test]
    fn resolve_normalizes_case() {
        let mut registry = Registry::new();
        registry.register(echo_lang("Echo"));
        assert!(registry.resolve("ECHO").is_ok());
        assert!(registry.resolve("Echo").is_ok());
    }

    #[test]
    fn resolve_unknown_language_fails() {
        let registry = Registry::new();
        let err = registry.resolve("klingon").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownLanguage(ref k) if k == "klingon"));
    }

    #[test]
    fn register_skips_missing_binary() {
        let mut registry = Registry::new();
        let lang = LanguageDescriptor::new("Ghost")
            .interpreter(Program::new("definitely-not-a-real-binary-2c5e").no_probe());

        let (registered, replaced) = registry.register(lang);
        assert!(!registered);
        assert!(!replaced);
        assert!(registry.resolve("ghost").is_err());
    }

    #[test]
    fn register_skips_when_any_extra_binary_is_missing() {
        let mut registry = Registry::new();
        let lang = echo_lang("Echo")
            .extra_program(Program::new("definitely-not-a-real-binary-2c5e").no_probe());

        let (registered, _) = registry.register(lang);
        assert!(!registered);
    }

    #[test]
    fn reregistering_replaces_previous_entry() {
        let mut registry = Registry::new();
        registry.register(echo_lang("Echo"));

        let replacement = LanguageDescriptor::new("Echo")
            .source_ext(".other")
            .interpreter(Program::new("echo").no_probe());
        let (registered, replaced) = registry.register(replacement);

        assert!(registered);
        assert!(replaced);
        assert_eq!(registry.len(), 1);

        let Language::Simple(d) = registry.resolve("echo").unwrap() else {
            panic!("expected a simple language");
        };
        assert_eq!(d.ext(), Some(".other"));
    }

    #[test]
    fn pipeline_with_missing_stage_binary_is_skipped() {
        let mut registry = Registry::new();
        let good = Arc::new(echo_lang("Good"));
        let bad = Arc::new(
            LanguageDescriptor::new("Bad")
                .compiler(Program::new("definitely-not-a-real-binary-2c5e").no_probe()),
        );
        let pipeline = PipelineDescriptor::new("chain", vec![good, bad]).unwrap();

        let (registered, _) = registry.register(pipeline);
        assert!(!registered);
    }

    #[test]
    fn pipeline_registers_under_its_own_key() {
        let mut registry = Registry::new();
        let stage = Arc::new(
            echo_lang("Stage").compiler(Program::new("cp").no_probe()),
        );
        let pipeline = PipelineDescriptor::new("CopyChain", vec![stage]).unwrap();

        let (registered, _) = registry.register(pipeline);
        assert!(registered);
        assert!(registry.resolve("copychain").is_ok());
    }

    #[test]
    fn languages_iterates_sorted() {
        let mut registry = Registry::new();
        registry.register(echo_lang("Zulu"));
        registry.register(echo_lang("Alpha"));

        let keys: Vec<_> = registry.languages().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["alpha", "zulu"]);
    }

    #[test]
    fn programs_snapshot_keys_by_cmd_name() {
        let mut registry = Registry::new();
        registry.register(
            echo_lang("Echo").extra_program(Program::new("cp").no_probe()),
        );

        let lang = registry.resolve("echo").unwrap();
        let snapshot = registry.programs(lang);
        assert!(snapshot.contains_key("echo"));
        assert!(snapshot.contains_key("cp"));
        assert_eq!(snapshot["cp"].version, None);
    }

    #[test]
    fn discover_does_not_panic_on_sparse_hosts() {
        // On most CI machines only a few of the 18 toolchains exist; discovery
        // must cope with any subset.
        let registry = Registry::discover();
        for (_, lang) in registry.languages() {
            for program in lang.required_programs() {
                assert!(program.is_available());
            }
        }
    }
}
