//! Declarative description of the analysis modules and how they depend on
//! each other.
//!
//! Each analysis component is declared as a [`ModuleRules`] record: a name, a
//! precompiled-header mode and two lists of dependency names. Public
//! dependencies are re-exposed to anyone depending on the module, private
//! ones are not. [`ModuleGraph`] collects the records for one
//! [`Revision`] of the toolkit and checks the graph is well formed.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Engine modules referenced by the declarations but provided elsewhere.
pub const EXTERNAL_MODULES: [&str; 4] = ["Core", "CoreUObject", "Engine", "RuntimeAudioImporter"];

/// Reasons a module graph is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("module name `{0}` is not a valid identifier")]
    InvalidName(String),
    #[error("module `{0}` is declared twice")]
    Duplicate(String),
    #[error("module `{module}` depends on unknown module `{dependency}`")]
    UnknownDependency { module: String, dependency: String },
    #[error("module `{0}` depends on itself")]
    SelfDependency(String),
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("unknown revision `{0}`, expected initial, split, consolidated or merged")]
    UnknownRevision(String),
}

/// Precompiled-header strategy requested by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PchUsage {
    #[default]
    UseExplicitOrSharedPchs,
    UseSharedPchs,
    NoPchs,
}

/// One module declaration: name, PCH mode and dependency lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRules {
    pub name: String,
    pub pch_usage: PchUsage,
    pub public_dependencies: Vec<String>,
    pub private_dependencies: Vec<String>,
}

impl ModuleRules {
    /// Creates a record with the default PCH mode and no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pch_usage: PchUsage::default(),
            public_dependencies: Vec::new(),
            private_dependencies: Vec::new(),
        }
    }

    /// Adds dependencies whose interface is re-exposed to dependents.
    pub fn public<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds dependencies used only by this module's implementation.
    pub fn private<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private_dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Public dependencies first, then private ones.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.public_dependencies
            .iter()
            .chain(self.private_dependencies.iter())
            .map(String::as_str)
    }
}

/// Historical layouts of the toolkit's modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    /// A single toolkit module re-exposing the importer, engine modules private.
    Initial,
    /// Envelope analysis and onset detection as standalone modules.
    Split,
    /// A single toolkit module with every dependency public.
    Consolidated,
    /// The consolidated toolkit module also depending on both standalone modules.
    Merged,
}

impl Revision {
    pub const ALL: [Revision; 4] = [
        Revision::Initial,
        Revision::Split,
        Revision::Consolidated,
        Revision::Merged,
    ];

    fn modules(self) -> Vec<ModuleRules> {
        let envelope = ModuleRules::new("EnvelopeAnalysis")
            .public(["Core"])
            .private(["CoreUObject", "Engine", "RuntimeAudioImporter"]);
        let onset = ModuleRules::new("OnsetDetection")
            .public(["Core"])
            .private(["CoreUObject", "Engine", "EnvelopeAnalysis"]);

        let consolidated = ModuleRules::new("AudioAnalysisTools").public(EXTERNAL_MODULES);

        match self {
            Revision::Initial => vec![ModuleRules::new("AudioAnalysisTools")
                .public(["Core", "RuntimeAudioImporter"])
                .private(["CoreUObject", "Engine"])],
            Revision::Split => vec![envelope, onset],
            Revision::Consolidated => vec![consolidated],
            Revision::Merged => vec![
                consolidated.private(["EnvelopeAnalysis", "OnsetDetection"]),
                envelope,
                onset,
            ],
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Revision::Initial => "initial",
            Revision::Split => "split",
            Revision::Consolidated => "consolidated",
            Revision::Merged => "merged",
        };
        f.write_str(name)
    }
}

impl FromStr for Revision {
    type Err = ManifestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Revision::ALL
            .into_iter()
            .find(|revision| revision.to_string().eq_ignore_ascii_case(value))
            .ok_or_else(|| ManifestError::UnknownRevision(value.to_string()))
    }
}

/// Declared modules keyed by name plus the external modules they may reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleGraph {
    modules: BTreeMap<String, ModuleRules>,
    external: BTreeSet<String>,
}

impl ModuleGraph {
    /// Creates an empty graph that knows the [`EXTERNAL_MODULES`].
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            external: EXTERNAL_MODULES.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Builds the graph declared by `revision`.
    pub fn for_revision(revision: Revision) -> Self {
        let mut graph = Self::new();
        for rules in revision.modules() {
            graph.modules.insert(rules.name.clone(), rules);
        }
        graph
    }

    /// Adds a module, rejecting names already declared or external.
    pub fn declare(&mut self, rules: ModuleRules) -> Result<(), ManifestError> {
        if self.modules.contains_key(&rules.name) || self.external.contains(&rules.name) {
            return Err(ManifestError::Duplicate(rules.name));
        }
        self.modules.insert(rules.name.clone(), rules);
        Ok(())
    }

    /// Registers a module that may be depended on without being declared.
    pub fn add_external(&mut self, name: impl Into<String>) {
        self.external.insert(name.into());
    }

    /// Returns the declaration of `name`, if declared.
    pub fn module(&self, name: &str) -> Option<&ModuleRules> {
        self.modules.get(name)
    }

    /// Returns every declared module ordered by name.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRules> {
        self.modules.values()
    }

    /// Whether `name` is provided outside this graph.
    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }

    /// Returns the dependencies of a declared module, public ones first.
    pub fn dependencies_of(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        self.modules.get(name).map(ModuleRules::dependencies)
    }

    /// Checks names, dependency targets, self references and cycles.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for rules in self.modules.values() {
            if !is_identifier(&rules.name) {
                return Err(ManifestError::InvalidName(rules.name.clone()));
            }
            for dependency in rules.dependencies() {
                if dependency == rules.name {
                    return Err(ManifestError::SelfDependency(rules.name.clone()));
                }
                if !self.modules.contains_key(dependency) && !self.external.contains(dependency) {
                    return Err(ManifestError::UnknownDependency {
                        module: rules.name.clone(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        self.find_cycle().map_or(Ok(()), |cycle| Err(ManifestError::DependencyCycle(cycle)))
    }

    /// Declared modules ordered so that every module follows the declared
    /// modules it depends on. Ties are broken by name.
    pub fn topological_order(&self) -> Result<Vec<&str>, ManifestError> {
        self.validate()?;

        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = self
            .modules
            .values()
            .map(|rules| {
                let internal = rules
                    .dependencies()
                    .filter(|dep| self.modules.contains_key(*dep))
                    .collect();
                (rules.name.as_str(), internal)
            })
            .collect();

        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();

            // validate() has ruled out cycles, so something is always ready.
            for name in &ready {
                remaining.remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &ready {
                    deps.remove(name);
                }
            }
            order.extend(ready);
        }

        Ok(order)
    }

    /// Modules whose interface is visible to anything depending on `name`.
    /// Public dependencies propagate transitively; private ones stop here.
    pub fn transitive_public(&self, name: &str) -> BTreeSet<String> {
        let mut exposed = BTreeSet::new();
        let mut stack: Vec<&str> = self
            .modules
            .get(name)
            .map(|rules| rules.public_dependencies.iter().map(String::as_str).collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !exposed.insert(current.to_string()) {
                continue;
            }
            if let Some(rules) = self.modules.get(current) {
                stack.extend(rules.public_dependencies.iter().map(String::as_str));
            }
        }

        exposed
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a ModuleGraph,
            name: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(name) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|entry| *entry == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|entry| entry.to_string()).collect();
                    cycle.push(name.to_string());
                    return Some(cycle);
                }
                None => {}
            }

            let rules = graph.modules.get(name)?;
            marks.insert(name, Mark::Visiting);
            path.push(name);
            for dependency in rules.dependencies() {
                if let Some(cycle) = visit(graph, dependency, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(name, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        self.modules
            .keys()
            .find_map(|name| visit(self, name, &mut marks, &mut path))
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_revision_validates() {
        for revision in Revision::ALL {
            let graph = ModuleGraph::for_revision(revision);
            assert!(graph.validate().is_ok(), "{revision:?} should validate");
        }
    }

    #[test]
    fn parses_revision_names() {
        assert_eq!("Merged".parse::<Revision>(), Ok(Revision::Merged));
        assert_eq!(Revision::Split.to_string(), "split");
        assert_eq!("consolidated".parse::<Revision>(), Ok(Revision::Consolidated));
        assert_eq!(
            "final".parse::<Revision>(),
            Err(ManifestError::UnknownRevision("final".into()))
        );
    }

    #[test]
    fn public_visibility_per_revision() {
        let exposed = |revision, name| -> Vec<String> {
            ModuleGraph::for_revision(revision)
                .transitive_public(name)
                .into_iter()
                .collect()
        };

        assert_eq!(
            exposed(Revision::Initial, "AudioAnalysisTools"),
            vec!["Core", "RuntimeAudioImporter"]
        );
        assert_eq!(exposed(Revision::Split, "EnvelopeAnalysis"), vec!["Core"]);
        assert_eq!(exposed(Revision::Split, "OnsetDetection"), vec!["Core"]);
        assert_eq!(
            exposed(Revision::Consolidated, "AudioAnalysisTools"),
            vec!["Core", "CoreUObject", "Engine", "RuntimeAudioImporter"]
        );
        assert_eq!(
            exposed(Revision::Merged, "AudioAnalysisTools"),
            vec!["Core", "CoreUObject", "Engine", "RuntimeAudioImporter"]
        );
        assert!(ModuleGraph::for_revision(Revision::Consolidated)
            .module("AudioAnalysisTools")
            .unwrap()
            .private_dependencies
            .is_empty());
    }

    #[test]
    fn merged_revision_orders_dependencies_first() {
        let graph = ModuleGraph::for_revision(Revision::Merged);
        let order = graph.topological_order().unwrap();

        assert_eq!(
            order,
            vec!["EnvelopeAnalysis", "OnsetDetection", "AudioAnalysisTools"]
        );
    }

    #[test]
    fn onset_detection_reaches_importer_without_cycling() {
        let graph = ModuleGraph::for_revision(Revision::Split);
        let deps: Vec<&str> = graph.dependencies_of("OnsetDetection").unwrap().collect();

        assert_eq!(deps, vec!["Core", "CoreUObject", "Engine", "EnvelopeAnalysis"]);
        assert!(graph
            .dependencies_of("EnvelopeAnalysis")
            .unwrap()
            .any(|dep| dep == "RuntimeAudioImporter"));
        assert!(graph.topological_order().is_ok());
    }

    #[test]
    fn detects_cycles() {
        let mut graph = ModuleGraph::for_revision(Revision::Split);
        let mut envelope = graph.module("EnvelopeAnalysis").unwrap().clone();
        envelope.private_dependencies.push("OnsetDetection".to_string());
        graph.modules.insert(envelope.name.clone(), envelope);

        match graph.validate() {
            Err(ManifestError::DependencyCycle(cycle)) => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"OnsetDetection".to_string()));
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_and_self_dependencies() {
        let mut graph = ModuleGraph::new();
        graph
            .declare(ModuleRules::new("Spectrum").private(["Missing"]))
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(ManifestError::UnknownDependency { .. })
        ));

        let mut graph = ModuleGraph::new();
        graph
            .declare(ModuleRules::new("Spectrum").public(["Spectrum"]))
            .unwrap();
        assert_eq!(
            graph.validate(),
            Err(ManifestError::SelfDependency("Spectrum".to_string()))
        );
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let mut graph = ModuleGraph::for_revision(Revision::Initial);
        assert!(matches!(
            graph.declare(ModuleRules::new("AudioAnalysisTools")),
            Err(ManifestError::Duplicate(_))
        ));

        graph.declare(ModuleRules::new("9Lives")).unwrap();
        assert_eq!(
            graph.validate(),
            Err(ManifestError::InvalidName("9Lives".to_string()))
        );
    }

    #[test]
    fn public_visibility_is_transitive() {
        let mut graph = ModuleGraph::new();
        graph
            .declare(ModuleRules::new("Base").public(["Core"]))
            .unwrap();
        graph
            .declare(ModuleRules::new("Middle").public(["Base"]).private(["Engine"]))
            .unwrap();
        graph
            .declare(ModuleRules::new("Top").public(["Middle"]))
            .unwrap();

        let exposed = graph.transitive_public("Top");
        assert!(exposed.contains("Middle"));
        assert!(exposed.contains("Base"));
        assert!(exposed.contains("Core"));
        assert!(!exposed.contains("Engine"));
    }
}
