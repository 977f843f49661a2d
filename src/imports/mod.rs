//! Import Dependency Analyzer
//!
//! Builds a module -> imported-module graph from line-oriented import
//! parsing and reports cycles among internal modules with Tarjan's SCC
//! algorithm (via petgraph). Scanning is bounded by a file count and a
//! wall-clock budget; hitting either returns partial results flagged as
//! truncated.

mod parser;

pub use parser::{parse_file, ImportStmt, ParsedFile};

use crate::models::CandidateFile;
use crate::scoring::round2;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const MAX_SCORE_IMPORT: f64 = 10.0;

/// Aggregated import hygiene and cycle results
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub files: usize,
    pub total_imports: usize,
    pub duplicate_imports: usize,
    pub relative_imports: usize,
    pub unused_candidates: usize,
    pub external_modules: BTreeSet<String>,
    /// Internal module edges (deduplicated)
    pub graph: BTreeMap<String, BTreeSet<String>>,
    /// Members of each cycle sorted by name; cycles sorted
    pub cycles: Vec<Vec<String>>,
    pub truncated: bool,
}

impl ImportStats {
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Capped-penalty score out of [`MAX_SCORE_IMPORT`], two decimals
    pub fn score(&self) -> f64 {
        let penalty = (self.duplicate_imports as f64 * 0.5).min(4.0)
            + (self.relative_imports as f64 * 0.3).min(3.0)
            + (self.unused_candidates as f64 * 0.2).min(3.0)
            + (self.cycle_count() as f64 * 1.5).min(6.0);
        round2((MAX_SCORE_IMPORT - penalty).max(0.0))
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "imports={}, dup={}, rel={}, unused?={}, cycles={}",
            self.total_imports,
            self.duplicate_imports,
            self.relative_imports,
            self.unused_candidates,
            self.cycle_count()
        );
        if self.truncated {
            summary.push_str(", truncated");
        }
        summary
    }
}

/// Dotted module name for a repository-relative `.py` path
///
/// `pkg/__init__.py` names the package itself.
pub fn module_name(rel_path: &str) -> String {
    let stem = rel_path.strip_suffix(".py").unwrap_or(rel_path);
    let stem = stem.strip_suffix("/__init__").unwrap_or(stem);
    if stem == "__init__" {
        return String::new();
    }
    stem.replace('/', ".")
}

pub struct ImportAnalyzer {
    internal_prefixes: Vec<String>,
    max_files: usize,
    max_duration: Duration,
}

struct ParsedModule {
    name: String,
    is_package: bool,
    parsed: ParsedFile,
}

impl ImportAnalyzer {
    pub fn new(internal_prefixes: Vec<String>, max_files: usize, max_duration: Duration) -> Self {
        Self {
            internal_prefixes,
            max_files,
            max_duration,
        }
    }

    fn is_internal(&self, module: &str) -> bool {
        self.internal_prefixes.is_empty()
            || self.internal_prefixes.iter().any(|pfx| {
                module == pfx
                    || module
                        .strip_prefix(pfx.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    }

    /// Analyze the `.py` files among `candidates`
    pub fn analyze(&self, candidates: &[CandidateFile]) -> ImportStats {
        let start = Instant::now();
        let mut stats = ImportStats::default();
        let mut modules: Vec<ParsedModule> = Vec::new();

        for candidate in candidates.iter().filter(|c| c.rel_path.ends_with(".py")) {
            if modules.len() >= self.max_files || start.elapsed() > self.max_duration {
                stats.truncated = true;
                warn!(
                    "Import scan budget hit after {} files ({:.1}s)",
                    modules.len(),
                    start.elapsed().as_secs_f64()
                );
                break;
            }
            let content = match std::fs::read(&candidate.abs_path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    debug!("Skipping unreadable {}: {}", candidate.rel_path, e);
                    continue;
                }
            };
            modules.push(ParsedModule {
                name: module_name(&candidate.rel_path),
                is_package: candidate.rel_path.ends_with("__init__.py"),
                parsed: parse_file(&content),
            });
        }

        stats.files = modules.len();
        let known: BTreeSet<&str> = modules
            .iter()
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
            .collect();

        for module in &modules {
            self.count_hygiene(module, &mut stats);

            for stmt in &module.parsed.imports {
                for target in resolve_targets(module, stmt) {
                    match longest_known_prefix(&target, &known) {
                        Some(dep) => {
                            if dep != module.name
                                && self.is_internal(&module.name)
                                && self.is_internal(dep)
                            {
                                stats
                                    .graph
                                    .entry(module.name.clone())
                                    .or_default()
                                    .insert(dep.to_string());
                            }
                        }
                        None if !stmt.is_relative() => {
                            let top = target.split('.').next().unwrap_or("").to_string();
                            let internal_name =
                                !self.internal_prefixes.is_empty() && self.is_internal(&top);
                            if !top.is_empty() && !internal_name {
                                stats.external_modules.insert(top);
                            }
                        }
                        None => {}
                    }
                }
            }
        }

        stats.cycles = find_cycles(&stats.graph);
        info!(
            "Import analysis: {} files, {} imports, {} cycles{}",
            stats.files,
            stats.total_imports,
            stats.cycle_count(),
            if stats.truncated { " (truncated)" } else { "" }
        );
        stats
    }

    fn count_hygiene(&self, module: &ParsedModule, stats: &mut ImportStats) {
        let mut seen: FxHashMap<String, usize> = FxHashMap::default();
        for stmt in &module.parsed.imports {
            stats.total_imports += 1;
            if stmt.is_relative() {
                stats.relative_imports += 1;
            }
            for binding in stmt.bindings() {
                *seen.entry(binding).or_insert(0) += 1;
            }
        }
        stats.duplicate_imports += seen.values().filter(|&&n| n > 1).count();
        // Package re-exports in __init__ are intentionally unreferenced
        if !module.is_package {
            stats.unused_candidates += seen
                .keys()
                .filter(|name| !module.parsed.identifiers.contains(*name))
                .count();
        }
    }
}

/// Candidate dotted targets of one statement, most specific first
fn resolve_targets(module: &ParsedModule, stmt: &ImportStmt) -> Vec<String> {
    match stmt {
        ImportStmt::Import { module: target, .. } => vec![target.clone()],
        ImportStmt::From {
            level,
            module: target,
            names,
        } => {
            let base = if *level == 0 {
                target.clone()
            } else {
                let Some(anchor) = relative_anchor(module, *level) else {
                    return Vec::new();
                };
                join_module(&anchor, target)
            };
            // `from pkg import sub` depends on pkg.sub when that is a module,
            // otherwise the name resolves back to a prefix of pkg
            let mut targets: Vec<String> = names
                .iter()
                .filter(|(name, _)| name != "*")
                .map(|(name, _)| join_module(&base, name))
                .collect();
            if targets.is_empty() && !base.is_empty() {
                targets.push(base);
            }
            targets
        }
    }
}

/// Package a relative import of `level` dots resolves against
fn relative_anchor(module: &ParsedModule, level: usize) -> Option<String> {
    let mut parts: Vec<&str> = if module.name.is_empty() {
        Vec::new()
    } else {
        module.name.split('.').collect()
    };
    if !module.is_package {
        parts.pop();
    }
    for _ in 1..level {
        parts.pop()?;
    }
    Some(parts.join("."))
}

fn join_module(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}.{}", base, name),
    }
}

fn longest_known_prefix<'a>(target: &str, known: &BTreeSet<&'a str>) -> Option<&'a str> {
    let mut candidate = target;
    loop {
        if let Some(found) = known.get(candidate) {
            return Some(*found);
        }
        candidate = &candidate[..candidate.rfind('.')?];
    }
}

/// Strongly connected components of size > 1, in canonical form
pub fn find_cycles(graph: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut digraph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    for (src, dsts) in graph {
        for name in std::iter::once(src).chain(dsts.iter()) {
            if !index.contains_key(name.as_str()) {
                let idx = digraph.add_node(name.as_str());
                index.insert(name.as_str(), idx);
            }
        }
    }
    for (src, dsts) in graph {
        for dst in dsts {
            digraph.add_edge(index[src.as_str()], index[dst.as_str()], ());
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&digraph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<String> =
                scc.into_iter().map(|idx| digraph[idx].to_string()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::candidate_for;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) -> CandidateFile {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        candidate_for(root, &path).unwrap()
    }

    fn analyzer(prefixes: &[&str]) -> ImportAnalyzer {
        ImportAnalyzer::new(
            prefixes.iter().map(|s| s.to_string()).collect(),
            300,
            Duration::from_secs(20),
        )
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name("pkg/sub/mod.py"), "pkg.sub.mod");
        assert_eq!(module_name("pkg/__init__.py"), "pkg");
        assert_eq!(module_name("main.py"), "main");
    }

    #[test]
    fn test_three_cycle_and_acyclic_pair() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "app/a.py", "from app import b\nb.go()\n"),
            write(root, "app/b.py", "import app.c\napp.c.go()\n"),
            write(root, "app/c.py", "from app.a import thing\nthing()\n"),
            write(root, "app/d.py", "from app import e\ne.go()\n"),
            write(root, "app/e.py", "import json\njson.dumps({})\n"),
        ];

        let stats = analyzer(&["app"]).analyze(&files);

        assert_eq!(stats.cycle_count(), 1);
        assert_eq!(stats.cycles[0], vec!["app.a", "app.b", "app.c"]);
        assert!(stats.external_modules.contains("json"));
        assert!(!stats.truncated);
    }

    #[test]
    fn test_external_dependencies_are_not_cycle_members() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "core/x.py", "import requests\nfrom vendor import y\n"),
            write(root, "vendor/y.py", "from core import x\n"),
        ];
        // vendor is outside the internal namespace
        let stats = analyzer(&["core"]).analyze(&files);
        assert_eq!(stats.cycle_count(), 0);
    }

    #[test]
    fn test_relative_import_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "pkg/__init__.py", "from .one import run\n"),
            write(root, "pkg/one.py", "from . import two\ntwo.run()\n"),
            write(root, "pkg/two.py", "from .one import helper\nhelper()\n"),
        ];
        let stats = analyzer(&[]).analyze(&files);
        assert_eq!(stats.relative_imports, 3);
        assert_eq!(stats.cycles, vec![vec!["pkg.one".to_string(), "pkg.two".to_string()]]);
    }

    #[test]
    fn test_hygiene_counters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![write(
            root,
            "m.py",
            "import os\nimport os\nimport sys\nfrom typing import List\n\nprint(os.getcwd())\n",
        )];
        let stats = analyzer(&[]).analyze(&files);
        assert_eq!(stats.total_imports, 4);
        assert_eq!(stats.duplicate_imports, 1);
        // sys and List are never referenced
        assert_eq!(stats.unused_candidates, 2);
        assert_eq!(stats.relative_imports, 0);
    }

    #[test]
    fn test_file_budget_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files: Vec<_> = (0..5)
            .map(|i| write(root, &format!("m{}.py", i), "import os\nos\n"))
            .collect();
        let stats = ImportAnalyzer::new(Vec::new(), 2, Duration::from_secs(20)).analyze(&files);
        assert_eq!(stats.files, 2);
        assert!(stats.truncated);
        assert!(stats.summary().ends_with("truncated"));
    }

    #[test]
    fn test_score_caps_each_term() {
        let stats = ImportStats {
            duplicate_imports: 100,
            relative_imports: 1,
            unused_candidates: 0,
            cycles: vec![vec!["a".into(), "b".into()]],
            ..Default::default()
        };
        // 10 - (4 + 0.3 + 0 + 1.5)
        assert_eq!(stats.score(), 4.2);

        let worst = ImportStats {
            duplicate_imports: 100,
            relative_imports: 100,
            unused_candidates: 100,
            cycles: vec![vec!["a".into(), "b".into()]; 10],
            ..Default::default()
        };
        assert_eq!(worst.score(), 0.0);
    }
}
