//! Graph Linker
//!
//! Infers edges between hits purely from co-location: two hits of linkable
//! kinds in the same file are connected. This is a heuristic, not a call
//! graph; a route and a tool sharing a file are assumed to be wired
//! together whether or not one calls the other.

use crate::config::Policy;
use crate::models::{Edge, Hit, HitKind};

pub const ROUTE_TO_TOOL: &str = "route→tool(file)";
pub const UI_TO_ROUTE: &str = "ui→route(file)";
pub const CLI_TO_TOOL: &str = "cli→tool(file)";

fn is_route(kind: HitKind) -> bool {
    kind == HitKind::Route
}

fn is_ui(kind: HitKind) -> bool {
    kind == HitKind::Streamlit
}

fn is_cli(kind: HitKind) -> bool {
    kind == HitKind::Cli
}

/// Tool entrypoints and adapter classes both terminate tool edges
fn is_tool(kind: HitKind) -> bool {
    matches!(kind, HitKind::Tool | HitKind::Adapter)
}

/// Linking rules in emission order: (source predicate, target predicate, label)
const RULES: &[(fn(HitKind) -> bool, fn(HitKind) -> bool, &str)] = &[
    (is_route, is_tool, ROUTE_TO_TOOL),
    (is_ui, is_route, UI_TO_ROUTE),
    (is_cli, is_tool, CLI_TO_TOOL),
];

/// Link hits that share a file
///
/// `hits` is expected sorted by (file, line); edges come out grouped by file
/// in that order, then by rule, then by source and target position. With a
/// policy, both endpoints must individually satisfy its tag requirements.
pub fn link_edges(hits: &[Hit], policy: Option<&Policy>) -> Vec<Edge> {
    let mut edges = Vec::new();

    for group in hits.chunk_by(|a, b| a.file == b.file) {
        for (is_src, is_dst, label) in RULES {
            for src in group.iter().filter(|h| is_src(h.kind)) {
                for dst in group.iter().filter(|h| is_dst(h.kind)) {
                    if !endpoint_ok(src, policy) || !endpoint_ok(dst, policy) {
                        continue;
                    }
                    edges.push(Edge {
                        src: src.id(),
                        dst: dst.id(),
                        label: (*label).to_string(),
                    });
                }
            }
        }
    }

    edges
}

fn endpoint_ok(hit: &Hit, policy: Option<&Policy>) -> bool {
    policy.map_or(true, |p| p.allows_tags(&hit.tags))
}
