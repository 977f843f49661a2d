//! Function complexity analyzer (tree-sitter-python)

use super::{HealthContext, Metric, MetricResult};
use crate::scoring::round2;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;
use tree_sitter::{Node, Parser};

pub const COMPLEXITY_REPORT: &str = "complexity_report.md";
const MAX_SCORE: f64 = 10.0;
const WORST_SHOWN: usize = 10;

/// Per-function measurements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionStats {
    pub file: String,
    pub name: String,
    pub line: u32,
    pub lines: usize,
    pub nesting: usize,
    pub cyclomatic: u32,
    pub nested_loops: bool,
}

pub struct ComplexityMetric;

impl Metric for ComplexityMetric {
    fn key(&self) -> &'static str {
        "complexity"
    }

    fn run(&self, ctx: &HealthContext) -> Result<MetricResult> {
        let limits = &ctx.config.complexity;
        let (files, truncated) = ctx.content_files(&["py"]);

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .context("Failed to set Python language")?;

        let mut functions = Vec::new();
        let mut parsed_files = 0usize;
        for candidate in files {
            let source = match std::fs::read(&candidate.abs_path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    debug!("Skipping unreadable {}: {}", candidate.rel_path, e);
                    continue;
                }
            };
            match analyze_source(&mut parser, &source, &candidate.rel_path) {
                Some(stats) => {
                    parsed_files += 1;
                    functions.extend(stats);
                }
                None => debug!("Failed to parse {}", candidate.rel_path),
            }
        }

        let is_bad = |f: &FunctionStats| {
            f.lines > limits.max_function_lines
                || f.nesting > limits.max_nesting
                || f.cyclomatic > limits.max_cyclomatic
        };
        let total = functions.len();
        let bad = functions.iter().filter(|f| is_bad(f)).count();
        let nested_loops = functions.iter().filter(|f| f.nested_loops).count();
        let avg_cc = if total > 0 {
            functions.iter().map(|f| f.cyclomatic as f64).sum::<f64>() / total as f64
        } else {
            0.0
        };
        let score = if total > 0 {
            round2(MAX_SCORE * (1.0 - bad as f64 / total as f64))
        } else {
            MAX_SCORE
        };

        let mut worst: Vec<&FunctionStats> = functions.iter().filter(|f| is_bad(f)).collect();
        worst.sort_by(|a, b| {
            b.cyclomatic
                .cmp(&a.cyclomatic)
                .then(b.lines.cmp(&a.lines))
                .then(a.file.cmp(&b.file))
                .then(a.line.cmp(&b.line))
        });
        worst.truncate(WORST_SHOWN);

        let report = render_report(parsed_files, total, bad, nested_loops, &worst, ctx);
        let report_path = ctx.write_report(COMPLEXITY_REPORT, &report)?;

        let mut summary = format!(
            "functions={}, bad={}, avg_cc={:.1}, nested_loops={}",
            total, bad, avg_cc, nested_loops
        );
        if truncated {
            summary.push_str(", truncated");
        }

        Ok(MetricResult {
            key: self.key().into(),
            score,
            max_score: MAX_SCORE,
            summary,
            details: Some(serde_json::json!({
                "files": parsed_files,
                "worst": worst,
                "nested_loop_functions": nested_loops,
                "report": ctx.display_path(&report_path),
            })),
        })
    }
}

fn render_report(
    files: usize,
    total: usize,
    bad: usize,
    nested_loops: usize,
    worst: &[&FunctionStats],
    ctx: &HealthContext,
) -> String {
    let limits = &ctx.config.complexity;
    let mut md = String::new();
    md.push_str("# Complexity Report\n\n");
    md.push_str(&format!("- Files parsed: {}\n", files));
    md.push_str(&format!("- Functions: {}\n", total));
    md.push_str(&format!(
        "- Over limits: {} (lines > {}, nesting > {}, cyclomatic > {})\n",
        bad, limits.max_function_lines, limits.max_nesting, limits.max_cyclomatic
    ));
    md.push_str(&format!("- Functions with nested loops: {}\n\n", nested_loops));

    if worst.is_empty() {
        md.push_str("No function exceeds the configured limits.\n");
        return md;
    }

    md.push_str("| Function | Location | Lines | Nesting | Cyclomatic |\n");
    md.push_str("|----------|----------|-------|---------|------------|\n");
    for f in worst {
        md.push_str(&format!(
            "| `{}` | `{}:{}` | {} | {} | {} |\n",
            f.name, f.file, f.line, f.lines, f.nesting, f.cyclomatic
        ));
    }
    md
}

/// Measure every function in `source`; `None` when parsing fails outright
pub fn analyze_source(parser: &mut Parser, source: &str, file: &str) -> Option<Vec<FunctionStats>> {
    let tree = parser.parse(source, None)?;
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    collect_functions(&tree.root_node(), bytes, file, &mut out);
    Some(out)
}

fn collect_functions(node: &Node, source: &[u8], file: &str, out: &mut Vec<FunctionStats>) {
    if node.kind() == "function_definition" {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("<anonymous>")
            .to_string();
        let body = node.child_by_field_name("body");
        let (nesting, nested_loops) = body
            .map(|b| (max_nesting(&b, 0), has_nested_loop(&b, 0)))
            .unwrap_or((0, false));
        out.push(FunctionStats {
            file: file.to_string(),
            name,
            line: node.start_position().row as u32 + 1,
            lines: node.end_position().row - node.start_position().row + 1,
            nesting,
            cyclomatic: body.map(|b| calculate_complexity(&b)).unwrap_or(1),
            nested_loops,
        });
    }

    for child in node.children(&mut node.walk()) {
        collect_functions(&child, source, file, out);
    }
}

/// Nested definitions are measured on their own
fn is_scope_boundary(node: &Node) -> bool {
    matches!(node.kind(), "function_definition" | "class_definition" | "lambda")
}

fn is_block_statement(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "for_statement"
            | "while_statement"
            | "try_statement"
            | "with_statement"
            | "match_statement"
    )
}

fn is_loop(kind: &str) -> bool {
    matches!(kind, "for_statement" | "while_statement")
}

fn max_nesting(node: &Node, depth: usize) -> usize {
    let mut deepest = depth;
    for child in node.children(&mut node.walk()) {
        if is_scope_boundary(&child) {
            continue;
        }
        let child_depth = if is_block_statement(child.kind()) {
            depth + 1
        } else {
            depth
        };
        deepest = deepest.max(max_nesting(&child, child_depth));
    }
    deepest
}

/// A loop anywhere inside another loop, independent or not
fn has_nested_loop(node: &Node, loops_above: usize) -> bool {
    for child in node.children(&mut node.walk()) {
        if is_scope_boundary(&child) {
            continue;
        }
        let loops = loops_above + usize::from(is_loop(child.kind()));
        if loops >= 2 || has_nested_loop(&child, loops) {
            return true;
        }
    }
    false
}

/// McCabe-style count: 1 + one per branching construct
fn calculate_complexity(node: &Node) -> u32 {
    let mut complexity = 1;

    fn count_branches(node: &Node, complexity: &mut u32) {
        match node.kind() {
            "if_statement" | "elif_clause" | "while_statement" | "for_statement" => {
                *complexity += 1;
            }
            "except_clause" => {
                *complexity += 1;
            }
            // Each 'and'/'or'
            "boolean_operator" => {
                *complexity += 1;
            }
            "conditional_expression" => {
                *complexity += 1;
            }
            "list_comprehension"
            | "dictionary_comprehension"
            | "set_comprehension"
            | "generator_expression" => {
                for child in node.children(&mut node.walk()) {
                    if child.kind() == "if_clause" {
                        *complexity += 1;
                    }
                }
            }
            "match_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "case_clause" {
                        *complexity += 1;
                    }
                    // grammar nests cases inside a block
                    if child.kind() == "block" {
                        for case in child.children(&mut child.walk()) {
                            if case.kind() == "case_clause" {
                                *complexity += 1;
                            }
                        }
                    }
                }
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            if is_scope_boundary(&child) {
                continue;
            }
            count_branches(&child, complexity);
        }
    }

    count_branches(node, &mut complexity);
    complexity
}
