//! End-to-end tests of the library pipeline
//!
//! Each test builds its fixture repository in its own temp directory and
//! keeps the tag store inside it, so runs never share cache state.

use repolens::cache::TAG_STORE_FILE;
use repolens::extract::EngineChoice;
use repolens::graph::ROUTE_TO_TOOL;
use repolens::metrics::DEBT_REPORT;
use repolens::pipeline::{build_feature_map, run_health, HealthOptions, MapOptions, Workspace};
use repolens::reporters::{render_feature_map, OutputFormat};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const A_PY: &str = r#"# @expose
# @owner: api
import b
from fastapi import APIRouter

router = APIRouter()


@router.get("/items")
def run(query):
    return b.helper(query)
"#;

const B_PY: &str = r#"import a


def helper(q):
    return a.router, q
"#;

/// Two-module repository whose manifest is every top-level `.py` file
fn fixture_repo() -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    let root = dir.path();
    fs::write(root.join("repolens.toml"), "[discovery]\nmanifest = [\"*.py\"]\n").unwrap();
    fs::write(root.join("a.py"), A_PY).unwrap();
    fs::write(root.join("b.py"), B_PY).unwrap();
    dir
}

fn open(root: &Path) -> Workspace {
    Workspace::with_store(root.to_path_buf(), &root.join(".cache").join(TAG_STORE_FILE))
}

fn map_opts() -> MapOptions {
    MapOptions {
        engine: EngineChoice::InProcess,
        workers: Some(2),
        ..Default::default()
    }
}

#[test]
fn test_two_file_fixture_edges_cycle_and_debt() {
    let dir = fixture_repo();
    let ws = open(dir.path());

    let map = build_feature_map(&ws, &map_opts()).unwrap();
    let route_tool: Vec<_> = map.edges.iter().filter(|e| e.label == ROUTE_TO_TOOL).collect();
    assert_eq!(route_tool.len(), 1);
    assert_eq!(route_tool[0].src, "a.py:9");
    assert_eq!(route_tool[0].dst, "a.py:10");

    let report = run_health(
        &ws,
        &HealthOptions {
            focus: "import,debt".into(),
            ..Default::default()
        },
    );
    let import = report
        .metrics
        .iter()
        .find(|m| m.result.key == "import")
        .expect("import metric");
    let cycles = &import.result.details.as_ref().unwrap()["cycles"];
    assert_eq!(cycles, &serde_json::json!([["a", "b"]]));

    let debt_report = dir.path().join("health_reports").join(DEBT_REPORT);
    assert!(!debt_report.exists());

    fs::write(dir.path().join("b.py"), format!("{}# TODO: validate q\n", B_PY)).unwrap();
    let ws = open(dir.path());
    let report = run_health(
        &ws,
        &HealthOptions {
            focus: "debt".into(),
            ..Default::default()
        },
    );
    assert!(report.metrics[0].result.summary.starts_with("markers=1"));
    let content = fs::read_to_string(&debt_report).unwrap();
    assert!(content.contains("b.py:6"));
}

#[test]
fn test_feature_map_json_is_deterministic() {
    let dir = fixture_repo();

    // Cold cache, then warm cache, then a fresh handle
    let first = render_feature_map(
        &build_feature_map(&open(dir.path()), &map_opts()).unwrap(),
        OutputFormat::Json,
    )
    .unwrap();
    let ws = open(dir.path());
    let second = render_feature_map(&build_feature_map(&ws, &map_opts()).unwrap(), OutputFormat::Json)
        .unwrap();
    let third = render_feature_map(
        &build_feature_map(
            &ws,
            &MapOptions {
                workers: Some(4),
                ..map_opts()
            },
        )
        .unwrap(),
        OutputFormat::Json,
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_policy_requiring_expose_filters_hits_but_caches_tags() {
    let dir = fixture_repo();
    let root = dir.path();
    fs::write(
        root.join("c.py"),
        "@router.post(\"/hidden\")\ndef handle(x):\n    return x\n",
    )
    .unwrap();
    fs::write(root.join("policy.yaml"), "tags:\n  require_expose: true\n").unwrap();

    let ws = open(root);
    let map = build_feature_map(
        &ws,
        &MapOptions {
            policy: Some("policy.yaml".into()),
            ..map_opts()
        },
    )
    .unwrap();

    assert!(!map.hits.is_empty());
    assert!(map.hits.iter().all(|h| h.file == "a.py"));
    assert!(ws.cache.contains(&root.join("c.py")));

    let unfiltered = build_feature_map(&ws, &map_opts()).unwrap();
    assert!(unfiltered.hits.iter().any(|h| h.file == "c.py"));
}

#[test]
fn test_second_run_is_served_from_cache() {
    let dir = fixture_repo();
    build_feature_map(&open(dir.path()), &map_opts()).unwrap();

    let ws = open(dir.path());
    build_feature_map(&ws, &map_opts()).unwrap();
    let stats = ws.cache.stats();
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.hit_rate, "100.0%");
}

#[test]
fn test_health_survives_broken_inputs() {
    let dir = fixture_repo();
    let root = dir.path();
    fs::write(root.join("broken.py"), [0xff, 0xfe, b'\n', b'(', b'(']).unwrap();
    fs::write(root.join("repolens.toml"), "[discovery]\nmanifest = [\"*.py\"]\n[health]\nweights = { bogus = 5.0 }\n").unwrap();

    let report = run_health(&open(root), &HealthOptions::default());
    assert_eq!(report.metrics.len(), 5);
    assert!(report.failures.is_empty());
    assert!(report.total >= 0.0 && report.total <= report.max_total);
    assert!(["A", "B", "C", "D", "F"].contains(&report.grade.as_str()));
}
