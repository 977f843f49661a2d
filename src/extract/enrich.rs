//! Kind-specific metadata extractors

use crate::models::HitKind;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn route_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@router\.(get|post|put|delete|patch)\(\s*['"]([^'"]+)['"]"#)
            .expect("valid route regex")
    })
}

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"def\s+(run|handle|execute)\(([^)]*)\):").expect("valid entry regex")
    })
}

fn adapter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"class\s+(\w*Adapter)\(").expect("valid adapter regex"))
}

/// Add kind-specific keys to `meta` based on the hit's line text
pub fn enrich(kind: HitKind, text: &str, meta: &mut BTreeMap<String, String>) {
    match kind {
        HitKind::Route => {
            if let Some(caps) = route_regex().captures(text) {
                meta.insert("method".into(), caps[1].to_uppercase());
                meta.insert("path".into(), caps[2].to_string());
            }
        }
        HitKind::Cli => {
            let framework = if text.contains("typer") {
                Some("typer")
            } else if text.contains("click") {
                Some("click")
            } else if text.contains("argparse") {
                Some("argparse")
            } else {
                None
            };
            if let Some(fw) = framework {
                meta.insert("cli".into(), fw.into());
            }
        }
        HitKind::Tool => {
            if let Some(caps) = entry_regex().captures(text) {
                meta.insert("entry".into(), caps[1].to_string());
                meta.insert("params".into(), caps[2].to_string());
            }
        }
        HitKind::Adapter => {
            if let Some(caps) = adapter_regex().captures(text) {
                meta.insert("adapter".into(), caps[1].to_string());
            }
        }
        HitKind::Streamlit | HitKind::Test | HitKind::Doc => {}
    }
}
