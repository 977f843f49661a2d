//! Line-oriented Python import parser
//!
//! Recognizes `import a.b [as c], d` and `from ..pkg import (x, y as z)`
//! statements, including parenthesized and backslash-continued forms. No
//! syntax tree is built; statements inside strings are not told apart from
//! real ones.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// One parsed import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStmt {
    /// `import module [as alias]`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `from <dots><module> import name [as alias], ...`
    From {
        level: usize,
        module: String,
        names: Vec<(String, Option<String>)>,
    },
}

impl ImportStmt {
    pub fn is_relative(&self) -> bool {
        matches!(self, ImportStmt::From { level, .. } if *level > 0)
    }

    /// Names this statement binds in the importing module
    pub fn bindings(&self) -> Vec<String> {
        match self {
            ImportStmt::Import { module, alias } => vec![alias.clone().unwrap_or_else(|| {
                module.split('.').next().unwrap_or(module).to_string()
            })],
            ImportStmt::From { names, .. } => names
                .iter()
                .filter(|(name, _)| name != "*")
                .map(|(name, alias)| alias.clone().unwrap_or_else(|| name.clone()))
                .collect(),
        }
    }
}

/// Imports of one file plus the identifiers used outside import lines
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub imports: Vec<ImportStmt>,
    pub identifiers: HashSet<String>,
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*import\s+(.+)$").expect("valid import regex"))
}

fn from_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*from\s+(\.*)([\w.]*)\s+import\s+(.+)$").expect("valid from-import regex")
    })
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"))
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Parse all import statements and collect non-import identifiers
pub fn parse_file(content: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let mut lines = content.lines();

    while let Some(raw) = lines.next() {
        let line = strip_comment(raw).trim_end();

        if let Some(caps) = from_re().captures(line) {
            let mut names_part = caps[3].trim().to_string();
            // Parenthesized lists may span lines
            if names_part.starts_with('(') && !names_part.contains(')') {
                for next in lines.by_ref() {
                    let next = strip_comment(next);
                    names_part.push(' ');
                    names_part.push_str(next.trim());
                    if next.contains(')') {
                        break;
                    }
                }
            }
            while names_part.ends_with('\\') {
                names_part.pop();
                match lines.next() {
                    Some(next) => {
                        names_part.push(' ');
                        names_part.push_str(strip_comment(next).trim());
                    }
                    None => break,
                }
            }
            let names = names_part
                .trim_matches(|c| c == '(' || c == ')' || char::is_whitespace(c))
                .split(',')
                .filter_map(split_alias)
                .collect::<Vec<_>>();
            parsed.imports.push(ImportStmt::From {
                level: caps[1].len(),
                module: caps[2].to_string(),
                names,
            });
            continue;
        }

        if let Some(caps) = import_re().captures(line) {
            let mut modules_part = caps[1].trim().to_string();
            while modules_part.ends_with('\\') {
                modules_part.pop();
                match lines.next() {
                    Some(next) => {
                        modules_part.push(' ');
                        modules_part.push_str(strip_comment(next).trim());
                    }
                    None => break,
                }
            }
            for (module, alias) in modules_part.split(',').filter_map(split_alias) {
                parsed.imports.push(ImportStmt::Import { module, alias });
            }
            continue;
        }

        for ident in ident_re().find_iter(line) {
            parsed.identifiers.insert(ident.as_str().to_string());
        }
    }

    parsed
}

/// `name [as alias]` -> (name, alias)
fn split_alias(item: &str) -> Option<(String, Option<String>)> {
    let mut parts = item.split_whitespace();
    let name = parts.next()?.to_string();
    let alias = match (parts.next(), parts.next()) {
        (Some("as"), Some(alias)) => Some(alias.to_string()),
        _ => None,
    };
    Some((name, alias))
}
