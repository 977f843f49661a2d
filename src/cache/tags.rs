//! Header annotation scanner
//!
//! Recognizes three comment directives within the first
//! [`TAG_WINDOW_LINES`] lines of a file:
//!
//! ```text
//! # @expose
//! # @owner: platform-team
//! # @maturity: beta
//! ```
//!
//! The first occurrence of `@owner` and `@maturity` wins.

use crate::models::{Maturity, Tags};

/// Number of leading lines inspected for annotations
pub const TAG_WINDOW_LINES: usize = 80;

/// Scan the leading lines of `content` for tag directives
pub fn scan_tags(content: &str) -> Tags {
    scan_tag_lines(content.lines())
}

/// Scan an iterator of lines; stops after the tag window
pub fn scan_tag_lines<'a, I>(lines: I) -> Tags
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tags = Tags::default();
    for line in lines.into_iter().take(TAG_WINDOW_LINES) {
        let Some(directive) = directive_of(line) else {
            continue;
        };
        apply_directive(directive, &mut tags);
    }
    tags
}

/// Text after `# @` on a comment line, if any
fn directive_of(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?;
    rest.trim_start().strip_prefix('@')
}

fn apply_directive(directive: &str, tags: &mut Tags) {
    if let Some(rest) = directive.strip_prefix("expose") {
        if rest.chars().next().map_or(true, |c| !is_word_char(c)) {
            tags.expose = true;
        }
        return;
    }

    if let Some(rest) = directive.strip_prefix("owner:") {
        if tags.owner.is_none() {
            let owner: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
                .collect();
            if !owner.is_empty() {
                tags.owner = Some(owner);
            }
        }
        return;
    }

    let lowered = directive.to_ascii_lowercase();
    if let Some(rest) = lowered.strip_prefix("maturity:") {
        if tags.maturity.is_none() {
            let word: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            tags.maturity = word.parse::<Maturity>().ok();
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scans_all_three_directives() {
        let src = "#!/usr/bin/env python3\n\"\"\"Module doc\n# @owner: data-eng.core\n# @expose\n# @maturity: Beta\n\"\"\"\n";
        let tags = scan_tags(src);
        assert!(tags.expose);
        assert_eq!(tags.owner.as_deref(), Some("data-eng.core"));
        assert_eq!(tags.maturity, Some(Maturity::Beta));
    }

    #[test]
    fn test_ignores_lines_past_window() {
        let mut src = String::new();
        for _ in 0..TAG_WINDOW_LINES {
            src.push_str("x = 1\n");
        }
        src.push_str("# @expose\n");
        assert!(!scan_tags(&src).expose);
    }

    #[test]
    fn test_expose_requires_word_boundary() {
        assert!(!scan_tags("# @exposed_api\n").expose);
        assert!(scan_tags("  #   @expose  # public\n").expose);
    }

    #[test]
    fn test_first_owner_wins_and_unknown_maturity_ignored() {
        let tags = scan_tags("# @owner: alice\n# @owner: bob\n# @maturity: alpha\n");
        assert_eq!(tags.owner.as_deref(), Some("alice"));
        assert_eq!(tags.maturity, None);
    }

    #[test]
    fn test_non_comment_lines_ignored() {
        let tags = scan_tags("owner = '@owner: mallory'\nprint('# @expose')\n");
        assert!(tags.is_empty());
    }
}
