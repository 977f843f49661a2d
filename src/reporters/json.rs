//! JSON reporter
//!
//! Pretty-printed JSON for any serializable report. Key order follows the
//! struct field order and metadata maps are ordered, so output is stable.

use anyhow::Result;
use serde::Serialize;

/// Render as pretty JSON with a trailing newline
pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}
