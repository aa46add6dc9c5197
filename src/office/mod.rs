//! DOCX, PPTX and XLSX tools
//!
//! All three formats are OOXML zip packages. Reading and editing go through
//! [`package::Package`] and the element tree in [`xml`]; creation uses
//! `docx-rs` for Word documents, `rust_xlsxwriter` for workbooks and a
//! built-in template for presentations.

pub mod docx;
pub mod markdown;
pub mod package;
pub mod pptx;
mod pptx_template;
pub mod xlsx;
pub mod xml;

use crate::error::{Error, Result};
use std::io::Read;
use std::ops::Range;
use std::path::Path;

/// How `create` input should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Auto,
    Markdown,
    Json,
}

impl InputKind {
    /// From the input file extension; stdin and unknown extensions sniff the content
    pub fn from_path(path: Option<&Path>) -> Self {
        let ext = path
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext.as_deref() {
            Some("json") => InputKind::Json,
            Some("md" | "markdown") => InputKind::Markdown,
            _ => InputKind::Auto,
        }
    }

    /// Settle `Auto` by looking at the first non-blank character
    pub fn resolve(self, content: &str) -> InputKind {
        match self {
            InputKind::Auto => {
                let trimmed = content.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    InputKind::Json
                } else {
                    InputKind::Markdown
                }
            }
            other => other,
        }
    }
}

/// Read `create` input from a file, or stdin when no file is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

/// Parse an `a:b` slice over `len` items
///
/// Either bound may be omitted. With `one_based`, `a` counts from 1 and `b`
/// is inclusive, as slide numbers are; otherwise both are 0-based with `b`
/// exclusive. Bounds are clamped to the available items.
pub fn parse_slice(spec: Option<&str>, len: usize, one_based: bool) -> Result<Range<usize>> {
    let Some(spec) = spec.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(0..len);
    };
    let (start, end) = spec.split_once(':').unwrap_or((spec, ""));
    let parse = |s: &str| -> Result<Option<usize>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<usize>()
            .map(Some)
            .map_err(|_| Error::Invalid(format!("invalid range '{}'", spec)))
    };

    let mut start = parse(start)?.unwrap_or(if one_based { 1 } else { 0 });
    if one_based {
        start = start.saturating_sub(1);
    }
    let end = parse(end)?.unwrap_or(len).min(len);
    let start = start.min(end);
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind() {
        assert_eq!(InputKind::from_path(Some(Path::new("a.JSON"))), InputKind::Json);
        assert_eq!(InputKind::from_path(Some(Path::new("a.md"))), InputKind::Markdown);
        assert_eq!(InputKind::from_path(None), InputKind::Auto);
        assert_eq!(InputKind::Auto.resolve("  [1, 2]"), InputKind::Json);
        assert_eq!(InputKind::Auto.resolve("# Title"), InputKind::Markdown);
        assert_eq!(InputKind::Markdown.resolve("{}"), InputKind::Markdown);
    }

    #[test]
    fn test_parse_slice() {
        assert_eq!(parse_slice(None, 5, false).unwrap(), 0..5);
        assert_eq!(parse_slice(Some("1:3"), 5, false).unwrap(), 1..3);
        assert_eq!(parse_slice(Some(":2"), 5, false).unwrap(), 0..2);
        assert_eq!(parse_slice(Some("2:"), 5, false).unwrap(), 2..5);
        assert_eq!(parse_slice(Some("2:3"), 5, true).unwrap(), 1..3);
        assert_eq!(parse_slice(Some("4:99"), 5, true).unwrap(), 3..5);
        assert_eq!(parse_slice(Some("9:"), 5, false).unwrap(), 5..5);
        assert!(parse_slice(Some("a:b"), 5, false).is_err());
    }
}
