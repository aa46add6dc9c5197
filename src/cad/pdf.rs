//! PDF summary from the raw file, text through `pdf-extract`

use crate::error::{Error, Result};
use regex::bytes::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

fn page_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Type\s*/Page([^s]|$)").ok())
        .as_ref()
}

fn info_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(Title|Author|Subject|Creator|Producer|CreationDate|ModDate)\s*\(([^)]*)\)").ok()
    })
    .as_ref()
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfInfo {
    pub format: &'static str,
    pub file_size: u64,
    pub version: Option<String>,
    pub page_count: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Page objects counted from the uncompressed object headers
pub fn page_count(data: &[u8]) -> usize {
    page_re().map_or(0, |re| re.find_iter(data).count())
}

pub fn inspect(data: &[u8]) -> PdfInfo {
    let version = data
        .strip_prefix(b"%PDF-")
        .map(|rest| {
            rest.iter()
                .take_while(|b| b.is_ascii_digit() || **b == b'.')
                .map(|&b| b as char)
                .collect::<String>()
        })
        .filter(|v| !v.is_empty());

    let mut metadata = BTreeMap::new();
    if let Some(re) = info_re() {
        for caps in re.captures_iter(data) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                metadata
                    .entry(String::from_utf8_lossy(key.as_bytes()).into_owned())
                    .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
            }
        }
    }

    PdfInfo {
        format: "PDF",
        file_size: data.len() as u64,
        version,
        page_count: page_count(data),
        metadata,
    }
}

pub fn validate(data: &[u8]) -> Vec<String> {
    let mut issues = Vec::new();
    if !data.starts_with(b"%PDF-") {
        issues.push("Missing %PDF- header".to_string());
    }
    let tail = &data[data.len().saturating_sub(1024)..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        issues.push("Missing %%EOF marker".to_string());
    }
    if page_count(data) == 0 {
        issues.push("PDF has no pages".to_string());
    }
    issues
}

#[cfg(feature = "pdf")]
pub fn extract_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| Error::Parse(format!("PDF text: {}", e)))
}

#[cfg(not(feature = "pdf"))]
pub fn extract_text(_path: &Path) -> Result<String> {
    Err(Error::Unsupported(
        "PDF text extraction requires the `pdf` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &[u8] = b"%PDF-1.4\n\
        1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
        2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >> endobj\n\
        3 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
        4 0 obj << /Type/Page /Parent 2 0 R >> endobj\n\
        5 0 obj << /Title (Bracket drawing) /Producer (plotter) >> endobj\n\
        trailer << /Root 1 0 R /Info 5 0 R >>\n%%EOF\n";

    #[test]
    fn test_inspect() {
        let info = inspect(TINY);
        assert_eq!(info.version.as_deref(), Some("1.4"));
        assert_eq!(info.page_count, 2);
        assert_eq!(info.metadata["Title"], "Bracket drawing");
        assert!(validate(TINY).is_empty());
    }

    #[test]
    fn test_validate() {
        let issues = validate(b"hello");
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0], "Missing %PDF- header");
    }
}
