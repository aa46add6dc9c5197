//! SVG structure summary and checks

use crate::error::Result;
use crate::office::xml::{self, Element};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct SvgInfo {
    pub format: &'static str,
    pub file_size: u64,
    pub width: Option<String>,
    pub height: Option<String>,
    #[serde(rename = "viewBox")]
    pub view_box: Option<String>,
    pub element_counts: Value,
    pub total_elements: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

fn walk<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    out.push(element);
    for child in element.elements() {
        walk(child, out);
    }
}

pub fn inspect(text: &str, file_size: u64) -> Result<SvgInfo> {
    let root = xml::parse(text)?;
    let mut all = Vec::new();
    walk(&root, &mut all);

    let mut counts: HashMap<String, usize> = HashMap::new();
    for element in &all {
        *counts.entry(element.local_name().to_string()).or_insert(0) += 1;
    }
    let groups = all
        .iter()
        .filter(|e| e.local_name() == "g")
        .filter_map(|g| g.attr("inkscape:label").or_else(|| g.attr("id")))
        .map(str::to_string)
        .collect();

    Ok(SvgInfo {
        format: "SVG",
        file_size,
        width: root.attr("width").map(str::to_string),
        height: root.attr("height").map(str::to_string),
        view_box: root.attr("viewBox").map(str::to_string),
        element_counts: super::ranked_json(&super::ranked(counts)),
        total_elements: all.len(),
        groups,
    })
}

pub fn validate(text: &str) -> Vec<String> {
    let root = match xml::parse(text) {
        Ok(root) => root,
        Err(e) => return vec![format!("XML parse error: {}", e)],
    };
    let mut issues = Vec::new();
    if root.local_name() != "svg" {
        issues.push("Root element is not <svg>".to_string());
    }
    let sized = root.attr("width").is_some() && root.attr("height").is_some();
    if root.attr("viewBox").is_none() && !sized {
        issues.push("No viewBox or width/height defined".to_string());
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRAWING: &str = r#"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="210mm" height="297mm" viewBox="0 0 210 297">
  <g inkscape:label="Outline" id="layer1"><rect x="0" y="0" width="10" height="10"/><path d="M0 0L5 5"/></g>
  <g id="dims"><path d="M1 1L2 2"/><text x="1" y="1">12.5</text></g>
</svg>"#;

    #[test]
    fn test_inspect() {
        let info = inspect(DRAWING, 321).unwrap();
        assert_eq!(info.width.as_deref(), Some("210mm"));
        assert_eq!(info.view_box.as_deref(), Some("0 0 210 297"));
        assert_eq!(info.total_elements, 7);
        assert_eq!(info.element_counts["path"], 2);
        assert_eq!(info.groups, vec!["Outline", "dims"]);
        assert!(validate(DRAWING).is_empty());
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("<svg/>"), vec!["No viewBox or width/height defined"]);
        assert_eq!(validate(r#"<html width="1" height="1"/>"#), vec!["Root element is not <svg>"]);
        assert!(validate("<svg").first().unwrap().starts_with("XML parse error"));
    }
}
