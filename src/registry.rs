//! Project registry (`project-codes.json`)
//!
//! The file is either an object keyed by project code or a list of objects
//! carrying `code` / `project_code`. Entry order is preserved: classifier
//! ties resolve to the earliest project.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One registry entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Sender address fragments (full addresses or domains)
    #[serde(default)]
    pub senders: Vec<String>,

    /// PMO directory relative to the JARVIS home
    #[serde(default)]
    pub pmo_path: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub phase: Option<String>,

    #[serde(default)]
    pub product: Option<String>,
}

/// Ordered list of `(code, info)` pairs
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<(String, ProjectInfo)>,
}

impl ProjectRegistry {
    pub fn new(projects: Vec<(String, ProjectInfo)>) -> Self {
        Self { projects }
    }

    /// Load from disk; a missing file is an empty registry
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No project registry at {:?}", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load, logging and swallowing any failure
    pub fn load_lenient(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable project registry {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let mut projects = Vec::new();

        match value {
            Value::Object(map) => {
                for (code, info) in map {
                    projects.push((code, parse_info(info)?));
                }
            }
            Value::Array(items) => {
                for item in items {
                    let code = item
                        .get("code")
                        .or_else(|| item.get("project_code"))
                        .and_then(|c| match c {
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        });
                    match code {
                        Some(code) => projects.push((code, parse_info(item)?)),
                        None => debug!("Skipping registry entry without a code"),
                    }
                }
            }
            _ => {
                return Err(Error::Parse(
                    "project registry must be an object or a list".to_string(),
                ))
            }
        }

        Ok(Self { projects })
    }

    pub fn get(&self, code: &str) -> Option<&ProjectInfo> {
        self.projects
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, info)| info)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProjectInfo)> {
        self.projects.iter().map(|(c, i)| (c.as_str(), i))
    }

    pub fn codes(&self) -> Vec<String> {
        self.projects.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// PMO directory of a project: `pmo_path` under `home`, else `base/<code>`
    pub fn pmo_dir(&self, code: &str, home: &Path, base: &Path) -> PathBuf {
        match self.get(code).and_then(|i| i.pmo_path.as_deref()) {
            Some(rel) => home.join(rel),
            None => base.join(code),
        }
    }
}

fn parse_info(value: Value) -> Result<ProjectInfo> {
    serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("invalid project registry entry: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_object_form_keeps_order() {
        let registry = ProjectRegistry::from_json(
            r#"{
                "03002": {"name": "Zeta", "keywords": ["camera"]},
                "01001": {"name": "Alpha", "senders": ["acme.com"], "product": "diemaster"}
            }"#,
        )
        .unwrap();

        assert_eq!(registry.codes(), vec!["03002", "01001"]);
        let alpha = registry.get("01001").unwrap();
        assert_eq!(alpha.senders, vec!["acme.com"]);
        assert_eq!(alpha.product.as_deref(), Some("diemaster"));
    }

    #[test]
    fn test_list_form_accepts_both_code_keys() {
        let registry = ProjectRegistry::from_json(
            r#"[
                {"code": "02001", "name": "Spot"},
                {"project_code": "02002", "keywords": ["weld"]},
                {"name": "no code"}
            ]"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("02002"));
        assert_eq!(registry.get("02002").unwrap().keywords, vec!["weld"]);
    }

    #[test]
    fn test_pmo_dir_resolution() {
        let registry = ProjectRegistry::from_json(
            r#"{"01001": {"pmo_path": "custom/pmo/01001"}, "01002": {}}"#,
        )
        .unwrap();
        let home = Path::new("/jarvis");
        let base = Path::new("/jarvis/pmo");

        assert_eq!(
            registry.pmo_dir("01001", home, base),
            PathBuf::from("/jarvis/custom/pmo/01001")
        );
        assert_eq!(
            registry.pmo_dir("01002", home, base),
            PathBuf::from("/jarvis/pmo/01002")
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = ProjectRegistry::load(&tmp.path().join("project-codes.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_scalar_registry_rejected() {
        assert!(ProjectRegistry::from_json("42").is_err());
    }
}
