//! OOXML package access: zip parts, relationships and core properties

use super::xml::{self, Element};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CORE_PART: &str = "docProps/core.xml";
const CORE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CORE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// An opened OOXML package, parts kept in archive order
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push((file.name().to_string(), data));
        }
        Ok(Self { parts })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn part_str(&self, name: &str) -> Result<String> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::NotFound(format!("package part {}", name)))?;
        Ok(String::from_utf8_lossy(data).to_string())
    }

    pub fn xml(&self, name: &str) -> Result<Element> {
        xml::parse(&self.part_str(name)?)
    }

    pub fn set_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    pub fn set_xml(&mut self, name: &str, root: &Element) {
        self.set_part(name, root.to_xml());
    }

    pub fn remove_part(&mut self, name: &str) {
        self.parts.retain(|(n, _)| n != name);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // Content types first, as Office expects
        let ordered = self
            .parts
            .iter()
            .filter(|(n, _)| n == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|(n, _)| n != CONTENT_TYPES_PART));
        for (name, data) in ordered {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    // ===== Relationships =====

    /// Relationships of `part` as `(id, type, resolved target)`
    pub fn relationships(&self, part: &str) -> Vec<Relationship> {
        let rels_name = rels_path(part);
        let Ok(root) = self.xml(&rels_name) else {
            return Vec::new();
        };
        let base = part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        root.children_named("Relationship")
            .map(|rel| {
                let target = rel.attr("Target").unwrap_or_default();
                let external = rel.attr("TargetMode") == Some("External");
                Relationship {
                    id: rel.attr("Id").unwrap_or_default().to_string(),
                    kind: rel.attr("Type").unwrap_or_default().to_string(),
                    target: if external { target.to_string() } else { resolve_target(base, target) },
                    external,
                }
            })
            .collect()
    }

    pub fn relationship_target(&self, part: &str, id: &str) -> Option<String> {
        self.relationships(part)
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.target)
    }

    /// Add a relationship from `part`, returning its new id
    pub fn add_relationship(&mut self, part: &str, kind: &str, target: &str) -> Result<String> {
        let rels_name = rels_path(part);
        let mut root = match self.xml(&rels_name) {
            Ok(root) => root,
            Err(_) => Element::new("Relationships").with_attr("xmlns", REL_NS),
        };
        let mut n = root.children_named("Relationship").count() + 1;
        let existing: Vec<String> = root
            .children_named("Relationship")
            .filter_map(|r| r.attr("Id").map(String::from))
            .collect();
        while existing.contains(&format!("rId{}", n)) {
            n += 1;
        }
        let id = format!("rId{}", n);
        root.push(
            Element::new("Relationship")
                .with_attr("Id", &id)
                .with_attr("Type", kind)
                .with_attr("Target", target),
        );
        self.set_xml(&rels_name, &root);
        Ok(id)
    }

    pub fn remove_relationship(&mut self, part: &str, id: &str) -> Result<()> {
        let rels_name = rels_path(part);
        let mut root = self.xml(&rels_name)?;
        root.children
            .retain(|n| !matches!(n, xml::Node::Element(e) if e.attr("Id") == Some(id)));
        self.set_xml(&rels_name, &root);
        Ok(())
    }

    // ===== Content types =====

    pub fn add_override(&mut self, part: &str, content_type: &str) -> Result<()> {
        let mut root = self.xml(CONTENT_TYPES_PART)?;
        let part_name = format!("/{}", part);
        let exists = root
            .children_named("Override")
            .any(|o| o.attr("PartName") == Some(part_name.as_str()));
        if !exists {
            root.push(
                Element::new("Override")
                    .with_attr("PartName", &part_name)
                    .with_attr("ContentType", content_type),
            );
            self.set_xml(CONTENT_TYPES_PART, &root);
        }
        Ok(())
    }

    pub fn remove_override(&mut self, part: &str) -> Result<()> {
        let mut root = self.xml(CONTENT_TYPES_PART)?;
        let part_name = format!("/{}", part);
        root.children.retain(
            |n| !matches!(n, xml::Node::Element(e) if e.attr("PartName") == Some(part_name.as_str())),
        );
        self.set_xml(CONTENT_TYPES_PART, &root);
        Ok(())
    }

    // ===== Core properties =====

    pub fn core_properties(&self) -> CoreProperties {
        self.xml(CORE_PART)
            .map(|root| CoreProperties::from_xml(&root))
            .unwrap_or_default()
    }

    /// Write core properties, registering the part when the package lacks it
    pub fn set_core_properties(&mut self, props: &CoreProperties) -> Result<()> {
        if !self.has(CORE_PART) {
            self.add_override(CORE_PART, CORE_CONTENT_TYPE)?;
            self.add_relationship("", CORE_REL_TYPE, CORE_PART)?;
        }
        self.set_part(CORE_PART, props.to_xml());
        Ok(())
    }

    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        let mut props = self.core_properties();
        props.set(key, value)?;
        self.set_core_properties(&props)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Last segment of the relationship type URI
    pub fn short_kind(&self) -> &str {
        self.kind.rsplit('/').next().unwrap_or(&self.kind)
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`; `""` -> `_rels/.rels`
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relative target against the directory of its source part
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Relationship target of `to` as seen from the part `from`
pub fn relative_target(from: &str, to: &str) -> String {
    let mut from_dir: Vec<&str> = from.split('/').collect();
    from_dir.pop();
    let to_parts: Vec<&str> = to.split('/').collect();
    let to_dir = &to_parts[..to_parts.len().saturating_sub(1)];
    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = "../".repeat(from_dir.len() - common);
    out.push_str(&to_parts[common..].join("/"));
    out
}

/// `docProps/core.xml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Property key, XML element
const CORE_FIELDS: [(&str, &str); 10] = [
    ("title", "dc:title"),
    ("subject", "dc:subject"),
    ("author", "dc:creator"),
    ("keywords", "cp:keywords"),
    ("comments", "dc:description"),
    ("last_modified_by", "cp:lastModifiedBy"),
    ("revision", "cp:revision"),
    ("category", "cp:category"),
    ("created", "dcterms:created"),
    ("modified", "dcterms:modified"),
];

impl CoreProperties {
    pub const KEYS: [&'static str; 10] = [
        "author",
        "title",
        "subject",
        "keywords",
        "category",
        "comments",
        "last_modified_by",
        "revision",
        "created",
        "modified",
    ];

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "author" => &mut self.author,
            "title" => &mut self.title,
            "subject" => &mut self.subject,
            "keywords" => &mut self.keywords,
            "category" => &mut self.category,
            "comments" => &mut self.comments,
            "last_modified_by" => &mut self.last_modified_by,
            "revision" => &mut self.revision,
            "created" => &mut self.created,
            "modified" => &mut self.modified,
            _ => return None,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "author" => self.author.as_deref(),
            "title" => self.title.as_deref(),
            "subject" => self.subject.as_deref(),
            "keywords" => self.keywords.as_deref(),
            "category" => self.category.as_deref(),
            "comments" => self.comments.as_deref(),
            "last_modified_by" => self.last_modified_by.as_deref(),
            "revision" => self.revision.as_deref(),
            "created" => self.created.as_deref(),
            "modified" => self.modified.as_deref(),
            _ => None,
        }
    }

    /// Set one property; unknown keys are `Invalid`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = self
            .slot(key)
            .ok_or_else(|| Error::Invalid(format!("unknown metadata key '{}'", key)))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    /// Apply the writable keys of a JSON `metadata` object
    pub fn merge_json(&mut self, value: &serde_json::Value) {
        let Some(map) = value.as_object() else {
            return;
        };
        for key in ["author", "title", "subject", "keywords", "category", "comments"] {
            if let Some(v) = map.get(key).and_then(|v| v.as_str()) {
                let _ = self.set(key, v);
            }
        }
    }

    pub fn from_xml(root: &Element) -> Self {
        let mut props = Self::default();
        for (key, element) in CORE_FIELDS {
            if let Some(el) = root.child(element) {
                let text = el.text().trim().to_string();
                if !text.is_empty() {
                    let _ = props.set(key, &text);
                }
            }
        }
        props
    }

    pub fn to_xml(&self) -> String {
        let mut root = Element::new("cp:coreProperties")
            .with_attr(
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            )
            .with_attr("xmlns:dc", "http://purl.org/dc/elements/1.1/")
            .with_attr("xmlns:dcterms", "http://purl.org/dc/terms/")
            .with_attr("xmlns:dcmitype", "http://purl.org/dc/dcmitype/")
            .with_attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
        for (key, element) in CORE_FIELDS {
            if let Some(value) = self.get(key) {
                let mut el = Element::new(element).with_text(value);
                if element.starts_with("dcterms:") {
                    el.set_attr("xsi:type", "dcterms:W3CDTF");
                }
                root.push(el);
            }
        }
        root.to_xml()
    }

    pub fn is_empty(&self) -> bool {
        Self::KEYS.iter().all(|k| self.get(k).is_none())
    }
}

/// Current time in the W3CDTF form used by `dcterms:*`
pub fn now_w3c() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_package() -> Package {
        let mut pkg = Package::new();
        pkg.set_part(
            CONTENT_TYPES_PART,
            r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        );
        pkg.set_part("word/document.xml", "<doc/>");
        pkg
    }

    #[test]
    fn test_rels_path_and_targets() {
        assert_eq!(rels_path("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path(""), "_rels/.rels");
        assert_eq!(resolve_target("ppt/slides", "../slideLayouts/slideLayout1.xml"), "ppt/slideLayouts/slideLayout1.xml");
        assert_eq!(resolve_target("word", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("ppt", "/ppt/slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(relative_target("ppt/slides/slide1.xml", "ppt/slideLayouts/slideLayout2.xml"), "../slideLayouts/slideLayout2.xml");
        assert_eq!(relative_target("ppt/presentation.xml", "ppt/slides/slide3.xml"), "slides/slide3.xml");
    }

    #[test]
    fn test_zip_round_trip_and_relationships() {
        let mut pkg = minimal_package();
        let id = pkg
            .add_relationship("word/document.xml", "http://x/image", "media/a.png")
            .unwrap();
        assert_eq!(id, "rId1");

        let reopened = Package::from_bytes(pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.names().next(), Some(CONTENT_TYPES_PART));
        let rels = reopened.relationships("word/document.xml");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target, "word/media/a.png");
        assert_eq!(rels[0].short_kind(), "image");
    }

    #[test]
    fn test_core_properties_registered_and_read_back() {
        let mut pkg = minimal_package();
        pkg.set_metadata("title", "Layout review").unwrap();
        pkg.set_metadata("author", "J. Silva").unwrap();
        assert!(matches!(pkg.set_metadata("colour", "red"), Err(Error::Invalid(_))));

        let props = pkg.core_properties();
        assert_eq!(props.title.as_deref(), Some("Layout review"));
        assert_eq!(props.author.as_deref(), Some("J. Silva"));
        assert!(pkg.part_str(CONTENT_TYPES_PART).unwrap().contains("/docProps/core.xml"));
        assert_eq!(pkg.relationships("")[0].target, CORE_PART);
    }
}
