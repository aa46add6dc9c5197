//! DOCX reading, creation and editing

use super::markdown::{self, gfm_table, inline_runs, runs_to_markdown, InlineRun, MdBlock};
use super::package::{now_w3c, CoreProperties, Package};
use super::xml::{Element, Node};
use super::{parse_slice, InputKind};
use crate::error::{Error, Result};
use docx_rs::{
    Docx, Paragraph, Run, RunFonts, Style, StyleType, Table, TableCell, TableRow,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// Paragraph styles registered on every created document: id, name, size in half-points
const BUILTIN_STYLES: [(&str, &str, usize); 10] = [
    ("Title", "Title", 56),
    ("Subtitle", "Subtitle", 30),
    ("Heading1", "Heading 1", 32),
    ("Heading2", "Heading 2", 26),
    ("Heading3", "Heading 3", 24),
    ("Heading4", "Heading 4", 22),
    ("Heading5", "Heading 5", 22),
    ("Heading6", "Heading 6", 22),
    ("ListBullet", "List Bullet", 0),
    ("ListNumber", "List Number", 0),
];

// ===== Model =====

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunInfo {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphBlock {
    pub text: String,
    pub style: String,
    pub runs: Vec<RunInfo>,
    pub alignment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(ParagraphBlock),
    Table(Vec<Vec<String>>),
}

impl Block {
    pub fn to_json(&self, with_styles: bool) -> Value {
        match self {
            Block::Paragraph(p) => {
                let mut value = json!({"type": "paragraph", "text": p.text, "style": p.style});
                if with_styles {
                    value["runs"] = json!(p.runs);
                    if let Some(alignment) = &p.alignment {
                        value["alignment"] = json!(alignment);
                    }
                }
                value
            }
            Block::Table(rows) => json!({"type": "table", "rows": rows}),
        }
    }

    pub fn to_markdown(&self) -> String {
        match self {
            Block::Paragraph(p) => paragraph_markdown(p),
            Block::Table(rows) => format!("\n{}\n", gfm_table(rows)),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.text.clone(),
            Block::Table(rows) => {
                let mut out: Vec<String> = rows.iter().map(|r| r.join("\t")).collect();
                out.push(String::new());
                out.join("\n")
            }
        }
    }
}

/// A parsed document: core properties plus body blocks in order
#[derive(Debug, Clone)]
pub struct DocxDocument {
    pub metadata: CoreProperties,
    pub blocks: Vec<Block>,
}

impl DocxDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let package = Package::open(path)?;
        Self::from_package(&package)
    }

    pub fn from_package(package: &Package) -> Result<Self> {
        let root = package.xml(DOCUMENT_PART)?;
        let styles = StyleNames::load(package);
        let blocks = match root.child("w:body") {
            Some(body) => body
                .elements()
                .filter_map(|el| match el.name.as_str() {
                    "w:p" => Some(Block::Paragraph(parse_paragraph(el, &styles))),
                    "w:tbl" => Some(Block::Table(parse_table(el))),
                    _ => None,
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(Self {
            metadata: package.core_properties(),
            blocks,
        })
    }

    /// Blocks selected by an `a:b` slice (0-based, end exclusive)
    pub fn select(&self, range: Option<&str>) -> Result<&[Block]> {
        let range = parse_slice(range, self.blocks.len(), false)?;
        Ok(&self.blocks[range])
    }
}

// ===== Reading =====

/// Style id to display name, from `word/styles.xml`
struct StyleNames(HashMap<String, String>);

impl StyleNames {
    fn load(package: &Package) -> Self {
        let mut names = HashMap::new();
        if let Ok(root) = package.xml(STYLES_PART) {
            for style in root.children_named("w:style") {
                let id = style.attr("w:styleId");
                let name = style.child("w:name").and_then(|n| n.attr("w:val"));
                if let (Some(id), Some(name)) = (id, name) {
                    names.insert(id.to_string(), display_style_name(name));
                }
            }
        }
        Self(names)
    }

    fn name(&self, id: Option<&str>) -> String {
        match id {
            None => "Normal".to_string(),
            Some(id) => self
                .0
                .get(id)
                .cloned()
                .unwrap_or_else(|| humanize_style_id(id)),
        }
    }
}

/// Built-in names are stored lowercase (`heading 1`); show them capitalised
fn display_style_name(name: &str) -> String {
    if name.chars().any(|c| c.is_uppercase()) {
        return name.to_string();
    }
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Heading1` -> `Heading 1`, `ListBullet` -> `List Bullet`
fn humanize_style_id(id: &str) -> String {
    let mut out = String::new();
    let mut prev: Option<char> = None;
    for c in id.chars() {
        if let Some(p) = prev {
            let boundary = (c.is_uppercase() && p.is_lowercase())
                || (c.is_ascii_digit() && !p.is_ascii_digit());
            if boundary {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn style_id_from_name(name: &str) -> String {
    name.split_whitespace().collect()
}

fn flag(props: &Element, name: &str) -> bool {
    props
        .child(name)
        .is_some_and(|el| !matches!(el.attr("w:val"), Some("0" | "false" | "off" | "none")))
}

fn parse_run(run: &Element) -> RunInfo {
    let mut text = String::new();
    for child in run.elements() {
        match child.name.as_str() {
            "w:t" => text.push_str(&child.text()),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            _ => {}
        }
    }
    let mut info = RunInfo {
        text,
        ..Default::default()
    };
    if let Some(props) = run.child("w:rPr") {
        info.bold = flag(props, "w:b");
        info.italic = flag(props, "w:i");
        info.underline = flag(props, "w:u");
        info.font = props
            .child("w:rFonts")
            .and_then(|f| f.attr("w:ascii").or_else(|| f.attr("w:hAnsi")))
            .map(String::from);
        info.size = props
            .child("w:sz")
            .and_then(|s| s.attr("w:val"))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|half_points| half_points / 2.0);
        info.color = props
            .child("w:color")
            .and_then(|c| c.attr("w:val"))
            .filter(|v| *v != "auto")
            .map(String::from);
    }
    info
}

/// Runs of a paragraph, including those nested in hyperlinks and insertions
fn collect_runs(el: &Element, out: &mut Vec<RunInfo>) {
    for child in el.elements() {
        match child.name.as_str() {
            "w:r" => out.push(parse_run(child)),
            "w:pPr" | "w:del" | "w:moveFrom" => {}
            _ => collect_runs(child, out),
        }
    }
}

fn parse_paragraph(p: &Element, styles: &StyleNames) -> ParagraphBlock {
    let props = p.child("w:pPr");
    let style_id = props
        .and_then(|pr| pr.child("w:pStyle"))
        .and_then(|s| s.attr("w:val"));
    let alignment = props
        .and_then(|pr| pr.child("w:jc"))
        .and_then(|jc| jc.attr("w:val"))
        .map(String::from);

    let mut runs = Vec::new();
    collect_runs(p, &mut runs);
    ParagraphBlock {
        text: runs.iter().map(|r| r.text.as_str()).collect(),
        style: styles.name(style_id),
        runs,
        alignment,
    }
}

fn paragraph_text(p: &Element) -> String {
    let mut runs = Vec::new();
    collect_runs(p, &mut runs);
    runs.into_iter().map(|r| r.text).collect()
}

fn parse_table(tbl: &Element) -> Vec<Vec<String>> {
    tbl.children_named("w:tr")
        .map(|tr| {
            tr.children_named("w:tc")
                .map(|tc| {
                    tc.children_named("w:p")
                        .map(paragraph_text)
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .collect()
        })
        .collect()
}

/// 1-9 for headings, `Title` counts as 1 and `Subtitle` as 2
fn heading_level(style: &str) -> usize {
    let lower = style.to_lowercase();
    if let Some(rest) = lower.strip_prefix("heading") {
        return rest.trim().parse::<usize>().unwrap_or(0);
    }
    match lower.as_str() {
        "title" => 1,
        "subtitle" => 2,
        _ => 0,
    }
}

fn paragraph_markdown(p: &ParagraphBlock) -> String {
    let text = runs_to_markdown(p.runs.iter().map(|r| (r.text.as_str(), r.bold, r.italic)));
    let level = heading_level(&p.style);
    if level > 0 {
        return format!("{} {}", "#".repeat(level), text);
    }
    let lower = p.style.to_lowercase();
    if lower.contains("list bullet") {
        format!("- {}", text)
    } else if lower.contains("list number") {
        format!("1. {}", text)
    } else {
        text
    }
}

pub fn render_markdown(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::to_markdown)
        .collect::<Vec<_>>()
        .join("\n")
}

// ===== Creation =====

fn styled_run(run: &InlineRun) -> Run {
    let mut r = Run::new().add_text(&run.text);
    if run.bold {
        r = r.bold();
    }
    if run.italic {
        r = r.italic();
    }
    r
}

fn markdown_paragraph(text: &str, style: Option<&str>) -> Paragraph {
    let mut p = Paragraph::new();
    if let Some(style) = style {
        p = p.style(style);
    }
    for run in inline_runs(text) {
        p = p.add_run(styled_run(&run));
    }
    p
}

fn text_table(rows: &[Vec<String>]) -> Table {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows = rows
        .iter()
        .map(|row| {
            let cells = (0..width)
                .map(|i| {
                    let text = row.get(i).map(String::as_str).unwrap_or_default();
                    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();
    Table::new(rows)
}

fn base_document() -> Docx {
    BUILTIN_STYLES
        .iter()
        .fold(Docx::new(), |docx, (id, name, size)| {
            let mut style = Style::new(*id, StyleType::Paragraph).name(*name);
            if *size > 0 {
                style = style.size(*size).bold();
            }
            docx.add_style(style)
        })
}

fn build_from_markdown(text: &str) -> Docx {
    markdown::parse_blocks(text)
        .into_iter()
        .fold(base_document(), |docx, block| match block {
            MdBlock::Heading { level, text } => {
                let style = format!("Heading{}", level.min(6));
                docx.add_paragraph(markdown_paragraph(&text, Some(&style)))
            }
            MdBlock::Table(rows) => docx.add_table(text_table(&rows)),
            MdBlock::Bullet { text, .. } => {
                docx.add_paragraph(markdown_paragraph(&text, Some("ListBullet")))
            }
            MdBlock::Numbered { text, .. } => {
                docx.add_paragraph(markdown_paragraph(&text, Some("ListNumber")))
            }
            MdBlock::Quote(text) | MdBlock::Paragraph(text) => {
                docx.add_paragraph(markdown_paragraph(&text, None))
            }
        })
}

fn json_run(value: &Value) -> Run {
    let text = value.get("text").and_then(Value::as_str).unwrap_or_default();
    let mut run = Run::new().add_text(text);
    let on = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(false);
    if on("bold") {
        run = run.bold();
    }
    if on("italic") {
        run = run.italic();
    }
    if on("underline") {
        run = run.underline("single");
    }
    if let Some(font) = value.get("font").and_then(Value::as_str) {
        run = run.fonts(RunFonts::new().ascii(font).hi_ansi(font));
    }
    if let Some(size) = value.get("size").and_then(Value::as_f64) {
        run = run.size((size * 2.0).round() as usize);
    }
    if let Some(color) = value.get("color").and_then(Value::as_str) {
        run = run.color(color.trim_start_matches('#'));
    }
    run
}

fn cell_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `{metadata, sections:[...]}` or a bare list of sections
fn build_from_json(data: &Value, props: &mut CoreProperties) -> Docx {
    let sections = match data {
        Value::Object(map) => {
            if let Some(meta) = map.get("metadata") {
                props.merge_json(meta);
            }
            map.get("sections").and_then(Value::as_array).cloned().unwrap_or_default()
        }
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    };

    sections.iter().fold(base_document(), |docx, section| {
        if !section.is_object() {
            return docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(cell_string(section))));
        }
        match section.get("type").and_then(Value::as_str).unwrap_or("paragraph") {
            "table" => {
                let rows: Vec<Vec<String>> = section
                    .get("rows")
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .map(|row| {
                                row.as_array()
                                    .map(|cells| cells.iter().map(cell_string).collect())
                                    .unwrap_or_default()
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                if rows.is_empty() {
                    docx
                } else {
                    docx.add_table(text_table(&rows))
                }
            }
            _ => {
                let mut p = Paragraph::new();
                if let Some(style) = section.get("style").and_then(Value::as_str) {
                    p = p.style(&style_id_from_name(style));
                }
                match section.get("runs").and_then(Value::as_array) {
                    Some(runs) => {
                        for run in runs {
                            p = p.add_run(json_run(run));
                        }
                    }
                    None => {
                        let text = section.get("text").and_then(Value::as_str).unwrap_or_default();
                        p = p.add_run(Run::new().add_text(text));
                    }
                }
                docx.add_paragraph(p)
            }
        }
    })
}

/// Build a document from markdown or JSON, optionally taking styles from a template
pub fn create(path: &Path, content: &str, kind: InputKind, template: Option<&Path>) -> Result<()> {
    let mut props = CoreProperties::default();
    let docx = match kind.resolve(content) {
        InputKind::Json => build_from_json(&serde_json::from_str(content)?, &mut props),
        _ => build_from_markdown(content),
    };

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| Error::Other(format!("failed to write DOCX: {}", e)))?;
    let mut package = Package::from_bytes(buffer.into_inner())?;

    if let Some(template) = template {
        let source = Package::open(template)?;
        for part in [STYLES_PART, "word/theme/theme1.xml", "word/numbering.xml"] {
            if let Some(data) = source.part(part) {
                if package.has(part) {
                    package.set_part(part, data.to_vec());
                }
            }
        }
    }

    let now = now_w3c();
    props.created.get_or_insert_with(|| now.clone());
    props.modified.get_or_insert(now);
    package.set_core_properties(&props)?;
    package.save(path)
}

// ===== Editing =====

#[derive(Debug, Clone, Default)]
pub struct DocxEdit {
    pub replace: Option<(String, String)>,
    pub replace_all: Option<(String, String)>,
    pub append: Option<String>,
    pub insert: Option<(usize, String)>,
    pub delete: Option<usize>,
    pub set_metadata: Option<(String, String)>,
}

fn text_paragraph(text: &str) -> Element {
    let mut t = Element::new("w:t").with_text(text);
    t.set_attr("xml:space", "preserve");
    Element::new("w:p").with_child(Element::new("w:r").with_child(t))
}

/// Replace inside one paragraph; returns the number of replacements
fn replace_in_paragraph(p: &mut Element, old: &str, new: &str, all: bool) -> usize {
    if old.is_empty() {
        return 0;
    }
    let limit = if all { usize::MAX } else { 1 };

    // Matches inside a single run keep that run's formatting
    let mut count = 0;
    p.for_each_descendant_mut("w:t", &mut |t| {
        if count >= limit {
            return;
        }
        let text = t.text();
        let hits = text.matches(old).count().min(limit - count);
        if hits > 0 {
            t.set_text(&text.replacen(old, new, hits));
            t.set_attr("xml:space", "preserve");
            count += hits;
        }
    });
    if count > 0 {
        return count;
    }

    // Matches spanning runs collapse into the first run
    let full: String = p.descendants("w:t").iter().map(|t| t.text()).collect();
    let hits = full.matches(old).count().min(limit);
    if hits == 0 {
        return 0;
    }
    let replaced = full.replacen(old, new, hits);
    let mut first = true;
    p.for_each_descendant_mut("w:t", &mut |t| {
        if first {
            t.set_text(&replaced);
            t.set_attr("xml:space", "preserve");
            first = false;
        } else {
            t.children.clear();
        }
    });
    hits
}

fn body_mut(root: &mut Element) -> Result<&mut Element> {
    root.child_mut("w:body")
        .ok_or_else(|| Error::Parse("document has no body".to_string()))
}

/// Insert before the trailing `w:sectPr`
fn append_block(body: &mut Element, block: Element) {
    let at = body
        .children
        .iter()
        .rposition(|n| matches!(n, Node::Element(e) if e.is("w:sectPr")))
        .unwrap_or(body.children.len());
    body.children.insert(at, Node::Element(block));
}

fn replace_text(body: &mut Element, old: &str, new: &str, all: bool) -> usize {
    let mut count = 0;
    for p in body.elements_mut().filter(|e| e.is("w:p")) {
        if !all && count > 0 {
            break;
        }
        count += replace_in_paragraph(p, old, new, all);
    }
    if all || count == 0 {
        for tbl in body.elements_mut().filter(|e| e.is("w:tbl")) {
            tbl.for_each_descendant_mut("w:p", &mut |p| {
                if all || count == 0 {
                    count += replace_in_paragraph(p, old, new, all);
                }
            });
        }
    }
    count
}

/// Apply edits in order and save; returns one message per action
pub fn edit(path: &Path, edits: &DocxEdit) -> Result<Vec<String>> {
    let mut package = Package::open(path)?;
    let mut root = package.xml(DOCUMENT_PART)?;
    let mut messages = Vec::new();

    {
        let body = body_mut(&mut root)?;

        for (pair, all) in [(&edits.replace, false), (&edits.replace_all, true)] {
            if let Some((old, new)) = pair {
                let count = replace_text(body, old, new, all);
                messages.push(format!("Replaced {} occurrence(s)", count));
            }
        }

        if let Some(text) = &edits.append {
            append_block(body, text_paragraph(text));
            messages.push("Appended paragraph".to_string());
        }

        if let Some((idx, text)) = &edits.insert {
            let positions = body.positions_of("w:p");
            match positions.get(*idx) {
                Some(&at) => body.children.insert(at, Node::Element(text_paragraph(text))),
                None => append_block(body, text_paragraph(text)),
            }
            messages.push(format!("Inserted paragraph at index {}", idx));
        }

        if let Some(idx) = edits.delete {
            let positions = body.positions_of("w:p");
            let at = *positions
                .get(idx)
                .ok_or_else(|| Error::Invalid(format!("paragraph index {} out of range", idx)))?;
            body.children.remove(at);
            messages.push(format!("Deleted paragraph at index {}", idx));
        }
    }
    package.set_xml(DOCUMENT_PART, &root);

    if let Some((key, value)) = &edits.set_metadata {
        package.set_metadata(key, value)?;
        messages.push(format!("Set metadata '{}' = '{}'", key, value));
    }

    package.save(path)?;
    Ok(messages)
}

// ===== Info =====

#[derive(Debug, Clone, Serialize)]
pub struct DocxInfo {
    pub file: String,
    pub metadata: CoreProperties,
    pub paragraphs: usize,
    pub tables: usize,
    pub images: usize,
    pub sections: usize,
    pub word_count: usize,
    pub styles_used: Vec<String>,
}

pub fn info(path: &Path) -> Result<DocxInfo> {
    let package = Package::open(path)?;
    let doc = DocxDocument::from_package(&package)?;
    let root = package.xml(DOCUMENT_PART)?;

    let paragraphs: Vec<&ParagraphBlock> = doc
        .blocks
        .iter()
        .filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
        .collect();
    let styles_used: BTreeSet<String> = paragraphs.iter().map(|p| p.style.clone()).collect();

    Ok(DocxInfo {
        file: path.display().to_string(),
        metadata: doc.metadata.clone(),
        paragraphs: paragraphs.len(),
        tables: doc.blocks.len() - paragraphs.len(),
        images: package
            .relationships(DOCUMENT_PART)
            .iter()
            .filter(|r| r.short_kind() == "image")
            .count(),
        sections: root.descendants("w:sectPr").len(),
        word_count: paragraphs.iter().map(|p| p.text.split_whitespace().count()).sum(),
        styles_used: styles_used.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_md(dir: &TempDir, md: &str) -> std::path::PathBuf {
        let path = dir.path().join("doc.docx");
        create(&path, md, InputKind::Markdown, None).unwrap();
        path
    }

    #[test]
    fn test_markdown_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = create_md(&dir, "# Heading\n\nParagraph text");

        let doc = DocxDocument::open(&path).unwrap();
        let md = render_markdown(&doc.blocks);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines, vec!["# Heading", "Paragraph text"]);
    }

    #[test]
    fn test_styles_lists_and_tables() {
        let dir = TempDir::new().unwrap();
        let path = create_md(
            &dir,
            "## Scope\n\n- **Press** line\n1. First\n\n| Item | Qty |\n|---|---|\n| Bolt | 4 |\n",
        );
        let doc = DocxDocument::open(&path).unwrap();
        assert_eq!(doc.blocks.len(), 4);

        match &doc.blocks[0] {
            Block::Paragraph(p) => assert_eq!(p.style, "Heading 2"),
            other => panic!("unexpected {:?}", other),
        }
        match &doc.blocks[1] {
            Block::Paragraph(p) => {
                assert_eq!(p.text, "Press line");
                assert!(p.runs[0].bold);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            doc.blocks[3],
            Block::Table(vec![
                vec!["Item".to_string(), "Qty".to_string()],
                vec!["Bolt".to_string(), "4".to_string()],
            ])
        );

        let md = render_markdown(&doc.blocks);
        assert!(md.contains("## Scope"));
        assert!(md.contains("- **Press** line"));
        assert!(md.contains("1. First"));
        assert!(md.contains("| Item | Qty |\n| --- | --- |\n| Bolt | 4 |"));

        assert_eq!(doc.select(Some("1:3")).unwrap().len(), 2);
        let json = doc.blocks[1].to_json(true);
        assert_eq!(json["runs"][0]["bold"], true);
        assert!(doc.blocks[1].to_json(false).get("runs").is_none());
    }

    #[test]
    fn test_create_from_json_with_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.docx");
        let input = r#"{"metadata": {"title": "Report", "author": "PMO"},
            "sections": [
                {"type": "paragraph", "style": "Heading 1", "text": "Summary"},
                {"type": "paragraph", "runs": [{"text": "Red", "italic": true, "size": 12, "color": "FF0000"}]},
                {"type": "table", "rows": [["a", 1], ["b", 2]]}
            ]}"#;
        create(&path, input, InputKind::Auto, None).unwrap();

        let doc = DocxDocument::open(&path).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Report"));
        assert!(doc.metadata.created.is_some());
        match &doc.blocks[1] {
            Block::Paragraph(p) => {
                assert!(p.runs[0].italic);
                assert_eq!(p.runs[0].size, Some(12.0));
                assert_eq!(p.runs[0].color.as_deref(), Some("FF0000"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            doc.blocks[2],
            Block::Table(vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["b".to_string(), "2".to_string()],
            ])
        );
    }

    #[test]
    fn test_edit_operations() {
        let dir = TempDir::new().unwrap();
        let path = create_md(&dir, "First draft\n\nSecond draft\n\nThird");

        let messages = edit(
            &path,
            &DocxEdit {
                replace_all: Some(("draft".into(), "final".into())),
                append: Some("Appendix".into()),
                insert: Some((0, "Preface".into())),
                delete: Some(3),
                set_metadata: Some(("subject".into(), "Layout".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(messages[0], "Replaced 2 occurrence(s)");

        let doc = DocxDocument::open(&path).unwrap();
        let texts: Vec<String> = doc.blocks.iter().map(Block::to_text).collect();
        assert_eq!(texts, vec!["Preface", "First final", "Second final", "Appendix"]);
        assert_eq!(doc.metadata.subject.as_deref(), Some("Layout"));
    }

    #[test]
    fn test_edit_rejects_bad_index_and_key() {
        let dir = TempDir::new().unwrap();
        let path = create_md(&dir, "Only");
        let err = edit(&path, &DocxEdit { delete: Some(5), ..Default::default() }).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let err = edit(
            &path,
            &DocxEdit {
                set_metadata: Some(("colour".into(), "x".into())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn test_info_counts() {
        let dir = TempDir::new().unwrap();
        let path = create_md(&dir, "# Title here\n\nfour words in here\n\n| a |\n");
        let info = info(&path).unwrap();
        assert_eq!(info.paragraphs, 2);
        assert_eq!(info.tables, 1);
        assert_eq!(info.word_count, 6);
        assert_eq!(info.styles_used, vec!["Heading 1", "Normal"]);
        assert_eq!(info.images, 0);
    }

    #[test]
    fn test_style_names() {
        assert_eq!(humanize_style_id("Heading1"), "Heading 1");
        assert_eq!(humanize_style_id("ListBullet"), "List Bullet");
        assert_eq!(display_style_name("heading 2"), "Heading 2");
        assert_eq!(heading_level("Title"), 1);
        assert_eq!(heading_level("Heading 3"), 3);
        assert_eq!(heading_level("Normal"), 0);
    }
}
