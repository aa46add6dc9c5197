//! PPTX reading, creation and editing

use super::markdown::{gfm_table, inline_runs, parse_table, runs_to_markdown};
use super::package::{now_w3c, relative_target, CoreProperties, Package};
use super::pptx_template::{
    self, namespaces, pml_content_type, rel_type, Rect, GROUP_HEADER, LAYOUT_NAMES,
};
use super::xml::{self, Element, Node};
use super::{parse_slice, InputKind};
use crate::error::{Error, Result};
use quick_xml::escape::escape;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const EMU_PER_INCH: f64 = 914_400.0;

/// Text box used when a layout has no body placeholder
const TEXT_BOX_RECT: Rect = Rect::new(457_200, 1_645_920, 8_229_600, 4_572_000);
const TABLE_LEFT: i64 = 457_200;
const TABLE_TOP: i64 = 1_828_800;
const TABLE_WIDTH: i64 = 8_229_600;
const TABLE_ROW_HEIGHT: i64 = 731_520;

// ===== Model =====

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Position {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TextRun {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    /// Points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TextParagraph {
    pub text: String,
    pub level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableData {
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub col_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShapeInfo {
    pub shape_id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<TextParagraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,
}

impl ShapeInfo {
    pub fn is_title(&self) -> bool {
        matches!(self.placeholder.as_deref(), Some("title" | "ctrTitle"))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlideInfo {
    pub slide_number: usize,
    pub layout: String,
    pub shapes: Vec<ShapeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SlideInfo {
    pub fn to_json(&self, with_styles: bool) -> Value {
        let mut slide = self.clone();
        if !with_styles {
            for shape in &mut slide.shapes {
                shape.paragraphs.clear();
            }
        }
        serde_json::to_value(slide).unwrap_or(Value::Null)
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("## Slide {} — {}", self.slide_number, self.layout), String::new()];
        for shape in &self.shapes {
            if !shape.paragraphs.is_empty() {
                for para in &shape.paragraphs {
                    let text =
                        runs_to_markdown(para.runs.iter().map(|r| (r.text.as_str(), r.bold, r.italic)));
                    if text.trim().is_empty() {
                        continue;
                    }
                    if shape.is_title() {
                        lines.push(format!("### {}", text));
                    } else if para.level > 0 {
                        lines.push(format!("{}- {}", "  ".repeat(para.level), text));
                    } else {
                        lines.push(text);
                    }
                }
                lines.push(String::new());
            }
            if let Some(table) = &shape.table {
                lines.push(gfm_table(&table.rows));
                lines.push(String::new());
            }
        }
        if let Some(notes) = self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            lines.push(format!("> **Notes:** {}", notes));
            lines.push(String::new());
        }
        lines.join("\n")
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![format!("--- Slide {} ({}) ---", self.slide_number, self.layout)];
        for shape in &self.shapes {
            if let Some(text) = shape.text.as_deref().filter(|t| !t.trim().is_empty()) {
                lines.push(text.to_string());
            }
            if let Some(table) = &shape.table {
                lines.extend(table.rows.iter().map(|r| r.join("\t")));
            }
        }
        if let Some(notes) = &self.notes {
            lines.push(format!("[Notes: {}]", notes));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Body line of a slide being built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyParagraph {
    pub text: String,
    pub level: usize,
    pub bold: bool,
}

impl BodyParagraph {
    pub fn new(text: &str, level: usize) -> Self {
        Self {
            text: text.to_string(),
            level,
            bold: false,
        }
    }
}

/// Content of a slide to add
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideSpec {
    /// Layout name, alias or index
    pub layout: String,
    pub title: Option<String>,
    pub body: Vec<BodyParagraph>,
    pub table: Option<Vec<Vec<String>>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct PlaceholderRef {
    kind: Option<String>,
    idx: Option<String>,
    rect: Option<Rect>,
}

impl PlaceholderRef {
    fn ph_xml(&self) -> String {
        let mut ph = String::from("<p:ph");
        if let Some(kind) = &self.kind {
            ph.push_str(&format!(r#" type="{}""#, kind));
        }
        if let Some(idx) = &self.idx {
            ph.push_str(&format!(r#" idx="{}""#, idx));
        }
        ph.push_str("/>");
        ph
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutInfo {
    pub part: String,
    pub name: String,
    title: Option<PlaceholderRef>,
    body: Option<PlaceholderRef>,
}

struct SlideRef {
    rid: String,
    part: String,
}

// ===== XML helpers =====

fn read_rect(xfrm: &Element) -> Option<Rect> {
    let off = xfrm.child("a:off")?;
    let ext = xfrm.child("a:ext")?;
    let num = |el: &Element, key: &str| el.attr(key).and_then(|v| v.parse::<i64>().ok());
    Some(Rect::new(
        num(off, "x")?,
        num(off, "y")?,
        num(ext, "cx")?,
        num(ext, "cy")?,
    ))
}

fn placeholder_of(shape: &Element) -> Option<&Element> {
    shape
        .elements()
        .find(|e| e.name.starts_with("p:nv"))
        .and_then(|nv| nv.child("p:nvPr"))
        .and_then(|nv| nv.child("p:ph"))
}

fn parse_text_run(run: &Element) -> TextRun {
    let mut out = TextRun {
        text: run.child("a:t").map(|t| t.text()).unwrap_or_default(),
        ..Default::default()
    };
    if let Some(props) = run.child("a:rPr") {
        let on = |key: &str| matches!(props.attr(key), Some("1" | "true"));
        out.bold = on("b");
        out.italic = on("i");
        out.underline = props.attr("u").is_some_and(|u| u != "none");
        out.size = props
            .attr("sz")
            .and_then(|s| s.parse::<f64>().ok())
            .map(|hundredths| hundredths / 100.0);
        out.font = props
            .child("a:latin")
            .and_then(|l| l.attr("typeface"))
            .map(String::from);
        out.color = props
            .path(&["a:solidFill", "a:srgbClr"])
            .and_then(|c| c.attr("val"))
            .map(String::from);
    }
    out
}

fn parse_text_paragraph(p: &Element) -> TextParagraph {
    let props = p.child("a:pPr");
    let mut runs = Vec::new();
    for child in p.elements() {
        match child.name.as_str() {
            "a:r" | "a:fld" => runs.push(parse_text_run(child)),
            "a:br" => runs.push(TextRun {
                text: "\n".to_string(),
                ..Default::default()
            }),
            _ => {}
        }
    }
    TextParagraph {
        text: runs.iter().map(|r| r.text.as_str()).collect(),
        level: props
            .and_then(|pr| pr.attr("lvl"))
            .and_then(|l| l.parse().ok())
            .unwrap_or(0),
        alignment: props.and_then(|pr| pr.attr("algn")).map(String::from),
        runs,
    }
}

fn text_body_paragraphs(body: &Element) -> Vec<TextParagraph> {
    body.children_named("a:p").map(parse_text_paragraph).collect()
}

fn parse_drawing_table(tbl: &Element) -> TableData {
    let rows: Vec<Vec<String>> = tbl
        .children_named("a:tr")
        .map(|tr| {
            tr.children_named("a:tc")
                .map(|tc| {
                    tc.child("p:txBody")
                        .or_else(|| tc.child("a:txBody"))
                        .map(|body| {
                            text_body_paragraphs(body)
                                .into_iter()
                                .map(|p| p.text)
                                .collect::<Vec<_>>()
                                .join("\n")
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    let col_count = tbl
        .child("a:tblGrid")
        .map(|g| g.children_named("a:gridCol").count())
        .unwrap_or_else(|| rows.first().map(Vec::len).unwrap_or(0));
    TableData {
        row_count: rows.len(),
        col_count,
        rows,
    }
}

fn parse_shape(shape: &Element) -> Option<ShapeInfo> {
    let kind = match shape.name.as_str() {
        "p:sp" => "auto_shape",
        "p:pic" => "picture",
        "p:graphicFrame" => "graphic_frame",
        "p:grpSp" => "group",
        "p:cxnSp" => "connector",
        _ => return None,
    };
    let nv = shape.elements().find(|e| e.name.starts_with("p:nv"))?;
    let c_nv_pr = nv.child("p:cNvPr");
    let shape_id = c_nv_pr
        .and_then(|c| c.attr("id"))
        .and_then(|id| id.parse().ok())
        .unwrap_or(0);
    let name = c_nv_pr
        .and_then(|c| c.attr("name"))
        .unwrap_or_default()
        .to_string();

    let xfrm = shape
        .path(&["p:spPr", "a:xfrm"])
        .or_else(|| shape.child("p:xfrm"))
        .or_else(|| shape.path(&["p:grpSpPr", "a:xfrm"]));
    let position = xfrm.and_then(read_rect).map(|r| Position {
        left: r.x,
        top: r.y,
        width: r.cx,
        height: r.cy,
    });

    let placeholder = placeholder_of(shape).map(|ph| {
        ph.attr("type")
            .unwrap_or(if ph.attr("idx").is_some() { "body" } else { "obj" })
            .to_string()
    });
    let text_box = nv
        .child("p:cNvSpPr")
        .is_some_and(|c| c.attr("txBox") == Some("1"));

    let paragraphs = shape
        .child("p:txBody")
        .map(text_body_paragraphs)
        .unwrap_or_default();
    let text = shape.child("p:txBody").map(|_| {
        paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    });
    let table = shape.descendants("a:tbl").first().map(|tbl| parse_drawing_table(tbl));

    let kind = if table.is_some() {
        "table"
    } else if placeholder.is_some() {
        "placeholder"
    } else if text_box {
        "text_box"
    } else {
        kind
    };

    Some(ShapeInfo {
        shape_id,
        name,
        kind: kind.to_string(),
        placeholder,
        position,
        text,
        paragraphs,
        table,
    })
}

fn slide_number_of(part: &str, prefix: &str) -> Option<usize> {
    part.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()
}

fn escaped(text: &str) -> String {
    escape(text).to_string()
}

fn runs_xml(text: &str, force_bold: bool) -> String {
    inline_runs(text)
        .iter()
        .map(|run| {
            let mut attrs = String::from(r#" lang="en-US""#);
            if run.bold || force_bold {
                attrs.push_str(r#" b="1""#);
            }
            if run.italic {
                attrs.push_str(r#" i="1""#);
            }
            format!(r#"<a:r><a:rPr{} dirty="0"/><a:t>{}</a:t></a:r>"#, attrs, escaped(&run.text))
        })
        .collect()
}

fn paragraph_xml(p: &BodyParagraph) -> String {
    let props = if p.level > 0 {
        format!(r#"<a:pPr lvl="{}"/>"#, p.level)
    } else {
        String::new()
    };
    if p.text.is_empty() {
        return format!(r#"<a:p>{}<a:endParaRPr lang="en-US"/></a:p>"#, props);
    }
    format!("<a:p>{}{}</a:p>", props, runs_xml(&p.text, p.bold))
}

fn paragraphs_xml(paragraphs: &[BodyParagraph]) -> String {
    if paragraphs.is_empty() {
        return r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string();
    }
    paragraphs.iter().map(paragraph_xml).collect()
}

fn text_shape_xml(
    id: u32,
    name: &str,
    placeholder: Option<&PlaceholderRef>,
    rect: Option<Rect>,
    paragraphs: &[BodyParagraph],
) -> String {
    let (c_nv_sp_pr, nv_pr, geometry, body_pr) = match placeholder {
        Some(ph) => (
            r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#.to_string(),
            format!("<p:nvPr>{}</p:nvPr>", ph.ph_xml()),
            String::new(),
            "<a:bodyPr/>",
        ),
        None => (
            r#"<p:cNvSpPr txBox="1"/>"#.to_string(),
            "<p:nvPr/>".to_string(),
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/>"#.to_string(),
            r#"<a:bodyPr wrap="square"/>"#,
        ),
    };
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/>{c_nv_sp_pr}{nv_pr}</p:nvSpPr>"#,
            r#"<p:spPr>{xfrm}{geometry}</p:spPr><p:txBody>{body_pr}<a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
        ),
        id = id,
        name = name,
        c_nv_sp_pr = c_nv_sp_pr,
        nv_pr = nv_pr,
        xfrm = rect.map(|r| r.xfrm()).unwrap_or_default(),
        geometry = geometry,
        body_pr = body_pr,
        paragraphs = paragraphs_xml(paragraphs)
    )
}

fn table_xml(id: u32, rows: &[Vec<String>]) -> String {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let col_width = TABLE_WIDTH / cols as i64;
    let grid: String = (0..cols)
        .map(|_| format!(r#"<a:gridCol w="{}"/>"#, col_width))
        .collect();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = (0..cols)
                .map(|c| {
                    let text = row.get(c).map(String::as_str).unwrap_or_default();
                    let para = if text.is_empty() {
                        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
                    } else {
                        format!(r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#, escaped(text))
                    };
                    format!("<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>", para)
                })
                .collect();
            format!(r#"<a:tr h="{}">{}</a:tr>"#, TABLE_ROW_HEIGHT / 2, cells)
        })
        .collect();
    let frame = Rect::new(TABLE_LEFT, TABLE_TOP, TABLE_WIDTH, TABLE_ROW_HEIGHT * rows.len() as i64);
    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/>"#,
            r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
            r#"<p:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></p:xfrm>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
            r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl>"#,
            r#"</a:graphicData></a:graphic></p:graphicFrame>"#
        ),
        id = id,
        x = frame.x,
        y = frame.y,
        cx = frame.cx,
        cy = frame.cy,
        grid = grid,
        body = body
    )
}

fn slide_xml(layout: &LayoutInfo, spec: &SlideSpec) -> String {
    let mut shapes = String::new();
    let mut next_id = 2u32;

    if let (Some(title), Some(ph)) = (&spec.title, &layout.title) {
        shapes.push_str(&text_shape_xml(
            next_id,
            &format!("Title {}", next_id - 1),
            Some(ph),
            ph.rect,
            &[BodyParagraph::new(title, 0)],
        ));
        next_id += 1;
    }

    if !spec.body.is_empty() {
        match &layout.body {
            Some(ph) => shapes.push_str(&text_shape_xml(
                next_id,
                &format!("Content Placeholder {}", next_id - 1),
                Some(ph),
                ph.rect,
                &spec.body,
            )),
            None => shapes.push_str(&text_shape_xml(
                next_id,
                &format!("TextBox {}", next_id - 1),
                None,
                Some(TEXT_BOX_RECT),
                &spec.body,
            )),
        }
        next_id += 1;
    }

    if let Some(rows) = spec.table.as_ref().filter(|rows| !rows.is_empty()) {
        shapes.push_str(&table_xml(next_id, rows));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sld {ns}><p:cSld><p:spTree>{group}{shapes}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        ),
        ns = namespaces(),
        group = GROUP_HEADER,
        shapes = shapes
    )
}

fn notes_paragraphs(text: &str) -> Vec<BodyParagraph> {
    text.lines().map(|line| BodyParagraph::new(line, 0)).collect()
}

fn notes_xml(text: &str) -> String {
    let image = r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#;
    let body = PlaceholderRef {
        kind: Some("body".to_string()),
        idx: Some("1".to_string()),
        rect: None,
    };
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:notes {ns}><p:cSld><p:spTree>{group}{image}{body}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
        ),
        ns = namespaces(),
        group = GROUP_HEADER,
        image = image,
        body = text_shape_xml(3, "Notes Placeholder 2", Some(&body), None, &notes_paragraphs(text))
    )
}

fn parse_layout(package: &Package, part: &str) -> Option<LayoutInfo> {
    let root = package.xml(part).ok()?;
    let c_sld = root.child("p:cSld")?;
    let name = c_sld.attr("name").unwrap_or("Untitled").to_string();

    let mut title = None;
    let mut body: Option<PlaceholderRef> = None;
    if let Some(tree) = c_sld.child("p:spTree") {
        for sp in tree.children_named("p:sp") {
            let Some(ph) = placeholder_of(sp) else {
                continue;
            };
            let reference = PlaceholderRef {
                kind: ph.attr("type").map(String::from),
                idx: ph.attr("idx").map(String::from),
                rect: sp.path(&["p:spPr", "a:xfrm"]).and_then(read_rect),
            };
            match reference.kind.as_deref() {
                Some("title" | "ctrTitle") => title = Some(reference),
                None | Some("body" | "subTitle" | "obj") => {
                    let primary = reference.idx.as_deref() == Some("1");
                    if body.is_none() || primary {
                        body = Some(reference);
                    }
                }
                _ => {}
            }
        }
    }
    Some(LayoutInfo {
        part: part.to_string(),
        name,
        title,
        body,
    })
}

fn layout_alias(reference: &str) -> Option<&'static str> {
    Some(match reference {
        "title" | "title_slide" => LAYOUT_NAMES[0],
        "title_and_content" | "content" => LAYOUT_NAMES[1],
        "section" | "section_header" => LAYOUT_NAMES[2],
        "title_only" => LAYOUT_NAMES[3],
        "blank" => LAYOUT_NAMES[4],
        _ => return None,
    })
}

// ===== Presentation =====

pub struct Presentation {
    pub package: Package,
}

impl Presentation {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            package: Package::open(path)?,
        })
    }

    pub fn blank() -> Result<Self> {
        Ok(Self {
            package: pptx_template::blank_presentation()?,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.package.save(path)
    }

    pub fn metadata(&self) -> CoreProperties {
        self.package.core_properties()
    }

    /// Slide size in EMU
    pub fn slide_size(&self) -> (i64, i64) {
        self.package
            .xml(PRESENTATION_PART)
            .ok()
            .and_then(|root| {
                let size = root.child("p:sldSz")?;
                Some((size.attr("cx")?.parse().ok()?, size.attr("cy")?.parse().ok()?))
            })
            .unwrap_or((pptx_template::SLIDE_WIDTH, pptx_template::SLIDE_HEIGHT))
    }

    fn slide_refs(&self) -> Result<Vec<SlideRef>> {
        let root = self.package.xml(PRESENTATION_PART)?;
        let rels = self.package.relationships(PRESENTATION_PART);
        let Some(list) = root.child("p:sldIdLst") else {
            return Ok(Vec::new());
        };
        Ok(list
            .children_named("p:sldId")
            .filter_map(|s| {
                let rid = s.attr("r:id")?;
                let rel = rels.iter().find(|r| r.id == rid)?;
                Some(SlideRef {
                    rid: rid.to_string(),
                    part: rel.target.clone(),
                })
            })
            .collect())
    }

    pub fn slide_count(&self) -> Result<usize> {
        Ok(self.slide_refs()?.len())
    }

    fn slide_ref(&self, number: usize) -> Result<SlideRef> {
        let mut refs = self.slide_refs()?;
        let count = refs.len();
        if number == 0 || number > count {
            return Err(Error::Invalid(format!(
                "slide {} out of range (1-{})",
                number, count
            )));
        }
        Ok(refs.swap_remove(number - 1))
    }

    /// Layouts of every slide master, in master order
    pub fn layouts(&self) -> Vec<LayoutInfo> {
        self.package
            .relationships(PRESENTATION_PART)
            .iter()
            .filter(|r| r.short_kind() == "slideMaster")
            .flat_map(|master| self.package.relationships(&master.target))
            .filter(|r| r.short_kind() == "slideLayout")
            .filter_map(|r| parse_layout(&self.package, &r.target))
            .collect()
    }

    /// By name, alias (`title`, `content`, `blank`...) or index
    pub fn find_layout(&self, reference: &str) -> Result<LayoutInfo> {
        let layouts = self.layouts();
        if layouts.is_empty() {
            return Err(Error::Invalid("presentation has no slide layouts".to_string()));
        }
        let by_name = |name: &str| layouts.iter().find(|l| l.name.eq_ignore_ascii_case(name)).cloned();

        if let Ok(index) = reference.trim().parse::<usize>() {
            if let Some(layout) = layouts.get(index) {
                return Ok(layout.clone());
            }
        }
        if let Some(layout) = by_name(reference.trim()) {
            return Ok(layout);
        }
        let normalized = reference.trim().to_lowercase().replace(' ', "_");
        if let Some(layout) = layout_alias(&normalized).and_then(by_name) {
            return Ok(layout);
        }
        Ok(by_name(LAYOUT_NAMES[1]).unwrap_or_else(|| layouts[layouts.len().min(2) - 1].clone()))
    }

    fn layout_name_of(&self, slide_part: &str) -> String {
        self.package
            .relationships(slide_part)
            .iter()
            .find(|r| r.short_kind() == "slideLayout")
            .and_then(|r| parse_layout(&self.package, &r.target))
            .map(|l| l.name)
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn notes_part_of(&self, slide_part: &str) -> Option<String> {
        self.package
            .relationships(slide_part)
            .into_iter()
            .find(|r| r.short_kind() == "notesSlide")
            .map(|r| r.target)
    }

    fn notes_text(&self, slide_part: &str) -> Option<String> {
        let part = self.notes_part_of(slide_part)?;
        let root = self.package.xml(&part).ok()?;
        root.descendants("p:sp")
            .into_iter()
            .find(|sp| placeholder_of(sp).and_then(|ph| ph.attr("type")) == Some("body"))
            .and_then(|sp| sp.child("p:txBody"))
            .map(|body| {
                text_body_paragraphs(body)
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|text| !text.trim().is_empty())
    }

    pub fn slides(&self) -> Result<Vec<SlideInfo>> {
        self.slide_refs()?
            .iter()
            .enumerate()
            .map(|(i, slide)| {
                let root = self.package.xml(&slide.part)?;
                let shapes = root
                    .path(&["p:cSld", "p:spTree"])
                    .map(|tree| tree.elements().filter_map(parse_shape).collect())
                    .unwrap_or_default();
                Ok(SlideInfo {
                    slide_number: i + 1,
                    layout: self.layout_name_of(&slide.part),
                    shapes,
                    notes: self.notes_text(&slide.part),
                })
            })
            .collect()
    }

    fn next_part_number(&self, prefix: &str) -> usize {
        self.package
            .names()
            .filter_map(|n| slide_number_of(n, prefix))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Append a slide; returns its 1-based number
    pub fn add_slide(&mut self, spec: &SlideSpec) -> Result<usize> {
        let layout = self.find_layout(&spec.layout)?;
        let n = self.next_part_number("ppt/slides/slide");
        let part = format!("ppt/slides/slide{}.xml", n);

        self.package.set_part(&part, slide_xml(&layout, spec));
        self.package.add_override(&part, &pml_content_type("slide"))?;
        self.package.add_relationship(
            &part,
            &rel_type("slideLayout"),
            &relative_target(&part, &layout.part),
        )?;
        let rid = self.package.add_relationship(
            PRESENTATION_PART,
            &rel_type("slide"),
            &relative_target(PRESENTATION_PART, &part),
        )?;

        let mut root = self.package.xml(PRESENTATION_PART)?;
        if root.child("p:sldIdLst").is_none() {
            let at = ["p:handoutMasterIdLst", "p:notesMasterIdLst", "p:sldMasterIdLst"]
                .iter()
                .find_map(|name| root.positions_of(name).first().copied())
                .map(|i| i + 1)
                .unwrap_or(0);
            root.children.insert(at, Node::Element(Element::new("p:sldIdLst")));
        }
        let list = root
            .child_mut("p:sldIdLst")
            .ok_or_else(|| Error::Parse("presentation has no slide list".to_string()))?;
        let next_id = list
            .children_named("p:sldId")
            .filter_map(|s| s.attr("id").and_then(|id| id.parse::<u32>().ok()))
            .max()
            .map(|max| max + 1)
            .unwrap_or(256)
            .max(256);
        list.push(
            Element::new("p:sldId")
                .with_attr("id", &next_id.to_string())
                .with_attr("r:id", &rid),
        );
        let number = list.children_named("p:sldId").count();
        self.package.set_xml(PRESENTATION_PART, &root);

        if let Some(notes) = spec.notes.as_deref().filter(|n| !n.is_empty()) {
            self.set_notes_on_part(&part, notes)?;
        }
        Ok(number)
    }

    pub fn delete_slide(&mut self, number: usize) -> Result<()> {
        let slide = self.slide_ref(number)?;

        let mut root = self.package.xml(PRESENTATION_PART)?;
        if let Some(list) = root.child_mut("p:sldIdLst") {
            list.children
                .retain(|n| !matches!(n, Node::Element(e) if e.attr("r:id") == Some(slide.rid.as_str())));
        }
        self.package.set_xml(PRESENTATION_PART, &root);
        self.package.remove_relationship(PRESENTATION_PART, &slide.rid)?;

        if let Some(notes) = self.notes_part_of(&slide.part) {
            self.remove_part_with_rels(&notes)?;
        }
        self.remove_part_with_rels(&slide.part)
    }

    fn remove_part_with_rels(&mut self, part: &str) -> Result<()> {
        self.package.remove_part(part);
        self.package.remove_part(&super::package::rels_path(part));
        self.package.remove_override(part)
    }

    pub fn set_notes(&mut self, number: usize, text: &str) -> Result<()> {
        let slide = self.slide_ref(number)?;
        self.set_notes_on_part(&slide.part, text)
    }

    fn notes_master_part(&mut self) -> Result<String> {
        if let Some(rel) = self
            .package
            .relationships(PRESENTATION_PART)
            .into_iter()
            .find(|r| r.short_kind() == "notesMaster")
        {
            return Ok(rel.target);
        }
        let part = pptx_template::add_notes_master(&mut self.package)?;
        let rid = self.package.add_relationship(
            PRESENTATION_PART,
            &rel_type("notesMaster"),
            &relative_target(PRESENTATION_PART, &part),
        )?;
        let mut root = self.package.xml(PRESENTATION_PART)?;
        pptx_template::insert_notes_master_id(&mut root, &rid);
        self.package.set_xml(PRESENTATION_PART, &root);
        Ok(part)
    }

    fn set_notes_on_part(&mut self, slide_part: &str, text: &str) -> Result<()> {
        if let Some(notes_part) = self.notes_part_of(slide_part) {
            let mut root = self.package.xml(&notes_part)?;
            let body_xml = format!(
                "<p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody>",
                paragraphs_xml(&notes_paragraphs(text))
            );
            let new_body = xml::parse(&body_xml)?;
            let mut replaced = false;
            root.for_each_descendant_mut("p:sp", &mut |sp| {
                if replaced || placeholder_of(sp).and_then(|ph| ph.attr("type")) != Some("body") {
                    return;
                }
                sp.remove_children("p:txBody");
                sp.push(new_body.clone());
                replaced = true;
            });
            if replaced {
                self.package.set_xml(&notes_part, &root);
            } else {
                self.package.set_part(&notes_part, notes_xml(text));
            }
            return Ok(());
        }

        let master = self.notes_master_part()?;
        let n = self.next_part_number("ppt/notesSlides/notesSlide");
        let part = format!("ppt/notesSlides/notesSlide{}.xml", n);
        self.package.set_part(&part, notes_xml(text));
        self.package.add_override(&part, &pml_content_type("notesSlide"))?;
        self.package
            .add_relationship(&part, &rel_type("notesMaster"), &relative_target(&part, &master))?;
        self.package
            .add_relationship(&part, &rel_type("slide"), &relative_target(&part, slide_part))?;
        self.package.add_relationship(
            slide_part,
            &rel_type("notesSlide"),
            &relative_target(slide_part, &part),
        )?;
        Ok(())
    }

    /// Replace text in runs across all slides; returns the replacement count
    pub fn replace_text(&mut self, old: &str, new: &str, all: bool) -> Result<usize> {
        if old.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for slide in self.slide_refs()? {
            let mut root = self.package.xml(&slide.part)?;
            let before = count;
            root.for_each_descendant_mut("a:t", &mut |t| {
                if !all && count > 0 {
                    return;
                }
                let text = t.text();
                let hits = text.matches(old).count();
                if hits > 0 {
                    let hits = if all { hits } else { 1 };
                    t.set_text(&text.replacen(old, new, hits));
                    count += hits;
                }
            });
            if count > before {
                self.package.set_xml(&slide.part, &root);
            }
            if !all && count > 0 {
                break;
            }
        }
        Ok(count)
    }
}

// ===== Reading =====

#[derive(Debug, Clone, Serialize)]
pub struct PptxDocument {
    pub metadata: CoreProperties,
    pub slide_count: usize,
    pub slide_width: i64,
    pub slide_height: i64,
    pub slides: Vec<SlideInfo>,
}

impl PptxDocument {
    pub fn open(path: &Path, range: Option<&str>) -> Result<Self> {
        let presentation = Presentation::open(path)?;
        let mut slides = presentation.slides()?;
        let slide_count = slides.len();
        let range = parse_slice(range, slide_count, true)?;
        slides = slides.drain(range).collect();
        let (slide_width, slide_height) = presentation.slide_size();
        Ok(Self {
            metadata: presentation.metadata(),
            slide_count,
            slide_width,
            slide_height,
            slides,
        })
    }

    pub fn to_json(&self, with_styles: bool) -> Value {
        json!({
            "metadata": self.metadata,
            "slide_count": self.slide_count,
            "slide_width": self.slide_width,
            "slide_height": self.slide_height,
            "slides": self.slides.iter().map(|s| s.to_json(with_styles)).collect::<Vec<_>>(),
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &self.metadata.title {
            parts.push(format!("# {}\n", title));
        }
        parts.extend(self.slides.iter().map(SlideInfo::to_markdown));
        parts.join("\n")
    }

    pub fn to_text(&self) -> String {
        self.slides
            .iter()
            .map(SlideInfo::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ===== Creation =====

fn list_item_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)(?:[-*]|\d+\.)\s+(.*)$").ok())
        .as_ref()
}

struct Chunk {
    title: String,
    layout: &'static str,
    lines: Vec<String>,
}

fn chunk_to_spec(chunk: Chunk) -> SlideSpec {
    let mut spec = SlideSpec {
        layout: chunk.layout.to_string(),
        title: Some(chunk.title).filter(|t| !t.is_empty()),
        ..Default::default()
    };

    let lines: Vec<&str> = chunk
        .lines
        .iter()
        .map(String::as_str)
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return spec;
    }

    let table_lines: Vec<&str> = lines.iter().copied().filter(|l| l.trim().starts_with('|')).collect();
    if table_lines.len() > 1 && table_lines.len() == lines.len() {
        spec.table = Some(parse_table(&table_lines));
        return spec;
    }

    for line in lines {
        if let Some(rest) = line.strip_prefix("### ") {
            spec.body.push(BodyParagraph {
                text: rest.trim().to_string(),
                level: 0,
                bold: true,
            });
        } else if let Some(caps) = list_item_re().and_then(|re| re.captures(line)) {
            spec.body.push(BodyParagraph::new(caps[2].trim(), caps[1].len() / 2));
        } else if let Some(rest) = line.trim_start().strip_prefix('>') {
            spec.notes = Some(rest.trim().to_string());
        } else {
            spec.body.push(BodyParagraph::new(line.trim(), 0));
        }
    }
    spec
}

/// `#` opens a title slide, `##` a content slide; text before any heading goes on a blank slide
pub fn specs_from_markdown(text: &str) -> Vec<SlideSpec> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Option<Chunk> = None;

    for line in text.lines() {
        let heading = if let Some(rest) = line.strip_prefix("## ") {
            Some((rest, LAYOUT_NAMES[1]))
        } else if line.starts_with("# ") {
            Some((&line[2..], LAYOUT_NAMES[0]))
        } else {
            None
        };

        if let Some((title, layout)) = heading {
            chunks.extend(current.take());
            current = Some(Chunk {
                title: title.trim().to_string(),
                layout,
                lines: Vec::new(),
            });
            continue;
        }

        current
            .get_or_insert_with(|| Chunk {
                title: String::new(),
                layout: LAYOUT_NAMES[4],
                lines: Vec::new(),
            })
            .lines
            .push(line.to_string());
    }
    chunks.extend(current);
    chunks.into_iter().map(chunk_to_spec).collect()
}

fn json_table(value: &Value) -> Option<Vec<Vec<String>>> {
    let rows = value.get("rows").unwrap_or(value).as_array()?;
    Some(
        rows.iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|c| match c {
                                Value::String(s) => s.clone(),
                                Value::Null => String::new(),
                                other => other.to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect(),
    )
}

/// `{metadata, slides:[...]}` or a bare list of slides
pub fn specs_from_json(data: &Value, props: &mut CoreProperties) -> Vec<SlideSpec> {
    let slides = match data {
        Value::Object(map) => {
            if let Some(meta) = map.get("metadata") {
                props.merge_json(meta);
            }
            map.get("slides").and_then(Value::as_array).cloned().unwrap_or_default()
        }
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    };

    slides
        .iter()
        .filter(|s| s.is_object())
        .map(|slide| {
            let layout = match slide.get("layout") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => LAYOUT_NAMES[1].to_string(),
            };
            let mut body: Vec<BodyParagraph> = slide
                .get("body")
                .or_else(|| slide.get("content"))
                .and_then(Value::as_str)
                .map(|text| text.lines().map(|l| BodyParagraph::new(l, 0)).collect())
                .unwrap_or_default();
            if let Some(bullets) = slide.get("bullets").and_then(Value::as_array) {
                body = bullets
                    .iter()
                    .map(|b| match b {
                        Value::Object(_) => BodyParagraph::new(
                            b.get("text").and_then(Value::as_str).unwrap_or_default(),
                            b.get("level").and_then(Value::as_u64).unwrap_or(0) as usize,
                        ),
                        Value::String(s) => BodyParagraph::new(s, 0),
                        other => BodyParagraph::new(&other.to_string(), 0),
                    })
                    .collect();
            }
            SlideSpec {
                layout,
                title: slide.get("title").and_then(Value::as_str).map(String::from),
                body,
                table: slide.get("table").and_then(json_table),
                notes: slide.get("notes").and_then(Value::as_str).map(String::from),
            }
        })
        .collect()
}

/// Build a presentation from markdown or JSON; returns the number of slides added
pub fn create(path: &Path, content: &str, kind: InputKind, template: Option<&Path>) -> Result<usize> {
    let mut presentation = match template {
        Some(template) => Presentation::open(template)?,
        None => Presentation::blank()?,
    };
    let mut props = presentation.metadata();
    let specs = match kind.resolve(content) {
        InputKind::Json => specs_from_json(&serde_json::from_str(content)?, &mut props),
        _ => specs_from_markdown(content),
    };

    for spec in &specs {
        presentation.add_slide(spec)?;
    }

    let now = now_w3c();
    props.created.get_or_insert_with(|| now.clone());
    props.modified = Some(now);
    presentation.package.set_core_properties(&props)?;
    presentation.save(path)?;
    Ok(specs.len())
}

// ===== Editing =====

#[derive(Debug, Clone, Default)]
pub struct PptxEdit {
    pub replace: Option<(String, String)>,
    pub replace_all: Option<(String, String)>,
    pub add_slide: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub delete_slide: Option<usize>,
    pub set_notes: Option<(usize, String)>,
    pub set_metadata: Option<(String, String)>,
}

pub fn edit(path: &Path, edits: &PptxEdit) -> Result<Vec<String>> {
    let mut presentation = Presentation::open(path)?;
    let mut messages = Vec::new();

    for (pair, all) in [(&edits.replace, false), (&edits.replace_all, true)] {
        if let Some((old, new)) = pair {
            let count = presentation.replace_text(old, new, all)?;
            messages.push(format!("Replaced {} occurrence(s)", count));
        }
    }

    if let Some(layout) = &edits.add_slide {
        let spec = SlideSpec {
            layout: layout.clone(),
            title: edits.title.clone().filter(|t| !t.is_empty()),
            body: edits
                .body
                .as_deref()
                .map(|b| b.lines().map(|l| BodyParagraph::new(l, 0)).collect())
                .unwrap_or_default(),
            ..Default::default()
        };
        let name = presentation.find_layout(layout)?.name;
        presentation.add_slide(&spec)?;
        messages.push(format!("Added slide (layout: {})", name));
    }

    if let Some(number) = edits.delete_slide {
        presentation.delete_slide(number)?;
        messages.push(format!("Deleted slide {}", number));
    }

    if let Some((number, text)) = &edits.set_notes {
        presentation.set_notes(*number, text)?;
        messages.push(format!("Set notes on slide {}", number));
    }

    if let Some((key, value)) = &edits.set_metadata {
        presentation.package.set_metadata(key, value)?;
        messages.push(format!("Set metadata '{}' = '{}'", key, value));
    }

    presentation.save(path)?;
    Ok(messages)
}

// ===== Info =====

#[derive(Debug, Clone, Serialize)]
pub struct PptxInfo {
    pub file: String,
    pub metadata: CoreProperties,
    pub slide_count: usize,
    pub slide_width: i64,
    pub slide_height: i64,
    pub total_shapes: usize,
    pub tables: usize,
    pub images: usize,
    pub word_count: usize,
    pub layouts_used: Vec<String>,
}

impl PptxInfo {
    /// `13.3" x 7.5"`
    pub fn dimensions(&self) -> String {
        format!(
            "{:.1}\" x {:.1}\"",
            self.slide_width as f64 / EMU_PER_INCH,
            self.slide_height as f64 / EMU_PER_INCH
        )
    }
}

pub fn info(path: &Path) -> Result<PptxInfo> {
    let presentation = Presentation::open(path)?;
    let slides = presentation.slides()?;
    let shapes = || slides.iter().flat_map(|s| s.shapes.iter());
    let layouts_used: BTreeSet<String> = slides.iter().map(|s| s.layout.clone()).collect();
    let (slide_width, slide_height) = presentation.slide_size();

    Ok(PptxInfo {
        file: path.display().to_string(),
        metadata: presentation.metadata(),
        slide_count: slides.len(),
        slide_width,
        slide_height,
        total_shapes: shapes().count(),
        tables: shapes().filter(|s| s.table.is_some()).count(),
        images: shapes().filter(|s| s.kind == "picture").count(),
        word_count: shapes()
            .filter_map(|s| s.text.as_deref())
            .map(|t| t.split_whitespace().count())
            .sum(),
        layouts_used: layouts_used.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DECK: &str = "# Press Line 3\nKickoff review\n\n## Scope\n- Frame\n  - Welding\n1. FAT\n> Mention the budget\n\n## Parts\n| Part | Qty |\n|---|---|\n| Bolt | 4 |\n";

    fn create_deck(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("deck.pptx");
        assert_eq!(create(&path, DECK, InputKind::Markdown, None).unwrap(), 3);
        path
    }

    #[test]
    fn test_markdown_specs() {
        let specs = specs_from_markdown(DECK);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].layout, "Title Slide");
        assert_eq!(specs[0].body, vec![BodyParagraph::new("Kickoff review", 0)]);
        assert_eq!(specs[1].body[1], BodyParagraph::new("Welding", 1));
        assert_eq!(specs[1].notes.as_deref(), Some("Mention the budget"));
        assert!(specs[2].body.is_empty());
        assert_eq!(specs[2].table.as_ref().unwrap().len(), 2);

        let loose = specs_from_markdown("just text");
        assert_eq!(loose[0].layout, "Blank");
        assert_eq!(loose[0].title, None);
    }

    #[test]
    fn test_create_and_read() {
        let dir = TempDir::new().unwrap();
        let path = create_deck(&dir);

        let doc = PptxDocument::open(&path, None).unwrap();
        assert_eq!(doc.slide_count, 3);
        assert_eq!(doc.slide_width, 12_192_000);

        let first = &doc.slides[0];
        assert_eq!(first.layout, "Title Slide");
        assert!(first.shapes[0].is_title());
        assert_eq!(first.shapes[0].text.as_deref(), Some("Press Line 3"));
        assert_eq!(first.shapes[1].text.as_deref(), Some("Kickoff review"));

        let second = &doc.slides[1];
        assert_eq!(second.layout, "Title and Content");
        assert_eq!(second.notes.as_deref(), Some("Mention the budget"));
        assert_eq!(second.shapes[1].paragraphs[1].level, 1);

        let third = &doc.slides[2];
        assert_eq!(third.shapes[1].kind, "table");
        let table = third.shapes[1].table.as_ref().unwrap();
        assert_eq!(table.rows[1], vec!["Bolt", "4"]);
        assert_eq!(table.col_count, 2);

        let md = doc.to_markdown();
        assert!(md.contains("## Slide 1 — Title Slide"));
        assert!(md.contains("### Press Line 3"));
        assert!(md.contains("  - Welding"));
        assert!(md.contains("> **Notes:** Mention the budget"));
        assert!(md.contains("| Part | Qty |"));

        let json = doc.to_json(false);
        assert!(json["slides"][1]["shapes"][1].get("paragraphs").is_none());
        let json = doc.to_json(true);
        assert_eq!(json["slides"][1]["shapes"][1]["paragraphs"][1]["level"], 1);

        let ranged = PptxDocument::open(&path, Some("2:3")).unwrap();
        assert_eq!(ranged.slides.len(), 2);
        assert_eq!(ranged.slides[0].slide_number, 2);
    }

    #[test]
    fn test_create_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.pptx");
        let input = r#"{"metadata": {"title": "Status"},
            "slides": [
                {"layout": "content", "title": "Risks", "bullets": ["Late steel", {"text": "Supplier", "level": 1}]},
                {"layout": "blank", "body": "Loose text", "notes": "Skip"},
                {"layout": 3, "title": "Only title", "table": {"rows": [["a", 1]]}}
            ]}"#;
        assert_eq!(create(&path, input, InputKind::Auto, None).unwrap(), 3);

        let doc = PptxDocument::open(&path, None).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Status"));
        assert_eq!(doc.slides[1].layout, "Blank");
        assert_eq!(doc.slides[1].shapes[0].kind, "text_box");
        assert_eq!(doc.slides[2].layout, "Title Only");
        assert_eq!(doc.slides[2].shapes[1].table.as_ref().unwrap().rows, vec![vec!["a", "1"]]);
        assert!(doc.to_markdown().starts_with("# Status\n"));
    }

    #[test]
    fn test_edit_operations() {
        let dir = TempDir::new().unwrap();
        let path = create_deck(&dir);

        let messages = edit(
            &path,
            &PptxEdit {
                replace_all: Some(("Bolt".into(), "Nut".into())),
                add_slide: Some("section header".into()),
                title: Some("Next steps".into()),
                body: Some("Order steel".into()),
                delete_slide: Some(1),
                set_notes: Some((1, "Updated notes".into())),
                set_metadata: Some(("author".into(), "PMO".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(messages[0], "Replaced 1 occurrence(s)");
        assert_eq!(messages[1], "Added slide (layout: Section Header)");

        let doc = PptxDocument::open(&path, None).unwrap();
        assert_eq!(doc.slide_count, 3);
        assert_eq!(doc.slides[0].shapes[0].text.as_deref(), Some("Scope"));
        assert_eq!(doc.slides[0].notes.as_deref(), Some("Updated notes"));
        assert_eq!(doc.slides[1].shapes[1].table.as_ref().unwrap().rows[1][0], "Nut");
        assert_eq!(doc.slides[2].layout, "Section Header");
        assert_eq!(doc.metadata.author.as_deref(), Some("PMO"));

        // Notes created where none existed
        edit(&path, &PptxEdit { set_notes: Some((3, "New".into())), ..Default::default() }).unwrap();
        let doc = PptxDocument::open(&path, None).unwrap();
        assert_eq!(doc.slides[2].notes.as_deref(), Some("New"));
    }

    #[test]
    fn test_out_of_range_slide_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = create_deck(&dir);
        let err = edit(&path, &PptxEdit { delete_slide: Some(9), ..Default::default() }).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        let err = edit(&path, &PptxEdit { set_notes: Some((0, "x".into())), ..Default::default() }).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn test_info() {
        let dir = TempDir::new().unwrap();
        let path = create_deck(&dir);
        let info = info(&path).unwrap();
        assert_eq!(info.slide_count, 3);
        assert_eq!(info.tables, 1);
        assert_eq!(info.images, 0);
        assert_eq!(info.layouts_used, vec!["Title Slide", "Title and Content"]);
        assert_eq!(info.dimensions(), "13.3\" x 7.5\"");
        assert_eq!(info.total_shapes, 6);
    }
}
