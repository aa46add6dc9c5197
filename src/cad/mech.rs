//! Mechanical file tool: info, read, validate and convert by extension

use super::dxf::{self, DxfFile};
use super::gltf::Gltf;
use super::iges::IgesFile;
use super::loaders::{read_obj, read_stl, write_stl_binary, StlEncoding, StlFile};
use super::mesh::{cross, norm, sub, Body, Bounds};
use super::step::{self, StepFile};
use super::{detect_format, file_size, pdf, ranked, ranked_json, svg, Format};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Entity types shown by STEP `info`
const STEP_TOP_TYPES: usize = 15;

/// Texts listed by the DXF table view
const DXF_TEXTS_SHOWN: usize = 20;

const DEGENERATE_AREA: f64 = 1e-10;

const SUPPORTED_CONVERSIONS: &str = "DWG→DXF, STEP→STL, GLTF→STL, GLB→STL, STL→STL, OBJ→STL";

fn mech_format(path: &Path) -> Result<Format> {
    let format = detect_format(path)?;
    if matches!(format, Format::Obj | Format::Ply | Format::Off) {
        return Err(Error::Unsupported(format!(
            "unsupported format: .{}",
            format.name().to_lowercase()
        )));
    }
    file_size(path)?;
    Ok(format)
}

fn read_text(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&std::fs::read(path)?).into_owned())
}

// ===== Validation result =====

#[derive(Debug, Clone, Default, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Validation {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
            ..Default::default()
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

// ===== STL =====

fn stl_triangles_body(stl: &StlFile) -> Body {
    let mut body = Body::new("stl");
    for t in stl.triangles() {
        let [a, b, c] = t.vertices;
        body.push_triangle(a, b, c);
    }
    body
}

fn stl_info(path: &Path, size: u64) -> Result<Value> {
    let stl = read_stl(path)?;
    let body = stl_triangles_body(&stl);
    let bounds = body.bounds().unwrap_or(Bounds {
        min: [0.0; 3],
        max: [0.0; 3],
    });
    let mut info = json!({
        "format": "STL",
        "encoding": stl.encoding,
        "file_size": size,
        "triangle_count": stl.triangle_count(),
        "bounding_box": {
            "min": bounds.min,
            "max": bounds.max,
            "size": bounds.extents(),
        },
        "volume": body.volume(),
        "surface_area": body.surface_area(),
    });
    if stl.encoding == StlEncoding::Binary {
        info["header"] = json!(stl.header);
    }
    Ok(info)
}

fn stl_validate(path: &Path) -> Result<Validation> {
    let stl = read_stl(path)?;
    let mut issues = Vec::new();
    if stl.triangle_count() == 0 {
        issues.push("Mesh has no triangles".to_string());
    }
    let degenerate = stl
        .triangles()
        .filter(|t| {
            let [a, b, c] = t.vertices;
            norm(cross(sub(b, a), sub(c, a))) / 2.0 < DEGENERATE_AREA
        })
        .count();
    if degenerate > 0 {
        issues.push(format!("{} degenerate triangles (zero area)", degenerate));
    }
    let zero_normals = stl
        .triangles()
        .filter(|t| t.normal.iter().map(|v| v.abs()).sum::<f64>() < DEGENERATE_AREA)
        .count();
    if zero_normals > 0 {
        issues.push(format!("{} triangles with zero normals", zero_normals));
    }
    Ok(Validation::from_issues(issues).with("triangle_count", json!(stl.triangle_count())))
}

// ===== STEP =====

fn step_info(path: &Path, size: u64) -> Result<Value> {
    let step = StepFile::open(path)?;
    let counts = step.entity_counts();
    let total = step.instance_count;
    let ranked_counts = ranked(counts.clone());
    let top: Vec<(String, usize)> = ranked_counts.into_iter().take(STEP_TOP_TYPES).collect();
    let mut info = json!({
        "format": "STEP",
        "file_size": size,
        "header": step.header,
        "total_entities": total,
        "top_entity_types": ranked_json(&top),
    });
    for kind in ["PRODUCT", "PRODUCT_DEFINITION", "SHAPE_REPRESENTATION"] {
        if let Some(count) = counts.get(kind) {
            info[format!("{}_count", kind.to_lowercase())] = json!(count);
        }
    }
    Ok(info)
}

fn step_read(path: &Path) -> Result<Value> {
    let step = StepFile::open(path)?;
    let counts = ranked(step.entity_counts());
    Ok(json!({
        "format": "STEP",
        "header": step.header,
        "products": step.products(),
        "entity_counts": ranked_json(&counts),
        "total_entities": step.instance_count,
    }))
}

fn step_validate(path: &Path) -> Result<Validation> {
    let text = read_text(path)?;
    Ok(Validation::from_issues(step::validate(&text))
        .with("has_header", json!(text.contains("HEADER;")))
        .with("has_data", json!(text.contains("DATA;"))))
}

// ===== IGES =====

fn iges_read(path: &Path, size: u64) -> Result<Value> {
    let iges = IgesFile::open(path)?;
    let mut value = serde_json::to_value(iges.info(size))?;
    value["entity_types"] = ranked_json(&iges.entity_types());
    Ok(value)
}

// ===== DWG via ODA File Converter =====

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// `ODA_CONVERTER`, then `PATH`, then the usual install locations
pub fn find_oda_converter() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("ODA_CONVERTER").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        warn!("ODA_CONVERTER points to {:?}, which does not exist", path);
    }
    ["ODAFileConverter", "odafileconverter"]
        .iter()
        .find_map(|name| find_on_path(name))
        .or_else(|| {
            [
                "/usr/bin/ODAFileConverter",
                "/opt/ODAFileConverter/ODAFileConverter",
                "/usr/local/bin/ODAFileConverter",
            ]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
        })
}

/// Scratch directory removed on drop
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Result<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        let dir = std::env::temp_dir().join(format!("jarvis-oda-{}-{}", std::process::id(), nanos));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn dwg_to_dxf(dwg: &Path, output: &Path) -> Result<PathBuf> {
    let converter = find_oda_converter().ok_or_else(|| {
        Error::NotFound(
            "ODA File Converter not found. Install it from \
             https://www.opendesign.com/guestfiles/oda_file_converter and set ODA_CONVERTER \
             or put ODAFileConverter on PATH"
                .to_string(),
        )
    })?;
    let src_dir = dwg
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = dwg
        .file_name()
        .ok_or_else(|| Error::Invalid(format!("not a file: {}", dwg.display())))?;
    let scratch = ScratchDir::new()?;

    info!("Converting {:?} with {:?}", dwg, converter);
    let status = Command::new(&converter)
        .arg(src_dir)
        .arg(&scratch.0)
        .args(["ACAD2018", "DXF", "0", "1"])
        .arg(name)
        .output()?;
    if !status.status.success() {
        return Err(Error::Other(format!(
            "ODA File Converter failed: {}",
            String::from_utf8_lossy(&status.stderr).trim()
        )));
    }

    let stem = dwg.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let converted = scratch.0.join(format!("{}.dxf", stem));
    if !converted.exists() {
        return Err(Error::Other(format!("conversion failed: {}.dxf not produced", stem)));
    }
    std::fs::copy(&converted, output)?;
    Ok(output.to_path_buf())
}

/// Convert to a DXF in a scratch directory and hand it to `f`
fn with_dwg_as_dxf<T>(dwg: &Path, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let scratch = ScratchDir::new()?;
    let dxf = scratch.0.join("converted.dxf");
    dwg_to_dxf(dwg, &dxf)?;
    f(&dxf)
}

// ===== Dispatch =====

pub fn mech_info(path: &Path) -> Result<Value> {
    let format = mech_format(path)?;
    let size = file_size(path)?;
    debug!("mech info {:?} as {}", path, format);
    match format {
        Format::Dxf => Ok(DxfFile::open(path)?.info(size)),
        Format::Dwg => with_dwg_as_dxf(path, |dxf| {
            let mut info = DxfFile::open(dxf)?.info(size);
            info["original_format"] = json!("DWG");
            Ok(info)
        }),
        Format::Step => step_info(path, size),
        Format::Iges => Ok(serde_json::to_value(IgesFile::open(path)?.info(size))?),
        Format::Stl => stl_info(path, size),
        Format::Gltf | Format::Glb => {
            let mut info = serde_json::to_value(Gltf::open(path)?.info())?;
            info["format"] = json!(format.name());
            info["file_size"] = json!(size);
            Ok(info)
        }
        Format::Svg => Ok(serde_json::to_value(svg::inspect(&read_text(path)?, size)?)?),
        Format::Pdf => Ok(serde_json::to_value(pdf::inspect(&std::fs::read(path)?))?),
        other => Err(Error::Unsupported(format!("unsupported format: {}", other))),
    }
}

pub fn mech_read(path: &Path) -> Result<Value> {
    let format = mech_format(path)?;
    let size = file_size(path)?;
    match format {
        Format::Dxf => Ok(DxfFile::open(path)?.read()),
        Format::Dwg => with_dwg_as_dxf(path, |dxf| Ok(DxfFile::open(dxf)?.read())),
        Format::Step => step_read(path),
        Format::Iges => iges_read(path, size),
        Format::Stl => stl_info(path, size),
        Format::Gltf | Format::Glb => {
            let mut value = serde_json::to_value(Gltf::open(path)?.read())?;
            value["format"] = json!(format.name());
            Ok(value)
        }
        Format::Svg => Ok(serde_json::to_value(svg::inspect(&read_text(path)?, size)?)?),
        Format::Pdf => Ok(json!({
            "format": "PDF",
            "text": pdf::extract_text(path)?,
        })),
        other => Err(Error::Unsupported(format!("unsupported format: {}", other))),
    }
}

/// File-level problems come back as issues; only an unknown format is an error
pub fn mech_validate(path: &Path) -> Result<Validation> {
    let format = mech_format(path)?;
    let result = match format {
        Format::Dxf => read_text(path).map(|t| Validation::from_issues(dxf::validate_text(&t))),
        Format::Dwg => with_dwg_as_dxf(path, |dxf| {
            Ok(Validation::from_issues(dxf::validate_text(&read_text(dxf)?)))
        })
        .map(|v| v.with("note", json!("Validated via DWG→DXF conversion (ODA File Converter)"))),
        Format::Step => step_validate(path),
        Format::Iges => IgesFile::open(path).map(|iges| {
            let sections = serde_json::to_value(&iges.sections).unwrap_or(Value::Null);
            Validation::from_issues(iges.validate()).with("sections", sections)
        }),
        Format::Stl => stl_validate(path),
        Format::Gltf | Format::Glb => Gltf::open(path).map(|g| Validation::from_issues(g.validate())),
        Format::Svg => read_text(path).map(|t| Validation::from_issues(svg::validate(&t))),
        Format::Pdf => std::fs::read(path).map_err(Error::from).map(|data| {
            Validation::from_issues(pdf::validate(&data))
                .with("page_count", json!(pdf::page_count(&data)))
        }),
        other => Err(Error::Unsupported(format!("unsupported format: {}", other))),
    };
    Ok(result.unwrap_or_else(|e| Validation::failed(&e)))
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub from: Format,
    pub to: Format,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triangles: Option<usize>,
}

pub fn mech_convert(src: &Path, dst: &Path) -> Result<ConvertReport> {
    let from = detect_format(src)?;
    let to = detect_format(dst)?;
    file_size(src)?;
    let title = format!("converted from {}", src.file_name().map(|n| n.to_string_lossy()).unwrap_or_default());

    let triangles = match (from, to) {
        (Format::Dwg, Format::Dxf) => {
            dwg_to_dxf(src, dst)?;
            None
        }
        (Format::Gltf | Format::Glb, Format::Stl) => {
            Some(write_stl_binary(&Gltf::open(src)?.bodies()?, dst, &title)?)
        }
        (Format::Step, Format::Stl) => {
            let stem = src.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let bodies = StepFile::open(src)?.bodies(&stem)?;
            if bodies.is_empty() {
                return Err(Error::Parse(format!("no solids to tessellate in {}", src.display())));
            }
            Some(write_stl_binary(&bodies, dst, &title)?)
        }
        (Format::Stl, Format::Stl) => Some(write_stl_binary(&read_stl(src)?.bodies(), dst, &title)?),
        (Format::Obj, Format::Stl) => Some(write_stl_binary(&read_obj(src)?, dst, &title)?),
        _ => {
            return Err(Error::Unsupported(format!(
                "conversion {}→{} not supported. Supported: {}",
                from, to, SUPPORTED_CONVERSIONS
            )))
        }
    };
    info!("Converted {:?} → {:?}", src, dst);
    Ok(ConvertReport {
        source: src.to_path_buf(),
        output: dst.to_path_buf(),
        from,
        to,
        triangles,
    })
}

// ===== Table output =====

fn counts_lines(value: &Value, limit: usize) -> Vec<String> {
    value
        .as_object()
        .map(|counts| {
            counts
                .iter()
                .take(limit)
                .map(|(k, v)| format!("  {}: {}", k, v))
                .collect()
        })
        .unwrap_or_default()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Human-readable rendering of `mech_read` output
pub fn read_table(value: &Value) -> String {
    let mut lines: Vec<String> = Vec::new();
    let len = |key: &str| value[key].as_array().map_or(0, Vec::len);
    match value["format"].as_str().unwrap_or_default() {
        "DXF" => {
            let layers = value["layers"].as_object().cloned().unwrap_or_default();
            lines.push(format!("Layers ({}):", layers.len()));
            for (name, props) in &layers {
                lines.push(format!("  {}: color={}", name, text_of(&props["color"])));
            }
            lines.push(String::new());
            lines.push(format!("Blocks ({}):", len("blocks")));
            for block in value["blocks"].as_array().into_iter().flatten() {
                lines.push(format!("  {}: {}", text_of(&block["name"]), block["entities"]));
            }
            lines.push(String::new());
            let texts = value["texts"].as_array().cloned().unwrap_or_default();
            lines.push(format!("Texts ({}):", texts.len()));
            for text in texts.iter().take(DXF_TEXTS_SHOWN) {
                lines.push(format!("  [{}] {}", text_of(&text["layer"]), text_of(&text["text"])));
            }
            if texts.len() > DXF_TEXTS_SHOWN {
                lines.push(format!("  ... and {} more", texts.len() - DXF_TEXTS_SHOWN));
            }
            lines.push(String::new());
            lines.push(format!("Entity summary: {}", value["entity_summary"]));
        }
        "STEP" => {
            lines.push("STEP Header:".to_string());
            for (key, v) in value["header"].as_object().into_iter().flatten() {
                lines.push(format!("  {}: {}", key, text_of(v)));
            }
            lines.push(String::new());
            let products: Vec<String> = value["products"]
                .as_array()
                .into_iter()
                .flatten()
                .map(text_of)
                .collect();
            lines.push(format!("Products: {}", products.join(", ")));
            lines.push(String::new());
            lines.push(format!("Total entities: {}", value["total_entities"]));
            lines.push("Top types:".to_string());
            lines.extend(counts_lines(&value["entity_counts"], 20));
        }
        "IGES" => {
            lines.push(format!("IGES: {}", text_of(&value["start_section"])));
            lines.push(format!("Directory entries: {}", value["directory_entries"]));
            lines.push("Entity types:".to_string());
            lines.extend(counts_lines(&value["entity_types"], usize::MAX));
        }
        "STL" => {
            let bb = &value["bounding_box"];
            lines.push(format!(
                "STL ({}): {} triangles",
                text_of(&value["encoding"]),
                value["triangle_count"]
            ));
            lines.push(format!("Bounding box: {} → {}", bb["min"], bb["max"]));
            lines.push(format!("Size: {}", bb["size"]));
            lines.push(format!("Volume: {:.4}", value["volume"].as_f64().unwrap_or_default()));
            lines.push(format!(
                "Surface area: {:.4}",
                value["surface_area"].as_f64().unwrap_or_default()
            ));
        }
        "GLTF" | "GLB" => {
            lines.push(format!("Scenes: {}", len("scenes")));
            for scene in value["scenes"].as_array().into_iter().flatten() {
                let roots = scene["nodes"].as_array().map_or(0, Vec::len);
                lines.push(format!("  {}: {} root nodes", text_of(&scene["name"]), roots));
            }
            lines.push(format!("Meshes: {}", len("meshes")));
            for mesh in value["meshes"].as_array().into_iter().flatten() {
                lines.push(format!("  {}: {} primitives", text_of(&mesh["name"]), mesh["primitives"]));
            }
            lines.push(format!("Materials: {}", len("materials")));
            for material in value["materials"].as_array().into_iter().flatten() {
                lines.push(format!("  {}", text_of(&material["name"])));
            }
        }
        "SVG" => {
            lines.push(format!(
                "SVG: {}x{} viewBox={}",
                text_of(&value["width"]),
                text_of(&value["height"]),
                text_of(&value["viewBox"])
            ));
            lines.push(format!("Total elements: {}", value["total_elements"]));
            lines.extend(counts_lines(&value["element_counts"], 15));
            if let Some(groups) = value["groups"].as_array() {
                let names: Vec<String> = groups.iter().map(text_of).collect();
                lines.push(format!("Groups/layers: {}", names.join(", ")));
            }
        }
        "PDF" => lines.push(text_of(&value["text"])),
        _ => lines.push(value.to_string()),
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::mesh::tests::unit_cube;
    use tempfile::TempDir;

    #[test]
    fn test_stl_info_and_validate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.stl");
        write_stl_binary(&[unit_cube("cube", [0.0; 3])], &path, "cube export").unwrap();

        let info = mech_info(&path).unwrap();
        assert_eq!(info["encoding"], "binary");
        assert_eq!(info["triangle_count"], 12);
        assert_eq!(info["header"], "cube export");
        assert_eq!(info["bounding_box"]["size"], json!([1.0, 1.0, 1.0]));
        assert!((info["volume"].as_f64().unwrap() - 1.0).abs() < 1e-6);

        let validation = mech_validate(&path).unwrap();
        assert!(validation.valid);
        assert_eq!(validation.details["triangle_count"], 12);

        let table = read_table(&mech_read(&path).unwrap());
        assert!(table.starts_with("STL (binary): 12 triangles"));
    }

    #[test]
    fn test_stl_validate_flags_bad_triangles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.stl");
        std::fs::write(
            &path,
            "solid bad\nfacet normal 0 0 0\nouter loop\nvertex 0 0 0\nvertex 1 1 1\nvertex 2 2 2\nendloop\nendfacet\nendsolid bad\n",
        )
        .unwrap();
        let validation = mech_validate(&path).unwrap();
        assert!(!validation.valid);
        assert_eq!(
            validation.issues,
            vec![
                "1 degenerate triangles (zero area)".to_string(),
                "1 triangles with zero normals".to_string()
            ]
        );
    }

    #[test]
    fn test_step_info_and_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bracket.step");
        std::fs::write(&path, crate::cad::step::tests::ASSEMBLY).unwrap();

        let info = mech_info(&path).unwrap();
        assert_eq!(info["total_entities"], 14);
        assert_eq!(info["product_count"], 3);
        assert_eq!(info["product_definition_count"], 3);
        let first = info["top_entity_types"].as_object().unwrap().keys().next().unwrap().clone();
        assert_eq!(first, "NEXT_ASSEMBLY_USAGE_OCCURRENCE");

        let validation = mech_validate(&path).unwrap();
        assert!(validation.valid);
        assert_eq!(validation.details["has_data"], true);

        let table = read_table(&mech_read(&path).unwrap());
        assert!(table.contains("Products: Bracket Assembly, Plate, BOLT"));
    }

    #[test]
    fn test_unknown_format_and_conversion() {
        let dir = TempDir::new().unwrap();
        let obj = dir.path().join("tri.obj");
        std::fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(matches!(mech_info(&obj), Err(Error::Unsupported(_))));
        assert!(matches!(mech_info(&dir.path().join("x.xyz")), Err(Error::Unsupported(_))));

        let stl = dir.path().join("tri.stl");
        let report = mech_convert(&obj, &stl).unwrap();
        assert_eq!(report.triangles, Some(1));
        assert_eq!(read_stl(&stl).unwrap().triangle_count(), 1);

        let err = mech_convert(&stl, &dir.path().join("tri.step")).unwrap_err();
        assert!(err.to_string().contains("Supported: DWG→DXF"));
    }

    #[test]
    fn test_step_converts_to_stl() {
        let dir = TempDir::new().unwrap();
        let step = dir.path().join("tetra.step");
        std::fs::write(&step, crate::cad::step::tests::TETRA).unwrap();
        let stl = dir.path().join("tetra.stl");
        let report = mech_convert(&step, &stl).unwrap();
        assert!(report.triangles.unwrap_or(0) >= 4);
        let bodies = read_stl(&stl).unwrap().bodies();
        assert!((bodies[0].volume() - 1.0 / 6.0).abs() < 1e-3);

        let bracket = dir.path().join("bracket.step");
        std::fs::write(&bracket, crate::cad::step::tests::ASSEMBLY).unwrap();
        assert!(matches!(
            mech_convert(&bracket, &dir.path().join("b.stl")),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_gltf_convert_and_info() {
        let dir = TempDir::new().unwrap();
        let gltf = dir.path().join("pair.gltf");
        std::fs::write(&gltf, crate::cad::gltf::tests::triangle_gltf()).unwrap();

        let info = mech_info(&gltf).unwrap();
        assert_eq!(info["format"], "GLTF");
        assert_eq!(info["mesh_count"], 1);

        let stl = dir.path().join("pair.stl");
        assert_eq!(mech_convert(&gltf, &stl).unwrap().triangles, Some(2));
        assert!(read_table(&mech_read(&gltf).unwrap()).contains("tri: 1 primitives"));
    }

    #[test]
    fn test_invalid_files_report_issues() {
        let dir = TempDir::new().unwrap();
        let svg_path = dir.path().join("empty.svg");
        std::fs::write(&svg_path, "<svg/>").unwrap();
        let validation = mech_validate(&svg_path).unwrap();
        assert!(!validation.valid);

        let pdf_path = dir.path().join("broken.pdf");
        std::fs::write(&pdf_path, "not a pdf").unwrap();
        let validation = mech_validate(&pdf_path).unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.details["page_count"], 0);
    }
}
