//! CAD viewer: mesh analysis, assembly trees and static SVG rendering

use super::gltf::Gltf;
use super::loaders::{read_obj, read_off, read_ply, read_stl};
use super::mesh::{cross, dot, normalize, split_bodies, sub, Body, BodyReport, Bounds, Vec3};
use super::step::StepFile;
use super::{detect_format, file_size, round6, round6_all, Format};
use crate::error::{Error, Result};
use quick_xml::escape::escape;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Body fill colours, cycled in load order
const BODY_COLORS: [(f64, f64, f64); 16] = [
    (0.70, 0.85, 0.90),
    (0.90, 0.80, 0.65),
    (0.75, 0.90, 0.75),
    (0.90, 0.75, 0.80),
    (0.80, 0.80, 0.95),
    (0.95, 0.90, 0.70),
    (0.70, 0.90, 0.85),
    (0.90, 0.80, 0.90),
    (0.85, 0.85, 0.75),
    (0.80, 0.90, 0.95),
    (0.95, 0.85, 0.75),
    (0.75, 0.88, 0.82),
    (0.88, 0.78, 0.88),
    (0.85, 0.92, 0.80),
    (0.92, 0.82, 0.72),
    (0.78, 0.85, 0.92),
];

const CANVAS_WIDTH: f64 = 800.0;
const CANVAS_MARGIN: f64 = 20.0;

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

// ===== Trees =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Assembly,
    Part,
    Shape,
}

impl NodeKind {
    pub fn icon(self) -> &'static str {
        match self {
            NodeKind::Assembly => "[A]",
            NodeKind::Part => "[P]",
            NodeKind::Shape => "[S]",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(name: &str, kind: NodeKind, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            bounds: None,
            note: None,
            children,
        }
    }
}

// ===== Loading =====

fn require_geometry(bodies: Vec<Body>, path: &Path) -> Result<Vec<Body>> {
    if bodies.is_empty() {
        return Err(Error::Parse(format!("no geometry found in {}", path.display())));
    }
    debug!("loaded {} bodies from {:?}", bodies.len(), path);
    Ok(bodies)
}

/// Load a model as bodies: mesh files are split into connected components,
/// STEP solids are tessellated one body each
pub fn load_bodies(path: &Path) -> Result<(Format, Vec<Body>)> {
    let format = detect_format(path)?;
    file_size(path)?;
    let bodies = match format {
        Format::Stl => read_stl(path)?.bodies(),
        Format::Obj => read_obj(path)?,
        Format::Ply => vec![read_ply(path)?],
        Format::Off => vec![read_off(path)?],
        Format::Gltf | Format::Glb => Gltf::open(path)?.bodies()?,
        Format::Step => {
            let bodies = StepFile::open(path)?.bodies(&stem(path))?;
            return Ok((format, require_geometry(bodies, path)?));
        }
        other => return Err(Error::Unsupported(format!("no mesh loader for {}", other))),
    };
    Ok((format, require_geometry(split_bodies(bodies), path)?))
}

// ===== Info =====

#[derive(Debug, Clone, Serialize)]
pub struct CadInfo {
    pub file: PathBuf,
    pub format: Format,
    pub file_size_bytes: u64,
    pub num_bodies: usize,
    pub total_vertices: usize,
    pub total_faces: usize,
    pub bounds: Bounds,
    pub extents_mm: Vec3,
    pub is_watertight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mm3: Option<f64>,
    pub surface_area_mm2: f64,
    /// STEP product names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bodies: Vec<BodyReport>,
}

pub fn cad_info(path: &Path) -> Result<CadInfo> {
    let is_step = detect_format(path)? == Format::Step;
    let size = file_size(path)?;
    let (format, bodies, products) = if is_step {
        let step = StepFile::open(path)?;
        let bodies = require_geometry(step.bodies(&stem(path))?, path)?;
        (Format::Step, bodies, step.products())
    } else {
        let (format, bodies) = load_bodies(path)?;
        (format, bodies, Vec::new())
    };
    info!("Analyzing {} bodies from {:?}", bodies.len(), path);
    let combined = Body::concat(&bodies, &stem(path));
    let bounds = combined
        .bounds()
        .ok_or_else(|| Error::Parse(format!("no geometry found in {}", path.display())))?;
    let watertight = combined.is_watertight();
    let per_body = if bodies.len() > 1 {
        bodies.iter().filter_map(BodyReport::of).collect()
    } else {
        Vec::new()
    };

    Ok(CadInfo {
        file: path.to_path_buf(),
        format,
        file_size_bytes: size,
        num_bodies: bodies.len(),
        total_vertices: bodies.iter().map(|b| b.vertices.len()).sum(),
        total_faces: bodies.iter().map(|b| b.faces.len()).sum(),
        bounds: bounds.rounded(),
        extents_mm: round6_all(bounds.extents()),
        is_watertight: watertight,
        volume_mm3: watertight.then(|| round6(combined.volume())),
        surface_area_mm2: round6(combined.surface_area()),
        products,
        bodies: per_body,
    })
}

/// Thousands separators for counts
fn grouped(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn print_cad_info(info: &CadInfo) {
    let (min, max, ext) = (info.bounds.min, info.bounds.max, info.extents_mm);
    println!("File:          {}", info.file.display());
    println!("Format:        {}", info.format);
    println!("File size:     {} bytes", grouped(info.file_size_bytes as usize));
    if !info.products.is_empty() {
        println!("Products:      {}", info.products.join(", "));
    }
    println!("Bodies:        {}", info.num_bodies);
    println!("Vertices:      {}", grouped(info.total_vertices));
    println!("Faces:         {}", grouped(info.total_faces));
    println!("Bounds min:    [{:.4}, {:.4}, {:.4}] mm", min[0], min[1], min[2]);
    println!("Bounds max:    [{:.4}, {:.4}, {:.4}] mm", max[0], max[1], max[2]);
    println!("Extents:       {:.4} x {:.4} x {:.4} mm", ext[0], ext[1], ext[2]);
    println!("Watertight:    {}", yes_no(info.is_watertight));
    if let Some(volume) = info.volume_mm3 {
        println!("Volume:        {:.4} mm³", volume);
    }
    println!("Surface area:  {:.4} mm²", info.surface_area_mm2);

    if !info.bodies.is_empty() {
        println!();
        println!("--- Per-body breakdown ({} bodies) ---", info.bodies.len());
        for (i, body) in info.bodies.iter().enumerate() {
            let ext = body.extents;
            println!();
            println!("  [{}] {}", i + 1, body.name);
            println!("      Vertices:   {}", grouped(body.num_vertices));
            println!("      Extents:    {:.4} x {:.4} x {:.4} mm", ext[0], ext[1], ext[2]);
            println!("      Watertight: {}", yes_no(body.is_watertight));
            if let Some(volume) = body.volume_mm3 {
                println!("      Volume:     {:.4} mm³", volume);
            }
            println!("      Area:       {:.4} mm²", body.surface_area_mm2);
        }
    }
}

// ===== Tree =====

pub fn cad_tree(path: &Path) -> Result<TreeNode> {
    let format = detect_format(path)?;
    file_size(path)?;
    let name = stem(path);
    match format {
        Format::Step => Ok(StepFile::open(path)?.product_tree(&name)),
        Format::Gltf | Format::Glb => Ok(Gltf::open(path)?.tree(&name)),
        f if f.is_mesh() => {
            let (_, bodies) = load_bodies(path)?;
            let children: Vec<TreeNode> = bodies
                .iter()
                .map(|body| {
                    let mut node = TreeNode::new(&body.name, NodeKind::Part, Vec::new());
                    node.bounds = body.bounds().map(|b| b.rounded_to(2));
                    node
                })
                .collect();
            let kind = if children.len() > 1 {
                NodeKind::Assembly
            } else {
                NodeKind::Part
            };
            Ok(TreeNode::new(&name, kind, children))
        }
        other => Err(Error::Unsupported(format!("no tree for {} files", other))),
    }
}

fn write_tree(node: &TreeNode, depth: usize, out: &mut String) {
    let prefix = "  ".repeat(depth);
    let _ = writeln!(out, "{}{} {}", prefix, node.kind.icon(), node.name);
    if let Some(b) = &node.bounds {
        let _ = writeln!(
            out,
            "{}    bounds: [{}, {}, {}] → [{}, {}, {}]",
            prefix, b.min[0], b.min[1], b.min[2], b.max[0], b.max[1], b.max[2]
        );
    }
    if let Some(note) = &node.note {
        let _ = writeln!(out, "{}    note: {}", prefix, note);
    }
    for child in &node.children {
        write_tree(child, depth + 1, out);
    }
}

/// Indented text form with `[A]`, `[P]` and `[S]` markers
pub fn tree_text(node: &TreeNode) -> String {
    let mut out = String::new();
    write_tree(node, 0, &mut out);
    out
}

pub fn print_tree(node: &TreeNode) {
    print!("{}", tree_text(node));
}

// ===== SVG view =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Projection {
    #[default]
    Iso,
    Front,
    Top,
    Right,
}

impl Projection {
    /// Screen right, screen up, and the direction towards the viewer
    fn basis(self) -> (Vec3, Vec3, Vec3) {
        match self {
            Projection::Iso => (
                normalize([1.0, 1.0, 0.0]),
                normalize([-1.0, 1.0, 2.0]),
                normalize([1.0, -1.0, 1.0]),
            ),
            Projection::Front => ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
            Projection::Top => ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            Projection::Right => ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Background {
    #[default]
    Dark,
    Light,
}

impl Background {
    fn fill(self) -> &'static str {
        match self {
            Background::Dark => "#1e1e1e",
            Background::Light => "#ffffff",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub projection: Projection,
    pub hide: Vec<String>,
    pub only: Vec<String>,
    pub background: Background,
    pub opacity: f64,
    pub edges: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            projection: Projection::Iso,
            hide: Vec::new(),
            only: Vec::new(),
            background: Background::Dark,
            opacity: 1.0,
            edges: false,
        }
    }
}

impl ViewOptions {
    fn matches(names: &[String], body: &Body) -> bool {
        names.iter().any(|n| n.eq_ignore_ascii_case(&body.name))
    }

    fn is_visible(&self, body: &Body) -> bool {
        (self.only.is_empty() || Self::matches(&self.only, body)) && !Self::matches(&self.hide, body)
    }

    fn warn_unknown(&self, bodies: &[Body]) {
        for name in self.hide.iter().chain(&self.only) {
            if !bodies.iter().any(|b| b.name.eq_ignore_ascii_case(name)) {
                warn!("no body named '{}'", name);
            }
        }
    }
}

/// Element id from a body name: ASCII alphanumerics, `-` and `_`, unique
fn svg_id(name: &str, used: &mut HashSet<String>) -> String {
    let mut id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
        id.insert_str(0, "body_");
    }
    let base = id.clone();
    let mut n = 2;
    while !used.insert(id.clone()) {
        id = format!("{}_{}", base, n);
        n += 1;
    }
    id
}

fn rgb(color: (f64, f64, f64), shade: f64) -> String {
    let channel = |v: f64| (v * shade * 255.0).round().clamp(0.0, 255.0) as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(color.0),
        channel(color.1),
        channel(color.2)
    )
}

/// Render the visible bodies as flat-shaded polygons, farthest first
pub fn render_svg(bodies: &[Body], options: &ViewOptions) -> String {
    let (right, up, toward) = options.projection.basis();
    let project = |p: Vec3| (dot(p, right), dot(p, up), dot(p, toward));

    let visible: Vec<(usize, &Body)> = bodies
        .iter()
        .enumerate()
        .filter(|(_, b)| options.is_visible(b))
        .collect();

    let (mut umin, mut umax, mut vmin, mut vmax) =
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for (_, body) in &visible {
        for face in &body.faces {
            for p in body.triangle(face) {
                let (u, v, _) = project(p);
                umin = umin.min(u);
                umax = umax.max(u);
                vmin = vmin.min(v);
                vmax = vmax.max(v);
            }
        }
    }
    if !umin.is_finite() {
        (umin, umax, vmin, vmax) = (0.0, 1.0, 0.0, 1.0);
    }
    let span = (umax - umin).max(vmax - vmin);
    let scale = if span > 0.0 {
        (CANVAS_WIDTH - 2.0 * CANVAS_MARGIN) / span
    } else {
        1.0
    };
    let height = ((vmax - vmin) * scale + 2.0 * CANVAS_MARGIN).ceil();
    let to_screen = |u: f64, v: f64| {
        (
            CANVAS_MARGIN + (u - umin) * scale,
            CANVAS_MARGIN + (vmax - v) * scale,
        )
    };

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = CANVAS_WIDTH,
        h = height
    );
    let _ = writeln!(
        svg,
        r#"<rect width="100%" height="100%" fill="{}"/>"#,
        options.background.fill()
    );

    // Painter's order: bodies by centroid depth, then triangles by mean depth
    let mut ordered = visible;
    ordered.sort_by(|a, b| {
        let da = project(a.1.centroid()).2;
        let db = project(b.1.centroid()).2;
        da.total_cmp(&db)
    });

    let mut used_ids = HashSet::new();
    for (index, body) in ordered {
        let color = BODY_COLORS[index % BODY_COLORS.len()];
        let _ = writeln!(
            svg,
            r#"<g id="{}" data-name="{}" opacity="{}">"#,
            svg_id(&body.name, &mut used_ids),
            escape(body.name.as_str()),
            options.opacity.clamp(0.0, 1.0)
        );

        let mut triangles: Vec<([Vec3; 3], f64)> = body
            .triangles()
            .map(|t| {
                let depth = t.iter().map(|&p| project(p).2).sum::<f64>() / 3.0;
                (t, depth)
            })
            .collect();
        triangles.sort_by(|a, b| a.1.total_cmp(&b.1));

        for ([a, b, c], _) in triangles {
            let normal = normalize(cross(sub(b, a), sub(c, a)));
            if normal == [0.0; 3] {
                continue;
            }
            let shade = 0.35 + 0.65 * dot(normal, toward).abs();
            let fill = rgb(color, shade);
            let points: Vec<String> = [a, b, c]
                .iter()
                .map(|&p| {
                    let (u, v, _) = project(p);
                    let (x, y) = to_screen(u, v);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            let stroke = if options.edges { "#202020" } else { fill.as_str() };
            let width = if options.edges { 0.4 } else { 0.5 };
            let _ = writeln!(
                svg,
                r#"<polygon points="{}" fill="{}" stroke="{}" stroke-width="{}" stroke-linejoin="round"/>"#,
                points.join(" "),
                fill,
                stroke,
                width
            );
        }
        svg.push_str("</g>\n");
    }
    svg.push_str("</svg>\n");
    svg
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewReport {
    pub output: PathBuf,
    pub bodies_drawn: Vec<String>,
    pub bodies_hidden: Vec<String>,
}

/// Write an SVG rendering next to the input unless an output path is given
pub fn cad_view(path: &Path, output: Option<&Path>, options: &ViewOptions) -> Result<ViewReport> {
    let (_, bodies) = load_bodies(path)?;
    options.warn_unknown(&bodies);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.with_extension("svg"));

    let svg = render_svg(&bodies, options);
    std::fs::write(&output, svg)?;

    let (drawn, hidden): (Vec<&Body>, Vec<&Body>) = bodies.iter().partition(|b| options.is_visible(b));
    info!("Wrote {:?} ({} bodies drawn)", output, drawn.len());
    Ok(ViewReport {
        output,
        bodies_drawn: drawn.iter().map(|b| b.name.clone()).collect(),
        bodies_hidden: hidden.iter().map(|b| b.name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::loaders::write_stl_binary;
    use crate::cad::mesh::tests::unit_cube;
    use tempfile::TempDir;

    fn two_cubes(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("pair.stl");
        let soup = Body::concat(
            &[unit_cube("a", [0.0; 3]), unit_cube("b", [3.0, 0.0, 0.0])],
            "pair",
        );
        write_stl_binary(&[soup], &path, "pair").unwrap();
        path
    }

    #[test]
    fn test_info_splits_bodies() {
        let dir = TempDir::new().unwrap();
        let path = two_cubes(&dir);
        let info = cad_info(&path).unwrap();
        assert_eq!(info.format, Format::Stl);
        assert_eq!(info.num_bodies, 2);
        assert_eq!(info.bodies.len(), 2);
        assert_eq!(info.bodies[1].name, "pair_2");
        assert!(info.is_watertight);
        assert_eq!(info.volume_mm3, Some(2.0));
        assert_eq!(info.surface_area_mm2, 12.0);
        assert_eq!(info.extents_mm, [4.0, 1.0, 1.0]);
    }

    #[test]
    fn test_single_body_has_no_breakdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.stl");
        write_stl_binary(&[unit_cube("cube", [0.0; 3])], &path, "").unwrap();
        let info = cad_info(&path).unwrap();
        assert!(info.bodies.is_empty());
        let json = serde_json::to_value(info).unwrap();
        assert!(json.get("bodies").is_none());
        assert!(json.get("products").is_none());
        assert_eq!(json["format"], "STL");
    }

    #[test]
    fn test_mesh_tree() {
        let dir = TempDir::new().unwrap();
        let tree = cad_tree(&two_cubes(&dir)).unwrap();
        assert_eq!(tree.kind, NodeKind::Assembly);
        assert_eq!(tree.children.len(), 2);
        let text = tree_text(&tree);
        assert!(text.starts_with("[A] pair\n  [P] pair_1\n"));
        assert!(text.contains("bounds: [3, 0, 0] → [4, 1, 1]"));
    }

    #[test]
    fn test_step_info_and_tree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tetra.stp");
        std::fs::write(&path, crate::cad::step::tests::TETRA).unwrap();
        let info = cad_info(&path).unwrap();
        assert_eq!(info.format, Format::Step);
        assert_eq!(info.products, vec!["Tetra"]);
        assert_eq!(info.num_bodies, 1);
        assert!(info.is_watertight);
        assert!((info.volume_mm3.unwrap() - 1.0 / 6.0).abs() < 1e-3);
        assert!((info.extents_mm[2] - 1.0).abs() < 1e-6);

        let (_, bodies) = load_bodies(&path).unwrap();
        assert_eq!(bodies[0].name, "Tetra");
        let report = cad_view(&path, None, &ViewOptions::default()).unwrap();
        assert_eq!(report.bodies_drawn, vec!["Tetra"]);

        let bracket = dir.path().join("bracket.step");
        std::fs::write(&bracket, crate::cad::step::tests::ASSEMBLY).unwrap();
        assert_eq!(cad_tree(&bracket).unwrap().children.len(), 3);
        assert!(matches!(cad_info(&bracket), Err(Error::Parse(_))));
    }

    #[test]
    fn test_render_hides_bodies() {
        let bodies = vec![unit_cube("Bracket", [0.0; 3]), unit_cube("Bolt", [3.0, 0.0, 0.0])];
        let options = ViewOptions {
            hide: vec!["bolt".to_string()],
            ..Default::default()
        };
        let svg = render_svg(&bodies, &options);
        assert!(svg.contains(r#"<g id="Bracket" data-name="Bracket""#));
        assert!(!svg.contains("Bolt"));
        assert_eq!(svg.matches("<polygon").count(), 12);

        let options = ViewOptions {
            only: vec!["Bolt".to_string()],
            projection: Projection::Top,
            ..Default::default()
        };
        let svg = render_svg(&bodies, &options);
        assert!(svg.contains(r#"id="Bolt""#));
        assert!(!svg.contains("Bracket"));
    }

    #[test]
    fn test_view_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = two_cubes(&dir);
        let report = cad_view(&path, None, &ViewOptions::default()).unwrap();
        assert_eq!(report.output, dir.path().join("pair.svg"));
        assert_eq!(report.bodies_drawn, vec!["pair_1", "pair_2"]);
        let svg = std::fs::read_to_string(&report.output).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<g ").count(), 2);
    }

    #[test]
    fn test_svg_ids_are_unique() {
        let mut used = HashSet::new();
        assert_eq!(svg_id("part 1", &mut used), "part_1");
        assert_eq!(svg_id("part 1", &mut used), "part_1_2");
        assert_eq!(svg_id("9x", &mut used), "body_9x");
    }
}
