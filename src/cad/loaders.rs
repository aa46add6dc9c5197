//! STL, OBJ, PLY and OFF readers, and a binary STL writer

use super::mesh::{cross, normalize, sub, Body, Vec3};
use crate::error::{Error, Result};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// STL binary header size in bytes
const STL_HEADER: usize = 80;

/// Normal, three vertices, attribute count
const STL_TRIANGLE: usize = 50;

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string())
}

fn parse_f64(token: Option<&str>, what: &str) -> Result<f64> {
    token
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| Error::Parse(format!("invalid {} '{}'", what, token.unwrap_or(""))))
}

// ===== STL =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StlEncoding {
    #[serde(rename = "ASCII")]
    Ascii,
    #[serde(rename = "binary")]
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StlTriangle {
    pub normal: Vec3,
    pub vertices: [Vec3; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct StlSolid {
    pub name: String,
    pub triangles: Vec<StlTriangle>,
}

#[derive(Debug, Clone)]
pub struct StlFile {
    pub encoding: StlEncoding,
    /// Binary header text, NULs stripped
    pub header: Option<String>,
    pub solids: Vec<StlSolid>,
}

impl StlFile {
    pub fn triangles(&self) -> impl Iterator<Item = &StlTriangle> {
        self.solids.iter().flat_map(|s| s.triangles.iter())
    }

    pub fn triangle_count(&self) -> usize {
        self.solids.iter().map(|s| s.triangles.len()).sum()
    }

    /// One body per solid
    pub fn bodies(&self) -> Vec<Body> {
        self.solids
            .iter()
            .map(|solid| {
                let mut body = Body::new(&solid.name);
                for t in &solid.triangles {
                    let [a, b, c] = t.vertices;
                    body.push_triangle(a, b, c);
                }
                body
            })
            .collect()
    }
}

/// Binary when the size matches the declared triangle count, or the file
/// does not start with `solid`, or the header holds a NUL
pub fn stl_is_binary(data: &[u8]) -> bool {
    if data.len() >= STL_HEADER + 4 {
        let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
        if data.len() == STL_HEADER + 4 + count * STL_TRIANGLE {
            return true;
        }
    }
    let head = &data[..data.len().min(STL_HEADER)];
    !head.starts_with(b"solid") || head.contains(&0)
}

pub fn read_stl(path: &Path) -> Result<StlFile> {
    let data = std::fs::read(path)?;
    parse_stl(&data, &file_stem(path))
}

pub fn parse_stl(data: &[u8], default_name: &str) -> Result<StlFile> {
    if stl_is_binary(data) {
        parse_stl_binary(data, default_name)
    } else {
        parse_stl_ascii(&String::from_utf8_lossy(data), default_name)
    }
}

fn read_vec3(buf: &[u8]) -> Vec3 {
    let f = |i: usize| f64::from(f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]));
    [f(0), f(4), f(8)]
}

fn parse_stl_binary(data: &[u8], default_name: &str) -> Result<StlFile> {
    if data.len() < STL_HEADER + 4 {
        return Err(Error::Parse("file too small to be a binary STL".to_string()));
    }
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    let available = (data.len() - STL_HEADER - 4) / STL_TRIANGLE;
    if available < count {
        warn!("STL declares {} triangles but holds {}", count, available);
    }

    let triangles = data[STL_HEADER + 4..]
        .chunks_exact(STL_TRIANGLE)
        .take(count)
        .map(|t| StlTriangle {
            normal: read_vec3(&t[0..12]),
            vertices: [read_vec3(&t[12..24]), read_vec3(&t[24..36]), read_vec3(&t[36..48])],
        })
        .collect();

    let header = String::from_utf8_lossy(&data[..STL_HEADER])
        .trim_end_matches('\0')
        .trim()
        .to_string();
    Ok(StlFile {
        encoding: StlEncoding::Binary,
        header: Some(header),
        solids: vec![StlSolid {
            name: default_name.to_string(),
            triangles,
        }],
    })
}

fn parse_stl_ascii(text: &str, default_name: &str) -> Result<StlFile> {
    let mut solids: Vec<StlSolid> = Vec::new();
    let mut current: Option<StlSolid> = None;
    let mut normal = [0.0; 3];
    let mut loop_vertices: Vec<Vec3> = Vec::with_capacity(3);

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        match keyword.to_ascii_lowercase().as_str() {
            "solid" => {
                solids.extend(current.take());
                let name = parts.collect::<Vec<_>>().join(" ");
                current = Some(StlSolid {
                    name: if name.is_empty() { default_name.to_string() } else { name },
                    triangles: Vec::new(),
                });
            }
            "facet" => {
                // facet normal nx ny nz
                parts.next();
                normal = [
                    parse_f64(parts.next(), "normal")?,
                    parse_f64(parts.next(), "normal")?,
                    parse_f64(parts.next(), "normal")?,
                ];
                loop_vertices.clear();
            }
            "vertex" => loop_vertices.push([
                parse_f64(parts.next(), "vertex")?,
                parse_f64(parts.next(), "vertex")?,
                parse_f64(parts.next(), "vertex")?,
            ]),
            "endfacet" => {
                if let [a, b, c] = loop_vertices[..] {
                    current
                        .get_or_insert_with(|| StlSolid {
                            name: default_name.to_string(),
                            triangles: Vec::new(),
                        })
                        .triangles
                        .push(StlTriangle {
                            normal,
                            vertices: [a, b, c],
                        });
                }
                loop_vertices.clear();
            }
            "endsolid" => solids.extend(current.take()),
            _ => {}
        }
    }
    solids.extend(current);

    Ok(StlFile {
        encoding: StlEncoding::Ascii,
        header: None,
        solids,
    })
}

/// Binary STL of all bodies, normals recomputed from the winding
pub fn write_stl_binary(bodies: &[Body], path: &Path, title: &str) -> Result<usize> {
    let count: usize = bodies.iter().map(|b| b.faces.len()).sum();
    let count_u32 = u32::try_from(count)
        .map_err(|_| Error::Invalid(format!("{} triangles exceed the STL limit", count)))?;

    let mut out = Vec::with_capacity(STL_HEADER + 4 + count * STL_TRIANGLE);
    let mut header = [0u8; STL_HEADER];
    let title = title.as_bytes();
    let n = title.len().min(STL_HEADER);
    header[..n].copy_from_slice(&title[..n]);
    out.extend_from_slice(&header);
    out.extend_from_slice(&count_u32.to_le_bytes());

    for [a, b, c] in bodies.iter().flat_map(|body| body.triangles()) {
        let normal = normalize(cross(sub(b, a), sub(c, a)));
        for v in [normal, a, b, c] {
            for coord in v {
                out.extend_from_slice(&(coord as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    std::fs::write(path, out)?;
    Ok(count)
}

// ===== OBJ =====

/// `o` and `g` start bodies; polygons are fan-triangulated
pub fn read_obj(path: &Path) -> Result<Vec<Body>> {
    parse_obj(&std::fs::read_to_string(path)?, &file_stem(path))
}

pub fn parse_obj(text: &str, default_name: &str) -> Result<Vec<Body>> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut bodies: Vec<Body> = Vec::new();
    let mut current = Body::new(default_name);
    // Global vertex index to index within the current body
    let mut local: HashMap<usize, u32> = HashMap::new();

    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => positions.push([
                parse_f64(parts.next(), "vertex")?,
                parse_f64(parts.next(), "vertex")?,
                parse_f64(parts.next(), "vertex")?,
            ]),
            Some(kind @ ("o" | "g")) => {
                let name = parts.collect::<Vec<_>>().join(" ");
                if kind == "g" && name.is_empty() {
                    continue;
                }
                if !current.is_empty() {
                    bodies.push(std::mem::replace(&mut current, Body::new(&name)));
                } else {
                    current.name = name;
                }
                local.clear();
            }
            Some("f") => {
                let mut polygon = Vec::new();
                for token in parts {
                    // v, v/vt, v//vn or v/vt/vn; negative indices count from the end
                    let raw: i64 = token
                        .split('/')
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| Error::Parse(format!("invalid face index '{}'", token)))?;
                    let global = if raw < 0 {
                        positions.len() as i64 + raw
                    } else {
                        raw - 1
                    };
                    let position = usize::try_from(global)
                        .ok()
                        .and_then(|g| positions.get(g).map(|p| (g, *p)))
                        .ok_or_else(|| Error::Parse(format!("face index {} out of range", raw)))?;
                    let index = *local.entry(position.0).or_insert_with(|| {
                        current.vertices.push(position.1);
                        (current.vertices.len() - 1) as u32
                    });
                    polygon.push(index);
                }
                current.push_polygon(&polygon);
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        bodies.push(current);
    }
    Ok(bodies)
}

// ===== PLY =====

fn ply_scalar(element: &DefaultElement, key: &str) -> Option<f64> {
    Some(match element.get(key)? {
        Property::Char(v) => f64::from(*v),
        Property::UChar(v) => f64::from(*v),
        Property::Short(v) => f64::from(*v),
        Property::UShort(v) => f64::from(*v),
        Property::Int(v) => f64::from(*v),
        Property::UInt(v) => f64::from(*v),
        Property::Float(v) => f64::from(*v),
        Property::Double(v) => *v,
        _ => return None,
    })
}

/// Negative indices map to `u32::MAX` so the face is dropped as out of range
fn ply_indices(element: &DefaultElement) -> Option<Vec<u32>> {
    let signed = |v: i64| u32::try_from(v).unwrap_or(u32::MAX);
    ["vertex_indices", "vertex_index"]
        .iter()
        .find_map(|key| match element.get(*key)? {
            Property::ListChar(v) => Some(v.iter().map(|&i| signed(i64::from(i))).collect()),
            Property::ListUChar(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
            Property::ListShort(v) => Some(v.iter().map(|&i| signed(i64::from(i))).collect()),
            Property::ListUShort(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
            Property::ListInt(v) => Some(v.iter().map(|&i| signed(i64::from(i))).collect()),
            Property::ListUInt(v) => Some(v.clone()),
            _ => None,
        })
}

/// PLY in any encoding with vertex and face elements
pub fn read_ply(path: &Path) -> Result<Body> {
    parse_ply(&std::fs::read(path)?, &file_stem(path))
}

pub fn parse_ply(data: &[u8], name: &str) -> Result<Body> {
    let mut reader = data;
    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| Error::Parse(format!("PLY header: {}", e)))?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| Error::Parse(format!("PLY payload: {}", e)))?;

    let mut body = Body::new(name);
    for vertex in payload.get("vertex").into_iter().flatten() {
        body.vertices.push([
            ply_scalar(vertex, "x").unwrap_or(0.0),
            ply_scalar(vertex, "y").unwrap_or(0.0),
            ply_scalar(vertex, "z").unwrap_or(0.0),
        ]);
    }
    for face in payload.get("face").into_iter().flatten() {
        if let Some(indices) = ply_indices(face) {
            body.push_polygon(&indices);
        }
    }

    let dropped = body.retain_valid_faces();
    if dropped > 0 {
        warn!("dropped {} PLY faces with out-of-range indices", dropped);
    }
    debug!("PLY {}: {} vertices, {} faces", name, body.vertices.len(), body.faces.len());
    Ok(body)
}

// ===== OFF =====

pub fn read_off(path: &Path) -> Result<Body> {
    parse_off(&std::fs::read_to_string(path)?, &file_stem(path))
}

pub fn parse_off(text: &str, name: &str) -> Result<Body> {
    let mut tokens = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or_default())
        .flat_map(str::split_whitespace);

    match tokens.next() {
        Some(magic) if magic.ends_with("OFF") => {}
        _ => return Err(Error::Parse("missing OFF header".to_string())),
    }
    let mut count = |what: &str| -> Result<usize> {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::Parse(format!("invalid OFF {}", what)))
    };
    let vertex_count = count("vertex count")?;
    let face_count = count("face count")?;
    let _edges = count("edge count")?;

    let mut body = Body::new(name);
    for _ in 0..vertex_count {
        body.vertices.push([
            parse_f64(tokens.next(), "vertex")?,
            parse_f64(tokens.next(), "vertex")?,
            parse_f64(tokens.next(), "vertex")?,
        ]);
    }
    for _ in 0..face_count {
        let n: usize = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::Parse("invalid OFF face".to_string()))?;
        let polygon = (0..n)
            .map(|_| {
                tokens
                    .next()
                    .and_then(|t| t.parse::<u32>().ok())
                    .ok_or_else(|| Error::Parse("invalid OFF face index".to_string()))
            })
            .collect::<Result<Vec<u32>>>()?;
        body.push_polygon(&polygon);
        // Trailing per-face colour values stay on the line; skip to the next count
    }
    body.retain_valid_faces();
    Ok(body)
}
