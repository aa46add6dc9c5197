//! CAD viewer and mechanical file tools
//!
//! Meshes (STL, OBJ, PLY, OFF, glTF/GLB) load into [`mesh::Body`] values for
//! analysis and SVG rendering. STEP, IGES, DXF, SVG and PDF are inspected as
//! text or structure only; there is no BRep kernel here.

pub mod brep;
pub mod dxf;
pub mod gltf;
pub mod iges;
pub mod loaders;
pub mod mech;
pub mod mesh;
pub mod pdf;
pub mod step;
pub mod svg;
pub mod viewer;

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// File formats known to the CAD and mechanical tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Stl,
    Obj,
    Ply,
    Off,
    Gltf,
    Glb,
    Step,
    Iges,
    Dxf,
    Dwg,
    Svg,
    Pdf,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        Some(match ext.as_str() {
            "stl" => Format::Stl,
            "obj" => Format::Obj,
            "ply" => Format::Ply,
            "off" => Format::Off,
            "gltf" => Format::Gltf,
            "glb" => Format::Glb,
            "step" | "stp" => Format::Step,
            "iges" | "igs" => Format::Iges,
            "dxf" => Format::Dxf,
            "dwg" => Format::Dwg,
            "svg" => Format::Svg,
            "pdf" => Format::Pdf,
            _ => return None,
        })
    }

    /// Formats that load as triangle meshes
    pub fn is_mesh(self) -> bool {
        matches!(
            self,
            Format::Stl | Format::Obj | Format::Ply | Format::Off | Format::Gltf | Format::Glb
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Stl => "STL",
            Format::Obj => "OBJ",
            Format::Ply => "PLY",
            Format::Off => "OFF",
            Format::Gltf => "GLTF",
            Format::Glb => "GLB",
            Format::Step => "STEP",
            Format::Iges => "IGES",
            Format::Dxf => "DXF",
            Format::Dwg => "DWG",
            Format::Svg => "SVG",
            Format::Pdf => "PDF",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect from the extension, failing with the extension in the message
pub fn detect_format(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(none)".to_string());
        Error::Unsupported(format!("unsupported format: {}", ext))
    })
}

pub(crate) fn file_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(Error::NotFound(format!("file not found: {}", path.display())));
    }
    Ok(std::fs::metadata(path)?.len())
}

/// Round to 6 decimals for reports
pub(crate) fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub(crate) fn round6_all(values: [f64; 3]) -> [f64; 3] {
    values.map(round6)
}

/// Counts sorted most common first, ties by name
pub(crate) fn ranked(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// JSON object keeping the ranked order
pub(crate) fn ranked_json(ranked: &[(String, usize)]) -> Value {
    Value::Object(
        ranked
            .iter()
            .map(|(name, count)| (name.clone(), Value::from(*count)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(Format::from_path(Path::new("a/part.STP")), Some(Format::Step));
        assert_eq!(Format::from_path(Path::new("scan.ply")), Some(Format::Ply));
        assert!(Format::Glb.is_mesh());
        assert!(!Format::Step.is_mesh());
        assert!(matches!(detect_format(Path::new("x.foo")), Err(Error::Unsupported(_))));
        assert_eq!(round6(1.23456789), 1.234568);
    }
}
