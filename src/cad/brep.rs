//! BRep tessellation through the truck kernel

use truck_meshalgo::prelude::*;
use truck_polymesh::PolygonMesh;
use truck_stepio::r#in::Table;

/// Tolerance of the first pass, which only sizes the model
const COARSE_TOLERANCE: f64 = 0.01;

/// Final chord tolerance relative to the bounding box diameter
const RELATIVE_TOLERANCE: f64 = 0.001;

/// Triangle soup of one shell
#[derive(Debug, Default)]
pub struct ShellMesh {
    pub positions: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

/// Triangulate the shell with entity id `id`; `None` when the table has no
/// such shell or its geometry cannot be converted
pub fn triangulate_shell(table: &Table, id: u64) -> Option<ShellMesh> {
    let holder = table.shell.get(&id)?;
    let shell = table.to_compressed_shell(holder).ok()?;

    let diameter = shell
        .robust_triangulation(COARSE_TOLERANCE)
        .to_polygon()
        .bounding_box()
        .diameter();
    let tolerance = if diameter.is_finite() && diameter > 0.0 {
        diameter * RELATIVE_TOLERANCE
    } else {
        COARSE_TOLERANCE
    };
    Some(shell_mesh(&shell.robust_triangulation(tolerance).to_polygon()))
}

fn shell_mesh(poly: &PolygonMesh) -> ShellMesh {
    let mut mesh = ShellMesh {
        positions: poly.positions().iter().map(|p| [p.x, p.y, p.z]).collect(),
        triangles: Vec::new(),
    };
    for tri in poly.tri_faces() {
        mesh.triangles.push([tri[0].pos, tri[1].pos, tri[2].pos]);
    }
    for quad in poly.quad_faces() {
        mesh.triangles.push([quad[0].pos, quad[1].pos, quad[2].pos]);
        mesh.triangles.push([quad[0].pos, quad[2].pos, quad[3].pos]);
    }
    mesh
}
