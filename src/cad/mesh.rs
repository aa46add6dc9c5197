//! Triangle mesh model and metrics

use super::{round6, round6_all};
use serde::Serialize;
use std::collections::HashMap;

pub type Vec3 = [f64; 3];

/// Coordinates closer than this weld together
const WELD_EPSILON: f64 = 1e-8;

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

pub fn normalize(a: Vec3) -> Vec3 {
    let len = norm(a);
    if len > f64::EPSILON {
        [a[0] / len, a[1] / len, a[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn of<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Bounds { min: first, max: first }, |mut b, p| {
            for i in 0..3 {
                b.min[i] = b.min[i].min(p[i]);
                b.max[i] = b.max[i].max(p[i]);
            }
            b
        }))
    }

    pub fn extents(&self) -> Vec3 {
        sub(self.max, self.min)
    }

    pub fn rounded(&self) -> Self {
        Self {
            min: round6_all(self.min),
            max: round6_all(self.max),
        }
    }

    pub fn rounded_to(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        let round = |v: Vec3| v.map(|x| (x * factor).round() / factor);
        Self {
            min: round(self.min),
            max: round(self.max),
        }
    }
}

/// A named triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Body {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Append a triangle with its own three vertices
    pub fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let base = self.vertices.len() as u32;
        self.vertices.extend([a, b, c]);
        self.faces.push([base, base + 1, base + 2]);
    }

    /// Fan-triangulate a polygon given as vertex indices
    pub fn push_polygon(&mut self, indices: &[u32]) {
        for i in 1..indices.len().saturating_sub(1) {
            self.faces.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Drop faces that reference missing vertices
    pub fn retain_valid_faces(&mut self) -> usize {
        let n = self.vertices.len() as u32;
        let before = self.faces.len();
        self.faces.retain(|f| f.iter().all(|&i| i < n));
        before - self.faces.len()
    }

    pub fn triangle(&self, face: &[u32; 3]) -> [Vec3; 3] {
        face.map(|i| self.vertices[i as usize])
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.faces.iter().map(|f| self.triangle(f))
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(self.used_vertices())
    }

    fn used_vertices(&self) -> impl Iterator<Item = &Vec3> {
        self.faces
            .iter()
            .flat_map(|f| f.iter())
            .map(|&i| &self.vertices[i as usize])
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| norm(cross(sub(b, a), sub(c, a))) / 2.0)
            .sum()
    }

    /// Signed tetrahedron sum against the origin
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| dot(a, cross(b, c)) / 6.0)
            .sum()
    }

    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Area-weighted triangle centroid; the vertex mean for degenerate meshes
    pub fn centroid(&self) -> Vec3 {
        let mut weighted = [0.0; 3];
        let mut total = 0.0;
        for [a, b, c] in self.triangles() {
            let area = norm(cross(sub(b, a), sub(c, a))) / 2.0;
            for i in 0..3 {
                weighted[i] += area * (a[i] + b[i] + c[i]) / 3.0;
            }
            total += area;
        }
        if total > f64::EPSILON {
            return weighted.map(|w| w / total);
        }
        let count = self.vertices.len().max(1) as f64;
        let mut sum = [0.0; 3];
        for v in &self.vertices {
            for i in 0..3 {
                sum[i] += v[i];
            }
        }
        sum.map(|s| s / count)
    }

    /// Merge coincident vertices and remap faces; degenerate faces are dropped
    pub fn welded(&self) -> Body {
        let key = |v: &Vec3| v.map(|c| (c / WELD_EPSILON).round() as i64);
        let mut index: HashMap<[i64; 3], u32> = HashMap::new();
        let mut vertices = Vec::new();
        let remap: Vec<u32> = self
            .vertices
            .iter()
            .map(|v| {
                *index.entry(key(v)).or_insert_with(|| {
                    vertices.push(*v);
                    (vertices.len() - 1) as u32
                })
            })
            .collect();
        let faces = self
            .faces
            .iter()
            .map(|f| f.map(|i| remap[i as usize]))
            .filter(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2])
            .collect();
        Body {
            name: self.name.clone(),
            vertices,
            faces,
        }
    }

    /// Every undirected edge is shared by exactly two faces, after welding
    pub fn is_watertight(&self) -> bool {
        let welded = self.welded();
        if welded.faces.is_empty() {
            return false;
        }
        let mut edges: HashMap<(u32, u32), u32> = HashMap::new();
        for f in &welded.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        edges.values().all(|&count| count == 2)
    }

    /// Connected components over shared (welded) vertices
    pub fn split_components(&self) -> Vec<Body> {
        let welded = self.welded();
        let mut sets = UnionFind::new(welded.vertices.len());
        for f in &welded.faces {
            sets.union(f[0] as usize, f[1] as usize);
            sets.union(f[1] as usize, f[2] as usize);
        }

        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<[u32; 3]>> = HashMap::new();
        for f in &welded.faces {
            let root = sets.find(f[0] as usize);
            groups
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(*f);
        }

        if order.len() <= 1 {
            return vec![Body {
                name: self.name.clone(),
                ..welded
            }];
        }
        order
            .iter()
            .enumerate()
            .filter_map(|(i, root)| {
                let faces = groups.remove(root)?;
                Some(compact(&format!("{}_{}", self.name, i + 1), &welded.vertices, &faces))
            })
            .collect()
    }

    /// Concatenate bodies into one mesh
    pub fn concat(bodies: &[Body], name: &str) -> Body {
        let mut out = Body::new(name);
        for body in bodies {
            let base = out.vertices.len() as u32;
            out.vertices.extend_from_slice(&body.vertices);
            out.faces
                .extend(body.faces.iter().map(|f| f.map(|i| i + base)));
        }
        out
    }
}

/// A body holding only the vertices `faces` reference
fn compact(name: &str, vertices: &[Vec3], faces: &[[u32; 3]]) -> Body {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut body = Body::new(name);
    for f in faces {
        let mapped = f.map(|i| {
            *remap.entry(i).or_insert_with(|| {
                body.vertices.push(vertices[i as usize]);
                (body.vertices.len() - 1) as u32
            })
        });
        body.faces.push(mapped);
    }
    body
}

/// Disjoint sets with path halving and union by size
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

/// Split every body into its connected components
pub fn split_bodies(bodies: Vec<Body>) -> Vec<Body> {
    bodies
        .into_iter()
        .flat_map(|b| b.split_components())
        .filter(|b| !b.is_empty())
        .collect()
}

/// Metrics of one body, rounded for output
#[derive(Debug, Clone, Serialize)]
pub struct BodyReport {
    pub name: String,
    pub num_vertices: usize,
    pub num_faces: usize,
    pub bounds: Bounds,
    pub extents: Vec3,
    pub centroid: Vec3,
    pub is_watertight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mm3: Option<f64>,
    pub surface_area_mm2: f64,
}

impl BodyReport {
    pub fn of(body: &Body) -> Option<Self> {
        let bounds = body.bounds()?;
        let watertight = body.is_watertight();
        Some(Self {
            name: body.name.clone(),
            num_vertices: body.vertices.len(),
            num_faces: body.faces.len(),
            bounds: bounds.rounded(),
            extents: round6_all(bounds.extents()),
            centroid: round6_all(body.centroid()),
            is_watertight: watertight,
            volume_mm3: watertight.then(|| round6(body.volume())),
            surface_area_mm2: round6(body.surface_area()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit cube from 12 triangles with shared corners, outward winding
    pub(crate) fn unit_cube(name: &str, offset: Vec3) -> Body {
        let mut body = Body::new(name);
        for z in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for x in [0.0, 1.0] {
                    body.vertices.push([x + offset[0], y + offset[1], z + offset[2]]);
                }
            }
        }
        body.faces = vec![
            [0, 2, 1], [1, 2, 3], // bottom
            [4, 5, 6], [5, 7, 6], // top
            [0, 1, 4], [1, 5, 4], // front
            [2, 6, 3], [3, 6, 7], // back
            [0, 4, 2], [2, 4, 6], // left
            [1, 3, 5], [3, 7, 5], // right
        ];
        body
    }

    #[test]
    fn test_unit_cube_metrics() {
        let cube = unit_cube("cube", [0.0; 3]);
        assert!((cube.volume() - 1.0).abs() < 1e-12);
        assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
        assert!((cube.surface_area() - 6.0).abs() < 1e-12);
        assert!(cube.is_watertight());
        assert_eq!(cube.bounds().unwrap().extents(), [1.0, 1.0, 1.0]);
        let c = cube.centroid();
        assert!(c.iter().all(|v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_welding_closes_triangle_soup() {
        let cube = unit_cube("cube", [0.0; 3]);
        let mut soup = Body::new("soup");
        for [a, b, c] in cube.triangles() {
            soup.push_triangle(a, b, c);
        }
        assert_eq!(soup.vertices.len(), 36);
        assert_eq!(soup.welded().vertices.len(), 8);
        assert!(soup.is_watertight());

        let mut open = soup.clone();
        open.faces.pop();
        assert!(!open.is_watertight());
    }

    #[test]
    fn test_split_components() {
        let joined = Body::concat(
            &[unit_cube("a", [0.0; 3]), unit_cube("b", [5.0, 0.0, 0.0])],
            "pair",
        );
        let parts = joined.split_components();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "pair_1");
        assert_eq!(parts[1].name, "pair_2");
        assert_eq!(parts[1].vertices.len(), 8);
        assert_eq!(parts[1].bounds().unwrap().min, [5.0, 0.0, 0.0]);

        let single = unit_cube("solo", [0.0; 3]).split_components();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "solo");
    }

    #[test]
    fn test_polygon_fan_and_report() {
        let mut quad = Body::new("quad");
        quad.vertices = vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        quad.push_polygon(&[0, 1, 2, 3]);
        assert_eq!(quad.faces, vec![[0, 1, 2], [0, 2, 3]]);

        let report = BodyReport::of(&quad).unwrap();
        assert_eq!(report.surface_area_mm2, 2.0);
        assert!(!report.is_watertight);
        assert!(report.volume_mm3.is_none());
        assert_eq!(report.extents, [2.0, 1.0, 0.0]);
    }
}
