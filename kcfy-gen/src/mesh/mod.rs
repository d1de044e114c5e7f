//! Triangle meshes for the viewer and STL export

pub mod glb;
pub mod primitives;
pub mod stl;

use glam::Vec3;
use thiserror::Error;

pub use primitives::build_primitive;
pub use stl::{to_ascii_stl, to_binary_stl};

/// Mesh loading errors
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Invalid GLB container: {0}")]
    InvalidContainer(String),

    #[error("Unsupported glTF content: {0}")]
    Unsupported(String),

    #[error("Model contains no triangles")]
    Empty,
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Append another mesh, re-basing its indices
    pub fn append(&mut self, other: Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.triangles
            .extend(other.triangles.into_iter().map(|t| [t[0] + base, t[1] + base, t[2] + base]));
    }

    /// Axis-aligned bounds, `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(*v));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v))))
    }

    /// Move the bounding-box center to the origin
    pub fn center(&mut self) {
        if let Some((min, max)) = self.bounds() {
            let center = (min + max) * 0.5;
            for v in &mut self.vertices {
                *v = (Vec3::from_array(*v) - center).to_array();
            }
        }
    }

    /// Center, then scale uniformly so the largest dimension equals `size`
    pub fn fit_to(&mut self, size: f32) {
        self.center();
        if let Some((min, max)) = self.bounds() {
            let max_dim = (max - min).max_element();
            if max_dim > f32::EPSILON {
                let scale = size / max_dim;
                for v in &mut self.vertices {
                    *v = (Vec3::from_array(*v) * scale).to_array();
                }
            }
        }
    }

    /// Signed enclosed volume; positive when faces wind outward
    pub fn signed_volume(&self) -> f32 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_vertices(i);
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Reverse every triangle's winding
    pub fn flip(&mut self) {
        for t in &mut self.triangles {
            t.swap(1, 2);
        }
    }

    /// Face normal of triangle `index` (zero for degenerate faces)
    pub fn face_normal(&self, index: usize) -> Vec3 {
        let [a, b, c] = self.triangle_vertices(index);
        (b - a).cross(c - a).normalize_or_zero()
    }

    pub fn triangle_vertices(&self, index: usize) -> [Vec3; 3] {
        let t = self.triangles[index];
        [
            Vec3::from_array(self.vertices[t[0] as usize]),
            Vec3::from_array(self.vertices[t[1] as usize]),
            Vec3::from_array(self.vertices[t[2] as usize]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_fit_to_scales_largest_dimension() {
        let mut mesh = triangle();
        mesh.fit_to(2.0);
        let (min, max) = mesh.bounds().unwrap();
        assert!(((max - min).x - 2.0).abs() < 1e-5);
        assert!(((max - min).y - 1.0).abs() < 1e-5);
        assert!((min + max).length() < 1e-5);
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = triangle();
        mesh.append(triangle());
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles[1], [3, 4, 5]);
    }

    #[test]
    fn test_face_normal() {
        let mesh = triangle();
        assert_eq!(mesh.face_normal(0), Vec3::Z);
    }
}
