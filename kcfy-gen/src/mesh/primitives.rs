//! Procedural primitives
//!
//! All meshes are closed and consistently wound outward, centered on the
//! origin at roughly unit radius.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use super::Mesh;
use crate::models::Primitive;

/// Default knot parameters
pub const KNOT_RADIUS: f32 = 0.8;
pub const KNOT_TUBE: f32 = 0.25;
pub const KNOT_TUBULAR_SEGMENTS: u32 = 100;
pub const KNOT_RADIAL_SEGMENTS: u32 = 16;

const HEART_SEGMENTS: u32 = 64;
const HEART_DEPTH: f32 = 0.4;

/// Mesh for a shape identifier
pub fn build_primitive(primitive: Primitive) -> Mesh {
    match primitive {
        Primitive::Heart => heart(1.0),
        Primitive::Sphere => sphere(1.0, 32, 16),
        Primitive::Cube => cube(1.5),
        Primitive::Torus => torus(0.7, 0.3, 64, 16),
        Primitive::Knot => default_knot(),
    }
}

/// The abstract knot shown when no model has been generated
pub fn default_knot() -> Mesh {
    torus_knot(
        KNOT_RADIUS,
        KNOT_TUBE,
        KNOT_TUBULAR_SEGMENTS,
        KNOT_RADIAL_SEGMENTS,
        2,
        3,
    )
}

/// Axis-aligned cube with edge length `size`
pub fn cube(size: f32) -> Mesh {
    let h = size / 2.0;
    // Vertex index bits: x = bit 0, y = bit 1, z = bit 2
    let vertices = (0..8u32)
        .map(|i| {
            let coord = |bit: u32| if i & bit != 0 { h } else { -h };
            [coord(1), coord(2), coord(4)]
        })
        .collect();

    let faces: [[u32; 4]; 6] = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    let triangles = faces
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .collect();

    Mesh {
        vertices,
        triangles,
    }
}

/// UV sphere with single pole vertices
pub fn sphere(radius: f32, slices: u32, stacks: u32) -> Mesh {
    let slices = slices.max(3);
    let stacks = stacks.max(2);
    let mut mesh = Mesh::default();

    mesh.vertices.push([0.0, radius, 0.0]);
    for stack in 1..stacks {
        let phi = PI * stack as f32 / stacks as f32;
        for slice in 0..slices {
            let theta = TAU * slice as f32 / slices as f32;
            mesh.vertices.push(
                (Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()) * radius)
                    .to_array(),
            );
        }
    }
    mesh.vertices.push([0.0, -radius, 0.0]);

    let top = 0;
    let bottom = mesh.vertices.len() as u32 - 1;
    let ring = |stack: u32, slice: u32| 1 + (stack - 1) * slices + slice % slices;

    for slice in 0..slices {
        mesh.triangles
            .push([top, ring(1, slice), ring(1, slice + 1)]);
    }
    for stack in 1..stacks - 1 {
        for slice in 0..slices {
            push_quad(
                &mut mesh,
                [
                    ring(stack, slice),
                    ring(stack + 1, slice),
                    ring(stack + 1, slice + 1),
                    ring(stack, slice + 1),
                ],
            );
        }
    }
    for slice in 0..slices {
        mesh.triangles
            .push([bottom, ring(stacks - 1, slice + 1), ring(stacks - 1, slice)]);
    }

    orient_outward(&mut mesh);
    mesh
}

/// Ring torus in the XY plane
pub fn torus(radius: f32, tube: f32, tubular_segments: u32, radial_segments: u32) -> Mesh {
    let mut mesh = periodic_grid(tubular_segments, radial_segments, |u, v| {
        let ring = Vec3::new(u.cos(), u.sin(), 0.0);
        ring * (radius + tube * v.cos()) + Vec3::Z * tube * v.sin()
    });
    orient_outward(&mut mesh);
    mesh
}

/// (p, q) torus knot swept with a circular tube
pub fn torus_knot(
    radius: f32,
    tube: f32,
    tubular_segments: u32,
    radial_segments: u32,
    p: u32,
    q: u32,
) -> Mesh {
    let p = p.max(1) as f32;
    let q = q as f32;

    let curve = |u: f32| {
        let qu = q / p * u;
        let cs = qu.cos();
        Vec3::new(
            radius * (2.0 + cs) * 0.5 * u.cos(),
            radius * (2.0 + cs) * 0.5 * u.sin(),
            radius * qu.sin() * 0.5,
        )
    };

    let mut mesh = periodic_grid(tubular_segments, radial_segments, |t, v| {
        // Curve parameter runs over p full turns
        let u = t * p;
        let p1 = curve(u);
        let p2 = curve(u + 0.01);
        let tangent = p2 - p1;
        let binormal = tangent.cross(p2 + p1).normalize_or_zero();
        let normal = binormal.cross(tangent).normalize_or_zero();
        p1 + normal * (-tube * v.cos()) + binormal * (tube * v.sin())
    });
    mesh.center();
    orient_outward(&mut mesh);
    mesh
}

/// Extruded heart outline, depth along Z
pub fn heart(scale: f32) -> Mesh {
    let n = HEART_SEGMENTS;
    let half_depth = HEART_DEPTH * scale / 2.0;

    let outline: Vec<Vec2> = (0..n)
        .map(|i| {
            let t = TAU * i as f32 / n as f32;
            let x = 16.0 * t.sin().powi(3);
            let y = 13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos();
            Vec2::new(x, y) * (scale / 16.0)
        })
        .collect();

    let mut mesh = Mesh::default();
    for z in [half_depth, -half_depth] {
        mesh.vertices
            .extend(outline.iter().map(|p| [p.x, p.y, z]));
    }
    let center = Vec2::new(0.0, -3.0) * (scale / 16.0);
    let front_center = mesh.vertices.len() as u32;
    mesh.vertices.push([center.x, center.y, half_depth]);
    let back_center = front_center + 1;
    mesh.vertices.push([center.x, center.y, -half_depth]);

    for i in 0..n {
        let j = (i + 1) % n;
        mesh.triangles.push([front_center, j, i]);
        mesh.triangles.push([back_center, n + i, n + j]);
        mesh.triangles.push([i, j, n + i]);
        mesh.triangles.push([j, n + j, n + i]);
    }

    mesh.center();
    orient_outward(&mut mesh);
    mesh
}

/// Surface over a grid that wraps in both directions
///
/// `f(u, v)` receives angles in `[0, 2π)`.
fn periodic_grid(rows: u32, cols: u32, f: impl Fn(f32, f32) -> Vec3) -> Mesh {
    let rows = rows.max(3);
    let cols = cols.max(3);
    let mut mesh = Mesh::default();

    for row in 0..rows {
        let u = TAU * row as f32 / rows as f32;
        for col in 0..cols {
            let v = TAU * col as f32 / cols as f32;
            mesh.vertices.push(f(u, v).to_array());
        }
    }

    let index = |row: u32, col: u32| (row % rows) * cols + col % cols;
    for row in 0..rows {
        for col in 0..cols {
            push_quad(
                &mut mesh,
                [
                    index(row, col),
                    index(row + 1, col),
                    index(row + 1, col + 1),
                    index(row, col + 1),
                ],
            );
        }
    }
    mesh
}

fn push_quad(mesh: &mut Mesh, [a, b, c, d]: [u32; 4]) {
    mesh.triangles.push([a, b, c]);
    mesh.triangles.push([a, c, d]);
}

/// Flip a consistently wound closed mesh so its faces point outward
fn orient_outward(mesh: &mut Mesh) {
    if mesh.signed_volume() < 0.0 {
        mesh.flip();
    }
}
