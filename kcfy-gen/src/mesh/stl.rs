use std::fmt::Write;

use super::Mesh;

/// Binary STL: 80-byte header, u32 triangle count, 50 bytes per facet
pub fn to_binary_stl(mesh: &Mesh, name: &str) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(84 + mesh.triangles.len() * 50);

    let mut header = [0u8; 80];
    let name_bytes = name.as_bytes();
    let header_len = name_bytes.len().min(80);
    header[..header_len].copy_from_slice(&name_bytes[..header_len]);
    bytes.extend_from_slice(&header);

    let tri_count = mesh.triangles.len() as u32;
    bytes.extend_from_slice(&tri_count.to_le_bytes());

    for index in 0..mesh.triangles.len() {
        let [a, b, c] = mesh.triangle_vertices(index);
        let n = mesh.face_normal(index);

        for v in [n, a, b, c] {
            for component in v.to_array() {
                bytes.extend_from_slice(&component.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }

    bytes
}

pub fn to_ascii_stl(mesh: &Mesh, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "solid {}", name);

    for index in 0..mesh.triangles.len() {
        let n = mesh.face_normal(index);
        let _ = writeln!(out, "  facet normal {} {} {}", n.x, n.y, n.z);
        out.push_str("    outer loop\n");
        for v in mesh.triangle_vertices(index) {
            let _ = writeln!(out, "      vertex {} {} {}", v.x, v.y, v.z);
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }

    let _ = writeln!(out, "endsolid {}", name);
    out
}
