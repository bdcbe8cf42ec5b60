//! STL reader (ASCII and binary).
//!
//! Binary STL is detected by its size: an 80-byte header, a little-endian
//! `u32` triangle count and exactly 50 bytes per triangle.  Anything else
//! that starts with `solid` is parsed as ASCII.  Facet normals stored in
//! the file are ignored; normals are recomputed from the welded geometry.

use std::path::Path;

use espeleo_types::PlannerError;
use tracing::{debug, info};

use crate::geometry::Vec3;
use crate::mesh::TriangleMesh;

const BINARY_HEADER_LEN: usize = 80;
const BINARY_TRIANGLE_LEN: usize = 50;

/// Read an STL file and weld it into a [`TriangleMesh`].
pub fn load_stl(path: &Path) -> Result<TriangleMesh, PlannerError> {
    let bytes = std::fs::read(path)
        .map_err(|e| PlannerError::MeshIo(format!("{}: {}", path.display(), e)))?;
    let triangles = parse_stl(&bytes)?;
    let mesh = TriangleMesh::from_triangles(&triangles)?;
    info!(
        path = %path.display(),
        triangles = mesh.triangle_count(),
        vertices = mesh.vertex_count(),
        "mesh loaded"
    );
    Ok(mesh)
}

/// Parse raw STL bytes into triangle soup.
pub fn parse_stl(bytes: &[u8]) -> Result<Vec<[Vec3; 3]>, PlannerError> {
    let triangles = if is_binary(bytes) {
        debug!(len = bytes.len(), "parsing binary STL");
        parse_binary(bytes)?
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        debug!(len = bytes.len(), "parsing ASCII STL");
        parse_ascii(bytes)?
    } else {
        return Err(PlannerError::MeshParse(
            "not an STL file: neither ASCII 'solid' nor a valid binary layout".to_string(),
        ));
    };

    if triangles.is_empty() {
        return Err(PlannerError::EmptyMesh);
    }
    Ok(triangles)
}

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < BINARY_HEADER_LEN + 4 {
        return false;
    }
    let count = read_u32(bytes, BINARY_HEADER_LEN) as usize;
    count
        .checked_mul(BINARY_TRIANGLE_LEN)
        .and_then(|n| n.checked_add(BINARY_HEADER_LEN + 4))
        == Some(bytes.len())
}

fn parse_binary(bytes: &[u8]) -> Result<Vec<[Vec3; 3]>, PlannerError> {
    let count = read_u32(bytes, BINARY_HEADER_LEN) as usize;
    let mut triangles = Vec::with_capacity(count);
    for t in 0..count {
        // Skip the 12-byte facet normal.
        let base = BINARY_HEADER_LEN + 4 + t * BINARY_TRIANGLE_LEN + 12;
        let corner = |k: usize| {
            let off = base + k * 12;
            Vec3::new(
                read_f32(bytes, off) as f64,
                read_f32(bytes, off + 4) as f64,
                read_f32(bytes, off + 8) as f64,
            )
        };
        let tri = [corner(0), corner(1), corner(2)];
        if tri.iter().any(|v| !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite())) {
            return Err(PlannerError::MeshParse(format!(
                "triangle {t} has a non-finite coordinate"
            )));
        }
        triangles.push(tri);
    }
    Ok(triangles)
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<[Vec3; 3]>, PlannerError> {
    let text = String::from_utf8_lossy(bytes);
    let mut tokens = text.split_whitespace();
    let mut corners: Vec<Vec3> = Vec::new();

    while let Some(tok) = tokens.next() {
        if !tok.eq_ignore_ascii_case("vertex") {
            continue;
        }
        let mut coord = [0.0f64; 3];
        for c in coord.iter_mut() {
            let raw = tokens.next().ok_or_else(|| {
                PlannerError::MeshParse(format!("truncated vertex #{}", corners.len()))
            })?;
            *c = raw.parse::<f64>().map_err(|e| {
                PlannerError::MeshParse(format!("bad coordinate '{raw}': {e}"))
            })?;
            if !c.is_finite() {
                return Err(PlannerError::MeshParse(format!("non-finite coordinate '{raw}'")));
            }
        }
        corners.push(Vec3::from_array(coord));
    }

    if corners.len() % 3 != 0 {
        return Err(PlannerError::MeshParse(format!(
            "{} vertices do not form whole triangles",
            corners.len()
        )));
    }

    Ok(corners.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

fn read_f32(bytes: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_SQUARE: &str = "solid square
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid square
";

    fn binary_stl(triangles: &[[[f32; 3]; 3]], header: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; BINARY_HEADER_LEN];
        out[..header.len()].copy_from_slice(header);
        out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            for _ in 0..3 {
                out.extend_from_slice(&0f32.to_le_bytes());
            }
            for corner in tri {
                for v in corner {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out
    }

    #[test]
    fn parses_ascii_square() {
        let tris = parse_stl(ASCII_SQUARE.as_bytes()).unwrap();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[1][2], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn parses_binary_even_with_solid_header() {
        // Many exporters write "solid" into the binary header too.
        let bytes = binary_stl(
            &[[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.5]]],
            b"solid exported-by-cad",
        );
        let tris = parse_stl(&bytes).unwrap();
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0][2], Vec3::new(0.0, 2.0, 0.5));
    }

    #[test]
    fn ascii_with_partial_triangle_is_rejected() {
        let text = "solid x\n vertex 0 0 0\n vertex 1 0 0\nendsolid x\n";
        assert!(matches!(parse_stl(text.as_bytes()), Err(PlannerError::MeshParse(_))));
    }

    #[test]
    fn ascii_with_bad_number_is_rejected() {
        let text = "solid x\n vertex 0 zero 0\n";
        assert!(matches!(parse_stl(text.as_bytes()), Err(PlannerError::MeshParse(_))));
    }

    #[test]
    fn ascii_without_facets_is_empty() {
        assert_eq!(parse_stl(b"solid empty\nendsolid empty\n"), Err(PlannerError::EmptyMesh));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(parse_stl(b"\x00\x01garbage"), Err(PlannerError::MeshParse(_))));
    }

    #[test]
    fn load_stl_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = load_stl(&dir.path().join("missing.stl")).unwrap_err();
        assert!(matches!(err, PlannerError::MeshIo(_)));
    }

    #[test]
    fn load_stl_welds_file_contents() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("square.stl");
        std::fs::write(&path, ASCII_SQUARE).expect("write");
        let mesh = load_stl(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }
}
