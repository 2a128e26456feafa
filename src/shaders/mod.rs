// SPDX-License-Identifier: GPL-3.0-only
//! WGSL shader sources

use bytemuck::{Pod, Zeroable};

/// Full-screen textured quad (`vs_main` / `fs_main`)
pub const QUAD_SHADER: &str = include_str!("frame_quad.wgsl");

/// Vertex of the full-screen quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Triangle-strip order: top-left, bottom-left, top-right, bottom-right
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 1.0],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("Shader '{}' parse failed: {:?}", name, e),
        };

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module);

        if let Err(e) = info {
            panic!("Shader '{}' validation failed: {:?}", name, e);
        }
    }

    #[test]
    fn test_quad_shader_validates() {
        validate_shader("frame_quad", QUAD_SHADER);
    }

    #[test]
    fn test_quad_shader_entry_points() {
        let module = naga::front::wgsl::parse_str(QUAD_SHADER).unwrap();
        let names: Vec<&str> = module
            .entry_points
            .iter()
            .map(|ep| ep.name.as_str())
            .collect();
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }

    #[test]
    fn test_quad_vertex_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn test_quad_covers_clip_space() {
        // Every corner of clip space appears exactly once
        for corner in [[-1.0, 1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, -1.0]] {
            let count = QUAD_VERTICES
                .iter()
                .filter(|v| v.position == corner)
                .count();
            assert_eq!(count, 1);
        }
    }
}
