//! Patch grid fed to the tessellation stage.

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2};

/// Patch control point (position on the XZ plane, texel units)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

/// Grid of quad patches (4 control points each) centred on the origin
pub struct PatchMesh {
    pub vertices: Vec<Vertex>,
    /// 4 indices per patch, nearest patches first
    pub indices: Vec<u32>,
    patch_size: Vec2,
    blocks_count: UVec2,
}

impl PatchMesh {
    /// Create the patch grid
    ///
    /// # Arguments
    /// * `patch_size` - Patch extent in heightmap texels (X, Z)
    /// * `blocks_count` - Number of patches per side (X, Z)
    pub fn new(patch_size: Vec2, blocks_count: UVec2) -> Self {
        let half = patch_size * blocks_count.as_vec2() / 2.0;
        let row = blocks_count.x + 1;

        let mut vertices = Vec::with_capacity(((blocks_count.x + 1) * (blocks_count.y + 1)) as usize);
        for z in 0..=blocks_count.y {
            for x in 0..=blocks_count.x {
                let pos = Vec2::new(x as f32, z as f32) * patch_size - half;
                vertices.push(Vertex {
                    position: [pos.x, 0.0, pos.y],
                });
            }
        }

        // Patch corners in the order the control stage reads them
        let mut patches: Vec<[u32; 4]> = Vec::with_capacity((blocks_count.x * blocks_count.y) as usize);
        for z in 0..blocks_count.y {
            for x in 0..blocks_count.x {
                let origin = z * row + x;
                patches.push([origin, origin + row, origin + row + 1, origin + 1]);
            }
        }

        // Draw near patches first
        let centre = |patch: &[u32; 4]| {
            let a = vertices[patch[0] as usize].position;
            let c = vertices[patch[2] as usize].position;
            Vec2::new(a[0] + c[0], a[2] + c[2]).length_squared()
        };
        patches.sort_by(|a, b| centre(a).total_cmp(&centre(b)));

        Self {
            vertices,
            indices: patches.into_iter().flatten().collect(),
            patch_size,
            blocks_count,
        }
    }

    pub fn patch_count(&self) -> usize {
        self.indices.len() / 4
    }

    /// Extent covered by the grid (texel units)
    pub fn extent(&self) -> Vec2 {
        self.patch_size * self.blocks_count.as_vec2()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_mesh_creation() {
        let mesh = PatchMesh::new(Vec2::splat(32.0), UVec2::new(8, 4));

        // (bx + 1) * (bz + 1) shared control points
        assert_eq!(mesh.vertices.len(), 9 * 5);
        assert_eq!(mesh.patch_count(), 32);
        assert_eq!(mesh.indices.len(), 32 * 4);
        assert_eq!(mesh.extent(), Vec2::new(256.0, 128.0));
        assert_eq!(mesh.vertex_bytes().len(), 45 * 12);
    }

    #[test]
    fn test_grid_is_centred() {
        let mesh = PatchMesh::new(Vec2::splat(16.0), UVec2::new(2, 2));
        assert_eq!(mesh.vertices[0].position, [-16.0, 0.0, -16.0]);
        assert_eq!(mesh.vertices[8].position, [16.0, 0.0, 16.0]);
    }

    #[test]
    fn test_patches_sorted_by_distance() {
        let mesh = PatchMesh::new(Vec2::splat(10.0), UVec2::new(4, 4));
        let distance = |patch: usize| {
            let a = mesh.vertices[mesh.indices[patch * 4] as usize].position;
            let c = mesh.vertices[mesh.indices[patch * 4 + 2] as usize].position;
            Vec2::new(a[0] + c[0], a[2] + c[2]).length()
        };

        for patch in 1..mesh.patch_count() {
            assert!(distance(patch - 1) <= distance(patch));
        }
        // First patch touches the origin
        assert_eq!(distance(0), Vec2::new(10.0, 10.0).length());
    }
}
