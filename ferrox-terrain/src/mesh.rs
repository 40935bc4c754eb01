//! Chunk-local mesh generation: sample the graph over a grid, triangulate (external
//! collaborator — see [`Triangulator`]), shade by height, and split steep faces into a rock
//! sub-mesh (§4.11).

use glam::Vec3;

use ferrox_scene::components::{Material, MaterialShader, Mesh as SceneMesh, MeshSubset};
use ferrox_scene::Scene;

use crate::graph::{Graph, NodeId};

/// The height-grid-to-triangles step is an external collaborator: this crate only needs the
/// contract "heights in, points + triangles out" to stay runnable standalone (§9 open
/// question). [`GridTriangulator`] is a reference implementation, not the production one.
pub trait Triangulator {
    /// `heights[y * width + x]` for a `width x height` grid of world-space-spaced samples.
    /// Returns world-space vertex positions and CCW triangle index triples.
    fn triangulate(&self, heights: &[f32], width: usize, height: usize, cell_size: f32) -> (Vec<Vec3>, Vec<[u32; 3]>);
}

/// Two triangles per grid cell, the simplest possible triangulation.
#[derive(Debug, Default)]
pub struct GridTriangulator;

impl Triangulator for GridTriangulator {
    fn triangulate(&self, heights: &[f32], width: usize, height: usize, cell_size: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let mut positions = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                positions.push(Vec3::new(
                    x as f32 * cell_size,
                    heights[y * width + x],
                    y as f32 * cell_size,
                ));
            }
        }

        let mut triangles = Vec::with_capacity((width - 1) * (height - 1) * 2);
        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let i0 = (y * width + x) as u32;
                let i1 = (y * width + x + 1) as u32;
                let i2 = ((y + 1) * width + x) as u32;
                let i3 = ((y + 1) * width + x + 1) as u32;
                triangles.push([i0, i2, i1]);
                triangles.push([i1, i2, i3]);
            }
        }
        (positions, triangles)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkDesc {
    pub origin_x: f64,
    pub origin_y: f64,
    pub grid_resolution: usize,
    pub cell_size: f32,
    pub height_scale: f32,
    /// Triangles whose normal's dot with `+Y` falls below this are classed as rock (§4.11).
    pub rock_dot_threshold: f32,
}

impl Default for ChunkDesc {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            grid_resolution: 33,
            cell_size: 1.0,
            height_scale: 20.0,
            rock_dot_threshold: 0.55,
        }
    }
}

/// A gradient from low (grass green) to high (snow white), used to color terrain vertices by
/// normalized height (§4.11).
fn terrain_gradient(t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let low = Vec3::new(0.18, 0.42, 0.16);
    let mid = Vec3::new(0.55, 0.5, 0.3);
    let high = Vec3::new(0.95, 0.95, 0.97);
    let color = if t < 0.5 {
        low.lerp(mid, t / 0.5)
    } else {
        mid.lerp(high, (t - 0.5) / 0.5)
    };
    [(color.x * 255.0) as u8, (color.y * 255.0) as u8, (color.z * 255.0) as u8, 255]
}

const ROCK_COLOR: [u8; 4] = [110, 104, 98, 255];

/// Samples `graph` over `desc`'s grid, triangulates with `triangulator`, and returns a staging
/// scene holding one object + one mesh (terrain + rock subsets) + two materials, ready to be
/// merged into the main scene at the next `ThreadSafePoint` (§4.11).
pub fn generate_chunk_mesh(
    graph: &Graph,
    root: NodeId,
    desc: &ChunkDesc,
    triangulator: &dyn Triangulator,
) -> Scene {
    let n = desc.grid_resolution;
    let mut heights = vec![0f32; n * n];
    let mut min_height = f32::MAX;
    let mut max_height = f32::MIN;
    for y in 0..n {
        for x in 0..n {
            let wx = desc.origin_x + x as f64 * desc.cell_size as f64;
            let wy = desc.origin_y + y as f64 * desc.cell_size as f64;
            let h = (graph.value(root, wx, wy) as f32) * desc.height_scale;
            heights[y * n + x] = h;
            min_height = min_height.min(h);
            max_height = max_height.max(h);
        }
    }

    let (positions, triangles) = triangulator.triangulate(&heights, n, n, desc.cell_size);

    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in &triangles {
        let [a, b, c] = *tri;
        let pa = positions[a as usize];
        let pb = positions[b as usize];
        let pc = positions[c as usize];
        let face_normal = (pb - pa).cross(pc - pa).normalize_or_zero();
        normals[a as usize] += face_normal;
        normals[b as usize] += face_normal;
        normals[c as usize] += face_normal;
    }
    for n in &mut normals {
        *n = n.normalize_or_zero();
    }

    let height_range = (max_height - min_height).max(1e-6);
    let colors: Vec<[u8; 4]> = positions
        .iter()
        .map(|p| terrain_gradient((p.y - min_height) / height_range))
        .collect();

    let mut terrain_indices = Vec::new();
    let mut rock_indices = Vec::new();
    for tri in &triangles {
        let [a, b, c] = *tri;
        let average_normal = ((normals[a as usize] + normals[b as usize] + normals[c as usize]) / 3.0)
            .normalize_or_zero();
        let bucket = if average_normal.dot(Vec3::Y) < desc.rock_dot_threshold {
            &mut rock_indices
        } else {
            &mut terrain_indices
        };
        bucket.extend_from_slice(&[a, b, c]);
    }

    let mut colors = colors;
    for index in &rock_indices {
        colors[*index as usize] = ROCK_COLOR;
    }

    let mut scene = Scene::new();
    let terrain_material = scene.spawn_material(Material {
        shader: MaterialShader::Terrain,
        flags: ferrox_scene::components::MaterialFlags::USES_VERTEX_COLORS,
        ..Material::default()
    });
    let rock_material = scene.spawn_material(Material {
        shader: MaterialShader::Terrain,
        flags: ferrox_scene::components::MaterialFlags::USES_VERTEX_COLORS,
        roughness: 0.95,
        ..Material::default()
    });

    let mut indices = Vec::with_capacity(terrain_indices.len() + rock_indices.len());
    let mut subsets = Vec::new();
    if !terrain_indices.is_empty() {
        subsets.push(MeshSubset {
            material: terrain_material,
            index_offset: 0,
            index_count: terrain_indices.len() as u32,
        });
        indices.extend_from_slice(&terrain_indices);
    }
    if !rock_indices.is_empty() {
        subsets.push(MeshSubset {
            material: rock_material,
            index_offset: indices.len() as u32,
            index_count: rock_indices.len() as u32,
        });
        indices.extend_from_slice(&rock_indices);
    }

    let mesh = SceneMesh { positions, normals, colors, indices, subsets, ..Default::default() };
    let mesh_entity = scene.spawn_mesh(mesh);
    let object_entity = scene.create_named_transform("terrain_chunk");
    scene.objects.create(object_entity, ferrox_scene::components::Object::new(mesh_entity));

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, PerlinParams};

    #[test]
    fn chunk_generation_produces_nonempty_indexed_mesh() {
        let mut graph = Graph::new();
        let perlin = graph.add(Node::Perlin(PerlinParams::default()));
        let desc = ChunkDesc { grid_resolution: 9, ..Default::default() };
        let scene = generate_chunk_mesh(&graph, perlin, &desc, &GridTriangulator);

        assert_eq!(scene.meshes.size(), 1);
        let (_, mesh) = scene.meshes.iter().next().unwrap();
        assert!(!mesh.indices.is_empty());
        assert_eq!(mesh.positions.len(), 9 * 9);
        assert!(!mesh.subsets.is_empty());
    }

    #[test]
    fn grid_triangulator_covers_every_cell() {
        let heights = vec![0.0f32; 4 * 4];
        let (positions, triangles) = GridTriangulator.triangulate(&heights, 4, 4, 1.0);
        assert_eq!(positions.len(), 16);
        assert_eq!(triangles.len(), 3 * 3 * 2);
    }
}
