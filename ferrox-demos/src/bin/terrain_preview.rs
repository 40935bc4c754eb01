//! Builds a small noise-node graph (C11), renders a grayscale preview, and generates one
//! terrain chunk mesh. Writes the preview to `terrain_preview.png` in the current directory.

use ferrox_terrain::graph::{Graph, Node, PerlinParams, StrataMode};
use ferrox_terrain::image::{render_noise_image, NoiseImageDesc};
use ferrox_terrain::mesh::{generate_chunk_mesh, ChunkDesc, GridTriangulator};

fn main() {
    env_logger::init();

    let mut graph = Graph::new();
    let base = graph.add(Node::Perlin(PerlinParams { seed: 42, frequency: 3.0, octaves: 5, lacunarity: 2.0, persistence: 0.5 }));
    let strata = graph.add(Node::Strata { input: Some(base), strata: 6.0, mode: StrataMode::Smooth });
    let height = graph.add(Node::ScaleBias { input: Some(strata), scale: 1.0, bias: 0.0 });

    let image = render_noise_image(&graph, height, &NoiseImageDesc { width: 256, height: 256, ..Default::default() });
    let mut buffer = image::RgbaImage::new(image.width(), image.height());
    for y in 0..image.height() {
        for x in 0..image.width() {
            let c = image.get(x, y);
            buffer.put_pixel(x, y, image::Rgba([c.r, c.g, c.b, c.a]));
        }
    }
    let out_path = "terrain_preview.png";
    buffer.save(out_path).expect("write terrain_preview.png");
    println!("wrote {out_path} ({}x{})", image.width(), image.height());

    let chunk = generate_chunk_mesh(&graph, height, &ChunkDesc { grid_resolution: 65, ..Default::default() }, &GridTriangulator);
    let (_, mesh) = chunk.meshes.iter().next().expect("chunk mesh");
    println!(
        "chunk mesh: {} vertices, {} indices, {} subsets",
        mesh.positions.len(),
        mesh.indices.len(),
        mesh.subsets.len()
    );
}
