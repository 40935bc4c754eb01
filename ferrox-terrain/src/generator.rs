//! One-shot noise sampling without building a graph (§4.11, supplemented from the original's
//! flat `noise::Parameters`/`Generator` pair, which callers reach for when a single producer
//! suffices and a `Graph` would be overkill).

use crate::cellular::{single_cellular, CellularReturn};
use crate::graph::{CellularParams, Graph, Node, PerlinParams};
use crate::perlin::{fbm, fractal_bounding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseType {
    Perlin,
    Cellular,
}

#[derive(Debug, Clone)]
pub struct Parameters {
    pub noise_type: NoiseType,
    pub seed: u32,
    pub frequency: f64,
    pub octaves: u32,
    pub lacunarity: f64,
    pub gain: f64,
    pub cellular_return_type: CellularReturn,
    pub cellular_jitter_modifier: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            noise_type: NoiseType::Perlin,
            seed: 0,
            frequency: 5.5,
            octaves: 4,
            lacunarity: 2.0,
            gain: 0.5,
            cellular_return_type: CellularReturn::Distance,
            cellular_jitter_modifier: 1.0,
        }
    }
}

/// Thin convenience wrapper that internally builds the one- or two-node graph equivalent to
/// `params`, so callers who just want `generator.value(x, y)` don't have to touch [`Graph`].
#[derive(Debug, Clone)]
pub struct Generator {
    params: Parameters,
    fractal_bounding: f64,
}

impl Generator {
    pub fn new(params: Parameters) -> Self {
        let fractal_bounding = fractal_bounding(params.octaves, params.gain);
        Self { params, fractal_bounding }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        match self.params.noise_type {
            NoiseType::Perlin => fbm(
                self.params.seed,
                x,
                y,
                self.params.frequency,
                self.params.octaves,
                self.params.lacunarity,
                self.params.gain,
                self.fractal_bounding,
            ),
            NoiseType::Cellular => single_cellular(
                self.params.seed,
                x * self.params.frequency,
                y * self.params.frequency,
                self.params.cellular_jitter_modifier,
                self.params.cellular_return_type,
            ),
        }
    }

    /// Builds the equivalent single-node [`Graph`], returning it and the root node id.
    pub fn to_graph(&self) -> (Graph, crate::graph::NodeId) {
        let mut graph = Graph::new();
        let node = match self.params.noise_type {
            NoiseType::Perlin => Node::Perlin(PerlinParams {
                seed: self.params.seed,
                frequency: self.params.frequency,
                octaves: self.params.octaves,
                lacunarity: self.params.lacunarity,
                persistence: self.params.gain,
            }),
            NoiseType::Cellular => Node::Cellular(CellularParams {
                seed: self.params.seed,
                frequency: self.params.frequency,
                jitter_modifier: self.params.cellular_jitter_modifier,
                return_type: self.params.cellular_return_type,
            }),
        };
        let id = graph.add(node);
        (graph, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_and_equivalent_graph_agree() {
        let generator = Generator::new(Parameters { seed: 11, ..Default::default() });
        let (graph, root) = generator.to_graph();
        for i in 0..10 {
            let x = i as f64 * 0.3;
            let y = i as f64 * 0.7;
            assert!((generator.value(x, y) - graph.value(root, x, y)).abs() < 1e-9);
        }
    }
}
