// SPDX-License-Identifier: Apache-2.0

//! JSON task bundles: prebuilt derivation graphs plus training pairs and
//! output sizes, as produced by an upstream graph builder. This is the
//! engine's only file-facing surface; everything is validated on load.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::dag::{DerivationGraph, FunctionCosts};
use crate::image::{Image, Point, COLORS};

/// A grid with an origin offset; rows are row-major pixel values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpec {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub rows: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub grid: GridSpec,
    pub depth: u16,
    #[serde(default)]
    pub is_piece: bool,
}

/// One transition: applying function `fi` at node `from` yields node `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: u32,
    pub fi: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub givens: usize,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSpec {
    pub input: GridSpec,
    pub output: GridSpec,
}

/// Top-level bundle: one graph per training example plus one for the test
/// input, and one output size per slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub graphs: Vec<GraphSpec>,
    pub train: Vec<PairSpec>,
    pub out_sizes: Vec<(i32, i32)>,
    pub costs: Vec<u32>,
}

/// A validated, engine-ready task.
pub struct Task {
    pub graphs: Vec<DerivationGraph>,
    pub train: Vec<(Image, Image)>,
    pub out_sizes: Vec<Point>,
    pub costs: FunctionCosts,
}

impl GridSpec {
    pub fn to_image(&self) -> Result<Image> {
        let h = self.rows.len();
        let w = self.rows.first().map(|r| r.len()).unwrap_or(0);
        let mut mask = Vec::with_capacity(w * h);
        for row in &self.rows {
            if row.len() != w {
                bail!("ragged grid: row of {} pixels, expected {}", row.len(), w);
            }
            for &c in row {
                if c >= COLORS {
                    bail!("pixel value {c} out of range");
                }
                mask.push(c);
            }
        }
        Ok(Image {
            x: self.x,
            y: self.y,
            w: w as i32,
            h: h as i32,
            mask,
        })
    }

    pub fn from_image(img: &Image) -> GridSpec {
        let rows = (0..img.h)
            .map(|i| (0..img.w).map(|j| img.pixel(i, j)).collect())
            .collect();
        GridSpec {
            x: img.x,
            y: img.y,
            rows,
        }
    }
}

impl TaskSpec {
    /// Validates the spec and builds the concrete graphs.
    pub fn into_task(self) -> Result<Task> {
        if self.graphs.len() <= self.train.len() {
            bail!(
                "{} graphs for {} training pairs; expected one per pair plus the test slot",
                self.graphs.len(),
                self.train.len()
            );
        }
        if self.out_sizes.len() != self.graphs.len() {
            bail!(
                "{} out_sizes for {} graphs",
                self.out_sizes.len(),
                self.graphs.len()
            );
        }

        // Piece construction seeds one joint state per given of graph 0, with
        // the same node index in every graph; each graph must be big enough.
        let root_givens = self.graphs[0].givens;
        let mut graphs = Vec::with_capacity(self.graphs.len());
        for (gi, spec) in self.graphs.into_iter().enumerate() {
            let node_count = spec.nodes.len();
            if spec.givens > node_count {
                bail!("graph {gi}: {} givens but {node_count} nodes", spec.givens);
            }
            if root_givens > node_count {
                bail!(
                    "graph {gi}: {node_count} nodes but graph 0 seeds {root_givens} givens"
                );
            }
            let mut graph = DerivationGraph::new(spec.givens);
            for node in &spec.nodes {
                let img = node
                    .grid
                    .to_image()
                    .with_context(|| format!("graph {gi} node {}", graph.node_count()))?;
                graph.add_node(&img, node.depth, node.is_piece);
            }
            for edge in &spec.edges {
                if edge.from as usize >= node_count || edge.to as usize >= node_count {
                    bail!("graph {gi}: edge {edge:?} out of bounds");
                }
                if edge.fi as usize >= self.costs.len() {
                    bail!("graph {gi}: edge {edge:?} names an unknown function");
                }
                graph.add_edge(edge.from, edge.fi, edge.to);
            }
            graphs.push(graph);
        }

        let mut train = Vec::with_capacity(self.train.len());
        for (pi, pair) in self.train.iter().enumerate() {
            let input = pair
                .input
                .to_image()
                .with_context(|| format!("training pair {pi} input"))?;
            let output = pair
                .output
                .to_image()
                .with_context(|| format!("training pair {pi} output"))?;
            train.push((input, output));
        }

        Ok(Task {
            graphs,
            train,
            out_sizes: self
                .out_sizes
                .iter()
                .map(|&(w, h)| Point::new(w, h))
                .collect(),
            costs: FunctionCosts(self.costs),
        })
    }
}

pub fn load_task(path: &Path) -> Result<Task> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading task bundle {}", path.display()))?;
    let spec: TaskSpec = serde_json::from_str(&text)
        .with_context(|| format!("parsing task bundle {}", path.display()))?;
    spec.into_task()
}
