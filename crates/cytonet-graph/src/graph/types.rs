//! Node and edge attribute records and the typed pipeline stages.
//!
//! # Overview
//!
//! Every stage wraps the same undirected petgraph type, [`FilamentGraph`].
//! The wrapper type records which invariants hold:
//!
//! | stage               | invariant                                          |
//! |---------------------|----------------------------------------------------|
//! | [`RawGraph`]        | none; parallel edges and self-loops allowed       |
//! | [`SimpleGraph`]     | at most one edge per unordered pair, no self-loops |
//! | [`ConnectedGraph`]  | exactly one connected component                    |
//! | [`AnnotatedGraph`]  | every edge carries a centrality score              |
//! | [`NormalizedGraph`] | capacities sum to one                              |
//!
//! Node indices are stable across stages: no stage adds or removes nodes, so
//! the position table of a frame is the same at every step.
//!
//! ## Path orientation
//!
//! A [`Filament::path`] runs from the edge's source endpoint to its target
//! endpoint as petgraph reports them from `edge_endpoints`.

#![allow(clippy::module_name_repetitions)]

use cytonet_core::volume::Point3;
use petgraph::graph::UnGraph;
use serde::Serialize;

/// The graph type shared by every stage.
pub type FilamentGraph = UnGraph<Junction, Filament>;

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A branch point or end point of the filament network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Junction {
    pub position: Point3,
}

impl Junction {
    #[must_use]
    pub const fn at(position: Point3) -> Self {
        Self { position }
    }
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Traced along the skeleton.
    Traced,
    /// Added by the connectivity repairer.
    Bridge,
    /// Drawn by the full-reshuffle randomizer.
    Randomized,
}

impl EdgeOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traced => "traced",
            Self::Bridge => "bridge",
            Self::Randomized => "randomized",
        }
    }
}

/// A filament segment between two junctions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filament {
    /// Non-negative weight derived from the intensity along the path.
    pub capacity: f64,
    /// Length of `path` in real units.
    pub length: f64,
    /// Polyline from the source junction to the target junction.
    pub path: Vec<Point3>,
    pub origin: EdgeOrigin,
    /// Edge betweenness; zero until the centrality stage runs.
    pub centrality: f64,
}

impl Filament {
    /// An edge following `path`, with its length measured along the polyline.
    #[must_use]
    pub fn along(capacity: f64, path: Vec<Point3>, origin: EdgeOrigin) -> Self {
        Self {
            capacity,
            length: polyline_length(&path),
            path,
            origin,
            centrality: 0.0,
        }
    }

    /// A straight edge from `a` to `b`.
    #[must_use]
    pub fn straight(capacity: f64, a: Point3, b: Point3, origin: EdgeOrigin) -> Self {
        Self::along(capacity, vec![a, b], origin)
    }
}

/// Sum of the segment lengths of a polyline.
#[must_use]
pub fn polyline_length(path: &[Point3]) -> f64 {
    path.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Read access shared by every stage.
pub trait GraphStage {
    fn graph(&self) -> &FilamentGraph;

    /// Node positions indexed by node index.
    fn positions(&self) -> Vec<Point3> {
        self.graph()
            .raw_nodes()
            .iter()
            .map(|node| node.weight.position)
            .collect()
    }

    fn node_count(&self) -> usize {
        self.graph().node_count()
    }

    fn edge_count(&self) -> usize {
        self.graph().edge_count()
    }

    /// Sum of all edge capacities.
    fn total_capacity(&self) -> f64 {
        self.graph()
            .edge_references()
            .map(|e| e.weight().capacity)
            .sum()
    }

    /// Capacities in edge-index order.
    fn capacities(&self) -> Vec<f64> {
        self.graph()
            .raw_edges()
            .iter()
            .map(|edge| edge.weight.capacity)
            .collect()
    }
}

/// Multigraph straight out of the detector or the randomizer.
#[derive(Debug, Clone)]
pub struct RawGraph {
    pub graph: FilamentGraph,
}

/// No parallel edges, no self-loops.
#[derive(Debug, Clone)]
pub struct SimpleGraph {
    pub graph: FilamentGraph,
    /// BLAKE3 hash of the sorted edge set and capacities.
    pub content_hash: String,
}

/// Exactly one connected component.
#[derive(Debug, Clone)]
pub struct ConnectedGraph {
    pub graph: FilamentGraph,
    /// Number of bridge edges the repairer added.
    pub bridges: usize,
}

/// Connected graph with per-edge centrality.
#[derive(Debug, Clone)]
pub struct AnnotatedGraph {
    pub graph: FilamentGraph,
}

/// Capacities rescaled to sum to one. The final graph of a frame or repeat.
#[derive(Debug, Clone)]
pub struct NormalizedGraph {
    pub graph: FilamentGraph,
    /// Total capacity before rescaling.
    pub scale: f64,
}

macro_rules! impl_stage {
    ($($stage:ty),+ $(,)?) => {
        $(
            impl GraphStage for $stage {
                fn graph(&self) -> &FilamentGraph {
                    &self.graph
                }
            }
        )+
    };
}

impl_stage!(RawGraph, SimpleGraph, ConnectedGraph, AnnotatedGraph, NormalizedGraph);

impl RawGraph {
    /// Build a graph from a position table and `(u, v, filament)` triples.
    ///
    /// Edges whose endpoints are out of range are ignored.
    #[must_use]
    pub fn from_parts(
        positions: &[Point3],
        edges: impl IntoIterator<Item = (usize, usize, Filament)>,
    ) -> Self {
        let mut graph = FilamentGraph::with_capacity(positions.len(), 0);
        let nodes: Vec<_> = positions
            .iter()
            .map(|&p| graph.add_node(Junction::at(p)))
            .collect();
        for (u, v, filament) in edges {
            if let (Some(&a), Some(&b)) = (nodes.get(u), nodes.get(v)) {
                graph.add_edge(a, b, filament);
            }
        }
        Self { graph }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
