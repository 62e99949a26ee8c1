//! GML export of a normalized graph.
//!
//! Nodes carry their position (`x`, `y`, `z`); edges carry `capacity`,
//! `centrality`, `length` and `origin`. Reals are written with a decimal
//! point so readers keep them as floats.

use std::io::{self, Write};

use petgraph::visit::EdgeRef;

use crate::graph::types::{GraphStage, NormalizedGraph};

/// Write `graph` as GML.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_gml<W: Write>(graph: &NormalizedGraph, mut out: W) -> io::Result<()> {
    writeln!(out, "graph [")?;
    writeln!(out, "  directed 0")?;
    for (id, position) in graph.positions().iter().enumerate() {
        writeln!(out, "  node [")?;
        writeln!(out, "    id {id}")?;
        writeln!(out, "    label \"{id}\"")?;
        writeln!(out, "    x {:?}", position.x)?;
        writeln!(out, "    y {:?}", position.y)?;
        writeln!(out, "    z {:?}", position.z)?;
        writeln!(out, "  ]")?;
    }
    for edge in graph.graph.edge_references() {
        let f = edge.weight();
        writeln!(out, "  edge [")?;
        writeln!(out, "    source {}", edge.source().index())?;
        writeln!(out, "    target {}", edge.target().index())?;
        writeln!(out, "    capacity {:?}", f.capacity)?;
        writeln!(out, "    centrality {:?}", f.centrality)?;
        writeln!(out, "    length {:?}", f.length)?;
        writeln!(out, "    origin \"{}\"", f.origin.as_str())?;
        writeln!(out, "  ]")?;
    }
    writeln!(out, "]")?;
    out.flush()
}
