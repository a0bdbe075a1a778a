//! Graph output sinks for `-f dot` and `-f raw`.

use std::io::{self, Write};

use crate::graph::{EdgeKind, Graph};
use crate::model::Model;

/// Output format selected by `-f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Dot,
    Raw,
}

/// Writes `graph` to `out` in the requested format.
pub fn write_graph(out: &mut impl Write, format: OutputFormat, model: &Model, graph: &Graph) -> io::Result<()> {
    match format {
        OutputFormat::Dot => write_dot(out, model, graph),
        OutputFormat::Raw => write_raw(out, model, graph),
    }
}

fn node_label(model: &Model, vloc: &[usize]) -> String {
    vloc.iter()
        .enumerate()
        .map(|(pid, &lid)| model.processes[pid].locations[lid].name.clone())
        .collect::<Vec<_>>()
        .join(",")
}

fn write_dot(out: &mut impl Write, model: &Model, graph: &Graph) -> io::Result<()> {
    writeln!(out, "digraph reachability {{")?;
    for (idx, node) in graph.nodes() {
        let label = node_label(model, &node.state.vloc);
        writeln!(out, "  n{} [label=\"{}\"];", idx.0, label)?;
    }
    for edge in graph.edges() {
        let style = match edge.kind {
            EdgeKind::Actual => "solid",
            EdgeKind::Abstract => "dashed",
        };
        writeln!(out, "  n{} -> n{} [style={}];", edge.src.0, edge.tgt.0, style)?;
    }
    writeln!(out, "}}")
}

fn write_raw(out: &mut impl Write, model: &Model, graph: &Graph) -> io::Result<()> {
    for (idx, node) in graph.nodes() {
        writeln!(
            out,
            "NODE {} {} active={}",
            idx.0,
            node_label(model, &node.state.vloc),
            node.active
        )?;
    }
    for edge in graph.edges() {
        let kind = match edge.kind {
            EdgeKind::Actual => "ACTUAL",
            EdgeKind::Abstract => "ABSTRACT",
        };
        writeln!(out, "EDGE {} {} {}", edge.src.0, edge.tgt.0, kind)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge as ModelEdge, Location, Process};
    use crate::por::PorMemory;
    use crate::ts::State;
    use crate::zone::Zone;

    fn model() -> Model {
        Model {
            processes: vec![Process {
                name: "P".into(),
                locations: vec![Location {
                    name: "l0".into(),
                    initial: true,
                    accepting: false,
                    invariant: None,
                    magnetic: false,
                }],
                edges: vec![],
            }],
            event_names: vec![],
            clock_count: 1,
            intvar_count: 0,
            intvar_bounds: vec![],
            syncs: vec![],
        }
    }

    #[test]
    fn dot_output_contains_node_and_edge_lines() {
        let m = model();
        let mut g = Graph::new();
        let a = g.insert_node(State { vloc: vec![0], intvars: vec![], zone: Zone::zero(1) }, PorMemory::default(), false);
        let b = g.insert_node(State { vloc: vec![0], intvars: vec![], zone: Zone::zero(1) }, PorMemory::default(), false);
        g.add_edge(a, b, EdgeKind::Actual);
        let mut buf = Vec::new();
        write_graph(&mut buf, OutputFormat::Dot, &m, &g).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("digraph"));
        assert!(s.contains("->"));
    }

    #[test]
    fn raw_output_lists_nodes_and_edges() {
        let m = model();
        let mut g = Graph::new();
        g.insert_node(State { vloc: vec![0], intvars: vec![], zone: Zone::zero(1) }, PorMemory::default(), false);
        let mut buf = Vec::new();
        write_graph(&mut buf, OutputFormat::Raw, &m, &g).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("NODE 0"));
    }
}
