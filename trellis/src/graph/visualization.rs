//! Graph visualization utilities.
//!
//! Exports the compiled graph structure as Graphviz DOT or a plain text
//! summary for debugging. Conditional edges are rendered one edge per
//! declared label.

use std::fmt::Write;

use super::builder::{END, START};
use super::conditional::NextEntry;
use super::compiled::CompiledGraph;

/// Generate a Graphviz DOT representation of the graph.
pub fn generate_dot(graph: &CompiledGraph) -> String {
    let mut dot = String::from("digraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box];\n\n");

    dot.push_str(&format!(
        "  \"{START}\" [label=\"START\", style=bold, fillcolor=lightgreen];\n"
    ));
    dot.push_str(&format!(
        "  \"{END}\" [label=\"END\", style=bold, fillcolor=lightcoral];\n"
    ));

    let mut node_ids = graph.list_nodes();
    if let Some(error_node) = &graph.error_node {
        node_ids.retain(|id| id != error_node);
        dot.push_str(&format!(
            "  \"{error_node}\" [style=dashed, fillcolor=mistyrose];\n"
        ));
    }
    for node_id in &node_ids {
        dot.push_str(&format!("  \"{node_id}\";\n"));
    }
    dot.push('\n');

    dot.push_str(&format!("  \"{START}\" -> \"{}\";\n", graph.entry()));
    for node_id in graph.list_nodes() {
        match graph.next_map.get(&node_id) {
            None => {
                dot.push_str(&format!("  \"{node_id}\" -> \"{END}\";\n"));
            }
            Some(NextEntry::Unconditional(target)) => {
                dot.push_str(&format!("  \"{node_id}\" -> \"{target}\";\n"));
            }
            Some(NextEntry::Conditional(router)) => {
                let mut routes: Vec<(&String, &String)> = router.path_map.iter().collect();
                routes.sort_unstable();
                for (label, target) in routes {
                    dot.push_str(&format!(
                        "  \"{node_id}\" -> \"{target}\" [style=dashed, label=\"{label}\"];\n"
                    ));
                }
            }
        }
    }

    dot.push_str("}\n");
    dot
}

/// Generate a plain text summary of the graph structure.
pub fn generate_text(graph: &CompiledGraph) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Graph Structure:");
    let _ = writeln!(text, "Entry: {}", graph.entry());
    let _ = writeln!(text, "Nodes: {}", graph.list_nodes().len());
    if let Some(error_node) = &graph.error_node {
        let _ = writeln!(text, "Error node: {error_node}");
    }

    let _ = writeln!(text, "\nEdges:");
    for node_id in graph.list_nodes() {
        match graph.next_map.get(&node_id) {
            None => {
                let _ = writeln!(text, "  {node_id} -> {END}");
            }
            Some(NextEntry::Unconditional(target)) => {
                let _ = writeln!(text, "  {node_id} -> {target}");
            }
            Some(NextEntry::Conditional(router)) => {
                let mut routes: Vec<(&String, &String)> = router.path_map.iter().collect();
                routes.sort_unstable();
                for (label, target) in routes {
                    let _ = writeln!(text, "  {node_id} -[{label}]-> {target}");
                }
            }
        }
    }

    text
}
