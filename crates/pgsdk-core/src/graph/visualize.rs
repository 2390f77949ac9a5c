use petgraph::visit::EdgeRef;

use crate::graph::dag::DependencyGraph;

/// Output format for graph visualization.
pub enum GraphFormat {
    Mermaid,
    Dot,
}

/// Render the FK dependency graph for the `pgsdk graph` command.
pub fn visualize(graph: &DependencyGraph, format: GraphFormat) -> String {
    match format {
        GraphFormat::Mermaid => generate_mermaid(graph),
        GraphFormat::Dot => generate_dot(graph),
    }
}

fn generate_mermaid(graph: &DependencyGraph) -> String {
    let mut output = String::from("graph TD\n");

    for node in graph.graph.node_indices() {
        let name = graph.table_name(node);
        output.push_str(&format!("    {}[{}]\n", name, name));
    }

    output.push('\n');

    for edge in graph.graph.edge_references() {
        let from = graph.table_name(edge.source());
        let to = graph.table_name(edge.target());
        let label = edge.weight().source_columns.join(", ");
        output.push_str(&format!("    {} -->|{}| {}\n", from, label, to));
    }

    output
}

fn generate_dot(graph: &DependencyGraph) -> String {
    let mut output = String::from("digraph relations {\n");
    output.push_str("    rankdir=TB;\n");
    output.push_str("    node [shape=box, style=rounded];\n\n");

    for edge in graph.graph.edge_references() {
        let from = graph.table_name(edge.source());
        let to = graph.table_name(edge.target());
        let label = edge.weight().source_columns.join(", ");
        output.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
            from, to, label
        ));
    }

    output.push_str("}\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::*;

    #[test]
    fn test_mermaid_output() {
        let mut model = Model::new("public".to_string());
        model
            .tables
            .insert("authors".to_string(), Table::new("authors".to_string()));

        let mut books = Table::new("books".to_string());
        let mut author_id =
            Column::new("author_id".to_string(), DataType::Uuid, "uuid".to_string());
        author_id.nullable = false;
        books.columns.insert("author_id".to_string(), author_id);
        books.foreign_keys.push(ForeignKey {
            name: None,
            source_columns: vec!["author_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        model.tables.insert("books".to_string(), books);

        let graph = DependencyGraph::from_model(&model);
        let output = visualize(&graph, GraphFormat::Mermaid);

        assert!(output.contains("graph TD"));
        assert!(output.contains("books"));
        assert!(output.contains("authors"));
        assert!(output.contains("author_id"));
    }

    #[test]
    fn test_dot_output() {
        let model = Model::new("public".to_string());
        let graph = DependencyGraph::from_model(&model);
        let output = visualize(&graph, GraphFormat::Dot);
        assert!(output.starts_with("digraph relations {"));
        assert!(output.ends_with("}\n"));
    }
}
