use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::schema::types::Model;

/// A directed graph of raw foreign-key dependencies.
/// Edges point from dependent table to referenced table (child → parent).
pub struct DependencyGraph {
    pub graph: DiGraph<String, EdgeInfo>,
    pub node_indices: HashMap<String, NodeIndex>,
}

/// Information about one FK edge.
#[derive(Debug, Clone)]
pub struct EdgeInfo {
    /// Name of the FK constraint
    pub constraint_name: Option<String>,
    /// Source columns in the dependent table
    pub source_columns: Vec<String>,
    /// Referenced columns in the parent table
    pub referenced_columns: Vec<String>,
    /// Whether the FK column(s) are all nullable
    pub is_nullable: bool,
}

impl DependencyGraph {
    /// Build the FK graph from a model. Each table becomes a node, each
    /// foreign key a directed edge from child to parent.
    pub fn from_model(model: &Model) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for table_name in model.tables.keys() {
            let idx = graph.add_node(table_name.clone());
            node_indices.insert(table_name.clone(), idx);
        }

        for (table_name, table) in &model.tables {
            for fk in &table.foreign_keys {
                if let (Some(&from_idx), Some(&to_idx)) = (
                    node_indices.get(table_name),
                    node_indices.get(&fk.referenced_table),
                ) {
                    let is_nullable = fk.source_columns.iter().all(|col_name| {
                        table
                            .columns
                            .get(col_name)
                            .map(|c| c.nullable)
                            .unwrap_or(false)
                    });

                    graph.add_edge(
                        from_idx,
                        to_idx,
                        EdgeInfo {
                            constraint_name: fk.name.clone(),
                            source_columns: fk.source_columns.clone(),
                            referenced_columns: fk.referenced_columns.clone(),
                            is_nullable,
                        },
                    );
                }
            }
        }

        Self {
            graph,
            node_indices,
        }
    }

    pub fn table_name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    pub fn table_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the schema contains reference cycles (self-references
    /// included). Cyclic schemas are fine — include types are depth-bounded
    /// — but worth a log line during generation.
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::*;

    fn model_with_fk() -> Model {
        let mut model = Model::new("public".to_string());

        let mut authors = Table::new("authors".to_string());
        authors.columns.insert(
            "id".to_string(),
            Column::new("id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        authors.primary_key = vec!["id".to_string()];
        model.tables.insert("authors".to_string(), authors);

        let mut books = Table::new("books".to_string());
        books.columns.insert(
            "id".to_string(),
            Column::new("id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        let mut author_id = Column::new(
            "author_id".to_string(),
            DataType::Uuid,
            "uuid".to_string(),
        );
        author_id.nullable = false;
        books.columns.insert("author_id".to_string(), author_id);
        books.primary_key = vec!["id".to_string()];
        books.foreign_keys.push(ForeignKey {
            name: Some("books_author_id_fkey".to_string()),
            source_columns: vec!["author_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: ForeignKeyAction::Cascade,
            on_update: ForeignKeyAction::NoAction,
        });
        model.tables.insert("books".to_string(), books);

        model
    }

    #[test]
    fn test_build_graph() {
        let model = model_with_fk();
        let graph = DependencyGraph::from_model(&model);
        assert_eq!(graph.table_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.has_cycles());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut model = model_with_fk();
        let authors = model.tables.get_mut("authors").unwrap();
        authors.columns.insert(
            "mentor_id".to_string(),
            Column::new("mentor_id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        authors.foreign_keys.push(ForeignKey {
            name: None,
            source_columns: vec!["mentor_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: ForeignKeyAction::SetNull,
            on_update: ForeignKeyAction::NoAction,
        });

        let graph = DependencyGraph::from_model(&model);
        assert!(graph.has_cycles());
    }
}
