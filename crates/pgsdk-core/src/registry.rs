//! Lowers the frozen Model + RelationGraph into the runtime `ApiRegistry`
//! the generated server embeds. Junction tables ride along unrouted so the
//! include loader can decode their rows.

use pgsdk_runtime::meta::{ApiRegistry, ColumnMeta, RelationMeta, TableMeta};

use crate::graph::relations::RelationGraph;
use crate::schema::types::{Model, Table};

pub fn build_registry(
    model: &Model,
    graph: &RelationGraph,
    soft_delete_column: Option<&str>,
) -> ApiRegistry {
    let mut registry = ApiRegistry::new(model.schema_name.clone());

    for (name, table) in &model.tables {
        let mut meta = table_meta(table, soft_delete_column);
        if table.is_junction {
            registry.junction_tables.insert(name.clone(), meta);
            continue;
        }
        if let Some(edges) = graph.edges(name) {
            for (key, edge) in edges {
                meta.relations.insert(
                    key.clone(),
                    RelationMeta {
                        target: edge.target.clone(),
                        kind: edge.kind,
                        fk_owner: edge.fk_owner,
                        fk_columns: edge.fk_columns.clone(),
                        ref_columns: edge.ref_columns.clone(),
                        junction: edge.junction.clone(),
                    },
                );
            }
        }
        registry.tables.insert(name.clone(), meta);
    }

    registry
}

fn table_meta(table: &Table, soft_delete_column: Option<&str>) -> TableMeta {
    let mut meta = TableMeta::new(table.name.clone());
    for (col_name, col) in &table.columns {
        let mut cm = ColumnMeta::new(col_name.clone(), col.data_type.to_runtime());
        cm.nullable = col.nullable;
        cm.has_default = col.has_default;
        meta.columns.insert(col_name.clone(), cm);
    }
    meta.primary_key = table.primary_key.clone();
    meta.soft_delete_column = soft_delete_column
        .filter(|c| table.columns.contains_key(*c))
        .map(str::to_string);
    meta
}
