//! # Relation classifier
//!
//! Turns the model's raw foreign keys into the navigable relation graph:
//! belongs-to, has-one, has-many, and many-to-many edges keyed by derived
//! relation names. Junction tables are detected first, suppressed from the
//! public graph, and replaced by one M:N edge on each parent.

use indexmap::IndexMap;
use pgsdk_runtime::meta::{FkOwner, JunctionMeta, RelationKind};
use serde::{Deserialize, Serialize};

use crate::graph::naming::Inflector;
use crate::schema::types::{Model, Table};

/// One directed, labeled edge of the relation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub fk_owner: FkOwner,
    /// FK columns on the owning side (empty for M:N).
    pub fk_columns: Vec<String>,
    /// Referenced columns on the other side (empty for M:N).
    pub ref_columns: Vec<String>,
    pub junction: Option<JunctionMeta>,
}

/// Mapping from table name to relation key to edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationGraph {
    pub relations: IndexMap<String, IndexMap<String, Edge>>,
}

impl RelationGraph {
    pub fn edges(&self, table: &str) -> Option<&IndexMap<String, Edge>> {
        self.relations.get(table)
    }

    pub fn edge_count(&self) -> usize {
        self.relations.values().map(|m| m.len()).sum()
    }
}

/// Flag junction tables: exactly two FKs to two distinct parents, and the
/// primary key (or a unique key) covering exactly the union of the FK
/// column sets.
pub fn mark_junctions(model: &mut Model) {
    let junction_names: Vec<String> = model
        .tables
        .values()
        .filter(|t| is_junction(t))
        .map(|t| t.name.clone())
        .collect();
    for name in junction_names {
        if let Some(table) = model.tables.get_mut(&name) {
            table.is_junction = true;
            tracing::debug!(table = %name, "classified as junction");
        }
    }
}

fn is_junction(table: &Table) -> bool {
    if table.foreign_keys.len() != 2 {
        return false;
    }
    let a = &table.foreign_keys[0];
    let b = &table.foreign_keys[1];
    if a.referenced_table == b.referenced_table {
        return false;
    }
    let mut union: Vec<String> = a
        .source_columns
        .iter()
        .chain(b.source_columns.iter())
        .cloned()
        .collect();
    union.sort_unstable();
    union.dedup();
    table.has_unique_over(&union)
}

/// Build the relation graph. `mark_junctions` must have run on the model.
pub fn classify(model: &Model, inflector: &dyn Inflector) -> RelationGraph {
    let mut graph = RelationGraph::default();

    for (name, table) in &model.tables {
        if !table.is_junction {
            graph.relations.insert(name.clone(), IndexMap::new());
        }
    }

    // Plain FK edges between non-junction tables.
    for (child_name, child) in &model.tables {
        if child.is_junction {
            continue;
        }
        for fk in &child.foreign_keys {
            let parent_name = &fk.referenced_table;
            let Some(parent) = model.tables.get(parent_name) else {
                continue;
            };
            if parent.is_junction {
                continue;
            }

            let suffix_col = fk.source_columns.first().cloned().unwrap_or_default();

            // child → parent: belongs-to
            insert_edge(
                &mut graph,
                child_name,
                inflector.singularize(parent_name),
                &suffix_col,
                Edge {
                    source: child_name.clone(),
                    target: parent_name.clone(),
                    kind: RelationKind::One,
                    fk_owner: FkOwner::Source,
                    fk_columns: fk.source_columns.clone(),
                    ref_columns: fk.referenced_columns.clone(),
                    junction: None,
                },
            );

            // parent → child: has-one when the FK is also a unique key
            let kind = if child.has_unique_over(&fk.source_columns) {
                RelationKind::One
            } else {
                RelationKind::Many
            };
            let key = match kind {
                RelationKind::One => inflector.singularize(child_name),
                RelationKind::Many => inflector.pluralize(child_name),
            };
            insert_edge(
                &mut graph,
                parent_name,
                key,
                &suffix_col,
                Edge {
                    source: parent_name.clone(),
                    target: child_name.clone(),
                    kind,
                    fk_owner: FkOwner::Target,
                    fk_columns: fk.source_columns.clone(),
                    ref_columns: fk.referenced_columns.clone(),
                    junction: None,
                },
            );
        }
    }

    // Junction tables: one M:N edge on each parent, junction suppressed.
    for (junction_name, junction) in &model.tables {
        if !junction.is_junction {
            continue;
        }
        let a = &junction.foreign_keys[0];
        let b = &junction.foreign_keys[1];
        for (near, far) in [(a, b), (b, a)] {
            let source = &near.referenced_table;
            let target = &far.referenced_table;
            if !model.tables.contains_key(source) || !model.tables.contains_key(target) {
                continue;
            }
            insert_edge(
                &mut graph,
                source,
                inflector.pluralize(target),
                &far.source_columns.first().cloned().unwrap_or_default(),
                Edge {
                    source: source.clone(),
                    target: target.clone(),
                    kind: RelationKind::Many,
                    fk_owner: FkOwner::Target,
                    fk_columns: Vec::new(),
                    ref_columns: Vec::new(),
                    junction: Some(JunctionMeta {
                        table: junction_name.clone(),
                        source_fk_columns: near.source_columns.clone(),
                        source_ref_columns: near.referenced_columns.clone(),
                        target_fk_columns: far.source_columns.clone(),
                        target_ref_columns: far.referenced_columns.clone(),
                    }),
                },
            );
        }
    }

    graph
}

/// Insert under the derived key; on collision, append `_by_<fk-column>`,
/// then a numeric suffix. FK declaration order makes the outcome stable
/// across runs.
fn insert_edge(graph: &mut RelationGraph, table: &str, key: String, suffix_col: &str, edge: Edge) {
    let Some(map) = graph.relations.get_mut(table) else {
        return;
    };
    if !map.contains_key(&key) {
        map.insert(key, edge);
        return;
    }
    let disambiguated = format!("{key}_by_{suffix_col}");
    if !map.contains_key(&disambiguated) {
        tracing::debug!(table, key = %disambiguated, "relation key collision; disambiguating");
        map.insert(disambiguated, edge);
        return;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{disambiguated}_{n}");
        if !map.contains_key(&candidate) {
            map.insert(candidate, edge);
            return;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::naming::TrailingS;
    use crate::schema::types::*;

    fn column(name: &str, ty: DataType) -> Column {
        let raw = ty.to_string();
        let mut c = Column::new(name.to_string(), ty, raw);
        c.nullable = false;
        c
    }

    fn fk(cols: &[&str], table: &str, ref_cols: &[&str]) -> ForeignKey {
        ForeignKey {
            name: None,
            source_columns: cols.iter().map(|s| s.to_string()).collect(),
            referenced_table: table.to_string(),
            referenced_columns: ref_cols.iter().map(|s| s.to_string()).collect(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    fn bookstore_model() -> Model {
        let mut model = Model::new("public".to_string());

        let mut authors = Table::new("authors".to_string());
        authors.columns.insert("id".into(), column("id", DataType::Uuid));
        authors
            .columns
            .insert("name".into(), column("name", DataType::Text));
        authors.primary_key = vec!["id".into()];
        model.tables.insert("authors".into(), authors);

        let mut books = Table::new("books".to_string());
        books.columns.insert("id".into(), column("id", DataType::Uuid));
        books
            .columns
            .insert("author_id".into(), column("author_id", DataType::Uuid));
        books
            .columns
            .insert("title".into(), column("title", DataType::Text));
        books.primary_key = vec!["id".into()];
        books.foreign_keys.push(fk(&["author_id"], "authors", &["id"]));
        model.tables.insert("books".into(), books);

        let mut tags = Table::new("tags".to_string());
        tags.columns.insert("id".into(), column("id", DataType::Uuid));
        tags.columns.insert("name".into(), column("name", DataType::Text));
        tags.primary_key = vec!["id".into()];
        model.tables.insert("tags".into(), tags);

        let mut book_tags = Table::new("book_tags".to_string());
        book_tags
            .columns
            .insert("book_id".into(), column("book_id", DataType::Uuid));
        book_tags
            .columns
            .insert("tag_id".into(), column("tag_id", DataType::Uuid));
        book_tags.primary_key = vec!["book_id".into(), "tag_id".into()];
        book_tags.foreign_keys.push(fk(&["book_id"], "books", &["id"]));
        book_tags.foreign_keys.push(fk(&["tag_id"], "tags", &["id"]));
        model.tables.insert("book_tags".into(), book_tags);

        model
    }

    #[test]
    fn test_junction_detection() {
        let mut model = bookstore_model();
        mark_junctions(&mut model);
        assert!(model.tables["book_tags"].is_junction);
        assert!(!model.tables["books"].is_junction);
    }

    #[test]
    fn test_junction_requires_covering_key() {
        let mut model = bookstore_model();
        // widen the PK so it no longer equals the FK union
        model.tables.get_mut("book_tags").unwrap().primary_key = vec!["book_id".into()];
        mark_junctions(&mut model);
        assert!(!model.tables["book_tags"].is_junction);
    }

    #[test]
    fn test_junction_unique_index_also_counts() {
        let mut model = bookstore_model();
        {
            let bt = model.tables.get_mut("book_tags").unwrap();
            bt.columns
                .insert("id".into(), column("id", DataType::BigInt));
            bt.primary_key = vec!["id".into()];
            bt.unique_keys.push(UniqueKey {
                name: None,
                columns: vec!["book_id".into(), "tag_id".into()],
            });
        }
        mark_junctions(&mut model);
        assert!(model.tables["book_tags"].is_junction);
    }

    #[test]
    fn test_classify_basic_edges() {
        let mut model = bookstore_model();
        mark_junctions(&mut model);
        let graph = classify(&model, &TrailingS);

        // junction is suppressed from the public graph
        assert!(graph.edges("book_tags").is_none());

        let books = graph.edges("books").unwrap();
        let author_edge = &books["author"];
        assert_eq!(author_edge.kind, RelationKind::One);
        assert_eq!(author_edge.fk_owner, FkOwner::Source);
        assert_eq!(author_edge.target, "authors");

        let authors = graph.edges("authors").unwrap();
        let books_edge = &authors["books"];
        assert_eq!(books_edge.kind, RelationKind::Many);
        assert_eq!(books_edge.fk_owner, FkOwner::Target);
        assert_eq!(books_edge.fk_columns, vec!["author_id".to_string()]);
    }

    #[test]
    fn test_classify_many_to_many() {
        let mut model = bookstore_model();
        mark_junctions(&mut model);
        let graph = classify(&model, &TrailingS);

        let books = graph.edges("books").unwrap();
        let tags_edge = &books["tags"];
        assert_eq!(tags_edge.kind, RelationKind::Many);
        let jm = tags_edge.junction.as_ref().unwrap();
        assert_eq!(jm.table, "book_tags");
        assert_eq!(jm.source_fk_columns, vec!["book_id".to_string()]);
        assert_eq!(jm.target_fk_columns, vec!["tag_id".to_string()]);

        let tags = graph.edges("tags").unwrap();
        let books_edge = &tags["books"];
        let jm = books_edge.junction.as_ref().unwrap();
        assert_eq!(jm.source_fk_columns, vec!["tag_id".to_string()]);
    }

    #[test]
    fn test_has_one_from_unique_fk() {
        let mut model = bookstore_model();
        {
            let mut profiles = Table::new("profiles".to_string());
            profiles
                .columns
                .insert("id".into(), column("id", DataType::Uuid));
            profiles
                .columns
                .insert("author_id".into(), column("author_id", DataType::Uuid));
            profiles.primary_key = vec!["id".into()];
            profiles.unique_keys.push(UniqueKey {
                name: None,
                columns: vec!["author_id".into()],
            });
            profiles
                .foreign_keys
                .push(fk(&["author_id"], "authors", &["id"]));
            model.tables.insert("profiles".into(), profiles);
        }
        mark_junctions(&mut model);
        let graph = classify(&model, &TrailingS);

        let authors = graph.edges("authors").unwrap();
        let profile_edge = &authors["profile"];
        assert_eq!(profile_edge.kind, RelationKind::One);
        assert_eq!(profile_edge.fk_owner, FkOwner::Target);
    }

    #[test]
    fn test_collision_disambiguation_is_deterministic() {
        let mut model = Model::new("public".to_string());

        let mut users = Table::new("users".to_string());
        users.columns.insert("id".into(), column("id", DataType::Uuid));
        users.primary_key = vec!["id".into()];
        model.tables.insert("users".into(), users);

        let mut messages = Table::new("messages".to_string());
        messages
            .columns
            .insert("id".into(), column("id", DataType::Uuid));
        messages
            .columns
            .insert("sender_id".into(), column("sender_id", DataType::Uuid));
        messages
            .columns
            .insert("recipient_id".into(), column("recipient_id", DataType::Uuid));
        messages.primary_key = vec!["id".into()];
        messages
            .foreign_keys
            .push(fk(&["sender_id"], "users", &["id"]));
        messages
            .foreign_keys
            .push(fk(&["recipient_id"], "users", &["id"]));
        model.tables.insert("messages".into(), messages);

        mark_junctions(&mut model);
        let graph = classify(&model, &TrailingS);

        let messages = graph.edges("messages").unwrap();
        assert!(messages.contains_key("user"));
        assert!(messages.contains_key("user_by_recipient_id"));

        let users = graph.edges("users").unwrap();
        assert!(users.contains_key("messages"));
        assert!(users.contains_key("messages_by_recipient_id"));

        // same input, same keys
        let again = classify(&model, &TrailingS);
        assert_eq!(
            graph.edges("messages").unwrap().keys().collect::<Vec<_>>(),
            again.edges("messages").unwrap().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_self_reference_keys() {
        let mut model = Model::new("public".to_string());
        let mut categories = Table::new("categories".to_string());
        categories
            .columns
            .insert("id".into(), column("id", DataType::Uuid));
        let mut parent_id = column("parent_id", DataType::Uuid);
        parent_id.nullable = true;
        categories.columns.insert("parent_id".into(), parent_id);
        categories.primary_key = vec!["id".into()];
        categories
            .foreign_keys
            .push(fk(&["parent_id"], "categories", &["id"]));
        model.tables.insert("categories".into(), categories);

        mark_junctions(&mut model);
        let graph = classify(&model, &TrailingS);

        let edges = graph.edges("categories").unwrap();
        // belongs-to keyed singular, has-many keyed plural, same table
        assert_eq!(edges["category"].fk_owner, FkOwner::Source);
        assert_eq!(edges["categories"].kind, RelationKind::Many);
    }
}
