//! Shared test fixtures: a small bookstore schema (authors, books, tags,
//! and a book_tags junction, with a vector column and a soft-delete
//! column) plus a deliberately cyclic schema.

use pgsdk_core::graph::naming::TrailingS;
use pgsdk_core::graph::relations::{classify, mark_junctions, RelationGraph};
use pgsdk_core::registry::build_registry;
use pgsdk_core::schema::types::*;
use pgsdk_runtime::meta::ApiRegistry;

fn col(name: &str, ty: DataType) -> Column {
    let raw = ty.to_string();
    let mut c = Column::new(name.to_string(), ty, raw);
    c.nullable = false;
    c
}

fn nullable(mut c: Column) -> Column {
    c.nullable = true;
    c
}

fn defaulted(mut c: Column) -> Column {
    c.has_default = true;
    c
}

/// The bookstore model, junctions already marked.
pub fn bookstore_model() -> Model {
    let mut model = Model::new("public".to_string());

    // authors
    let mut authors = Table::new("authors".to_string());
    authors
        .columns
        .insert("id".into(), defaulted(col("id", DataType::Uuid)));
    authors.columns.insert("name".into(), col("name", DataType::Text));
    authors.columns.insert(
        "deleted_at".into(),
        nullable(col("deleted_at", DataType::TimestampTz)),
    );
    authors.primary_key = vec!["id".into()];
    model.tables.insert("authors".into(), authors);

    // books
    let mut books = Table::new("books".to_string());
    books
        .columns
        .insert("id".into(), defaulted(col("id", DataType::Uuid)));
    books
        .columns
        .insert("author_id".into(), col("author_id", DataType::Uuid));
    books.columns.insert("title".into(), col("title", DataType::Text));
    books
        .columns
        .insert("emb".into(), nullable(col("emb", DataType::Vector(3))));
    books.primary_key = vec!["id".into()];
    books.foreign_keys.push(ForeignKey {
        name: Some("books_author_id_fkey".to_string()),
        source_columns: vec!["author_id".into()],
        referenced_table: "authors".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::Cascade,
        on_update: ForeignKeyAction::NoAction,
    });
    model.tables.insert("books".into(), books);

    // tags
    let mut tags = Table::new("tags".to_string());
    tags.columns
        .insert("id".into(), defaulted(col("id", DataType::Uuid)));
    tags.columns.insert("name".into(), col("name", DataType::Text));
    tags.primary_key = vec!["id".into()];
    model.tables.insert("tags".into(), tags);

    // book_tags junction
    let mut book_tags = Table::new("book_tags".to_string());
    book_tags
        .columns
        .insert("book_id".into(), col("book_id", DataType::Uuid));
    book_tags
        .columns
        .insert("tag_id".into(), col("tag_id", DataType::Uuid));
    book_tags.primary_key = vec!["book_id".into(), "tag_id".into()];
    book_tags.foreign_keys.push(ForeignKey {
        name: Some("book_tags_book_id_fkey".to_string()),
        source_columns: vec!["book_id".into()],
        referenced_table: "books".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::Cascade,
        on_update: ForeignKeyAction::NoAction,
    });
    book_tags.foreign_keys.push(ForeignKey {
        name: Some("book_tags_tag_id_fkey".to_string()),
        source_columns: vec!["tag_id".into()],
        referenced_table: "tags".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::Cascade,
        on_update: ForeignKeyAction::NoAction,
    });
    model.tables.insert("book_tags".into(), book_tags);

    mark_junctions(&mut model);
    model
}

/// Relation graph over the bookstore model.
pub fn bookstore_graph(model: &Model) -> RelationGraph {
    classify(model, &TrailingS)
}

/// Runtime registry over the bookstore, soft deletes on `deleted_at`.
pub fn bookstore_registry() -> ApiRegistry {
    let model = bookstore_model();
    let graph = bookstore_graph(&model);
    build_registry(&model, &graph, Some("deleted_at"))
}

/// Introspect a live schema end-to-end into a runtime registry, the same
/// path the generation driver takes.
pub async fn introspect_registry(
    pool: sqlx::PgPool,
    schema: &str,
    soft_delete: Option<&str>,
) -> pgsdk_core::Result<ApiRegistry> {
    use pgsdk_core::schema::introspect::SchemaIntrospector;
    let introspector =
        pgsdk_core::schema::postgres::PostgresIntrospector::with_schema(pool, schema.to_string());
    let mut model = introspector.introspect().await?;
    mark_junctions(&mut model);
    let graph = classify(&model, &TrailingS);
    Ok(build_registry(&model, &graph, soft_delete))
}

/// Employees ↔ departments with a self-reference: every path is cyclic.
pub fn cyclic_model() -> Model {
    let mut model = Model::new("public".to_string());

    let mut employees = Table::new("employees".to_string());
    employees
        .columns
        .insert("id".into(), defaulted(col("id", DataType::Uuid)));
    employees
        .columns
        .insert("name".into(), col("name", DataType::Text));
    employees.columns.insert(
        "manager_id".into(),
        nullable(col("manager_id", DataType::Uuid)),
    );
    employees.columns.insert(
        "department_id".into(),
        nullable(col("department_id", DataType::Uuid)),
    );
    employees.primary_key = vec!["id".into()];
    employees.foreign_keys.push(ForeignKey {
        name: None,
        source_columns: vec!["manager_id".into()],
        referenced_table: "employees".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::SetNull,
        on_update: ForeignKeyAction::NoAction,
    });
    employees.foreign_keys.push(ForeignKey {
        name: None,
        source_columns: vec!["department_id".into()],
        referenced_table: "departments".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::SetNull,
        on_update: ForeignKeyAction::NoAction,
    });
    model.tables.insert("employees".into(), employees);

    let mut departments = Table::new("departments".to_string());
    departments
        .columns
        .insert("id".into(), defaulted(col("id", DataType::Uuid)));
    departments
        .columns
        .insert("name".into(), col("name", DataType::Text));
    departments
        .columns
        .insert("head_id".into(), nullable(col("head_id", DataType::Uuid)));
    departments.primary_key = vec!["id".into()];
    departments.foreign_keys.push(ForeignKey {
        name: None,
        source_columns: vec!["head_id".into()],
        referenced_table: "employees".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ForeignKeyAction::SetNull,
        on_update: ForeignKeyAction::NoAction,
    });
    model.tables.insert("departments".into(), departments);

    mark_junctions(&mut model);
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgsdk_core::graph::paths::enumerate_paths;
    use pgsdk_runtime::meta::RelationKind;

    #[test]
    fn test_bookstore_registry_shape() {
        let registry = bookstore_registry();
        assert_eq!(registry.tables.len(), 3);
        assert!(registry.junction_tables.contains_key("book_tags"));

        let books = registry.table("books").unwrap();
        assert_eq!(books.relations["author"].kind, RelationKind::One);
        assert!(books.relations["tags"].junction.is_some());
        // deleted_at only exists on authors
        assert!(registry.table("authors").unwrap().soft_delete().is_some());
        assert!(books.soft_delete().is_none());
    }

    #[test]
    fn test_cyclic_model_paths_terminate_at_every_depth() {
        let model = cyclic_model();
        let graph = bookstore_graph(&model);
        for depth in 0..=10 {
            for root in ["employees", "departments"] {
                let paths = enumerate_paths(&graph, root, depth);
                assert!(paths.len() < 1000, "depth {depth} from {root} exploded");
            }
        }
    }
}
