use indexmap::IndexMap;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::{PgSdkError, Result};
use crate::schema::introspect::SchemaIntrospector;
use crate::schema::types::*;

pub struct PostgresIntrospector {
    pool: PgPool,
    schema_name: String,
}

impl PostgresIntrospector {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_name: "public".to_string(),
        }
    }

    pub fn with_schema(pool: PgPool, schema_name: String) -> Self {
        Self { pool, schema_name }
    }

    async fn check_schema_exists(&self) -> Result<()> {
        let query = "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1";
        let row = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "check schema".to_string(),
                source: e,
            })?;
        if row.is_none() {
            return Err(PgSdkError::UnknownSchema {
                schema: self.schema_name.clone(),
            });
        }
        Ok(())
    }

    async fn introspect_tables(&self) -> Result<IndexMap<String, Table>> {
        let query = "SELECT table_name FROM information_schema.tables WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";
        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch tables".to_string(),
                source: e,
            })?;

        let mut tables = IndexMap::new();
        for row in rows {
            let name: String = row.get("table_name");
            tables.insert(name.clone(), Table::new(name));
        }
        Ok(tables)
    }

    async fn introspect_columns(&self, tables: &mut IndexMap<String, Table>) -> Result<()> {
        let query = r#"
            SELECT
                c.table_name,
                c.column_name,
                c.data_type,
                c.udt_name,
                c.is_nullable,
                c.column_default,
                c.ordinal_position
            FROM information_schema.columns c
            WHERE c.table_schema = $1
            ORDER BY c.table_name, c.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch columns".to_string(),
                source: e,
            })?;

        for row in rows {
            let table_name: String = row.get("table_name");
            let column_name: String = row.get("column_name");
            let data_type_str: String = row.get("data_type");
            let udt_name: String = row.get("udt_name");
            let is_nullable: String = row.get("is_nullable");
            let column_default: Option<String> = row.get("column_default");
            let ordinal_position: i32 = row.get("ordinal_position");

            let data_type = if data_type_str == "USER-DEFINED" {
                if udt_name == "vector" {
                    // dimension back-filled by the pg_attribute pass
                    DataType::Vector(0)
                } else {
                    DataType::Enum(udt_name.clone())
                }
            } else if data_type_str == "ARRAY" {
                // PostgreSQL arrays: udt_name carries an underscore prefix
                let inner_type = if let Some(stripped) = udt_name.strip_prefix('_') {
                    DataType::from_raw(stripped)
                } else {
                    DataType::from_raw(&udt_name)
                };
                DataType::Array(Box::new(inner_type))
            } else {
                DataType::from_raw(&data_type_str)
            };

            let mut column = Column::new(column_name.clone(), data_type, data_type_str.clone());
            column.nullable = is_nullable == "YES";
            column.has_default = column_default.is_some();
            column.ordinal_position = ordinal_position as u32;

            if let Some(table) = tables.get_mut(&table_name) {
                table.columns.insert(column_name, column);
            }
        }

        Ok(())
    }

    /// pgvector dimensions live in atttypmod, invisible to
    /// information_schema.
    async fn introspect_vector_dims(&self, tables: &mut IndexMap<String, Table>) -> Result<()> {
        let query = r#"
            SELECT
                c.relname AS table_name,
                a.attname AS column_name,
                a.atttypmod AS dim
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_type t ON t.oid = a.atttypid
            WHERE n.nspname = $1
                AND t.typname = 'vector'
                AND a.attnum > 0
                AND NOT a.attisdropped
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch vector dimensions".to_string(),
                source: e,
            })?;

        for row in rows {
            let table_name: String = row.get("table_name");
            let column_name: String = row.get("column_name");
            let dim: i32 = row.get("dim");

            if let Some(column) = tables
                .get_mut(&table_name)
                .and_then(|t| t.columns.get_mut(&column_name))
            {
                column.data_type = DataType::Vector(dim.max(0) as u32);
            }
        }

        Ok(())
    }

    async fn introspect_primary_keys(&self, tables: &mut IndexMap<String, Table>) -> Result<()> {
        let query = r#"
            SELECT
                tc.table_name,
                kcu.column_name,
                kcu.ordinal_position
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = $1
                AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY tc.table_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch primary keys".to_string(),
                source: e,
            })?;

        for row in rows {
            let table_name: String = row.get("table_name");
            let column_name: String = row.get("column_name");
            if let Some(table) = tables.get_mut(&table_name) {
                table.primary_key.push(column_name);
            }
        }

        Ok(())
    }

    /// Foreign keys with ordinal correlation: `position_in_unique_constraint`
    /// pairs each source column with its referenced column, which
    /// constraint_column_usage alone cannot do for composite keys.
    async fn introspect_foreign_keys(&self, tables: &mut IndexMap<String, Table>) -> Result<()> {
        let query = r#"
            SELECT
                tc.table_name,
                tc.constraint_name,
                kcu.column_name,
                ccu.table_name AS referenced_table_name,
                ccu.column_name AS referenced_column_name,
                rc.delete_rule,
                rc.update_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.referential_constraints rc
                ON tc.constraint_name = rc.constraint_name
                AND tc.table_schema = rc.constraint_schema
            JOIN information_schema.key_column_usage ccu
                ON rc.unique_constraint_name = ccu.constraint_name
                AND rc.unique_constraint_schema = ccu.table_schema
                AND ccu.ordinal_position = kcu.position_in_unique_constraint
            WHERE tc.table_schema = $1
                AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch foreign keys".to_string(),
                source: e,
            })?;

        let mut fk_map: IndexMap<(String, String), ForeignKey> = IndexMap::new();
        for row in rows {
            let table_name: String = row.get("table_name");
            let constraint_name: String = row.get("constraint_name");
            let column_name: String = row.get("column_name");
            let ref_table: String = row.get("referenced_table_name");
            let ref_column: String = row.get("referenced_column_name");
            let delete_rule: String = row.get("delete_rule");
            let update_rule: String = row.get("update_rule");

            let key = (table_name, constraint_name.clone());
            let entry = fk_map.entry(key).or_insert_with(|| ForeignKey {
                name: Some(constraint_name),
                source_columns: Vec::new(),
                referenced_table: ref_table,
                referenced_columns: Vec::new(),
                on_delete: ForeignKeyAction::parse_action(&delete_rule),
                on_update: ForeignKeyAction::parse_action(&update_rule),
            });
            entry.source_columns.push(column_name);
            entry.referenced_columns.push(ref_column);
        }

        for ((table_name, _), fk) in fk_map {
            // References into other schemas are out of scope for the graph.
            if !tables.contains_key(&fk.referenced_table) {
                tracing::warn!(
                    table = %table_name,
                    referenced = %fk.referenced_table,
                    "dropping foreign key into another schema"
                );
                continue;
            }
            if let Some(table) = tables.get_mut(&table_name) {
                table.foreign_keys.push(fk);
            }
        }

        Ok(())
    }

    /// Unique coverage comes from pg_index so that plain unique indexes
    /// count, not just declared UNIQUE constraints. Partial and expression
    /// indexes are excluded; key order is preserved.
    async fn introspect_unique_indexes(&self, tables: &mut IndexMap<String, Table>) -> Result<()> {
        let query = r#"
            SELECT
                c.relname AS table_name,
                i.relname AS index_name,
                a.attname AS column_name
            FROM pg_index ix
            JOIN pg_class c ON c.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
                AND ix.indisunique
                AND NOT ix.indisprimary
                AND ix.indpred IS NULL
                AND ix.indexprs IS NULL
            ORDER BY c.relname, i.relname, k.ord
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch unique indexes".to_string(),
                source: e,
            })?;

        let mut uk_map: IndexMap<(String, String), Vec<String>> = IndexMap::new();
        for row in rows {
            let table_name: String = row.get("table_name");
            let index_name: String = row.get("index_name");
            let column_name: String = row.get("column_name");
            uk_map
                .entry((table_name, index_name))
                .or_default()
                .push(column_name);
        }

        for ((table_name, index_name), columns) in uk_map {
            if let Some(table) = tables.get_mut(&table_name) {
                table.unique_keys.push(UniqueKey {
                    name: Some(index_name),
                    columns,
                });
            }
        }

        Ok(())
    }

    async fn introspect_enums(&self) -> Result<IndexMap<String, Vec<String>>> {
        let query = r#"
            SELECT
                t.typname AS enum_name,
                e.enumlabel AS enum_value,
                e.enumsortorder
            FROM pg_type t
            JOIN pg_enum e ON t.oid = e.enumtypid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1
            ORDER BY t.typname, e.enumsortorder
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PgSdkError::Introspection {
                query: "fetch enums".to_string(),
                source: e,
            })?;

        let mut enums: IndexMap<String, Vec<String>> = IndexMap::new();
        for row in rows {
            let enum_name: String = row.get("enum_name");
            let enum_value: String = row.get("enum_value");
            enums.entry(enum_name).or_default().push(enum_value);
        }

        Ok(enums)
    }
}

impl SchemaIntrospector for PostgresIntrospector {
    async fn introspect(&self) -> Result<Model> {
        self.check_schema_exists().await?;

        let mut model = Model::new(self.schema_name.clone());

        model.tables = self.introspect_tables().await?;
        self.introspect_columns(&mut model.tables).await?;
        self.introspect_vector_dims(&mut model.tables).await?;
        self.introspect_primary_keys(&mut model.tables).await?;
        self.introspect_foreign_keys(&mut model.tables).await?;
        self.introspect_unique_indexes(&mut model.tables).await?;
        model.enums = self.introspect_enums().await?;

        model.validate()?;
        Ok(model)
    }
}
