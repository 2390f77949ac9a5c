use anyhow::{Context, Result};
use comfy_table::{Cell, Table as ComfyTable};

use pgsdk_core::graph::relations::mark_junctions;
use pgsdk_core::schema::introspect::SchemaIntrospector;
use pgsdk_core::schema::postgres::PostgresIntrospector;

use crate::args::IntrospectArgs;

pub async fn run(args: &IntrospectArgs) -> Result<()> {
    let db_url = args
        .db
        .as_deref()
        .ok_or(pgsdk_core::PgSdkError::NoDatabaseUrl)?;
    pgsdk_core::schema::introspect::check_database_url(db_url)?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let schema_name = args.schema.clone().unwrap_or_else(|| "public".to_string());
    let introspector = PostgresIntrospector::with_schema(pool, schema_name);
    let mut model = introspector.introspect().await?;
    mark_junctions(&mut model);

    match args.format {
        crate::args::IntrospectFormat::Json => {
            let json = serde_json::to_string_pretty(&model)?;
            println!("{}", json);
        }
        crate::args::IntrospectFormat::Table => {
            println!("Schema: {}", model.schema_name);
            println!(
                "Tables: {}  Columns: {}  Foreign Keys: {}",
                model.table_count(),
                model.column_count(),
                model.foreign_key_count()
            );
            if !model.enums.is_empty() {
                println!("Enums: {}", model.enums.len());
            }
            println!();

            for (table_name, table) in &model.tables {
                if table.is_junction {
                    println!("━━━ {} (junction) ━━━", table_name);
                } else {
                    println!("━━━ {} ━━━", table_name);
                }

                let mut t = ComfyTable::new();
                t.set_header(vec!["Column", "Type", "Nullable", "Default", "PK", "FK"]);

                for (col_name, column) in &table.columns {
                    let is_pk = table.primary_key.iter().any(|pk| pk == col_name);
                    let fk_target = table.foreign_keys.iter().find_map(|fk| {
                        if fk.source_columns.contains(col_name) {
                            Some(format!("→ {}", fk.referenced_table))
                        } else {
                            None
                        }
                    });

                    t.add_row(vec![
                        Cell::new(col_name),
                        Cell::new(column.data_type.to_string()),
                        Cell::new(if column.nullable { "YES" } else { "NO" }),
                        Cell::new(if column.has_default { "YES" } else { "" }),
                        Cell::new(if is_pk { "PK" } else { "" }),
                        Cell::new(fk_target.as_deref().unwrap_or("")),
                    ]);
                }

                println!("{}", t);
                println!();
            }
        }
    }

    Ok(())
}
