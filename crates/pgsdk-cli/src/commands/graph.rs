use anyhow::{Context, Result};

use pgsdk_core::graph::dag::DependencyGraph;
use pgsdk_core::graph::visualize::{visualize, GraphFormat};
use pgsdk_core::schema::introspect::SchemaIntrospector;
use pgsdk_core::schema::postgres::PostgresIntrospector;

use crate::args::GraphArgs;

pub async fn run(args: &GraphArgs) -> Result<()> {
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
    let model = introspector.introspect().await?;

    let graph = DependencyGraph::from_model(&model);
    let format = match args.format {
        crate::args::GraphFormat::Mermaid => GraphFormat::Mermaid,
        crate::args::GraphFormat::Dot => GraphFormat::Dot,
    };

    println!("{}", visualize(&graph, format));
    Ok(())
}
