use std::path::Path;

use anyhow::Result;

use pgsdk_core::config::{read_config, PgSdkConfig};
use pgsdk_core::pipeline::{generate, GenerateParams};

use crate::args::GenerateArgs;

pub async fn run(args: &GenerateArgs) -> Result<()> {
    let config_dir = args.config_dir.as_deref().unwrap_or(".");
    let mut config = read_config(Path::new(config_dir))?.unwrap_or_else(|| {
        let mut c = PgSdkConfig::default();
        c.config_dir = std::fs::canonicalize(config_dir).ok();
        c
    });

    // CLI flags override pgsdk.toml.
    if let Some(schema) = &args.schema {
        config.database.schema = Some(schema.clone());
    }
    if let Some(out) = &args.out {
        config.output.dir = Some(out.clone());
        config.output.server = None;
        config.output.client = None;
    }
    if let Some(depth) = args.depth {
        config.generate.include_depth = Some(depth);
    }
    if let Some(soft_delete) = &args.soft_delete {
        config.generate.soft_delete_column = Some(soft_delete.clone());
    }
    config.validate()?;

    let db_url = args
        .db
        .clone()
        .or_else(|| config.database.url.clone())
        .ok_or(pgsdk_core::PgSdkError::NoDatabaseUrl)?;

    let report = generate(GenerateParams {
        db_url,
        config,
        generated_at: args.generated_at.clone(),
    })
    .await?;

    println!(
        "Generated {} files: {} tables, {} relations ({} junction table{} folded)",
        report.files_written,
        report.tables,
        report.relations,
        report.junctions,
        if report.junctions == 1 { "" } else { "s" },
    );
    println!("  server: {}", report.server_dir.display());
    println!("  client: {}", report.client_dir.display());

    Ok(())
}
