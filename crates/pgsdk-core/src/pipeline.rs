//! # Generation driver
//!
//! Orchestration only: load configuration, introspect, classify, emit,
//! write. Each step completes before the next begins, and failures name
//! the step and leave the previous output untouched — files are staged
//! into a sibling directory and swapped in as one unit.

use std::path::{Path, PathBuf};

use sqlx::postgres::PgPoolOptions;

use crate::config::PgSdkConfig;
use crate::emit::ir::{GeneratedFile, GENERATED_BANNER};
use crate::emit::{emit_all, Artifacts, EmitOptions};
use crate::error::{PgSdkError, Result};
use crate::graph::dag::DependencyGraph;
use crate::graph::naming::TrailingS;
use crate::graph::relations::{classify, mark_junctions};
use crate::schema::introspect::{check_database_url, sanitize_url, SchemaIntrospector};
use crate::schema::postgres::PostgresIntrospector;

pub struct GenerateParams {
    pub db_url: String,
    pub config: PgSdkConfig,
    /// Contract timestamp override; defaults to now. Fixing it makes two
    /// runs byte-identical.
    pub generated_at: Option<String>,
}

#[derive(Debug)]
pub struct GenerateReport {
    pub tables: usize,
    pub junctions: usize,
    pub relations: usize,
    pub files_written: usize,
    pub server_dir: PathBuf,
    pub client_dir: PathBuf,
}

/// Run the full pipeline: introspect → classify → emit → write.
pub async fn generate(params: GenerateParams) -> Result<GenerateReport> {
    let GenerateParams {
        db_url,
        config,
        generated_at,
    } = params;

    check_database_url(&db_url)?;

    tracing::info!(schema = %config.schema(), "connecting");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .map_err(|e| PgSdkError::Connection {
            message: "Failed to connect for introspection".to_string(),
            connection_hint: sanitize_url(&db_url),
            source: e,
        })?;

    tracing::info!("introspecting schema");
    let introspector = PostgresIntrospector::with_schema(pool.clone(), config.schema().to_string());
    let introspected = introspector.introspect().await;
    pool.close().await;
    let mut model = introspected?;

    tracing::info!(
        tables = model.table_count(),
        columns = model.column_count(),
        foreign_keys = model.foreign_key_count(),
        "model built"
    );

    mark_junctions(&mut model);
    let dep_graph = DependencyGraph::from_model(&model);
    if dep_graph.has_cycles() {
        tracing::info!("schema contains reference cycles; include expansion is depth-bounded");
    }
    let graph = classify(&model, &TrailingS);
    let junctions = model.tables.values().filter(|t| t.is_junction).count();
    tracing::info!(
        relations = graph.edge_count(),
        junctions,
        "relation graph classified"
    );

    let generated_at =
        generated_at.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let opts = EmitOptions::from_config(&config, env!("CARGO_PKG_VERSION"), &generated_at);
    let artifacts = emit_all(&model, &graph, &opts)?;

    let layout = config.output_layout();
    let files_written = write_artifacts(&artifacts, &layout.server, &layout.client)?;
    tracing::info!(
        files = files_written,
        server = %layout.server.display(),
        client = %layout.client.display(),
        "generation complete"
    );

    Ok(GenerateReport {
        tables: model.tables.len() - junctions,
        junctions,
        relations: graph.edge_count(),
        files_written,
        server_dir: layout.server,
        client_dir: layout.client,
    })
}

/// Write both roots with directory-replace semantics. When the client root
/// nests inside the server root (single-dir layout), everything stages and
/// swaps as one tree.
pub fn write_artifacts(
    artifacts: &Artifacts,
    server_dir: &Path,
    client_dir: &Path,
) -> Result<usize> {
    check_replaceable(server_dir)?;

    if client_dir.starts_with(server_dir) {
        let rel = client_dir
            .strip_prefix(server_dir)
            .unwrap_or_else(|_| Path::new("sdk"));
        let mut all = artifacts.server.clone();
        for f in &artifacts.client {
            all.push(GeneratedFile {
                path: rel.join(&f.path).to_string_lossy().into_owned(),
                content: f.content.clone(),
            });
        }
        replace_dir(server_dir, &all)?;
        Ok(all.len())
    } else {
        check_replaceable(client_dir)?;
        replace_dir(server_dir, &artifacts.server)?;
        replace_dir(client_dir, &artifacts.client)?;
        Ok(artifacts.server.len() + artifacts.client.len())
    }
}

/// Refuse to replace a directory that doesn't look like previous pgsdk
/// output: it must be absent, empty, or carry the generated banner in its
/// `mod.rs`.
fn check_replaceable(target: &Path) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }
    let is_empty = target
        .read_dir()
        .map(|mut d| d.next().is_none())
        .unwrap_or(false);
    if is_empty {
        return Ok(());
    }
    let mod_rs = target.join("mod.rs");
    let banner_ok = std::fs::read_to_string(&mod_rs)
        .map(|c| c.contains(GENERATED_BANNER))
        .unwrap_or(false);
    if banner_ok {
        return Ok(());
    }
    Err(PgSdkError::Emission {
        message: format!(
            "refusing to replace '{}': it does not look like pgsdk output (missing banner)",
            target.display()
        ),
    })
}

/// Stage all files next to the target, then swap directories. The old tree
/// survives any failure before the final rename.
fn replace_dir(target: &Path, files: &[GeneratedFile]) -> Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| PgSdkError::Output {
        message: format!("creating {}", parent.display()),
        source: e,
    })?;

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated".to_string());
    let staging = parent.join(format!(".{name}.pgsdk-staging"));
    let backup = parent.join(format!(".{name}.pgsdk-backup"));

    let _ = std::fs::remove_dir_all(&staging);
    let _ = std::fs::remove_dir_all(&backup);

    let stage_result = stage_files(&staging, files);
    if let Err(e) = stage_result {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    let had_previous = target.exists();
    if had_previous {
        std::fs::rename(target, &backup).map_err(|e| PgSdkError::Output {
            message: format!("moving previous output aside: {}", target.display()),
            source: e,
        })?;
    }
    match std::fs::rename(&staging, target) {
        Ok(()) => {
            let _ = std::fs::remove_dir_all(&backup);
            Ok(())
        }
        Err(e) => {
            // put the previous tree back before reporting
            if had_previous {
                let _ = std::fs::rename(&backup, target);
            }
            let _ = std::fs::remove_dir_all(&staging);
            Err(PgSdkError::Output {
                message: format!("activating staged output at {}", target.display()),
                source: e,
            })
        }
    }
}

fn stage_files(staging: &Path, files: &[GeneratedFile]) -> Result<()> {
    for file in files {
        let path = staging.join(&file.path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| PgSdkError::Output {
                message: format!("creating {}", dir.display()),
                source: e,
            })?;
        }
        std::fs::write(&path, &file.content).map_err(|e| PgSdkError::Output {
            message: format!("writing {}", path.display()),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(content: &str) -> Vec<GeneratedFile> {
        vec![
            GeneratedFile {
                path: "mod.rs".to_string(),
                content: format!("{GENERATED_BANNER}\n{content}"),
            },
            GeneratedFile {
                path: "routes/authors.rs".to_string(),
                content: content.to_string(),
            },
        ]
    }

    #[test]
    fn test_replace_dir_fresh_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("generated");
        replace_dir(&target, &files("v1")).unwrap();
        assert!(target.join("mod.rs").exists());
        assert!(target.join("routes/authors.rs").exists());
        // no staging or backup left behind
        assert!(!dir.path().join(".generated.pgsdk-staging").exists());
        assert!(!dir.path().join(".generated.pgsdk-backup").exists());
    }

    #[test]
    fn test_replace_dir_swaps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("generated");
        replace_dir(&target, &files("v1")).unwrap();
        replace_dir(&target, &files("v2")).unwrap();
        let content = std::fs::read_to_string(target.join("routes/authors.rs")).unwrap();
        assert_eq!(content, "v2");
    }

    #[test]
    fn test_check_replaceable_refuses_foreign_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("src");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("main.rs"), "fn main() {}").unwrap();

        let err = check_replaceable(&target).unwrap_err();
        assert!(err.to_string().contains("refusing to replace"));
    }

    #[test]
    fn test_check_replaceable_accepts_empty_and_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        assert!(check_replaceable(&empty).is_ok());

        let target = dir.path().join("generated");
        replace_dir(&target, &files("v1")).unwrap();
        assert!(check_replaceable(&target).is_ok());

        assert!(check_replaceable(&dir.path().join("missing")).is_ok());
    }

    #[test]
    fn test_write_artifacts_single_dir_nests_client() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("generated");
        let client = server.join("sdk");
        let artifacts = Artifacts {
            server: files("server"),
            client: vec![GeneratedFile {
                path: "mod.rs".to_string(),
                content: "client".to_string(),
            }],
        };
        let written = write_artifacts(&artifacts, &server, &client).unwrap();
        assert_eq!(written, 3);
        assert!(server.join("sdk/mod.rs").exists());
    }

    #[test]
    fn test_write_artifacts_pair_layout() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("api");
        let client = dir.path().join("sdk");
        let artifacts = Artifacts {
            server: files("server"),
            client: files("client"),
        };
        write_artifacts(&artifacts, &server, &client).unwrap();
        assert!(server.join("mod.rs").exists());
        assert!(client.join("mod.rs").exists());
    }
}
