//! # Configuration File Parser
//!
//! Reads and parses `pgsdk.toml`, the optional user configuration file that
//! customizes generation without requiring CLI flags. Supports:
//!
//! - `[database]` — connection URL and schema
//! - `[output]` — output directory, or separate server/client roots
//! - `[generate]` — include depth, soft-delete column, date type
//! - `[auth]` — API keys, JWT services, SDK pull token
//! - `[tests]` — generated smoke-test settings
//! - `[hooks]` — reference to a user-supplied request hook
//!
//! Example `pgsdk.toml`:
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/myapp"
//! schema = "public"
//!
//! [output]
//! dir = "generated"
//!
//! [generate]
//! include_depth = 3
//! soft_delete_column = "deleted_at"
//! date_type = "string"
//!
//! [auth]
//! api_key_header = "x-api-key"
//! api_keys = ["env:PGSDK_API_KEY"]
//! pull_token = "env:PGSDK_PULL_TOKEN"
//!
//! [[auth.jwt.services]]
//! issuer = "https://issuer.example"
//! secret = "env:JWT_SECRET"
//!
//! [tests]
//! generate = true
//! output = "tests/generated_api.rs"
//! ```
//!
//! Secrets never appear literally: every secret-bearing field must use the
//! `env:NAME` sentinel, which the emitter rewrites into a deferred
//! environment lookup in the generated code. A literal secret is a fatal
//! configuration error before anything is emitted.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PgSdkError, Result};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "pgsdk.toml";

/// Sentinel prefix for secrets resolved from the environment at runtime.
pub const ENV_PREFIX: &str = "env:";

/// Top-level pgsdk.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PgSdkConfig {
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    pub generate: GenerateConfig,
    pub auth: AuthConfig,
    pub tests: TestsConfig,
    pub hooks: HooksConfig,

    /// Absolute path to the directory containing pgsdk.toml, captured by
    /// `read_config()` so relative output paths resolve against it.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "postgres://localhost/myapp").
    pub url: Option<String>,
    /// Schema name to introspect.
    pub schema: Option<String>,
}

/// Where generated code lands: a single directory (client code goes under
/// its `sdk/` subdirectory) or an explicit server/client pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub server: Option<String>,
    pub client: Option<String>,
}

/// Resolved output roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub server: PathBuf,
    pub client: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Maximum include depth (positive; default 3).
    pub include_depth: Option<usize>,
    /// Soft-delete column name; tables carrying it get soft deletes.
    pub soft_delete_column: Option<String>,
    /// How date/timestamp columns surface in generated types: "string" or "date".
    pub date_type: Option<String>,
    /// Promote per-edge include failures to 500 instead of degrading.
    pub strict_includes: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key_header: Option<String>,
    pub api_keys: Vec<String>,
    pub pull_token: Option<String>,
    pub jwt: Option<JwtConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub audience: Option<String>,
    pub services: Vec<JwtService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtService {
    pub issuer: String,
    pub secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    pub generate: bool,
    pub output: Option<String>,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Rust path of a user-supplied `RequestHook` implementation, wired
    /// into the generated server constructor.
    pub on_request: Option<String>,
}

/// Read and parse a pgsdk.toml file from the given directory.
///
/// Returns `None` if the file doesn't exist (config is optional).
/// Returns an error if the file exists but can't be parsed or validated.
pub fn read_config(dir: &Path) -> Result<Option<PgSdkConfig>> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| PgSdkError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let mut config: PgSdkConfig = toml::from_str(&content).map_err(|e| PgSdkError::Config {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;

    config.config_dir = Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()));

    config.validate()?;

    Ok(Some(config))
}

/// Extract the environment variable name from an `env:NAME` reference.
pub fn env_ref(value: &str) -> Option<&str> {
    value
        .strip_prefix(ENV_PREFIX)
        .filter(|name| !name.is_empty())
}

impl PgSdkConfig {
    /// Validate semantic constraints that serde cannot enforce. Called
    /// immediately after parsing, before any database work.
    pub fn validate(&self) -> Result<()> {
        if self.output.dir.is_some() && (self.output.server.is_some() || self.output.client.is_some())
        {
            return Err(PgSdkError::Config {
                message: "[output]: set either 'dir' or the 'server'/'client' pair, not both"
                    .to_string(),
            });
        }
        if self.output.server.is_some() != self.output.client.is_some() {
            return Err(PgSdkError::Config {
                message: "[output]: 'server' and 'client' must be set together".to_string(),
            });
        }

        if let Some(depth) = self.generate.include_depth {
            if depth == 0 {
                return Err(PgSdkError::Config {
                    message: "[generate]: include_depth must be a positive integer".to_string(),
                });
            }
        }
        if let Some(dt) = &self.generate.date_type {
            if dt != "date" && dt != "string" {
                return Err(PgSdkError::Config {
                    message: format!(
                        "[generate]: date_type must be \"date\" or \"string\", got \"{dt}\""
                    ),
                });
            }
        }

        // Hardcoded-secret rejection: every secret field must defer to the
        // environment via the env: sentinel.
        for (i, key) in self.auth.api_keys.iter().enumerate() {
            if env_ref(key).is_none() {
                return Err(PgSdkError::Config {
                    message: format!(
                        "[auth]: api_keys[{i}] must use the env:NAME form, not a literal secret"
                    ),
                });
            }
        }
        if let Some(token) = &self.auth.pull_token {
            if env_ref(token).is_none() {
                return Err(PgSdkError::Config {
                    message: "[auth]: pull_token must use the env:NAME form, not a literal secret"
                        .to_string(),
                });
            }
        }
        if let Some(jwt) = &self.auth.jwt {
            for service in &jwt.services {
                if env_ref(&service.secret).is_none() {
                    return Err(PgSdkError::Config {
                        message: format!(
                            "[auth.jwt]: secret for issuer '{}' must use the env:NAME form",
                            service.issuer
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Resolve the output layout. Single-directory mode places client code
    /// under `sdk/` inside it; the pair keeps the roots fully separate.
    pub fn output_layout(&self) -> OutputLayout {
        let base = self
            .config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        match (&self.output.dir, &self.output.server, &self.output.client) {
            (_, Some(server), Some(client)) => OutputLayout {
                server: base.join(server),
                client: base.join(client),
            },
            (Some(dir), _, _) => OutputLayout {
                server: base.join(dir),
                client: base.join(dir).join("sdk"),
            },
            _ => OutputLayout {
                server: base.join("generated"),
                client: base.join("generated").join("sdk"),
            },
        }
    }

    pub fn include_depth(&self) -> usize {
        self.generate.include_depth.unwrap_or(3)
    }

    pub fn schema(&self) -> &str {
        self.database.schema.as_deref().unwrap_or("public")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
url = "postgres://localhost/myapp"
schema = "public"

[output]
dir = "generated"

[generate]
include_depth = 4
soft_delete_column = "deleted_at"
date_type = "string"

[auth]
api_key_header = "x-api-key"
api_keys = ["env:PGSDK_API_KEY"]
pull_token = "env:PGSDK_PULL_TOKEN"

[[auth.jwt.services]]
issuer = "https://issuer.example"
secret = "env:JWT_SECRET"

[tests]
generate = true
output = "tests/generated_api.rs"

[hooks]
on_request = "crate::hooks::TenantHook"
"#;

        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/myapp")
        );
        assert_eq!(config.include_depth(), 4);
        assert_eq!(config.generate.soft_delete_column.as_deref(), Some("deleted_at"));
        assert_eq!(config.auth.api_keys.len(), 1);
        assert!(config.tests.generate);
        assert_eq!(config.hooks.on_request.as_deref(), Some("crate::hooks::TenantHook"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: PgSdkConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.include_depth(), 3);
        assert_eq!(config.schema(), "public");
    }

    #[test]
    fn test_hardcoded_api_key_rejected() {
        let toml = r#"
[auth]
api_keys = ["sk-live-abc123"]
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("env:NAME"));
    }

    #[test]
    fn test_hardcoded_jwt_secret_rejected() {
        let toml = r#"
[[auth.jwt.services]]
issuer = "https://issuer.example"
secret = "super-secret-value"
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("issuer.example"));
    }

    #[test]
    fn test_hardcoded_pull_token_rejected() {
        let toml = r#"
[auth]
pull_token = "not-an-env-ref"
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_ref_extraction() {
        assert_eq!(env_ref("env:JWT_SECRET"), Some("JWT_SECRET"));
        assert_eq!(env_ref("env:"), None);
        assert_eq!(env_ref("literal"), None);
    }

    #[test]
    fn test_output_dir_and_pair_conflict() {
        let toml = r#"
[output]
dir = "generated"
server = "api/src/generated"
client = "sdk/src"
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_pair_must_be_complete() {
        let toml = r#"
[output]
server = "api/src/generated"
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_layout_single_dir_nests_sdk() {
        let toml = r#"
[output]
dir = "generated"
"#;
        let mut config: PgSdkConfig = toml::from_str(toml).unwrap();
        config.config_dir = Some(PathBuf::from("/proj"));
        let layout = config.output_layout();
        assert_eq!(layout.server, PathBuf::from("/proj/generated"));
        assert_eq!(layout.client, PathBuf::from("/proj/generated/sdk"));
    }

    #[test]
    fn test_output_layout_pair() {
        let toml = r#"
[output]
server = "api/src/generated"
client = "sdk/src"
"#;
        let mut config: PgSdkConfig = toml::from_str(toml).unwrap();
        config.config_dir = Some(PathBuf::from("/proj"));
        let layout = config.output_layout();
        assert_eq!(layout.server, PathBuf::from("/proj/api/src/generated"));
        assert_eq!(layout.client, PathBuf::from("/proj/sdk/src"));
    }

    #[test]
    fn test_zero_include_depth_rejected() {
        let toml = r#"
[generate]
include_depth = 0
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_date_type_rejected() {
        let toml = r#"
[generate]
date_type = "unix"
"#;
        let config: PgSdkConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_config_nonexistent() {
        let result = read_config(Path::new("/nonexistent/dir"));
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_read_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pgsdk.toml"),
            r#"
[database]
url = "postgres://localhost/test"
"#,
        )
        .unwrap();

        let config = read_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/test")
        );
        assert!(config.config_dir.is_some());
    }

    #[test]
    fn test_read_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pgsdk.toml"), "this is not valid [[[toml").unwrap();
        assert!(read_config(dir.path()).is_err());
    }
}
