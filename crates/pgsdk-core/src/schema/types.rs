use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PgSdkError, Result};

/// Top-level normalized description of the source database schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub schema_name: String,
    pub tables: IndexMap<String, Table>,
    pub enums: IndexMap<String, Vec<String>>,
}

impl Model {
    pub fn new(schema_name: String) -> Self {
        Self {
            schema_name,
            tables: IndexMap::new(),
            enums: IndexMap::new(),
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn foreign_key_count(&self) -> usize {
        self.tables.values().map(|t| t.foreign_keys.len()).sum()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    /// Structural invariants the classifier and emitter rely on. Violations
    /// indicate a broken introspection pass, not bad user input.
    pub fn validate(&self) -> Result<()> {
        for (table_name, table) in &self.tables {
            for col in &table.primary_key {
                if !table.columns.contains_key(col) {
                    return Err(PgSdkError::Classification {
                        message: format!(
                            "primary key of '{table_name}' references missing column '{col}'"
                        ),
                    });
                }
            }
            for uk in &table.unique_keys {
                for col in &uk.columns {
                    if !table.columns.contains_key(col) {
                        return Err(PgSdkError::Classification {
                            message: format!(
                                "unique key on '{table_name}' references missing column '{col}'"
                            ),
                        });
                    }
                }
            }
            for fk in &table.foreign_keys {
                if fk.source_columns.len() != fk.referenced_columns.len() {
                    return Err(PgSdkError::Classification {
                        message: format!(
                            "foreign key on '{table_name}' has {} source column(s) but {} referenced column(s)",
                            fk.source_columns.len(),
                            fk.referenced_columns.len()
                        ),
                    });
                }
                let Some(parent) = self.tables.get(&fk.referenced_table) else {
                    // FKs into other schemas are dropped by the introspector;
                    // one surviving here is a bug.
                    return Err(PgSdkError::Classification {
                        message: format!(
                            "foreign key on '{table_name}' references unknown table '{}'",
                            fk.referenced_table
                        ),
                    });
                };
                for (src, dst) in fk.source_columns.iter().zip(&fk.referenced_columns) {
                    let Some(src_col) = table.columns.get(src) else {
                        return Err(PgSdkError::Classification {
                            message: format!(
                                "foreign key on '{table_name}' references missing column '{src}'"
                            ),
                        });
                    };
                    let Some(dst_col) = parent.columns.get(dst) else {
                        return Err(PgSdkError::Classification {
                            message: format!(
                                "foreign key on '{table_name}' references missing column '{}.{dst}'",
                                fk.referenced_table
                            ),
                        });
                    };
                    if src_col.data_type.family() != dst_col.data_type.family() {
                        return Err(PgSdkError::Classification {
                            message: format!(
                                "foreign key column type mismatch: {table_name}.{src} ({}) vs {}.{dst} ({})",
                                src_col.data_type, fk.referenced_table, dst_col.data_type
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Stable fingerprint of the model, for drift detection between a
    /// generated SDK and the server it was pulled from.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }
}

/// A database table with its columns, keys, and constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: IndexMap<String, Column>,
    pub primary_key: Vec<String>,
    pub unique_keys: Vec<UniqueKey>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Set by the junction post-pass; junctions back M:N edges and are
    /// suppressed from the public graph.
    pub is_junction: bool,
}

impl Table {
    pub fn new(name: String) -> Self {
        Self {
            name,
            columns: IndexMap::new(),
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
            is_junction: false,
        }
    }

    /// Whether a unique key (or the primary key) covers exactly this column
    /// set. Decides `one` vs `many` on parent→child edges.
    pub fn has_unique_over(&self, columns: &[String]) -> bool {
        let mut wanted: Vec<&str> = columns.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        let matches = |cols: &[String]| {
            let mut have: Vec<&str> = cols.iter().map(String::as_str).collect();
            have.sort_unstable();
            have == wanted
        };
        if !self.primary_key.is_empty() && matches(&self.primary_key) {
            return true;
        }
        self.unique_keys.iter().any(|uk| matches(&uk.columns))
    }
}

/// A single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub raw_type: String,
    pub nullable: bool,
    pub has_default: bool,
    pub ordinal_position: u32,
}

impl Column {
    pub fn new(name: String, data_type: DataType, raw_type: String) -> Self {
        Self {
            name,
            data_type,
            raw_type,
            nullable: true,
            has_default: false,
            ordinal_position: 0,
        }
    }
}

/// Normalized PostgreSQL column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// int2, smallint
    SmallInt,
    /// int4, integer
    Integer,
    /// int8, bigint
    BigInt,
    /// float4, real
    Float,
    /// float8, double precision
    Double,
    /// numeric, decimal
    Numeric,
    /// char
    Char,
    /// varchar, character varying
    VarChar,
    /// text
    Text,
    Boolean,
    Date,
    /// timestamp without time zone
    Timestamp,
    /// timestamp with time zone
    TimestampTz,
    Uuid,
    Json,
    Jsonb,
    /// bytea
    Bytea,
    /// PostgreSQL array
    Array(Box<DataType>),
    /// Named enum type
    Enum(String),
    /// pgvector column with dimension
    Vector(u32),
    /// Unrecognized type; surfaced as text
    Unknown(String),
}

impl DataType {
    /// Parse a raw SQL type string into a normalized DataType.
    pub fn from_raw(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let normalized = normalized.as_str();

        if let Some(inner) = normalized.strip_suffix("[]") {
            return DataType::Array(Box::new(DataType::from_raw(inner)));
        }
        if let Some(inner) = normalized.strip_prefix('_') {
            if !inner.is_empty() {
                // PostgreSQL internal array type prefix
                return DataType::Array(Box::new(DataType::from_raw(inner)));
            }
        }

        if let Some(dim) = parse_vector_raw(normalized) {
            return DataType::Vector(dim);
        }

        match normalized {
            "smallint" | "int2" | "smallserial" | "serial2" => DataType::SmallInt,
            "integer" | "int" | "int4" | "serial" | "serial4" => DataType::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => DataType::BigInt,
            "real" | "float4" => DataType::Float,
            "double precision" | "float8" => DataType::Double,
            s if s.starts_with("numeric") || s.starts_with("decimal") => DataType::Numeric,
            s if s.starts_with("character varying") || s.starts_with("varchar") => {
                DataType::VarChar
            }
            s if s.starts_with("char") || s.starts_with("character(") => DataType::Char,
            "text" | "citext" => DataType::Text,
            "boolean" | "bool" => DataType::Boolean,
            "date" => DataType::Date,
            "timestamp" | "timestamp without time zone" => DataType::Timestamp,
            "timestamp with time zone" | "timestamptz" => DataType::TimestampTz,
            "uuid" => DataType::Uuid,
            "json" => DataType::Json,
            "jsonb" => DataType::Jsonb,
            "bytea" => DataType::Bytea,
            // Caller resolves USER-DEFINED to an enum or vector by udt name.
            "user-defined" => DataType::Unknown("USER-DEFINED".to_string()),
            other => DataType::Unknown(other.to_string()),
        }
    }

    /// Coarse type family used for element-wise FK type matching.
    pub fn family(&self) -> &'static str {
        match self {
            DataType::SmallInt | DataType::Integer | DataType::BigInt => "integer",
            DataType::Float | DataType::Double | DataType::Numeric => "numeric",
            DataType::Char | DataType::VarChar | DataType::Text | DataType::Unknown(_) => "text",
            DataType::Boolean => "boolean",
            DataType::Date | DataType::Timestamp | DataType::TimestampTz => "temporal",
            DataType::Uuid => "uuid",
            DataType::Json | DataType::Jsonb => "json",
            DataType::Bytea => "bytea",
            DataType::Array(_) => "array",
            DataType::Enum(_) => "enum",
            DataType::Vector(_) => "vector",
        }
    }

    /// Lower into the runtime's column type.
    pub fn to_runtime(&self) -> pgsdk_runtime::ColumnType {
        use pgsdk_runtime::ColumnType as RT;
        match self {
            DataType::SmallInt | DataType::Integer => RT::Integer,
            DataType::BigInt => RT::BigInt,
            DataType::Float => RT::Float,
            DataType::Double => RT::Double,
            DataType::Numeric => RT::Numeric,
            DataType::Char | DataType::VarChar | DataType::Text | DataType::Unknown(_) => RT::Text,
            DataType::Boolean => RT::Boolean,
            DataType::Date => RT::Date,
            DataType::Timestamp => RT::Timestamp,
            DataType::TimestampTz => RT::TimestampTz,
            DataType::Uuid => RT::Uuid,
            DataType::Json | DataType::Jsonb => RT::Json,
            DataType::Bytea => RT::Bytea,
            DataType::Array(inner) => RT::Array(Box::new(inner.to_runtime())),
            DataType::Enum(name) => RT::Enum(name.clone()),
            DataType::Vector(dim) => RT::Vector(*dim),
        }
    }
}

/// Parse `vector` / `vector(3)` raw forms (pgvector).
fn parse_vector_raw(normalized: &str) -> Option<u32> {
    if normalized == "vector" {
        return Some(0);
    }
    let re = regex::Regex::new(r"^vector\((\d+)\)$").ok()?;
    let caps = re.captures(normalized)?;
    caps[1].parse().ok()
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::SmallInt => write!(f, "smallint"),
            DataType::Integer => write!(f, "integer"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Float => write!(f, "real"),
            DataType::Double => write!(f, "double precision"),
            DataType::Numeric => write!(f, "numeric"),
            DataType::Char => write!(f, "char"),
            DataType::VarChar => write!(f, "varchar"),
            DataType::Text => write!(f, "text"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Date => write!(f, "date"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::TimestampTz => write!(f, "timestamptz"),
            DataType::Uuid => write!(f, "uuid"),
            DataType::Json => write!(f, "json"),
            DataType::Jsonb => write!(f, "jsonb"),
            DataType::Bytea => write!(f, "bytea"),
            DataType::Array(inner) => write!(f, "{}[]", inner),
            DataType::Enum(name) => write!(f, "enum({})", name),
            DataType::Vector(dim) => write!(f, "vector({})", dim),
            DataType::Unknown(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub source_columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn parse_action(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "CASCADE" => ForeignKeyAction::Cascade,
            "SET NULL" => ForeignKeyAction::SetNull,
            "SET DEFAULT" => ForeignKeyAction::SetDefault,
            "RESTRICT" => ForeignKeyAction::Restrict,
            _ => ForeignKeyAction::NoAction,
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignKeyAction::NoAction => write!(f, "NO ACTION"),
            ForeignKeyAction::Restrict => write!(f, "RESTRICT"),
            ForeignKeyAction::Cascade => write!(f, "CASCADE"),
            ForeignKeyAction::SetNull => write!(f, "SET NULL"),
            ForeignKeyAction::SetDefault => write!(f, "SET DEFAULT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_core_types() {
        assert_eq!(DataType::from_raw("uuid"), DataType::Uuid);
        assert_eq!(DataType::from_raw("character varying"), DataType::VarChar);
        assert_eq!(DataType::from_raw("timestamp with time zone"), DataType::TimestampTz);
        assert_eq!(
            DataType::from_raw("_int4"),
            DataType::Array(Box::new(DataType::Integer))
        );
        assert_eq!(
            DataType::from_raw("text[]"),
            DataType::Array(Box::new(DataType::Text))
        );
    }

    #[test]
    fn test_from_raw_vector() {
        assert_eq!(DataType::from_raw("vector(3)"), DataType::Vector(3));
        assert_eq!(DataType::from_raw("vector"), DataType::Vector(0));
        assert_eq!(DataType::from_raw("vector(1536)"), DataType::Vector(1536));
    }

    #[test]
    fn test_has_unique_over_ignores_order() {
        let mut t = Table::new("book_tags".to_string());
        t.columns.insert(
            "book_id".to_string(),
            Column::new("book_id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        t.columns.insert(
            "tag_id".to_string(),
            Column::new("tag_id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        t.primary_key = vec!["book_id".to_string(), "tag_id".to_string()];

        assert!(t.has_unique_over(&["tag_id".to_string(), "book_id".to_string()]));
        assert!(!t.has_unique_over(&["book_id".to_string()]));
    }

    #[test]
    fn test_validate_catches_fk_arity_mismatch() {
        let mut model = Model::new("public".to_string());
        let mut users = Table::new("users".to_string());
        users.columns.insert(
            "id".to_string(),
            Column::new("id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        model.tables.insert("users".to_string(), users);

        let mut posts = Table::new("posts".to_string());
        posts.columns.insert(
            "user_id".to_string(),
            Column::new("user_id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        posts.foreign_keys.push(ForeignKey {
            name: None,
            source_columns: vec!["user_id".to_string()],
            referenced_table: "users".to_string(),
            referenced_columns: vec!["id".to_string(), "extra".to_string()],
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        model.tables.insert("posts".to_string(), posts);

        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("source column"));
    }

    #[test]
    fn test_validate_catches_fk_type_mismatch() {
        let mut model = Model::new("public".to_string());
        let mut users = Table::new("users".to_string());
        users.columns.insert(
            "id".to_string(),
            Column::new("id".to_string(), DataType::Uuid, "uuid".to_string()),
        );
        model.tables.insert("users".to_string(), users);

        let mut posts = Table::new("posts".to_string());
        posts.columns.insert(
            "user_id".to_string(),
            Column::new(
                "user_id".to_string(),
                DataType::BigInt,
                "bigint".to_string(),
            ),
        );
        posts.foreign_keys.push(ForeignKey {
            name: None,
            source_columns: vec!["user_id".to_string()],
            referenced_table: "users".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        model.tables.insert("posts".to_string(), posts);

        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let model = Model::new("public".to_string());
        assert_eq!(model.fingerprint(), model.fingerprint());
        assert_eq!(model.fingerprint().len(), 64);
    }

    #[test]
    fn test_to_runtime_mapping() {
        use pgsdk_runtime::ColumnType as RT;
        assert_eq!(DataType::VarChar.to_runtime(), RT::Text);
        assert_eq!(DataType::SmallInt.to_runtime(), RT::Integer);
        assert_eq!(DataType::Jsonb.to_runtime(), RT::Json);
        assert_eq!(DataType::Vector(3).to_runtime(), RT::Vector(3));
    }
}
