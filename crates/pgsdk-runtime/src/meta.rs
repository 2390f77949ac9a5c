//! # Runtime table metadata
//!
//! The generated server embeds an `ApiRegistry` — the frozen, read-only
//! description of every exposed table and relation that the request-time
//! algorithms (filter compiler, include loader, CRUD handlers) dispatch on.
//! Junction tables are carried separately: they back many-to-many edges but
//! are not exposed as API resources.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u64 = 50;
/// Upper bound for list page size.
pub const MAX_PAGE_LIMIT: u64 = 100;
/// Upper bound for a per-edge include `limit`.
pub const MAX_INCLUDE_ROWS: u64 = 1000;

/// Normalized column type as seen by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Uuid,
    /// text, varchar, char
    Text,
    /// int2/int4
    Integer,
    /// int8
    BigInt,
    /// float4
    Float,
    /// float8
    Double,
    Numeric,
    Boolean,
    /// timestamp without time zone
    Timestamp,
    /// timestamp with time zone
    TimestampTz,
    Date,
    /// json or jsonb
    Json,
    Bytea,
    /// Named database enum; compared through a `::text` cast.
    Enum(String),
    Array(Box<ColumnType>),
    /// pgvector column with a fixed dimension.
    Vector(u32),
}

impl ColumnType {
    /// Text-category columns — the only ones `$like`/`$ilike` accept.
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::Text)
    }

    /// Whether `$gt`/`$gte`/`$lt`/`$lte` make sense for this type.
    pub fn is_comparable(&self) -> bool {
        !matches!(
            self,
            ColumnType::Boolean
                | ColumnType::Json
                | ColumnType::Bytea
                | ColumnType::Array(_)
                | ColumnType::Vector(_)
        )
    }

    /// Whether the column may appear in `orderBy`.
    pub fn is_orderable(&self) -> bool {
        !matches!(
            self,
            ColumnType::Json | ColumnType::Bytea | ColumnType::Array(_) | ColumnType::Vector(_)
        )
    }

    /// SQL array type used for `= ANY($n::<cast>)` membership tests.
    /// `None` for types that cannot appear in `$in`/`$nin`.
    pub fn any_array_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Uuid => Some("uuid[]"),
            ColumnType::Text | ColumnType::Enum(_) => Some("text[]"),
            ColumnType::Integer => Some("int4[]"),
            ColumnType::BigInt => Some("int8[]"),
            ColumnType::Float => Some("float4[]"),
            ColumnType::Double => Some("float8[]"),
            ColumnType::Numeric => Some("numeric[]"),
            ColumnType::Boolean => Some("bool[]"),
            ColumnType::Timestamp => Some("timestamp[]"),
            ColumnType::TimestampTz => Some("timestamptz[]"),
            ColumnType::Date => Some("date[]"),
            ColumnType::Json
            | ColumnType::Bytea
            | ColumnType::Array(_)
            | ColumnType::Vector(_) => None,
        }
    }

    /// Explicit cast appended to a bound placeholder, for types whose wire
    /// form is text (`$n::numeric`, `$n::vector`, `$n::"status"`).
    pub fn param_cast(&self) -> Option<String> {
        match self {
            ColumnType::Numeric => Some("::numeric".to_string()),
            ColumnType::Vector(_) => Some("::vector".to_string()),
            ColumnType::Timestamp => Some("::timestamp".to_string()),
            ColumnType::TimestampTz => Some("::timestamptz".to_string()),
            ColumnType::Date => Some("::date".to_string()),
            ColumnType::Enum(name) => Some(format!("::\"{}\"", name.replace('"', "\"\""))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub has_default: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            has_default: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    One,
    Many,
}

/// Which table physically owns the FK columns of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkOwner {
    /// FK lives on the source table — a belongs-to edge.
    Source,
    /// FK lives on the target table — has-one / has-many.
    Target,
}

/// Junction bridging a many-to-many edge, from the source table's viewpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionMeta {
    pub table: String,
    /// Junction columns referencing the source table.
    pub source_fk_columns: Vec<String>,
    /// Columns on the source table those FKs reference.
    pub source_ref_columns: Vec<String>,
    /// Junction columns referencing the target table.
    pub target_fk_columns: Vec<String>,
    /// Columns on the target table those FKs reference.
    pub target_ref_columns: Vec<String>,
}

/// One directed edge of the relation graph, keyed under the source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationMeta {
    pub target: String,
    pub kind: RelationKind,
    pub fk_owner: FkOwner,
    /// FK columns on the owning side (empty for many-to-many).
    pub fk_columns: Vec<String>,
    /// Referenced columns on the other side (empty for many-to-many).
    pub ref_columns: Vec<String>,
    pub junction: Option<JunctionMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub columns: IndexMap<String, ColumnMeta>,
    pub primary_key: Vec<String>,
    pub relations: IndexMap<String, RelationMeta>,
    /// Soft-delete column, set when configured and present on this table.
    pub soft_delete_column: Option<String>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            primary_key: Vec::new(),
            relations: IndexMap::new(),
            soft_delete_column: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.get(name)
    }

    /// The soft-delete column, only when it actually exists on the table.
    pub fn soft_delete(&self) -> Option<&str> {
        self.soft_delete_column
            .as_deref()
            .filter(|c| self.columns.contains_key(*c))
    }
}

/// The frozen registry a generated server runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRegistry {
    pub schema: String,
    pub tables: IndexMap<String, TableMeta>,
    /// Junction tables, reachable by the include loader but not routed.
    pub junction_tables: IndexMap<String, TableMeta>,
}

impl ApiRegistry {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tables: IndexMap::new(),
            junction_tables: IndexMap::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name)
    }

    /// Lookup spanning exposed tables and junctions.
    pub fn any_table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name).or_else(|| self.junction_tables.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_the_only_like_target() {
        assert!(ColumnType::Text.is_text());
        assert!(!ColumnType::Uuid.is_text());
        assert!(!ColumnType::Enum("status".into()).is_text());
    }

    #[test]
    fn test_comparable_excludes_bool_json_array() {
        assert!(ColumnType::Integer.is_comparable());
        assert!(ColumnType::TimestampTz.is_comparable());
        assert!(!ColumnType::Boolean.is_comparable());
        assert!(!ColumnType::Json.is_comparable());
        assert!(!ColumnType::Array(Box::new(ColumnType::Text)).is_comparable());
        assert!(!ColumnType::Vector(3).is_comparable());
    }

    #[test]
    fn test_enum_param_cast_quotes_type_name() {
        let cast = ColumnType::Enum("order_status".into()).param_cast().unwrap();
        assert_eq!(cast, "::\"order_status\"");
    }

    #[test]
    fn test_soft_delete_requires_existing_column() {
        let mut t = TableMeta::new("books");
        t.soft_delete_column = Some("deleted_at".to_string());
        assert!(t.soft_delete().is_none());

        t.columns.insert(
            "deleted_at".to_string(),
            ColumnMeta::new("deleted_at", ColumnType::TimestampTz).nullable(),
        );
        assert_eq!(t.soft_delete(), Some("deleted_at"));
    }
}
