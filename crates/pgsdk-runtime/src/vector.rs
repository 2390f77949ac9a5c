//! # Vector search
//!
//! Extends list queries with similarity ordering over pgvector columns. The
//! compiled query projects the distance as `_distance`, orders ascending by
//! it, and AND-combines an optional threshold with the request filter.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::meta::{ColumnType, TableMeta};
use crate::value::{quote_ident, BindValue, ParamBuffer};

/// Wire form of the `vector` key in a list body.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorQueryInput {
    pub field: String,
    pub query: Vec<f64>,
    pub metric: Option<String>,
    #[serde(rename = "maxDistance")]
    pub max_distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
    Cosine,
    L2,
    Inner,
}

impl VectorMetric {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(VectorMetric::Cosine),
            "l2" => Ok(VectorMetric::L2),
            "inner" => Ok(VectorMetric::Inner),
            _ => Err(ApiError::invalid(
                "vector.metric",
                "expected \"cosine\", \"l2\", or \"inner\"",
            )),
        }
    }

    /// pgvector distance operator.
    pub fn operator(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "<=>",
            VectorMetric::L2 => "<->",
            VectorMetric::Inner => "<#>",
        }
    }
}

/// Validated vector search, ready to render.
#[derive(Debug, Clone)]
pub struct VectorSearch {
    pub column: String,
    pub query: Vec<f64>,
    pub metric: VectorMetric,
    pub max_distance: Option<f64>,
}

/// Validate the input against the table: the column must be a vector column
/// and the query must match its dimension.
pub fn validate_vector(table: &TableMeta, input: &VectorQueryInput) -> Result<VectorSearch> {
    let Some(col) = table.column(&input.field) else {
        return Err(ApiError::invalid(
            "vector.field",
            format!("unknown column on '{}'", table.name),
        ));
    };
    let ColumnType::Vector(dim) = &col.ty else {
        return Err(ApiError::invalid(
            "vector.field",
            format!("'{}' is not a vector column", input.field),
        ));
    };
    let dim = *dim;
    if input.query.len() != dim as usize {
        return Err(ApiError::invalid(
            "vector.query",
            format!("expected a vector of dimension {dim}, got {}", input.query.len()),
        ));
    }
    let metric = match &input.metric {
        Some(s) => VectorMetric::parse(s)?,
        None => VectorMetric::Cosine,
    };
    Ok(VectorSearch {
        column: input.field.clone(),
        query: input.query.clone(),
        metric,
        max_distance: input.max_distance,
    })
}

impl VectorSearch {
    /// Bind the query vector and render the distance expression.
    pub fn distance_expr(&self, buf: &mut ParamBuffer) -> String {
        let parts: Vec<String> = self.query.iter().map(|n| format!("{n}")).collect();
        let ph = buf.placeholder(
            BindValue::Text(format!("[{}]", parts.join(","))),
            &ColumnType::Vector(self.query.len() as u32),
        );
        format!("({} {} {})", quote_ident(&self.column), self.metric.operator(), ph)
    }

    /// Threshold predicate over an already-rendered distance expression.
    pub fn threshold_predicate(&self, distance_expr: &str, buf: &mut ParamBuffer) -> Option<String> {
        self.max_distance.map(|max| {
            let ph = buf.placeholder(BindValue::Float(max), &ColumnType::Double);
            format!("{distance_expr} <= {ph}")
        })
    }
}

/// Deserialize the `vector` key of a list body.
pub fn parse_vector_input(value: &Value) -> Result<VectorQueryInput> {
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::invalid("vector", format!("invalid vector specification: {e}")))
}
