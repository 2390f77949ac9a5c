//! # Include spec and loader
//!
//! The include spec is the user-supplied tree describing which related data
//! to hydrate onto a result set. The loader walks it breadth-first per edge,
//! batching every parent of an edge into one lookup (two for many-to-many)
//! so a request never degenerates into per-row queries.
//!
//! Each edge is lowered to a tagged plan — belongs-to, has-one, has-many, or
//! many-to-many — and evaluated by a single dispatch. Per-edge options
//! (limit/offset/order/select/exclude/where) expand the edge's query; a
//! has-many edge with a `limit` uses a window-function pattern so every
//! parent gets its own top-N slice in one round trip.
//!
//! Failures inside one edge degrade that edge to its empty default and are
//! reported as stitch errors; sibling edges continue (strict mode promotes
//! instead).

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::error::{ApiError, Result};
use crate::exec::{fetch_rows, qualified_table};
use crate::filter::{compile_where, membership_array};
use crate::meta::{
    ApiRegistry, ColumnType, FkOwner, JunctionMeta, RelationKind, RelationMeta, TableMeta,
    MAX_INCLUDE_ROWS,
};
use crate::order::{parse_order, primary_key_order, OrderSpec};
use crate::value::{
    bind_value_from_json, quote_ident, row_to_json, select_list, BindValue, ParamBuffer,
};

pub type JsonMap = Map<String, Value>;

/// One relation key of an include spec: `true` or an options object.
#[derive(Debug, Clone, Default)]
pub struct IncludeNode {
    pub include: Option<IncludeSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Option<Value>,
    pub order: Option<Value>,
    pub select: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub filter: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct IncludeSpec {
    pub entries: IndexMap<String, IncludeNode>,
}

impl IncludeSpec {
    /// Length of the longest nested `include` chain.
    pub fn depth(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        1 + self
            .entries
            .values()
            .map(|n| n.include.as_ref().map_or(0, IncludeSpec::depth))
            .max()
            .unwrap_or(0)
    }
}

/// Parse the wire form of an include spec, validating shape only.
pub fn parse_include(value: &Value, path: &str) -> Result<IncludeSpec> {
    let Some(obj) = value.as_object() else {
        return Err(ApiError::invalid(path, "include must be an object"));
    };

    let mut spec = IncludeSpec::default();
    for (key, val) in obj {
        let node_path = format!("{path}.{key}");
        match val {
            Value::Bool(true) => {
                spec.entries.insert(key.clone(), IncludeNode::default());
            }
            Value::Bool(false) => {
                // explicit opt-out: same as omitting the key
            }
            Value::Object(opts) => {
                spec.entries
                    .insert(key.clone(), parse_node(opts, &node_path)?);
            }
            _ => {
                return Err(ApiError::invalid(
                    node_path,
                    "expected true or an options object",
                ))
            }
        }
    }
    Ok(spec)
}

fn parse_node(opts: &JsonMap, path: &str) -> Result<IncludeNode> {
    let mut node = IncludeNode::default();
    for (key, val) in opts {
        match key.as_str() {
            "include" => node.include = Some(parse_include(val, &format!("{path}.include"))?),
            "limit" => match val.as_u64() {
                Some(n) if n <= MAX_INCLUDE_ROWS => node.limit = Some(n),
                Some(_) => {
                    return Err(ApiError::invalid(
                        format!("{path}.limit"),
                        format!("must be at most {MAX_INCLUDE_ROWS}"),
                    ))
                }
                None => {
                    return Err(ApiError::invalid(
                        format!("{path}.limit"),
                        "expected a non-negative integer",
                    ))
                }
            },
            "offset" => match val.as_u64() {
                Some(n) => node.offset = Some(n),
                None => {
                    return Err(ApiError::invalid(
                        format!("{path}.offset"),
                        "expected a non-negative integer",
                    ))
                }
            },
            "orderBy" => node.order_by = Some(val.clone()),
            "order" => node.order = Some(val.clone()),
            "select" => node.select = Some(string_list(val, &format!("{path}.select"))?),
            "exclude" => node.exclude = Some(string_list(val, &format!("{path}.exclude"))?),
            "where" => node.filter = Some(val.clone()),
            _ => {
                return Err(ApiError::invalid(
                    format!("{path}.{key}"),
                    "unknown include option",
                ))
            }
        }
    }
    if node.select.is_some() && node.exclude.is_some() {
        return Err(ApiError::invalid(
            path,
            "select and exclude are mutually exclusive",
        ));
    }
    Ok(node)
}

fn string_list(value: &Value, path: &str) -> Result<Vec<String>> {
    let Some(items) = value.as_array() else {
        return Err(ApiError::invalid(path, "expected an array of column names"));
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ApiError::invalid(path, "expected an array of column names"))
        })
        .collect()
}

/// Validate an include spec against the registry: depth cap, option types,
/// columns of the target tables. Unknown relation keys pass validation —
/// the loader skips them with a warning and an empty default.
pub fn validate_include(
    registry: &ApiRegistry,
    table: &str,
    spec: &IncludeSpec,
    max_depth: usize,
) -> Result<()> {
    if spec.depth() > max_depth {
        return Err(ApiError::invalid(
            "include",
            format!("include depth exceeds the configured limit of {max_depth}"),
        ));
    }
    validate_level(registry, table, spec, "include")
}

fn validate_level(
    registry: &ApiRegistry,
    table: &str,
    spec: &IncludeSpec,
    path: &str,
) -> Result<()> {
    let Some(meta) = registry.table(table) else {
        return Ok(());
    };
    for (key, node) in &spec.entries {
        let Some(rel) = meta.relations.get(key) else {
            continue;
        };
        let Some(target) = registry.table(&rel.target) else {
            continue;
        };
        let node_path = format!("{path}.{key}");

        parse_order(
            target,
            node.order_by.as_ref(),
            node.order.as_ref(),
            &node_path,
        )?;
        for (list, name) in [(&node.select, "select"), (&node.exclude, "exclude")] {
            if let Some(cols) = list {
                for col in cols {
                    if !target.columns.contains_key(col) {
                        return Err(ApiError::invalid(
                            format!("{node_path}.{name}"),
                            format!("unknown column '{col}' on '{}'", target.name),
                        ));
                    }
                }
            }
        }
        if let Some(filter) = &node.filter {
            let mut scratch = ParamBuffer::new();
            compile_where(target, filter, &mut scratch)?;
        }
        if let Some(sub) = &node.include {
            validate_level(registry, &rel.target, sub, &format!("{node_path}.include"))?;
        }
    }
    Ok(())
}

/// A non-fatal per-edge failure, surfaced to the client as `includeError`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StitchError {
    pub path: String,
    pub relation: String,
    pub message: String,
}

/// Batch-hydrates relation keys onto already-loaded parent rows.
pub struct IncludeLoader<'a> {
    pool: &'a PgPool,
    registry: &'a ApiRegistry,
    max_depth: usize,
    strict: bool,
}

/// Tagged per-edge plan, resolved once and evaluated by a single dispatch.
enum EdgePlan<'r> {
    BelongsTo {
        target: &'r TableMeta,
    },
    HasOne {
        target: &'r TableMeta,
    },
    HasMany {
        target: &'r TableMeta,
    },
    ManyToMany {
        target: &'r TableMeta,
        junction: &'r TableMeta,
        jm: &'r JunctionMeta,
    },
}

impl<'a> IncludeLoader<'a> {
    pub fn new(pool: &'a PgPool, registry: &'a ApiRegistry) -> Self {
        Self {
            pool,
            registry,
            max_depth: 3,
            strict: false,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Load `spec` onto a copy of `parents`. The input is never mutated;
    /// it is cloned exactly once at entry.
    pub async fn load(
        &self,
        table: &str,
        parents: &[JsonMap],
        spec: &IncludeSpec,
    ) -> Result<(Vec<JsonMap>, Vec<StitchError>)> {
        let mut rows = parents.to_vec();
        let mut errors = Vec::new();
        self.walk(table.to_string(), &mut rows, spec, 0, String::new(), &mut errors)
            .await?;
        Ok((rows, errors))
    }

    fn walk<'b>(
        &'b self,
        table: String,
        rows: &'b mut Vec<JsonMap>,
        spec: &'b IncludeSpec,
        depth: usize,
        path: String,
        errors: &'b mut Vec<StitchError>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'b>> {
        Box::pin(async move {
            // Depth limit reached: the remaining sub-tree is ignored.
            if depth >= self.max_depth || rows.is_empty() {
                return Ok(());
            }
            let Some(meta) = self.registry.table(&table) else {
                return Ok(());
            };

            for (key, node) in &spec.entries {
                let edge_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };

                let Some(rel) = meta.relations.get(key) else {
                    tracing::warn!(table = %table, relation = %key, "unknown relation key in include spec; skipping");
                    for row in rows.iter_mut() {
                        row.insert(key.clone(), Value::Null);
                    }
                    continue;
                };

                match self
                    .load_edge(key, rel, node, rows, depth, &edge_path, errors)
                    .await
                {
                    Ok(()) => {}
                    Err(err) if self.strict => return Err(err),
                    Err(err) => {
                        tracing::error!(
                            table = %table,
                            relation = %key,
                            error = %err,
                            "include edge failed; degrading to empty default"
                        );
                        let default = empty_default(rel.kind);
                        for row in rows.iter_mut() {
                            row.insert(key.clone(), default.clone());
                        }
                        errors.push(StitchError {
                            path: edge_path,
                            relation: key.clone(),
                            message: err.to_string(),
                        });
                    }
                }
            }
            Ok(())
        })
    }

    fn plan<'r>(&'r self, rel: &'r RelationMeta) -> Result<EdgePlan<'r>> {
        let Some(target) = self.registry.table(&rel.target) else {
            return Err(ApiError::IncludeStitch {
                path: rel.target.clone(),
                message: "relation target is not part of the registry".to_string(),
            });
        };
        if let Some(jm) = &rel.junction {
            let Some(junction) = self.registry.any_table(&jm.table) else {
                return Err(ApiError::IncludeStitch {
                    path: jm.table.clone(),
                    message: "junction table is not part of the registry".to_string(),
                });
            };
            return Ok(EdgePlan::ManyToMany {
                target,
                junction,
                jm,
            });
        }
        Ok(match (rel.kind, rel.fk_owner) {
            (RelationKind::One, FkOwner::Source) => EdgePlan::BelongsTo { target },
            (RelationKind::One, FkOwner::Target) => EdgePlan::HasOne { target },
            (RelationKind::Many, _) => EdgePlan::HasMany { target },
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_edge(
        &self,
        key: &str,
        rel: &RelationMeta,
        node: &IncludeNode,
        rows: &mut Vec<JsonMap>,
        depth: usize,
        edge_path: &str,
        errors: &mut Vec<StitchError>,
    ) -> Result<()> {
        match self.plan(rel)? {
            EdgePlan::BelongsTo { target } => {
                self.load_belongs_to(key, rel, node, target, rows, depth, edge_path, errors)
                    .await
            }
            EdgePlan::HasOne { target } => {
                self.load_fk_children(key, rel, node, target, rows, depth, edge_path, errors, true)
                    .await
            }
            EdgePlan::HasMany { target } => {
                self.load_fk_children(key, rel, node, target, rows, depth, edge_path, errors, false)
                    .await
            }
            EdgePlan::ManyToMany {
                target,
                junction,
                jm,
            } => {
                self.load_many_to_many(
                    key, node, target, junction, jm, rows, depth, edge_path, errors,
                )
                .await
            }
        }
    }

    /// one, FK on the source side: index the target by its referenced tuple.
    #[allow(clippy::too_many_arguments)]
    async fn load_belongs_to(
        &self,
        key: &str,
        rel: &RelationMeta,
        node: &IncludeNode,
        target: &TableMeta,
        rows: &mut Vec<JsonMap>,
        depth: usize,
        edge_path: &str,
        errors: &mut Vec<StitchError>,
    ) -> Result<()> {
        let tuples = distinct_tuples(rows, &rel.fk_columns);
        let mut children = if tuples.is_empty() {
            Vec::new()
        } else {
            let mut buf = ParamBuffer::new();
            let pred = tuple_predicate(target, &rel.ref_columns, &tuples, &mut buf)?;
            let mut sql = format!(
                "SELECT {} FROM {} WHERE {}",
                select_list(target),
                qualified_table(&self.registry.schema, &target.name),
                pred
            );
            if let Some(filter) = &node.filter {
                let extra = compile_where(target, filter, &mut buf)?;
                sql.push_str(&format!(" AND ({extra})"));
            }
            let fetched = fetch_rows(self.pool, &sql, &buf.into_params()).await?;
            fetched
                .iter()
                .map(|r| row_to_json(r, &target.columns))
                .collect::<Result<Vec<_>>>()?
        };

        if let Some(sub) = &node.include {
            self.walk(
                rel.target.clone(),
                &mut children,
                sub,
                depth + 1,
                format!("{edge_path}.include"),
                errors,
            )
            .await?;
        }

        let mut index: IndexMap<String, JsonMap> = IndexMap::new();
        for child in children {
            let tuple = json_tuple(&child, &rel.ref_columns);
            index.insert(tuple_key(&tuple), child);
        }

        for row in rows.iter_mut() {
            let tuple = json_tuple(row, &rel.fk_columns);
            let value = if tuple.iter().any(Value::is_null) {
                Value::Null
            } else {
                match index.get(&tuple_key(&tuple)) {
                    Some(child) => {
                        let mut attached = child.clone();
                        project(&mut attached, target, node);
                        Value::Object(attached)
                    }
                    None => Value::Null,
                }
            };
            row.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// has-one / has-many: FK on the target side, grouped by FK tuple.
    #[allow(clippy::too_many_arguments)]
    async fn load_fk_children(
        &self,
        key: &str,
        rel: &RelationMeta,
        node: &IncludeNode,
        target: &TableMeta,
        rows: &mut Vec<JsonMap>,
        depth: usize,
        edge_path: &str,
        errors: &mut Vec<StitchError>,
        single: bool,
    ) -> Result<()> {
        let tuples = distinct_tuples(rows, &rel.ref_columns);
        let order = effective_order(target, node, edge_path)?;

        let mut children = if tuples.is_empty() {
            Vec::new()
        } else {
            let mut buf = ParamBuffer::new();
            let pred = tuple_predicate(target, &rel.fk_columns, &tuples, &mut buf)?;
            let filter_sql = match &node.filter {
                Some(filter) => {
                    let extra = compile_where(target, filter, &mut buf)?;
                    format!(" AND ({extra})")
                }
                None => String::new(),
            };
            let fk_list = rel
                .fk_columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");

            let windowed = !single && (node.limit.is_some() || node.offset.is_some());
            let sql = if windowed {
                // Window pattern: each parent gets its own slice in one query.
                let offset = node.offset.unwrap_or(0);
                let mut bounds = format!("__rn > {}", buf.placeholder(
                    BindValue::Int(offset as i64),
                    &ColumnType::BigInt,
                ));
                if let Some(limit) = node.limit {
                    let upper = buf.placeholder(
                        BindValue::Int((offset + limit) as i64),
                        &ColumnType::BigInt,
                    );
                    bounds.push_str(&format!(" AND __rn <= {upper}"));
                }
                format!(
                    "SELECT * FROM (SELECT {}, row_number() OVER (PARTITION BY {} ORDER BY {}) AS __rn FROM {} WHERE {}{}) __w WHERE {} ORDER BY {}, __rn",
                    select_list(target),
                    fk_list,
                    order.to_sql(None),
                    qualified_table(&self.registry.schema, &target.name),
                    pred,
                    filter_sql,
                    bounds,
                    fk_list,
                )
            } else {
                format!(
                    "SELECT {} FROM {} WHERE {}{} ORDER BY {}, {}",
                    select_list(target),
                    qualified_table(&self.registry.schema, &target.name),
                    pred,
                    filter_sql,
                    fk_list,
                    order.to_sql(None),
                )
            };

            let fetched = fetch_rows(self.pool, &sql, &buf.into_params()).await?;
            fetched
                .iter()
                .map(|r| row_to_json(r, &target.columns))
                .collect::<Result<Vec<_>>>()?
        };

        if let Some(sub) = &node.include {
            self.walk(
                rel.target.clone(),
                &mut children,
                sub,
                depth + 1,
                format!("{edge_path}.include"),
                errors,
            )
            .await?;
        }

        // Group children by FK tuple, preserving query order.
        let mut groups: IndexMap<String, Vec<JsonMap>> = IndexMap::new();
        for child in children {
            let tuple = json_tuple(&child, &rel.fk_columns);
            groups.entry(tuple_key(&tuple)).or_default().push(child);
        }

        for row in rows.iter_mut() {
            let tuple = json_tuple(row, &rel.ref_columns);
            let group = if tuple.iter().any(Value::is_null) {
                None
            } else {
                groups.get(&tuple_key(&tuple))
            };
            let value = if single {
                match group.and_then(|g| g.first()) {
                    Some(child) => {
                        let mut attached = child.clone();
                        project(&mut attached, target, node);
                        Value::Object(attached)
                    }
                    None => Value::Null,
                }
            } else {
                let items = group
                    .map(|g| {
                        g.iter()
                            .map(|child| {
                                let mut attached = child.clone();
                                project(&mut attached, target, node);
                                Value::Object(attached)
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Value::Array(items)
            };
            row.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// many-to-many, in two steps: junction rows by parent tuple,
    /// then targets by PK tuple; per-parent ordering/slicing in memory.
    #[allow(clippy::too_many_arguments)]
    async fn load_many_to_many(
        &self,
        key: &str,
        node: &IncludeNode,
        target: &TableMeta,
        junction: &TableMeta,
        jm: &JunctionMeta,
        rows: &mut Vec<JsonMap>,
        depth: usize,
        edge_path: &str,
        errors: &mut Vec<StitchError>,
    ) -> Result<()> {
        let parent_tuples = distinct_tuples(rows, &jm.source_ref_columns);
        let order = effective_order(target, node, edge_path)?;

        let junction_rows = if parent_tuples.is_empty() {
            Vec::new()
        } else {
            let mut buf = ParamBuffer::new();
            let pred = tuple_predicate(junction, &jm.source_fk_columns, &parent_tuples, &mut buf)?;
            let all_cols: Vec<String> = jm
                .source_fk_columns
                .iter()
                .chain(jm.target_fk_columns.iter())
                .map(|c| quote_ident(c))
                .collect();
            let order_cols = all_cols.join(", ");
            let sql = format!(
                "SELECT {} FROM {} WHERE {} ORDER BY {}",
                all_cols.join(", "),
                qualified_table(&self.registry.schema, &junction.name),
                pred,
                order_cols,
            );
            let fetched = fetch_rows(self.pool, &sql, &buf.into_params()).await?;
            fetched
                .iter()
                .map(|r| row_to_json(r, &junction.columns))
                .collect::<Result<Vec<_>>>()?
        };

        // Step 2: distinct target-side tuples → target rows, indexed by PK tuple.
        let mut target_tuples: Vec<Vec<Value>> = Vec::new();
        let mut seen = HashSet::new();
        for jrow in &junction_rows {
            let tuple = json_tuple(jrow, &jm.target_fk_columns);
            if tuple.iter().any(Value::is_null) {
                continue;
            }
            if seen.insert(tuple_key(&tuple)) {
                target_tuples.push(tuple);
            }
        }

        let mut children = if target_tuples.is_empty() {
            Vec::new()
        } else {
            let mut buf = ParamBuffer::new();
            let pred = tuple_predicate(target, &jm.target_ref_columns, &target_tuples, &mut buf)?;
            let mut sql = format!(
                "SELECT {} FROM {} WHERE {}",
                select_list(target),
                qualified_table(&self.registry.schema, &target.name),
                pred
            );
            if let Some(filter) = &node.filter {
                let extra = compile_where(target, filter, &mut buf)?;
                sql.push_str(&format!(" AND ({extra})"));
            }
            let fetched = fetch_rows(self.pool, &sql, &buf.into_params()).await?;
            fetched
                .iter()
                .map(|r| row_to_json(r, &target.columns))
                .collect::<Result<Vec<_>>>()?
        };

        if let Some(sub) = &node.include {
            self.walk(
                target.name.clone(),
                &mut children,
                sub,
                depth + 1,
                format!("{edge_path}.include"),
                errors,
            )
            .await?;
        }

        let mut target_index: IndexMap<String, JsonMap> = IndexMap::new();
        for child in children {
            let tuple = json_tuple(&child, &jm.target_ref_columns);
            target_index.insert(tuple_key(&tuple), child);
        }

        // Group junction rows by source tuple, map through the target index.
        let mut groups: IndexMap<String, Vec<JsonMap>> = IndexMap::new();
        for jrow in &junction_rows {
            let src = json_tuple(jrow, &jm.source_fk_columns);
            let tgt = json_tuple(jrow, &jm.target_fk_columns);
            if let Some(child) = target_index.get(&tuple_key(&tgt)) {
                groups
                    .entry(tuple_key(&src))
                    .or_default()
                    .push(child.clone());
            }
        }

        let offset = node.offset.unwrap_or(0) as usize;
        for row in rows.iter_mut() {
            let tuple = json_tuple(row, &jm.source_ref_columns);
            let mut items = if tuple.iter().any(Value::is_null) {
                Vec::new()
            } else {
                groups.get(&tuple_key(&tuple)).cloned().unwrap_or_default()
            };

            sort_in_memory(&mut items, &order, target);
            let sliced: Vec<Value> = items
                .into_iter()
                .skip(offset)
                .take(node.limit.map(|l| l as usize).unwrap_or(usize::MAX))
                .map(|mut child| {
                    project(&mut child, target, node);
                    Value::Object(child)
                })
                .collect();
            row.insert(key.to_string(), Value::Array(sliced));
        }
        Ok(())
    }
}

fn empty_default(kind: RelationKind) -> Value {
    match kind {
        RelationKind::One => Value::Null,
        RelationKind::Many => Value::Array(Vec::new()),
    }
}

/// The requested order, or the target's primary key for stability.
fn effective_order(target: &TableMeta, node: &IncludeNode, path: &str) -> Result<OrderSpec> {
    let spec = parse_order(target, node.order_by.as_ref(), node.order.as_ref(), path)?;
    if spec.is_empty() {
        Ok(primary_key_order(target))
    } else {
        Ok(spec)
    }
}

/// Distinct, fully non-null tuples of the given columns across rows.
fn distinct_tuples(rows: &[JsonMap], columns: &[String]) -> Vec<Vec<Value>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        let tuple = json_tuple(row, columns);
        if tuple.iter().any(Value::is_null) {
            continue;
        }
        if seen.insert(tuple_key(&tuple)) {
            out.push(tuple);
        }
    }
    out
}

fn json_tuple(row: &JsonMap, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn tuple_key(tuple: &[Value]) -> String {
    serde_json::to_string(tuple).unwrap_or_default()
}

/// Membership predicate over a tuple of columns: `= ANY` for single-column
/// keys, an OR-of-AND expansion for composite keys.
fn tuple_predicate(
    table: &TableMeta,
    columns: &[String],
    tuples: &[Vec<Value>],
    buf: &mut ParamBuffer,
) -> Result<String> {
    if columns.is_empty() || tuples.is_empty() {
        return Ok("FALSE".to_string());
    }

    if columns.len() == 1 {
        let col = &columns[0];
        let Some(meta) = table.column(col) else {
            return Err(ApiError::IncludeStitch {
                path: col.clone(),
                message: format!("column missing on '{}'", table.name),
            });
        };
        let values: Vec<Value> = tuples.iter().map(|t| t[0].clone()).collect();
        if let Some(cast) = meta.ty.any_array_cast() {
            let array = membership_array(&effective_bind_type(&meta.ty), &values, col)?;
            let ph = buf.any_placeholder(array, cast);
            let expr = match &meta.ty {
                ColumnType::Enum(_) => format!("{}::text", quote_ident(col)),
                _ => quote_ident(col),
            };
            return Ok(format!("{expr} = ANY({ph})"));
        }
    }

    // Composite (or uncastable) keys: OR of per-tuple AND groups.
    let mut alternatives = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let mut conjuncts = Vec::with_capacity(columns.len());
        for (col, value) in columns.iter().zip(tuple) {
            let Some(meta) = table.column(col) else {
                return Err(ApiError::IncludeStitch {
                    path: col.clone(),
                    message: format!("column missing on '{}'", table.name),
                });
            };
            let ty = effective_bind_type(&meta.ty);
            let bind = bind_value_from_json(&ty, value, col)
                .map_err(|issue| ApiError::Validation { issues: vec![issue] })?;
            let ph = buf.placeholder(bind, &ty);
            let expr = match &meta.ty {
                ColumnType::Enum(_) => format!("{}::text", quote_ident(col)),
                _ => quote_ident(col),
            };
            conjuncts.push(format!("{expr} = {ph}"));
        }
        alternatives.push(format!("({})", conjuncts.join(" AND ")));
    }
    Ok(format!("({})", alternatives.join(" OR ")))
}

fn effective_bind_type(ty: &ColumnType) -> ColumnType {
    match ty {
        ColumnType::Enum(_) => ColumnType::Text,
        other => other.clone(),
    }
}

/// Apply select/exclude to a child's own columns; relation keys added by
/// deeper include levels are left untouched.
fn project(child: &mut JsonMap, target: &TableMeta, node: &IncludeNode) {
    if let Some(select) = &node.select {
        let drop: Vec<String> = child
            .keys()
            .filter(|k| target.columns.contains_key(*k) && !select.contains(k))
            .cloned()
            .collect();
        for k in drop {
            child.remove(&k);
        }
    } else if let Some(exclude) = &node.exclude {
        for k in exclude {
            child.remove(k);
        }
    }
}

/// Stable in-memory sort for many-to-many attachment: requested order first,
/// primary-key tuple as the tiebreaker.
fn sort_in_memory(items: &mut [JsonMap], order: &OrderSpec, target: &TableMeta) {
    items.sort_by(|a, b| {
        for (col, dir) in &order.columns {
            let ord = cmp_json(
                a.get(col).unwrap_or(&Value::Null),
                b.get(col).unwrap_or(&Value::Null),
            );
            let ord = match dir {
                crate::order::SortOrder::Asc => ord,
                crate::order::SortOrder::Desc => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        let a_key = tuple_key(&json_tuple(a, &target.primary_key));
        let b_key = tuple_key(&json_tuple(b, &target.primary_key));
        a_key.cmp(&b_key)
    });
}

fn cmp_json(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater, // nulls last
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
