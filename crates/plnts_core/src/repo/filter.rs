//! Fluent document filter builder.
//!
//! # Responsibility
//! - Express equality, range, membership and existence predicates over
//!   document fields.
//! - Compile predicates to parameterized SQL over the stored JSON body.
//!
//! # Invariants
//! - Field names are validated before use; they are bound as JSON paths,
//!   never spliced into SQL.
//! - An empty filter matches every document of the collection.

use super::table::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "IS NOT",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Exists {
        field: String,
        exists: bool,
    },
    Any(Vec<Filter>),
}

/// Conjunction of field predicates; see [`Filter::any`] for disjunction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents that are not banished; a missing flag counts as live.
    pub fn live() -> Self {
        Self::new().ne("banished", true)
    }

    /// Exact match; `null` also matches a missing field.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Eq, value.into())
    }

    /// Inequality; a missing field counts as not equal.
    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Ne, value.into())
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Gt, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Gte, value.into())
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Lt, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.compare(field, CompareOp::Lte, value.into())
    }

    pub fn in_<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.clauses.push(Clause::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    /// Membership exclusion; a missing field counts as not in the set.
    pub fn not_in<V: Into<Value>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.clauses.push(Clause::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        });
        self
    }

    /// Field present with a non-null value (`exists == true`), or not.
    pub fn exists(mut self, field: &str, exists: bool) -> Self {
        self.clauses.push(Clause::Exists {
            field: field.to_string(),
            exists,
        });
        self
    }

    /// Matches when at least one of `alternatives` matches.
    pub fn any(mut self, alternatives: Vec<Filter>) -> Self {
        self.clauses.push(Clause::Any(alternatives));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn compare(mut self, field: &str, op: CompareOp, value: Value) -> Self {
        self.clauses.push(Clause::Compare {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    /// Compiles to a SQL boolean expression over `body` plus bind values.
    pub(crate) fn to_sql(&self) -> RepoResult<(String, Vec<SqlValue>)> {
        let mut binds = Vec::new();
        let sql = self.push_sql(&mut binds)?;
        Ok((sql, binds))
    }

    fn push_sql(&self, binds: &mut Vec<SqlValue>) -> RepoResult<String> {
        if self.clauses.is_empty() {
            return Ok("1 = 1".to_string());
        }

        let mut parts = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            parts.push(clause_sql(clause, binds)?);
        }
        Ok(parts.join(" AND "))
    }
}

fn clause_sql(clause: &Clause, binds: &mut Vec<SqlValue>) -> RepoResult<String> {
    match clause {
        Clause::Compare { field, op, value } => {
            let path = json_path(field)?;
            binds.push(SqlValue::Text(path));
            if value.is_null() {
                return Ok(match op {
                    CompareOp::Eq => "json_extract(body, ?) IS NULL".to_string(),
                    CompareOp::Ne => "json_extract(body, ?) IS NOT NULL".to_string(),
                    _ => {
                        binds.pop();
                        "0 = 1".to_string()
                    }
                });
            }
            binds.push(sql_value(value));
            Ok(format!("json_extract(body, ?) {} ?", op.sql()))
        }
        Clause::In {
            field,
            values,
            negated,
        } => {
            let path = json_path(field)?;
            if values.is_empty() {
                return Ok(if *negated { "1 = 1" } else { "0 = 1" }.to_string());
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            if *negated {
                binds.push(SqlValue::Text(path.clone()));
                binds.push(SqlValue::Text(path));
                binds.extend(values.iter().map(sql_value));
                Ok(format!(
                    "(json_extract(body, ?) IS NULL OR json_extract(body, ?) NOT IN ({placeholders}))"
                ))
            } else {
                binds.push(SqlValue::Text(path));
                binds.extend(values.iter().map(sql_value));
                Ok(format!("json_extract(body, ?) IN ({placeholders})"))
            }
        }
        Clause::Exists { field, exists } => {
            binds.push(SqlValue::Text(json_path(field)?));
            Ok(if *exists {
                "json_extract(body, ?) IS NOT NULL".to_string()
            } else {
                "json_extract(body, ?) IS NULL".to_string()
            })
        }
        Clause::Any(alternatives) => {
            if alternatives.is_empty() {
                return Ok("0 = 1".to_string());
            }
            let mut parts = Vec::with_capacity(alternatives.len());
            for alternative in alternatives {
                parts.push(format!("({})", alternative.push_sql(binds)?));
            }
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}

fn json_path(field: &str) -> RepoResult<String> {
    if !FIELD_PATH_RE.is_match(field) {
        return Err(RepoError::InvalidFilter(format!(
            "invalid field name `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}
