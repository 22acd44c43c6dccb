//! Structured predicates: validation against a schema, SQL rendering, and parameter binding.
//!
//! The wire shape accepted by [`WhereClause::from_json`] is
//! `{ "FirstName": { "value": "Jon" }, "LastName": { "value": "Watson", "operator": "<>" } }`.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::{Result, SqlModelError};
use crate::identifier::{check_param_name, quote};
use crate::native_type::NativeType;
use crate::params::BoundParameter;
use crate::schema::TableSchema;
use crate::types::RowValues;

/// Comparison operators a predicate may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl Operator {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    /// Parse a comparison symbol. `!=` is accepted as `<>`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Validation`] for anything else.
    pub fn parse(symbol: &str) -> Result<Self> {
        let normalized = symbol.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "<>" | "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(SqlModelError::validation(format!(
                "unsupported comparison operator {symbol:?}"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column condition. The type is normally filled in from the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub value: RowValues,
    pub operator: Option<Operator>,
    pub native_type: Option<NativeType>,
}

impl Predicate {
    pub fn new(value: impl Into<RowValues>) -> Self {
        Self {
            value: value.into(),
            operator: None,
            native_type: None,
        }
    }

    #[must_use]
    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    #[must_use]
    pub fn typed(mut self, native_type: NativeType) -> Self {
        self.native_type = Some(native_type);
        self
    }

    #[must_use]
    pub fn effective_operator(&self) -> Operator {
        self.operator.unwrap_or_default()
    }
}

/// Column → predicate, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    predicates: Vec<(String, Predicate)>,
}

impl WhereClause {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the predicate for `column`. A replaced predicate keeps its position.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, predicate: Predicate) -> Self {
        self.insert(column, predicate);
        self
    }

    /// Shorthand for an equality predicate.
    #[must_use]
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.with(column, Predicate::new(value))
    }

    pub fn insert(&mut self, column: impl Into<String>, predicate: Predicate) {
        let column = column.into();
        match self.predicates.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = predicate,
            None => self.predicates.push((column, predicate)),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Predicate> {
        self.predicates
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.predicates.iter().map(|(c, p)| (c.as_str(), p))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Parse the wire shape `{ column: { value, operator? } }`.
    ///
    /// `null` parses as an empty clause.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Validation`] when the input is not an object, an entry is not
    /// an object, an entry has no `value`, or an operator is not a supported symbol.
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let entries = match json {
            JsonValue::Null => return Ok(Self::new()),
            JsonValue::Object(map) => map,
            _ => return Err(SqlModelError::validation("where clause is not an object")),
        };

        let mut clause = Self::new();
        for (column, entry) in entries {
            let JsonValue::Object(fields) = entry else {
                return Err(SqlModelError::validation(format!(
                    "value of where.{column} is not an object"
                )));
            };
            let value = fields.get("value").ok_or_else(|| {
                SqlModelError::validation(format!(
                    "Where clause {column} does not have a value property."
                ))
            })?;
            let mut predicate = Predicate::new(RowValues::from_json(value));
            match fields.get("operator") {
                None | Some(JsonValue::Null) => {}
                Some(JsonValue::String(symbol)) => {
                    predicate = predicate.operator(Operator::parse(symbol)?);
                }
                Some(_) => {
                    return Err(SqlModelError::validation(format!(
                        "operator of where.{column} is not a string"
                    )));
                }
            }
            clause.insert(column.clone(), predicate);
        }
        Ok(clause)
    }

    /// Copy each predicate's type from the schema. Columns the schema lacks are left alone
    /// for [`validate`] to report.
    pub fn fill_types(&mut self, schema: &TableSchema) {
        for (column, predicate) in &mut self.predicates {
            if let Some(native_type) = schema.native_type(column) {
                predicate.native_type = Some(native_type);
            }
        }
    }

    /// Bound parameters for a query with no schema to consult; every predicate must carry
    /// its own type.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Validation`] for an untyped predicate or a column name that
    /// cannot be a parameter name.
    pub fn typed_parameters(&self) -> Result<Vec<BoundParameter>> {
        self.iter()
            .map(|(column, predicate)| {
                check_param_name(column)?;
                let native_type = predicate.native_type.ok_or_else(|| {
                    SqlModelError::validation(format!(
                        "Where clause {column} does not have a type property."
                    ))
                })?;
                Ok(BoundParameter::new(column, native_type, predicate.value.clone()))
            })
            .collect()
    }
}

/// Check that every predicate names a column of `schema`, stopping at the first that doesn't.
///
/// # Errors
///
/// Returns [`SqlModelError::Validation`] naming the offending column.
pub fn validate(clause: &WhereClause, schema: &TableSchema) -> Result<()> {
    for (column, _) in clause.iter() {
        if !schema.contains(column) {
            return Err(SqlModelError::validation(format!(
                "Field {column} is not a valid field in the table schema."
            )));
        }
    }
    Ok(())
}

/// Render `[col] <op> @col` clauses joined by ` AND `. Empty clauses render as `""`.
#[must_use]
pub fn render(clause: &WhereClause) -> String {
    clause
        .iter()
        .map(|(column, predicate)| {
            format!(
                "{} {} @{column}",
                quote(column),
                predicate.effective_operator()
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Bound parameters for `clause`, typed from `schema`.
///
/// # Errors
///
/// Returns [`SqlModelError::Validation`] for a column the schema lacks.
pub fn to_bound_parameters(
    clause: &WhereClause,
    schema: &TableSchema,
) -> Result<Vec<BoundParameter>> {
    clause
        .iter()
        .map(|(column, predicate)| {
            let native_type = schema.native_type(column).ok_or_else(|| {
                SqlModelError::validation(format!(
                    "Field {column} is not a valid field in the table schema."
                ))
            })?;
            Ok(BoundParameter::new(column, native_type, predicate.value.clone()))
        })
        .collect()
}
