// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! SQL condition translation.
//!
//! Parses the restricted grammar
//! `SELECT * FROM <table> [WHERE <predicate>] [LIMIT <n> [OFFSET <m>]]`
//! into the internal [`ast::SelectSpec`], which the fluent layer turns into a
//! resolved statement. WHERE predicates are equality comparisons combined
//! with AND/OR; parenthesised groups are not flattened, their nesting depth
//! rides along on each condition so selector construction can apply the
//! OR policy consistently.
//!
//! A second, non-SQL entry point handles the textual `key = ?` form used by
//! the fluent `where_clause` call.

pub(crate) mod ast;

use sqlparser::ast::{
    BinaryOperator, Expr, ObjectName, SetExpr, Statement as SqlStatement,
    TableFactor, Value as SqlValue,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{Error, Result};
use crate::filter::{detect_value, is_field_selector_key, CompareOp, Condition, LogicOp};
use ast::SelectSpec;

/// Parse one restricted SELECT statement, substituting `?` placeholders from
/// `values` first. A placeholder/value count mismatch aborts before parsing.
pub(crate) fn parse_select(sql: &str, values: &[String]) -> Result<SelectSpec> {
    let sql = substitute_placeholders(sql, values)?;
    let sql_trimmed = sql.trim().trim_end_matches(';');

    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql_trimmed).map_err(|e| {
        Error::SqlParse {
            sql: sql_trimmed.to_string(),
            message: e.to_string(),
        }
    })?;
    if statements.len() != 1 {
        return Err(Error::SqlParse {
            sql: sql_trimmed.to_string(),
            message: format!("expected exactly one statement, got {}", statements.len()),
        });
    }

    let query = match &statements[0] {
        SqlStatement::Query(query) => query,
        _ => {
            return Err(Error::NotASelect {
                sql: sql_trimmed.to_string(),
            });
        }
    };
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        _ => {
            return Err(Error::NotASelect {
                sql: sql_trimmed.to_string(),
            });
        }
    };

    if select.from.len() != 1 {
        return Err(Error::SqlParse {
            sql: sql_trimmed.to_string(),
            message: "exactly one FROM table is required".to_string(),
        });
    }
    let table = match &select.from[0].relation {
        TableFactor::Table { name, .. } => object_name_text(name),
        other => {
            return Err(Error::SqlParse {
                sql: sql_trimmed.to_string(),
                message: format!("unsupported table expression: {other}"),
            });
        }
    };

    let mut conditions = Vec::new();
    if let Some(selection) = &select.selection {
        collect_conditions(selection, 0, LogicOp::And, &mut conditions)?;
    }

    let (limit, offset) = extract_limit_offset(query)?;

    Ok(SelectSpec {
        table,
        conditions,
        limit,
        offset,
    })
}

/// Split an AND-joined `key = ?` condition string, pair clauses positionally
/// with `values`, and classify each into label vs field selector entries.
///
/// Returns `(label_entries, field_entries)` as `k=v` strings. Any mismatch
/// aborts before a single entry is built.
pub(crate) fn split_where_clauses(
    condition: &str,
    values: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    let parts: Vec<&str> = condition.split("AND").map(str::trim).collect();
    if parts.len() != values.len() {
        return Err(Error::ClauseCountMismatch {
            clauses: parts.len(),
            values: values.len(),
        });
    }

    let mut labels = Vec::new();
    let mut fields = Vec::new();
    for (part, value) in parts.iter().zip(values) {
        let substituted = part.replacen('?', value, 1);
        let (key, value) = substituted
            .split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .ok_or_else(|| Error::InvalidWhereClause {
                clause: part.to_string(),
            })?;
        if key.is_empty() || value.is_empty() {
            return Err(Error::InvalidWhereClause {
                clause: part.to_string(),
            });
        }
        let entry = format!("{}={}", key, value);
        if is_field_selector_key(&key) {
            fields.push(entry);
        } else {
            labels.push(entry);
        }
    }
    Ok((labels, fields))
}

/// Replace each `?` outside of string literals with the matching quoted value
fn substitute_placeholders(sql: &str, values: &[String]) -> Result<String> {
    if values.is_empty() {
        return Ok(sql.to_string());
    }

    let mut out = String::with_capacity(sql.len());
    let mut supplied = values.iter();
    let mut used = 0usize;
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                let value = supplied.next().ok_or(Error::ClauseCountMismatch {
                    clauses: used + 1,
                    values: values.len(),
                })?;
                used += 1;
                out.push('\'');
                out.push_str(&value.replace('\'', "''"));
                out.push('\'');
            }
            _ => out.push(ch),
        }
    }
    if used != values.len() {
        return Err(Error::ClauseCountMismatch {
            clauses: used,
            values: values.len(),
        });
    }
    Ok(out)
}

fn object_name_text(name: &ObjectName) -> String {
    name.0
        .iter()
        .filter_map(|part| part.as_ident())
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Walk a WHERE expression, appending equality conditions in source order.
///
/// AND/OR combinators recurse with the combinator carried down; nested
/// parentheses bump the group depth.
fn collect_conditions(
    expr: &Expr,
    depth: u32,
    logic: LogicOp,
    out: &mut Vec<Condition>,
) -> Result<()> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                collect_conditions(left, depth, logic, out)?;
                collect_conditions(right, depth, LogicOp::And, out)?;
            }
            BinaryOperator::Or => {
                collect_conditions(left, depth, logic, out)?;
                collect_conditions(right, depth, LogicOp::Or, out)?;
            }
            BinaryOperator::Eq => {
                let field = column_text(left)?;
                let raw = literal_text(right)?;
                let (kind, value) = detect_value(&raw);
                out.push(Condition {
                    field,
                    op: CompareOp::Eq,
                    value,
                    kind,
                    logic,
                    depth,
                });
            }
            other => {
                return Err(Error::SqlParse {
                    sql: expr.to_string(),
                    message: format!("unsupported operator {other}, only = is accepted"),
                });
            }
        },
        Expr::Nested(inner) => collect_conditions(inner, depth + 1, logic, out)?,
        other => {
            return Err(Error::SqlParse {
                sql: other.to_string(),
                message: "unsupported WHERE expression".to_string(),
            });
        }
    }
    Ok(())
}

fn column_text(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => Ok(idents
            .iter()
            .map(|i| i.value.as_str())
            .collect::<Vec<_>>()
            .join(".")),
        other => Err(Error::SqlParse {
            sql: other.to_string(),
            message: "expected a column identifier".to_string(),
        }),
    }
}

fn literal_text(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(s.clone()),
            SqlValue::Number(n, _) => Ok(n.clone()),
            SqlValue::Boolean(b) => Ok(b.to_string()),
            other => Err(Error::SqlParse {
                sql: format!("{other}"),
                message: "unsupported literal".to_string(),
            }),
        },
        // bare words (status.phase = Running) read as identifiers
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => Ok(idents
            .iter()
            .map(|i| i.value.as_str())
            .collect::<Vec<_>>()
            .join(".")),
        other => Err(Error::SqlParse {
            sql: other.to_string(),
            message: "expected a literal value".to_string(),
        }),
    }
}

fn extract_limit_offset(query: &sqlparser::ast::Query) -> Result<(Option<usize>, Option<usize>)> {
    let limit = match &query.limit {
        Some(expr) => Some(numeric_value(expr)?),
        None => None,
    };
    let offset = match &query.offset {
        Some(off) => Some(numeric_value(&off.value)?),
        None => None,
    };
    Ok((limit, offset))
}

fn numeric_value(expr: &Expr) -> Result<usize> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::Number(n, _) => n.parse::<usize>().map_err(|e| Error::SqlParse {
                sql: n.clone(),
                message: format!("invalid LIMIT/OFFSET: {e}"),
            }),
            other => Err(Error::SqlParse {
                sql: format!("{other}"),
                message: "LIMIT/OFFSET must be a number".to_string(),
            }),
        },
        other => Err(Error::SqlParse {
            sql: other.to_string(),
            message: "LIMIT/OFFSET must be a number".to_string(),
        }),
    }
}
