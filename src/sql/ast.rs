//! Minimal internal representation of a parsed SELECT.
//!
//! Only what the translator consumes survives parsing: the table token, the
//! flattened-with-depth predicate list, and LIMIT/OFFSET. The select list is
//! deliberately ignored (`SELECT *` semantics). Keeping this layer thin means
//! the concrete SQL parser can be swapped without touching translation.

use crate::filter::Condition;

/// A parsed restricted SELECT statement
#[derive(Debug, Clone)]
pub(crate) struct SelectSpec {
    /// FROM table token, unresolved
    pub table: String,
    /// WHERE predicates in source order, with logic/depth metadata
    pub conditions: Vec<Condition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
