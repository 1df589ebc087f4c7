// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for kubeq.
//!
//! Usage, parse, resolution and conversion errors are raised before any
//! request leaves the process. Backend errors pass through verbatim as
//! [`Error::Api`] and are never retried or rewritten here.

use thiserror::Error;

/// Result type for kubeq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or executing a statement
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API or transport error, passed through unchanged
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig loading / client bootstrap failure
    #[error("cluster configuration error: {0}")]
    Config(String),

    /// Logical name matched neither built-in metadata nor the CRD list
    #[error("resource '{name}' not found in api-resources or CRD list")]
    UnknownResource { name: String },

    /// Delete (and name-addressed operations) require a non-empty name
    #[error("operation requires a resource name")]
    MissingName,

    /// No resource type has been resolved for this statement
    #[error("no resource type resolved; call resource(), table(), gvk() or sql() first")]
    MissingResource,

    /// Exec requires a command
    #[error("exec requires a non-empty command")]
    MissingCommand,

    /// A statement's resolved identity must not change
    #[error("statement already resolved to {current}; refusing to re-resolve as {requested}")]
    IdentityConflict { current: String, requested: String },

    /// Malformed SQL text
    #[error("SQL parse error in {sql:?}: {message}")]
    SqlParse { sql: String, message: String },

    /// The SQL entry point accepts SELECT statements only
    #[error("only SELECT statements are supported: {sql:?}")]
    NotASelect { sql: String },

    /// WHERE clause count and supplied value count differ
    #[error("condition count ({clauses}) does not match value count ({values})")]
    ClauseCountMismatch { clauses: usize, values: usize },

    /// A textual WHERE clause was not of the form `key = value`
    #[error("invalid WHERE clause {clause:?}, expected `key = value`")]
    InvalidWhereClause { clause: String },

    /// Label/field selectors are AND-only; OR predicates cannot be pushed down
    #[error("OR predicates cannot be expressed as label/field selectors")]
    UnsupportedOrPredicate,

    /// Typed <-> generic object mapping failure, raised before any network call
    #[error("object conversion error: {0}")]
    Conversion(#[source] serde_json::Error),

    /// The statement's cancellation token fired while a request was in flight
    #[error("operation cancelled")]
    Cancelled,

    /// The attached process produced no output stream
    #[error("exec did not return an output stream")]
    MissingStream,
}
